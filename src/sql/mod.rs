/// playsql SQL front end and executor
///
/// Architecture:
/// - Lexer: Tokenizes SQL strings with byte spans
/// - Parser: Builds AST from tokens
/// - Executor: Runs statements against a `TableStore`
/// - Join / Aggregate: nested-loop joins and GROUP BY helpers
pub mod aggregate;
pub mod ast;
pub mod evaluator;
pub mod executor;
pub mod join;
pub mod lexer;
pub mod parser;
pub mod result;
pub mod row_converter;
pub mod token;

pub use ast::{Condition, SelectItem, SelectStmt, Statement};
pub use evaluator::{ColumnScope, ExprEvaluator};
pub use executor::QueryExecutor;
pub use lexer::{tokenize, Lexer};
pub use parser::{parse_sql, Parser};
pub use result::{ExecutionOutput, QueryResult};
pub use row_converter::validate_and_convert;
pub use token::{Token, TokenKind, TokenType};

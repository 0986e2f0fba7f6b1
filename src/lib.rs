//! playsql: a self-contained SQL query engine
//!
//! ## Features
//! - CREATE TABLE / CREATE INDEX / DROP TABLE, INSERT, SELECT, UPDATE, DELETE,
//!   SHOW TABLES and DESCRIBE
//! - INNER / LEFT / RIGHT joins, GROUP BY with HAVING, aggregates, DISTINCT,
//!   ORDER BY with LIMIT / OFFSET
//! - Per-caller rate limiting, table and row quotas, statement timeouts
//!
//! ## Architecture
//! - SQL layer: lexer -> parser -> AST -> executor
//! - Index layer: in-memory B+Tree secondary indexes cached per (table, index)
//! - Store layer: async [`TableStore`] trait; [`MemoryStore`] for tests and the CLI
//! - Engine: rate limit, parse, execute under a deadline, structured [`QueryResult`]
//!
//! ```no_run
//! use playsql::{Engine, EngineConfig, MemoryStore};
//!
//! # async fn demo() {
//! let engine = Engine::new(MemoryStore::new(), EngineConfig::default());
//! engine.execute("CREATE TABLE users (name TEXT, age INTEGER)").await;
//! engine.execute("INSERT INTO users (name, age) VALUES ('Ann', 30)").await;
//! let result = engine.execute("SELECT name FROM users WHERE age > 25").await;
//! assert!(result.success);
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod governor;
pub mod index;
pub mod sql;
pub mod store;
pub mod types;

mod error;

pub use config::{EngineConfig, QuotaConfig, RateLimitConfig};
pub use engine::{Engine, DEFAULT_CALLER};
pub use error::{EngineError, ErrorKind, Result};
pub use governor::{Deadline, Governor, RateLimiter, RemoteRateLimiter};
pub use sql::{parse_sql, tokenize, ExecutionOutput, QueryResult};
pub use store::{MemoryStore, QueryLogEntry, StoreError, StoreResult, TableStore};
pub use types::{ColumnDef, ColumnType, IndexDef, Row, RowId, SqlRow, TableId, TableSchema, Value};

/// SQL Parser - converts tokens into AST
use super::ast::*;
use super::lexer::Lexer;
use super::token::{Token, TokenType};
use crate::error::{EngineError, Result};
use crate::types::{ColumnDef, ColumnType, Value};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

/// Tokenize and parse a single statement
pub fn parse_sql(sql: &str) -> Result<Statement> {
    let tokens = Lexer::new(sql).tokenize()?;
    Parser::new(tokens).parse()
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, position: 0 }
    }

    /// Parse exactly one SQL statement with an optional trailing semicolon
    pub fn parse(&mut self) -> Result<Statement> {
        let stmt = match &self.current().token_type {
            TokenType::Select => Statement::Select(self.parse_select()?),
            TokenType::Insert => Statement::Insert(self.parse_insert()?),
            TokenType::Update => Statement::Update(self.parse_update()?),
            TokenType::Delete => Statement::Delete(self.parse_delete()?),
            TokenType::Create => self.parse_create()?,
            TokenType::Drop => self.parse_drop()?,
            TokenType::Show => self.parse_show()?,
            TokenType::Describe | TokenType::Desc => self.parse_describe()?,
            _ => {
                return Err(self.error(
                    "SELECT, INSERT, UPDATE, DELETE, CREATE, DROP, SHOW or DESCRIBE",
                ))
            }
        };

        self.match_token(TokenType::Semicolon);
        if !matches!(self.current().token_type, TokenType::Eof) {
            return Err(self.error("end of statement"));
        }

        Ok(stmt)
    }

    /// Parse SELECT statement
    fn parse_select(&mut self) -> Result<SelectStmt> {
        self.expect(TokenType::Select)?;

        let distinct = self.match_token(TokenType::Distinct);

        let projection = if self.match_token(TokenType::Star) {
            Projection::Star
        } else {
            Projection::Items(self.parse_select_items()?)
        };

        self.expect(TokenType::From)?;
        let from = self.parse_single_table()?;

        let mut joins = Vec::new();
        while self.is_join_keyword() {
            joins.push(self.parse_join()?);
        }

        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_condition()?)
        } else {
            None
        };

        let group_by = if self.match_token(TokenType::Group) {
            self.expect(TokenType::By)?;
            self.parse_column_ref_list()?
        } else {
            Vec::new()
        };

        let having = if self.match_token(TokenType::Having) {
            Some(self.parse_condition()?)
        } else {
            None
        };

        let order_by = if self.match_token(TokenType::Order) {
            self.expect(TokenType::By)?;
            self.parse_order_by()?
        } else {
            Vec::new()
        };

        let limit = if self.match_token(TokenType::Limit) {
            Some(self.parse_usize()?)
        } else {
            None
        };

        let offset = if self.match_token(TokenType::Offset) {
            Some(self.parse_usize()?)
        } else {
            None
        };

        Ok(SelectStmt {
            distinct,
            projection,
            from,
            joins,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_select_items(&mut self) -> Result<Vec<SelectItem>> {
        let mut items = Vec::new();

        loop {
            let item = if self.is_aggregate_call() {
                let call = self.parse_aggregate_call()?;
                let alias = self.parse_optional_alias()?;
                SelectItem::Aggregate { call, alias }
            } else {
                let column = self.parse_column_ref()?;
                let alias = self.parse_optional_alias()?;
                SelectItem::Column { column, alias }
            };
            items.push(item);

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        Ok(items)
    }

    /// `[AS] alias`
    fn parse_optional_alias(&mut self) -> Result<Option<String>> {
        if self.match_token(TokenType::As) {
            Ok(Some(self.parse_identifier()?))
        } else if matches!(self.current().token_type, TokenType::Identifier(_)) {
            Ok(Some(self.parse_identifier()?))
        } else {
            Ok(None)
        }
    }

    fn is_aggregate_call(&self) -> bool {
        match &self.current().token_type {
            TokenType::Identifier(name) => {
                AggregateFunction::from_name(name).is_some()
                    && matches!(self.peek().token_type, TokenType::LParen)
            }
            _ => false,
        }
    }

    /// FUNC '(' [DISTINCT] ( '*' | colref ) ')'
    fn parse_aggregate_call(&mut self) -> Result<AggregateCall> {
        let name = self.parse_identifier()?;
        let function = AggregateFunction::from_name(&name)
            .ok_or_else(|| self.error("aggregate function"))?;
        self.expect(TokenType::LParen)?;
        let distinct = self.match_token(TokenType::Distinct);
        let argument = if self.match_token(TokenType::Star) {
            if function != AggregateFunction::Count || distinct {
                return Err(self.error("column name"));
            }
            AggregateArg::Star
        } else {
            AggregateArg::Column(self.parse_column_ref()?)
        };
        self.expect(TokenType::RParen)?;
        Ok(AggregateCall {
            function,
            argument,
            distinct,
        })
    }

    /// Column reference or, in HAVING/ORDER BY, an aggregate call named by
    /// its output name (e.g. `COUNT(*)`)
    fn parse_operand(&mut self) -> Result<ColumnRef> {
        if self.is_aggregate_call() {
            let call = self.parse_aggregate_call()?;
            Ok(ColumnRef::new(call.to_string()))
        } else {
            self.parse_column_ref()
        }
    }

    /// `col` or `table.col`
    fn parse_column_ref(&mut self) -> Result<ColumnRef> {
        let first = self.parse_identifier()?;
        if self.match_token(TokenType::Dot) {
            let column = self.parse_identifier()?;
            Ok(ColumnRef::qualified(first, column))
        } else {
            Ok(ColumnRef::new(first))
        }
    }

    fn parse_column_ref_list(&mut self) -> Result<Vec<ColumnRef>> {
        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_column_ref()?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(columns)
    }

    fn parse_order_by(&mut self) -> Result<Vec<OrderByExpr>> {
        let mut order_by = Vec::new();

        loop {
            let column = self.parse_operand()?;
            let asc = if self.match_token(TokenType::Desc) {
                false
            } else {
                self.match_token(TokenType::Asc); // Optional
                true
            };

            order_by.push(OrderByExpr { column, asc });

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        Ok(order_by)
    }

    /// Parse a table reference: table_name [[AS] alias]
    fn parse_single_table(&mut self) -> Result<TableRef> {
        let name = self.parse_identifier()?;
        let alias = self.parse_optional_alias()?;
        Ok(TableRef { name, alias })
    }

    fn is_join_keyword(&self) -> bool {
        matches!(
            self.current().token_type,
            TokenType::Join | TokenType::Inner | TokenType::Left | TokenType::Right
        )
    }

    /// [INNER|LEFT [OUTER]|RIGHT [OUTER]] JOIN table [[AS] alias] ON colref = colref
    fn parse_join(&mut self) -> Result<Join> {
        let join_type = match self.current().token_type {
            TokenType::Inner => {
                self.advance();
                self.expect(TokenType::Join)?;
                JoinType::Inner
            }
            TokenType::Left => {
                self.advance();
                self.match_token(TokenType::Outer);
                self.expect(TokenType::Join)?;
                JoinType::Left
            }
            TokenType::Right => {
                self.advance();
                self.match_token(TokenType::Outer);
                self.expect(TokenType::Join)?;
                JoinType::Right
            }
            TokenType::Join => {
                self.advance();
                JoinType::Inner
            }
            _ => return Err(self.error("JOIN")),
        };

        let table = self.parse_single_table()?;
        self.expect(TokenType::On)?;
        let left = self.parse_column_ref()?;
        self.expect(TokenType::Eq)?;
        let right = self.parse_column_ref()?;

        Ok(Join {
            join_type,
            table,
            left,
            right,
        })
    }

    fn parse_insert(&mut self) -> Result<InsertStmt> {
        self.expect(TokenType::Insert)?;
        self.expect(TokenType::Into)?;

        let table = self.parse_identifier()?;

        let columns = if self.match_token(TokenType::LParen) {
            let cols = self.parse_identifier_list()?;
            self.expect(TokenType::RParen)?;
            Some(cols)
        } else {
            None
        };

        self.expect(TokenType::Values)?;

        let mut values = Vec::new();
        loop {
            self.expect(TokenType::LParen)?;
            let row = self.parse_literal_list()?;
            self.expect(TokenType::RParen)?;
            values.push(row);

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        Ok(InsertStmt {
            table,
            columns,
            values,
        })
    }

    fn parse_update(&mut self) -> Result<UpdateStmt> {
        self.expect(TokenType::Update)?;
        let table = self.parse_identifier()?;
        self.expect(TokenType::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.parse_identifier()?;
            self.expect(TokenType::Eq)?;
            let value = self.parse_literal()?;
            assignments.push((column, value));

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_condition()?)
        } else {
            None
        };

        Ok(UpdateStmt {
            table,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteStmt> {
        self.expect(TokenType::Delete)?;
        self.expect(TokenType::From)?;
        let table = self.parse_identifier()?;

        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_condition()?)
        } else {
            None
        };

        Ok(DeleteStmt { table, where_clause })
    }

    fn parse_create(&mut self) -> Result<Statement> {
        self.expect(TokenType::Create)?;

        match &self.current().token_type {
            TokenType::Table => Ok(Statement::CreateTable(self.parse_create_table()?)),
            TokenType::Index => Ok(Statement::CreateIndex(self.parse_create_index(false)?)),
            TokenType::Unique => {
                self.advance();
                Ok(Statement::CreateIndex(self.parse_create_index(true)?))
            }
            _ => Err(self.error("TABLE or INDEX after CREATE")),
        }
    }

    fn parse_create_table(&mut self) -> Result<CreateTableStmt> {
        self.expect(TokenType::Table)?;

        let if_not_exists = if self.match_token(TokenType::If) {
            self.expect(TokenType::Not)?;
            self.expect(TokenType::Exists)?;
            true
        } else {
            false
        };

        let table = self.parse_identifier()?;

        self.expect(TokenType::LParen)?;
        let columns = self.parse_column_defs()?;
        self.expect(TokenType::RParen)?;

        Ok(CreateTableStmt {
            table,
            if_not_exists,
            columns,
        })
    }

    /// Column definitions plus table-level PRIMARY KEY(col) / UNIQUE(col),
    /// which are folded into the named column's flags
    fn parse_column_defs(&mut self) -> Result<Vec<ColumnDef>> {
        let mut columns: Vec<ColumnDef> = Vec::new();
        let mut table_constraints: Vec<(String, bool)> = Vec::new(); // (column, is_primary)

        loop {
            match self.current().token_type {
                TokenType::Primary => {
                    self.advance();
                    self.expect(TokenType::Key)?;
                    self.expect(TokenType::LParen)?;
                    let column = self.parse_identifier()?;
                    self.expect(TokenType::RParen)?;
                    table_constraints.push((column, true));
                }
                TokenType::Unique if matches!(self.peek().token_type, TokenType::LParen) => {
                    self.advance();
                    self.expect(TokenType::LParen)?;
                    let column = self.parse_identifier()?;
                    self.expect(TokenType::RParen)?;
                    table_constraints.push((column, false));
                }
                _ => columns.push(self.parse_column_def()?),
            }

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        for (name, is_primary) in table_constraints {
            let known: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
            let column = columns
                .iter_mut()
                .find(|c| c.name == name)
                .ok_or_else(|| EngineError::unknown_column(&name, "table definition", known))?;
            if is_primary {
                column.primary_key = true;
                column.not_null = true;
            }
            column.unique = true;
        }

        Ok(columns)
    }

    /// name TYPE constraint*
    fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let name = self.parse_identifier()?;
        let data_type = self.parse_data_type()?;
        let mut column = ColumnDef::new(name, data_type);

        loop {
            match self.current().token_type {
                TokenType::Primary => {
                    self.advance();
                    self.expect(TokenType::Key)?;
                    column = column.primary_key();
                }
                TokenType::Unique => {
                    self.advance();
                    column.unique = true;
                }
                TokenType::Not => {
                    self.advance();
                    self.expect(TokenType::Null)?;
                    column.not_null = true;
                }
                TokenType::Null => {
                    self.advance();
                }
                TokenType::Default => {
                    self.advance();
                    column.default_value = Some(self.parse_literal()?);
                }
                TokenType::AutoIncrement => {
                    self.advance();
                    column.auto_increment = true;
                }
                _ => {
                    if self.match_keyword("AUTOINCREMENT") {
                        column.auto_increment = true;
                    } else {
                        break;
                    }
                }
            }
        }

        Ok(column)
    }

    /// Type name with optional size arguments, e.g. VARCHAR(255)
    fn parse_data_type(&mut self) -> Result<ColumnType> {
        let data_type = match &self.current().token_type {
            TokenType::Identifier(name) => ColumnType::from_sql_name(name),
            _ => None,
        };
        let data_type = data_type.ok_or_else(|| {
            self.error("data type (INTEGER, TEXT, REAL, BOOLEAN or DATE)")
        })?;
        self.advance();

        if self.match_token(TokenType::LParen) {
            self.parse_usize()?;
            if self.match_token(TokenType::Comma) {
                self.parse_usize()?;
            }
            self.expect(TokenType::RParen)?;
        }

        Ok(data_type)
    }

    /// INDEX name ON table (col, ...)
    fn parse_create_index(&mut self, unique: bool) -> Result<CreateIndexStmt> {
        self.expect(TokenType::Index)?;
        let index_name = self.parse_identifier()?;
        self.expect(TokenType::On)?;
        let table = self.parse_identifier()?;
        self.expect(TokenType::LParen)?;
        let columns = self.parse_identifier_list()?;
        self.expect(TokenType::RParen)?;

        Ok(CreateIndexStmt {
            index_name,
            table,
            columns,
            unique,
        })
    }

    fn parse_drop(&mut self) -> Result<Statement> {
        self.expect(TokenType::Drop)?;
        self.expect(TokenType::Table)?;

        let if_exists = if self.match_token(TokenType::If) {
            self.expect(TokenType::Exists)?;
            true
        } else {
            false
        };

        let table = self.parse_identifier()?;
        Ok(Statement::DropTable(DropTableStmt { table, if_exists }))
    }

    fn parse_show(&mut self) -> Result<Statement> {
        self.expect(TokenType::Show)?;

        if self.match_token(TokenType::Tables) {
            Ok(Statement::ShowTables)
        } else {
            Err(self.error("TABLES after SHOW"))
        }
    }

    /// DESCRIBE table (DESC accepted)
    fn parse_describe(&mut self) -> Result<Statement> {
        if !matches!(self.current().token_type, TokenType::Describe | TokenType::Desc) {
            return Err(self.error("DESCRIBE"));
        }
        self.advance();

        let table_name = self.parse_identifier()?;
        Ok(Statement::DescribeTable(table_name))
    }

    /// expr := and_expr (OR and_expr)*
    fn parse_condition(&mut self) -> Result<Condition> {
        let mut left = self.parse_and_condition()?;
        while self.match_token(TokenType::Or) {
            let right = self.parse_and_condition()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// and_expr := unary (AND unary)*
    fn parse_and_condition(&mut self) -> Result<Condition> {
        let mut left = self.parse_unary_condition()?;
        while self.match_token(TokenType::And) {
            let right = self.parse_unary_condition()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// unary := NOT unary | '(' expr ')' | comparison
    fn parse_unary_condition(&mut self) -> Result<Condition> {
        if self.match_token(TokenType::Not) {
            let inner = self.parse_unary_condition()?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        if self.match_token(TokenType::LParen) {
            let inner = self.parse_condition()?;
            self.expect(TokenType::RParen)?;
            return Ok(inner);
        }
        self.parse_comparison()
    }

    /// operand (op literal | [NOT] LIKE literal | IS [NOT] NULL)
    fn parse_comparison(&mut self) -> Result<Condition> {
        let column = self.parse_operand()?.to_string();

        let predicate = match self.current().token_type {
            TokenType::Is => {
                self.advance();
                let negated = self.match_token(TokenType::Not);
                self.expect(TokenType::Null)?;
                Predicate::IsNull { negated }
            }
            TokenType::Not => {
                self.advance();
                self.expect(TokenType::Like)?;
                Predicate::Like {
                    pattern: self.parse_like_pattern()?,
                    negated: true,
                }
            }
            TokenType::Like => {
                self.advance();
                Predicate::Like {
                    pattern: self.parse_like_pattern()?,
                    negated: false,
                }
            }
            _ => {
                let op = self.parse_compare_op()?;
                let value = self.parse_literal()?;
                Predicate::Compare { op, value }
            }
        };

        Ok(Condition::Comparison { column, predicate })
    }

    fn parse_like_pattern(&mut self) -> Result<String> {
        match self.parse_literal()? {
            Value::Null => Err(self.error("LIKE pattern")),
            other => Ok(other.to_string()),
        }
    }

    fn parse_compare_op(&mut self) -> Result<CompareOp> {
        let op = match self.current().token_type {
            TokenType::Eq => CompareOp::Eq,
            TokenType::Ne => CompareOp::Ne,
            TokenType::Lt => CompareOp::Lt,
            TokenType::Gt => CompareOp::Gt,
            TokenType::Le => CompareOp::Le,
            TokenType::Ge => CompareOp::Ge,
            _ => return Err(self.error("comparison operator")),
        };
        self.advance();
        Ok(op)
    }

    /// literal := ['-'|'+'] NUMBER | STRING | TRUE | FALSE | NULL
    fn parse_literal(&mut self) -> Result<Value> {
        let negative = if self.match_token(TokenType::Minus) {
            true
        } else {
            self.match_token(TokenType::Plus);
            false
        };

        let value = match self.current().token_type.clone() {
            TokenType::Number(digits) => {
                let text = if negative {
                    format!("-{}", digits)
                } else {
                    digits
                };
                let value = if text.contains('.') {
                    text.parse::<f64>().map(Value::Real).ok()
                } else {
                    text.parse::<i64>()
                        .map(Value::Integer)
                        .or_else(|_| text.parse::<f64>().map(Value::Real))
                        .ok()
                };
                value.ok_or_else(|| self.error("number"))?
            }
            TokenType::String(s) if !negative => Value::Text(s),
            TokenType::True if !negative => Value::Bool(true),
            TokenType::False if !negative => Value::Bool(false),
            TokenType::Null if !negative => Value::Null,
            _ => return Err(self.error("literal value")),
        };

        self.advance();
        Ok(value)
    }

    fn parse_literal_list(&mut self) -> Result<Vec<Value>> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_literal()?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(list)
    }

    // Helper methods

    fn parse_identifier(&mut self) -> Result<String> {
        if let TokenType::Identifier(name) = &self.current().token_type {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error("identifier"))
        }
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_identifier()?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(list)
    }

    fn parse_usize(&mut self) -> Result<usize> {
        let parsed = match &self.current().token_type {
            TokenType::Number(n) => n.parse::<usize>().ok(),
            _ => None,
        };
        match parsed {
            Some(n) => {
                self.advance();
                Ok(n)
            }
            None => Err(self.error("non-negative integer")),
        }
    }

    fn current(&self) -> &Token {
        // The lexer always terminates the stream with Eof
        &self.tokens[self.position.min(self.tokens.len().saturating_sub(1))]
    }

    fn peek(&self) -> &Token {
        &self.tokens[(self.position + 1).min(self.tokens.len().saturating_sub(1))]
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn match_token(&mut self, token_type: TokenType) -> bool {
        if std::mem::discriminant(&self.current().token_type) == std::mem::discriminant(&token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_keyword(&mut self, keyword: &str) -> bool {
        if let TokenType::Identifier(ref id) = self.current().token_type {
            if id.eq_ignore_ascii_case(keyword) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn expect(&mut self, token_type: TokenType) -> Result<()> {
        if std::mem::discriminant(&self.current().token_type) == std::mem::discriminant(&token_type) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&token_type.describe()))
        }
    }

    fn error(&self, expected: &str) -> EngineError {
        let token = self.current();
        EngineError::Parse {
            expected: expected.to_string(),
            found: token.token_type.describe(),
            offset: token.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(sql: &str) -> SelectStmt {
        match parse_sql(sql).unwrap() {
            Statement::Select(s) => s,
            other => panic!("Expected SELECT statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_select() {
        let s = select("SELECT * FROM users");
        assert_eq!(s.from.name, "users");
        assert_eq!(s.projection, Projection::Star);
        assert!(s.where_clause.is_none());
    }

    #[test]
    fn test_parse_select_with_where() {
        let s = select("SELECT id, name FROM users WHERE age > 18;");
        match &s.projection {
            Projection::Items(items) => assert_eq!(items.len(), 2),
            _ => panic!("Expected column list"),
        }
        assert_eq!(
            s.where_clause,
            Some(Condition::compare("age", CompareOp::Gt, Value::Integer(18)))
        );
    }

    #[test]
    fn test_parse_full_select() {
        let s = select(
            "SELECT DISTINCT u.name AS n, COUNT(DISTINCT o.id) total FROM users AS u \
             LEFT OUTER JOIN orders o ON u.id = o.user_id \
             WHERE u.age >= 18 AND NOT (u.name LIKE 'a%' OR u.email IS NULL) \
             GROUP BY u.name HAVING total > 1 ORDER BY total DESC, n LIMIT 10 OFFSET 5",
        );
        assert!(s.distinct);
        assert_eq!(s.from.binding(), "u");
        assert_eq!(s.joins.len(), 1);
        assert_eq!(s.joins[0].join_type, JoinType::Left);
        assert_eq!(s.joins[0].table.binding(), "o");
        assert_eq!(s.joins[0].left, ColumnRef::qualified("u", "id"));
        assert_eq!(s.joins[0].right, ColumnRef::qualified("o", "user_id"));
        assert_eq!(s.group_by, vec![ColumnRef::qualified("u", "name")]);
        assert!(s.having.is_some());
        assert_eq!(s.order_by.len(), 2);
        assert!(!s.order_by[0].asc);
        assert!(s.order_by[1].asc);
        assert_eq!(s.limit, Some(10));
        assert_eq!(s.offset, Some(5));
        assert!(s.is_aggregate());

        match &s.projection {
            Projection::Items(items) => {
                assert_eq!(items[0].output_name(), "n");
                assert_eq!(items[1].output_name(), "total");
            }
            _ => panic!("Expected column list"),
        }

        match s.where_clause.unwrap() {
            Condition::And(_, right) => match *right {
                Condition::Not(inner) => assert!(matches!(*inner, Condition::Or(_, _))),
                other => panic!("Expected NOT, got {:?}", other),
            },
            other => panic!("Expected AND, got {:?}", other),
        }
    }

    #[test]
    fn test_or_is_left_associative_and_binds_looser_than_and() {
        let s = select("SELECT * FROM t WHERE a = 1 OR b = 2 AND c = 3 OR d = 4");
        match s.where_clause.unwrap() {
            Condition::Or(left, right) => {
                assert!(matches!(*left, Condition::Or(_, _)));
                assert_eq!(*right, Condition::compare("d", CompareOp::Eq, Value::Integer(4)));
            }
            other => panic!("Expected OR, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_having_aggregate_operand() {
        let s = select("SELECT city, COUNT(*) FROM users GROUP BY city HAVING COUNT(*) >= 2");
        assert_eq!(
            s.having,
            Some(Condition::compare("COUNT(*)", CompareOp::Ge, Value::Integer(2)))
        );
    }

    #[test]
    fn test_parse_predicates() {
        let s = select("SELECT * FROM t WHERE a NOT LIKE '%x_' AND b IS NOT NULL AND c != -2.5");
        let cols = s.where_clause.as_ref().unwrap().columns();
        assert_eq!(cols, vec!["a", "b", "c"]);
        match s.where_clause.unwrap() {
            Condition::And(left, right) => {
                assert_eq!(
                    *right,
                    Condition::compare("c", CompareOp::Ne, Value::Real(-2.5))
                );
                match *left {
                    Condition::And(a, b) => {
                        assert_eq!(
                            *a,
                            Condition::Comparison {
                                column: "a".into(),
                                predicate: Predicate::Like {
                                    pattern: "%x_".into(),
                                    negated: true
                                }
                            }
                        );
                        assert_eq!(
                            *b,
                            Condition::Comparison {
                                column: "b".into(),
                                predicate: Predicate::IsNull { negated: true }
                            }
                        );
                    }
                    other => panic!("Expected AND, got {:?}", other),
                }
            }
            other => panic!("Expected AND, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_insert() {
        let stmt = parse_sql("INSERT INTO users (id, name) VALUES (1, 'John'), (2, NULL)").unwrap();
        match stmt {
            Statement::Insert(i) => {
                assert_eq!(i.table, "users");
                assert_eq!(i.columns.as_ref().unwrap().len(), 2);
                assert_eq!(i.values.len(), 2);
                assert_eq!(i.values[1], vec![Value::Integer(2), Value::Null]);
            }
            _ => panic!("Expected INSERT statement"),
        }
    }

    #[test]
    fn test_parse_update() {
        let stmt = parse_sql("UPDATE users SET name = 'Jane', active = TRUE WHERE id = 1").unwrap();
        match stmt {
            Statement::Update(u) => {
                assert_eq!(u.table, "users");
                assert_eq!(u.assignments.len(), 2);
                assert_eq!(u.assignments[1], ("active".to_string(), Value::Bool(true)));
                assert!(u.where_clause.is_some());
            }
            _ => panic!("Expected UPDATE statement"),
        }
    }

    #[test]
    fn test_parse_delete_without_where() {
        let stmt = parse_sql("DELETE FROM users").unwrap();
        match stmt {
            Statement::Delete(d) => {
                assert_eq!(d.table, "users");
                assert!(d.where_clause.is_none());
            }
            _ => panic!("Expected DELETE statement"),
        }
    }

    #[test]
    fn test_parse_create_table() {
        let stmt = parse_sql(
            "CREATE TABLE IF NOT EXISTS users (\
               email VARCHAR(255) NOT NULL UNIQUE, \
               age INT DEFAULT 18, \
               joined DATE, \
               code TEXT, \
               PRIMARY KEY (email), UNIQUE (code))",
        )
        .unwrap();
        match stmt {
            Statement::CreateTable(c) => {
                assert_eq!(c.table, "users");
                assert!(c.if_not_exists);
                assert_eq!(c.columns.len(), 4);
                assert_eq!(c.columns[0].data_type, ColumnType::Text);
                assert!(c.columns[0].primary_key && c.columns[0].not_null && c.columns[0].unique);
                assert_eq!(c.columns[1].default_value, Some(Value::Integer(18)));
                assert_eq!(c.columns[2].data_type, ColumnType::Date);
                assert!(c.columns[3].unique && !c.columns[3].primary_key);
            }
            _ => panic!("Expected CREATE TABLE statement"),
        }
    }

    #[test]
    fn test_parse_auto_increment_column() {
        match parse_sql("CREATE TABLE t (id INTEGER PRIMARY KEY AUTO_INCREMENT, v REAL)").unwrap() {
            Statement::CreateTable(c) => {
                assert!(c.columns[0].auto_increment);
                assert!(c.columns[0].primary_key);
                assert_eq!(c.columns[1].data_type, ColumnType::Real);
            }
            _ => panic!("Expected CREATE TABLE statement"),
        }
    }

    #[test]
    fn test_parse_create_index_and_drop() {
        match parse_sql("CREATE UNIQUE INDEX idx_a ON t (a, b)").unwrap() {
            Statement::CreateIndex(i) => {
                assert!(i.unique);
                assert_eq!(i.columns, vec!["a", "b"]);
                assert_eq!(i.table, "t");
            }
            _ => panic!("Expected CREATE INDEX statement"),
        }
        assert_eq!(
            parse_sql("DROP TABLE IF EXISTS t").unwrap(),
            Statement::DropTable(DropTableStmt {
                table: "t".into(),
                if_exists: true
            })
        );
    }

    #[test]
    fn test_parse_show_and_describe() {
        assert_eq!(parse_sql("SHOW TABLES").unwrap(), Statement::ShowTables);
        assert_eq!(
            parse_sql("describe users").unwrap(),
            Statement::DescribeTable("users".into())
        );
        assert_eq!(
            parse_sql("DESC users;").unwrap(),
            Statement::DescribeTable("users".into())
        );
    }

    #[test]
    fn test_parse_errors() {
        match parse_sql("SELECT FROM users") {
            Err(EngineError::Parse { expected, offset, .. }) => {
                assert_eq!(expected, "identifier");
                assert_eq!(offset, 7);
            }
            other => panic!("Expected parse error, got {:?}", other),
        }
        assert!(matches!(parse_sql("SELECT * FROM t; SELECT 1"), Err(EngineError::Parse { .. })));
        assert!(matches!(parse_sql("CREATE TABLE t (a BLOB)"), Err(EngineError::Parse { .. })));
        assert!(matches!(parse_sql("SELECT * FROM t LIMIT -1"), Err(EngineError::Parse { .. })));
        assert!(matches!(parse_sql("GRANT ALL"), Err(EngineError::Parse { .. })));
    }

    #[test]
    fn test_table_constraint_unknown_column() {
        assert!(matches!(
            parse_sql("CREATE TABLE t (a INTEGER, PRIMARY KEY (b))"),
            Err(EngineError::UnknownColumn { .. })
        ));
    }
}

/// Abstract Syntax Tree for SQL statements
use std::fmt;

use crate::types::{ColumnDef, Value};

/// Top-level SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStmt),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    CreateTable(CreateTableStmt),
    CreateIndex(CreateIndexStmt),
    DropTable(DropTableStmt),
    ShowTables,
    DescribeTable(String), // table name
}

impl Statement {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::Insert(_) => "INSERT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
            Statement::CreateTable(_) => "CREATE TABLE",
            Statement::CreateIndex(_) => "CREATE INDEX",
            Statement::DropTable(_) => "DROP TABLE",
            Statement::ShowTables => "SHOW TABLES",
            Statement::DescribeTable(_) => "DESCRIBE",
        }
    }
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub distinct: bool,
    pub projection: Projection,
    pub from: TableRef,
    pub joins: Vec<Join>,
    pub where_clause: Option<Condition>,
    pub group_by: Vec<ColumnRef>,
    pub having: Option<Condition>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SelectStmt {
    /// True when the query goes through grouping/aggregation
    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty()
            || match &self.projection {
                Projection::Star => false,
                Projection::Items(items) => items.iter().any(SelectItem::is_aggregate),
            }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Star,
    Items(Vec<SelectItem>),
}

/// Table reference in FROM or JOIN: table_name [[AS] alias]
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    /// Name used to qualify this table's columns
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Whether `qualifier` names this table (by alias or table name)
    pub fn is_named(&self, qualifier: &str) -> bool {
        qualifier == self.name || self.alias.as_deref() == Some(qualifier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

/// Column reference, optionally qualified: `col` or `t.col`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(t) => write!(f, "{}.{}", t, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(AggregateFunction::Count),
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateArg {
    Star,
    Column(ColumnRef),
}

/// Aggregate call: FUNC([DISTINCT] * | col)
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    pub function: AggregateFunction,
    pub argument: AggregateArg,
    pub distinct: bool,
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function.name())?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        match &self.argument {
            AggregateArg::Star => write!(f, "*")?,
            AggregateArg::Column(c) => write!(f, "{}", c)?,
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Column {
        column: ColumnRef,
        alias: Option<String>,
    },
    Aggregate {
        call: AggregateCall,
        alias: Option<String>,
    },
}

impl SelectItem {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, SelectItem::Aggregate { .. })
    }

    /// Output column name: the alias, else the item as written
    pub fn output_name(&self) -> String {
        match self {
            SelectItem::Column { alias: Some(a), .. } | SelectItem::Aggregate { alias: Some(a), .. } => {
                a.clone()
            }
            SelectItem::Column { column, .. } => column.to_string(),
            SelectItem::Aggregate { call, .. } => call.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub column: ColumnRef,
    pub asc: bool, // true = ASC, false = DESC
}

/// Comparison operator of a WHERE/HAVING leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        };
        f.write_str(op)
    }
}

/// Leaf test applied to one column
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare { op: CompareOp, value: Value },
    Like { pattern: String, negated: bool },
    IsNull { negated: bool },
}

/// WHERE / HAVING condition tree
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    Comparison { column: String, predicate: Predicate },
}

impl Condition {
    pub fn compare(column: impl Into<String>, op: CompareOp, value: Value) -> Self {
        Condition::Comparison {
            column: column.into(),
            predicate: Predicate::Compare { op, value },
        }
    }

    /// Every column name referenced by the tree
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::And(l, r) | Condition::Or(l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            Condition::Not(c) => c.collect_columns(out),
            Condition::Comparison { column, .. } => out.push(column),
        }
    }
}

/// INSERT statement
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub table: String,
    pub columns: Option<Vec<String>>, // None means all columns
    pub values: Vec<Vec<Value>>,      // Multiple rows
}

/// UPDATE statement
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    pub table: String,
    pub assignments: Vec<(String, Value)>,
    /// None means every row
    pub where_clause: Option<Condition>,
}

/// DELETE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub table: String,
    /// None means every row
    pub where_clause: Option<Condition>,
}

/// CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStmt {
    pub table: String,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
}

/// CREATE [UNIQUE] INDEX statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStmt {
    pub index_name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// DROP TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStmt {
    pub table: String,
    pub if_exists: bool,
}

/// Table metadata and schema definitions
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{TableId, Value};

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Text,
    Real,
    Boolean,
    /// ISO-8601 timestamp string
    Date,
}

impl ColumnType {
    /// Maps a SQL type name (any case) to a column type
    pub fn from_sql_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" | "BIGINT" | "SMALLINT" => Some(ColumnType::Integer),
            "TEXT" | "VARCHAR" | "CHAR" | "STRING" => Some(ColumnType::Text),
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" | "DECIMAL" => Some(ColumnType::Real),
            "BOOLEAN" | "BOOL" => Some(ColumnType::Boolean),
            "DATE" | "DATETIME" | "TIMESTAMP" => Some(ColumnType::Date),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Text => "TEXT",
            ColumnType::Real => "REAL",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Date => "DATE",
        };
        f.write_str(name)
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: ColumnType,
    pub primary_key: bool,
    pub unique: bool,
    pub not_null: bool,
    pub auto_increment: bool,
    pub default_value: Option<Value>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
            unique: false,
            not_null: false,
            auto_increment: false,
            default_value: None,
        }
    }

    /// The implicit `id INTEGER PRIMARY KEY AUTO_INCREMENT` column
    pub fn implicit_id() -> Self {
        Self::new("id", ColumnType::Integer).primary_key().auto_increment()
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.unique = true;
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// PRIMARY KEY or UNIQUE
    pub fn is_unique(&self) -> bool {
        self.primary_key || self.unique
    }
}

/// Secondary index definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name (unique within its table)
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDef {
    pub fn new(name: impl Into<String>, columns: Vec<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            columns,
            unique,
        }
    }
}

/// Table schema definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Assigned by the store on creation
    pub id: TableId,
    pub name: String,
    /// Column definitions (ordered)
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<IndexDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            columns,
            indexes: Vec::new(),
        }
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn primary_key(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.primary_key)
    }

    pub fn auto_increment_column(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.auto_increment)
    }

    pub fn get_index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn add_index(&mut self, index: IndexDef) {
        self.indexes.push(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(ColumnType::from_sql_name("int"), Some(ColumnType::Integer));
        assert_eq!(ColumnType::from_sql_name("VarChar"), Some(ColumnType::Text));
        assert_eq!(ColumnType::from_sql_name("datetime"), Some(ColumnType::Date));
        assert_eq!(ColumnType::from_sql_name("blob"), None);
        assert_eq!(ColumnType::Real.to_string(), "REAL");
    }

    #[test]
    fn test_implicit_id() {
        let id = ColumnDef::implicit_id();
        assert!(id.primary_key && id.auto_increment && id.not_null && id.is_unique());
        assert_eq!(id.data_type, ColumnType::Integer);
    }

    #[test]
    fn test_schema_lookup() {
        let mut schema = TableSchema::new(
            "users",
            vec![ColumnDef::implicit_id(), ColumnDef::new("name", ColumnType::Text)],
        );
        schema.add_index(IndexDef::new("idx_name", vec!["name".into()], false));
        assert_eq!(schema.primary_key().map(|c| c.name.as_str()), Some("id"));
        assert!(schema.has_column("name"));
        assert!(!schema.has_column("age"));
        assert!(schema.get_index("idx_name").is_some());
        assert_eq!(schema.column_names(), vec!["id", "name"]);
    }
}

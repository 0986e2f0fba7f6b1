//! Scalar values, rows and identifiers shared by the whole engine

mod table;

pub use table::{ColumnDef, ColumnType, IndexDef, TableSchema};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Scalar value stored in a row
///
/// Serializes as a plain JSON scalar; `Date` holds an ISO-8601 string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Date(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Date(_) => "DATE",
        }
    }

    /// Numeric view used by ordering comparisons and aggregates.
    /// Numeric strings count; booleans and dates do not.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
                }
            }
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Date(s) => Some(s),
            _ => None,
        }
    }

    /// Exact equality used by `=`/`!=` and JOIN ON.
    ///
    /// Integers and reals compare by numeric value, text and dates by string.
    /// Null equals nothing, not even another null.
    pub fn sql_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Integer(_) | Value::Real(_), Value::Integer(_) | Value::Real(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => match (self.as_str(), other.as_str()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Ordering used by `<`, `>`, `<=`, `>=`.
    ///
    /// Numeric when both sides are numbers (or numeric strings), otherwise
    /// lexicographic when both are text or dates. `None` means incomparable.
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.partial_cmp(&b);
        }
        match (self.as_str(), other.as_str()) {
            (Some(a), Some(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order for ORDER BY: nulls first, then booleans, numbers, strings.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Integer(_) | Value::Real(_) => 2,
                Value::Text(_) | Value::Date(_) => 3,
            }
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Integer(_) | Value::Real(_), Value::Integer(_) | Value::Real(_)) => {
                let a = self.as_f64().unwrap_or(f64::NAN);
                let b = other.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
            _ => match (self.as_str(), other.as_str()) {
                (Some(a), Some(b)) => a.cmp(b),
                _ => rank(self).cmp(&rank(other)),
            },
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.sql_cmp(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) | Value::Date(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// A SQL row: column name -> value
pub type SqlRow = std::collections::HashMap<String, Value>;

/// Row identifier assigned by the store
pub type RowId = u64;

/// Table identifier assigned by the store
pub type TableId = u64;

/// A stored row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    pub table_id: TableId,
    pub data: SqlRow,
}

impl Row {
    pub fn get(&self, column: &str) -> &Value {
        self.data.get(column).unwrap_or(&Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_eq_mixed_numeric() {
        assert!(Value::Integer(1).sql_eq(&Value::Real(1.0)));
        assert!(!Value::Integer(1).sql_eq(&Value::Text("1".into())));
        assert!(!Value::Null.sql_eq(&Value::Null));
        assert!(Value::Date("2024-01-01".into()).sql_eq(&Value::Text("2024-01-01".into())));
    }

    #[test]
    fn test_sql_cmp() {
        assert_eq!(Value::Integer(30).sql_cmp(&Value::Integer(25)), Some(Ordering::Greater));
        assert_eq!(Value::Text("10".into()).sql_cmp(&Value::Integer(9)), Some(Ordering::Greater));
        assert_eq!(Value::Text("b".into()).sql_cmp(&Value::Text("a".into())), Some(Ordering::Greater));
        assert_eq!(Value::Bool(true).sql_cmp(&Value::Integer(1)), None);
        assert_eq!(Value::Null.sql_cmp(&Value::Integer(1)), None);
    }

    #[test]
    fn test_sort_cmp_nulls_first() {
        let mut values = vec![Value::Integer(3), Value::Null, Value::Real(1.5), Value::Text("a".into())];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(
            values,
            vec![Value::Null, Value::Real(1.5), Value::Integer(3), Value::Text("a".into())]
        );
    }

    #[test]
    fn test_display_and_json() {
        assert_eq!(Value::Real(2.0).to_string(), "2");
        assert_eq!(Value::Real(1.5).to_string(), "1.5");
        let json = serde_json::to_string(&vec![Value::Integer(1), Value::Null, Value::Text("x".into())]).unwrap();
        assert_eq!(json, r#"[1,null,"x"]"#);
    }
}

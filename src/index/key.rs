//! Structural index keys
//!
//! A key is the tuple of a row's values for the index columns. Parts compare
//! with a total order (null < bool < number < text/date), so composite keys
//! never depend on string concatenation or separator characters.

use std::cmp::Ordering;
use std::fmt;

use crate::types::{SqlRow, Value};

#[derive(Debug, Clone)]
pub struct IndexKey(Vec<Value>);

impl IndexKey {
    pub fn new(parts: Vec<Value>) -> Self {
        Self(parts)
    }

    /// Single-column key
    pub fn scalar(value: Value) -> Self {
        Self(vec![value])
    }

    /// Key of `row` over `columns`; missing columns read as null
    pub fn from_row(columns: &[String], row: &SqlRow) -> Self {
        Self(
            columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }

    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match a.sort_cmp(b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

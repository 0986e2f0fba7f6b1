//! Error types for the playsql engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Lex error: {message} at offset {offset}")]
    Lex { message: String, offset: usize },

    #[error("Parse error: expected {expected}, found {found} at offset {offset}")]
    Parse {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("{}", unknown_table_message(.name, .known, .suggestion))]
    UnknownTable {
        name: String,
        known: Vec<String>,
        suggestion: Option<String>,
    },

    #[error("Column '{column}' does not exist in {table}. Available columns: {}", .known.join(", "))]
    UnknownColumn {
        column: String,
        table: String,
        known: Vec<String>,
    },

    #[error("Semantic error: {0}")]
    Semantic(String),

    #[error("Type error: cannot convert {value} to {expected} for column '{column}'")]
    Type {
        column: String,
        value: String,
        expected: String,
    },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Rate limit exceeded, retry after {retry_after_seconds}s")]
    RateLimitExceeded { retry_after_seconds: u64 },

    #[error("Query timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

fn unknown_table_message(name: &str, known: &[String], suggestion: &Option<String>) -> String {
    let mut msg = format!("Table '{}' does not exist.", name);
    if let Some(s) = suggestion {
        msg.push_str(&format!(" Did you mean '{}'?", s));
    }
    if known.is_empty() {
        msg.push_str(" No tables exist yet.");
    } else {
        msg.push_str(&format!(" Available tables: {}", known.join(", ")));
    }
    msg
}

/// Category reported in a failed `QueryResult`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    LexError,
    ParseError,
    SemanticError,
    TypeError,
    ConstraintViolation,
    RateLimitExceeded,
    TimeoutError,
    StoreError,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Lex { .. } => ErrorKind::LexError,
            EngineError::Parse { .. } => ErrorKind::ParseError,
            EngineError::UnknownTable { .. }
            | EngineError::UnknownColumn { .. }
            | EngineError::Semantic(_) => ErrorKind::SemanticError,
            EngineError::Type { .. } => ErrorKind::TypeError,
            EngineError::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            EngineError::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            EngineError::Timeout { .. } => ErrorKind::TimeoutError,
            EngineError::Store(_) => ErrorKind::StoreError,
        }
    }

    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            EngineError::RateLimitExceeded {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }

    /// Builds an unknown-table error, picking the first known name that
    /// contains (or is contained in) the requested one.
    pub fn unknown_table(name: &str, mut known: Vec<String>) -> Self {
        known.sort();
        let needle = name.to_lowercase();
        let suggestion = known
            .iter()
            .find(|k| {
                let k = k.to_lowercase();
                k.contains(&needle) || needle.contains(&k)
            })
            .cloned();
        EngineError::UnknownTable {
            name: name.to_string(),
            known,
            suggestion,
        }
    }

    pub fn unknown_column(column: &str, table: &str, known: Vec<String>) -> Self {
        EngineError::UnknownColumn {
            column: column.to_string(),
            table: format!("table '{}'", table),
            known,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_table_suggestion() {
        let err = EngineError::unknown_table("user", vec!["orders".into(), "users".into()]);
        match &err {
            EngineError::UnknownTable { suggestion, known, .. } => {
                assert_eq!(suggestion.as_deref(), Some("users"));
                assert_eq!(known.len(), 2);
            }
            _ => panic!("Expected UnknownTable"),
        }
        let msg = err.to_string();
        assert!(msg.contains("Did you mean 'users'?"));
        assert!(msg.contains("orders, users"));
    }

    #[test]
    fn test_unknown_table_without_tables() {
        let err = EngineError::unknown_table("ghost", vec![]);
        assert!(err.to_string().contains("No tables exist yet"));
        assert_eq!(err.kind(), ErrorKind::SemanticError);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            EngineError::RateLimitExceeded { retry_after_seconds: 3 }.kind(),
            ErrorKind::RateLimitExceeded
        );
        assert_eq!(
            EngineError::RateLimitExceeded { retry_after_seconds: 3 }.retry_after_seconds(),
            Some(3)
        );
        assert_eq!(EngineError::Timeout { timeout_ms: 10 }.kind(), ErrorKind::TimeoutError);
        assert_eq!(
            EngineError::from(StoreError::Backend("down".into())).kind(),
            ErrorKind::StoreError
        );
    }
}

/// Query result envelope returned to callers
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ErrorKind};
use crate::types::{SqlRow, Value};

/// What a statement produced, before timing is attached
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutput {
    /// SELECT / SHOW TABLES / DESCRIBE
    Rows {
        columns: Vec<String>,
        rows: Vec<SqlRow>,
    },
    /// INSERT / UPDATE / DELETE
    Modification {
        affected_rows: usize,
        message: String,
        warning: Option<String>,
    },
    /// CREATE / DROP
    Definition { message: String },
}

/// Structured, serializable result of one `execute` call.
///
/// Failures never escape as errors: they are flattened into
/// `success: false` with an `error_kind` and a descriptive message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<SqlRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    /// Set when UPDATE/DELETE ran without WHERE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn from_output(output: ExecutionOutput, execution_time_ms: u64) -> Self {
        let base = QueryResult {
            success: true,
            rows: None,
            columns: None,
            row_count: None,
            message: None,
            error_kind: None,
            retry_after_seconds: None,
            warning: None,
            execution_time_ms,
        };

        match output {
            ExecutionOutput::Rows { columns, rows } => QueryResult {
                row_count: Some(rows.len()),
                rows: Some(rows),
                columns: Some(columns),
                ..base
            },
            ExecutionOutput::Modification {
                affected_rows,
                message,
                warning,
            } => QueryResult {
                row_count: Some(affected_rows),
                message: Some(message),
                warning,
                ..base
            },
            ExecutionOutput::Definition { message } => QueryResult {
                message: Some(message),
                ..base
            },
        }
    }

    pub fn from_error(error: &EngineError, execution_time_ms: u64) -> Self {
        QueryResult {
            success: false,
            rows: None,
            columns: None,
            row_count: None,
            message: Some(error.to_string()),
            error_kind: Some(error.kind()),
            retry_after_seconds: error.retry_after_seconds(),
            warning: None,
            execution_time_ms,
        }
    }

    /// Values of one output column, in row order
    pub fn column_values(&self, column: &str) -> Vec<Value> {
        self.rows
            .iter()
            .flatten()
            .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_envelope() {
        let mut row = SqlRow::new();
        row.insert("age".into(), Value::Integer(30));
        let result = QueryResult::from_output(
            ExecutionOutput::Rows {
                columns: vec!["age".into()],
                rows: vec![row],
            },
            3,
        );
        assert!(result.success);
        assert_eq!(result.row_count, Some(1));
        assert_eq!(result.column_values("age"), vec![Value::Integer(30)]);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["rowCount"], 1);
        assert_eq!(json["executionTimeMs"], 3);
        assert_eq!(json["rows"][0]["age"], 30);
        assert!(json.get("errorKind").is_none());
    }

    #[test]
    fn test_error_envelope() {
        let err = EngineError::RateLimitExceeded { retry_after_seconds: 12 };
        let result = QueryResult::from_error(&err, 0);
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::RateLimitExceeded));
        assert_eq!(result.retry_after_seconds, Some(12));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["errorKind"], "RateLimitExceeded");
        assert_eq!(json["retryAfterSeconds"], 12);
    }
}

//! Table store abstraction
//!
//! The engine never owns data: rows and schemas live behind [`TableStore`],
//! which is typically backed by a remote database. Every call may suspend.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::sql::QueryResult;
use crate::types::{IndexDef, Row, RowId, SqlRow, TableId, TableSchema};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Opaque failure from the persistence layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("table {0} not found")]
    TableNotFound(TableId),

    #[error("row {0} not found")]
    RowNotFound(RowId),

    #[error("table '{0}' already exists")]
    TableExists(String),

    #[error("{0}")]
    Backend(String),
}

/// One audit record per executed statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLogEntry {
    pub caller: String,
    pub sql: String,
    pub success: bool,
    pub row_count: Option<usize>,
    pub error_kind: Option<ErrorKind>,
    pub message: Option<String>,
    pub execution_time_ms: u64,
    /// RFC 3339 timestamp
    pub logged_at: String,
}

impl QueryLogEntry {
    pub fn new(caller: &str, sql: &str, result: &QueryResult) -> Self {
        Self {
            caller: caller.to_string(),
            sql: sql.to_string(),
            success: result.success,
            row_count: result.row_count,
            error_kind: result.error_kind,
            message: result.message.clone(),
            execution_time_ms: result.execution_time_ms,
            logged_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Row-oriented table store used by the executor
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn get_table_by_name(&self, name: &str) -> StoreResult<Option<TableSchema>>;

    /// Names of every table, used by SHOW TABLES and unknown-table hints
    async fn list_table_names(&self) -> StoreResult<Vec<String>>;

    /// Persists a new table and returns its id
    async fn create_table(&self, schema: TableSchema) -> StoreResult<TableId>;

    /// Removes the table and all of its rows
    async fn drop_table(&self, table_id: TableId) -> StoreResult<()>;

    async fn count_tables(&self) -> StoreResult<usize>;

    async fn insert_row(&self, table_id: TableId, data: SqlRow) -> StoreResult<RowId>;

    /// Every row of the table in insertion order
    async fn select_rows(&self, table_id: TableId) -> StoreResult<Vec<Row>>;

    /// Replaces the row's data
    async fn update_row(&self, row_id: RowId, data: SqlRow) -> StoreResult<()>;

    async fn delete_row(&self, row_id: RowId) -> StoreResult<()>;

    /// Replaces the table's index definitions
    async fn update_table_indexes(&self, table_id: TableId, indexes: Vec<IndexDef>) -> StoreResult<()>;

    /// Best-effort audit sink
    async fn append_query_log(&self, entry: QueryLogEntry) -> StoreResult<()>;
}

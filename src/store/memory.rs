/// In-process table store
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{QueryLogEntry, StoreError, StoreResult, TableStore};
use crate::types::{IndexDef, Row, RowId, SqlRow, TableId, TableSchema};

#[derive(Debug, Default)]
struct MemoryState {
    /// Table id -> schema
    tables: HashMap<TableId, TableSchema>,
    /// Table name -> table id
    names: HashMap<String, TableId>,
    /// Row id -> row (ids increase, so iteration is insertion order)
    rows: BTreeMap<RowId, Row>,
    query_log: Vec<QueryLogEntry>,
    next_table_id: TableId,
    next_row_id: RowId,
}

/// `TableStore` kept entirely in memory
///
/// Used by the CLI and tests. Optional latency and audit-log failure
/// injection exercise the engine's timeout and best-effort logging paths.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    latency: Option<Duration>,
    fail_query_log: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState {
                next_table_id: 1,
                next_row_id: 1,
                ..Default::default()
            }),
            latency: None,
            fail_query_log: AtomicBool::new(false),
        }
    }

    /// Every call sleeps for `latency` first
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make `append_query_log` fail from now on
    pub fn fail_query_log(&self, fail: bool) {
        self.fail_query_log.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the audit log
    pub fn query_log(&self) -> Vec<QueryLogEntry> {
        self.state.read().query_log.clone()
    }

    pub fn row_count(&self, table_id: TableId) -> usize {
        self.state
            .read()
            .rows
            .values()
            .filter(|r| r.table_id == table_id)
            .count()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn get_table_by_name(&self, name: &str) -> StoreResult<Option<TableSchema>> {
        self.simulate_latency().await;
        let state = self.state.read();
        Ok(state
            .names
            .get(name)
            .and_then(|id| state.tables.get(id))
            .cloned())
    }

    async fn list_table_names(&self) -> StoreResult<Vec<String>> {
        self.simulate_latency().await;
        let mut names: Vec<String> = self.state.read().names.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_table(&self, mut schema: TableSchema) -> StoreResult<TableId> {
        self.simulate_latency().await;
        let mut state = self.state.write();

        if state.names.contains_key(&schema.name) {
            return Err(StoreError::TableExists(schema.name));
        }

        let id = state.next_table_id;
        state.next_table_id += 1;
        schema.id = id;
        state.names.insert(schema.name.clone(), id);
        state.tables.insert(id, schema);

        Ok(id)
    }

    async fn drop_table(&self, table_id: TableId) -> StoreResult<()> {
        self.simulate_latency().await;
        let mut state = self.state.write();

        let schema = state
            .tables
            .remove(&table_id)
            .ok_or(StoreError::TableNotFound(table_id))?;
        state.names.remove(&schema.name);
        state.rows.retain(|_, row| row.table_id != table_id);

        Ok(())
    }

    async fn count_tables(&self) -> StoreResult<usize> {
        self.simulate_latency().await;
        Ok(self.state.read().tables.len())
    }

    async fn insert_row(&self, table_id: TableId, data: SqlRow) -> StoreResult<RowId> {
        self.simulate_latency().await;
        let mut state = self.state.write();

        if !state.tables.contains_key(&table_id) {
            return Err(StoreError::TableNotFound(table_id));
        }

        let id = state.next_row_id;
        state.next_row_id += 1;
        state.rows.insert(id, Row { id, table_id, data });

        Ok(id)
    }

    async fn select_rows(&self, table_id: TableId) -> StoreResult<Vec<Row>> {
        self.simulate_latency().await;
        let state = self.state.read();

        if !state.tables.contains_key(&table_id) {
            return Err(StoreError::TableNotFound(table_id));
        }

        Ok(state
            .rows
            .values()
            .filter(|row| row.table_id == table_id)
            .cloned()
            .collect())
    }

    async fn update_row(&self, row_id: RowId, data: SqlRow) -> StoreResult<()> {
        self.simulate_latency().await;
        let mut state = self.state.write();
        let row = state.rows.get_mut(&row_id).ok_or(StoreError::RowNotFound(row_id))?;
        row.data = data;
        Ok(())
    }

    async fn delete_row(&self, row_id: RowId) -> StoreResult<()> {
        self.simulate_latency().await;
        self.state
            .write()
            .rows
            .remove(&row_id)
            .map(|_| ())
            .ok_or(StoreError::RowNotFound(row_id))
    }

    async fn update_table_indexes(&self, table_id: TableId, indexes: Vec<IndexDef>) -> StoreResult<()> {
        self.simulate_latency().await;
        let mut state = self.state.write();
        let schema = state
            .tables
            .get_mut(&table_id)
            .ok_or(StoreError::TableNotFound(table_id))?;
        schema.indexes = indexes;
        Ok(())
    }

    async fn append_query_log(&self, entry: QueryLogEntry) -> StoreResult<()> {
        if self.fail_query_log.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("query log unavailable".into()));
        }
        self.state.write().query_log.push(entry);
        Ok(())
    }
}

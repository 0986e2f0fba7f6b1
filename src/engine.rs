//! Public execution boundary
//!
//! `Engine::execute` runs one SQL string end to end: rate limit, parse,
//! execute under the statement timeout, then wrap the outcome in a
//! `QueryResult`. Errors never escape; they are flattened into the envelope.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::governor::{Governor, RemoteRateLimiter};
use crate::index::IndexCache;
use crate::sql::{parse_sql, ExecutionOutput, ExprEvaluator, QueryExecutor, QueryResult};
use crate::store::{QueryLogEntry, TableStore};

/// Caller identity used by [`Engine::execute`]
pub const DEFAULT_CALLER: &str = "anonymous";

pub struct Engine<S: TableStore> {
    store: Arc<S>,
    config: EngineConfig,
    governor: Governor,
    indexes: IndexCache,
    evaluator: ExprEvaluator,
}

impl<S: TableStore + 'static> Engine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self::with_shared_store(Arc::new(store), config)
    }

    /// Engine over a store that the caller keeps a handle to
    pub fn with_shared_store(store: Arc<S>, config: EngineConfig) -> Self {
        let governor = Governor::new(&config);
        Self {
            store,
            config,
            governor,
            indexes: IndexCache::new(),
            evaluator: ExprEvaluator::new(),
        }
    }

    /// Consult `remote` before the local rate-limit window
    pub fn with_remote_limiter(mut self, remote: Arc<dyn RemoteRateLimiter>) -> Self {
        self.governor = Governor::new(&self.config).with_remote_limiter(remote);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn indexes(&self) -> &IndexCache {
        &self.indexes
    }

    pub fn governor(&self) -> &Governor {
        &self.governor
    }

    pub async fn execute(&self, sql: &str) -> QueryResult {
        self.execute_as(DEFAULT_CALLER, sql).await
    }

    /// Execute `sql` on behalf of `caller`, whose rate-limit window is charged
    pub async fn execute_as(&self, caller: &str, sql: &str) -> QueryResult {
        let start = Instant::now();
        let outcome = self.run(caller, sql).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(output) => QueryResult::from_output(output, elapsed_ms),
            Err(e) => {
                debug!(caller, kind = ?e.kind(), error = %e, "statement failed");
                QueryResult::from_error(&e, elapsed_ms)
            }
        };

        if self.config.audit_log {
            self.audit(caller, sql, &result);
        }

        result
    }

    async fn run(&self, caller: &str, sql: &str) -> Result<ExecutionOutput> {
        self.governor.check_rate_limit(caller).await?;

        let statement = parse_sql(sql)?;
        let kind = statement.kind();

        let deadline = self.governor.deadline();
        let executor = QueryExecutor::new(
            self.store.as_ref(),
            &self.governor,
            &self.indexes,
            &self.evaluator,
            deadline,
        );
        let output = self
            .governor
            .with_timeout(deadline, executor.execute(statement))
            .await?;

        debug!(caller, kind, "statement succeeded");
        Ok(output)
    }

    /// Fire-and-forget write to the store's query log
    fn audit(&self, caller: &str, sql: &str, result: &QueryResult) {
        let entry = QueryLogEntry::new(caller, sql, result);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.append_query_log(entry).await {
                warn!(error = %e, "failed to append query log entry");
            }
        });
    }
}

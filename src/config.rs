//! Engine configuration
//!
//! Governs the resource limits applied to every statement: rate limiting,
//! table/row quotas and the query timeout.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Rolling-window rate limit applied per caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Statements allowed per window (default: 60)
    pub max_queries_per_window: u32,

    /// Window length in seconds (default: 60)
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_queries_per_window: 60,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Maximum number of tables in the store (default: 10)
    pub max_tables: usize,

    /// Maximum rows per table (default: 1000)
    pub max_rows_per_table: usize,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_tables: 10,
            max_rows_per_table: 1000,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rate_limit: RateLimitConfig,

    pub quotas: QuotaConfig,

    /// Whole-statement timeout in milliseconds (default: 5000)
    pub query_timeout_ms: u64,

    /// Send every statement to the store's query log
    pub audit_log: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            quotas: QuotaConfig::default(),
            query_timeout_ms: 5000,
            audit_log: true,
        }
    }
}

impl EngineConfig {
    /// Generous limits for unit tests
    pub fn for_testing() -> Self {
        Self {
            rate_limit: RateLimitConfig {
                max_queries_per_window: 10_000,
                window_secs: 60,
            },
            quotas: QuotaConfig {
                max_tables: 100,
                max_rows_per_table: 10_000,
            },
            query_timeout_ms: 5000,
            audit_log: true,
        }
    }

    /// Effectively no limits (CLI default)
    pub fn unlimited() -> Self {
        Self {
            rate_limit: RateLimitConfig {
                max_queries_per_window: u32::MAX,
                window_secs: 60,
            },
            quotas: QuotaConfig {
                max_tables: usize::MAX,
                max_rows_per_table: usize::MAX,
            },
            query_timeout_ms: 60_000,
            audit_log: false,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| EngineError::Semantic(format!("invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.max_queries_per_window == 0 {
            return Err(EngineError::Semantic(
                "rate_limit.max_queries_per_window must be > 0".into(),
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(EngineError::Semantic("rate_limit.window_secs must be > 0".into()));
        }
        if self.quotas.max_tables == 0 || self.quotas.max_rows_per_table == 0 {
            return Err(EngineError::Semantic("quotas must be > 0".into()));
        }
        if self.query_timeout_ms == 0 {
            return Err(EngineError::Semantic("query_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
        assert_eq!(config.quotas.max_rows_per_table, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(r#"{"quotas": {"max_tables": 3}, "query_timeout_ms": 250}"#)
            .unwrap();
        assert_eq!(config.quotas.max_tables, 3);
        assert_eq!(config.quotas.max_rows_per_table, 1000);
        assert_eq!(config.query_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(EngineConfig::from_json(r#"{"rate_limit": {"max_queries_per_window": 0}}"#).is_err());
        assert!(EngineConfig::from_json(r#"{"query_timeout_ms": 0}"#).is_err());
    }
}

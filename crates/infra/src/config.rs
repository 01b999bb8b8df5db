//! Worker configuration from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `RASEED_STORE` | `memory` (`memory`\|`postgres`) |
//! | `DATABASE_URL` | required for `postgres` |
//! | `RASEED_BUS` | `memory` (`memory`\|`redis`) |
//! | `REDIS_URL` | required for `redis` |
//! | `RASEED_CONSUMER` | `raseed-worker` (Redis consumer name) |
//! | `GEMINI_API_KEY` | required |
//! | `GEMINI_MODEL` | `gemini-1.5-flash` |
//! | `GEMINI_VISION_MODEL` | `GEMINI_MODEL` |
//! | `GEMINI_BASE_URL` | public endpoint |
//! | `RASEED_EXTRACTION_TIMEOUT_SECS` | `60` |
//! | `RASEED_MAX_CONCURRENT` | `4` (at most 1024) |
//! | `RASEED_MAX_DELIVERIES` | `5` |
//! | `RASEED_RETRY_BASE_MS` | `250` |
//! | `RASEED_LOG_FORMAT` | `json` (`json`\|`pretty`) |

use core::str::FromStr;
use std::time::Duration;

use raseed_extraction::{DEFAULT_EXTRACTION_TIMEOUT, DEFAULT_MODEL};
use raseed_observability::LogFormat;

use crate::workers::{MAX_CONCURRENT_LIMIT, WorkerOptions};

/// Which document store backs the pipelines.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store {other:?} (expected memory|postgres)")),
        }
    }
}

/// Which transport the workers drain.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BusBackend {
    /// In-process only; nothing outside the worker can publish to it.
    #[default]
    Memory,
    Redis,
}

impl FromStr for BusBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BusBackend::Memory),
            "redis" => Ok(BusBackend::Redis),
            other => Err(format!("unknown bus {other:?} (expected memory|redis)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub bus: BusBackend,
    pub redis_url: Option<String>,
    pub redis_consumer: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_vision_model: Option<String>,
    pub gemini_base_url: Option<String>,
    pub extraction_timeout: Duration,
    pub max_concurrent: usize,
    pub max_deliveries: u32,
    pub retry_base: Duration,
    pub log_format: LogFormat,
    /// Values that were present but unusable and fell back to defaults. Collected
    /// rather than logged because configuration is read before logging is set up.
    pub warnings: Vec<String>,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut warnings = Vec::new();

        let mut parsed = |key: &str, default: u64| -> u64 {
            match var(key) {
                None => default,
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(value) if value > 0 => value,
                    _ => {
                        warnings.push(format!("{key}={raw:?} is not a positive integer; using {default}"));
                        default
                    }
                },
            }
        };

        let extraction_timeout =
            Duration::from_secs(parsed("RASEED_EXTRACTION_TIMEOUT_SECS", DEFAULT_EXTRACTION_TIMEOUT.as_secs()));
        let requested_concurrency = parsed("RASEED_MAX_CONCURRENT", 4);
        let max_deliveries = u32::try_from(parsed("RASEED_MAX_DELIVERIES", 5)).unwrap_or(u32::MAX);
        let retry_base = Duration::from_millis(parsed("RASEED_RETRY_BASE_MS", 250));

        let max_concurrent = match usize::try_from(requested_concurrency) {
            Ok(n) if n <= MAX_CONCURRENT_LIMIT => n,
            _ => {
                warnings.push(format!(
                    "RASEED_MAX_CONCURRENT={requested_concurrency} exceeds {MAX_CONCURRENT_LIMIT}; using {MAX_CONCURRENT_LIMIT}"
                ));
                MAX_CONCURRENT_LIMIT
            }
        };

        let store = match var("RASEED_STORE").map(|raw| raw.parse::<StoreBackend>()) {
            None => StoreBackend::default(),
            Some(Ok(store)) => store,
            Some(Err(e)) => {
                warnings.push(format!("RASEED_STORE: {e}; using memory"));
                StoreBackend::default()
            }
        };

        let bus = match var("RASEED_BUS").map(|raw| raw.parse::<BusBackend>()) {
            None => BusBackend::default(),
            Some(Ok(bus)) => bus,
            Some(Err(e)) => {
                warnings.push(format!("RASEED_BUS: {e}; using memory"));
                BusBackend::default()
            }
        };

        let log_format = match var("RASEED_LOG_FORMAT").map(|raw| raw.parse::<LogFormat>()) {
            None => LogFormat::default(),
            Some(Ok(format)) => format,
            Some(Err(e)) => {
                warnings.push(format!("RASEED_LOG_FORMAT: {e}; using json"));
                LogFormat::default()
            }
        };

        Self {
            store,
            database_url: var("DATABASE_URL"),
            bus,
            redis_url: var("REDIS_URL"),
            redis_consumer: var("RASEED_CONSUMER").unwrap_or_else(|| "raseed-worker".to_string()),
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_vision_model: var("GEMINI_VISION_MODEL"),
            gemini_base_url: var("GEMINI_BASE_URL"),
            extraction_timeout,
            max_concurrent,
            max_deliveries,
            retry_base,
            log_format,
            warnings,
        }
    }

    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            max_concurrent: self.max_concurrent,
            retry_base: self.retry_base,
            ..WorkerOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> WorkerConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let c = config(&[]);
        assert_eq!(c.store, StoreBackend::Memory);
        assert_eq!(c.bus, BusBackend::Memory);
        assert_eq!(c.redis_consumer, "raseed-worker");
        assert_eq!(c.gemini_model, "gemini-1.5-flash");
        assert_eq!(c.extraction_timeout, Duration::from_secs(60));
        assert_eq!(c.max_concurrent, 4);
        assert_eq!(c.max_deliveries, 5);
        assert_eq!(c.retry_base, Duration::from_millis(250));
        assert_eq!(c.log_format, LogFormat::Json);
        assert!(c.gemini_api_key.is_none());
        assert!(c.warnings.is_empty());
    }

    #[test]
    fn reads_overrides() {
        let c = config(&[
            ("RASEED_STORE", "postgres"),
            ("DATABASE_URL", "postgres://localhost/raseed"),
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_VISION_MODEL", "gemini-pro-vision"),
            ("RASEED_MAX_CONCURRENT", "8"),
            ("RASEED_LOG_FORMAT", "pretty"),
            ("RASEED_BUS", "Redis"),
            ("REDIS_URL", "redis://cache:6379"),
            ("RASEED_CONSUMER", "worker-a"),
        ]);
        assert_eq!(c.bus, BusBackend::Redis);
        assert_eq!(c.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(c.redis_consumer, "worker-a");
        assert_eq!(c.store, StoreBackend::Postgres);
        assert_eq!(c.database_url.as_deref(), Some("postgres://localhost/raseed"));
        assert_eq!(c.gemini_vision_model.as_deref(), Some("gemini-pro-vision"));
        assert_eq!(c.worker_options().max_concurrent, 8);
        assert_eq!(c.log_format, LogFormat::Pretty);
    }

    #[test]
    fn invalid_values_fall_back_with_warnings() {
        let c = config(&[
            ("RASEED_MAX_CONCURRENT", "lots"),
            ("RASEED_RETRY_BASE_MS", "0"),
            ("RASEED_STORE", "redis"),
            ("RASEED_BUS", "kafka"),
        ]);
        assert_eq!(c.max_concurrent, 4);
        assert_eq!(c.retry_base, Duration::from_millis(250));
        assert_eq!(c.store, StoreBackend::Memory);
        assert_eq!(c.bus, BusBackend::Memory);
        assert_eq!(c.warnings.len(), 4);
    }

    #[test]
    fn oversized_concurrency_is_clamped() {
        let c = config(&[("RASEED_MAX_CONCURRENT", "4294967297")]);
        assert_eq!(c.max_concurrent, MAX_CONCURRENT_LIMIT);
        assert_eq!(c.worker_options().max_concurrent, MAX_CONCURRENT_LIMIT);
        assert_eq!(c.warnings.len(), 1);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let c = config(&[("GEMINI_API_KEY", "  "), ("GEMINI_MODEL", "")]);
        assert!(c.gemini_api_key.is_none());
        assert_eq!(c.gemini_model, "gemini-1.5-flash");
    }
}

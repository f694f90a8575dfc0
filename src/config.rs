//! Router configuration loading from environment variables.
//!
//! All values are loaded from `ADASPLIT_*` environment variables with
//! sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `ADASPLIT_WORKERS` | (empty) | Comma list: `url` or `url\|long` / `url\|short` |
//! | `ADASPLIT_WORKER_CONCURRENCY_LIMIT` | 8 | Max in-flight requests per worker |
//! | `ADASPLIT_SCALE_UP_THRESHOLD` | 10 | Long backlog high watermark |
//! | `ADASPLIT_SCALE_DOWN_THRESHOLD` | 2 | Long backlog low watermark |
//! | `ADASPLIT_REBALANCE_COOLDOWN_SECS` | 5 | Hysteresis cooldown between pool moves |
//! | `ADASPLIT_STEAL_COOLDOWN_SECS` | 2 | Continuous idle time before a steal |
//! | `ADASPLIT_MIN_WORKERS_PER_POOL` | 1 | Guardrail lower bound per pool |
//! | `ADASPLIT_TICK_MILLIS` | 1000 | Macro tick / dispatch re-scan interval |
//! | `ADASPLIT_MAX_QUEUE_DEPTH` | 0 | Per-queue cap (0 = unbounded) |
//! | `ADASPLIT_CLASSIFY_THRESHOLD` | 3000 | Long/short token threshold |

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::scheduler::Pool;

/// One configured worker endpoint with an optional initial pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub endpoint: String,
    pub pool: Option<Pool>,
}

/// Configuration errors. Raised at construction, never mid-flight.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no workers configured")]
    NoWorkers,

    #[error("invalid worker entry: {0:?}")]
    InvalidWorkerEntry(String),
}

/// Full router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub workers: Vec<WorkerSpec>,
    pub worker_capacity: usize,
    pub scale_up_threshold: usize,
    pub scale_down_threshold: usize,
    pub rebalance_cooldown: Duration,
    pub steal_cooldown: Duration,
    pub min_workers_per_pool: usize,
    pub tick_interval: Duration,
    /// Per-queue depth cap. `None` (the default) means callers are never
    /// rejected for backlog; growth is the rebalance signal instead.
    pub max_queue_depth: Option<usize>,
    pub classify_threshold_tokens: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            workers: Vec::new(),
            worker_capacity: 8,
            scale_up_threshold: 10,
            scale_down_threshold: 2,
            rebalance_cooldown: Duration::from_secs(5),
            steal_cooldown: Duration::from_secs(2),
            min_workers_per_pool: 1,
            tick_interval: Duration::from_millis(1000),
            max_queue_depth: None,
            classify_threshold_tokens: 3000,
        }
    }
}

/// Effective configuration summary (serializable, for logging at startup).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub workers: usize,
    pub worker_capacity: usize,
    pub scale_up_threshold: usize,
    pub scale_down_threshold: usize,
    pub rebalance_cooldown_secs: u64,
    pub steal_cooldown_secs: u64,
    pub min_workers_per_pool: usize,
    pub tick_millis: u64,
    pub max_queue_depth: Option<usize>,
    pub classify_threshold_tokens: usize,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse one `ADASPLIT_WORKERS` entry: `url`, `url|long`, or `url|short`.
fn parse_worker_entry(entry: &str) -> Result<WorkerSpec, ConfigError> {
    let entry = entry.trim();
    if entry.is_empty() {
        return Err(ConfigError::InvalidWorkerEntry(entry.to_string()));
    }
    match entry.rsplit_once('|') {
        None => Ok(WorkerSpec { endpoint: entry.to_string(), pool: None }),
        Some((url, tag)) => {
            let pool = match tag.trim() {
                "long" => Pool::Long,
                "short" => Pool::Short,
                _ => return Err(ConfigError::InvalidWorkerEntry(entry.to_string())),
            };
            let url = url.trim();
            if url.is_empty() {
                return Err(ConfigError::InvalidWorkerEntry(entry.to_string()));
            }
            Ok(WorkerSpec { endpoint: url.to_string(), pool: Some(pool) })
        }
    }
}

/// Load the worker list from `ADASPLIT_WORKERS`.
///
/// Malformed entries are skipped with a warning rather than failing startup;
/// an empty fleet is caught later when the router is built.
fn load_workers() -> Vec<WorkerSpec> {
    let Ok(raw) = std::env::var("ADASPLIT_WORKERS") else {
        return Vec::new();
    };
    raw.split(',')
        .filter(|e| !e.trim().is_empty())
        .filter_map(|entry| match parse_worker_entry(entry) {
            Ok(spec) => Some(spec),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed worker entry");
                None
            }
        })
        .collect()
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> RouterConfig {
    let worker_capacity = parse_usize("ADASPLIT_WORKER_CONCURRENCY_LIMIT", 8).max(1);
    let scale_up_threshold = parse_usize("ADASPLIT_SCALE_UP_THRESHOLD", 10);
    let scale_down_threshold = parse_usize("ADASPLIT_SCALE_DOWN_THRESHOLD", 2);
    let rebalance_secs = parse_u64("ADASPLIT_REBALANCE_COOLDOWN_SECS", 5);
    let steal_secs = parse_u64("ADASPLIT_STEAL_COOLDOWN_SECS", 2);
    let min_workers_per_pool = parse_usize("ADASPLIT_MIN_WORKERS_PER_POOL", 1).max(1);
    let tick_millis = parse_u64("ADASPLIT_TICK_MILLIS", 1000).max(10);
    let max_queue_depth = match parse_usize("ADASPLIT_MAX_QUEUE_DEPTH", 0) {
        0 => None,
        n => Some(n),
    };
    let classify_threshold_tokens = parse_usize("ADASPLIT_CLASSIFY_THRESHOLD", 3000).max(1);

    RouterConfig {
        workers: load_workers(),
        worker_capacity,
        scale_up_threshold,
        scale_down_threshold,
        rebalance_cooldown: Duration::from_secs(rebalance_secs),
        steal_cooldown: Duration::from_secs(steal_secs),
        min_workers_per_pool,
        tick_interval: Duration::from_millis(tick_millis),
        max_queue_depth,
        classify_threshold_tokens,
    }
}

impl RouterConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            workers: self.workers.len(),
            worker_capacity: self.worker_capacity,
            scale_up_threshold: self.scale_up_threshold,
            scale_down_threshold: self.scale_down_threshold,
            rebalance_cooldown_secs: self.rebalance_cooldown.as_secs(),
            steal_cooldown_secs: self.steal_cooldown.as_secs(),
            min_workers_per_pool: self.min_workers_per_pool,
            tick_millis: self.tick_interval.as_millis() as u64,
            max_queue_depth: self.max_queue_depth,
            classify_threshold_tokens: self.classify_threshold_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "ADASPLIT_WORKERS",
        "ADASPLIT_WORKER_CONCURRENCY_LIMIT",
        "ADASPLIT_SCALE_UP_THRESHOLD",
        "ADASPLIT_SCALE_DOWN_THRESHOLD",
        "ADASPLIT_REBALANCE_COOLDOWN_SECS",
        "ADASPLIT_STEAL_COOLDOWN_SECS",
        "ADASPLIT_MIN_WORKERS_PER_POOL",
        "ADASPLIT_TICK_MILLIS",
        "ADASPLIT_MAX_QUEUE_DEPTH",
        "ADASPLIT_CLASSIFY_THRESHOLD",
    ];

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert!(cfg.workers.is_empty());
        assert_eq!(cfg.worker_capacity, 8);
        assert_eq!(cfg.scale_up_threshold, 10);
        assert_eq!(cfg.scale_down_threshold, 2);
        assert_eq!(cfg.rebalance_cooldown, Duration::from_secs(5));
        assert_eq!(cfg.steal_cooldown, Duration::from_secs(2));
        assert_eq!(cfg.min_workers_per_pool, 1);
        assert_eq!(cfg.tick_interval, Duration::from_millis(1000));
        assert_eq!(cfg.max_queue_depth, None);
        assert_eq!(cfg.classify_threshold_tokens, 3000);
    }

    #[test]
    fn env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("ADASPLIT_WORKER_CONCURRENCY_LIMIT", "4");
        std::env::set_var("ADASPLIT_SCALE_UP_THRESHOLD", "20");
        std::env::set_var("ADASPLIT_REBALANCE_COOLDOWN_SECS", "10");
        std::env::set_var("ADASPLIT_MAX_QUEUE_DEPTH", "256");
        let cfg = load();
        assert_eq!(cfg.worker_capacity, 4);
        assert_eq!(cfg.scale_up_threshold, 20);
        assert_eq!(cfg.rebalance_cooldown, Duration::from_secs(10));
        assert_eq!(cfg.max_queue_depth, Some(256));
        clear_env_vars();
    }

    #[test]
    fn invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("ADASPLIT_WORKER_CONCURRENCY_LIMIT", "not_a_number");
        std::env::set_var("ADASPLIT_STEAL_COOLDOWN_SECS", "abc");
        let cfg = load();
        assert_eq!(cfg.worker_capacity, 8);
        assert_eq!(cfg.steal_cooldown, Duration::from_secs(2));
        clear_env_vars();
    }

    #[test]
    fn floors_hold() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("ADASPLIT_WORKER_CONCURRENCY_LIMIT", "0");
        std::env::set_var("ADASPLIT_MIN_WORKERS_PER_POOL", "0");
        std::env::set_var("ADASPLIT_TICK_MILLIS", "0");
        let cfg = load();
        assert!(cfg.worker_capacity >= 1);
        assert!(cfg.min_workers_per_pool >= 1);
        assert!(cfg.tick_interval >= Duration::from_millis(10));
        clear_env_vars();
    }

    #[test]
    fn worker_list_parses_pools() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var(
            "ADASPLIT_WORKERS",
            "http://w0:8001|long, http://w1:8002|short, http://w2:8003",
        );
        let cfg = load();
        assert_eq!(cfg.workers.len(), 3);
        assert_eq!(cfg.workers[0].endpoint, "http://w0:8001");
        assert_eq!(cfg.workers[0].pool, Some(Pool::Long));
        assert_eq!(cfg.workers[1].pool, Some(Pool::Short));
        assert_eq!(cfg.workers[2].pool, None);
        clear_env_vars();
    }

    #[test]
    fn malformed_worker_entries_are_skipped() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("ADASPLIT_WORKERS", "http://ok:8001,|long,http://bad:8002|wide");
        let cfg = load();
        assert_eq!(cfg.workers.len(), 1);
        assert_eq!(cfg.workers[0].endpoint, "http://ok:8001");
        clear_env_vars();
    }

    #[test]
    fn effective_config_reflects_values() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let eff = load().effective_config();
        assert_eq!(eff.worker_capacity, 8);
        assert_eq!(eff.rebalance_cooldown_secs, 5);
        assert_eq!(eff.steal_cooldown_secs, 2);
        assert_eq!(eff.tick_millis, 1000);
        assert_eq!(eff.max_queue_depth, None);
    }
}

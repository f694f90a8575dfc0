//! Worker registry and per-worker admission gate.
//!
//! A worker is one capacity-bounded backend serving instance. Pool membership
//! is a plain tag on the worker so rebalancing is an O(1) field write, never
//! an object-identity change.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::{ConfigError, WorkerSpec};
use crate::telemetry;

/// Index into the worker table. Stable for the process lifetime.
pub type WorkerId = usize;

/// Logical pool a worker belongs to. Requests carry the same tag as their
/// kind: a LONG request is served by the LONG pool unless stolen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pool {
    Long,
    Short,
}

impl Pool {
    pub fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

impl std::fmt::Display for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of releasing a worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Slot freed, worker still has in-flight requests.
    Busy,
    /// Slot freed and the worker just went idle.
    WentIdle,
    /// Release without a matching acquire. Programmer error.
    Fault,
}

/// One backend serving instance with a fixed concurrency capacity.
#[derive(Debug)]
pub struct Worker {
    pub id: WorkerId,
    pub endpoint: String,
    pub capacity: usize,
    pub pool: Pool,
    active: usize,
    /// Instant the worker last transitioned to idle. Meaningful only while
    /// `active == 0`; a fresh worker counts as idle since creation.
    last_idle_at: Instant,
}

impl Worker {
    pub fn new(id: WorkerId, endpoint: String, capacity: usize, pool: Pool, now: Instant) -> Self {
        Self { id, endpoint, capacity, pool, active: 0, last_idle_at: now }
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn has_capacity(&self) -> bool {
        self.active < self.capacity
    }

    /// How long the worker has been continuously idle, or `None` while busy.
    pub fn idle_for(&self, now: Instant) -> Option<tokio::time::Duration> {
        (self.active == 0).then(|| now.saturating_duration_since(self.last_idle_at))
    }

    /// Claim one slot. Caller must have checked `has_capacity` under the
    /// scheduling-state lock; this enforces the invariant regardless.
    pub fn acquire(&mut self) -> bool {
        if self.active >= self.capacity {
            return false;
        }
        self.active += 1;
        true
    }

    /// Free one slot. A release on an idle worker indicates a double-release
    /// bug upstream: fatal in test builds, logged and counted in production.
    pub fn release(&mut self, now: Instant) -> ReleaseOutcome {
        if self.active == 0 {
            debug_assert!(false, "release on idle worker {}", self.id);
            tracing::error!(worker = self.id, "admission fault: release without matching acquire");
            telemetry::record_admission_fault(self.id);
            return ReleaseOutcome::Fault;
        }
        self.active -= 1;
        if self.active == 0 {
            self.last_idle_at = now;
            ReleaseOutcome::WentIdle
        } else {
            ReleaseOutcome::Busy
        }
    }
}

/// Read-only view of one worker for the observability surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub endpoint: String,
    pub pool: Pool,
    pub active: usize,
    pub capacity: usize,
}

impl From<&Worker> for WorkerSnapshot {
    fn from(w: &Worker) -> Self {
        Self {
            id: w.id,
            endpoint: w.endpoint.clone(),
            pool: w.pool,
            active: w.active,
            capacity: w.capacity,
        }
    }
}

/// Count workers per pool: `(long, short)`.
pub fn pool_census(workers: &[Worker]) -> (usize, usize) {
    let long = workers.iter().filter(|w| w.pool == Pool::Long).count();
    (long, workers.len() - long)
}

/// Build the worker table from configuration.
///
/// Entries without an explicit pool are split down the middle: first half
/// LONG, second half SHORT. An explicit one-sided assignment (even an empty
/// pool) is accepted: the guardrail minimums constrain rebalance moves, not
/// the starting layout, and scale-up is what populates an empty pool once
/// backlog appears.
pub fn build_fleet(
    specs: &[WorkerSpec],
    capacity: usize,
    now: Instant,
) -> Result<Vec<Worker>, ConfigError> {
    if specs.is_empty() {
        return Err(ConfigError::NoWorkers);
    }

    let unassigned = specs.iter().filter(|s| s.pool.is_none()).count();
    let mut default_long_left = (unassigned + 1) / 2;

    let workers = specs
        .iter()
        .enumerate()
        .map(|(id, spec)| {
            let pool = spec.pool.unwrap_or_else(|| {
                if default_long_left > 0 {
                    default_long_left -= 1;
                    Pool::Long
                } else {
                    Pool::Short
                }
            });
            Worker::new(id, spec.endpoint.clone(), capacity, pool, now)
        })
        .collect();

    Ok(workers)
}

//! Health check support.
//!
//! Liveness, readiness, and a full report for orchestrator integration.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::scheduler::RouterSnapshot;
use crate::shutdown::ShutdownState;

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Detailed health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub state: HealthState,
    pub ready: bool,
    pub accepting_requests: bool,
    pub queue_long: usize,
    pub queue_short: usize,
    pub pool_long: usize,
    pub pool_short: usize,
    pub uptime_secs: u64,
}

/// Health check configuration.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Combined backlog at which the router reports degraded.
    pub max_queue_depth: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { max_queue_depth: 1000 }
    }
}

/// Aggregates health information from router components.
pub struct HealthChecker {
    config: HealthConfig,
    start_time: Instant,
}

impl HealthChecker {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
        }
    }

    /// Check liveness: process is responsive.
    pub fn is_alive(&self) -> bool {
        true
    }

    /// Check readiness: accepting traffic.
    pub fn is_ready(&self, shutdown_state: ShutdownState, snapshot: &RouterSnapshot) -> bool {
        if shutdown_state != ShutdownState::Running {
            return false;
        }
        snapshot.queue_long + snapshot.queue_short < self.config.max_queue_depth
    }

    /// Generate full health report.
    pub fn report(&self, shutdown_state: ShutdownState, snapshot: &RouterSnapshot) -> HealthReport {
        let accepting = shutdown_state == ShutdownState::Running;
        let ready = self.is_ready(shutdown_state, snapshot);
        let state = if !accepting {
            HealthState::Unhealthy
        } else if !ready {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };

        HealthReport {
            state,
            ready,
            accepting_requests: accepting,
            queue_long: snapshot.queue_long,
            queue_short: snapshot.queue_short,
            pool_long: snapshot.pool_long,
            pool_short: snapshot.pool_short,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(queue_long: usize, queue_short: usize) -> RouterSnapshot {
        RouterSnapshot {
            queue_long,
            queue_short,
            pool_long: 2,
            pool_short: 2,
            workers: Vec::new(),
        }
    }

    #[test]
    fn healthy_while_running_under_watermark() {
        let checker = HealthChecker::default();
        let report = checker.report(ShutdownState::Running, &snapshot(3, 4));
        assert_eq!(report.state, HealthState::Healthy);
        assert!(report.ready);
    }

    #[test]
    fn degraded_over_backlog_watermark() {
        let checker = HealthChecker::new(HealthConfig { max_queue_depth: 5 });
        let report = checker.report(ShutdownState::Running, &snapshot(3, 2));
        assert_eq!(report.state, HealthState::Degraded);
        assert!(!report.ready);
        assert!(report.accepting_requests);
    }

    #[test]
    fn unhealthy_while_draining() {
        let checker = HealthChecker::default();
        let report = checker.report(ShutdownState::Draining, &snapshot(0, 0));
        assert_eq!(report.state, HealthState::Unhealthy);
        assert!(!report.accepting_requests);
    }
}

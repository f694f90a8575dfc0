//! Micro scheduler: risk-aware stealing by idle workers.
//!
//! A steal serves exactly one cross-pool request and never changes pool
//! membership. The continuous-idleness gate filters out the momentary gaps
//! between back-to-back requests: without it a briefly idle worker would rob
//! the other pool under bursty traffic and undercut the macro scheduler's
//! slower, deliberate rebalancing.

use tokio::time::{Duration, Instant};

use super::worker::Worker;

/// Eligibility rule for a one-shot cross-pool steal.
#[derive(Debug, Clone)]
pub struct StealPolicy {
    /// Minimum continuous idle time before a worker may serve cross-pool.
    pub cooldown: Duration,
}

impl StealPolicy {
    /// Whether `worker` may steal a request of the opposite kind right now.
    ///
    /// `own_queue_len` is the backlog of the worker's home kind: stealing
    /// must never starve same-pool demand. The remaining condition, a
    /// non-empty queue on the other side, is the dispatch loop's
    /// precondition for asking at all.
    pub fn eligible(&self, worker: &Worker, own_queue_len: usize, now: Instant) -> bool {
        if own_queue_len > 0 {
            return false;
        }
        worker.idle_for(now).is_some_and(|idle| idle >= self.cooldown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::worker::Pool;

    fn policy() -> StealPolicy {
        StealPolicy { cooldown: Duration::from_secs(2) }
    }

    #[tokio::test(start_paused = true)]
    async fn requires_continuous_idleness() {
        let t0 = Instant::now();
        let w = Worker::new(0, "w0".into(), 8, Pool::Short, t0);
        let p = policy();

        assert!(!p.eligible(&w, 0, t0 + Duration::from_secs(1)));
        assert!(p.eligible(&w, 0, t0 + Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn own_backlog_blocks_steal() {
        let t0 = Instant::now();
        let w = Worker::new(0, "w0".into(), 8, Pool::Short, t0);
        assert!(!policy().eligible(&w, 1, t0 + Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn busy_worker_never_steals() {
        let t0 = Instant::now();
        let mut w = Worker::new(0, "w0".into(), 8, Pool::Short, t0);
        w.acquire();
        assert!(!policy().eligible(&w, 0, t0 + Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_clock_resets_on_reidle() {
        let t0 = Instant::now();
        let mut w = Worker::new(0, "w0".into(), 8, Pool::Short, t0);
        let p = policy();

        // Busy for a while, then idle again at t=3: the clock restarts.
        w.acquire();
        let t3 = t0 + Duration::from_secs(3);
        w.release(t3);
        assert!(!p.eligible(&w, 0, t3 + Duration::from_secs(1)));
        assert!(p.eligible(&w, 0, t3 + Duration::from_secs(2)));
    }
}

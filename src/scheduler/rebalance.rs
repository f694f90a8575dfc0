//! Macro scheduler: queue-aware hysteretic adaptive partitioning.
//!
//! Moves at most one worker between pools per evaluation, gated by a cooldown
//! since the last successful move. Long-queue depth is the only input signal;
//! in-flight counts never factor into the decision, only into victim choice.

use tokio::time::{Duration, Instant};

use super::worker::{pool_census, Pool, Worker, WorkerId};

/// A pool move decided by one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceAction {
    /// Long backlog over the high watermark: one SHORT worker moved to LONG.
    ScaleUp { worker: WorkerId },
    /// Long backlog under the low watermark: one LONG worker moved to SHORT.
    ScaleDown { worker: WorkerId },
}

/// Thresholds and hysteresis for pool repartitioning.
#[derive(Debug, Clone)]
pub struct RebalancePolicy {
    pub scale_up_threshold: usize,
    pub scale_down_threshold: usize,
    pub cooldown: Duration,
    pub min_per_pool: usize,
}

impl RebalancePolicy {
    /// Evaluate one rebalance decision and apply it to the worker table.
    ///
    /// `last_rebalance` is the shared cooldown clock; it is only advanced by
    /// a successful move. Guardrails are checked before every move: a breach
    /// is a no-op, not an error. Scale-up wins when both conditions hold,
    /// since long-side backlog means starvation of the expensive requests.
    pub fn evaluate(
        &self,
        workers: &mut [Worker],
        queue_long: usize,
        last_rebalance: &mut Option<Instant>,
        now: Instant,
    ) -> Option<RebalanceAction> {
        if let Some(last) = *last_rebalance {
            if now.saturating_duration_since(last) < self.cooldown {
                return None;
            }
        }

        let (n_long, n_short) = pool_census(workers);

        if queue_long > self.scale_up_threshold && n_short > self.min_per_pool {
            let victim = least_active(workers, Pool::Short)?;
            workers[victim].pool = Pool::Long;
            *last_rebalance = Some(now);
            tracing::warn!(
                worker = victim,
                queue_long,
                pools = %format!("{}:{}", n_long + 1, n_short - 1),
                "rebalance: scale up, worker moved to long pool"
            );
            return Some(RebalanceAction::ScaleUp { worker: victim });
        }

        if queue_long < self.scale_down_threshold && n_long > self.min_per_pool {
            let victim = least_active(workers, Pool::Long)?;
            workers[victim].pool = Pool::Short;
            *last_rebalance = Some(now);
            tracing::info!(
                worker = victim,
                queue_long,
                pools = %format!("{}:{}", n_long - 1, n_short + 1),
                "rebalance: scale down, worker moved to short pool"
            );
            return Some(RebalanceAction::ScaleDown { worker: victim });
        }

        None
    }
}

/// Pick the reassignment victim: lowest `active_count` in the pool, lowest id
/// on ties. Moving an idle worker disrupts nothing in flight; reassignment
/// never cancels requests, it only changes future dispatch eligibility.
fn least_active(workers: &[Worker], pool: Pool) -> Option<WorkerId> {
    workers
        .iter()
        .filter(|w| w.pool == pool)
        .min_by_key(|w| (w.active_count(), w.id))
        .map(|w| w.id)
}

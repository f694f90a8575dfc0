//! Serialized scheduling core: admission, dispatch, completion, snapshots.
//!
//! All scheduling state (worker table, partition queues, rebalance clock)
//! lives behind one mutex. Admission, dispatch, rebalance, and steal
//! decisions are made under that lock so no dispatch ever observes a stale
//! pool assignment; backend submits happen outside it. Critical sections
//! never await.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::RouterError;
use crate::telemetry;

use super::queue::PartitionQueues;
use super::rebalance::RebalancePolicy;
use super::request::{QueuedRequest, RequestId, ResponseRx};
use super::steal::StealPolicy;
use super::worker::{pool_census, Pool, ReleaseOutcome, Worker, WorkerId, WorkerSnapshot};

/// Scheduling policy knobs, fixed at construction.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_queue_depth: Option<usize>,
    pub rebalance: RebalancePolicy,
    pub steal: StealPolicy,
}

/// A routing decision: one request bound to one worker slot.
///
/// The slot is already acquired; the holder must eventually drive
/// [`Scheduler::complete`] for the worker, success or failure.
#[derive(Debug)]
pub struct Dispatch {
    pub request: QueuedRequest,
    pub worker: WorkerId,
    pub endpoint: String,
    pub stolen: bool,
}

/// Work produced by one scheduling event, to be acted on outside the lock.
#[derive(Debug, Default)]
pub struct Followups {
    pub dispatches: Vec<Dispatch>,
    /// Set when a worker transitioned to idle; the caller schedules the
    /// delayed steal re-scan for it.
    pub went_idle: Option<WorkerId>,
}

/// Point-in-time view of the scheduling state. Read-only, poll at will.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSnapshot {
    pub queue_long: usize,
    pub queue_short: usize,
    pub pool_long: usize,
    pub pool_short: usize,
    pub workers: Vec<WorkerSnapshot>,
}

struct SchedState {
    workers: Vec<Worker>,
    queues: PartitionQueues,
    last_rebalance: Option<Instant>,
}

/// The two-level scheduler: FIFO dispatch with cross-pool stealing (micro)
/// and hysteretic pool repartitioning (macro).
pub struct Scheduler {
    state: Mutex<SchedState>,
    rebalance: RebalancePolicy,
    steal: StealPolicy,
    next_id: AtomicU64,
}

impl Scheduler {
    pub fn new(workers: Vec<Worker>, config: SchedulerConfig) -> Self {
        Self {
            state: Mutex::new(SchedState {
                workers,
                queues: PartitionQueues::new(config.max_queue_depth),
                last_rebalance: None,
            }),
            rebalance: config.rebalance,
            steal: config.steal,
            next_id: AtomicU64::new(1),
        }
    }

    /// Admit a classified request: enqueue, attempt immediate dispatch, and
    /// run the macro evaluation this event may have triggered.
    pub fn admit(
        &self,
        kind: Pool,
        body: serde_json::Value,
    ) -> Result<(RequestId, ResponseRx, Followups), RouterError> {
        let mut st = self.state.lock();
        let now = Instant::now();

        if st.queues.is_full(kind) {
            return Err(RouterError::QueueFull {
                kind,
                current: st.queues.len(kind),
                max: st.queues.max_depth().unwrap_or(0),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = tokio::sync::oneshot::channel();
        let mut request = QueuedRequest::new(id, kind, body, now);
        request.response_tx = Some(tx);
        st.queues.push(request);

        let mut followups = Followups {
            dispatches: self.drain(&mut st, kind, now),
            went_idle: None,
        };
        if self.run_rebalance(&mut st, now) {
            followups.dispatches.extend(self.drain_both(&mut st, now));
        }
        record_depths(&st);

        Ok((id, rx, followups))
    }

    /// Release the worker's slot after a completion (success or backend
    /// failure), then retry dispatch for both kinds: the freed slot may serve
    /// either pool depending on concurrent rebalances.
    pub fn complete(&self, worker: WorkerId) -> Followups {
        let mut st = self.state.lock();
        let now = Instant::now();

        let went_idle =
            (st.workers[worker].release(now) == ReleaseOutcome::WentIdle).then_some(worker);

        let mut followups = Followups { dispatches: self.drain_both(&mut st, now), went_idle };
        if self.run_rebalance(&mut st, now) {
            followups.dispatches.extend(self.drain_both(&mut st, now));
        }
        record_depths(&st);
        followups
    }

    /// Periodic safety net: macro evaluation plus a full dispatch re-scan.
    /// Also the path that lets a steal fire during a quiet period, once a
    /// worker's continuous idleness crosses the cooldown.
    pub fn tick(&self) -> Followups {
        let mut st = self.state.lock();
        let now = Instant::now();

        self.run_rebalance(&mut st, now);
        let followups = Followups {
            dispatches: self.drain_both(&mut st, now),
            went_idle: None,
        };
        record_depths(&st);
        followups
    }

    /// Remove a queued-but-undispatched request. Returns false if it was
    /// already dispatched (in-flight cancellation is a backend concern).
    pub fn cancel(&self, id: RequestId) -> bool {
        let removed = {
            let mut st = self.state.lock();
            let removed = st.queues.remove(id);
            if removed.is_some() {
                record_depths(&st);
            }
            removed
        };
        match removed {
            Some(request) => {
                tracing::debug!(request = id, "cancelled before dispatch");
                request.respond(Err(RouterError::Cancelled));
                true
            }
            None => false,
        }
    }

    /// Drain every queued request for shutdown. Responses are delivered by
    /// the caller outside the lock.
    pub fn take_all_queued(&self) -> Vec<QueuedRequest> {
        let mut st = self.state.lock();
        let drained = st.queues.drain_all();
        record_depths(&st);
        drained
    }

    pub fn queue_depths(&self) -> (usize, usize) {
        let st = self.state.lock();
        (st.queues.len(Pool::Long), st.queues.len(Pool::Short))
    }

    pub fn snapshot(&self) -> RouterSnapshot {
        let st = self.state.lock();
        let (pool_long, pool_short) = pool_census(&st.workers);
        RouterSnapshot {
            queue_long: st.queues.len(Pool::Long),
            queue_short: st.queues.len(Pool::Short),
            pool_long,
            pool_short,
            workers: st.workers.iter().map(WorkerSnapshot::from).collect(),
        }
    }

    /// Match queued requests of `kind` to worker slots until one side runs
    /// out. Home-pool workers are scanned in ascending id order; when the
    /// home pool is exhausted, at most one cross-pool steal is attempted.
    fn drain(&self, st: &mut SchedState, kind: Pool, now: Instant) -> Vec<Dispatch> {
        let mut out = Vec::new();
        let mut stole = false;

        while !st.queues.is_empty(kind) {
            let home = st
                .workers
                .iter()
                .find(|w| w.pool == kind && w.has_capacity())
                .map(|w| w.id);

            let (worker, stolen) = match home {
                Some(id) => (id, false),
                None if !stole => match self.steal_candidate(st, kind, now) {
                    Some(id) => {
                        stole = true;
                        (id, true)
                    }
                    None => break,
                },
                None => break,
            };

            if !st.workers[worker].acquire() {
                break;
            }
            let Some(request) = st.queues.pop(kind) else {
                st.workers[worker].release(now);
                break;
            };

            if stolen {
                tracing::info!(
                    worker,
                    request = request.id,
                    kind = %kind,
                    "steal: idle worker serving one cross-pool request"
                );
                telemetry::record_steal(worker, kind);
            }
            telemetry::record_dispatch(kind, stolen);

            let endpoint = st.workers[worker].endpoint.clone();
            out.push(Dispatch { request, worker, endpoint, stolen });
        }
        out
    }

    /// Short first: short-kind latency is the cheap win, and the original
    /// backlog signal driving the macro layer is long-side only.
    fn drain_both(&self, st: &mut SchedState, now: Instant) -> Vec<Dispatch> {
        let mut out = self.drain(st, Pool::Short, now);
        out.extend(self.drain(st, Pool::Long, now));
        out
    }

    /// First opposite-pool worker (ascending id) allowed to serve `kind`
    /// under the steal policy: continuously idle past the cooldown and with
    /// no backlog of its own kind.
    fn steal_candidate(&self, st: &SchedState, kind: Pool, now: Instant) -> Option<WorkerId> {
        let own_queue_len = st.queues.len(kind.opposite());
        st.workers
            .iter()
            .find(|w| w.pool == kind.opposite() && self.steal.eligible(w, own_queue_len, now))
            .map(|w| w.id)
    }

    fn run_rebalance(&self, st: &mut SchedState, now: Instant) -> bool {
        let queue_long = st.queues.len(Pool::Long);
        let SchedState { workers, last_rebalance, .. } = st;
        match self.rebalance.evaluate(workers, queue_long, last_rebalance, now) {
            Some(action) => {
                telemetry::record_rebalance(action);
                true
            }
            None => false,
        }
    }
}

fn record_depths(st: &SchedState) {
    telemetry::record_queue_depth(st.queues.len(Pool::Long), st.queues.len(Pool::Short));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Duration;

    fn scheduler(pools: &[Pool], capacity: usize) -> Scheduler {
        let now = Instant::now();
        let workers = pools
            .iter()
            .enumerate()
            .map(|(id, &pool)| Worker::new(id, format!("http://worker-{id}"), capacity, pool, now))
            .collect();
        Scheduler::new(
            workers,
            SchedulerConfig {
                max_queue_depth: None,
                rebalance: RebalancePolicy {
                    scale_up_threshold: 10,
                    scale_down_threshold: 0, // disabled for unit tests
                    cooldown: Duration::from_secs(5),
                    min_per_pool: 1,
                },
                steal: StealPolicy { cooldown: Duration::from_secs(2) },
            },
        )
    }

    fn body(tag: u64) -> serde_json::Value {
        serde_json::json!({ "tag": tag })
    }

    #[tokio::test]
    async fn dispatch_scans_workers_in_id_order() {
        let s = scheduler(&[Pool::Short, Pool::Short], 8);
        let (_, _rx, f) = s.admit(Pool::Short, body(1)).unwrap();
        assert_eq!(f.dispatches.len(), 1);
        assert_eq!(f.dispatches[0].worker, 0);
        assert!(!f.dispatches[0].stolen);
    }

    #[tokio::test]
    async fn saturated_pool_queues_the_overflow() {
        let s = scheduler(&[Pool::Long, Pool::Short], 1);
        let (_, _rx1, f1) = s.admit(Pool::Long, body(1)).unwrap();
        assert_eq!(f1.dispatches.len(), 1);

        let (_, _rx2, f2) = s.admit(Pool::Long, body(2)).unwrap();
        assert!(f2.dispatches.is_empty());
        assert_eq!(s.queue_depths().0, 1);
    }

    #[tokio::test]
    async fn completion_dispatches_oldest_queued_first() {
        let s = scheduler(&[Pool::Long, Pool::Short], 1);
        let (_, _rx1, f1) = s.admit(Pool::Long, body(1)).unwrap();
        let (id2, _rx2, _) = s.admit(Pool::Long, body(2)).unwrap();
        let (id3, _rx3, _) = s.admit(Pool::Long, body(3)).unwrap();

        let f = s.complete(f1.dispatches[0].worker);
        assert_eq!(f.dispatches.len(), 1);
        assert_eq!(f.dispatches[0].request.id, id2);
        assert!(id3 > id2);
    }

    #[tokio::test(start_paused = true)]
    async fn steal_is_one_shot_per_event() {
        let s = scheduler(&[Pool::Long, Pool::Short], 4);
        // Saturate the long pool.
        let mut rxs = Vec::new();
        for i in 0..4 {
            let (_, rx, _) = s.admit(Pool::Long, body(i)).unwrap();
            rxs.push(rx);
        }
        // Two more long requests back up.
        let (_, _rx5, _) = s.admit(Pool::Long, body(5)).unwrap();
        let (_, _rx6, _) = s.admit(Pool::Long, body(6)).unwrap();
        assert_eq!(s.queue_depths().0, 2);

        // Past the idle cooldown the short worker may steal, but only one
        // request per scan even though it has spare capacity.
        tokio::time::advance(Duration::from_secs(3)).await;
        let f = s.tick();
        assert_eq!(f.dispatches.len(), 1);
        assert!(f.dispatches[0].stolen);
        assert_eq!(f.dispatches[0].worker, 1);
        assert_eq!(s.queue_depths().0, 1);
        assert_eq!(s.snapshot().workers[1].pool, Pool::Short, "steal must not reassign the pool");
    }

    #[tokio::test]
    async fn cancel_removes_queued_request() {
        let s = scheduler(&[Pool::Long, Pool::Short], 1);
        let (_, _rx1, _) = s.admit(Pool::Long, body(1)).unwrap();
        let (id2, rx2, _) = s.admit(Pool::Long, body(2)).unwrap();

        assert!(s.cancel(id2));
        assert!(!s.cancel(id2));
        assert_eq!(s.queue_depths().0, 0);
        let outcome = rx2.await.unwrap();
        assert!(matches!(outcome, Err(RouterError::Cancelled)));
    }

    #[tokio::test]
    async fn cancel_misses_inflight_request() {
        let s = scheduler(&[Pool::Long, Pool::Short], 1);
        let (id1, _rx1, f) = s.admit(Pool::Long, body(1)).unwrap();
        assert_eq!(f.dispatches.len(), 1);
        assert!(!s.cancel(id1));
    }

    #[tokio::test]
    async fn queue_cap_rejects_when_configured() {
        let now = Instant::now();
        let workers = vec![
            Worker::new(0, "a".into(), 1, Pool::Long, now),
            Worker::new(1, "b".into(), 1, Pool::Short, now),
        ];
        let s = Scheduler::new(
            workers,
            SchedulerConfig {
                max_queue_depth: Some(1),
                rebalance: RebalancePolicy {
                    scale_up_threshold: 10,
                    scale_down_threshold: 0,
                    cooldown: Duration::from_secs(5),
                    min_per_pool: 1,
                },
                steal: StealPolicy { cooldown: Duration::from_secs(2) },
            },
        );

        let (_, _rx1, _) = s.admit(Pool::Long, body(1)).unwrap();
        let (_, _rx2, _) = s.admit(Pool::Long, body(2)).unwrap();
        let err = s.admit(Pool::Long, body(3)).unwrap_err();
        assert!(matches!(err, RouterError::QueueFull { kind: Pool::Long, current: 1, max: 1 }));
    }
}

//! Two-level request scheduling for the router.
//!
//! Macro layer: queue-aware hysteretic pool repartitioning. Micro layer:
//! one-shot cross-pool stealing by idle workers. Both serialize their
//! decisions with dispatch under a single scheduling-state lock.

mod dispatch;
mod queue;
mod rebalance;
mod request;
mod steal;
mod worker;

pub use dispatch::{Dispatch, Followups, RouterSnapshot, Scheduler, SchedulerConfig};
pub use rebalance::{RebalanceAction, RebalancePolicy};
pub use request::{QueuedRequest, RequestId, ResponseRx, ResponseTx};
pub use steal::StealPolicy;
pub use worker::{build_fleet, pool_census, Pool, Worker, WorkerId, WorkerSnapshot};

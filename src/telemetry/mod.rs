//! Telemetry for the router.
//!
//! Structured logging via `tracing` and a `metrics` facade for scheduling
//! events. Exporters are the embedding application's choice.

mod logging;
mod metrics;

pub use self::logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    describe_metrics, record_admission_fault, record_dispatch, record_queue_depth,
    record_rebalance, record_request_failure, record_request_success, record_steal,
};

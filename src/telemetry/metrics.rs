//! Metrics facade for scheduling events.
//!
//! Thin wrappers over the `metrics` macros so call sites stay one line and
//! metric names live in one place.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

use crate::scheduler::{Pool, RebalanceAction, WorkerId};

/// Register metric descriptions with the installed recorder. Optional;
/// call once at startup if the exporter surfaces help text.
pub fn describe_metrics() {
    describe_counter!("adasplit_dispatch_total", "Requests routed to a worker slot");
    describe_counter!("adasplit_steal_total", "One-shot cross-pool steals");
    describe_counter!("adasplit_rebalance_total", "Pool membership moves by the macro scheduler");
    describe_counter!("adasplit_admission_fault_total", "Releases without a matching acquire");
    describe_counter!("adasplit_request_success_total", "Requests completed by a backend");
    describe_counter!("adasplit_request_failure_total", "Requests failed by a backend");
    describe_gauge!("adasplit_queue_depth", "Admitted requests awaiting dispatch");
    describe_histogram!("adasplit_request_latency_ms", "Backend round-trip latency");
}

pub fn record_dispatch(kind: Pool, stolen: bool) {
    let route = if stolen { "stolen" } else { "home" };
    counter!("adasplit_dispatch_total", "kind" => kind.as_str(), "route" => route).increment(1);
}

pub fn record_steal(worker: WorkerId, kind: Pool) {
    counter!("adasplit_steal_total", "worker" => worker.to_string(), "kind" => kind.as_str())
        .increment(1);
}

pub fn record_rebalance(action: RebalanceAction) {
    let direction = match action {
        RebalanceAction::ScaleUp { .. } => "scale_up",
        RebalanceAction::ScaleDown { .. } => "scale_down",
    };
    counter!("adasplit_rebalance_total", "direction" => direction).increment(1);
}

pub fn record_admission_fault(worker: WorkerId) {
    counter!("adasplit_admission_fault_total", "worker" => worker.to_string()).increment(1);
}

pub fn record_queue_depth(long: usize, short: usize) {
    gauge!("adasplit_queue_depth", "kind" => Pool::Long.as_str()).set(long as f64);
    gauge!("adasplit_queue_depth", "kind" => Pool::Short.as_str()).set(short as f64);
}

pub fn record_request_success(kind: Pool, latency_ms: u64) {
    counter!("adasplit_request_success_total", "kind" => kind.as_str()).increment(1);
    histogram!("adasplit_request_latency_ms", "kind" => kind.as_str()).record(latency_ms as f64);
}

pub fn record_request_failure(kind: Pool) {
    counter!("adasplit_request_failure_total", "kind" => kind.as_str()).increment(1);
}

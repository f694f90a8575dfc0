//! AdaSplit router.
//!
//! A single-process, in-memory control plane that routes inference requests
//! across a fixed fleet of fixed-capacity serving workers, partitioned into a
//! long-context and a short-context pool.
//!
//! # Scheduling layers
//!
//! - **Dispatch**: requests are classified once at admission, queued FIFO per
//!   kind, and matched to the first worker of their pool with free capacity.
//! - **Macro (pool repartitioning)**: long-queue backlog moves workers
//!   between pools, one per evaluation, behind a hysteresis cooldown.
//! - **Micro (stealing)**: a worker idle past a cooldown with no backlog of
//!   its own kind may serve one cross-pool request without changing pools.
//!
//! All scheduling decisions are serialized under one lock; backends execute
//! in parallel across workers. The backends themselves are opaque
//! collaborators behind the [`backend::Backend`] trait.

pub mod backend;
pub mod classify;
pub mod config;
pub mod error;
pub mod health;
pub mod scheduler;
pub mod shutdown;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use backend::{Backend, BackendResponse};
use classify::{Classifier, TokenEstimateClassifier};
use config::{ConfigError, RouterConfig};
use error::RouterError;
use health::{HealthChecker, HealthReport};
use scheduler::{
    build_fleet, Dispatch, Followups, Pool, RebalancePolicy, RequestId, ResponseRx,
    RouterSnapshot, Scheduler, SchedulerConfig, StealPolicy,
};
use shutdown::{ShutdownCoordinator, ShutdownResult};

/// An inbound request: JSON payload plus an optional explicit kind that
/// bypasses the classifier.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub body: serde_json::Value,
    pub kind_hint: Option<Pool>,
}

impl InferenceRequest {
    pub fn new(body: serde_json::Value) -> Self {
        Self { body, kind_hint: None }
    }

    pub fn with_kind(body: serde_json::Value, kind: Pool) -> Self {
        Self { body, kind_hint: Some(kind) }
    }
}

/// Handle for an admitted request: await the outcome, or cancel via
/// [`Router::cancel`] while it is still queued.
pub struct RequestTicket {
    pub id: RequestId,
    rx: ResponseRx,
}

impl RequestTicket {
    /// Await the backend's response or failure.
    pub async fn response(self) -> Result<BackendResponse, RouterError> {
        match self.rx.await {
            Ok(result) => result,
            // Sender dropped without a response: the request was removed
            // from its queue before dispatch.
            Err(_) => Err(RouterError::Cancelled),
        }
    }
}

/// The router instance. Cheap to clone; all clones share one scheduler.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    scheduler: Scheduler,
    backend: Arc<dyn Backend>,
    classifier: Box<dyn Classifier>,
    shutdown: ShutdownCoordinator,
    steal_cooldown: Duration,
    tick_interval: Duration,
}

impl Router {
    /// Build a router with the default token-estimate classifier.
    pub fn new(config: RouterConfig, backend: Arc<dyn Backend>) -> Result<Self, ConfigError> {
        let classifier = Box::new(TokenEstimateClassifier::new(config.classify_threshold_tokens));
        Self::with_classifier(config, backend, classifier)
    }

    /// Build a router with an injected classifier.
    pub fn with_classifier(
        config: RouterConfig,
        backend: Arc<dyn Backend>,
        classifier: Box<dyn Classifier>,
    ) -> Result<Self, ConfigError> {
        let workers = build_fleet(
            &config.workers,
            config.worker_capacity,
            tokio::time::Instant::now(),
        )?;
        tracing::info!(config = ?config.effective_config(), "router starting");

        let scheduler = Scheduler::new(
            workers,
            SchedulerConfig {
                max_queue_depth: config.max_queue_depth,
                rebalance: RebalancePolicy {
                    scale_up_threshold: config.scale_up_threshold,
                    scale_down_threshold: config.scale_down_threshold,
                    cooldown: config.rebalance_cooldown,
                    min_per_pool: config.min_workers_per_pool,
                },
                steal: StealPolicy { cooldown: config.steal_cooldown },
            },
        );

        Ok(Self {
            inner: Arc::new(RouterInner {
                scheduler,
                backend,
                classifier,
                shutdown: ShutdownCoordinator::new(),
                steal_cooldown: config.steal_cooldown,
                tick_interval: config.tick_interval,
            }),
        })
    }

    /// Admit a request and return a ticket to await. Classification happens
    /// here, once; the kind never changes afterwards.
    pub fn admit(&self, request: InferenceRequest) -> Result<RequestTicket, RouterError> {
        if !self.inner.shutdown.is_accepting() {
            return Err(RouterError::Draining);
        }
        let kind = request
            .kind_hint
            .unwrap_or_else(|| self.inner.classifier.classify(&request.body));

        let (id, rx, followups) = self.inner.scheduler.admit(kind, request.body)?;
        tracing::debug!(request = id, kind = %kind, "request admitted");
        self.inner.launch(followups);
        Ok(RequestTicket { id, rx })
    }

    /// Admit and await in one call: the synchronous-looking inbound surface.
    pub async fn execute(&self, request: InferenceRequest) -> Result<BackendResponse, RouterError> {
        self.admit(request)?.response().await
    }

    /// Cancel a queued-but-undispatched request. Returns false if it was
    /// already dispatched or unknown.
    pub fn cancel(&self, id: RequestId) -> bool {
        self.inner.scheduler.cancel(id)
    }

    /// Read-only snapshot of queues and pool membership.
    pub fn snapshot(&self) -> RouterSnapshot {
        self.inner.scheduler.snapshot()
    }

    /// Health report combining shutdown state and scheduling state.
    pub async fn health(&self, checker: &HealthChecker) -> HealthReport {
        checker.report(self.inner.shutdown.state().await, &self.snapshot())
    }

    /// Spawn the periodic macro tick. Also serves as the defensive dispatch
    /// re-scan so no queued request is orphaned by a missed event.
    pub fn spawn_tick_loop(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(inner.tick_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => {
                        tracing::info!("router: tick loop stopped");
                        break;
                    }
                    _ = tick.tick() => {
                        let followups = inner.scheduler.tick();
                        inner.launch(followups);
                    }
                }
            }
        })
    }

    /// Graceful shutdown: stop admitting, fail the backlog, drain in-flight
    /// requests up to `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownResult {
        self.inner.shutdown.begin_drain().await;
        for request in self.inner.scheduler.take_all_queued() {
            request.respond(Err(RouterError::Draining));
        }
        let result = self.inner.shutdown.await_drain(timeout).await;
        tracing::info!(result = ?result, "router: shutdown complete");
        result
    }
}

impl RouterInner {
    /// Act on scheduling decisions outside the lock: spawn backend submits
    /// and, when a worker just went idle, the delayed steal re-scan.
    fn launch(self: &Arc<Self>, followups: Followups) {
        if followups.went_idle.is_some() {
            self.schedule_idle_rescan();
        }
        for dispatch in followups.dispatches {
            self.spawn_dispatch(dispatch);
        }
    }

    fn spawn_dispatch(self: &Arc<Self>, dispatch: Dispatch) {
        let inner = Arc::clone(self);
        // Counted before the task is spawned: a popped request must be
        // visible to the drain even if the task has not run yet.
        let guard = inner.shutdown.guard();
        tokio::spawn(async move {
            let _guard = guard;
            let Dispatch { request, worker, endpoint, .. } = dispatch;
            let kind = request.kind;

            let start = tokio::time::Instant::now();
            let result = inner.backend.submit(&endpoint, &request.body).await;
            let latency_ms = start.elapsed().as_millis() as u64;

            // Release before signalling the caller; the freed slot may serve
            // either pool depending on rebalances since dispatch.
            let followups = inner.scheduler.complete(worker);

            match &result {
                Ok(_) => {
                    telemetry::record_request_success(kind, latency_ms);
                    tracing::debug!(request = request.id, worker, latency_ms, "request completed");
                }
                Err(e) => {
                    telemetry::record_request_failure(kind);
                    tracing::warn!(request = request.id, worker, error = %e, "backend failure");
                }
            }
            request.respond(result.map_err(|source| RouterError::Backend { worker, source }));

            inner.launch(followups);
        });
    }

    /// A steal can never pass the continuous-idleness gate at the instant of
    /// the idle transition, so re-scan once the cooldown has elapsed.
    fn schedule_idle_rescan(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(inner.steal_cooldown).await;
            let followups = inner.scheduler.tick();
            inner.launch(followups);
        });
    }
}

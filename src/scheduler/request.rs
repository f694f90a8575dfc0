//! Queued request representation and response plumbing.

use tokio::time::Instant;

use crate::backend::BackendResponse;
use crate::error::RouterError;
use super::worker::Pool;

/// Unique per-process request identifier.
pub type RequestId = u64;

/// Sender half for delivering the outcome back to the caller.
pub type ResponseTx = tokio::sync::oneshot::Sender<Result<BackendResponse, RouterError>>;
/// Receiver half for awaiting the outcome.
pub type ResponseRx = tokio::sync::oneshot::Receiver<Result<BackendResponse, RouterError>>;

/// An admitted request awaiting dispatch.
///
/// Owned by exactly one partition queue until dispatched, then by the
/// in-flight task serving it. Kind is fixed at admission and never changes.
pub struct QueuedRequest {
    pub id: RequestId,
    pub kind: Pool,
    pub body: serde_json::Value,
    pub enqueued_at: Instant,
    pub response_tx: Option<ResponseTx>,
}

impl QueuedRequest {
    pub fn new(id: RequestId, kind: Pool, body: serde_json::Value, now: Instant) -> Self {
        Self { id, kind, body, enqueued_at: now, response_tx: None }
    }

    /// Deliver the outcome to the caller, if anyone is still waiting.
    pub fn respond(mut self, result: Result<BackendResponse, RouterError>) {
        if let Some(tx) = self.response_tx.take() {
            let _ = tx.send(result);
        }
    }
}

impl std::fmt::Debug for QueuedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedRequest")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

//! Backend worker seam.
//!
//! The router treats each worker as an opaque request/response executor: it
//! submits while under the worker's admission capacity and observes eventual
//! completion or failure. Batching and scheduling inside the backend are not
//! modeled. Concrete transports (HTTP proxying to serving instances, IPC,
//! in-process engines) live with the embedding application.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Response returned by a backend worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendResponse {
    pub body: serde_json::Value,
}

impl BackendResponse {
    pub fn new(body: serde_json::Value) -> Self {
        Self { body }
    }
}

/// Failures from a backend submission. Always releases the worker slot;
/// never retried by the router (retry policy is a caller concern, since a
/// retried long-context request is expensive).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("worker unreachable: {0}")]
    Unreachable(String),
}

/// One submission path to the worker fleet.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute `request` on the worker at `endpoint`. The router only calls
    /// this while holding an admission slot for that worker.
    async fn submit(
        &self,
        endpoint: &str,
        request: &serde_json::Value,
    ) -> Result<BackendResponse, BackendError>;
}

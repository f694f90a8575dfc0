//! Router error types.
//!
//! The scheduler never manufactures rejections of its own beyond the
//! optional queue-depth cap; everything else a caller sees is a backend
//! outcome or their own cancellation.

use thiserror::Error;

use crate::backend::BackendError;
use crate::scheduler::Pool;

/// Errors surfaced to request callers.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("backend request failed on worker {worker}: {source}")]
    Backend {
        worker: usize,
        #[source]
        source: BackendError,
    },

    #[error("request cancelled before dispatch")]
    Cancelled,

    #[error("{kind} queue full: {current}/{max} pending requests")]
    QueueFull { kind: Pool, current: usize, max: usize },

    #[error("router is draining, not accepting requests")]
    Draining,
}

impl RouterError {
    /// Errors that are expected under load and logged as warnings.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::QueueFull { .. } | Self::Draining)
    }
}

//! View-models for the three page panels.
//!
//! This module provides:
//! - [`UploadPanel`]: single-file document upload
//! - [`QaPanel`]: question answering history and answer validation
//! - [`MetricsPanel`]: extracted metrics in table or radar chart form
//!
//! Panels are cheap `Clone` handles over shared state. State locks are never
//! held across a service call; every call runs inside the panel's
//! [`CancelScope`] and loads are tagged by a [`RequestGeneration`] so that
//! only the freshest response is applied.

mod metrics;
mod qa;
mod upload;

pub use metrics::*;
pub use qa::*;
pub use upload::*;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult, PanelError};

/// Monotonic token source used to discard stale responses.
#[derive(Debug, Clone, Default)]
pub struct RequestGeneration {
    latest: u64,
}

impl RequestGeneration {
    /// Issue a new token, invalidating every token issued before it.
    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    /// Whether `token` is the most recently issued one.
    pub fn is_current(&self, token: u64) -> bool {
        self.latest == token
    }
}

/// Cancellation handle shared by every call a mounted panel makes.
#[derive(Debug, Clone, Default)]
pub struct CancelScope {
    token: CancellationToken,
}

impl CancelScope {
    /// Create a live scope
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Cancel every call running in this scope, now and later.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run a service call, abandoning it if the scope is cancelled first.
    pub async fn run<T, F>(&self, call: F) -> ApiResult<T>
    where
        F: Future<Output = ApiResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ApiError::Cancelled),
            result = call => result,
        }
    }
}

/// Map a failed call to the panel-facing error.
///
/// Error statuses collapse to the call site's generic `fallback` message;
/// transport and parse failures keep their own message.
pub(crate) fn request_failed(err: ApiError, fallback: &str) -> PanelError {
    let message = match &err {
        ApiError::Api { .. } => fallback.to_string(),
        other => other.to_string(),
    };
    PanelError::Request {
        message,
        source: err,
    }
}

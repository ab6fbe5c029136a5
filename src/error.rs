//! Application error types.
//!
//! Most app code returns `anyhow::Result`. The one condition callers need to
//! recognise after the fact is a failed external call, so it gets its own
//! type and can be found again with `downcast_ref`.

use thiserror::Error;

/// An embedding or generation call that failed after its retries.
#[derive(Debug, Error)]
#[error("{service} request failed: {message}")]
pub struct CollaboratorError {
    pub service: &'static str,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

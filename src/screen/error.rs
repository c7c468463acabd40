//! Error types for the call screen.

use thiserror::Error;

use super::CallScreenState;

/// Failure reported by an external collaborator (SDK service, permission
/// prompt, image loader).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{service}: {message}")]
pub struct ServiceError {
    pub service: &'static str,
    pub message: String,
}

impl ServiceError {
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallScreenError {
    /// The incoming bundle carries no conference ID.
    #[error("Invalid incoming call bundle: missing conference id")]
    InvalidBundle,

    /// Microphone permission is missing; a request was issued with this code.
    #[error("Microphone permission missing (request code {request_code})")]
    PermissionDenied { request_code: i32 },

    /// An accept or decline service call failed.
    #[error("Service call failed: {0}")]
    ServiceCall(#[from] ServiceError),

    /// `start` was called on a screen that already ran.
    #[error("Call screen already started (state: {0:?})")]
    NotIdle(CallScreenState),
}

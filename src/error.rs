//! Error taxonomy for gesture and detection operations.
//!
//! Every failure is recovered at the action boundary into a success flag;
//! nothing propagates past the public contract as an unhandled fault. The
//! variants exist so the boundary can report *which* step failed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GestureError {
    /// Target window could not be resolved. Fatal to the current operation;
    /// no keys have been touched when this is raised.
    #[error("target window not found (candidates: {candidates:?})")]
    WindowNotFound { candidates: Vec<String> },

    /// A logical key identifier has no platform key code.
    #[error("unsupported key identifier: '{identifier}'")]
    UnsupportedKey { identifier: String },

    /// Malformed parameter object (wrong type/shape, empty required list).
    /// Raised before any key is touched.
    #[error("invalid parameters: {reason}")]
    InvalidParams { reason: String },

    /// A press/sleep/release or collaborator call failed mid-operation.
    /// Never fatal to key release: pressed keys are still released.
    #[error("execution failed during '{step}': {source}")]
    Execution {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl GestureError {
    pub fn execution(step: &'static str, source: impl Into<anyhow::Error>) -> Self {
        GestureError::Execution {
            step,
            source: source.into(),
        }
    }

    pub fn invalid_params(reason: impl Into<String>) -> Self {
        GestureError::InvalidParams {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GestureError>;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Generation backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    #[error("Generation interrupted after {discarded} bytes: {reason}")]
    BackendInterrupted { discarded: usize, reason: String },
}

use interview_capture::CaptureError;
use interview_core::error::CoreError;
use interview_core::model::Stage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Action requires stage {expected}, session is in {actual}")]
    WrongStage { expected: Stage, actual: Stage },

    #[error("Response is empty")]
    EmptyInput,

    #[error("Generation backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Generation interrupted after {discarded} bytes: {reason}")]
    BackendInterrupted { discarded: usize, reason: String },

    #[error("Final save failed: {0}")]
    Persistence(CoreError),

    #[error("Retake is only allowed for the test identity, not {0}")]
    RetakeNotAllowed(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<CaptureError> for EngineError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::BackendUnavailable { reason } => EngineError::BackendUnavailable(reason),
            CaptureError::BackendInterrupted { discarded, reason } => {
                EngineError::BackendInterrupted { discarded, reason }
            }
        }
    }
}

impl EngineError {
    /// Whether resubmitting the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::BackendUnavailable(_)
                | EngineError::BackendInterrupted { .. }
                | EngineError::Persistence(_)
        )
    }
}

use std::sync::Arc;

use crate::model::SessionId;
use crate::storage::DurableStore;

/// Read-only view of whether a respondent already finished the study.
///
/// The configured test identity is exempt from both checks so it can rerun
/// the whole flow.
pub struct SurveyGate {
    store: Arc<dyn DurableStore>,
    test_identity: String,
}

impl SurveyGate {
    pub fn new(store: Arc<dyn DurableStore>, test_identity: impl Into<String>) -> Self {
        Self {
            store,
            test_identity: test_identity.into(),
        }
    }

    pub fn is_test_identity(&self, id: &SessionId) -> bool {
        id.as_str() == self.test_identity
    }

    pub fn is_survey_completed(&self, id: &SessionId) -> bool {
        if self.is_test_identity(id) {
            return false;
        }
        self.store.read_completion_flag(id)
    }

    /// A final transcript already exists for this respondent.
    pub fn is_interview_finalized(&self, id: &SessionId) -> bool {
        if self.is_test_identity(id) {
            return false;
        }
        self.store.has_final_transcript(id)
    }
}

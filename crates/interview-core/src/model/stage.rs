use serde::{Deserialize, Serialize};

/// Lifecycle phase of a session. Ordered: a session only moves forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Welcome,
    Interview,
    Survey,
    Completed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Welcome => "welcome",
            Stage::Interview => "interview",
            Stage::Survey => "survey",
            Stage::Completed => "completed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage a session starts in, given the external completion oracles.
pub fn initial_stage(
    survey_completed: bool,
    welcome_acknowledged: bool,
    interview_finalized: bool,
) -> Stage {
    if survey_completed {
        Stage::Completed
    } else if !welcome_acknowledged {
        Stage::Welcome
    } else if interview_finalized {
        Stage::Survey
    } else {
        Stage::Interview
    }
}

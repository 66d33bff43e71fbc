use interview_core::model::{Role, SentinelRegistry, Session, Stage, SurveyResponses, Turn};

/// A user action, fed to [`InterviewStateMachine::handle`].
///
/// [`InterviewStateMachine::handle`]: crate::InterviewStateMachine::handle
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Recompute the stage from the completion oracles.
    Refresh,
    AcknowledgeWelcome { consent: bool },
    /// Request the interviewer's opening message.
    Begin,
    Respond(String),
    QuitEarly,
    SubmitSurvey(SurveyResponses),
    Retake,
}

/// What the front end should render after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    ShowWelcome,
    /// Interview is live and waiting for the respondent.
    AwaitResponse,
    /// A completed, non-sentinel assistant reply.
    Reply { content: String },
    /// The interviewer emitted a closing code; show its message, then the
    /// survey.
    InterviewClosed { code: String, message: String },
    EndedEarly { message: String },
    ShowSurvey,
    Completed,
}

impl Directive {
    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Welcome => Directive::ShowWelcome,
            Stage::Interview => Directive::AwaitResponse,
            Stage::Survey => Directive::ShowSurvey,
            Stage::Completed => Directive::Completed,
        }
    }
}

/// Turns worth replaying to the respondent: no System turn, no raw codes.
pub fn visible_turns<'a>(
    session: &'a Session,
    registry: &'a SentinelRegistry,
) -> impl Iterator<Item = &'a Turn> + 'a {
    session
        .transcript
        .turns()
        .iter()
        .filter(|t| t.role != Role::System)
        .filter(move |t| !registry.is_code(&t.content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::model::{SessionId, Transcript};

    #[test]
    fn test_visible_turns_hide_system_and_codes() {
        let mut session = Session::new(SessionId::parse("user_v").unwrap(), false);
        session.transcript = Transcript::from_turns(vec![
            Turn::system("prompt"),
            Turn::assistant("Hello"),
            Turn::user("Hi"),
            Turn::assistant("x7y8"),
        ])
        .unwrap();
        let registry = SentinelRegistry::default();
        let shown: Vec<_> = visible_turns(&session, &registry)
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(shown, vec!["Hello", "Hi"]);
    }

    #[test]
    fn test_directive_for_stage() {
        assert_eq!(Directive::for_stage(Stage::Survey), Directive::ShowSurvey);
        assert_eq!(Directive::for_stage(Stage::Completed), Directive::Completed);
    }
}

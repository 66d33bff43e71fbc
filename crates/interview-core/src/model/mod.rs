pub mod sentinel;
pub mod session;
pub mod stage;
pub mod survey;
pub mod timing;
pub mod transcript;

pub use sentinel::{SentinelCode, SentinelRegistry};
pub use session::{Session, SessionId};
pub use stage::{initial_stage, Stage};
pub use survey::{FinalRecord, SurveyAnswer, SurveyResponses};
pub use timing::SessionTiming;
pub use transcript::{Role, Transcript, Turn};

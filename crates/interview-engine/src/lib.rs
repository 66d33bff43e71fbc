//! The interview state machine.
//!
//! Each user action is an explicit handler call on an explicit [`Session`],
//! returning a [`Directive`] that tells the front end what to render next.
//! Nothing here holds per-session state between calls.
//!
//! [`Session`]: interview_core::model::Session

pub mod directive;
pub mod error;
pub mod machine;
pub mod settings;

pub use directive::{visible_turns, Directive, Event};
pub use error::EngineError;
pub use machine::InterviewStateMachine;
pub use settings::EngineSettings;

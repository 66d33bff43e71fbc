//! Core data model, configuration and durable storage for AI-led interview
//! sessions.
//!
//! The streaming side lives in `interview-capture` and the state machine in
//! `interview-engine`; everything here is synchronous and backend-agnostic.

pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod model;
pub mod persistence;
pub mod storage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::CoreError;
pub use gate::SurveyGate;
pub use persistence::{render, RenderedTranscript, TranscriptPersistence};

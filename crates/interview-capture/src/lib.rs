//! Consumes a lazy stream of text fragments from a generation backend,
//! accumulating them and stopping as soon as the reply is exactly one of the
//! registered sentinel codes.

pub mod buffer;
pub mod capture;
pub mod detector;
pub mod error;

pub use buffer::TokenStreamBuffer;
pub use capture::{capture_stream, CapturedReply};
pub use detector::SentinelDetector;
pub use error::CaptureError;

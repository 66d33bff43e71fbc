//! Generation backends: anything that turns a conversation into a lazy,
//! cancellable stream of text fragments.
//!
//! Dropping a [`FragmentStream`] cancels the request behind it.

pub mod anthropic;
pub mod error;
mod http;
pub mod openai;
pub mod request;
pub mod scripted;
pub mod sse;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

pub use anthropic::AnthropicBackend;
pub use error::BackendError;
pub use openai::OpenAiBackend;
pub use request::{select_backend, BackendKind, GenerationRequest, HttpBackendConfig};
pub use scripted::{ScriptedBackend, ScriptedReply};

/// Fragments of one assistant reply, in arrival order.
pub type FragmentStream = BoxStream<'static, Result<String, BackendError>>;

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Start generating. Errors here mean nothing was produced.
    async fn stream(&self, request: &GenerationRequest) -> Result<FragmentStream, BackendError>;
}

use std::fmt::Display;

use futures_util::{Stream, StreamExt};
use interview_core::model::SentinelCode;

use crate::buffer::TokenStreamBuffer;
use crate::detector::SentinelDetector;
use crate::error::CaptureError;

/// A fully received assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedReply {
    /// Trimmed accumulated text. For a sentinel reply this is the raw code.
    pub content: String,
    pub sentinel: Option<SentinelCode>,
    pub fragments: usize,
}

impl CapturedReply {
    pub fn is_sentinel(&self) -> bool {
        self.sentinel.is_some()
    }
}

/// Drain `stream` into a reply, checking the detector after every fragment.
///
/// On a match the stream is dropped without pulling further fragments, which
/// cancels the in-flight generation. `on_text` receives the accumulated text
/// after each non-matching fragment, so a complete code is never displayed.
///
/// A stream error before any text arrives is `BackendUnavailable`; after
/// text arrived it is `BackendInterrupted` and the partial text is discarded.
pub async fn capture_stream<S, E, F>(
    mut stream: S,
    detector: &SentinelDetector,
    mut on_text: F,
) -> Result<CapturedReply, CaptureError>
where
    S: Stream<Item = Result<String, E>> + Unpin,
    E: Display,
    F: FnMut(&str),
{
    let mut buffer = TokenStreamBuffer::new();

    while let Some(item) = stream.next().await {
        let fragment = match item {
            Ok(fragment) => fragment,
            Err(e) if buffer.is_empty() => {
                tracing::warn!("Generation failed before any content: {e}");
                return Err(CaptureError::BackendUnavailable {
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(
                    "Generation interrupted after {} bytes, discarding partial reply: {e}",
                    buffer.len()
                );
                return Err(CaptureError::BackendInterrupted {
                    discarded: buffer.len(),
                    reason: e.to_string(),
                });
            }
        };

        let accumulated = buffer.append(&fragment);
        if let Some(code) = detector.check(accumulated) {
            tracing::debug!(
                "Sentinel '{}' detected after {} fragments, closing stream",
                code.code,
                buffer.fragment_count()
            );
            let reply = CapturedReply {
                content: buffer.finish(),
                sentinel: Some(code.clone()),
                fragments: buffer.fragment_count(),
            };
            drop(stream);
            return Ok(reply);
        }
        on_text(accumulated);
    }

    tracing::debug!(
        "Stream finished: {} fragments, {} bytes",
        buffer.fragment_count(),
        buffer.len()
    );
    Ok(CapturedReply {
        content: buffer.finish(),
        sentinel: None,
        fragments: buffer.fragment_count(),
    })
}

use std::collections::VecDeque;

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde_json::Value;

use crate::error::BackendError;
use crate::sse::{SseFrame, SseStreamParser};
use crate::FragmentStream;

/// What one decoded SSE payload means for the reply.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Delta {
    Text(String),
    Skip,
    Stop,
}

pub(crate) type DeltaParser = fn(&Value) -> Result<Delta, BackendError>;

struct SseState {
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    parser: SseStreamParser,
    pending: VecDeque<Result<String, BackendError>>,
    finished: bool,
    /// Set once the provider's end-of-reply marker arrived.
    completed: bool,
    parse_delta: DeltaParser,
}

impl SseState {
    fn absorb(&mut self, chunk: &[u8]) {
        for frame in self.parser.feed(chunk) {
            if self.finished {
                return;
            }
            let payload = match frame {
                SseFrame::Done => {
                    self.finished = true;
                    self.completed = true;
                    return;
                }
                SseFrame::Data(payload) => payload,
            };
            let decoded = serde_json::from_str::<Value>(&payload)
                .map_err(BackendError::from)
                .and_then(|value| (self.parse_delta)(&value));
            match decoded {
                Ok(Delta::Text(text)) if text.is_empty() => {}
                Ok(Delta::Text(text)) => self.pending.push_back(Ok(text)),
                Ok(Delta::Skip) => {}
                Ok(Delta::Stop) => {
                    self.finished = true;
                    self.completed = true;
                }
                Err(e) => {
                    self.pending.push_back(Err(e));
                    self.finished = true;
                }
            }
        }
    }
}

/// Turn a streaming HTTP response into text fragments. The body is only
/// read as fragments are pulled, so dropping the stream closes the request.
/// A body that ends without the end-of-reply marker yields a final error.
pub(crate) fn sse_fragments(
    response: reqwest::Response,
    parse_delta: DeltaParser,
) -> FragmentStream {
    let bytes = response
        .bytes_stream()
        .map(|chunk| chunk.map(|b| b.to_vec()))
        .boxed();
    let state = SseState {
        bytes,
        parser: SseStreamParser::default(),
        pending: VecDeque::new(),
        finished: false,
        completed: false,
        parse_delta,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => st.absorb(&chunk),
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(BackendError::Stream(e.to_string())), st));
                }
                None => {
                    st.finished = true;
                    if !st.completed {
                        tracing::warn!(
                            leftover = !st.parser.is_empty_buffer(),
                            "Response body ended before the end-of-reply marker"
                        );
                        return Some((
                            Err(BackendError::Stream(
                                "stream ended before completion".to_string(),
                            )),
                            st,
                        ));
                    }
                }
            }
        }
    })
    .boxed()
}

/// Fail with the response body when the status is not a success.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(ToString::to_string)
        })
        .unwrap_or(body);
    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

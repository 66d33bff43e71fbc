use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;

use crate::error::BackendError;
use crate::request::GenerationRequest;
use crate::{FragmentStream, GenerationBackend};

/// One canned reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ScriptedReply {
    /// Stream these fragments, then end.
    Fragments(Vec<String>),
    /// Stream `after`, then fail. With no fragments the call itself fails.
    Failure {
        error: String,
        #[serde(default)]
        after: Vec<String>,
    },
}

impl ScriptedReply {
    pub fn fragments<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedReply::Fragments(items.into_iter().map(Into::into).collect())
    }

    pub fn fail(error: impl Into<String>) -> Self {
        ScriptedReply::Failure {
            error: error.into(),
            after: Vec::new(),
        }
    }

    pub fn fail_after<I, S>(items: I, error: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedReply::Failure {
            error: error.into(),
            after: items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScriptFile {
    replies: Vec<ScriptedReply>,
}

/// Replays canned replies in order, recording every request it receives.
///
/// Used for offline rehearsal (`interview run --scripted`) and in tests.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<GenerationRequest>>,
    pulled: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    /// Load `{"replies": [["Hello", " there"], {"error": "..."}]}`.
    pub fn from_json(data: &str) -> Result<Self, BackendError> {
        let file: ScriptFile = serde_json::from_str(data)?;
        Ok(Self::new(file.replies))
    }

    pub fn from_file(path: &Path) -> Result<Self, BackendError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            BackendError::Config(format!("cannot read script {}: {e}", path.display()))
        })?;
        Self::from_json(&data)
    }

    pub fn push(&self, reply: ScriptedReply) {
        lock(&self.replies).push_back(reply);
    }

    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }

    /// Total fragments consumers have pulled across all replies.
    pub fn fragments_pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<FragmentStream, BackendError> {
        lock(&self.requests).push(request.clone());
        let reply = lock(&self.replies)
            .pop_front()
            .ok_or(BackendError::ScriptExhausted)?;

        let (fragments, failure) = match reply {
            ScriptedReply::Fragments(fragments) => (fragments, None),
            ScriptedReply::Failure { error, after } if after.is_empty() => {
                return Err(BackendError::Stream(error));
            }
            ScriptedReply::Failure { error, after } => (after, Some(error)),
        };

        let items = fragments
            .into_iter()
            .map(Ok)
            .chain(failure.map(|e| Err(BackendError::Stream(e))));
        let pulled = self.pulled.clone();
        Ok(stream::iter(items)
            .inspect(move |item| {
                if item.is_ok() {
                    pulled.fetch_add(1, Ordering::SeqCst);
                }
            })
            .boxed())
    }
}

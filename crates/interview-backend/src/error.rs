use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Malformed stream payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Backend configuration error: {0}")]
    Config(String),

    #[error("Scripted backend has no replies left")]
    ScriptExhausted,
}

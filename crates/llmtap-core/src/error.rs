//! Error types for llmtap Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Failure raised by the wrapped model invocation. Displays exactly as the
    /// underlying error so callers observe the original message.
    #[error(transparent)]
    Invocation(Box<dyn std::error::Error + Send + Sync>),

    #[error("Stream aborted: {0}")]
    StreamAborted(String),

    /// Payload could not be encoded or decoded by a client
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Provider rejected the call before any response was produced
    #[error("Provider error: {0}")]
    Provider(String),
}

impl Error {
    /// Wrap any error (or message) raised by a model invocation
    pub fn invocation(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Invocation(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

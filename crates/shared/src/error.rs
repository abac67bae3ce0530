use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serializable tag for the cause of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Decode,
    MissingSlot,
    Storage,
}

#[derive(Debug, Error)]
pub enum JokeError {
    /// The remote request failed or returned a non-success status.
    #[error("network error: {0}")]
    Network(String),
    /// A response body or stored payload could not be parsed.
    #[error("decode error: {0}")]
    Decode(String),
    #[error("storage slot '{key}' is not initialized")]
    MissingSlot { key: String },
    /// The slot backend itself failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl JokeError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn missing_slot(key: impl Into<String>) -> Self {
        Self::MissingSlot { key: key.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Decode(_) => ErrorKind::Decode,
            Self::MissingSlot { .. } => ErrorKind::MissingSlot,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<serde_json::Error> for JokeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

pub type JokeResult<T> = Result<T, JokeError>;

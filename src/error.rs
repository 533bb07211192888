//! Error taxonomy shared by the indexing and history layers.
//!
//! None of these are fatal to the caller: the indexer turns
//! [`MediaError::SourceUnavailable`] into an empty scan, and the history and
//! log stores turn [`MediaError::DataCorruption`] into an empty list.

/// Errors surfaced by catalog sources, persistence and stream handling.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The catalog could not be queried at all.
    #[error("media catalog unavailable: {0}")]
    SourceUnavailable(String),

    /// A persisted value could not be parsed.
    #[error("corrupt persisted data: {0}")]
    DataCorruption(String),

    /// The key-value store rejected a write.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// A stream address was not an http(s) URL.
    #[error("invalid stream url: {0}")]
    InvalidStreamUrl(String),

    /// The background worker went away before delivering a result.
    #[error("background task abandoned")]
    Abandoned,
}

impl MediaError {
    pub fn source_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        Self::DataCorruption(msg.into())
    }

    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Self::Persistence(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;

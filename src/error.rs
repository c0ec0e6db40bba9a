//! Error types for the Lectio engine

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error type
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown translation or verse reference.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed remote or snapshot payload.
    #[error("malformed payload: {0}")]
    Format(String),

    /// Stored data violates an integrity invariant.
    #[error("corrupted data: {0}")]
    DataCorruption(String),

    /// I/O fault from the durable store.
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// Snapshot written by a newer engine than this one.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(i64),

    /// Caller-initiated abort; not a true failure.
    #[error("operation cancelled")]
    Cancelled,

    /// Remote fetch failure.
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),
}

impl Error {
    /// Whether this error represents a caller-initiated cancellation rather
    /// than a real failure. Callers use this to avoid surfacing a cancelled
    /// install as a user-visible error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

//! Shared error types for the chanvault workspace.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the backup engine.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed persisted state (bad line in a state file).
    #[error("State parse error: {0}")]
    StateParse(String),

    /// The platform refused access to a channel's history.
    #[error("Insufficient permission for channel {0}")]
    PermissionDenied(u64),

    /// Error from the platform client adapter (pagination, directory).
    #[error("Platform error: {0}")]
    Platform(String),

    /// HTTP fetch failure.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error means "skip the channel for this sweep pass"
    /// rather than "something is broken".
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Error::PermissionDenied(_))
    }
}

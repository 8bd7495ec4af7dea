//! Error types for gigdash.

use thiserror::Error;

/// Result type alias using gigdash's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for gigdash operations.
///
/// Nothing on the event delivery path surfaces these to producers:
/// [`crate::EventBus::emit`] logs and swallows them. They exist for the
/// adapter contract, the client transport, and configuration loading.
#[derive(Error, Debug)]
pub enum Error {
    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The bus or adapter was destroyed and no longer accepts events
    #[error("Event bus closed")]
    BusClosed,

    /// Adapter-specific publish/subscribe failure
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// Streaming transport failed (connect, read, decode)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server answered the stream request with a non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

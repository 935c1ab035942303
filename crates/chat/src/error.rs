//! Error types for the chat client.

use thiserror::Error;

/// Client errors.
///
/// Connection errors carry the address so the message tells the user which
/// server could not be reached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The server could not be reached.
    ///
    /// Usually the server is not running or listens on another address.
    #[error("Failed to connect to {addr}: {error}")]
    Connect { addr: String, error: String },

    /// The server did not accept the connection in time.
    #[error("Timed out connecting to {addr}")]
    ConnectTimeout { addr: String },

    /// Reading from the server or writing to the output failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err.to_string())
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

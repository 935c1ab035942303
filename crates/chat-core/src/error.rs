//! Domain-specific error types following panic-free policy.

use crate::SessionState;
use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Display name was empty after trimming
    #[error("Display name must not be empty")]
    EmptyName,

    /// Display name contains a character reserved by the protocol
    #[error("Display name must not contain '{ch}'")]
    ReservedCharacter { ch: char },

    /// Display name has whitespace between words and could not be addressed
    #[error("Display name must be a single word")]
    InnerWhitespace,

    /// Session state machine was asked for a transition it does not allow
    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

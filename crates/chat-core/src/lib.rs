//! Chat Core - Shared domain types for TcpChat
//!
//! This crate provides the domain types shared between the daemon
//! (chatd), the wire protocol and the client.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod identity;
pub mod state;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use identity::{DisplayName, SlotId, ADDRESS_CHAR};
pub use state::SessionState;

//! TcpChat client library
//!
//! Bridges a line-oriented input and output (usually the terminal) to a
//! chat server:
//! - `client` - `ChatClient` and its `ClientConfig`
//! - `error` - `ClientError`
//!
//! **Panic-Free Policy:** This crate follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

pub mod client;
pub mod error;

pub use client::{ChatClient, ClientConfig, ClientStats};
pub use error::{ClientError, Result};

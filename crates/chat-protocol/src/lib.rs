//! Chat Protocol - Line-oriented wire protocol for TcpChat
//!
//! Every message is one line of UTF-8 text terminated by `\n` (a trailing
//! `\r` is tolerated). This crate provides:
//! - `parse` - classification of lines sent by clients
//! - `message` - the lines the server sends back

pub mod message;
pub mod parse;

pub use chat_core::ADDRESS_CHAR;
pub use message::ServerNotice;
pub use parse::{strip_line_ending, ClientLine};

/// Exact line a client sends to leave the chat.
pub const QUIT_COMMAND: &str = "/quit";

/// Prefix of the server's farewell line. Clients may not send lines that
/// start with it.
pub const FAREWELL_PREFIX: &str = "*** Bye";

/// Default TCP port the daemon listens on.
pub const DEFAULT_PORT: u16 = 2222;

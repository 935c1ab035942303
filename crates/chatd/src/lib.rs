//! TcpChat daemon - session registry, message router and TCP listener
//!
//! This crate provides the server side of the chat room:
//! - `registry` - Slot table actor tracking who is connected and under which name
//! - `router` - Broadcast and directed delivery over registry snapshots
//! - `server` - TCP accept loop and the per-connection `ChatSession`
//! - `sink` - Shared, serialized write half of a client connection
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         chatd                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   ChatServer    │────▶│     RegistryActor           │   │
//! │  │ (TcpListener)   │     │  (slot table owner)         │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ snapshots         │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  ChatSession    │────▶│     MessageRouter           │   │
//! │  │  (per client)   │     │  (writes to LineSinks)      │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod registry;
pub mod router;
pub mod server;
pub mod sink;

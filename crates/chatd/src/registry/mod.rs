//! Session registry using Actor pattern.
//!
//! The registry is the single source of truth for "who is currently
//! chatting": a fixed-capacity table of slots, each holding at most one
//! session. It receives commands via a tokio mpsc channel and answers each
//! one on a oneshot channel, so every registry operation is serialized.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  ChatSession /  │────▶│  RegistryActor  │────▶│ Broadcast Channel│
//! │  MessageRouter  │     │  (slot table)   │     │   (ChatEvent)    │
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │                        │
//!         │   RegistryCommand     │                        │
//!         │   (mpsc channel)      │                        │
//!         ▼                       ▼                        ▼
//!    acquire / bind /      Vec<Option<SlotEntry>>    event logger,
//!    release / snapshot                              tests
//! ```
//!
//! The actor never performs network I/O: `snapshot` and `lookup_by_name`
//! return sink clones and callers write outside the actor.
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{
    ChatEvent, DepartureReason, Occupancy, Recipient, RegistryCommand, RegistryError, SlotHandle,
};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Default maximum number of concurrent clients
pub const DEFAULT_MAX_CLIENTS: usize = 10;

/// Spawn the registry actor and return a handle for interaction.
///
/// This function:
/// 1. Creates command and event channels
/// 2. Spawns the RegistryActor with `capacity` slots on a tokio task
/// 3. Returns a RegistryHandle for client use
///
/// The actor stops once every handle has been dropped.
///
/// # Example
///
/// ```no_run
/// use chatd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let registry = spawn_registry(10);
///
///     let occupancy = registry.occupancy().await;
///     assert_eq!(occupancy.capacity, 10);
/// }
/// ```
pub fn spawn_registry(capacity: usize) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(capacity, cmd_rx, event_tx.clone());
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}

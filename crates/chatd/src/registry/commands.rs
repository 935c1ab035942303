//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `ChatEvent`: Structured events published for observers (logging, tests)
//!
//! All types are designed for async message passing and follow the panic-free policy.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::oneshot;

use chat_core::{DisplayName, SlotId};

use crate::sink::LineSink;

// ============================================================================
// Slot Handles
// ============================================================================

/// Proof of occupancy for one registry slot.
///
/// Handed out by `try_acquire_slot`. The lease number is unique per
/// acquisition, so a handle kept after its slot was released and reused
/// can never bind a name on, or release, the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    slot: SlotId,
    lease: u64,
}

impl SlotHandle {
    pub(crate) fn new(slot: SlotId, lease: u64) -> Self {
        Self { slot, lease }
    }

    /// Returns the slot this handle refers to.
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub(crate) fn lease(&self) -> u64 {
        self.lease
    }
}

/// A named, occupied slot as seen by the router.
#[derive(Debug, Clone)]
pub struct Recipient {
    /// Slot of the session
    pub slot: SlotId,
    /// Bound display name
    pub name: DisplayName,
    /// Where to write lines for this session
    pub sink: LineSink,
}

/// Point-in-time slot usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Occupancy {
    /// Slots holding a session (named or not)
    pub occupied: usize,
    /// Slots whose session finished the naming handshake
    pub named: usize,
    /// Total number of slots
    pub capacity: usize,
}

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Claim the lowest free slot for a new connection.
    ///
    /// # Errors
    /// - `RegistryError::Full` if every slot is occupied
    TryAcquireSlot {
        /// Write half of the new connection
        sink: LineSink,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<SlotHandle, RegistryError>>,
    },

    /// Bind a display name to a held slot (atomic check-and-set).
    ///
    /// # Errors
    /// - `RegistryError::NameTaken` if another occupied slot has this name
    /// - `RegistryError::SlotNotHeld` if the handle no longer owns the slot
    /// - `RegistryError::AlreadyNamed` if the slot already has a name
    BindName {
        /// Slot to name
        handle: SlotHandle,
        /// Validated display name
        name: DisplayName,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Free a slot. Idempotent; responds `true` only if a slot was cleared.
    Release {
        /// Slot to free
        handle: SlotHandle,
        /// Why the session is going away
        reason: DepartureReason,
        /// Channel to send the result
        respond_to: oneshot::Sender<bool>,
    },

    /// All named, occupied slots in slot order.
    Snapshot {
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<Recipient>>,
    },

    /// Find the session with the given display name.
    LookupByName {
        /// Name to look for (exact, case-sensitive)
        name: String,
        /// Channel to send the result
        respond_to: oneshot::Sender<Option<Recipient>>,
    },

    /// Current slot usage.
    Occupancy {
        /// Channel to send the result
        respond_to: oneshot::Sender<Occupancy>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
///
/// Uses `thiserror` for ergonomic error handling and Display implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Every slot is occupied.
    #[error("registry is full (max: {max} clients)")]
    Full {
        /// Number of slots
        max: usize,
    },

    /// Another active session already uses this name.
    #[error("name already taken: {0}")]
    NameTaken(DisplayName),

    /// The handle does not own its slot (released or reused).
    #[error("slot {0} is not held by this handle")]
    SlotNotHeld(SlotId),

    /// The slot already completed the naming handshake.
    #[error("slot {0} already has a name")]
    AlreadyNamed(SlotId),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Chat Events
// ============================================================================

/// Events published by the registry and the router.
///
/// Delivered over a broadcast channel; observers subscribe through
/// `RegistryHandle::subscribe`.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A connection was admitted into a slot.
    SlotAcquired {
        slot: SlotId,
        occupied: usize,
        capacity: usize,
    },

    /// A session completed the naming handshake.
    Joined {
        slot: SlotId,
        name: DisplayName,
        at: DateTime<Utc>,
    },

    /// A session released its slot.
    Left {
        slot: SlotId,
        /// `None` if the client left before choosing a name
        name: Option<DisplayName>,
        reason: DepartureReason,
        connected_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// A connection was turned away because every slot was occupied.
    Rejected { capacity: usize },

    /// Writing a message to a recipient failed.
    DeliveryFailed {
        slot: SlotId,
        name: DisplayName,
        error: String,
    },
}

/// Reason why a session left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureReason {
    /// Client sent the quit command.
    Quit,

    /// Client closed the connection.
    Disconnected,

    /// Reading from or writing to the client failed.
    TransportFailure,

    /// Client was silent for longer than the configured idle timeout.
    IdleTimeout,

    /// The server is shutting down.
    Shutdown,
}

impl std::fmt::Display for DepartureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quit => write!(f, "quit command"),
            Self::Disconnected => write!(f, "connection closed by client"),
            Self::TransportFailure => write!(f, "transport failure"),
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::Shutdown => write!(f, "server shutdown"),
        }
    }
}

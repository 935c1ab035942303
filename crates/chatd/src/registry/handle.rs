//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor and subscribing to chat events.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};

use chat_core::DisplayName;

use super::commands::{
    ChatEvent, DepartureReason, Occupancy, Recipient, RegistryCommand, RegistryError, SlotHandle,
};
use crate::sink::LineSink;

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across session tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// let handle = registry.try_acquire_slot(sink).await?;
/// registry.bind_name(handle, DisplayName::parse("alice")?).await?;
///
/// for recipient in registry.snapshot().await {
///     recipient.sink.send_line("hello").await?;
/// }
///
/// registry.release(handle, DepartureReason::Quit).await;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for observers
    event_sender: broadcast::Sender<ChatEvent>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The command channel sender for communicating with the actor
    /// * `event_sender` - The broadcast sender for publishing and subscribing to events
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<ChatEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Claim a free slot for a new connection.
    ///
    /// The sink is stored in the slot so the router can reach the session
    /// once it has a name.
    ///
    /// # Errors
    ///
    /// - `RegistryError::Full` if every slot is occupied
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn try_acquire_slot(&self, sink: LineSink) -> Result<SlotHandle, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::TryAcquireSlot {
                sink,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Bind a display name to a held slot.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NameTaken` if another active session uses the name
    /// - `RegistryError::SlotNotHeld` if the handle no longer owns its slot
    /// - `RegistryError::AlreadyNamed` if the slot is already named
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn bind_name(
        &self,
        handle: SlotHandle,
        name: DisplayName,
    ) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::BindName {
                handle,
                name,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Free a slot.
    ///
    /// Returns `true` if the slot was cleared, `false` if the handle no
    /// longer owned it (already released) or the actor is gone.
    pub async fn release(&self, handle: SlotHandle, reason: DepartureReason) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Release {
                handle,
                reason,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Get every named session, in slot order.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn snapshot(&self) -> Vec<Recipient> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Find a named session.
    ///
    /// Returns `None` if nobody uses the name or if communication with
    /// the actor fails.
    pub async fn lookup_by_name(&self, name: &str) -> Option<Recipient> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::LookupByName {
                name: name.to_string(),
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Get current slot usage.
    ///
    /// Returns the default (all zero) if communication with the actor fails.
    pub async fn occupancy(&self) -> Occupancy {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Occupancy { respond_to: tx })
            .await
            .is_err()
        {
            return Occupancy::default();
        }

        rx.await.unwrap_or_default()
    }

    /// Subscribe to chat events.
    ///
    /// This is a synchronous operation - it doesn't communicate with the actor.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_sender.subscribe()
    }

    /// Publish an event on behalf of a component outside the actor.
    ///
    /// Ignored when nobody is subscribed.
    pub fn publish(&self, event: ChatEvent) {
        let _ = self.event_sender.send(event);
    }

    /// Check if the actor is still running.
    ///
    /// Returns `true` if the command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

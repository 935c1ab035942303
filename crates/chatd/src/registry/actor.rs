//! Registry actor - owns the slot table and processes commands.
//!
//! The RegistryActor is the single owner of "who is currently chatting".
//! It receives commands via an mpsc channel and publishes events via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Slots are accessed with `get`/`get_mut`, never by indexing
//! - Channel send failures are ignored (the requester went away)

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use chat_core::{DisplayName, SlotId};

use super::commands::{
    ChatEvent, DepartureReason, Occupancy, Recipient, RegistryCommand, RegistryError, SlotHandle,
};
use crate::sink::LineSink;

/// Occupant of one slot.
struct SlotEntry {
    /// Acquisition number, matched against `SlotHandle::lease`
    lease: u64,
    sink: LineSink,
    name: Option<DisplayName>,
    acquired_at: DateTime<Utc>,
}

impl SlotEntry {
    fn recipient(&self, slot: SlotId) -> Option<Recipient> {
        let name = self.name.clone()?;
        Some(Recipient {
            slot,
            name,
            sink: self.sink.clone(),
        })
    }
}

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns the fixed-size slot table.
///
/// Implements the actor pattern: receives commands via mpsc channel,
/// processes them sequentially, and publishes events to subscribers.
///
/// # Thread Safety
///
/// The actor runs in a single task and processes commands one at a time,
/// so every command is atomic with respect to every other. In particular
/// the name check-and-set in `BindName` can never interleave with another
/// bind or a release. The actor never writes to a transport; it only hands
/// out sink clones.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Slot table; its length is the capacity and never changes
    slots: Vec<Option<SlotEntry>>,

    /// Next lease number to hand out
    next_lease: u64,

    /// Event publisher for observers
    event_publisher: broadcast::Sender<ChatEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor with `capacity` empty slots.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of concurrent sessions
    /// * `receiver` - Channel for receiving commands
    /// * `event_publisher` - Broadcast channel for publishing events
    pub fn new(
        capacity: usize,
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<ChatEvent>,
    ) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            receiver,
            slots,
            next_lease: 0,
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!(capacity = self.capacity(), "Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            occupied = self.occupancy().occupied,
            "Registry actor stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::TryAcquireSlot { sink, respond_to } => {
                let result = self.handle_try_acquire(sink);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::BindName {
                handle,
                name,
                respond_to,
            } => {
                let result = self.handle_bind_name(handle, name);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Release {
                handle,
                reason,
                respond_to,
            } => {
                let released = self.handle_release(handle, reason);
                let _ = respond_to.send(released);
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
            RegistryCommand::LookupByName { name, respond_to } => {
                let _ = respond_to.send(self.lookup(&name));
            }
            RegistryCommand::Occupancy { respond_to } => {
                let _ = respond_to.send(self.occupancy());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_try_acquire(&mut self, sink: LineSink) -> Result<SlotHandle, RegistryError> {
        let capacity = self.capacity();

        let Some((index, free)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, entry)| entry.is_none())
        else {
            warn!(capacity, "Registry is full, rejecting connection");
            let _ = self
                .event_publisher
                .send(ChatEvent::Rejected { capacity });
            return Err(RegistryError::Full { max: capacity });
        };

        let lease = self.next_lease;
        self.next_lease = self.next_lease.wrapping_add(1);

        *free = Some(SlotEntry {
            lease,
            sink,
            name: None,
            acquired_at: Utc::now(),
        });

        let slot = SlotId::new(index);
        let occupied = self.occupancy().occupied;

        debug!(slot = %slot, lease, occupied, capacity, "Slot acquired");

        let _ = self.event_publisher.send(ChatEvent::SlotAcquired {
            slot,
            occupied,
            capacity,
        });

        Ok(SlotHandle::new(slot, lease))
    }

    fn handle_bind_name(
        &mut self,
        handle: SlotHandle,
        name: DisplayName,
    ) -> Result<(), RegistryError> {
        let slot = handle.slot();

        let taken = self.slots.iter().enumerate().any(|(index, entry)| {
            index != slot.index()
                && entry
                    .as_ref()
                    .and_then(|e| e.name.as_ref())
                    .is_some_and(|existing| *existing == name)
        });

        let entry = self
            .slots
            .get_mut(slot.index())
            .and_then(Option::as_mut)
            .filter(|entry| entry.lease == handle.lease())
            .ok_or(RegistryError::SlotNotHeld(slot))?;

        if entry.name.is_some() {
            return Err(RegistryError::AlreadyNamed(slot));
        }

        if taken {
            debug!(slot = %slot, name = %name, "Name already taken");
            return Err(RegistryError::NameTaken(name));
        }

        entry.name = Some(name.clone());

        debug!(slot = %slot, name = %name, "Name bound");

        let _ = self.event_publisher.send(ChatEvent::Joined {
            slot,
            name,
            at: Utc::now(),
        });

        Ok(())
    }

    fn handle_release(&mut self, handle: SlotHandle, reason: DepartureReason) -> bool {
        let slot = handle.slot();

        let Some(cell) = self.slots.get_mut(slot.index()) else {
            return false;
        };

        let owned = cell
            .as_ref()
            .is_some_and(|entry| entry.lease == handle.lease());
        if !owned {
            debug!(slot = %slot, "Release of a slot not held by this handle, ignoring");
            return false;
        }

        let Some(entry) = cell.take() else {
            return false;
        };

        debug!(
            slot = %slot,
            name = ?entry.name.as_ref().map(DisplayName::as_str),
            reason = %reason,
            "Slot released"
        );

        let _ = self.event_publisher.send(ChatEvent::Left {
            slot,
            name: entry.name,
            reason,
            connected_at: entry.acquired_at,
            at: Utc::now(),
        });

        true
    }

    fn snapshot(&self) -> Vec<Recipient> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.as_ref()?.recipient(SlotId::new(index)))
            .collect()
    }

    fn lookup(&self, name: &str) -> Option<Recipient> {
        self.slots.iter().enumerate().find_map(|(index, entry)| {
            let entry = entry.as_ref()?;
            if entry.name.as_ref()? == name {
                entry.recipient(SlotId::new(index))
            } else {
                None
            }
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the current slot usage.
    pub fn occupancy(&self) -> Occupancy {
        let occupied = self.slots.iter().flatten().count();
        let named = self
            .slots
            .iter()
            .flatten()
            .filter(|entry| entry.name.is_some())
            .count();

        Occupancy {
            occupied,
            named,
            capacity: self.capacity(),
        }
    }
}

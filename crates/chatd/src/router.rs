//! Message routing over the session registry.
//!
//! The router holds no state of its own. For every delivery it asks the
//! registry for a snapshot (or a point lookup) and then writes to the
//! recipients' sinks outside the actor, one recipient at a time in slot
//! order. A failed write is logged, published as `ChatEvent::DeliveryFailed`
//! and skipped; it never stops delivery to the remaining recipients.

use tracing::{debug, warn};

use chat_core::SlotId;
use chat_protocol::ServerNotice;

use crate::registry::{ChatEvent, Recipient, RegistryHandle};
use crate::sink::{LineSink, SinkError};

/// Result of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Number of recipients a write was attempted for
    pub attempted: usize,
    /// Number of successful writes
    pub delivered: usize,
    /// Slots whose write failed
    pub failed: Vec<SlotId>,
}

/// What happened to a directed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectedOutcome {
    /// Delivered to the target and echoed to the sender.
    Delivered { to: SlotId },

    /// The sender addressed itself; only a notice was sent back.
    SelfAddressed,

    /// Nobody with that name is online.
    UnknownTarget,

    /// The target exists but writing to it failed; no echo was sent.
    Undeliverable { to: SlotId },
}

/// Stateless broadcast and unicast delivery.
#[derive(Clone)]
pub struct MessageRouter {
    registry: RegistryHandle,
    notify_unknown_target: bool,
}

impl MessageRouter {
    /// Creates a router that silently drops messages to unknown names.
    pub fn new(registry: RegistryHandle) -> Self {
        Self {
            registry,
            notify_unknown_target: false,
        }
    }

    /// Makes the router tell senders when a directed message has no target.
    #[must_use]
    pub fn with_unknown_target_notice(mut self, enabled: bool) -> Self {
        self.notify_unknown_target = enabled;
        self
    }

    /// Delivers `line` to every named session.
    pub async fn broadcast(&self, line: &str) -> DeliveryReport {
        let recipients = self.registry.snapshot().await;
        self.deliver_all(recipients.iter(), line).await
    }

    /// Delivers `line` to every named session except `sender`.
    pub async fn broadcast_except(&self, line: &str, sender: SlotId) -> DeliveryReport {
        let recipients = self.registry.snapshot().await;
        self.deliver_all(recipients.iter().filter(|r| r.slot != sender), line)
            .await
    }

    /// Sends `body` from `sender` to the session named `target`.
    ///
    /// The target receives `<sender> body`; the sender gets `>sender> body`
    /// back once the target's write succeeded.
    ///
    /// # Errors
    ///
    /// Returns the sink error if writing to the *sender's own* transport
    /// fails. Failures towards the target are reported through
    /// `DirectedOutcome::Undeliverable` instead.
    pub async fn send_directed(
        &self,
        sender: &Recipient,
        target: &str,
        body: &str,
    ) -> Result<DirectedOutcome, SinkError> {
        if sender.name == target {
            sender
                .sink
                .send_line(&ServerNotice::SelfMessage.to_string())
                .await?;
            return Ok(DirectedOutcome::SelfAddressed);
        }

        let Some(recipient) = self.registry.lookup_by_name(target).await else {
            debug!(from = %sender.name, to = target, "Directed message to unknown user dropped");
            if self.notify_unknown_target {
                sender
                    .sink
                    .send_line(&ServerNotice::UnknownTarget(target).to_string())
                    .await?;
            }
            return Ok(DirectedOutcome::UnknownTarget);
        };

        let from = sender.name.as_str();
        let delivery = ServerNotice::Chat { from, body }.to_string();
        if !self.deliver(&recipient, &delivery).await {
            return Ok(DirectedOutcome::Undeliverable { to: recipient.slot });
        }

        sender
            .sink
            .send_line(&ServerNotice::DirectedEcho { from, body }.to_string())
            .await?;

        Ok(DirectedOutcome::Delivered { to: recipient.slot })
    }

    async fn deliver_all<'a>(
        &self,
        recipients: impl Iterator<Item = &'a Recipient>,
        line: &str,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for recipient in recipients {
            report.attempted += 1;
            if self.deliver(recipient, line).await {
                report.delivered += 1;
            } else {
                report.failed.push(recipient.slot);
            }
        }

        report
    }

    /// Writes one line to one recipient; returns false on failure.
    async fn deliver(&self, recipient: &Recipient, line: &str) -> bool {
        match recipient.sink.send_line(line).await {
            Ok(()) => true,
            Err(e) => {
                // A closed sink belongs to a session that is tearing down
                if e == SinkError::Closed {
                    debug!(
                        slot = %recipient.slot,
                        name = %recipient.name,
                        "Skipping closed recipient"
                    );
                } else {
                    warn!(
                        slot = %recipient.slot,
                        name = %recipient.name,
                        error = %e,
                        "Failed to deliver message"
                    );
                }
                self.registry.publish(ChatEvent::DeliveryFailed {
                    slot: recipient.slot,
                    name: recipient.name.clone(),
                    error: e.to_string(),
                });
                false
            }
        }
    }
}

/// Convenience for sending a notice to a single sink.
pub(crate) async fn send_notice(
    sink: &LineSink,
    notice: ServerNotice<'_>,
) -> Result<(), SinkError> {
    sink.send_line(&notice.to_string()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{spawn_registry, SlotHandle};
    use chat_core::DisplayName;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};
    use tokio::time::timeout;

    struct Peer {
        handle: SlotHandle,
        me: Recipient,
        reader: BufReader<DuplexStream>,
    }

    impl Peer {
        async fn next_line(&mut self) -> String {
            let mut line = String::new();
            timeout(Duration::from_secs(1), self.reader.read_line(&mut line))
                .await
                .expect("timed out waiting for a line")
                .unwrap();
            line.trim_end_matches('\n').to_string()
        }

        async fn assert_silent(&mut self) {
            let mut line = String::new();
            let result =
                timeout(Duration::from_millis(100), self.reader.read_line(&mut line)).await;
            assert!(result.is_err(), "unexpected line: {line:?}");
        }
    }

    async fn join(registry: &RegistryHandle, name: &str) -> Peer {
        let (server, client) = tokio::io::duplex(4096);
        let sink = LineSink::new(server);
        let handle = registry.try_acquire_slot(sink.clone()).await.unwrap();
        let name = DisplayName::parse(name).unwrap();
        registry.bind_name(handle, name.clone()).await.unwrap();
        Peer {
            handle,
            me: Recipient {
                slot: handle.slot(),
                name,
                sink,
            },
            reader: BufReader::new(client),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_named_session() {
        let registry = spawn_registry(5);
        let router = MessageRouter::new(registry.clone());
        let mut a = join(&registry, "alice").await;
        let mut b = join(&registry, "bob").await;
        let mut c = join(&registry, "carol").await;

        // Unnamed sessions are not recipients
        registry
            .try_acquire_slot(LineSink::new(tokio::io::sink()))
            .await
            .unwrap();

        let report = router.broadcast("*** notice ***").await;
        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 3);
        assert!(report.failed.is_empty());

        for peer in [&mut a, &mut b, &mut c] {
            assert_eq!(peer.next_line().await, "*** notice ***");
        }
    }

    #[tokio::test]
    async fn test_broadcast_except_skips_sender() {
        let registry = spawn_registry(5);
        let router = MessageRouter::new(registry.clone());
        let mut a = join(&registry, "alice").await;
        let mut b = join(&registry, "bob").await;
        let mut c = join(&registry, "carol").await;

        let report = router
            .broadcast_except("<alice> hi all", a.handle.slot())
            .await;
        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 2);

        assert_eq!(b.next_line().await, "<alice> hi all");
        assert_eq!(c.next_line().await, "<alice> hi all");
        a.assert_silent().await;
    }

    #[tokio::test]
    async fn test_failed_recipient_does_not_stop_delivery() {
        let registry = spawn_registry(5);
        let router = MessageRouter::new(registry.clone());
        let mut events = registry.subscribe();

        let a = join(&registry, "alice").await;
        let mut b = join(&registry, "bob").await;
        let mut c = join(&registry, "carol").await;

        // alice's client vanished without the session noticing yet
        drop(a.reader);

        let report = router.broadcast("ping").await;
        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, vec![a.handle.slot()]);
        assert_eq!(b.next_line().await, "ping");
        assert_eq!(c.next_line().await, "ping");

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let ChatEvent::DeliveryFailed { slot, .. } = event {
                assert_eq!(slot, a.handle.slot());
                saw_failure = true;
            }
        }
        assert!(saw_failure, "expected a DeliveryFailed event");
    }

    #[tokio::test]
    async fn test_directed_delivery_and_echo() {
        let registry = spawn_registry(5);
        let router = MessageRouter::new(registry.clone());
        let mut alice = join(&registry, "alice").await;
        let mut bob = join(&registry, "bob").await;
        let mut carol = join(&registry, "carol").await;

        let outcome = router.send_directed(&alice.me, "bob", "hello").await.unwrap();
        assert_eq!(outcome, DirectedOutcome::Delivered { to: bob.handle.slot() });

        assert_eq!(bob.next_line().await, "<alice> hello");
        assert_eq!(alice.next_line().await, ">alice> hello");
        carol.assert_silent().await;
    }

    #[tokio::test]
    async fn test_directed_to_self_only_notifies_sender() {
        let registry = spawn_registry(5);
        let router = MessageRouter::new(registry.clone());
        let mut alice = join(&registry, "alice").await;
        let mut bob = join(&registry, "bob").await;

        let outcome = router.send_directed(&alice.me, "alice", "hi").await.unwrap();
        assert_eq!(outcome, DirectedOutcome::SelfAddressed);
        assert_eq!(
            alice.next_line().await,
            "You can't send a private message to yourself"
        );
        alice.assert_silent().await;
        bob.assert_silent().await;
    }

    #[tokio::test]
    async fn test_directed_to_unknown_target_is_dropped() {
        let registry = spawn_registry(5);
        let router = MessageRouter::new(registry.clone());
        let mut alice = join(&registry, "alice").await;

        let outcome = router.send_directed(&alice.me, "zed", "anyone?").await.unwrap();
        assert_eq!(outcome, DirectedOutcome::UnknownTarget);
        alice.assert_silent().await;
    }

    #[tokio::test]
    async fn test_unknown_target_notice_when_enabled() {
        let registry = spawn_registry(5);
        let router = MessageRouter::new(registry.clone()).with_unknown_target_notice(true);
        let mut alice = join(&registry, "alice").await;

        let outcome = router.send_directed(&alice.me, "zed", "anyone?").await.unwrap();
        assert_eq!(outcome, DirectedOutcome::UnknownTarget);
        assert_eq!(alice.next_line().await, "*** No user named zed is online ***");
    }

    #[tokio::test]
    async fn test_directed_to_dead_target_sends_no_echo() {
        let registry = spawn_registry(5);
        let router = MessageRouter::new(registry.clone());
        let mut alice = join(&registry, "alice").await;
        let bob = join(&registry, "bob").await;
        bob.me.sink.close().await;

        let outcome = router.send_directed(&alice.me, "bob", "still there?").await.unwrap();
        assert_eq!(outcome, DirectedOutcome::Undeliverable { to: bob.handle.slot() });
        alice.assert_silent().await;
    }

    #[tokio::test]
    async fn test_sender_write_failure_is_returned() {
        let registry = spawn_registry(5);
        let router = MessageRouter::new(registry.clone());
        let alice = join(&registry, "alice").await;
        alice.me.sink.close().await;

        let result = router.send_directed(&alice.me, "alice", "hi").await;
        assert_eq!(result, Err(SinkError::Closed));
    }
}

//! Per-connection chat session.
//!
//! Each accepted client gets its own `ChatSession` that:
//! - Claims a registry slot (`admit`)
//! - Runs the naming handshake
//! - Reads and dispatches one line at a time
//! - Announces the departure and frees its slot on the way out
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Transport errors end the session through the normal teardown path

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use chat_core::{DisplayName, DomainError, SessionState, SlotId};
use chat_protocol::{strip_line_ending, ClientLine, ServerNotice};

use crate::registry::{DepartureReason, Recipient, RegistryError, RegistryHandle, SlotHandle};
use crate::router::{send_notice, MessageRouter};
use crate::sink::{LineSink, SinkError};

/// Maximum accepted line length in bytes, line ending excluded (64 KiB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Behaviour switches for sessions.
///
/// The default reproduces the classic chat room: no idle timeout, chat lines
/// are not echoed to their sender, and directed messages to unknown users
/// vanish silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Close a session after this long without a complete line
    pub idle_timeout: Option<Duration>,
    /// Longest line a client may send
    pub max_line_length: usize,
    /// Deliver chat lines to their sender as well
    pub echo_own_messages: bool,
    /// Tell the sender when a directed message has no recipient
    pub notify_unknown_target: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            max_line_length: MAX_LINE_LENGTH,
            echo_own_messages: false,
            notify_unknown_target: false,
        }
    }
}

/// How a finished session went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub slot: SlotId,
    pub name: Option<DisplayName>,
    pub reason: DepartureReason,
}

/// A client connection that holds a registry slot.
pub struct ChatSession<R> {
    reader: BufReader<R>,
    sink: LineSink,
    registry: RegistryHandle,
    router: MessageRouter,
    config: SessionConfig,
    cancel_token: CancellationToken,
    handle: SlotHandle,
    name: Option<DisplayName>,
    state: SessionState,
}

impl<R> ChatSession<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Claims a registry slot for a new connection.
    ///
    /// # Errors
    ///
    /// - `SessionError::CapacityExceeded` if every slot is taken. The caller
    ///   owns the transport and decides what to tell the client.
    /// - `SessionError::Registry` if the registry is gone
    pub async fn admit(
        reader: R,
        sink: LineSink,
        registry: RegistryHandle,
        config: SessionConfig,
        cancel_token: CancellationToken,
    ) -> Result<Self, SessionError> {
        let handle = match registry.try_acquire_slot(sink.clone()).await {
            Ok(handle) => handle,
            Err(RegistryError::Full { max }) => {
                return Err(SessionError::CapacityExceeded { max });
            }
            Err(e) => return Err(SessionError::Registry(e)),
        };

        let router = MessageRouter::new(registry.clone())
            .with_unknown_target_notice(config.notify_unknown_target);

        Ok(Self {
            reader: BufReader::new(reader),
            sink,
            registry,
            router,
            config,
            cancel_token,
            handle,
            name: None,
            state: SessionState::Connecting.transition(SessionState::Naming)?,
        })
    }

    /// Returns the slot this session occupies.
    pub fn slot(&self) -> SlotId {
        self.handle.slot()
    }

    /// Runs the session to completion.
    ///
    /// Never fails: every way out of the read loop ends in the same
    /// teardown, and the reason is reported in the summary.
    pub async fn run(mut self) -> SessionSummary {
        let slot = self.slot();
        debug!(slot = %slot, "Session started");

        let outcome = match self.negotiate_name().await {
            Ok(me) => self.process_lines(&me).await,
            Err(e) => Err(e),
        };

        let reason = match outcome {
            Ok(()) => DepartureReason::Quit,
            Err(e) => {
                let reason = e.departure_reason();
                match reason {
                    DepartureReason::TransportFailure => {
                        warn!(slot = %slot, name = ?self.name, error = %e, "Session failed");
                    }
                    _ => debug!(slot = %slot, name = ?self.name, error = %e, "Session ended"),
                }
                reason
            }
        };

        self.teardown(reason).await;

        SessionSummary {
            slot,
            name: self.name,
            reason,
        }
    }

    /// Prompts until the client picks a valid, unused name.
    async fn negotiate_name(&mut self) -> Result<Recipient, SessionError> {
        let name = loop {
            send_notice(&self.sink, ServerNotice::NamePrompt).await?;
            let line = self.read_line().await?;

            let candidate = match DisplayName::parse(&line) {
                Ok(name) => name,
                Err(e) => {
                    debug!(slot = %self.slot(), error = %e, "Rejected name");
                    send_notice(&self.sink, ServerNotice::InvalidName(&e)).await?;
                    continue;
                }
            };

            match self.registry.bind_name(self.handle, candidate.clone()).await {
                Ok(()) => break candidate,
                Err(RegistryError::NameTaken(taken)) => {
                    send_notice(&self.sink, ServerNotice::NameTaken(taken.as_str())).await?;
                }
                Err(e) => return Err(SessionError::Registry(e)),
            }
        };

        self.name = Some(name.clone());
        self.state = self.state.transition(SessionState::Active)?;

        let me = Recipient {
            slot: self.slot(),
            name,
            sink: self.sink.clone(),
        };

        debug!(slot = %me.slot, name = %me.name, "Client joined");

        self.router
            .broadcast_except(&ServerNotice::Joined(me.name.as_str()).to_string(), me.slot)
            .await;
        send_notice(&self.sink, ServerNotice::Welcome(me.name.as_str())).await?;

        Ok(me)
    }

    /// Reads and dispatches lines until the client quits.
    ///
    /// Returns `Ok(())` only for the quit command; every other exit is an
    /// error that names the reason.
    async fn process_lines(&mut self, me: &Recipient) -> Result<(), SessionError> {
        loop {
            let line = self.read_line().await?;

            match ClientLine::parse(&line) {
                ClientLine::Quit => {
                    debug!(slot = %me.slot, name = %me.name, "Client quit");
                    return Ok(());
                }
                ClientLine::ReservedPhrase => {
                    debug!(slot = %me.slot, name = %me.name, "Reserved phrase refused");
                    send_notice(&self.sink, ServerNotice::ReservedPhrase).await?;
                }
                ClientLine::Directed { target, body } => {
                    let outcome = self.router.send_directed(me, target, body).await?;
                    debug!(
                        slot = %me.slot,
                        name = %me.name,
                        to = target,
                        ?outcome,
                        "Directed message"
                    );
                }
                ClientLine::MalformedDirected => {
                    debug!(slot = %me.slot, name = %me.name, "Ignoring malformed directed message");
                }
                ClientLine::Chat(text) => {
                    let rendered = ServerNotice::Chat {
                        from: me.name.as_str(),
                        body: text,
                    }
                    .to_string();

                    let report = if self.config.echo_own_messages {
                        self.router.broadcast(&rendered).await
                    } else {
                        self.router.broadcast_except(&rendered, me.slot).await
                    };
                    debug!(
                        slot = %me.slot,
                        attempted = report.attempted,
                        delivered = report.delivered,
                        "Chat line delivered"
                    );
                }
            }
        }
    }

    /// Announces the departure, frees the slot and closes the transport.
    async fn teardown(&mut self, reason: DepartureReason) {
        let was_active = self.state == SessionState::Active;
        self.advance(SessionState::Closing);

        if let Some(name) = &self.name {
            if was_active {
                self.router
                    .broadcast_except(&ServerNotice::Left(name.as_str()).to_string(), self.slot())
                    .await;
            }

            if let Err(e) = send_notice(&self.sink, ServerNotice::Farewell(name.as_str())).await {
                debug!(slot = %self.slot(), error = %e, "Farewell not delivered");
            }
        }

        if !self.registry.release(self.handle, reason).await {
            debug!(slot = %self.slot(), "Slot was already released");
        }

        self.sink.close().await;
        self.advance(SessionState::Closed);

        debug!(slot = %self.slot(), name = ?self.name, reason = %reason, "Client left");
    }

    fn advance(&mut self, next: SessionState) {
        match self.state.transition(next) {
            Ok(state) => self.state = state,
            Err(e) => debug!(slot = %self.slot(), error = %e, "Ignoring state change"),
        }
    }

    /// Reads one line, honouring the idle timeout and server shutdown.
    async fn read_line(&mut self) -> Result<String, SessionError> {
        let idle_timeout = self.config.idle_timeout;
        let max = self.config.max_line_length;
        let read = read_bounded_line(&mut self.reader, max);

        let read = async {
            match idle_timeout {
                Some(limit) => match timeout(limit, read).await {
                    Ok(line) => line,
                    Err(_) => Err(SessionError::IdleTimeout(limit)),
                },
                None => read.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => Err(SessionError::Shutdown),
            line = read => line,
        }
    }
}

/// Reads a single line of at most `max` bytes plus its line ending.
///
/// A final line without a terminator is returned as-is; end of stream
/// before any byte is `SessionError::Eof`.
async fn read_bounded_line<R>(reader: &mut BufReader<R>, max: usize) -> Result<String, SessionError>
where
    R: AsyncRead + Unpin,
{
    // Room for "\r\n"
    let limit = max.saturating_add(2);
    let mut buf = Vec::new();

    let bytes_read = reader
        .take(limit as u64)
        .read_until(b'\n', &mut buf)
        .await
        .map_err(|e| SessionError::Io(e.to_string()))?;

    if bytes_read == 0 {
        return Err(SessionError::Eof);
    }

    if buf.last() != Some(&b'\n') && bytes_read >= limit {
        return Err(SessionError::LineTooLong { max });
    }

    let line = String::from_utf8(buf).map_err(|_| SessionError::InvalidUtf8)?;
    let stripped = strip_line_ending(&line);

    if stripped.len() > max {
        return Err(SessionError::LineTooLong { max });
    }

    Ok(stripped.to_string())
}

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("registry is full (max: {max} clients)")]
    CapacityExceeded { max: usize },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("connection closed")]
    Eof,

    #[error("no input for {0:?}")]
    IdleTimeout(Duration),

    #[error("line exceeds {max} bytes")]
    LineTooLong { max: usize },

    #[error("input is not valid UTF-8")]
    InvalidUtf8,

    #[error("server shutting down")]
    Shutdown,

    #[error("send failed: {0}")]
    Send(#[from] SinkError),

    #[error("registry error: {0}")]
    Registry(RegistryError),

    #[error("invalid session state: {0}")]
    State(#[from] DomainError),
}

impl SessionError {
    /// Maps the error to the reason recorded when the session leaves.
    pub fn departure_reason(&self) -> DepartureReason {
        match self {
            Self::Eof => DepartureReason::Disconnected,
            Self::IdleTimeout(_) => DepartureReason::IdleTimeout,
            Self::Shutdown => DepartureReason::Shutdown,
            _ => DepartureReason::TransportFailure,
        }
    }
}

//! TCP server for the chat daemon.
//!
//! The server:
//! - Listens on a TCP socket for client connections
//! - Spawns a `ChatSession` for each client that gets a slot
//! - Turns clients away with a busy notice when the registry is full
//! - Logs registry events
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │  TcpListener    │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │  ChatSession    │────▶│  RegistryHandle │
//! │   (per client)  │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         │
//!         │ MessageRouter
//!         ▼
//! ┌─────────────────┐
//! │  other clients  │
//! │   (LineSinks)   │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Server errors are logged and allow continued operation

mod session;

pub use session::{ChatSession, SessionConfig, SessionError, SessionSummary, MAX_LINE_LENGTH};

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chat_protocol::ServerNotice;

use crate::registry::{ChatEvent, RegistryHandle};
use crate::router::send_notice;
use crate::sink::LineSink;

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:2222";

/// TCP server for the chat room.
pub struct ChatServer {
    /// Bound listener
    listener: TcpListener,

    /// Address the listener is bound to
    local_addr: SocketAddr,

    /// Handle to the session registry
    registry: RegistryHandle,

    /// Settings handed to every session
    session_config: SessionConfig,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for log correlation
    connection_counter: u64,
}

impl ChatServer {
    /// Binds the listening socket.
    ///
    /// Bind to port 0 to let the OS pick a free port; `local_addr` reports
    /// the actual one.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the socket cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        registry: RegistryHandle,
        session_config: SessionConfig,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr,
                error: e.to_string(),
            })?;

        let local_addr = listener.local_addr().map_err(|e| ServerError::Bind {
            addr,
            error: e.to_string(),
        })?;

        Ok(Self {
            listener,
            local_addr,
            registry,
            session_config,
            cancel_token,
            connection_counter: 0,
        })
    }

    /// Returns the address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered, then
    /// waits for every session to finish its teardown.
    pub async fn run(mut self) -> Result<(), ServerError> {
        info!(addr = %self.local_addr, "Chat server listening");

        self.spawn_event_logger();

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                // Reap finished connection tasks
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            self.connection_counter += 1;
                            let connection_number = self.connection_counter;
                            sessions.spawn(self.handle_connection(stream, peer, connection_number));
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        // Sessions see the same token and close themselves
        while sessions.join_next().await.is_some() {}

        info!("Server stopped");
        Ok(())
    }

    /// Builds the task that serves one accepted connection.
    fn handle_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        connection_number: u64,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        let registry = self.registry.clone();
        let config = self.session_config.clone();
        let cancel_token = self.cancel_token.clone();

        async move {
            debug!(connection = connection_number, peer = %peer, "New client connected");

            if let Err(e) = stream.set_nodelay(true) {
                debug!(connection = connection_number, error = %e, "Failed to set TCP_NODELAY");
            }

            let (reader, writer) = stream.into_split();
            let sink = LineSink::new(writer);

            match ChatSession::admit(reader, sink.clone(), registry, config, cancel_token).await {
                Ok(session) => {
                    let summary = session.run().await;
                    debug!(
                        connection = connection_number,
                        slot = %summary.slot,
                        reason = %summary.reason,
                        "Connection closed"
                    );
                }
                Err(SessionError::CapacityExceeded { max }) => {
                    debug!(
                        connection = connection_number,
                        peer = %peer,
                        max,
                        "Turning client away"
                    );
                    if let Err(e) = send_notice(&sink, ServerNotice::ServerFull).await {
                        debug!(
                            connection = connection_number,
                            error = %e,
                            "Busy notice not delivered"
                        );
                    }
                    sink.close().await;
                }
                Err(e) => {
                    error!(connection = connection_number, error = %e, "Failed to admit client");
                    sink.close().await;
                }
            }
        }
    }

    /// Spawns the task that turns registry events into log lines.
    fn spawn_event_logger(&self) {
        let mut event_rx = self.registry.subscribe();
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Event logger shutting down");
                        break;
                    }

                    result = event_rx.recv() => {
                        match result {
                            Ok(event) => log_event(&event),
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "Event logger lagged, skipped events");
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                debug!("Event channel closed");
                                break;
                            }
                        }
                    }
                }
            }
        });
    }
}

fn log_event(event: &ChatEvent) {
    match event {
        ChatEvent::SlotAcquired {
            slot,
            occupied,
            capacity,
        } => {
            debug!(slot = %slot, occupied, capacity, "Slot acquired");
        }
        ChatEvent::Joined { slot, name, at } => {
            info!(slot = %slot, name = %name, at = %at.to_rfc3339(), "Client joined");
        }
        ChatEvent::Left {
            slot,
            name,
            reason,
            connected_at,
            at,
        } => {
            let connected_secs = (*at - *connected_at).num_seconds();
            info!(
                slot = %slot,
                name = ?name.as_ref().map(|n| n.as_str()),
                reason = %reason,
                connected_secs,
                "Session closed"
            );
        }
        ChatEvent::Rejected { capacity } => {
            debug!(capacity, "Connection rejected");
        }
        ChatEvent::DeliveryFailed { slot, name, error } => {
            debug!(slot = %slot, name = %name, error = %error, "Delivery failed");
        }
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },
}

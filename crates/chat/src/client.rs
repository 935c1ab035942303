//! Chat server connection client.
//!
//! This module provides the `ChatClient` which handles:
//! - Connection to the server over TCP
//! - Forwarding every input line to the server
//! - Forwarding every server line to the output
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use chat_protocol::DEFAULT_PORT;

use crate::error::{ClientError, Result};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the chat client.
///
/// # Example
///
/// ```rust
/// use chat_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig {
///     server_addr: "chat.example.org:2222".to_string(),
///     connect_timeout: Duration::from_secs(2),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `host:port` of the chat server.
    pub server_addr: String,

    /// How long to wait for the TCP connection to be established.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{DEFAULT_PORT}"),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Line counts for a finished client run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Lines forwarded to the server
    pub sent: u64,
    /// Lines received from the server
    pub received: u64,
}

// ============================================================================
// Chat Client
// ============================================================================

/// Bridges line-oriented I/O to a chat server.
///
/// # Connection Lifecycle
///
/// 1. Connects to `server_addr`
/// 2. Copies input lines to the server and server lines to the output,
///    concurrently
/// 3. When the input ends, half-closes the connection so the server sees
///    end of stream, and keeps printing until the server hangs up
/// 4. Returns once the server closes the connection
pub struct ChatClient {
    config: ClientConfig,
}

impl ChatClient {
    /// Creates a client; no connection is made until `run_with_io`.
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connects and bridges `input` and `output` until the server closes.
    ///
    /// # Errors
    ///
    /// - `ClientError::Connect` / `ClientError::ConnectTimeout` if the
    ///   server cannot be reached
    /// - `ClientError::Io` if reading from the server or writing to
    ///   `output` fails
    pub async fn run_with_io<I, O>(&self, input: I, output: O) -> Result<ClientStats>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let stream = self.connect().await?;
        let (server_reader, mut server_writer) = stream.into_split();

        let upstream = async move {
            let mut sent = 0u64;
            let mut lines = input.lines();

            while let Some(line) = lines.next_line().await? {
                server_writer.write_all(line.as_bytes()).await?;
                server_writer.write_all(b"\n").await?;
                server_writer.flush().await?;
                sent += 1;
            }

            debug!(sent, "Input finished, closing write side");
            server_writer.shutdown().await?;
            Ok::<u64, ClientError>(sent)
        };

        let downstream = forward_server_lines(server_reader, output);

        tokio::pin!(upstream);
        tokio::pin!(downstream);

        let mut stats = ClientStats::default();

        tokio::select! {
            received = &mut downstream => {
                stats.received = received?;
            }
            sent = &mut upstream => {
                match sent {
                    Ok(sent) => stats.sent = sent,
                    // The server may already be gone; its last lines still matter
                    Err(e) => debug!(error = %e, "Sending to server failed"),
                }
                stats.received = downstream.await?;
            }
        }

        info!(sent = stats.sent, received = stats.received, "Disconnected from server");
        Ok(stats)
    }

    async fn connect(&self) -> Result<TcpStream> {
        let addr = &self.config.server_addr;

        let stream = timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout { addr: addr.clone() })?
            .map_err(|e| ClientError::Connect {
                addr: addr.clone(),
                error: e.to_string(),
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        info!(addr = %addr, "Connected to chat server");
        Ok(stream)
    }
}

/// Copies server lines to `output` until the server closes the connection.
async fn forward_server_lines<R, O>(server: R, mut output: O) -> Result<u64>
where
    R: tokio::io::AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut received = 0u64;
    let mut lines = BufReader::new(server).lines();

    while let Some(line) = lines.next_line().await? {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
        received += 1;
    }

    Ok(received)
}

//! TcpChat daemon - multi-client chat room server
//!
//! Accepts TCP connections, asks every client for a nickname and relays
//! chat lines and directed `@name` messages between connected clients.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (127.0.0.1:2222) with 10 slots
//! chatd
//!
//! # Listen on all interfaces with room for 50 clients
//! chatd --bind 0.0.0.0:2222 --max-clients 50
//!
//! # Same, configured through the environment
//! CHATD_BIND=0.0.0.0:2222 CHATD_MAX_CLIENTS=50 chatd
//!
//! # Drop clients that stay silent for 10 minutes
//! chatd --idle-timeout-secs 600
//!
//! # Enable debug logging
//! RUST_LOG=chatd=debug chatd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown (every client gets its farewell)

use std::net::SocketAddr;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::builder::TypedValueParser;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatd::registry::{spawn_registry, DEFAULT_MAX_CLIENTS};
use chatd::server::{ChatServer, SessionConfig, DEFAULT_BIND_ADDR, MAX_LINE_LENGTH};

/// TcpChat daemon - multi-client chat room server
#[derive(Parser, Debug)]
#[command(name = "chatd", version, about)]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "CHATD_BIND", default_value = DEFAULT_BIND_ADDR)]
    bind: SocketAddr,

    /// Maximum number of simultaneously connected clients
    #[arg(
        short = 'n',
        long,
        env = "CHATD_MAX_CLIENTS",
        default_value_t = DEFAULT_MAX_CLIENTS,
        value_parser = clap::value_parser!(u32).range(1..).map(|n| n as usize)
    )]
    max_clients: usize,

    /// Disconnect clients that send nothing for this many seconds
    #[arg(long, env = "CHATD_IDLE_TIMEOUT_SECS")]
    idle_timeout_secs: Option<u64>,

    /// Deliver chat lines back to their sender as well
    #[arg(long)]
    echo_own_messages: bool,

    /// Tell senders when a directed message names nobody online
    #[arg(long)]
    notify_unknown_target: bool,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
            max_line_length: MAX_LINE_LENGTH,
            echo_own_messages: self.echo_own_messages,
            notify_unknown_target: self.notify_unknown_target,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("chatd=info".parse()?)
                .add_directive("chat_core=info".parse()?)
                .add_directive("chat_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Chat daemon starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    // Spawn the session registry
    let registry = spawn_registry(args.max_clients);
    info!(max_clients = args.max_clients, "Session registry started");

    let session_config = args.session_config();
    let server = ChatServer::bind(args.bind, registry, session_config, cancel_token)
        .await
        .with_context(|| format!("Failed to start server on {}", args.bind))?;

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Chat daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

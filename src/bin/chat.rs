//! TcpChat client - talk to a chat server from the terminal
//!
//! Every line typed on stdin goes to the server; every line from the server
//! is printed on stdout. Type `/quit` to leave.
//!
//! # Usage
//!
//! ```text
//! chat                          # connect to 127.0.0.1:2222
//! chat --server chat.lan:2222   # connect elsewhere
//! CHAT_SERVER=chat.lan:2222 chat
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use chat_client::{ChatClient, ClientConfig};

/// TcpChat client
#[derive(Parser, Debug)]
#[command(name = "chat", version, about)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, env = "CHAT_SERVER", default_value_t = ClientConfig::default().server_addr)]
    server: String,

    /// Seconds to wait for the connection
    #[arg(long, default_value_t = 5)]
    connect_timeout_secs: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run(args));

    // The stdin reader thread may still be blocked on a read
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn run(args: Args) -> Result<()> {
    // stdout carries the chat, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("chat_client=warn".parse()?)
                .add_directive("chat=warn".parse()?),
        )
        .init();

    let client = ChatClient::new(ClientConfig {
        server_addr: args.server.clone(),
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = client.run_with_io(stdin, stdout) => {
            result.with_context(|| format!("Chat session with {} failed", args.server))?;
        }
        _ = tokio::signal::ctrl_c() => {}
    }

    Ok(())
}

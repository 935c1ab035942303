//! Robustness tests for the chat server.
//!
//! These tests verify the server handles edge cases and misbehaving clients:
//! - Abrupt disconnects and half-closed connections
//! - Line size limits and invalid input
//! - Spoofed server messages
//! - Idle timeouts
//! - Rapid and concurrent connections
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

use std::net::SocketAddr;
use std::time::Duration;

use chatd::registry::{spawn_registry, RegistryHandle};
use chatd::server::{ChatServer, SessionConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

const LINE_TIMEOUT: Duration = Duration::from_secs(2);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Test Helpers
// ============================================================================

struct TestServer {
    addr: SocketAddr,
    registry: RegistryHandle,
    cancel_token: CancellationToken,
}

impl TestServer {
    async fn spawn(capacity: usize, config: SessionConfig) -> Self {
        let registry = spawn_registry(capacity);
        let cancel_token = CancellationToken::new();

        let server = ChatServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            registry.clone(),
            config,
            cancel_token.clone(),
        )
        .await
        .expect("bind test server");
        let addr = server.local_addr();

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        TestServer {
            addr,
            registry,
            cancel_token,
        }
    }

    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr)
            .await
            .expect("connect to server");
        TestClient::new(stream)
    }

    async fn join(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.join(name).await;
        client
    }

    async fn wait_for_occupied(&self, occupied: usize) {
        let start = tokio::time::Instant::now();
        while start.elapsed() < SETTLE_TIMEOUT {
            if self.registry.occupancy().await.occupied == occupied {
                return;
            }
            sleep(POLL_INTERVAL).await;
        }
        panic!("registry did not reach {occupied} occupied slots");
    }

    fn shutdown(self) {
        self.cancel_token.cancel();
    }
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn join(&mut self, name: &str) {
        self.expect("Please enter a nickname:").await;
        self.send(name).await;
        self
            .expect(&format!("Welcome {name} to our chat room."))
            .await;
        self
            .expect("To leave, enter \"/quit\" in a new line.")
            .await;
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Writes raw bytes, ignoring errors from a peer that already hung up.
    async fn send_raw(&mut self, bytes: &[u8]) {
        let _ = self.writer.write_all(bytes).await;
        let _ = self.writer.flush().await;
    }

    async fn recv(&mut self) -> Option<String> {
        let mut line = String::new();
        let n = timeout(LINE_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for server")
            .unwrap();
        if n == 0 {
            return None;
        }
        Some(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn expect(&mut self, expected: &str) {
        assert_eq!(self.recv().await.as_deref(), Some(expected));
    }
}

// ============================================================================
// Disconnect Tests
// ============================================================================

#[tokio::test]
async fn test_abrupt_disconnect_announces_departure() {
    let server = TestServer::spawn(5, SessionConfig::default()).await;
    let mut alice = server.join("alice").await;
    let bob = server.join("bob").await;
    alice
        .expect("*** A new user bob entered the chat room !!! ***")
        .await;

    drop(bob);

    alice.expect("*** bob has left ***").await;
    server.wait_for_occupied(1).await;

    server.shutdown();
}

#[tokio::test]
async fn test_disconnect_during_naming_is_not_announced() {
    let server = TestServer::spawn(5, SessionConfig::default()).await;
    let mut alice = server.join("alice").await;

    let mut anon = server.connect().await;
    anon.expect("Please enter a nickname:").await;
    drop(anon);
    server.wait_for_occupied(1).await;

    // Next line alice sees comes from a real join, not a departure
    let _bob = server.join("bob").await;
    alice
        .expect("*** A new user bob entered the chat room !!! ***")
        .await;

    server.shutdown();
}

#[tokio::test]
async fn test_half_closed_client_flushes_last_line() {
    let server = TestServer::spawn(5, SessionConfig::default()).await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    alice
        .expect("*** A new user bob entered the chat room !!! ***")
        .await;

    // Unterminated final line followed by end of stream
    bob.send_raw(b"last words").await;
    bob.writer.shutdown().await.unwrap();

    alice.expect("<bob> last words").await;
    alice.expect("*** bob has left ***").await;

    server.shutdown();
}

// ============================================================================
// Input Validation Tests
// ============================================================================

#[tokio::test]
async fn test_overlong_line_drops_only_the_offender() {
    let config = SessionConfig {
        max_line_length: 1024,
        ..SessionConfig::default()
    };
    let server = TestServer::spawn(5, config).await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    alice
        .expect("*** A new user bob entered the chat room !!! ***")
        .await;

    bob.send_raw(&vec![b'x'; 64 * 1024]).await;
    bob.send_raw(b"\n").await;

    alice.expect("*** bob has left ***").await;
    server.wait_for_occupied(1).await;

    // The server keeps serving
    let _carol = server.join("carol").await;
    alice
        .expect("*** A new user carol entered the chat room !!! ***")
        .await;

    server.shutdown();
}

#[tokio::test]
async fn test_invalid_utf8_drops_the_session() {
    let server = TestServer::spawn(5, SessionConfig::default()).await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    alice
        .expect("*** A new user bob entered the chat room !!! ***")
        .await;

    bob.send_raw(&[0xc3, 0x28, b'\n']).await;

    alice.expect("*** bob has left ***").await;

    server.shutdown();
}

#[tokio::test]
async fn test_empty_line_is_broadcast() {
    let server = TestServer::spawn(5, SessionConfig::default()).await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    alice
        .expect("*** A new user bob entered the chat room !!! ***")
        .await;

    bob.send("").await;
    alice.expect("<bob> ").await;

    server.shutdown();
}

#[tokio::test]
async fn test_spoofed_farewell_is_refused() {
    let server = TestServer::spawn(5, SessionConfig::default()).await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    alice
        .expect("*** A new user bob entered the chat room !!! ***")
        .await;

    bob.send("*** Bye alice ***").await;
    bob.expect("*** WARNING: String not allowed ***").await;

    // Session stays usable and alice never saw the spoof
    bob.send("sorry").await;
    alice.expect("<bob> sorry").await;

    server.shutdown();
}

#[tokio::test]
async fn test_quit_must_match_exactly() {
    let server = TestServer::spawn(5, SessionConfig::default()).await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    alice
        .expect("*** A new user bob entered the chat room !!! ***")
        .await;

    bob.send("/quitting").await;
    alice.expect("<bob> /quitting").await;

    bob.send("/quit").await;
    bob.expect("*** Bye bob ***").await;
    alice.expect("*** bob has left ***").await;

    server.shutdown();
}

// ============================================================================
// Timeout Tests
// ============================================================================

#[tokio::test]
async fn test_idle_client_is_disconnected() {
    let config = SessionConfig {
        idle_timeout: Some(Duration::from_millis(300)),
        ..SessionConfig::default()
    };
    let server = TestServer::spawn(5, config).await;
    let mut alice = server.join("alice").await;

    alice.expect("*** Bye alice ***").await;
    assert_eq!(alice.recv().await, None);
    server.wait_for_occupied(0).await;

    server.shutdown();
}

// ============================================================================
// Connection Churn Tests
// ============================================================================

#[tokio::test]
async fn test_rapid_connect_disconnect() {
    let server = TestServer::spawn(3, SessionConfig::default()).await;

    for i in 0..20 {
        let name = format!("rapid-{i}");
        let mut client = server.join(&name).await;
        client.send("/quit").await;
        client.expect(&format!("*** Bye {name} ***")).await;
        assert_eq!(client.recv().await, None);
    }

    server.wait_for_occupied(0).await;

    let _final = server.join("final").await;

    server.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_connections() {
    let server = TestServer::spawn(20, SessionConfig::default()).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let addr = server.addr;
        handles.push(tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let mut client = TestClient::new(stream);
            let name = format!("concurrent-{i}");
            client.expect("Please enter a nickname:").await;
            client.send(&name).await;

            // Notices about other clients may interleave with our own lines
            let welcome = format!("Welcome {name} to our chat room.");
            while let Some(line) = client.recv().await {
                if line == welcome {
                    break;
                }
            }

            client.send("/quit").await;
            let farewell = format!("*** Bye {name} ***");
            while let Some(line) = client.recv().await {
                if line == farewell {
                    return;
                }
            }
            panic!("{name} never got its farewell");
        }));
    }

    for handle in handles {
        handle.await.expect("concurrent connection should succeed");
    }

    server.wait_for_occupied(0).await;
    server.shutdown();
}

//! Connection Handler Module
//!
//! This module handles individual client connections to linekv.
//! Each client gets its own handler task that runs in a loop,
//! reading request lines and sending responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Listener accepts the socket and takes a capacity permit
//!        │
//!        ▼
//! 2. ConnectionHandler spawned (owns socket + permit)
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read (idle deadline)    │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute line            │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Write response line     │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  [Shutdown? else loop back]  │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Timeout / disconnect / I/O error / shutdown
//!        │
//!        ▼
//! 5. Handler dropped: socket closed, permit released
//! ```
//!
//! ## Buffer Management
//!
//! Incoming bytes accumulate in a `BytesMut` until a full `\n`-terminated
//! line is available. A line longer than the configured maximum message
//! size is answered with an error and the connection is closed.

use crate::commands::CommandHandler;
use crate::protocol::types::LF;
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::{watch, OwnedSemaphorePermit};
use tracing::{debug, error, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 1024;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Connections dropped because the capacity pool was empty
    pub connections_rejected: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Number of connections currently being handled.
    pub fn active(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }
}

/// Per-connection limits taken from the network configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    /// How long a read may wait for the next request
    pub idle_timeout: Duration,
    /// Longest accepted request line, in bytes, excluding the newline
    pub max_message_size: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(5),
            max_message_size: 4 * 1024,
        }
    }
}

/// Handles a single client connection.
///
/// Owns the socket and the capacity permit. Both are released when the
/// handler is dropped, whichever way the main loop exits.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    limits: ConnectionLimits,

    /// Server-wide shutdown flag, polled once per completed command
    shutdown: watch::Receiver<bool>,

    /// Capacity slot held for the lifetime of the connection
    _permit: OwnedSemaphorePermit,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The TCP stream for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    /// * `limits` - Idle timeout and maximum message size
    /// * `shutdown` - Receiver of the server-wide shutdown flag
    /// * `permit` - The capacity slot taken by the listener
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        limits: ConnectionLimits,
        shutdown: watch::Receiver<bool>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            stats,
            limits,
            shutdown,
            _permit: permit,
        }
    }

    /// Runs the main connection loop.
    ///
    /// Errors never leave this connection: they are logged here and the
    /// handler is dropped, closing the socket and releasing the permit.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Connection closed for shutdown"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IdleTimeout(timeout) => {
                    info!(client = %self.addr, timeout = ?timeout, "Connection idle timeout")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                ConnectionError::MessageTooLarge { .. } => {
                    warn!(client = %self.addr, error = %e, "Closing connection")
                }
                _ => error!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            match self.next_line() {
                Ok(Some(line)) => {
                    self.process(&line).await?;

                    if *self.shutdown.borrow() {
                        return Ok(());
                    }
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    self.send_response(&format!("Error: {}", e)).await?;
                    return Err(e);
                }
            }

            match self.read_more_data().await {
                Ok(()) => {}
                Err(ConnectionError::ClientDisconnected) if !self.buffer.is_empty() => {
                    // Unterminated final line
                    let rest = self.buffer.split();
                    let line = String::from_utf8_lossy(&rest).into_owned();
                    self.process(&line).await?;
                    return Err(ConnectionError::ClientDisconnected);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Takes the next complete line out of the buffer.
    ///
    /// Returns `Ok(None)` if more data is needed.
    fn next_line(&mut self) -> Result<Option<String>, ConnectionError> {
        let max = self.limits.max_message_size;

        let Some(pos) = self.buffer.iter().position(|&b| b == LF) else {
            // A trailing CR may be the first half of a split CRLF
            let pending_cr = usize::from(self.buffer.last() == Some(&b'\r'));
            if self.buffer.len() > max + pending_cr {
                return Err(ConnectionError::MessageTooLarge {
                    size: self.buffer.len(),
                    max,
                });
            }
            return Ok(None);
        };

        let mut line = self.buffer.split_to(pos);
        self.buffer.advance(1);

        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        if line.len() > max {
            return Err(ConnectionError::MessageTooLarge {
                size: line.len(),
                max,
            });
        }

        trace!(
            client = %self.addr,
            len = line.len(),
            remaining = self.buffer.len(),
            "Parsed line"
        );
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// Executes one request line and writes the response.
    async fn process(&mut self, line: &str) -> Result<(), ConnectionError> {
        let response = match self.command_handler.execute(line) {
            Ok(result) => result,
            Err(e) => format!("Error: {}", e),
        };
        self.stats.command_processed();

        self.send_response(&response).await
    }

    /// Reads more data from the socket into the buffer.
    ///
    /// The read is bounded by the idle timeout, refreshed on every call.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 512 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let timeout = self.limits.idle_timeout;
        let n = tokio::time::timeout(timeout, self.stream.get_mut().read_buf(&mut self.buffer))
            .await
            .map_err(|_| ConnectionError::IdleTimeout(timeout))??;

        if n == 0 {
            return Err(ConnectionError::ClientDisconnected);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Sends one response line to the client.
    async fn send_response(&mut self, response: &str) -> Result<(), ConnectionError> {
        self.stream.write_all(response.as_bytes()).await?;
        self.stream.write_all(&[LF]).await?;
        self.stream.flush().await?;

        let written = response.len() + 1;
        self.stats.bytes_written(written);
        trace!(client = %self.addr, bytes = written, "Sent response");
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// No request arrived within the idle timeout
    #[error("idle for longer than {0:?}")]
    IdleTimeout(Duration),

    /// A request line exceeded the maximum message size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    limits: ConnectionLimits,
    shutdown: watch::Receiver<bool>,
    permit: OwnedSemaphorePermit,
) {
    let handler =
        ConnectionHandler::new(stream, addr, command_handler, stats, limits, shutdown, permit);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected | ConnectionError::IdleTimeout(_) => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StrictParser;
    use crate::storage::InMemoryEngine;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::sync::Semaphore;

    struct TestServer {
        addr: SocketAddr,
        stats: Arc<ConnectionStats>,
        shutdown_tx: watch::Sender<bool>,
    }

    async fn create_test_server(limits: ConnectionLimits) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = CommandHandler::new(
            Arc::new(StrictParser::new()),
            Arc::new(InMemoryEngine::new()),
        );
        let stats = Arc::new(ConnectionStats::new());
        let permits = Arc::new(Semaphore::new(64));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let stats_clone = Arc::clone(&stats);
        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let permit = Arc::clone(&permits).try_acquire_owned().unwrap();
                tokio::spawn(handle_connection(
                    stream,
                    client_addr,
                    handler.clone(),
                    Arc::clone(&stats_clone),
                    limits,
                    shutdown_rx.clone(),
                    permit,
                ));
            }
        });

        TestServer {
            addr,
            stats,
            shutdown_tx,
        }
    }

    async fn request(reader: &mut BufReader<TcpStream>, line: &str) -> String {
        reader.get_mut().write_all(line.as_bytes()).await.unwrap();
        let mut response = String::new();
        reader.read_line(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_set_get() {
        let server = create_test_server(ConnectionLimits::default()).await;
        let mut client = BufReader::new(TcpStream::connect(server.addr).await.unwrap());

        assert_eq!(request(&mut client, "SET name Ariz\n").await, "OK\n");
        assert_eq!(request(&mut client, "GET name\n").await, "Ariz\n");
        assert_eq!(request(&mut client, "GET other\n").await, "NOT FOUND\n");
    }

    #[tokio::test]
    async fn test_error_response() {
        let server = create_test_server(ConnectionLimits::default()).await;
        let mut client = BufReader::new(TcpStream::connect(server.addr).await.unwrap());

        assert_eq!(
            request(&mut client, "PING\n").await,
            "Error: unknown command 'PING'\n"
        );
        assert_eq!(request(&mut client, "\n").await, "Error: empty expression\n");

        // The connection survives errors
        assert_eq!(request(&mut client, "SET a 1\r\n").await, "OK\n");
    }

    #[tokio::test]
    async fn test_pipelined_lines() {
        let server = create_test_server(ConnectionLimits::default()).await;
        let mut client = BufReader::new(TcpStream::connect(server.addr).await.unwrap());

        client
            .get_mut()
            .write_all(b"SET k1 v1\nSET k2 v2\nGET k1\nGET k2\n")
            .await
            .unwrap();

        let mut responses = Vec::new();
        for _ in 0..4 {
            let mut line = String::new();
            client.read_line(&mut line).await.unwrap();
            responses.push(line);
        }

        assert_eq!(responses, vec!["OK\n", "OK\n", "v1\n", "v2\n"]);
    }

    #[tokio::test]
    async fn test_line_split_across_writes() {
        let server = create_test_server(ConnectionLimits::default()).await;
        let mut client = BufReader::new(TcpStream::connect(server.addr).await.unwrap());

        client.get_mut().write_all(b"SET spl").await.unwrap();
        client.get_mut().flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(request(&mut client, "it value\n").await, "OK\n");
        assert_eq!(request(&mut client, "GET split\n").await, "value\n");
    }

    #[tokio::test]
    async fn test_unterminated_final_line() {
        let server = create_test_server(ConnectionLimits::default()).await;
        let mut client = TcpStream::connect(server.addr).await.unwrap();

        client.write_all(b"DEL nothing").await.unwrap();
        client.shutdown().await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert_eq!(response, "OK\n");
    }

    #[tokio::test]
    async fn test_message_too_large() {
        let limits = ConnectionLimits {
            max_message_size: 16,
            ..Default::default()
        };
        let server = create_test_server(limits).await;
        let mut client = TcpStream::connect(server.addr).await.unwrap();

        client
            .write_all(b"SET aaaaaaaaaaaaaaaaaaaaaaaa bbbbbbbbbb\n")
            .await
            .unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("Error: message too large"));
    }

    #[tokio::test]
    async fn test_max_size_line_with_split_crlf() {
        let limits = ConnectionLimits {
            max_message_size: 16,
            ..Default::default()
        };
        let server = create_test_server(limits).await;
        let mut client = BufReader::new(TcpStream::connect(server.addr).await.unwrap());

        // Exactly 16 bytes before the CR
        client.get_mut().write_all(b"SET abcdef 12345\r").await.unwrap();
        client.get_mut().flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(request(&mut client, "\n").await, "OK\n");
        assert_eq!(request(&mut client, "GET abcdef\n").await, "12345\n");
    }

    #[tokio::test]
    async fn test_idle_timeout_closes_connection() {
        let limits = ConnectionLimits {
            idle_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let server = create_test_server(limits).await;
        let mut idle = TcpStream::connect(server.addr).await.unwrap();
        let mut busy = BufReader::new(TcpStream::connect(server.addr).await.unwrap());

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(request(&mut busy, "SET x 1\n").await, "OK\n");
        }

        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(2), idle.read(&mut buf))
            .await
            .expect("server should close the idle connection")
            .unwrap();
        assert_eq!(n, 0);

        // The active connection is unaffected
        assert_eq!(request(&mut busy, "GET x\n").await, "1\n");
    }

    #[tokio::test]
    async fn test_shutdown_after_current_command() {
        let server = create_test_server(ConnectionLimits::default()).await;
        let mut client = BufReader::new(TcpStream::connect(server.addr).await.unwrap());

        assert_eq!(request(&mut client, "SET a 1\n").await, "OK\n");
        server.shutdown_tx.send(true).unwrap();

        // The next command still completes, then the server closes the socket
        assert_eq!(request(&mut client, "GET a\n").await, "1\n");

        let mut rest = String::new();
        let n = client.read_line(&mut rest).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let server = create_test_server(ConnectionLimits::default()).await;
        let stats = &server.stats;

        assert_eq!(stats.active(), 0);

        let mut client = BufReader::new(TcpStream::connect(server.addr).await.unwrap());
        assert_eq!(request(&mut client, "GET a\n").await, "NOT FOUND\n");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active(), 1);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_read.load(Ordering::Relaxed), 6);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 10);

        drop(client);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.active(), 0);
    }
}

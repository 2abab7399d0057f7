//! TCP Listener and Connection Supervisor
//!
//! Accepts sockets, enforces the global connection cap, and coordinates
//! graceful shutdown.
//!
//! ## Admission Control
//!
//! The capacity pool is a [`Semaphore`] with `max_connections` permits.
//! Each accepted socket tries to take one permit without waiting. If none
//! is available the socket is closed immediately; excess connections are
//! dropped, never queued. The permit moves into the connection task and is
//! released when that task ends.
//!
//! ## Shutdown
//!
//! ```text
//! shutdown flag set
//!        │
//!        ▼
//! accept loop exits, listener dropped (no new connections)
//!        │
//!        ▼
//! handlers notice the flag after their current command
//!        │
//!        ▼
//! acquire_many(max_connections) resolves once every permit is back
//! ```
//!
//! A handler blocked in a read only notices shutdown once a request
//! arrives or its idle timeout fires; reads are never interrupted.

use crate::commands::CommandHandler;
use crate::config::NetworkConfig;
use crate::connection::{handle_connection, ConnectionLimits, ConnectionStats};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};

/// The listener plus everything shared by its connections.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    command_handler: CommandHandler,
    limit_connections: Arc<Semaphore>,
    max_connections: u32,
    limits: ConnectionLimits,
    stats: Arc<ConnectionStats>,
}

impl Server {
    /// Wraps an already bound listener.
    ///
    /// Fails with `InvalidInput` unless `network.max_connections` is between
    /// 1 and `u32::MAX`, the most permits a drain can take back at once.
    pub fn new(
        listener: TcpListener,
        command_handler: CommandHandler,
        network: &NetworkConfig,
    ) -> std::io::Result<Self> {
        let max_connections = u32::try_from(network.max_connections)
            .ok()
            .filter(|&max| max > 0 && max as usize <= Semaphore::MAX_PERMITS)
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!(
                        "max_connections must be between 1 and {}, got {}",
                        u32::MAX,
                        network.max_connections
                    ),
                )
            })?;

        Ok(Self {
            listener,
            command_handler,
            limit_connections: Arc::new(Semaphore::new(max_connections as usize)),
            max_connections,
            limits: network.limits(),
            stats: Arc::new(ConnectionStats::new()),
        })
    }

    /// Binds `network.address` and wraps the listener.
    pub async fn bind(
        network: &NetworkConfig,
        command_handler: CommandHandler,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&network.address).await?;
        Self::new(listener, command_handler, network)
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Runs the accept loop until `shutdown` becomes `true` (or its sender
    /// is dropped), then closes the listener and waits for every in-flight
    /// connection to release its slot.
    ///
    /// Consumes the server, so shutdown can only happen once.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) {
        let Server {
            listener,
            command_handler,
            limit_connections,
            max_connections,
            limits,
            stats,
        } = self;

        let admission = Admission {
            command_handler,
            limit_connections: Arc::clone(&limit_connections),
            max_connections,
            limits,
            stats,
        };

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => admission.admit(stream, addr, shutdown.clone()),
                    Err(e) => {
                        if *shutdown.borrow() {
                            break;
                        }
                        error!(error = %e, "Error accepting connection");
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        drop(listener);
        info!(
            in_flight = admission.stats.active(),
            "Listener closed, waiting for connections to finish"
        );

        // Every permit back in the pool means every handler has exited.
        let drained = limit_connections.acquire_many(max_connections).await;
        match drained {
            Ok(_all) => info!("All connections closed"),
            Err(e) => warn!(error = %e, "Capacity pool closed while draining"),
        }
    }
}

/// The part of the server needed to start connection tasks.
struct Admission {
    command_handler: CommandHandler,
    limit_connections: Arc<Semaphore>,
    max_connections: u32,
    limits: ConnectionLimits,
    stats: Arc<ConnectionStats>,
}

impl Admission {
    /// Starts a handler for `stream` if a slot is free, else closes it.
    fn admit(&self, stream: TcpStream, addr: SocketAddr, shutdown: watch::Receiver<bool>) {
        let permit = match Arc::clone(&self.limit_connections).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.stats.connection_rejected();
                warn!(
                    client = %addr,
                    max_connections = self.max_connections,
                    "Max connections reached, closed new connection"
                );
                drop(stream);
                return;
            }
        };

        tokio::spawn(handle_connection(
            stream,
            addr,
            self.command_handler.clone(),
            Arc::clone(&self.stats),
            self.limits,
            shutdown,
            permit,
        ));
    }
}

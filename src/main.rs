//! linekv - A Minimal Line-Protocol Key-Value Server
//!
//! This is the main entry point for the linekv server.
//! It loads the configuration, sets up logging, binds the listener and
//! runs until Ctrl-C or SIGTERM.

use anyhow::Context;
use clap::Parser;
use linekv::commands::CommandHandler;
use linekv::config::Config;
use linekv::protocol::StrictParser;
use linekv::server::Server;
use linekv::storage::InMemoryEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Command-line options
#[derive(Parser, Debug)]
#[command(name = "linekv", version, about = "A minimal line-protocol key-value server")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `network.address` from the configuration
    #[arg(short, long)]
    address: Option<String>,
}

impl Args {
    /// Loads the configuration file.
    ///
    /// A missing default file falls back to built-in defaults; a file named
    /// with `--config` must exist.
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None if std::path::Path::new(linekv::DEFAULT_CONFIG_PATH).exists() => {
                Config::load(linekv::DEFAULT_CONFIG_PATH)
                    .with_context(|| format!("failed to load {}", linekv::DEFAULT_CONFIG_PATH))?
            }
            None => Config::default(),
        };

        if let Some(address) = &self.address {
            config.network.address = address.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.load_config()?;

    linekv::logging::init(&config.logging).context("failed to initialize logger")?;

    let storage = Arc::new(InMemoryEngine::new());
    let handler = CommandHandler::new(Arc::new(StrictParser::new()), storage.clone());

    let server = Server::bind(&config.network, handler.clone())
        .await
        .with_context(|| format!("failed to start TCP server on {}", config.network.address))?;

    info!(
        address = %server.local_addr()?,
        max_connections = config.network.max_connections,
        idle_timeout = ?config.network.idle_timeout,
        version = linekv::VERSION,
        "TCP server started"
    );

    let stats = server.stats();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let serving = tokio::spawn(server.serve(shutdown_rx));

    shutdown_signal().await?;
    info!("Shutting down gracefully...");
    let _ = shutdown_tx.send(true);
    serving.await.context("server task failed")?;

    let metrics = handler.metrics();
    let storage_stats = storage.stats();
    info!(
        total = metrics.total,
        succeeded = metrics.succeeded,
        failed = metrics.failed,
        average_latency = ?metrics.average_latency,
        connections_accepted = stats.connections_accepted.load(std::sync::atomic::Ordering::Relaxed),
        connections_rejected = stats.connections_rejected.load(std::sync::atomic::Ordering::Relaxed),
        keys = storage_stats.keys,
        get_ops = storage_stats.get_ops,
        set_ops = storage_stats.set_ops,
        del_ops = storage_stats.del_ops,
        "Server shutdown complete"
    );
    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM where available.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;
        tokio::select! {
            res = signal::ctrl_c() => res.context("failed to listen for Ctrl-C")?,
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;

    Ok(())
}

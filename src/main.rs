//! Caracal - WhatsApp bot core
//!
//! A message-ingestion and command-dispatch pipeline over a pluggable
//! transport.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `transport` - Socket seam: typed event feed + outbound API
//! - `connection` - Lifecycle supervision and reconnection backoff
//! - `cache` - Moka-backed caches and the explicit TTL map
//! - `tracker` - Anti-delete message cache and owner alerts
//! - `router` - Command routing and the handler registry
//! - `events` - Auto-react, anti-spam/link/tag, presence
//! - `permissions` - Owner and group-admin checks
//! - `storage` - Flat-file JSON persistence
//! - `bot` - Dispatcher, shared state, HTTP status surface
//! - `plugins` - Built-in commands

mod bot;
mod cache;
mod config;
mod connection;
mod error;
mod events;
mod permissions;
mod plugins;
mod router;
mod storage;
mod tracker;
mod transport;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bot::AppState;
use config::Config;
use connection::{FileCredentialStore, Supervisor};
use transport::Transport;
use transport::memory::MemoryTransport;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment.
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("caracal=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Caracal...");

    let config = Config::from_env();
    info!("Configuration loaded; prefix '{}'", config.prefix);

    // The protocol adapter is wired here. Until one is linked in, the
    // in-memory transport keeps the pipeline runnable end to end.
    let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::connected());
    info!("Transport: {}", transport.name());

    let credentials = Arc::new(FileCredentialStore::new(&config.session_dir));

    // Supervisor feeds the dispatcher through this channel; connection
    // and credential events never cross it.
    let (events_tx, events_rx) = mpsc::channel(256);

    let supervisor = Arc::new(Supervisor::new(
        Arc::clone(&transport),
        credentials,
        &config,
        events_tx,
    ));
    supervisor.initialize()?;

    let state = AppState::new(config, Arc::clone(&transport), supervisor.state());

    let loaded = state.registry.load(plugins::built_in());
    info!("Loaded {} commands", loaded);

    let maintenance = bot::spawn_maintenance(&state);

    let supervisor_task = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };

    let server_task = {
        let state = state.clone();
        let port = state.config.status_port;
        tokio::spawn(async move {
            if let Err(e) = bot::server::serve(state, port, std::future::pending()).await {
                error!("Status server failed: {}", e);
            }
        })
    };

    let dispatcher_task = {
        let state = state.clone();
        tokio::spawn(async move { bot::run_event_loop(state, events_rx).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    supervisor.shutdown().await;
    state.tracker.flush_stats();

    for task in maintenance {
        task.abort();
    }
    server_task.abort();
    supervisor_task.abort();
    dispatcher_task.abort();

    info!("Goodbye");
    Ok(())
}

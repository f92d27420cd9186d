//! ghosttouch-daemon: Background daemon for camera-free gesture control
//!
//! This daemon turns a stream of hand landmarks into desktop control
//! intents and provides:
//! - A tracker that supervises the hand detector subprocess
//! - A control pipeline that debounces gestures into modes
//! - IPC server for status queries and control event streams
//!
//! The daemon publishes intents (volume levels, scroll clicks) over
//! IPC; injecting them into the desktop session is left to platform
//! clients.

mod config;
mod control;
mod events;
mod gesture;
mod ipc;
mod lifecycle;
mod tracker;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::control::{Pipeline, PipelineStats};
use crate::events::ControlEvent;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::tracker::Tracker;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "ghosttouch-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, "configuration loaded");

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Create channels for inter-component communication
    // Tracker -> control pipeline
    let (tracker_tx, tracker_rx) = mpsc::channel(32);
    // Control pipeline -> IPC server (for broadcasting control events)
    let (event_tx, _event_rx) = broadcast::channel::<ControlEvent>(64);
    // Control pipeline -> IPC server (latest stats snapshot)
    let (stats_tx, stats_rx) = watch::channel(PipelineStats::default());

    // Create the control pipeline
    let mut pipeline = Pipeline::new(config.tuning.clone(), event_tx.clone(), stats_tx);

    // Create the tracker
    let tracker = Tracker::new(config.detector.clone(), tracker_tx);

    // Start the tracker (spawns the detector and its listener thread)
    match tracker.start() {
        Ok(()) => {
            info!("tracker started");
        }
        Err(e) => {
            error!(?e, "failed to start tracker");
            warn!("continuing without gesture input - check the detector command");
        }
    }

    // Create IPC server with pipeline visibility. Detector liveness
    // reaches status clients through the stats snapshot.
    let server = Server::new(
        &config.socket_path,
        config.tuning.clone(),
        stats_rx,
        event_tx.clone(),
    )?;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the control pipeline (processes tracker events)
        _ = pipeline.run(tracker_rx) => {
            info!("control pipeline exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Wait for shutdown signal
        signal = shutdown.wait() => {
            info!(signal, "shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    tracker.stop();
    server.shutdown().await;

    info!("ghosttouch-daemon stopped");

    Ok(())
}

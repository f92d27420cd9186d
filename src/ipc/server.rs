//! Unix domain socket server for IPC
//!
//! Provides request-response communication plus a push stream of
//! control events for subscribed clients (action executors and
//! feedback renderers).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, error, info, warn};

use crate::control::{PipelineStats, PipelineTuning};
use crate::events::ControlEvent;

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    /// Most recent pipeline snapshot, refreshed every tick
    stats_rx: watch::Receiver<PipelineStats>,
    /// Bus handle used to mint per-subscriber event receivers
    event_tx: broadcast::Sender<ControlEvent>,
}

/// Shared server state
struct ServerState {
    start_time: Instant,
    tuning: PipelineTuning,
}

impl Server {
    /// Create a new IPC server bound to `socket_path`
    pub fn new(
        socket_path: &Path,
        tuning: PipelineTuning,
        stats_rx: watch::Receiver<PipelineStats>,
        event_tx: broadcast::Sender<ControlEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            start_time: Instant::now(),
            tuning,
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
            stats_rx,
            event_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let stats_rx = self.stats_rx.clone();
                    let event_tx = self.event_tx.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state, stats_rx, event_tx) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        mut stream: UnixStream,
        state: Arc<RwLock<ServerState>>,
        stats_rx: watch::Receiver<PipelineStats>,
        event_tx: broadcast::Sender<ControlEvent>,
    ) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match stream.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > 1024 * 1024 {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            stream.read_exact(&mut msg_buf).await?;

            let request: Request = match serde_json::from_slice(&msg_buf) {
                Ok(request) => request,
                Err(e) => {
                    warn!(%e, "rejecting malformed request");
                    let response = Response::Error {
                        code: "bad_request".to_string(),
                        message: e.to_string(),
                    };
                    Self::send_message(&mut stream, &response).await?;
                    continue;
                }
            };

            debug!(?request, "received request");

            let (response, subscribe) = Self::process_request(request, &state, &stats_rx).await;

            if subscribe {
                // Subscribe before acknowledging so no event sent after
                // the ack can be missed.
                let event_rx = event_tx.subscribe();
                Self::send_message(&mut stream, &response).await?;
                debug!("client subscribed, switching to event streaming");
                return Self::stream_events(stream, event_rx).await;
            }

            Self::send_message(&mut stream, &response).await?;
        }
    }

    /// After a subscription the connection becomes a one-way stream of
    /// notifications. Reads only watch for the client hanging up.
    async fn stream_events(
        stream: UnixStream,
        mut event_rx: broadcast::Receiver<ControlEvent>,
    ) -> Result<()> {
        let (mut read_half, mut write_half) = stream.into_split();
        let mut scratch = [0u8; 64];

        loop {
            tokio::select! {
                event = event_rx.recv() => match event {
                    Ok(event) => {
                        Self::send_message(&mut write_half, &Notification::Event { event }).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber too slow, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("event bus closed");
                        return Ok(());
                    }
                },
                read = read_half.read(&mut scratch) => match read {
                    Ok(0) => {
                        debug!("subscriber disconnected");
                        return Ok(());
                    }
                    Ok(_) => debug!("ignoring data from subscribed client"),
                    Err(e) => return Err(e.into()),
                },
            }
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<W, T>(stream: &mut W, msg: &T) -> Result<()>
    where
        W: tokio::io::AsyncWrite + Unpin,
        T: serde::Serialize,
    {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        stream.write_all(&msg_len).await?;
        stream.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(
        request: Request,
        state: &Arc<RwLock<ServerState>>,
        stats_rx: &watch::Receiver<PipelineStats>,
    ) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let state = state.read().await;
                // Detector liveness comes straight off the pipeline
                // snapshot, so a dead detector shows up here too.
                let pipeline = stats_rx.borrow().clone();
                let status = DaemonStatus {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    detector_running: pipeline.detector_alive,
                    uptime_secs: state.start_time.elapsed().as_secs(),
                    pipeline,
                };
                (Response::Status(status), false)
            }

            Request::GetTuning => {
                let state = state.read().await;
                (Response::Tuning(state.tuning.clone()), false)
            }

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlMode;

    fn test_socket(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ghosttouch-{}-{}.sock", name, std::process::id()))
    }

    async fn send_request(stream: &mut UnixStream, request: &Request) {
        let bytes = serde_json::to_vec(request).unwrap();
        stream
            .write_all(&(bytes.len() as u32).to_le_bytes())
            .await
            .unwrap();
        stream.write_all(&bytes).await.unwrap();
    }

    async fn read_frame<T: serde::de::DeserializeOwned>(stream: &mut UnixStream) -> T {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.unwrap();
        let mut buf = vec![0u8; u32::from_le_bytes(len_buf) as usize];
        stream.read_exact(&mut buf).await.unwrap();
        serde_json::from_slice(&buf).unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_status_roundtrip() {
        let path = test_socket("ping");
        let (event_tx, _event_rx) = broadcast::channel(16);
        let (stats_tx, stats_rx) = watch::channel(PipelineStats::default());

        let server =
            Arc::new(Server::new(&path, PipelineTuning::default(), stats_rx, event_tx).unwrap());
        let runner = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let _ = server.run().await;
            })
        };

        let mut snapshot = PipelineStats::default();
        snapshot.mode = ControlMode::Scroll;
        snapshot.ticks = 42;
        snapshot.detector_alive = true;
        stats_tx.send_replace(snapshot.clone());

        let mut client = UnixStream::connect(&path).await.unwrap();

        send_request(&mut client, &Request::Ping).await;
        assert!(matches!(read_frame::<Response>(&mut client).await, Response::Pong));

        send_request(&mut client, &Request::GetStatus).await;
        match read_frame::<Response>(&mut client).await {
            Response::Status(status) => {
                assert!(status.detector_running);
                assert_eq!(status.pipeline.mode, ControlMode::Scroll);
                assert_eq!(status.pipeline.ticks, 42);
            }
            other => panic!("expected status, got {:?}", other),
        }

        // A later snapshot with the detector gone flips the status.
        snapshot.detector_alive = false;
        stats_tx.send_replace(snapshot);

        send_request(&mut client, &Request::GetStatus).await;
        match read_frame::<Response>(&mut client).await {
            Response::Status(status) => assert!(!status.detector_running),
            other => panic!("expected status, got {:?}", other),
        }

        server.shutdown().await;
        runner.abort();
    }

    #[tokio::test]
    async fn test_subscribe_streams_events() {
        let path = test_socket("subscribe");
        let (event_tx, _event_rx) = broadcast::channel(16);
        let (_stats_tx, stats_rx) = watch::channel(PipelineStats::default());

        let server = Arc::new(
            Server::new(&path, PipelineTuning::default(), stats_rx, event_tx.clone()).unwrap(),
        );
        let runner = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let _ = server.run().await;
            })
        };

        let mut client = UnixStream::connect(&path).await.unwrap();
        send_request(&mut client, &Request::Subscribe).await;
        assert!(matches!(
            read_frame::<Response>(&mut client).await,
            Response::Subscribed
        ));

        event_tx
            .send(ControlEvent::Scroll { clicks: 3 })
            .unwrap();

        match read_frame::<Notification>(&mut client).await {
            Notification::Event {
                event: ControlEvent::Scroll { clicks },
            } => assert_eq!(clicks, 3),
            other => panic!("expected scroll notification, got {:?}", other),
        }

        server.shutdown().await;
        runner.abort();
    }

    #[tokio::test]
    async fn test_malformed_request_gets_error_response() {
        let path = test_socket("badreq");
        let (event_tx, _event_rx) = broadcast::channel(16);
        let (_stats_tx, stats_rx) = watch::channel(PipelineStats::default());

        let server =
            Arc::new(Server::new(&path, PipelineTuning::default(), stats_rx, event_tx).unwrap());
        let runner = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let _ = server.run().await;
            })
        };

        let mut client = UnixStream::connect(&path).await.unwrap();
        let garbage = b"not json";
        client
            .write_all(&(garbage.len() as u32).to_le_bytes())
            .await
            .unwrap();
        client.write_all(garbage).await.unwrap();

        match read_frame::<Response>(&mut client).await {
            Response::Error { code, .. } => assert_eq!(code, "bad_request"),
            other => panic!("expected error, got {:?}", other),
        }

        // The connection survives a bad request.
        send_request(&mut client, &Request::Ping).await;
        assert!(matches!(read_frame::<Response>(&mut client).await, Response::Pong));

        server.shutdown().await;
        runner.abort();
    }
}

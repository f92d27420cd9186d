//! Detector subprocess management and the listener thread.
//!
//! The landmark detector runs as a child process that prints one JSON
//! message per camera frame on stdout. Pipe reads are blocking, so a
//! dedicated OS thread owns the child and forwards parsed events into
//! the async side of the daemon over an mpsc channel.

use std::io::{BufRead, BufReader, ErrorKind};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::frame::{FrameExtract, HandFrame, WireMessage};

/// How the detector child is launched and how its output is interpreted.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Camera resolution used to scale normalized landmarks to pixels.
    pub frame_width: f32,
    pub frame_height: f32,
    /// Hands scoring below this are treated as not detected.
    pub min_confidence: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            args: vec!["hand_detector.py".to_string()],
            frame_width: 640.0,
            frame_height: 480.0,
            min_confidence: 0.85,
        }
    }
}

/// Events flowing from the listener thread into the control pipeline.
/// Each of the first three variants is exactly one camera tick.
#[derive(Debug)]
pub enum TrackerEvent {
    /// A usable hand was detected this tick.
    Frame(HandFrame),
    /// The detector ticked but saw no hand above the confidence floor.
    NoHand,
    /// The detector produced output this daemon could not use.
    Malformed,
    /// The detector process exited or its stream broke.
    Stopped,
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker is already running")]
    AlreadyRunning,

    #[error("failed to launch detector `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("detector child has no stdout pipe")]
    NoStdout,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

/// Owns the detector lifecycle: spawns the child process, runs the
/// listener thread, and tears both down on stop.
pub struct Tracker {
    config: DetectorConfig,
    event_tx: mpsc::Sender<TrackerEvent>,
    running: Arc<AtomicBool>,
    /// Child handle shared with the listener thread so `stop` can kill
    /// the process even while the thread is blocked reading its stdout.
    child: Arc<Mutex<Option<Child>>>,
}

impl Tracker {
    pub fn new(config: DetectorConfig, event_tx: mpsc::Sender<TrackerEvent>) -> Self {
        Self {
            config,
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
            child: Arc::new(Mutex::new(None)),
        }
    }

    /// Launches the detector child and the thread that drains its
    /// stdout. Fails fast when the command cannot be spawned; handshake
    /// problems are reported asynchronously as a `Stopped` event.
    pub fn start(&self) -> Result<(), TrackerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(TrackerError::AlreadyRunning);
        }

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| {
                self.running.store(false, Ordering::SeqCst);
                TrackerError::Spawn {
                    command: self.config.command.clone(),
                    source,
                }
            })?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                self.running.store(false, Ordering::SeqCst);
                return Err(TrackerError::NoStdout);
            }
        };

        info!(command = %self.config.command, pid = child.id(), "detector process launched");

        *lock_child(&self.child) = Some(child);

        let child_slot = Arc::clone(&self.child);
        let config = self.config.clone();
        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("tracker-listener".to_string())
            .spawn(move || run_stream_loop(child_slot, stdout, config, event_tx, running))
            .map_err(|e| {
                shutdown_child(&self.child, &self.running);
                TrackerError::ThreadSpawn(e.to_string())
            })?;

        Ok(())
    }

    /// Kills the detector child and clears the run flag. Closing the
    /// child ends its stdout stream, so a listener thread blocked in a
    /// read wakes up and exits instead of waiting on a silent detector.
    pub fn stop(&self) {
        shutdown_child(&self.child, &self.running);
        debug!("tracker stop requested");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Blocking loop on the listener thread: handshake, then one event per
/// stdout line until the stream closes or the run flag clears.
fn run_stream_loop(
    child_slot: Arc<Mutex<Option<Child>>>,
    stdout: ChildStdout,
    config: DetectorConfig,
    event_tx: mpsc::Sender<TrackerEvent>,
    running: Arc<AtomicBool>,
) {
    let mut reader = BufReader::new(stdout);

    if let Err(e) = await_ready(&mut reader) {
        error!("detector handshake failed: {}", e);
        shutdown_child(&child_slot, &running);
        let _ = event_tx.blocking_send(TrackerEvent::Stopped);
        return;
    }
    info!("detector ready, streaming frames");

    let mut line = String::new();
    while running.load(Ordering::SeqCst) {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => {
                warn!("detector stream closed");
                break;
            }
            Ok(_) => {
                let Some(event) = parse_line(line.trim(), &config) else {
                    continue;
                };
                if event_tx.blocking_send(event).is_err() {
                    debug!("event channel closed, stopping listener");
                    break;
                }
            }
            Err(e) => {
                error!("error reading detector stream: {}", e);
                break;
            }
        }
    }

    shutdown_child(&child_slot, &running);
    let _ = event_tx.blocking_send(TrackerEvent::Stopped);
    info!("tracker listener stopped");
}

/// The detector prints arbitrary startup chatter before its READY
/// banner; more than a few dozen lines means a broken detector.
fn await_ready(reader: &mut impl BufRead) -> std::io::Result<()> {
    for _ in 0..32 {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "detector exited before signaling READY",
            ));
        }
        let line = line.trim();
        if line == "READY" {
            return Ok(());
        }
        debug!(line, "detector startup output");
    }
    Err(std::io::Error::new(
        ErrorKind::InvalidData,
        "detector never signaled READY",
    ))
}

fn parse_line(line: &str, config: &DetectorConfig) -> Option<TrackerEvent> {
    if line.is_empty() {
        return None;
    }

    let msg: WireMessage = match serde_json::from_str(line) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("unparseable detector message: {}", e);
            return Some(TrackerEvent::Malformed);
        }
    };

    if let Some(error) = &msg.error {
        warn!(error = %error, "detector reported an error");
    }

    match msg.extract(config.frame_width, config.frame_height, config.min_confidence) {
        FrameExtract::Hand(frame) => Some(TrackerEvent::Frame(frame)),
        FrameExtract::NoHand => Some(TrackerEvent::NoHand),
        FrameExtract::Malformed => {
            warn!("detector hand missing landmarks, ignoring frame");
            Some(TrackerEvent::Malformed)
        }
    }
}

/// Kill and reap the child if it is still in the slot. Both the stop
/// path and the listener thread funnel through here, so whichever runs
/// second finds the slot empty and only clears the flag.
fn shutdown_child(slot: &Mutex<Option<Child>>, running: &AtomicBool) {
    if let Some(mut child) = lock_child(slot).take() {
        let _ = child.kill();
        let _ = child.wait();
    }
    running.store(false, Ordering::SeqCst);
}

fn lock_child(slot: &Mutex<Option<Child>>) -> MutexGuard<'_, Option<Child>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_test::assert_ok;

    fn script_config(script: &str) -> DetectorConfig {
        DetectorConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_tracker_creation() {
        let (tx, _rx) = mpsc::channel(8);
        let tracker = Tracker::new(DetectorConfig::default(), tx);
        assert!(!tracker.is_running());
    }

    #[test]
    fn test_start_rejects_missing_command() {
        let (tx, _rx) = mpsc::channel(8);
        let config = DetectorConfig {
            command: "/nonexistent/ghosttouch-detector".to_string(),
            args: vec![],
            ..Default::default()
        };
        let tracker = Tracker::new(config, tx);
        assert!(matches!(tracker.start(), Err(TrackerError::Spawn { .. })));
        assert!(!tracker.is_running());
    }

    #[tokio::test]
    async fn test_stream_delivers_ticks_then_stopped() {
        let (tx, mut rx) = mpsc::channel(8);
        let script = r#"echo READY; echo '{"hands":[]}'"#;
        let tracker = Tracker::new(script_config(script), tx);
        assert_ok!(tracker.start());

        let first = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first, TrackerEvent::NoHand));

        let second = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(second, TrackerEvent::Stopped));
    }

    #[tokio::test]
    async fn test_garbage_line_reported_as_malformed() {
        let (tx, mut rx) = mpsc::channel(8);
        let script = "echo READY; echo not-json";
        let tracker = Tracker::new(script_config(script), tx);
        assert_ok!(tracker.start());

        let first = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first, TrackerEvent::Malformed));
    }

    #[tokio::test]
    async fn test_handshake_failure_reports_stopped() {
        let (tx, mut rx) = mpsc::channel(8);
        let tracker = Tracker::new(script_config("true"), tx);
        assert_ok!(tracker.start());

        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, TrackerEvent::Stopped));
    }

    #[tokio::test]
    async fn test_stop_kills_a_silent_detector() {
        let (tx, mut rx) = mpsc::channel(8);
        // `exec` keeps the sleep on the child pid so the kill closes
        // the stream instead of orphaning a grandchild.
        let script = "echo READY; exec sleep 30";
        let tracker = Tracker::new(script_config(script), tx);
        assert_ok!(tracker.start());

        tokio::time::sleep(Duration::from_millis(100)).await;
        tracker.stop();
        assert!(!tracker.is_running());

        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, TrackerEvent::Stopped));
    }
}

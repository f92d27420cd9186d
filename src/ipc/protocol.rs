//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian
//! length. A connection is request/response until the client sends
//! `Subscribe`; after the acknowledgement it becomes a one-way stream
//! of `Notification` messages.

use serde::{Deserialize, Serialize};

use crate::control::{PipelineStats, PipelineTuning};
use crate::events::ControlEvent;

/// Requests from clients to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Request the active tuning constants
    GetTuning,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to control event notifications
    Subscribe,
}

/// Responses from daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Tuning constants the pipeline was built with
    Tuning(PipelineTuning),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed; notifications follow
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A control event occurred
    Event { event: ControlEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Whether the detector subprocess is delivering frames
    pub detector_running: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,

    /// Live pipeline state as of the most recent tick
    pub pipeline: PipelineStats,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            detector_running: false,
            uptime_secs: 0,
            pipeline: PipelineStats::default(),
        }
    }
}

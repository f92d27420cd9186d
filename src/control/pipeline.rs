//! Core control pipeline
//!
//! Turns per-frame hand landmarks into a committed control mode and
//! the volume and scroll intents that mode produces. One detector
//! message is one tick; a mode change commits only after a sustained
//! run of frames agreeing on the same candidate.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::events::ControlEvent;
use crate::gesture::{FingerState, GestureHistory, GestureLabel, GestureRules};
use crate::tracker::{HandFrame, TrackerEvent};

use super::scroll::{ScrollDirection, ScrollEngine};
use super::volume::VolumeMapper;
use super::{ScrollTuning, VolumeTuning};

/// The committed control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// No active control, watching for gestures
    Idle,
    /// Pinch distance drives the system volume
    Volume,
    /// Fingertip spread drives scrolling
    Scroll,
}

impl Default for ControlMode {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlMode::Idle => write!(f, "idle"),
            ControlMode::Volume => write!(f, "volume"),
            ControlMode::Scroll => write!(f, "scroll"),
        }
    }
}

/// Hysteresis settings for mode switching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeRules {
    /// Consecutive agreeing frames required before a mode commits.
    pub commit_ticks: u32,
    /// Capacity of the rolling gesture label window.
    pub history_depth: usize,
    /// Treat an unknown pose with the pinky extended as a vote for
    /// idle instead of no vote at all. Off unless explicitly enabled.
    pub pinky_exits: bool,
}

impl Default for ModeRules {
    fn default() -> Self {
        Self {
            commit_ticks: 5,
            history_depth: 8,
            pinky_exits: false,
        }
    }
}

/// The full tuning surface of the pipeline, injected at construction
/// and exposed read-only over IPC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineTuning {
    pub gesture: GestureRules,
    pub mode: ModeRules,
    pub volume: VolumeTuning,
    pub scroll: ScrollTuning,
}

/// Snapshot of pipeline state published after every tick for the
/// status endpoint and the feedback renderer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    pub mode: ControlMode,
    pub gesture: GestureLabel,
    pub hand_visible: bool,
    /// True while detector messages are arriving.
    pub detector_alive: bool,
    pub volume_percent: u8,
    pub scroll_momentum: f32,
    /// Fraction of the recent label window agreeing with the latest label.
    pub stability: f32,
    pub fps: f32,
    pub ticks: u64,
    pub discarded_frames: u64,
    pub malformed_frames: u64,
}

/// What a single tick produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub mode: ControlMode,
    pub gesture: GestureLabel,
    pub volume: Option<f32>,
    pub scroll: Option<i32>,
}

/// The tick-driven controller owning all gesture and mode state
pub struct Pipeline {
    rules: GestureRules,
    mode_rules: ModeRules,
    /// Committed mode
    mode: ControlMode,
    /// Candidate mode waiting out the stability window
    pending: Option<ControlMode>,
    /// Consecutive frames that agreed with `pending`, current included
    stability: u32,
    history: GestureHistory,
    volume: VolumeMapper,
    scroll: ScrollEngine,
    /// Label of the most recent tick
    gesture: GestureLabel,
    hand_visible: bool,
    detector_alive: bool,
    /// When the committed mode was entered
    mode_entered_at: Option<Instant>,
    last_tick_at: Option<Instant>,
    fps: f32,
    ticks: u64,
    discarded_frames: u64,
    malformed_frames: u64,
    /// Channel for emitting control events
    event_tx: broadcast::Sender<ControlEvent>,
    /// Latest snapshot for the status endpoint
    stats_tx: watch::Sender<PipelineStats>,
}

impl Pipeline {
    pub fn new(
        tuning: PipelineTuning,
        event_tx: broadcast::Sender<ControlEvent>,
        stats_tx: watch::Sender<PipelineStats>,
    ) -> Self {
        Self {
            rules: tuning.gesture,
            history: GestureHistory::new(tuning.mode.history_depth),
            mode_rules: tuning.mode,
            mode: ControlMode::Idle,
            pending: None,
            stability: 0,
            volume: VolumeMapper::new(tuning.volume),
            scroll: ScrollEngine::new(tuning.scroll),
            gesture: GestureLabel::Unknown,
            hand_visible: false,
            detector_alive: false,
            mode_entered_at: None,
            last_tick_at: None,
            fps: 0.0,
            ticks: 0,
            discarded_frames: 0,
            malformed_frames: 0,
            event_tx,
            stats_tx,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Run the pipeline, consuming tracker events until the channel
    /// closes.
    pub async fn run(&mut self, mut tracker_rx: mpsc::Receiver<TrackerEvent>) {
        info!("control pipeline started in idle mode");

        while let Some(mut event) = tracker_rx.recv().await {
            // Only the newest queued tick matters; processing stale
            // frames would lag behind the hand.
            while let Ok(next) = tracker_rx.try_recv() {
                self.discarded_frames += 1;
                event = next;
            }

            match event {
                TrackerEvent::Frame(frame) => {
                    self.detector_alive = true;
                    self.tick(Some(&frame), Instant::now());
                }
                TrackerEvent::NoHand => {
                    self.detector_alive = true;
                    self.tick(None, Instant::now());
                }
                TrackerEvent::Malformed => {
                    self.detector_alive = true;
                    self.malformed_frames += 1;
                    self.tick(None, Instant::now());
                }
                TrackerEvent::Stopped => {
                    warn!("detector stopped, no further gesture input");
                    self.detector_alive = false;
                    if self.hand_visible {
                        self.hand_visible = false;
                        self.emit(ControlEvent::HandVisibility { visible: false });
                    }
                    // No more ticks are coming, so push the snapshot now.
                    self.publish_stats();
                }
            }
        }

        info!("control pipeline stopped");
    }

    /// Process one camera tick. A missing frame is a valid tick: it
    /// coasts scroll momentum and leaves the hysteresis state alone.
    pub fn tick(&mut self, frame: Option<&HandFrame>, now: Instant) -> TickOutcome {
        self.ticks += 1;
        if let Some(prev) = self.last_tick_at {
            let dt = now.duration_since(prev).as_secs_f32();
            if dt > 0.0 {
                self.fps = 1.0 / dt;
            }
        }
        self.last_tick_at = Some(now);

        let visible = frame.is_some();
        if visible != self.hand_visible {
            self.hand_visible = visible;
            self.emit(ControlEvent::HandVisibility { visible });
        }

        let observation = frame.map(|frame| {
            let fingers = FingerState::classify(frame);
            let label = self.rules.classify(fingers, frame.pinch_distance());
            (fingers, label)
        });

        let label = observation.map_or(GestureLabel::Unknown, |(_, label)| label);
        self.gesture = label;

        if let Some((fingers, label)) = observation {
            self.history.push(label);
            self.observe(label, fingers, now);
        }

        let mut volume = None;
        let mut scroll = None;
        match self.mode {
            ControlMode::Volume => {
                if let Some(frame) = frame {
                    let level = self.volume.map(frame.pinch_distance());
                    self.emit(ControlEvent::VolumeSet {
                        level,
                        percent: self.volume.percent(),
                    });
                    volume = Some(level);
                }
            }
            ControlMode::Scroll => {
                scroll = match (label, frame) {
                    (GestureLabel::ScrollUp, Some(frame)) => {
                        self.scroll
                            .drive(ScrollDirection::Up, frame.scroll_span(), now)
                    }
                    (GestureLabel::ScrollDown, Some(frame)) => {
                        self.scroll
                            .drive(ScrollDirection::Down, frame.scroll_span(), now)
                    }
                    _ => self.scroll.coast(),
                };
                if let Some(clicks) = scroll {
                    self.emit(ControlEvent::Scroll { clicks });
                }
            }
            ControlMode::Idle => {}
        }

        self.publish_stats();

        TickOutcome {
            mode: self.mode,
            gesture: label,
            volume,
            scroll,
        }
    }

    /// Feed one labeled frame into the hysteresis gate. Unknown frames
    /// carry no vote: they neither advance nor reset the pending count.
    fn observe(&mut self, label: GestureLabel, fingers: FingerState, now: Instant) {
        let target = match label {
            GestureLabel::Fist => Some(ControlMode::Idle),
            GestureLabel::ScrollUp | GestureLabel::ScrollDown => Some(ControlMode::Scroll),
            GestureLabel::Volume => Some(ControlMode::Volume),
            GestureLabel::Unknown => {
                if self.mode_rules.pinky_exits && fingers.pinky {
                    Some(ControlMode::Idle)
                } else {
                    None
                }
            }
        };
        let Some(target) = target else { return };

        if self.pending == Some(target) {
            self.stability = self.stability.saturating_add(1);
        } else {
            // Any change of candidate restarts the stability window.
            self.pending = Some(target);
            self.stability = 1;
        }

        if self.stability >= self.mode_rules.commit_ticks && target != self.mode {
            self.commit(target, now);
        }
    }

    fn commit(&mut self, to: ControlMode, now: Instant) {
        let from = self.mode;
        let held_ms = self
            .mode_entered_at
            .map(|t| now.duration_since(t).as_millis() as u64)
            .unwrap_or(0);

        info!(
            from = %from,
            to = %to,
            held_ms = held_ms,
            "mode committed"
        );

        self.mode = to;
        self.mode_entered_at = Some(now);

        // Smoothing and momentum are scoped to one mode session.
        self.volume.reset();
        self.scroll.reset();

        self.emit(ControlEvent::ModeChanged { from, to, held_ms });
    }

    fn emit(&self, event: ControlEvent) {
        debug!(?event, "emitting control event");
        let _ = self.event_tx.send(event);
    }

    fn publish_stats(&self) {
        self.stats_tx.send_replace(PipelineStats {
            mode: self.mode,
            gesture: self.gesture,
            hand_visible: self.hand_visible,
            detector_alive: self.detector_alive,
            volume_percent: self.volume.percent(),
            scroll_momentum: self.scroll.momentum(),
            stability: self.history.agreement(),
            fps: self.fps,
            ticks: self.ticks,
            discarded_frames: self.discarded_frames,
            malformed_frames: self.malformed_frames,
        });
    }
}

//! Configuration loading and management

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::control::PipelineTuning;
use crate::tracker::DetectorConfig;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Hand detector subprocess settings
    pub detector: DetectorConfig,

    /// Gesture and control tuning
    pub tuning: PipelineTuning,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")?;
        let data_dir = match std::env::var_os("GHOSTTOUCH_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(&home)
                .join(".local")
                .join("share")
                .join("ghosttouch"),
        };

        let socket_path = match std::env::var_os("GHOSTTOUCH_SOCKET") {
            Some(path) => PathBuf::from(path),
            None => data_dir.join("daemon.sock"),
        };

        let mut detector = DetectorConfig::default();
        if let Ok(command) = std::env::var("GHOSTTOUCH_DETECTOR") {
            let mut parts = command.split_whitespace().map(str::to_string);
            if let Some(program) = parts.next() {
                detector.command = program;
                detector.args = parts.collect();
            }
        }
        if let Ok(value) = std::env::var("GHOSTTOUCH_MIN_CONFIDENCE") {
            detector.min_confidence = value
                .parse()
                .context("GHOSTTOUCH_MIN_CONFIDENCE must be a number")?;
        }

        let mut tuning = PipelineTuning::default();
        if let Ok(value) = std::env::var("GHOSTTOUCH_COMMIT_TICKS") {
            tuning.mode.commit_ticks = value
                .parse()
                .context("GHOSTTOUCH_COMMIT_TICKS must be an integer")?;
        }
        if let Ok(value) = std::env::var("GHOSTTOUCH_PINKY_EXIT") {
            tuning.mode.pinky_exits = matches!(value.as_str(), "1" | "true" | "yes");
        }

        Ok(Self {
            socket_path,
            data_dir,
            detector,
            tuning,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.data_dir.to_string_lossy().contains("ghosttouch"));
        assert!(config.socket_path.to_string_lossy().ends_with("daemon.sock"));
    }

    #[test]
    fn test_detector_command_override() {
        std::env::set_var("GHOSTTOUCH_DETECTOR", "python3 detect.py --fast");
        let config = Config::load();
        std::env::remove_var("GHOSTTOUCH_DETECTOR");

        let config = config.unwrap();
        assert_eq!(config.detector.command, "python3");
        assert_eq!(config.detector.args, vec!["detect.py", "--fast"]);
    }
}

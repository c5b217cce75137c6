//! Configuration for burrow.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $BURROW_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/burrow/config.toml
//!   3. ~/.config/burrow/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::wire::max_wire_len;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BurrowConfig {
    pub sender: SenderConfig,
    pub receiver: ReceiverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Payload bytes per frame, before base64 expansion.
    pub chunk_size: usize,
    /// Playback cadence in frames per second.
    pub fps: u32,
    /// Parallel symbol encoders.
    pub worker_count: usize,
    /// Encoded frames buffered ahead of playback.
    pub queue_capacity: usize,
    /// Edge length of the rendered symbol raster, in pixels.
    pub image_size: u32,
    /// Longest a playback tick waits for a frame before skipping.
    pub pop_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Where completed files are written.
    pub output_dir: PathBuf,
    /// Accepted frames kept for the rolling byte-rate.
    pub history_len: usize,
    /// Minimum spacing between progress log lines.
    pub progress_interval_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            fps: 5,
            worker_count: 8,
            queue_capacity: 32,
            image_size: 400,
            pop_timeout_ms: 1000,
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            output_dir: data_dir().join("received"),
            history_len: 20,
            progress_interval_ms: 1000,
        }
    }
}

impl SenderConfig {
    /// Interval between playback ticks.
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }

    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }
}

impl ReceiverConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("burrow")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("burrow")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid setting {0}: must be positive")]
    Invalid(&'static str),
    #[error("sender.chunk_size {chunk_size} does not fit a {image_size}px symbol")]
    SymbolTooSmall { chunk_size: usize, image_size: u32 },
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BurrowConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit file. A missing file means defaults; a file
    /// that fails to read, parse, or validate is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            BurrowConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BURROW_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&BurrowConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Reject settings that would stall or divide by zero at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sender.chunk_size == 0 {
            return Err(ConfigError::Invalid("sender.chunk_size"));
        }
        if self.sender.fps == 0 {
            return Err(ConfigError::Invalid("sender.fps"));
        }
        if self.sender.worker_count == 0 {
            return Err(ConfigError::Invalid("sender.worker_count"));
        }
        if self.sender.queue_capacity == 0 {
            return Err(ConfigError::Invalid("sender.queue_capacity"));
        }
        if self.sender.image_size == 0 {
            return Err(ConfigError::Invalid("sender.image_size"));
        }
        // The bitmap symbol carries at most one bit per pixel.
        let bits = (max_wire_len(self.sender.chunk_size) as u64).saturating_mul(8);
        let capacity = u64::from(self.sender.image_size).pow(2);
        if bits > capacity {
            return Err(ConfigError::SymbolTooSmall {
                chunk_size: self.sender.chunk_size,
                image_size: self.sender.image_size,
            });
        }
        if self.receiver.history_len == 0 {
            return Err(ConfigError::Invalid("receiver.history_len"));
        }
        Ok(())
    }

    /// Apply BURROW_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BURROW_SENDER__CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.sender.chunk_size = n;
            }
        }
        if let Ok(v) = std::env::var("BURROW_SENDER__FPS") {
            if let Ok(n) = v.parse() {
                self.sender.fps = n;
            }
        }
        if let Ok(v) = std::env::var("BURROW_SENDER__WORKER_COUNT") {
            if let Ok(n) = v.parse() {
                self.sender.worker_count = n;
            }
        }
        if let Ok(v) = std::env::var("BURROW_SENDER__QUEUE_CAPACITY") {
            if let Ok(n) = v.parse() {
                self.sender.queue_capacity = n;
            }
        }
        if let Ok(v) = std::env::var("BURROW_RECEIVER__OUTPUT_DIR") {
            self.receiver.output_dir = PathBuf::from(v);
        }
    }
}

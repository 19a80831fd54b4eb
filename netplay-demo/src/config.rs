//! Configuration for the netplay demo.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Session settings.
    pub session: SessionConfig,
    /// Synthetic video settings.
    pub video: VideoConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of guests to connect (0-3; the slot table caps at 3).
    pub guests: u8,
    /// How long to run before shutting the session down.
    pub duration_secs: u64,
    /// Drop one guest's link mid-run to demonstrate the reconnect.
    pub sever_demo: bool,
}

/// Synthetic video settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Raster width in pixels.
    pub width: u32,
    /// Raster height in scanlines (max 255).
    pub height: u32,
    /// Frames rendered per second.
    pub fps: u32,
    /// Broadcast cadence: "every" or "second".
    pub cadence: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            video: VideoConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            guests: 2,
            duration_secs: 10,
            sever_demo: true,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 240,
            fps: 30,
            cadence: "every".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl DemoConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}

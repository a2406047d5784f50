use std::path::PathBuf;

use vigil_core::matcher::{ALERT_RADIUS, MATCH_TOLERANCE};

/// Default detector downscale factor. Detection runs on a quarter-size
/// copy; reported boxes are mapped back by the same factor.
pub const DEFAULT_DETECT_SCALE: u32 = 4;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the JSON signatures file.
    pub gallery_path: PathBuf,
    /// Path to the SQLite event database.
    pub db_path: PathBuf,
    /// Directory for persisted face crops.
    pub crops_dir: PathBuf,
    /// Accept radius for identity matches.
    pub match_tolerance: f32,
    /// Alert radius for unmatched faces.
    pub alert_radius: f32,
    /// Detector downscale factor (1 = full resolution).
    pub detect_scale: u32,
    /// Whether the alarm drives a real audio device.
    pub audio_enabled: bool,
    /// Frame source: "synthetic" or "replay:<script.json>".
    pub source: String,
    /// Frames the synthetic source produces before ending (0 = unbounded).
    pub synthetic_frames: u64,
    /// Pace between synthetic frames in milliseconds.
    pub synthetic_interval_ms: u64,
}

impl Config {
    /// Load configuration from `VIGIL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("vigil");

        Self {
            gallery_path: env_path("VIGIL_GALLERY_PATH", data_dir.join("signatures.json")),
            db_path: env_path("VIGIL_DB_PATH", data_dir.join("events.db")),
            crops_dir: env_path("VIGIL_CROPS_DIR", data_dir.join("detection_images")),
            match_tolerance: env_f32("VIGIL_MATCH_TOLERANCE", MATCH_TOLERANCE),
            alert_radius: env_f32("VIGIL_ALERT_RADIUS", ALERT_RADIUS),
            detect_scale: env_u32("VIGIL_DETECT_SCALE", DEFAULT_DETECT_SCALE).max(1),
            audio_enabled: std::env::var("VIGIL_AUDIO_ENABLED")
                .map(|v| v != "0")
                .unwrap_or(true),
            source: std::env::var("VIGIL_SOURCE").unwrap_or_else(|_| "synthetic".to_string()),
            synthetic_frames: env_u64("VIGIL_SYNTHETIC_FRAMES", 0),
            synthetic_interval_ms: env_u64("VIGIL_SYNTHETIC_INTERVAL_MS", 100),
        }
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where projects are stored.
    pub projects_dir: PathBuf,

    /// Editing defaults.
    pub editor: EditorDefaults,

    /// Playback and render-loop tuning.
    pub playback: PlaybackDefaults,

    /// Default export parameters.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Editing parameters shared by the timeline store and interaction layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorDefaults {
    /// Maximum number of undo snapshots. Clamped to `[50, 200]`.
    pub history_limit: usize,

    /// Minimum length of any timeline entity, in seconds.
    pub min_clip_secs: f64,

    /// Gap inserted between an entity and its duplicate.
    pub duplicate_gap_secs: f64,

    /// Timeline ruler scale at zoom 1.0.
    pub pixels_per_second: f64,

    /// Width of the trim handle zone at each clip edge, in timeline pixels.
    pub trim_handle_px: f64,
}

/// What the master clock does when the playhead reaches the end of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EndBehavior {
    /// Wrap to time zero and keep playing.
    #[default]
    Loop,
    /// Stop at the end and hold the last frame.
    Stop,
}

/// Playback parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackDefaults {
    /// Behavior at end of timeline.
    pub end_behavior: EndBehavior,

    /// Drift (seconds) a playing decode handle may accumulate before it is re-seeked.
    pub resync_threshold_secs: f64,

    /// Rate of outward time-change notifications (Hz).
    pub notify_hz: u32,

    /// Render tick rate used by the headless scheduler (Hz).
    pub tick_hz: u32,

    /// Fixed number of steps a transition is quantised to.
    pub transition_steps: u32,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Output frame rate.
    pub fps: u32,

    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Video codec passed to the encoder.
    pub video_codec: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "montage_render_engine=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            projects_dir: dirs_default_projects(),
            editor: EditorDefaults::default(),
            playback: PlaybackDefaults::default(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EditorDefaults {
    fn default() -> Self {
        Self {
            history_limit: 100,
            min_clip_secs: 0.1,
            duplicate_gap_secs: 0.0,
            pixels_per_second: 50.0,
            trim_handle_px: 6.0,
        }
    }
}

impl EditorDefaults {
    /// History limit clamped to the supported range.
    pub fn effective_history_limit(&self) -> usize {
        self.history_limit.clamp(50, 200)
    }
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            end_behavior: EndBehavior::Loop,
            resync_threshold_secs: 0.2,
            notify_hz: 15,
            tick_hz: 60,
            transition_steps: 30,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            width: 1920,
            height: 1080,
            video_codec: "h264".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("montage").join("config.json")
}

/// Default projects directory.
fn dirs_default_projects() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("montage").join("projects")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.playback.end_behavior, EndBehavior::Loop);
        assert!((config.playback.resync_threshold_secs - 0.2).abs() < 1e-12);
        assert_eq!(config.playback.notify_hz, 15);
        assert!((config.editor.min_clip_secs - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"playback":{"end_behavior":"stop"}}"#).unwrap();
        assert_eq!(parsed.playback.end_behavior, EndBehavior::Stop);
        assert_eq!(parsed.playback.tick_hz, 60);
        assert_eq!(parsed.editor.history_limit, 100);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_history_limit_is_clamped() {
        let mut editor = EditorDefaults::default();
        editor.history_limit = 5;
        assert_eq!(editor.effective_history_limit(), 50);
        editor.history_limit = 10_000;
        assert_eq!(editor.effective_history_limit(), 200);
    }
}

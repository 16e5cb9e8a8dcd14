//! Application configuration.
//!
//! This is the tool-level configuration (logging, batch defaults, encoder
//! binary). Per-project render settings live in
//! `stove_project_model::ProjectConfig`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default batch settings.
    pub batch: BatchDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Encoder binary invoked by the ffmpeg executor.
    pub ffmpeg_binary: String,
}

/// Default batch parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchDefaults {
    /// Directory rendered videos are written to.
    pub output_dir: PathBuf,

    /// Output file name template; `{project}` is replaced by the project id.
    pub output_template: String,

    /// Maximum number of projects rendered at the same time.
    pub max_concurrent_renders: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "stove_timeline=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            batch: BatchDefaults::default(),
            logging: LoggingConfig::default(),
            ffmpeg_binary: "ffmpeg".to_string(),
        }
    }
}

impl Default for BatchDefaults {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            output_template: "{project}.mp4".to_string(),
            max_concurrent_renders: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
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
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("videostove").join("config.json")
}

/// Default render output directory.
fn default_output_dir() -> PathBuf {
    let base = std::env::var("XDG_VIDEOS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join("Videos")
        });
    base.join("videostove")
}

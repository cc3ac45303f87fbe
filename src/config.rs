//! Pipeline configuration
//!
//! Loaded from a JSON file named by `CLIP_RECORDER_CONFIG`; every field has a
//! default so a missing file or a partial one is fine.

use crate::capture::{CaptureInput, MediaConstraints, VideoConstraint};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the config file path
pub const CONFIG_ENV: &str = "CLIP_RECORDER_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for crate::utils::AppError {
    fn from(e: ConfigError) -> Self {
        crate::utils::AppError::Config(e.to_string())
    }
}

/// Names used inside the engine filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineFiles {
    pub input: String,
    pub output: String,
    pub thumb: String,
}

impl Default for EngineFiles {
    fn default() -> Self {
        Self {
            input: "recording.webm".to_string(),
            output: "output.mp4".to_string(),
            thumb: "thumbnail.jpg".to_string(),
        }
    }
}

/// Suggested download filenames and where downloads land
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "default_video_name")]
    pub video: String,
    #[serde(default = "default_thumbnail_name")]
    pub thumbnail: String,
    #[serde(default = "default_download_dir")]
    pub dir: PathBuf,
}

fn default_video_name() -> String {
    "MyRecording.mp4".to_string()
}

fn default_thumbnail_name() -> String {
    "MyThumbnail.jpg".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            video: default_video_name(),
            thumbnail: default_thumbnail_name(),
            dir: default_download_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    #[serde(default)]
    pub constraints: MediaConstraints,
    /// Recording auto-stops after this long
    #[serde(default = "default_record_duration_ms")]
    pub record_duration_ms: u64,
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    /// Where the thumbnail frame is taken from
    #[serde(default = "default_thumbnail_offset_ms")]
    pub thumbnail_offset_ms: u64,
    #[serde(default)]
    pub files: EngineFiles,
    #[serde(default)]
    pub downloads: DownloadSettings,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default)]
    pub device: CaptureInput,
}

fn default_record_duration_ms() -> u64 {
    5000
}

fn default_target_fps() -> u32 {
    60
}

fn default_thumbnail_offset_ms() -> u64 {
    1000
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            constraints: MediaConstraints::default(),
            record_duration_ms: default_record_duration_ms(),
            target_fps: default_target_fps(),
            thumbnail_offset_ms: default_thumbnail_offset_ms(),
            files: EngineFiles::default(),
            downloads: DownloadSettings::default(),
            ffmpeg_path: default_ffmpeg_path(),
            device: CaptureInput::default(),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load from `CLIP_RECORDER_CONFIG`, or defaults when unset or absent
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                let path = PathBuf::from(path);
                if path.exists() {
                    Self::load(&path)
                } else {
                    tracing::warn!("Config file {:?} not found, using defaults", path);
                    Ok(Self::default())
                }
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_fps == 0 {
            return Err(ConfigError::Invalid("targetFps must be positive".to_string()));
        }
        if self.record_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "recordDurationMs must be positive".to_string(),
            ));
        }
        if !self.constraints.wants_video() {
            return Err(ConfigError::Invalid("video capture must be requested".to_string()));
        }
        if let VideoConstraint::Size(res) = self.constraints.video {
            if res.width == 0 || res.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "invalid resolution {}",
                    res.as_size_arg()
                )));
            }
        }

        let names = [
            &self.files.input,
            &self.files.output,
            &self.files.thumb,
            &self.downloads.video,
            &self.downloads.thumbnail,
        ];
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid("file names must not be empty".to_string()));
        }
        let engine_names = [&self.files.input, &self.files.output, &self.files.thumb];
        if engine_names[0] == engine_names[1]
            || engine_names[0] == engine_names[2]
            || engine_names[1] == engine_names[2]
        {
            return Err(ConfigError::Invalid("engine file names must be distinct".to_string()));
        }
        Ok(())
    }

    pub fn record_duration(&self) -> Duration {
        Duration::from_millis(self.record_duration_ms)
    }

    pub fn thumbnail_offset(&self) -> Duration {
        Duration::from_millis(self.thumbnail_offset_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_reference_behavior() {
        let config = PipelineConfig::default();
        assert_eq!(config.record_duration(), Duration::from_secs(5));
        assert_eq!(config.target_fps, 60);
        assert_eq!(config.thumbnail_offset(), Duration::from_secs(1));
        assert_eq!(config.downloads.video, "MyRecording.mp4");
        assert_eq!(config.downloads.thumbnail, "MyThumbnail.jpg");
        assert!(!config.constraints.audio);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"recordDurationMs": 2000, "device": {"kind": "testPattern"}}"#).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.record_duration_ms, 2000);
        assert_eq!(config.device, CaptureInput::TestPattern);
        assert_eq!(config.files, EngineFiles::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(PipelineConfig::load(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_validate_rejects_zero_fps_and_clashing_names() {
        let mut config = PipelineConfig::default();
        config.target_fps = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.files.output = config.files.input.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_duration_and_empty_names() {
        let mut config = PipelineConfig::default();
        config.record_duration_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PipelineConfig::default();
        config.downloads.thumbnail = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PipelineConfig::default();
        config.files.input = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}

//! FFmpeg transcode engine
//!
//! Runs the FFmpeg CLI against a private scratch directory that plays the
//! role of the engine's virtual filesystem.

use super::engine::TranscodeEngine;
use crate::utils::TranscodeError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;

/// Flat, engine-scoped file namespace backed by a temp directory
pub struct ScratchFs {
    dir: TempDir,
}

impl ScratchFs {
    pub fn new() -> Result<Self, TranscodeError> {
        let dir = tempfile::Builder::new().prefix("clip-recorder-").tempdir()?;
        tracing::debug!("Engine scratch directory: {:?}", dir.path());
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    fn path(&self, name: &str) -> Result<PathBuf, TranscodeError> {
        let flat = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !flat {
            return Err(TranscodeError::EngineFailure(format!(
                "Invalid engine file name: {:?}",
                name
            )));
        }
        Ok(self.dir.path().join(name))
    }

    pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), TranscodeError> {
        tokio::fs::write(self.path(name)?, bytes).await?;
        Ok(())
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>, TranscodeError> {
        match tokio::fs::read(self.path(name)?).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(TranscodeError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove(&self, name: &str) -> Result<(), TranscodeError> {
        match tokio::fs::remove_file(self.path(name)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(TranscodeError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(self.dir.path()) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
                .map(|entry| entry.file_name().to_string_lossy().to_string())
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to list engine scratch directory: {}", e);
                Vec::new()
            }
        };
        names.sort();
        names
    }
}

/// Map a failed FFmpeg run onto the transcode error taxonomy
pub fn classify_failure(stderr: &str) -> TranscodeError {
    let lower = stderr.to_lowercase();
    let last_line = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("ffmpeg exited with an error")
        .trim()
        .to_string();

    if lower.contains("invalid data found when processing input")
        || lower.contains("could not find codec parameters")
        || lower.contains("decoder not found")
        || lower.contains("unknown format")
    {
        TranscodeError::UnsupportedInput(last_line)
    } else {
        TranscodeError::EngineFailure(last_line)
    }
}

/// Transcode engine driving the `ffmpeg` binary
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    scratch: Option<ScratchFs>,
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            scratch: None,
        }
    }

    fn scratch(&self) -> Result<&ScratchFs, TranscodeError> {
        self.scratch
            .as_ref()
            .ok_or_else(|| TranscodeError::EngineFailure("Engine is not loaded".to_string()))
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    fn is_loaded(&self) -> bool {
        self.scratch.is_some()
    }

    async fn load(&mut self) -> Result<(), TranscodeError> {
        if self.is_loaded() {
            tracing::debug!("FFmpeg engine already loaded");
            return Ok(());
        }

        tracing::info!("Loading FFmpeg engine from {:?}", self.ffmpeg);
        let output = Command::new(&self.ffmpeg)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| TranscodeError::EngineFailure(format!("Failed to start FFmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::EngineFailure(format!(
                "ffmpeg -version failed: {}",
                stderr.trim()
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        tracing::info!("{}", version.lines().next().unwrap_or("ffmpeg"));

        self.scratch = Some(ScratchFs::new()?);
        Ok(())
    }

    async fn write_file(&mut self, name: &str, bytes: &[u8]) -> Result<(), TranscodeError> {
        self.scratch()?.write(name, bytes).await
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, TranscodeError> {
        self.scratch()?.read(name).await
    }

    async fn unlink(&mut self, name: &str) -> Result<(), TranscodeError> {
        self.scratch()?.remove(name).await
    }

    async fn run(&mut self, args: &[String]) -> Result<(), TranscodeError> {
        let cwd = self.scratch()?.root().to_path_buf();

        tracing::info!("Running FFmpeg: {:?}", args);
        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin", "-y"])
            .args(args)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| TranscodeError::EngineFailure(format!("Failed to start FFmpeg: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::error!("FFmpeg failed ({}): {}", output.status, stderr.trim());
        Err(classify_failure(&stderr))
    }

    fn files(&self) -> Vec<String> {
        self.scratch.as_ref().map(ScratchFs::list).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scratch_write_read_remove() {
        let fs = ScratchFs::new().unwrap();
        fs.write("recording.webm", b"data").await.unwrap();
        assert_eq!(fs.list(), vec!["recording.webm"]);
        assert_eq!(fs.read("recording.webm").await.unwrap(), b"data");

        fs.remove("recording.webm").await.unwrap();
        assert!(fs.list().is_empty());
        assert_eq!(
            fs.read("recording.webm").await,
            Err(TranscodeError::NotFound("recording.webm".to_string()))
        );
    }

    #[tokio::test]
    async fn test_scratch_rejects_paths() {
        let fs = ScratchFs::new().unwrap();
        assert!(fs.write("../escape", b"x").await.is_err());
        assert!(fs.write("nested/file", b"x").await.is_err());
        assert!(fs.write("", b"x").await.is_err());
        assert!(fs.list().is_empty());
    }

    #[tokio::test]
    async fn test_unloaded_engine_refuses_io() {
        let mut engine = FfmpegEngine::new("ffmpeg");
        assert!(!engine.is_loaded());
        assert!(engine.write_file("a", b"x").await.is_err());
        assert!(engine.files().is_empty());
    }

    #[test]
    fn test_classify_unsupported_input() {
        let stderr = "[matroska,webm @ 0x1] EBML header parsing failed\nrecording.webm: Invalid data found when processing input\n";
        assert!(matches!(
            classify_failure(stderr),
            TranscodeError::UnsupportedInput(msg) if msg.contains("Invalid data")
        ));
    }

    #[test]
    fn test_classify_other_failure() {
        let stderr = "Conversion failed!\n";
        assert_eq!(
            classify_failure(stderr),
            TranscodeError::EngineFailure("Conversion failed!".to_string())
        );
    }
}

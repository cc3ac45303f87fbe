//! FFmpeg-backed camera capture
//!
//! Acquisition probes the platform input with a one-frame dry run. Recording
//! spawns FFmpeg encoding WebM to stdout; each read from stdout is one chunk.

use super::traits::{CaptureDevice, ChunkSource, MediaConstraints, MediaStream, Resolution, StreamSource};
use crate::utils::DeviceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Read size for recorder output
const CHUNK_SIZE: usize = 64 * 1024;

/// How long a stopping recorder gets to flush before it is killed
const FINISH_TIMEOUT: Duration = Duration::from_secs(5);

const FALLBACK_RESOLUTION: Resolution = Resolution {
    width: 1280,
    height: 720,
};

/// Which input FFmpeg reads from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CaptureInput {
    /// The platform camera; `device` overrides the default device name
    Camera {
        #[serde(default)]
        device: Option<String>,
    },
    /// Synthetic test pattern, no hardware needed
    TestPattern,
}

impl Default for CaptureInput {
    fn default() -> Self {
        CaptureInput::Camera { device: None }
    }
}

impl CaptureInput {
    /// FFmpeg input arguments for this source at `size`
    pub fn input_args(&self, size: Resolution) -> Vec<String> {
        let size_arg = size.as_size_arg();
        match self {
            CaptureInput::TestPattern => vec![
                "-re".to_string(),
                "-f".to_string(),
                "lavfi".to_string(),
                "-i".to_string(),
                format!("testsrc=size={}:rate=30", size_arg),
            ],
            CaptureInput::Camera { device } => camera_args(device.as_deref(), &size_arg),
        }
    }

    fn label(&self) -> String {
        match self {
            CaptureInput::TestPattern => "Test pattern".to_string(),
            CaptureInput::Camera { device: Some(device) } => device.clone(),
            CaptureInput::Camera { device: None } => "Default camera".to_string(),
        }
    }
}

#[cfg(target_os = "linux")]
fn camera_args(device: Option<&str>, size_arg: &str) -> Vec<String> {
    vec![
        "-f".to_string(),
        "v4l2".to_string(),
        "-video_size".to_string(),
        size_arg.to_string(),
        "-i".to_string(),
        device.unwrap_or("/dev/video0").to_string(),
    ]
}

#[cfg(target_os = "macos")]
fn camera_args(device: Option<&str>, size_arg: &str) -> Vec<String> {
    vec![
        "-f".to_string(),
        "avfoundation".to_string(),
        "-framerate".to_string(),
        "30".to_string(),
        "-video_size".to_string(),
        size_arg.to_string(),
        "-i".to_string(),
        device.unwrap_or("0").to_string(),
    ]
}

#[cfg(target_os = "windows")]
fn camera_args(device: Option<&str>, size_arg: &str) -> Vec<String> {
    vec![
        "-f".to_string(),
        "dshow".to_string(),
        "-video_size".to_string(),
        size_arg.to_string(),
        "-i".to_string(),
        format!("video={}", device.unwrap_or("Integrated Camera")),
    ]
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn camera_args(device: Option<&str>, size_arg: &str) -> Vec<String> {
    vec![
        "-video_size".to_string(),
        size_arg.to_string(),
        "-i".to_string(),
        device.unwrap_or("default").to_string(),
    ]
}

/// Map a failed probe onto the device error taxonomy
pub fn classify_device_error(stderr: &str) -> DeviceError {
    let lower = stderr.to_lowercase();
    let detail = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("capture device unavailable")
        .trim()
        .to_string();

    if lower.contains("permission denied") || lower.contains("not authorized") {
        DeviceError::PermissionDenied(detail)
    } else if lower.contains("no such file")
        || lower.contains("invalid argument")
        || lower.contains("not supported")
        || lower.contains("cannot open")
        || lower.contains("could not find video device")
        || lower.contains("unknown input format")
    {
        DeviceError::NotSupported(detail)
    } else {
        DeviceError::Unknown(detail)
    }
}

/// Camera access through the FFmpeg CLI
pub struct FfmpegCaptureDevice {
    ffmpeg: PathBuf,
    input: CaptureInput,
}

impl FfmpegCaptureDevice {
    pub fn new(ffmpeg: impl Into<PathBuf>, input: CaptureInput) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            input,
        }
    }
}

#[async_trait]
impl CaptureDevice for FfmpegCaptureDevice {
    async fn acquire(&mut self, constraints: &MediaConstraints) -> Result<MediaStream, DeviceError> {
        if constraints.audio {
            return Err(DeviceError::NotSupported(
                "audio capture is not available".to_string(),
            ));
        }
        if !constraints.wants_video() {
            return Err(DeviceError::NotSupported("no media requested".to_string()));
        }

        let resolution = constraints.resolution().unwrap_or(FALLBACK_RESOLUTION);
        let input_args = self.input.input_args(resolution);

        tracing::info!(
            "Probing {} at {}",
            self.input.label(),
            resolution.as_size_arg()
        );

        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin"])
            .args(&input_args)
            .args(["-frames:v", "1", "-f", "null", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DeviceError::Unknown(format!("Failed to start FFmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let error = classify_device_error(&stderr);
            tracing::warn!("Capture probe failed: {}", error);
            return Err(error);
        }

        let source = FfmpegStream {
            ffmpeg: self.ffmpeg.clone(),
            input_args,
        };
        Ok(MediaStream::new(self.input.label(), resolution, Box::new(source)))
    }
}

struct FfmpegStream {
    ffmpeg: PathBuf,
    input_args: Vec<String>,
}

#[async_trait]
impl StreamSource for FfmpegStream {
    async fn start_recorder(&mut self) -> Result<Box<dyn ChunkSource>, DeviceError> {
        let mut child = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error"])
            .args(&self.input_args)
            .args([
                "-an",
                "-c:v",
                "libvpx",
                "-deadline",
                "realtime",
                "-cpu-used",
                "8",
                "-f",
                "webm",
                "pipe:1",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeviceError::Unknown(format!("Failed to start recorder: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DeviceError::Unknown("Failed to capture recorder stdout".to_string()))?;
        let stdin = child.stdin.take();

        tracing::info!("Recorder started (pid {:?})", child.id());
        Ok(Box::new(FfmpegChunkSource {
            child,
            stdin,
            stdout,
        }))
    }
}

struct FfmpegChunkSource {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
}

#[async_trait]
impl ChunkSource for FfmpegChunkSource {
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, DeviceError>> {
        let mut buffer = vec![0u8; CHUNK_SIZE];
        match self.stdout.read(&mut buffer).await {
            Ok(0) => None,
            Ok(n) => {
                buffer.truncate(n);
                Some(Ok(buffer))
            }
            Err(e) => Some(Err(DeviceError::Unknown(format!(
                "Failed to read recorder output: {}",
                e
            )))),
        }
    }

    async fn finish(&mut self) -> Result<Vec<Vec<u8>>, DeviceError> {
        // `q` asks FFmpeg to finalize the container and exit
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.write_all(b"q").await {
                tracing::debug!("Recorder stdin already closed: {}", e);
            }
        }

        let mut rest = Vec::new();
        let drained = tokio::time::timeout(FINISH_TIMEOUT, self.stdout.read_to_end(&mut rest)).await;
        match drained {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(DeviceError::Unknown(format!(
                    "Failed to drain recorder output: {}",
                    e
                )))
            }
            Err(_) => {
                tracing::warn!("Recorder did not finish within {:?}, killing it", FINISH_TIMEOUT);
                let _ = self.child.kill().await;
            }
        }

        match self.child.wait().await {
            Ok(status) => tracing::debug!("Recorder exited with {}", status),
            Err(e) => tracing::warn!("Failed to reap recorder: {}", e),
        }

        Ok(if rest.is_empty() { Vec::new() } else { vec![rest] })
    }
}

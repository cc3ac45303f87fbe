//! Capture trait definitions
//!
//! Platform-agnostic seams between the pipeline and a camera.

use crate::utils::DeviceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Format as `WIDTHxHEIGHT` for FFmpeg size arguments
    pub fn as_size_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Video part of a media request: either a plain on/off flag or a target size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VideoConstraint {
    Enabled(bool),
    Size(Resolution),
}

/// What the pipeline asks a capture device for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    #[serde(default)]
    pub audio: bool,
    pub video: VideoConstraint,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: false,
            video: VideoConstraint::Size(Resolution {
                width: 1024,
                height: 576,
            }),
        }
    }
}

impl MediaConstraints {
    /// Whether any video track is requested
    pub fn wants_video(&self) -> bool {
        !matches!(self.video, VideoConstraint::Enabled(false))
    }

    /// Requested resolution, if the request pins one
    pub fn resolution(&self) -> Option<Resolution> {
        match self.video {
            VideoConstraint::Size(resolution) => Some(resolution),
            VideoConstraint::Enabled(_) => None,
        }
    }
}

/// Incremental producer of recorded data.
///
/// Chunks are yielded in arrival order and are only meaningful when
/// concatenated in that order.
#[async_trait]
pub trait ChunkSource: Send {
    /// Wait for the next chunk. `None` once the source has nothing more to give.
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, DeviceError>>;

    /// Ask the source to finish and hand back every chunk still in flight, in order.
    async fn finish(&mut self) -> Result<Vec<Vec<u8>>, DeviceError>;
}

/// Device-specific half of a [`MediaStream`]
#[async_trait]
pub trait StreamSource: Send {
    /// Begin encoding the live stream into chunks
    async fn start_recorder(&mut self) -> Result<Box<dyn ChunkSource>, DeviceError>;

    /// Release the underlying tracks
    fn stop(&mut self) {}
}

/// A live camera stream borrowed for the capture phase
pub struct MediaStream {
    id: Uuid,
    label: String,
    resolution: Resolution,
    source: Box<dyn StreamSource>,
}

impl MediaStream {
    pub fn new(label: impl Into<String>, resolution: Resolution, source: Box<dyn StreamSource>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            resolution,
            source,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Start a recorder on this stream
    pub async fn start_recorder(&mut self) -> Result<Box<dyn ChunkSource>, DeviceError> {
        tracing::debug!("Starting recorder on stream {} ({})", self.id, self.label);
        self.source.start_recorder().await
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        tracing::debug!("Releasing stream {}", self.id);
        self.source.stop();
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("resolution", &self.resolution)
            .finish()
    }
}

/// Something that can hand out a camera stream
#[async_trait]
pub trait CaptureDevice: Send {
    /// Acquire a stream satisfying `constraints`
    async fn acquire(&mut self, constraints: &MediaConstraints) -> Result<MediaStream, DeviceError>;
}

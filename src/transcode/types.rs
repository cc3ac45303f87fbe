//! Transcode types
//!
//! Job descriptions handed to the engine and the artifacts it produces.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Which of the two pipeline jobs this is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Reencode,
    Thumbnail,
}

/// One engine invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    pub kind: JobKind,
    /// Engine filesystem name the job reads
    pub input: String,
    /// Ordered command arguments
    pub args: Vec<String>,
    /// Engine filesystem names the job must produce
    pub outputs: Vec<String>,
    /// Seek offset applied to the input, if any
    pub seek: Option<Duration>,
}

impl TranscodeJob {
    /// Re-encode `input` into `output` at a fixed frame rate
    pub fn reencode(input: &str, output: &str, fps: u32) -> Self {
        Self {
            kind: JobKind::Reencode,
            input: input.to_string(),
            args: vec![
                "-i".to_string(),
                input.to_string(),
                "-r".to_string(),
                fps.to_string(),
                output.to_string(),
            ],
            outputs: vec![output.to_string()],
            seek: None,
        }
    }

    /// Extract exactly one frame at `offset` from `input` into `output`
    pub fn thumbnail(input: &str, output: &str, offset: Duration) -> Self {
        Self {
            kind: JobKind::Thumbnail,
            input: input.to_string(),
            args: vec![
                "-i".to_string(),
                input.to_string(),
                "-ss".to_string(),
                format_timestamp(offset),
                "-frames:v".to_string(),
                "1".to_string(),
                output.to_string(),
            ],
            outputs: vec![output.to_string()],
            seek: Some(offset),
        }
    }
}

/// Format a duration as an FFmpeg `HH:MM:SS[.mmm]` timestamp
pub fn format_timestamp(offset: Duration) -> String {
    let total_secs = offset.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = offset.subsec_millis();

    if millis == 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    }
}

/// Logical name of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Video,
    Thumbnail,
}

impl ArtifactKind {
    pub fn name(&self) -> &'static str {
        match self {
            ArtifactKind::Video => "video",
            ArtifactKind::Thumbnail => "thumbnail",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ArtifactKind::Video => "video/mp4",
            ArtifactKind::Thumbnail => "image/jpeg",
        }
    }

    /// Form field name used at the upload boundary
    pub fn field_name(&self) -> &'static str {
        match self {
            ArtifactKind::Video => "video",
            ArtifactKind::Thumbnail => "thumb",
        }
    }
}

/// A finished output buffer
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub bytes: Arc<[u8]>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            bytes: Arc::from(bytes),
        }
    }

    pub fn mime(&self) -> &'static str {
        self.kind.mime()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One form field handed to the upload boundary
#[derive(Debug, Clone)]
pub struct MultipartField {
    pub name: &'static str,
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Arc<[u8]>,
}

/// The final outputs of a session: always exactly a video and a thumbnail
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    entries: BTreeMap<ArtifactKind, Artifact>,
}

impl ArtifactSet {
    pub fn new(video: Vec<u8>, thumbnail: Vec<u8>) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(ArtifactKind::Video, Artifact::new(ArtifactKind::Video, video));
        entries.insert(
            ArtifactKind::Thumbnail,
            Artifact::new(ArtifactKind::Thumbnail, thumbnail),
        );
        Self { entries }
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.entries.get(&kind)
    }

    /// Look an artifact up by its logical name
    pub fn by_name(&self, name: &str) -> Option<&Artifact> {
        self.entries.values().find(|artifact| artifact.kind.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Form fields for the upload boundary, named after the download filenames
    pub fn multipart_fields(&self, video_filename: &str, thumbnail_filename: &str) -> Vec<MultipartField> {
        self.iter()
            .map(|artifact| MultipartField {
                name: artifact.kind.field_name(),
                filename: match artifact.kind {
                    ArtifactKind::Video => video_filename.to_string(),
                    ArtifactKind::Thumbnail => thumbnail_filename.to_string(),
                },
                content_type: artifact.mime(),
                bytes: artifact.bytes.clone(),
            })
            .collect()
    }
}

//! Transcode module
//!
//! Re-encodes a raw recording and extracts a thumbnail from it through a
//! loadable engine with its own filesystem.

pub mod engine;
pub mod ffmpeg;
pub mod pipeline;
pub mod types;

pub use engine::TranscodeEngine;
pub use ffmpeg::FfmpegEngine;
pub use pipeline::{sweep_files, TranscodePlan};
pub use types::{
    Artifact, ArtifactKind, ArtifactSet, JobKind, MultipartField, TranscodeJob,
};

//! Camera capture
//!
//! Device acquisition, live streams and the preview surface they bind to.

pub mod ffmpeg;
pub mod preview;
pub mod traits;

pub use ffmpeg::{CaptureInput, FfmpegCaptureDevice};
pub use preview::{PreviewBinding, PreviewSurface};
pub use traits::{
    CaptureDevice, ChunkSource, MediaConstraints, MediaStream, Resolution, StreamSource,
    VideoConstraint,
};

//! Capture-and-transcode pipeline
//!
//! The controller state machine, its events and notices, and the delivery
//! seams finished artifacts leave through.

pub mod controller;
pub mod delivery;
pub mod state;

pub use controller::PipelineController;
pub use delivery::{ArtifactUploader, DirectoryDownloads, DownloadSurface};
pub use state::{Control, ControlAction, PipelineEvent, PipelineNotice, PipelineState};

//! Pipeline state machine types
//!
//! States, the events that drive them, and the single primary control each
//! state exposes.

use crate::utils::ErrorResponse;
use serde::{Deserialize, Serialize};

/// Where the capture-and-transcode pipeline currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// No camera stream yet
    Idle,
    /// Live preview running
    Capturing,
    Recording,
    /// Recording stopped, raw buffer looping in the preview
    Previewing,
    Transcoding,
    /// Artifacts produced and downloaded
    Ready,
    Error,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Idle
    }
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Capturing => "capturing",
            PipelineState::Recording => "recording",
            PipelineState::Previewing => "previewing",
            PipelineState::Transcoding => "transcoding",
            PipelineState::Ready => "ready",
            PipelineState::Error => "error",
        }
    }
}

/// Inputs to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Acquire the camera
    Acquire,
    /// Activate whatever the primary control is bound to
    Press,
    Start,
    /// User stops the recording early
    Stop,
    /// Recorder delivered a chunk
    Chunk(Vec<u8>),
    /// Auto-stop deadline passed
    Timeout,
    Download,
    Restart,
    /// Throw the current result away and go back to the live preview
    Discard,
}

impl PipelineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::Acquire => "acquire",
            PipelineEvent::Press => "press",
            PipelineEvent::Start => "start",
            PipelineEvent::Stop => "stop",
            PipelineEvent::Chunk(_) => "chunk",
            PipelineEvent::Timeout => "timeout",
            PipelineEvent::Download => "download",
            PipelineEvent::Restart => "restart",
            PipelineEvent::Discard => "discard",
        }
    }
}

/// What the primary control triggers when pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Download,
    Restart,
}

impl From<ControlAction> for PipelineEvent {
    fn from(action: ControlAction) -> Self {
        match action {
            ControlAction::Start => PipelineEvent::Start,
            ControlAction::Download => PipelineEvent::Download,
            ControlAction::Restart => PipelineEvent::Restart,
        }
    }
}

/// The primary control: one label, one enabled flag, at most one bound action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Control {
    pub label: &'static str,
    pub enabled: bool,
    pub action: Option<ControlAction>,
}

impl Control {
    pub fn for_state(state: PipelineState) -> Self {
        let (label, action) = match state {
            PipelineState::Idle => ("Start Recording", None),
            PipelineState::Capturing => ("Start Recording", Some(ControlAction::Start)),
            PipelineState::Recording => ("Recording", None),
            PipelineState::Previewing => ("Download", Some(ControlAction::Download)),
            PipelineState::Transcoding => ("Transcoding...", None),
            PipelineState::Ready | PipelineState::Error => {
                ("Record Again", Some(ControlAction::Restart))
            }
        };

        Self {
            label,
            enabled: action.is_some(),
            action,
        }
    }
}

/// Broadcast to anything rendering the pipeline
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum PipelineNotice {
    StateChanged {
        from: PipelineState,
        to: PipelineState,
        control: Control,
    },
    Error { error: ErrorResponse },
}

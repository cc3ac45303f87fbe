//! Preview surface binding
//!
//! Tracks what the preview surface is currently showing: the live camera
//! or a looping playback of a recorded buffer.

use super::traits::MediaStream;
use crate::registry::AddressHandle;
use uuid::Uuid;

/// What the preview surface is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewBinding {
    /// Live camera frames, nothing buffered
    Live { stream_id: Uuid },
    /// Playback of a recorded buffer through its address
    Playback { url: String, looping: bool },
}

#[derive(Debug, Default)]
pub struct PreviewSurface {
    binding: Option<PreviewBinding>,
}

impl PreviewSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binding(&self) -> Option<&PreviewBinding> {
        self.binding.as_ref()
    }

    /// Show the live stream
    pub fn bind_live(&mut self, stream: &MediaStream) {
        self.clear();
        tracing::debug!("Preview bound to live stream {}", stream.id());
        self.binding = Some(PreviewBinding::Live {
            stream_id: stream.id(),
        });
    }

    /// Loop the recorded buffer behind `handle`. The previous binding is cleared first.
    pub fn bind_playback(&mut self, handle: &AddressHandle) {
        self.clear();
        tracing::debug!("Preview bound to {}", handle.url());
        self.binding = Some(PreviewBinding::Playback {
            url: handle.url(),
            looping: true,
        });
    }

    pub fn clear(&mut self) {
        if let Some(previous) = self.binding.take() {
            tracing::trace!("Preview cleared (was {:?})", previous);
        }
    }

    /// Whether the surface currently shows `handle`
    pub fn shows(&self, handle: &AddressHandle) -> bool {
        matches!(&self.binding, Some(PreviewBinding::Playback { url, .. }) if *url == handle.url())
    }
}

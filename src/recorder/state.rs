//! Recording state management
//!
//! Defines the recording state machine and the finalized recording buffer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// MIME type of what the recorder produces
pub const RECORDING_MIME: &str = "video/webm";

/// Current state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// Created, nothing captured yet
    Ready,
    /// Accumulating chunks
    Recording,
    /// Buffer finalized
    Stopped,
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::Ready
    }
}

/// The concatenated output of one recording session.
///
/// Immutable once built. The bytes are shared so the preview address can
/// point at them without a copy.
#[derive(Debug, Clone)]
pub struct RecordingBuffer {
    data: Arc<[u8]>,
    chunk_count: usize,
    started_at: DateTime<Utc>,
    duration: Duration,
}

impl RecordingBuffer {
    /// Concatenate `chunks` in the order given
    pub fn from_chunks(chunks: Vec<Vec<u8>>, started_at: DateTime<Utc>, duration: Duration) -> Self {
        let total: usize = chunks.iter().map(Vec::len).sum();
        let mut data = Vec::with_capacity(total);
        let chunk_count = chunks.len();
        for chunk in chunks {
            data.extend_from_slice(&chunk);
        }

        Self {
            data: Arc::from(data),
            chunk_count,
            started_at,
            duration,
        }
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall-clock time spent recording
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn mime(&self) -> &'static str {
        RECORDING_MIME
    }
}

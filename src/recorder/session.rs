//! Recording session
//!
//! Drives a stream's recorder into an in-memory buffer:
//! `Ready -> Recording -> Stopped`. A session finalizes exactly one buffer;
//! recording again means creating a new session.

use super::state::{RecordingBuffer, RecordingState};
use crate::capture::{ChunkSource, MediaStream};
use crate::registry::SessionId;
use crate::utils::{AppError, AppResult, DeviceError};
use chrono::{DateTime, Utc};
use std::time::Instant;

/// One recording, from start to a finalized buffer
pub struct RecordingSession {
    id: SessionId,
    state: RecordingState,
    /// Recorder feeding this session while recording
    source: Option<Box<dyn ChunkSource>>,
    /// Set once the recorder reported its end
    source_exhausted: bool,
    /// Chunks in arrival order
    chunks: Vec<Vec<u8>>,
    started: Option<(Instant, DateTime<Utc>)>,
    /// Finalized buffer, until taken
    buffer: Option<RecordingBuffer>,
}

impl RecordingSession {
    /// Create a session that has not started recording
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: RecordingState::Ready,
            source: None,
            source_exhausted: false,
            chunks: Vec::new(),
            started: None,
            buffer: None,
        }
    }

    /// Where this session is in its lifecycle
    pub fn state(&self) -> RecordingState {
        self.state
    }

    fn invalid(&self, event: &'static str) -> AppError {
        tracing::warn!("{}: '{}' ignored in recording state {:?}", self.id, event, self.state);
        AppError::InvalidState {
            state: match self.state {
                RecordingState::Ready => "ready",
                RecordingState::Recording => "recording",
                RecordingState::Stopped => "stopped",
            },
            event,
        }
    }

    /// Start recording from `stream`
    pub async fn start(&mut self, stream: &mut MediaStream) -> AppResult<()> {
        if self.state != RecordingState::Ready {
            return Err(self.invalid("start"));
        }

        let source = stream.start_recorder().await?;
        self.source = Some(source);
        self.started = Some((Instant::now(), Utc::now()));
        self.state = RecordingState::Recording;

        tracing::info!("{} recording from stream {}", self.id, stream.id());
        Ok(())
    }

    /// Append a chunk that just arrived. Empty chunks are dropped.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) -> AppResult<()> {
        if self.state != RecordingState::Recording {
            return Err(self.invalid("chunk"));
        }
        if chunk.is_empty() {
            return Ok(());
        }

        tracing::trace!("{} chunk #{} ({} bytes)", self.id, self.chunks.len(), chunk.len());
        self.chunks.push(chunk);
        Ok(())
    }

    /// Wait for the recorder's next chunk.
    ///
    /// Never resolves while not recording or after the source reported its end,
    /// so it can sit in a `select!` unconditionally.
    pub async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, DeviceError>> {
        if self.state != RecordingState::Recording || self.source_exhausted {
            return std::future::pending().await;
        }
        let Some(source) = self.source.as_mut() else {
            return std::future::pending().await;
        };

        let next = source.next_chunk().await;
        if next.is_none() {
            self.source_exhausted = true;
        }
        next
    }

    /// Stop recording and finalize the buffer
    pub async fn stop(&mut self) -> AppResult<&RecordingBuffer> {
        if self.state != RecordingState::Recording {
            return Err(self.invalid("stop"));
        }

        // Whatever happens below, this session never records again.
        self.state = RecordingState::Stopped;

        if let Some(mut source) = self.source.take() {
            let trailing = source.finish().await?;
            for chunk in trailing {
                if !chunk.is_empty() {
                    self.chunks.push(chunk);
                }
            }
        }

        let (started_instant, started_at) = self.started.unwrap_or_else(|| (Instant::now(), Utc::now()));
        let buffer = RecordingBuffer::from_chunks(
            std::mem::take(&mut self.chunks),
            started_at,
            started_instant.elapsed(),
        );

        tracing::info!(
            "{} stopped: {} bytes in {} chunk(s) over {:?}",
            self.id,
            buffer.len(),
            buffer.chunk_count(),
            buffer.duration()
        );

        let buffer = self.buffer.insert(buffer);
        Ok(&*buffer)
    }

    pub fn buffer(&self) -> Option<&RecordingBuffer> {
        self.buffer.as_ref()
    }

    /// Hand the finalized buffer over. The session keeps nothing afterwards.
    pub fn take_buffer(&mut self) -> Option<RecordingBuffer> {
        self.buffer.take()
    }
}

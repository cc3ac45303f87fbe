//! In-memory stand-ins for the device, engine and delivery seams

use crate::capture::{CaptureDevice, ChunkSource, MediaConstraints, MediaStream, Resolution, StreamSource};
use crate::pipeline::{ArtifactUploader, DownloadSurface};
use crate::recorder::RecordingBuffer;
use crate::registry::{AddressHandle, ObjectUrlRegistry};
use crate::transcode::{MultipartField, TranscodeEngine};
use crate::utils::{AppError, AppResult, DeviceError, TranscodeError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A finalized one-chunk recording
pub fn recording(bytes: &[u8]) -> RecordingBuffer {
    RecordingBuffer::from_chunks(vec![bytes.to_vec()], Utc::now(), Duration::from_secs(5))
}

/// What a scripted recorder does once its queued chunks run out
#[derive(Debug, Clone)]
pub enum ScriptedTail {
    /// Wait until stopped
    Pending,
    /// Report the end of the stream
    End,
    Fail(DeviceError),
}

/// Camera whose recorder yields `chunks`, then follows its tail, then `trailing` on stop
pub struct ScriptedDevice {
    failure: Option<DeviceError>,
    chunks: Vec<Vec<u8>>,
    tail: ScriptedTail,
    trailing: Vec<Vec<u8>>,
    acquisitions: Arc<AtomicUsize>,
}

impl ScriptedDevice {
    pub fn new(chunks: Vec<&[u8]>, trailing: Vec<&[u8]>) -> Self {
        Self {
            failure: None,
            chunks: chunks.into_iter().map(<[u8]>::to_vec).collect(),
            tail: ScriptedTail::Pending,
            trailing: trailing.into_iter().map(<[u8]>::to_vec).collect(),
            acquisitions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(error: DeviceError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(vec![], vec![])
        }
    }

    /// Replace what happens after the queued chunks
    pub fn with_tail(mut self, tail: ScriptedTail) -> Self {
        self.tail = tail;
        self
    }

    pub fn acquisitions(&self) -> Arc<AtomicUsize> {
        self.acquisitions.clone()
    }
}

#[async_trait]
impl CaptureDevice for ScriptedDevice {
    async fn acquire(&mut self, constraints: &MediaConstraints) -> Result<MediaStream, DeviceError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.acquisitions.fetch_add(1, Ordering::SeqCst);

        let resolution = constraints.resolution().unwrap_or(Resolution {
            width: 640,
            height: 480,
        });
        let source = ScriptedStream {
            chunks: self.chunks.clone(),
            tail: self.tail.clone(),
            trailing: self.trailing.clone(),
        };
        Ok(MediaStream::new("Scripted camera", resolution, Box::new(source)))
    }
}

struct ScriptedStream {
    chunks: Vec<Vec<u8>>,
    tail: ScriptedTail,
    trailing: Vec<Vec<u8>>,
}

#[async_trait]
impl StreamSource for ScriptedStream {
    async fn start_recorder(&mut self) -> Result<Box<dyn ChunkSource>, DeviceError> {
        Ok(Box::new(ScriptedChunks {
            queued: self.chunks.iter().cloned().collect(),
            tail: self.tail.clone(),
            trailing: self.trailing.clone(),
        }))
    }
}

struct ScriptedChunks {
    queued: VecDeque<Vec<u8>>,
    tail: ScriptedTail,
    trailing: Vec<Vec<u8>>,
}

#[async_trait]
impl ChunkSource for ScriptedChunks {
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, DeviceError>> {
        if let Some(chunk) = self.queued.pop_front() {
            return Some(Ok(chunk));
        }
        match &self.tail {
            ScriptedTail::Pending => std::future::pending().await,
            ScriptedTail::End => None,
            ScriptedTail::Fail(error) => Some(Err(error.clone())),
        }
    }

    async fn finish(&mut self) -> Result<Vec<Vec<u8>>, DeviceError> {
        Ok(std::mem::take(&mut self.trailing))
    }
}

#[derive(Default)]
struct MemoryState {
    loaded: bool,
    loads: usize,
    files: BTreeMap<String, Vec<u8>>,
    runs: Vec<Vec<String>>,
    injected: Option<TranscodeError>,
}

/// Engine with an in-memory filesystem.
///
/// Inputs starting with `garbage` are undecodable; seeking past
/// `media_duration` produces no frame; `fail_next_run` injects a failure.
/// Clones share state.
#[derive(Clone)]
pub struct MemoryEngine {
    media_duration: Duration,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryEngine {
    pub fn new(media_duration: Duration) -> Self {
        Self {
            media_duration,
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    pub fn loads(&self) -> usize {
        self.state.lock().loads
    }

    pub fn runs(&self) -> Vec<Vec<String>> {
        self.state.lock().runs.clone()
    }

    /// Make the next `run` fail with `error`
    pub fn fail_next_run(&self, error: TranscodeError) {
        self.state.lock().injected = Some(error);
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn parse_timestamp(value: &str) -> Result<Duration, TranscodeError> {
    let invalid = || TranscodeError::EngineFailure(format!("Invalid duration '{}'", value));
    let mut parts = value.split(':');
    let (Some(h), Some(m), Some(s)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let hours: u64 = h.parse().map_err(|_| invalid())?;
    let minutes: u64 = m.parse().map_err(|_| invalid())?;
    let seconds: f64 = s.parse().map_err(|_| invalid())?;
    Ok(Duration::from_secs(hours * 3600 + minutes * 60) + Duration::from_secs_f64(seconds))
}

#[async_trait]
impl TranscodeEngine for MemoryEngine {
    fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    async fn load(&mut self) -> Result<(), TranscodeError> {
        let mut state = self.state.lock();
        if !state.loaded {
            state.loaded = true;
            state.loads += 1;
        }
        Ok(())
    }

    async fn write_file(&mut self, name: &str, bytes: &[u8]) -> Result<(), TranscodeError> {
        let mut state = self.state.lock();
        if !state.loaded {
            return Err(TranscodeError::EngineFailure("engine not loaded".to_string()));
        }
        state.files.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, TranscodeError> {
        self.state
            .lock()
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| TranscodeError::NotFound(name.to_string()))
    }

    async fn unlink(&mut self, name: &str) -> Result<(), TranscodeError> {
        self.state
            .lock()
            .files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| TranscodeError::NotFound(name.to_string()))
    }

    async fn run(&mut self, args: &[String]) -> Result<(), TranscodeError> {
        let mut state = self.state.lock();
        if !state.loaded {
            return Err(TranscodeError::EngineFailure("engine not loaded".to_string()));
        }
        state.runs.push(args.to_vec());
        if let Some(error) = state.injected.take() {
            return Err(error);
        }

        let input = value_after(args, "-i")
            .ok_or_else(|| TranscodeError::EngineFailure("no input".to_string()))?;
        let bytes = state.files.get(input).cloned().ok_or_else(|| {
            TranscodeError::EngineFailure(format!("{}: No such file or directory", input))
        })?;
        if bytes.starts_with(b"garbage") {
            return Err(TranscodeError::UnsupportedInput(format!(
                "{}: Invalid data found when processing input",
                input
            )));
        }
        let output = args
            .last()
            .cloned()
            .ok_or_else(|| TranscodeError::EngineFailure("no output".to_string()))?;

        let produced = match value_after(args, "-ss") {
            Some(offset) if parse_timestamp(offset)? > self.media_duration => return Ok(()),
            Some(_) => [&b"jpeg:"[..], &bytes[..bytes.len().min(4)]].concat(),
            None => [&b"mp4:"[..], &bytes[..]].concat(),
        };
        state.files.insert(output, produced);
        Ok(())
    }

    fn files(&self) -> Vec<String> {
        self.state.lock().files.keys().cloned().collect()
    }
}

/// Download surface that keeps what it was given. Clones share state.
#[derive(Clone, Default)]
pub struct RecordingDownloads {
    saved: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl RecordingDownloads {
    pub fn saved(&self) -> Vec<(String, Vec<u8>)> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl DownloadSurface for RecordingDownloads {
    async fn trigger(
        &mut self,
        registry: &ObjectUrlRegistry,
        handle: &AddressHandle,
        suggested_name: &str,
    ) -> AppResult<()> {
        let bytes = registry.resolve(handle)?;
        self.saved
            .lock()
            .push((suggested_name.to_string(), bytes.to_vec()));
        Ok(())
    }
}

/// Download surface whose every trigger fails with an IO error
pub struct FailingDownloads;

#[async_trait]
impl DownloadSurface for FailingDownloads {
    async fn trigger(
        &mut self,
        _registry: &ObjectUrlRegistry,
        _handle: &AddressHandle,
        suggested_name: &str,
    ) -> AppResult<()> {
        Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("cannot write {}", suggested_name),
        )))
    }
}

/// Upload boundary that keeps the fields it receives, or rejects them all
#[derive(Default)]
pub struct RecordingUploader {
    fields: Mutex<Vec<MultipartField>>,
    rejecting: bool,
}

impl RecordingUploader {
    pub fn rejecting() -> Self {
        Self {
            rejecting: true,
            ..Self::default()
        }
    }

    pub fn fields(&self) -> Vec<MultipartField> {
        self.fields.lock().clone()
    }
}

#[async_trait]
impl ArtifactUploader for RecordingUploader {
    async fn upload(&self, fields: Vec<MultipartField>) -> AppResult<()> {
        if self.rejecting {
            return Err(AppError::Upload("storage endpoint refused the upload".to_string()));
        }
        self.fields.lock().extend(fields);
        Ok(())
    }
}

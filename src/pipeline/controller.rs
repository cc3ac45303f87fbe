//! Pipeline controller
//!
//! Owns the camera stream, the current session, the engine and the address
//! registry, and moves them through
//! `Idle -> Capturing -> Recording -> Previewing -> Transcoding -> Ready`
//! (or `Error`). All input goes through [`PipelineController::handle`]; an
//! event the current state does not list is rejected and changes nothing.

use super::delivery::{ArtifactUploader, DownloadSurface};
use super::state::{Control, PipelineEvent, PipelineNotice, PipelineState};
use crate::capture::{CaptureDevice, MediaStream, PreviewSurface};
use crate::config::PipelineConfig;
use crate::recorder::{RecordingBuffer, RecordingSession};
use crate::registry::{AddressHandle, ObjectUrlRegistry, SessionId};
use crate::transcode::{sweep_files, ArtifactKind, ArtifactSet, TranscodeEngine, TranscodePlan};
use crate::utils::{AppError, AppResult, DeviceError, ErrorResponse};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

/// Everything one capture-through-download cycle owns
struct Session {
    id: SessionId,
    recording: RecordingSession,
    /// Auto-stop deadline while recording
    deadline: Option<Instant>,
    preview_handle: Option<AddressHandle>,
    artifacts: Option<ArtifactSet>,
}

enum LoopInput {
    Event(PipelineEvent),
    SourceFailed(DeviceError),
}

/// Capture-and-transcode state machine
pub struct PipelineController {
    config: PipelineConfig,
    plan: TranscodePlan,
    /// Current pipeline state
    state: PipelineState,
    /// Primary control for `state`
    control: Control,
    /// Last user-visible error
    status: Option<ErrorResponse>,
    device: Box<dyn CaptureDevice>,
    engine: Box<dyn TranscodeEngine>,
    downloads: Box<dyn DownloadSurface>,
    registry: ObjectUrlRegistry,
    preview: PreviewSurface,
    /// Live camera stream, kept across sessions until restart
    stream: Option<MediaStream>,
    session: Option<Session>,
    sessions_started: u64,
    /// Notice broadcaster
    notice_tx: broadcast::Sender<PipelineNotice>,
}

impl PipelineController {
    /// Create an idle controller over the given device, engine and download surface
    pub fn new(
        config: PipelineConfig,
        device: Box<dyn CaptureDevice>,
        engine: Box<dyn TranscodeEngine>,
        downloads: Box<dyn DownloadSurface>,
    ) -> Self {
        let (notice_tx, _) = broadcast::channel(100);
        Self {
            plan: TranscodePlan::from_config(&config),
            config,
            state: PipelineState::Idle,
            control: Control::for_state(PipelineState::Idle),
            status: None,
            device,
            engine,
            downloads,
            registry: ObjectUrlRegistry::new(),
            preview: PreviewSurface::new(),
            stream: None,
            session: None,
            sessions_started: 0,
            notice_tx,
        }
    }

    /// Current pipeline state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Primary control as it should currently be rendered
    pub fn control(&self) -> &Control {
        &self.control
    }

    /// Last user-visible error, cleared on restart
    pub fn status(&self) -> Option<&ErrorResponse> {
        self.status.as_ref()
    }

    /// What the preview surface is showing
    pub fn preview(&self) -> &PreviewSurface {
        &self.preview
    }

    /// Address registry, for download surfaces and leak checks
    pub fn registry(&self) -> &ObjectUrlRegistry {
        &self.registry
    }

    /// Id of the current session, if one is open
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|session| session.id)
    }

    /// The finalized raw recording, until it is handed to the engine
    pub fn recording(&self) -> Option<&RecordingBuffer> {
        self.session.as_ref().and_then(|session| session.recording.buffer())
    }

    /// Artifacts of the current session once it reached `Ready`
    pub fn artifacts(&self) -> Option<&ArtifactSet> {
        self.session.as_ref().and_then(|session| session.artifacts.as_ref())
    }

    /// Residual entries in the engine filesystem
    pub fn engine_files(&self) -> Vec<String> {
        self.engine.files()
    }

    /// Subscribe to pipeline notices
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineNotice> {
        self.notice_tx.subscribe()
    }

    /// Dispatch one event against the current state
    pub async fn handle(&mut self, event: PipelineEvent) -> AppResult<()> {
        let event = match event {
            PipelineEvent::Press => self.bound_event()?,
            other => other,
        };

        match (self.state, event) {
            (PipelineState::Idle, PipelineEvent::Acquire) => self.acquire().await,
            (PipelineState::Capturing, PipelineEvent::Start) => self.start_recording().await,
            (PipelineState::Recording, PipelineEvent::Chunk(chunk)) => self.append_chunk(chunk),
            (PipelineState::Recording, PipelineEvent::Stop | PipelineEvent::Timeout) => {
                self.stop_recording().await
            }
            (PipelineState::Previewing, PipelineEvent::Download) => self.transcode().await,
            (PipelineState::Ready | PipelineState::Error, PipelineEvent::Restart) => {
                self.restart().await
            }
            (
                PipelineState::Previewing | PipelineState::Ready | PipelineState::Error,
                PipelineEvent::Discard,
            ) => self.discard().await,
            (state, event) => Err(self.reject(state, event.name())),
        }
    }

    /// Drive the controller from `events` until the sender side closes.
    ///
    /// While recording, chunks from the recorder and the auto-stop deadline
    /// are folded into the same stream of events.
    pub async fn run_loop(&mut self, mut events: mpsc::Receiver<PipelineEvent>) {
        loop {
            let input = {
                let deadline = self.session.as_ref().and_then(|session| session.deadline);
                let recording = self.session.as_mut().map(|session| &mut session.recording);

                tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => LoopInput::Event(event),
                        None => break,
                    },
                    chunk = next_recorded(recording) => match chunk {
                        Some(Ok(chunk)) => LoopInput::Event(PipelineEvent::Chunk(chunk)),
                        Some(Err(e)) => LoopInput::SourceFailed(e),
                        // Recorder ended on its own: keep what it produced
                        None => LoopInput::Event(PipelineEvent::Stop),
                    },
                    _ = sleep_until_deadline(deadline) => LoopInput::Event(PipelineEvent::Timeout),
                }
            };

            match input {
                LoopInput::Event(event) => {
                    let name = event.name();
                    if let Err(e) = self.handle(event).await {
                        if e.is_terminal() {
                            tracing::error!("'{}' failed: {}", name, e);
                        }
                    }
                }
                LoopInput::SourceFailed(e) => {
                    tracing::error!("Recorder failed: {}", e);
                    self.fail(e.into()).await;
                }
            }
        }

        tracing::debug!("Event channel closed");
    }

    /// Hand the Ready artifacts to the upload boundary
    pub async fn upload(&self, uploader: &dyn ArtifactUploader) -> AppResult<()> {
        let artifacts = match (self.state, self.artifacts()) {
            (PipelineState::Ready, Some(artifacts)) => artifacts,
            (state, _) => return Err(self.reject(state, "upload")),
        };

        let fields = artifacts.multipart_fields(
            &self.config.downloads.video,
            &self.config.downloads.thumbnail,
        );
        uploader.upload(fields).await?;

        tracing::info!("Uploaded artifacts of {:?}", self.session_id());
        Ok(())
    }

    /// Release the session, the stream and the preview
    pub async fn shutdown(&mut self) {
        self.release_session().await;
        self.preview.clear();
        self.stream = None;

        let stats = self.registry.stats();
        if stats.outstanding > 0 {
            tracing::error!("Shutting down with {} live address(es)", stats.outstanding);
        }
        tracing::info!(
            "Pipeline shut down: {} address(es) created, {} revoked",
            stats.created,
            stats.revoked
        );
    }

    fn bound_event(&self) -> AppResult<PipelineEvent> {
        match self.control.action {
            Some(action) if self.control.enabled => Ok(action.into()),
            _ => Err(self.reject(self.state, PipelineEvent::Press.name())),
        }
    }

    fn reject(&self, state: PipelineState, event: &'static str) -> AppError {
        tracing::warn!("Ignoring '{}' in state '{}'", event, state.name());
        AppError::InvalidState {
            state: state.name(),
            event,
        }
    }

    fn missing_session(&self, event: &'static str) -> AppError {
        tracing::error!("No session while handling '{}' in '{}'", event, self.state.name());
        self.reject(self.state, event)
    }

    fn set_state(&mut self, to: PipelineState) {
        let from = self.state;
        self.state = to;
        self.control = Control::for_state(to);

        tracing::info!(
            "Pipeline {} -> {} [{}{}]",
            from.name(),
            to.name(),
            self.control.label,
            if self.control.enabled { "" } else { ", disabled" }
        );
        let _ = self.notice_tx.send(PipelineNotice::StateChanged {
            from,
            to,
            control: self.control.clone(),
        });
    }

    fn surface_error(&mut self, error: &AppError) {
        let response = ErrorResponse::from(error);
        self.status = Some(response.clone());
        let _ = self.notice_tx.send(PipelineNotice::Error { error: response });
    }

    /// End the session on a terminal error
    async fn fail(&mut self, error: AppError) -> AppError {
        if !error.is_terminal() {
            return error;
        }

        tracing::error!("Session failed in '{}': {}", self.state.name(), error);
        self.release_session().await;
        self.surface_error(&error);
        self.set_state(PipelineState::Error);
        error
    }

    /// Revoke every address and remove every engine file the session left behind
    async fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Some(handle) = session.preview_handle.take() {
                if self.preview.shows(&handle) {
                    self.preview.clear();
                }
                if let Err(e) = self.registry.revoke(handle) {
                    tracing::warn!("{}: {}", session.id, e);
                }
            }

            let swept = self.registry.sweep(session.id);
            if swept > 0 {
                tracing::warn!("{} left {} address(es) behind", session.id, swept);
            }
            tracing::debug!("Released {}", session.id);
        }

        sweep_files(self.engine.as_mut()).await;
    }

    async fn acquire(&mut self) -> AppResult<()> {
        match self.device.acquire(&self.config.constraints).await {
            Ok(stream) => {
                tracing::info!(
                    "Acquired {} at {}",
                    stream.label(),
                    stream.resolution().as_size_arg()
                );
                self.preview.bind_live(&stream);
                self.stream = Some(stream);
                self.status = None;
                self.set_state(PipelineState::Capturing);
                Ok(())
            }
            Err(e) => {
                let error = AppError::from(e);
                tracing::error!("Camera acquisition failed: {}", error);
                self.surface_error(&error);
                Err(error)
            }
        }
    }

    async fn start_recording(&mut self) -> AppResult<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(self.missing_session("start"));
        };

        self.sessions_started += 1;
        let id = SessionId(self.sessions_started);
        let mut recording = RecordingSession::new(id);

        if let Err(e) = recording.start(stream).await {
            return Err(self.fail(e).await);
        }

        self.session = Some(Session {
            id,
            recording,
            deadline: Some(Instant::now() + self.config.record_duration()),
            preview_handle: None,
            artifacts: None,
        });
        self.set_state(PipelineState::Recording);
        Ok(())
    }

    fn append_chunk(&mut self, chunk: Vec<u8>) -> AppResult<()> {
        match self.session.as_mut() {
            Some(session) => session.recording.push_chunk(chunk),
            None => Err(self.missing_session("chunk")),
        }
    }

    async fn stop_recording(&mut self) -> AppResult<()> {
        let Some(session) = self.session.as_mut() else {
            return Err(self.missing_session("stop"));
        };
        session.deadline = None;

        let (bytes, mime) = match session.recording.stop().await {
            Ok(buffer) => (buffer.bytes().clone(), buffer.mime()),
            Err(e) => return Err(self.fail(e).await),
        };

        let handle = self.registry.create(session.id, bytes, mime);
        self.preview.bind_playback(&handle);
        session.preview_handle = Some(handle);

        self.set_state(PipelineState::Previewing);
        Ok(())
    }

    async fn transcode(&mut self) -> AppResult<()> {
        let Some(buffer) = self
            .session
            .as_mut()
            .and_then(|session| session.recording.take_buffer())
        else {
            return Err(self.missing_session("download"));
        };

        self.set_state(PipelineState::Transcoding);

        match self.plan.execute(self.engine.as_mut(), buffer).await {
            Ok(artifacts) => self.publish(artifacts).await,
            Err(e) => Err(self.fail(e.into()).await),
        }
    }

    /// Bind addresses to the artifacts, trigger the downloads, then release
    /// every address this session still holds.
    async fn publish(&mut self, artifacts: ArtifactSet) -> AppResult<()> {
        let Some(id) = self.session_id() else {
            return Err(self.missing_session("download"));
        };

        let handles: Vec<(ArtifactKind, AddressHandle)> = artifacts
            .iter()
            .map(|artifact| {
                let handle = self.registry.create(id, artifact.bytes.clone(), artifact.mime());
                (artifact.kind, handle)
            })
            .collect();

        let mut delivered = Ok(());
        for (kind, handle) in &handles {
            let name = match kind {
                ArtifactKind::Video => &self.config.downloads.video,
                ArtifactKind::Thumbnail => &self.config.downloads.thumbnail,
            };
            if let Err(e) = self.downloads.trigger(&self.registry, handle, name).await {
                delivered = Err(e);
                break;
            }
        }

        for (_, handle) in handles {
            if let Err(e) = self.registry.revoke(handle) {
                tracing::warn!("{}: {}", id, e);
            }
        }
        if let Err(e) = delivered {
            return Err(self.fail(e).await);
        }

        if let Some(session) = self.session.as_mut() {
            if let Some(handle) = session.preview_handle.take() {
                self.preview.clear();
                if let Err(e) = self.registry.revoke(handle) {
                    tracing::warn!("{}: {}", id, e);
                }
            }
            session.artifacts = Some(artifacts);
        }

        if let Err(e) = self.registry.ensure_released(id) {
            return Err(self.fail(e).await);
        }

        self.set_state(PipelineState::Ready);
        Ok(())
    }

    async fn restart(&mut self) -> AppResult<()> {
        self.release_session().await;
        self.preview.clear();
        self.stream = None;
        self.status = None;
        self.set_state(PipelineState::Idle);
        self.acquire().await
    }

    async fn discard(&mut self) -> AppResult<()> {
        self.release_session().await;
        self.status = None;

        match self.stream.as_ref() {
            Some(stream) => {
                self.preview.bind_live(stream);
                self.set_state(PipelineState::Capturing);
                Ok(())
            }
            None => {
                self.set_state(PipelineState::Idle);
                self.acquire().await
            }
        }
    }
}

async fn next_recorded(
    recording: Option<&mut RecordingSession>,
) -> Option<Result<Vec<u8>, DeviceError>> {
    match recording {
        Some(recording) => recording.next_chunk().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

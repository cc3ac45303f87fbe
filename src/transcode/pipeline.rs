//! Transcode pipeline orchestration
//!
//! Turns a finalized recording into an [`ArtifactSet`]: loads the engine if
//! needed, stages the input, runs the re-encode and thumbnail jobs in order,
//! and removes every file it staged whether or not the jobs succeeded.

use super::engine::TranscodeEngine;
use super::types::{ArtifactSet, JobKind, TranscodeJob};
use crate::config::{EngineFiles, PipelineConfig};
use crate::recorder::RecordingBuffer;
use crate::utils::TranscodeError;
use std::time::Duration;

/// The two-job plan applied to every recording
#[derive(Debug, Clone)]
pub struct TranscodePlan {
    files: EngineFiles,
    target_fps: u32,
    thumbnail_offset: Duration,
}

impl TranscodePlan {
    pub fn new(files: EngineFiles, target_fps: u32, thumbnail_offset: Duration) -> Self {
        Self {
            files,
            target_fps,
            thumbnail_offset,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.files.clone(),
            config.target_fps,
            config.thumbnail_offset(),
        )
    }

    /// Jobs in the order they must run
    pub fn jobs(&self) -> [TranscodeJob; 2] {
        [
            TranscodeJob::reencode(&self.files.input, &self.files.output, self.target_fps),
            TranscodeJob::thumbnail(&self.files.input, &self.files.thumb, self.thumbnail_offset),
        ]
    }

    /// Transcode `buffer`. The buffer is consumed; nothing may touch it afterwards.
    pub async fn execute(
        &self,
        engine: &mut dyn TranscodeEngine,
        buffer: RecordingBuffer,
    ) -> Result<ArtifactSet, TranscodeError> {
        if !engine.is_loaded() {
            engine.load().await?;
        }

        tracing::info!(
            "Transcoding {} bytes recorded over {:?}",
            buffer.len(),
            buffer.duration()
        );

        let staged = engine.write_file(&self.files.input, buffer.bytes()).await;
        drop(buffer);

        let result = match staged {
            Ok(()) => self.run_jobs(engine).await,
            Err(e) => Err(e),
        };
        let cleanup = self.cleanup(engine).await;

        let artifacts = result?;
        cleanup?;
        Ok(artifacts)
    }

    async fn run_jobs(&self, engine: &mut dyn TranscodeEngine) -> Result<ArtifactSet, TranscodeError> {
        let [reencode, thumbnail] = self.jobs();

        let video = run_job(engine, &reencode).await?.into_iter().next();
        let thumb = run_job(engine, &thumbnail).await?.into_iter().next();

        match (video, thumb) {
            (Some(video), Some(thumb)) => Ok(ArtifactSet::new(video, thumb)),
            _ => Err(TranscodeError::EngineFailure(
                "Job declared no outputs".to_string(),
            )),
        }
    }

    /// Remove the input and both outputs, tolerating files that were never written
    async fn cleanup(&self, engine: &mut dyn TranscodeEngine) -> Result<(), TranscodeError> {
        let present = engine.files();
        for name in [&self.files.input, &self.files.output, &self.files.thumb] {
            if present.iter().any(|file| file == name) {
                engine.unlink(name).await?;
            }
        }
        Ok(())
    }
}

/// Run one job and read back its outputs.
///
/// A job that exits cleanly but leaves an output missing or empty is a
/// failure; for a seeking job that means the offset lies past the end.
async fn run_job(
    engine: &mut dyn TranscodeEngine,
    job: &TranscodeJob,
) -> Result<Vec<Vec<u8>>, TranscodeError> {
    tracing::debug!("Running {:?} job", job.kind);
    engine.run(&job.args).await?;

    let mut outputs = Vec::with_capacity(job.outputs.len());
    for name in &job.outputs {
        let bytes = match engine.read_file(name).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) | Err(TranscodeError::NotFound(_)) => {
                return Err(missing_output(job, name));
            }
            Err(e) => return Err(e),
        };
        outputs.push(bytes);
    }
    Ok(outputs)
}

fn missing_output(job: &TranscodeJob, name: &str) -> TranscodeError {
    match (job.kind, job.seek) {
        (JobKind::Thumbnail, Some(offset)) => {
            tracing::warn!("Thumbnail job produced nothing at {:?}", offset);
            TranscodeError::SeekBeyondDuration {
                offset_ms: offset.as_millis() as u64,
            }
        }
        _ => TranscodeError::EngineFailure(format!("{:?} job produced no {}", job.kind, name)),
    }
}

/// Remove every file left in the engine filesystem. Returns how many were removed.
pub async fn sweep_files(engine: &mut dyn TranscodeEngine) -> usize {
    let mut removed = 0;
    for name in engine.files() {
        match engine.unlink(&name).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Failed to remove engine file {}: {}", name, e),
        }
    }
    if removed > 0 {
        tracing::info!("Swept {} engine file(s)", removed);
    }
    removed
}

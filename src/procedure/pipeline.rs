//! Step extraction pipeline
//!
//! Orchestrates one demonstration video end to end:
//! 1. Probes the video and samples frames within the backend's budget
//! 2. Asks the model for a timestamped procedure
//! 3. Parses and repairs the answer
//! 4. Reconciles step windows against the real duration
//! 5. Optionally cuts one clip and one spoken instruction per step
//!
//! Clip and audio failures are logged per step and never abort the run. Only a
//! video that yields no frames or a failed model call is an error.

use crate::ai::{BackendError, ModelBackend};
use crate::media::{MediaError, VideoSampler, DEFAULT_FRAME_SIZE};
use crate::procedure::{Procedure, TimestampReconciler};
use crate::prompt::PromptBuilder;
use crate::response::parse_procedure;
use crate::speech::SpeechSynthesizer;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No frames could be extracted from {0}")]
    NoFrames(PathBuf),

    #[error("Video error: {0}")]
    Media(#[from] MediaError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl PipelineError {
    /// Returns a user-friendly error message with troubleshooting hints
    pub fn help_message(&self) -> String {
        match self {
            PipelineError::NoFrames(path) => format!(
                "Error: No frames extracted\nVideo: {}\n\n\
                Help: The video could not be decoded. Check that:\n\
                - The file is a complete, playable video\n\
                - ffmpeg supports its codec (ffmpeg -i <file>)",
                path.display()
            ),
            PipelineError::Media(MediaError::ToolMissing { tool }) => format!(
                "Error: {} not found\n\n\
                Help: Install ffmpeg (which ships ffprobe) and make sure it is on PATH.",
                tool
            ),
            PipelineError::Media(e) => format!("Error: {}\n\nHelp: Check the video path.", e),
            PipelineError::Backend(BackendError::ConfigurationError { message }) => format!(
                "Error: Backend not configured\n\n\
                Help: For the cloud backend set OPENAI_API_KEY, or switch to the local one:\n\
                export CYCLOPS_PROVIDER=local\n\n\
                Details: {}",
                message
            ),
            PipelineError::Backend(BackendError::TimeoutError { seconds }) => format!(
                "Error: Model request timed out after {} seconds\n\n\
                Help: Try:\n\
                - Increase the timeout: --timeout {}\n\
                - Use a shorter video\n\
                - Check backend availability: cyclops health",
                seconds,
                seconds * 2
            ),
            PipelineError::Backend(BackendError::NetworkError { message }) => format!(
                "Error: Cannot reach the model backend\n\n\
                Help: Try:\n\
                - Start Ollama: ollama serve\n\
                - Pull a vision model: ollama pull llama3.2-vision\n\
                - Check backend availability: cyclops health\n\n\
                Details: {}",
                message
            ),
            PipelineError::Backend(e) => format!(
                "Error: {}\n\nHelp: Check backend availability: cyclops health",
                e
            ),
        }
    }
}

/// What one extraction run produced
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub procedure: Procedure,
    /// `complete`, `partial` or `fallback`
    pub parse_quality: &'static str,
    pub video_duration: f64,
    pub frames_sent: usize,
    pub clips_extracted: usize,
    pub audio_generated: usize,
    pub elapsed: Duration,
}

/// Video in, reconciled and annotated procedure out
pub struct StepExtractionPipeline {
    backend: Arc<dyn ModelBackend>,
    sampler: Arc<dyn VideoSampler>,
    speech: Option<(Arc<dyn SpeechSynthesizer>, PathBuf)>,
    reconciler: TimestampReconciler,
    extract_clips: bool,
}

impl StepExtractionPipeline {
    pub fn new(backend: Arc<dyn ModelBackend>, sampler: Arc<dyn VideoSampler>) -> Self {
        Self {
            backend,
            sampler,
            speech: None,
            reconciler: TimestampReconciler::new(),
            extract_clips: true,
        }
    }

    /// Enables spoken instructions, written into `audio_dir`
    pub fn with_speech(
        mut self,
        speech: Arc<dyn SpeechSynthesizer>,
        audio_dir: impl Into<PathBuf>,
    ) -> Self {
        self.speech = Some((speech, audio_dir.into()));
        self
    }

    pub fn with_clips(mut self, enabled: bool) -> Self {
        self.extract_clips = enabled;
        self
    }

    pub fn backend(&self) -> &Arc<dyn ModelBackend> {
        &self.backend
    }

    /// Runs the whole pipeline for one video
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` when the video cannot be sampled or the model
    /// call fails. Damaged model output is not an error.
    pub async fn extract(
        &self,
        video_path: &Path,
        title: &str,
        lesson_id: &str,
    ) -> Result<ExtractionReport, PipelineError> {
        let start = Instant::now();
        info!(lesson_id, video = %video_path.display(), "Extracting steps");

        let info = self.sampler.get_info(video_path).await?;
        let requested = self.backend.frame_budget();
        let frames = self
            .sampler
            .extract_frames(video_path, requested, DEFAULT_FRAME_SIZE)
            .await?;
        if frames.is_empty() {
            return Err(PipelineError::NoFrames(video_path.to_path_buf()));
        }

        let frames_sent = frames.len().min(requested);
        // Per-frame timestamps assume the even spacing of a full sample
        let timeline_frames = if frames.len() < requested {
            warn!(
                lesson_id,
                "Sampler returned {} of {} frames, omitting frame timestamps",
                frames.len(),
                requested
            );
            0
        } else {
            frames_sent
        };
        let request = PromptBuilder::extraction(title, info.duration, timeline_frames);
        debug!(
            lesson_id,
            frames = frames_sent,
            backend = self.backend.name(),
            "Sending extraction request"
        );

        let text = self
            .backend
            .analyze_video(&frames, request)
            .await
            .map_err(|e| {
                warn!(lesson_id, backend = self.backend.name(), "Extraction call failed: {}", e);
                e
            })?;

        let outcome = parse_procedure(&text, lesson_id);
        let parse_quality = outcome.label();
        let mut procedure = outcome.into_inner();

        self.reconciler.reconcile(&mut procedure.steps, info.duration);

        let clips_extracted = if self.extract_clips {
            self.cut_clips(lesson_id, video_path, &mut procedure).await
        } else {
            0
        };
        let audio_generated = self.synthesize_audio(lesson_id, &mut procedure).await;

        let report = ExtractionReport {
            parse_quality,
            video_duration: info.duration,
            frames_sent,
            clips_extracted,
            audio_generated,
            elapsed: start.elapsed(),
            procedure,
        };
        info!(
            lesson_id,
            steps = report.procedure.total_steps,
            quality = parse_quality,
            clips = clips_extracted,
            audio = audio_generated,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Extraction finished"
        );
        Ok(report)
    }

    /// Re-cuts every clip of an existing procedure; returns how many succeeded
    pub async fn regenerate_clips(
        &self,
        lesson_id: &str,
        video_path: &Path,
        procedure: &mut Procedure,
    ) -> Result<usize, PipelineError> {
        let info = self.sampler.get_info(video_path).await?;
        self.reconciler.reconcile(&mut procedure.steps, info.duration);
        Ok(self.cut_clips(lesson_id, video_path, procedure).await)
    }

    async fn cut_clips(&self, lesson_id: &str, video_path: &Path, procedure: &mut Procedure) -> usize {
        let mut extracted = 0;
        for step in procedure.steps.iter_mut() {
            let name = format!("{}_step_{}.mp4", lesson_id, step.step_id);
            match self
                .sampler
                .extract_clip(video_path, step.start_time, step.end_time, &name)
                .await
            {
                Ok(path) => {
                    debug!(lesson_id, step_id = step.step_id, "Clip written to {}", path.display());
                    step.clip_url = Some(clip_url(lesson_id, step.step_id));
                    extracted += 1;
                }
                Err(e) => {
                    warn!(lesson_id, step_id = step.step_id, "Clip extraction failed: {}", e);
                }
            }
        }
        extracted
    }

    async fn synthesize_audio(&self, lesson_id: &str, procedure: &mut Procedure) -> usize {
        let Some((speech, audio_dir)) = &self.speech else {
            return 0;
        };

        if let Err(e) = tokio::fs::create_dir_all(audio_dir).await {
            warn!(lesson_id, "Cannot create audio directory {}: {}", audio_dir.display(), e);
            return 0;
        }

        let mut generated = 0;
        for step in procedure.steps.iter_mut() {
            let path = audio_dir.join(format!(
                "{}_step_{}.{}",
                lesson_id,
                step.step_id,
                speech.extension()
            ));

            let result = match speech.generate(step.spoken_text()).await {
                Ok(bytes) => tokio::fs::write(&path, bytes).await.map_err(Into::into),
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    step.audio_url = Some(audio_url(lesson_id, step.step_id));
                    generated += 1;
                }
                Err(e) => {
                    warn!(lesson_id, step_id = step.step_id, "Speech synthesis failed: {}", e);
                }
            }
        }
        generated
    }
}

pub fn clip_url(lesson_id: &str, step_id: u32) -> String {
    format!("/lessons/{}/clips/{}", lesson_id, step_id)
}

pub fn audio_url(lesson_id: &str, step_id: u32) -> String {
    format!("/lessons/{}/audio/{}", lesson_id, step_id)
}

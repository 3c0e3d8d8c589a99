//! Lesson lifecycle and the live-session entry points
//!
//! [`LessonService`] ties the repository to the model-driven components:
//! creating a lesson starts extraction in the background, verification and
//! feedback look up the active step before calling the model.

use crate::lessons::{Lesson, LessonRepository, LessonUpdate, RepositoryError};
use crate::overlay::{OverlayGenerator, OverlayInstruction};
use crate::procedure::{PipelineError, Step, StepExtractionPipeline};
use crate::verification::{VerificationClassifier, VerificationOutcome, VerificationRequest};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LessonError {
    #[error("Lesson not found: {0}")]
    LessonNotFound(String),

    #[error("Lesson {0} has no procedure")]
    NoProcedure(String),

    #[error("Step {step_id} not found in lesson {lesson_id}")]
    InvalidStepReference { lesson_id: String, step_id: u32 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Video import failed: {0}")]
    Import(#[from] std::io::Error),
}

impl LessonError {
    /// HTTP status a transport layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            LessonError::LessonNotFound(_) => 404,
            LessonError::NoProcedure(_)
            | LessonError::InvalidStepReference { .. }
            | LessonError::InvalidRequest(_) => 400,
            LessonError::Repository(_) | LessonError::Pipeline(_) | LessonError::Import(_) => 500,
        }
    }
}

/// A mistake detected on the learner's device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub lesson_id: String,
    pub step_id: u32,
    pub mistake_type: String,
    /// On-device detection confidence, within `[0, 1]`
    pub confidence: f64,
    #[serde(default, alias = "frame_base64")]
    pub frame: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub success: bool,
    pub overlay: Option<OverlayInstruction>,
    pub message: String,
}

pub struct LessonService {
    repository: Arc<dyn LessonRepository>,
    pipeline: Arc<StepExtractionPipeline>,
    classifier: VerificationClassifier,
    overlays: OverlayGenerator,
    videos_dir: Option<PathBuf>,
}

impl LessonService {
    pub fn new(
        repository: Arc<dyn LessonRepository>,
        pipeline: StepExtractionPipeline,
        classifier: VerificationClassifier,
        overlays: OverlayGenerator,
    ) -> Self {
        Self {
            repository,
            pipeline: Arc::new(pipeline),
            classifier,
            overlays,
            videos_dir: None,
        }
    }

    /// Copies every new demonstration video into `dir` under a fresh name
    pub fn with_videos_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.videos_dir = Some(dir.into());
        self
    }

    pub fn repository(&self) -> &Arc<dyn LessonRepository> {
        &self.repository
    }

    /// Stores a new `processing` lesson and starts extraction in the background
    ///
    /// The returned handle resolves to the lesson in its final state. Dropping
    /// it does not cancel the extraction.
    pub async fn create_lesson(
        &self,
        video_path: &Path,
        title: &str,
    ) -> Result<(Lesson, JoinHandle<Result<Lesson, LessonError>>), LessonError> {
        if !video_path.is_file() {
            return Err(LessonError::InvalidRequest(format!(
                "video not found: {}",
                video_path.display()
            )));
        }

        let stored = self.import_video(video_path).await?;
        let lesson = self
            .repository
            .create(Lesson::new(title, stored.to_string_lossy()))
            .await?;
        info!(lesson_id = %lesson.id, title = %lesson.title, "Created lesson");

        let repository = Arc::clone(&self.repository);
        let pipeline = Arc::clone(&self.pipeline);
        let lesson_id = lesson.id.clone();
        let title = lesson.title.clone();
        let handle = tokio::spawn(async move {
            run_extraction(repository.as_ref(), &pipeline, &lesson_id, &stored, &title).await
        });

        Ok((lesson, handle))
    }

    pub async fn get_lesson(&self, id: &str) -> Result<Lesson, LessonError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| LessonError::LessonNotFound(id.to_string()))
    }

    pub async fn list_lessons(&self) -> Result<Vec<Lesson>, LessonError> {
        Ok(self.repository.get_all().await?)
    }

    pub async fn delete_lesson(&self, id: &str) -> Result<(), LessonError> {
        if self.repository.delete(id).await? {
            self.classifier.gate().reset(id);
            info!(lesson_id = id, "Deleted lesson");
            Ok(())
        } else {
            Err(LessonError::LessonNotFound(id.to_string()))
        }
    }

    /// Re-cuts the step clips of a lesson from its stored video
    pub async fn regenerate_clips(&self, id: &str) -> Result<Lesson, LessonError> {
        let lesson = self.get_lesson(id).await?;
        let mut procedure = lesson
            .ai_teacher_config
            .filter(|p| !p.is_empty())
            .ok_or_else(|| LessonError::NoProcedure(id.to_string()))?;

        let cut = self
            .pipeline
            .regenerate_clips(id, Path::new(&lesson.demo_video_url), &mut procedure)
            .await?;
        info!(lesson_id = id, clips = cut, "Regenerated clips");

        self.repository
            .update(id, LessonUpdate::procedure(procedure))
            .await?
            .ok_or_else(|| LessonError::LessonNotFound(id.to_string()))
    }

    /// Classifies a burst of live frames against the lesson's step
    ///
    /// A blank title or description in the request is filled in from the
    /// stored step.
    pub async fn verify_step(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationOutcome, LessonError> {
        let step = self.find_step(&request.lesson_id, request.step_id).await?;

        let mut request = request.clone();
        if request.step_title.trim().is_empty() {
            request.step_title = step.title;
        }
        if request.step_description.trim().is_empty() {
            request.step_description = step.description;
        }
        Ok(self.classifier.verify(&request).await)
    }

    /// Produces a corrective overlay for a detected mistake
    ///
    /// Model failures still answer `success: true` with the per-step fallback
    /// overlay; only bad references and invalid input are errors.
    pub async fn feedback(&self, request: &FeedbackRequest) -> Result<FeedbackResponse, LessonError> {
        if !(0.0..=1.0).contains(&request.confidence) {
            return Err(LessonError::InvalidRequest(format!(
                "confidence must be within [0, 1], got {}",
                request.confidence
            )));
        }
        if request.mistake_type.trim().is_empty() {
            return Err(LessonError::InvalidRequest(
                "mistake_type must not be empty".to_string(),
            ));
        }

        let step = self.find_step(&request.lesson_id, request.step_id).await?;
        let result = self
            .overlays
            .generate(&step, &request.mistake_type, request.frame.as_deref())
            .await;

        let message = if result.degraded {
            warn!(
                lesson_id = %request.lesson_id,
                step_id = request.step_id,
                "Answering feedback with fallback overlay"
            );
            "Using fallback correction"
        } else {
            "Correction generated successfully"
        };

        Ok(FeedbackResponse {
            success: true,
            overlay: Some(result.instruction),
            message: message.to_string(),
        })
    }

    async fn find_step(&self, lesson_id: &str, step_id: u32) -> Result<Step, LessonError> {
        let lesson = self.get_lesson(lesson_id).await?;
        let procedure = lesson
            .ai_teacher_config
            .ok_or_else(|| LessonError::NoProcedure(lesson_id.to_string()))?;

        procedure
            .steps
            .into_iter()
            .find(|s| s.step_id == step_id)
            .ok_or_else(|| LessonError::InvalidStepReference {
                lesson_id: lesson_id.to_string(),
                step_id,
            })
    }

    async fn import_video(&self, video_path: &Path) -> Result<PathBuf, LessonError> {
        let Some(dir) = &self.videos_dir else {
            return Ok(video_path.to_path_buf());
        };

        let extension = video_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        tokio::fs::create_dir_all(dir).await?;
        let target = dir.join(format!("{}.{}", Uuid::new_v4(), extension));
        tokio::fs::copy(video_path, &target).await?;
        Ok(target)
    }
}

/// Runs extraction for a stored lesson and records the outcome
async fn run_extraction(
    repository: &dyn LessonRepository,
    pipeline: &StepExtractionPipeline,
    lesson_id: &str,
    video_path: &Path,
    title: &str,
) -> Result<Lesson, LessonError> {
    let update = match pipeline.extract(video_path, title, lesson_id).await {
        Ok(report) => LessonUpdate::ready(report.procedure),
        Err(e) => {
            error!(lesson_id, "Extraction failed, keeping lesson without a procedure: {}", e);
            LessonUpdate::failed(e.to_string())
        }
    };

    repository
        .update(lesson_id, update)
        .await?
        .ok_or_else(|| LessonError::LessonNotFound(lesson_id.to_string()))
}

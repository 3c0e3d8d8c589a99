//! cyclops - turns demonstration videos into guided lessons
//!
//! A lesson starts as a demonstration video. The extraction pipeline samples
//! frames, asks a vision model for a timestamped step list, reconciles the
//! step windows against the real duration and cuts one clip per step. During
//! a live session the learner's camera frames are classified against the
//! active step, and detected mistakes get a corrective diagram overlay.
//!
//! # Example Usage
//!
//! ```ignore
//! use cyclops::{CyclopsConfig, FfmpegSampler, StepExtractionPipeline};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! async fn extract(video: &Path) -> anyhow::Result<()> {
//!     let config = CyclopsConfig::default();
//!     let backend = config.create_backend()?;
//!     let sampler = Arc::new(FfmpegSampler::new(config.clips_dir()));
//!
//!     let report = StepExtractionPipeline::new(backend, sampler)
//!         .extract(video, "Change a tire", "lesson-1")
//!         .await?;
//!
//!     for step in &report.procedure.steps {
//!         println!("{:>5.1}s  {}", step.start_time, step.title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`ai`]: vision model backends (local Ollama, hosted API, mock)
//! - [`prompt`]: prompt templates for the three model calls
//! - [`response`]: tolerant parsing of model output
//! - [`procedure`]: steps, timestamp reconciliation, the extraction pipeline
//! - [`verification`]: rate-gated live step classification
//! - [`overlay`]: corrective overlay model and generator
//! - [`lessons`]: lesson storage and the service tying it all together
//! - [`media`]: ffmpeg frame sampling and clip cutting
//! - [`speech`]: spoken instruction synthesis

pub mod ai;
pub mod cli;
pub mod config;
pub mod lessons;
pub mod media;
pub mod overlay;
pub mod procedure;
pub mod prompt;
pub mod response;
pub mod speech;
pub mod util;
pub mod verification;

pub use ai::{create_backend, BackendConfig, BackendError, ModelBackend, VisionRequest};
pub use config::{ConfigError, CyclopsConfig, Provider};
pub use lessons::{Lesson, LessonError, LessonService, LessonStatus};
pub use media::{FfmpegSampler, MediaError, VideoSampler};
pub use overlay::{OverlayGenerator, OverlayInstruction};
pub use procedure::{Procedure, Step, StepExtractionPipeline, TimestampReconciler};
pub use response::ParseOutcome;
pub use verification::{VerificationClassifier, VerificationOutcome, VerificationStatus};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

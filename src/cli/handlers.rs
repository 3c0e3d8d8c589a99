//! Command handlers
//!
//! Each handler returns the process exit code; errors are reported on stderr
//! and never panic.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cli::commands::{
    BackendArgs, ConfigArgs, ExtractArgs, FeedbackArgs, HealthArgs, LessonCommands,
    LessonCreateArgs, LessonIdArgs, VerifyArgs,
};
use crate::cli::output::{HealthStatus, OutputFormatter};
use crate::config::{CyclopsConfig, Provider};
use crate::lessons::{
    FeedbackRequest, JsonLessonRepository, Lesson, LessonError, LessonRepository, LessonService,
    LessonStatus,
};
use crate::media::FfmpegSampler;
use crate::overlay::OverlayGenerator;
use crate::procedure::{PipelineError, StepExtractionPipeline};
use crate::verification::{VerificationClassifier, VerificationRequest};

/// Loads the environment configuration and applies command-line overrides
pub fn load_config(overrides: &BackendArgs) -> Result<CyclopsConfig> {
    let mut config = CyclopsConfig::default();

    if let Some(provider) = overrides.provider {
        config.provider = provider;
    }
    if let Some(model) = &overrides.model {
        match config.provider {
            Provider::Cloud => config.cloud_model = model.clone(),
            Provider::Local => config.local_model = model.clone(),
        }
    }
    if let Some(timeout) = overrides.timeout {
        config.request_timeout_secs = Some(timeout);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_pipeline(config: &CyclopsConfig, tts: bool) -> Result<StepExtractionPipeline> {
    let backend = config.create_backend()?;
    let sampler = Arc::new(FfmpegSampler::new(config.clips_dir()));
    let mut pipeline = StepExtractionPipeline::new(backend, sampler);

    if tts || config.tts_enabled {
        let mut speech_config = config.clone();
        speech_config.tts_enabled = true;
        if let Some(speech) = speech_config.create_speech()? {
            pipeline = pipeline.with_speech(speech, config.audio_dir());
        }
    }

    Ok(pipeline)
}

/// Wires the lesson service from configuration
pub fn build_service(config: &CyclopsConfig, tts: bool) -> Result<LessonService> {
    let pipeline = build_pipeline(config, tts)?;
    let backend = Arc::clone(pipeline.backend());

    Ok(LessonService::new(
        Arc::new(JsonLessonRepository::new(config.lessons_file())),
        pipeline,
        VerificationClassifier::with_gate(Arc::clone(&backend), config.rate_gate()),
        OverlayGenerator::new(backend),
    )
    .with_videos_dir(config.videos_dir()))
}

async fn ensure_ffmpeg(config: &CyclopsConfig) -> Result<()> {
    FfmpegSampler::new(config.clips_dir())
        .check_available()
        .await
        .context("ffmpeg and ffprobe must be installed and on PATH")
}

async fn read_frame(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read frame {}", path.display()))?;
    Ok(STANDARD.encode(bytes))
}

fn emit(output: &str, target: Option<&Path>, quiet: bool) -> Result<()> {
    match target {
        Some(path) => {
            std::fs::write(path, output)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            if !quiet {
                eprintln!("Output written to {}", path.display());
            }
        }
        None => print!("{}", output),
    }
    Ok(())
}

fn report_error(e: &anyhow::Error) -> i32 {
    error!("{:#}", e);
    eprintln!("Error: {:#}", e);
    1
}

fn report_lesson_error(e: &LessonError) -> i32 {
    error!(status = e.status_code(), "{}", e);
    match e {
        LessonError::Pipeline(pipeline) => eprintln!("{}", pipeline.help_message()),
        other => eprintln!("Error: {}", other),
    }
    1
}

pub async fn handle_extract(args: &ExtractArgs, quiet: bool) -> i32 {
    match run_extract(args, quiet).await {
        Ok(()) => 0,
        Err(e) => match e.downcast_ref::<PipelineError>() {
            Some(pipeline_error) => {
                error!("{}", pipeline_error);
                eprintln!("{}", pipeline_error.help_message());
                1
            }
            None => report_error(&e),
        },
    }
}

async fn run_extract(args: &ExtractArgs, quiet: bool) -> Result<()> {
    let config = load_config(&args.backend)?;
    ensure_ffmpeg(&config).await?;

    let pipeline = build_pipeline(&config, args.tts)?.with_clips(!args.no_clips);
    let lesson_id = Uuid::new_v4().to_string();
    info!(
        lesson_id = %lesson_id,
        backend = pipeline.backend().name(),
        "Extracting procedure from {}",
        args.video.display()
    );

    let report = pipeline.extract(&args.video, &args.title, &lesson_id).await?;

    let output = OutputFormatter::new(args.format.into()).format_report(&report)?;
    emit(&output, args.output.as_deref(), quiet)
}

pub async fn handle_lesson(command: &LessonCommands) -> i32 {
    match run_lesson(command).await {
        Ok(output) => {
            print!("{}", output);
            0
        }
        Err(e) => match e.downcast_ref::<LessonError>() {
            Some(lesson_error) => report_lesson_error(lesson_error),
            None => report_error(&e),
        },
    }
}

async fn run_lesson(command: &LessonCommands) -> Result<String> {
    match command {
        LessonCommands::Create(args) => run_lesson_create(args).await,
        LessonCommands::List(args) => {
            let lessons = stored_lessons()?
                .get_all()
                .await
                .map_err(LessonError::from)?;
            OutputFormatter::new(args.format.into()).format_lessons(&lessons)
        }
        LessonCommands::Show(args) => {
            let lesson = stored_lessons()?
                .get(&args.id)
                .await
                .map_err(LessonError::from)?
                .ok_or_else(|| LessonError::LessonNotFound(args.id.clone()))?;
            show_lesson(args, lesson)
        }
        LessonCommands::RegenerateClips(args) => {
            let config = load_config(&BackendArgs::default())?;
            ensure_ffmpeg(&config).await?;
            let service = build_service(&config, false)?;
            show_lesson(args, service.regenerate_clips(&args.id).await?)
        }
        LessonCommands::Delete(args) => {
            if !stored_lessons()?
                .delete(&args.id)
                .await
                .map_err(LessonError::from)?
            {
                return Err(LessonError::LessonNotFound(args.id.clone()).into());
            }
            info!(lesson_id = %args.id, "Deleted lesson");
            Ok(format!("Deleted lesson {}\n", args.id))
        }
    }
}

/// The lesson store alone; reading it needs no backend or speech credentials
fn stored_lessons() -> Result<JsonLessonRepository> {
    let config = load_config(&BackendArgs::default())?;
    Ok(JsonLessonRepository::new(config.lessons_file()))
}

fn show_lesson(args: &LessonIdArgs, lesson: Lesson) -> Result<String> {
    OutputFormatter::new(args.format.into()).format_lesson(&lesson)
}

async fn run_lesson_create(args: &LessonCreateArgs) -> Result<String> {
    let config = load_config(&args.backend)?;
    ensure_ffmpeg(&config).await?;
    let service = build_service(&config, args.tts)?;

    let (lesson, handle) = service.create_lesson(&args.video, &args.title).await?;
    eprintln!("Created lesson {} ({}), extracting steps...", lesson.id, lesson.title);

    let finished = handle.await.context("Extraction task panicked")??;
    if finished.status == LessonStatus::Failed {
        warn!(lesson_id = %finished.id, "Lesson stored without a procedure");
    }
    OutputFormatter::new(args.format.into()).format_lesson(&finished)
}

pub async fn handle_verify(args: &VerifyArgs) -> i32 {
    match run_verify(args).await {
        Ok(output) => {
            print!("{}", output);
            0
        }
        Err(e) => match e.downcast_ref::<LessonError>() {
            Some(lesson_error) => report_lesson_error(lesson_error),
            None => report_error(&e),
        },
    }
}

async fn run_verify(args: &VerifyArgs) -> Result<String> {
    let config = load_config(&args.backend)?;
    let service = build_service(&config, false)?;

    let mut frames = Vec::with_capacity(args.frames.len());
    for path in &args.frames {
        frames.push(read_frame(path).await?);
    }
    debug!(frames = frames.len(), "Loaded verification frames");

    let request = VerificationRequest {
        lesson_id: args.lesson.clone(),
        step_id: args.step,
        step_title: String::new(),
        step_description: String::new(),
        frames,
    };
    let outcome = service.verify_step(&request).await?;
    OutputFormatter::new(args.format.into()).format_verification(&outcome)
}

pub async fn handle_feedback(args: &FeedbackArgs) -> i32 {
    match run_feedback(args).await {
        Ok(output) => {
            print!("{}", output);
            0
        }
        Err(e) => match e.downcast_ref::<LessonError>() {
            Some(lesson_error) => report_lesson_error(lesson_error),
            None => report_error(&e),
        },
    }
}

async fn run_feedback(args: &FeedbackArgs) -> Result<String> {
    let config = load_config(&args.backend)?;
    let service = build_service(&config, false)?;

    let frame = match &args.frame {
        Some(path) => Some(read_frame(path).await?),
        None => None,
    };

    let response = service
        .feedback(&FeedbackRequest {
            lesson_id: args.lesson.clone(),
            step_id: args.step,
            mistake_type: args.mistake.clone(),
            confidence: args.confidence,
            frame,
        })
        .await?;
    OutputFormatter::new(args.format.into()).format_feedback(&response)
}

pub async fn handle_health(args: &HealthArgs) -> i32 {
    let base = CyclopsConfig::default();
    let providers = if args.all {
        vec![Provider::Local, Provider::Cloud]
    } else {
        vec![args.provider.unwrap_or(base.provider)]
    };

    let mut results = BTreeMap::new();
    for provider in providers {
        let mut config = base.clone();
        config.provider = provider;
        results.insert(provider.to_string(), check_backend(&config).await);
    }

    let healthy = results.values().all(|s| s.available);
    match OutputFormatter::new(args.format.into()).format_health(&results) {
        Ok(output) => print!("{}", output),
        Err(e) => return report_error(&e),
    }

    if healthy {
        0
    } else {
        1
    }
}

async fn check_backend(config: &CyclopsConfig) -> HealthStatus {
    let backend = match config.create_backend() {
        Ok(backend) => backend,
        Err(e) => return HealthStatus::unavailable(e.to_string()),
    };

    let details = format!(
        "{} via {}",
        backend.model_info().unwrap_or_else(|| backend.name().to_string()),
        config.backend_config().provider_name()
    );

    match backend.health_check().await {
        Ok(true) => HealthStatus::available(format!("{} is reachable", backend.name()))
            .with_details(details),
        Ok(false) => HealthStatus::unavailable(format!("{} is not ready", backend.name()))
            .with_details(details),
        Err(e) => HealthStatus::unavailable(e.to_string()).with_details(details),
    }
}

pub fn handle_config(args: &ConfigArgs) -> i32 {
    let config = CyclopsConfig::default();
    if let Err(e) = config.validate() {
        warn!("{}", e);
    }

    match OutputFormatter::new(args.format.into()).format_config(&config) {
        Ok(output) => {
            print!("{}", output);
            0
        }
        Err(e) => report_error(&e),
    }
}

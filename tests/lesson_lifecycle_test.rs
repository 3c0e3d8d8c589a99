//! Lesson lifecycle against the JSON file store
//!
//! Create, extract, reload from disk, verify, correct, and delete a lesson
//! with a scripted backend and a stub video sampler.

use async_trait::async_trait;
use cyclops::ai::{MockBackend, MockResponse};
use cyclops::lessons::{
    FeedbackRequest, JsonLessonRepository, LessonError, LessonRepository, LessonService,
    LessonStatus,
};
use cyclops::media::{MediaError, VideoInfo, VideoSampler};
use cyclops::overlay::{OverlayElement, OverlayGenerator};
use cyclops::procedure::StepExtractionPipeline;
use cyclops::verification::{VerificationClassifier, VerificationRequest, VerificationStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct TenSecondVideo;

#[async_trait]
impl VideoSampler for TenSecondVideo {
    async fn get_info(&self, _path: &Path) -> Result<VideoInfo, MediaError> {
        Ok(VideoInfo {
            duration: 10.0,
            ..VideoInfo::default()
        })
    }

    async fn extract_frames(
        &self,
        _path: &Path,
        count: usize,
        _max_size: u32,
    ) -> Result<Vec<String>, MediaError> {
        Ok(vec!["frame".to_string(); count])
    }

    async fn extract_clip(
        &self,
        _path: &Path,
        _start: f64,
        _end: f64,
        name: &str,
    ) -> Result<PathBuf, MediaError> {
        Ok(PathBuf::from(name))
    }
}

const EXTRACTION: &str = r#"{"steps": [
    {"step_id": 1, "title": "Fill kettle", "description": "BEFORE: empty kettle. ACTION: fill to the line. AFTER: water at the line. FAILURE: overfilled.", "start_time": 0.5, "end_time": 4.0, "expected_objects": ["kettle"], "expected_motion": "pouring"},
    {"step_id": 2, "title": "Switch on", "description": "BEFORE: kettle on base. ACTION: press the switch. AFTER: light on. FAILURE: light off.", "start_time": 4.0, "end_time": 6.0}
]}"#;

const OVERLAY: &str = r##"{"audio_text": "Press the switch at the base of the handle.", "elements": [
    {"type": "circle", "center": [0.6, 0.7], "radius": 0.08, "color": "#FFD700"},
    {"type": "arrow", "from": [0.4, 0.4], "to": [0.6, 0.68], "color": "#FF4444"}
]}"##;

fn service(dir: &Path, backend: Arc<MockBackend>) -> LessonService {
    LessonService::new(
        Arc::new(JsonLessonRepository::new(dir.join("lessons.json"))),
        StepExtractionPipeline::new(backend.clone(), Arc::new(TenSecondVideo)),
        VerificationClassifier::new(backend.clone()),
        OverlayGenerator::new(backend),
    )
    .with_videos_dir(dir.join("videos"))
}

#[tokio::test]
async fn test_lesson_lifecycle() {
    let storage = TempDir::new().unwrap();
    let video = storage.path().join("kettle.mp4");
    std::fs::write(&video, b"not really a video").unwrap();

    let backend = Arc::new(MockBackend::new());
    backend.add_responses([
        MockResponse::text(EXTRACTION),
        MockResponse::text(
            r#"{"status": "complete", "confidence": 0.93, "reason": "Light is on", "suggestion": null}"#,
        ),
        MockResponse::text(OVERLAY),
    ]);
    let service = service(storage.path(), backend.clone());

    let (lesson, handle) = service.create_lesson(&video, "  Make tea  ").await.unwrap();
    assert_eq!(lesson.title, "Make tea");
    assert_eq!(lesson.status, LessonStatus::Processing);
    assert!(lesson.demo_video_url.starts_with(&*storage.path().join("videos").to_string_lossy()));
    assert!(Path::new(&lesson.demo_video_url).is_file());

    let ready = handle.await.unwrap().unwrap();
    assert!(ready.is_ready());
    let procedure = ready.procedure().unwrap();
    assert_eq!(procedure.total_steps, 2);
    assert_eq!(procedure.lesson_id, lesson.id);
    assert_eq!(procedure.steps[1].start_time, 4.0);
    assert_eq!(
        procedure.steps[1].clip_url,
        Some(format!("/lessons/{}/clips/2", lesson.id))
    );

    // A fresh repository over the same file sees the stored procedure
    let reopened = JsonLessonRepository::new(storage.path().join("lessons.json"));
    let stored = reopened.get(&lesson.id).await.unwrap().unwrap();
    assert_eq!(stored.status, LessonStatus::Ready);
    assert_eq!(stored.procedure().unwrap().steps[0].title, "Fill kettle");

    let outcome = service
        .verify_step(&VerificationRequest {
            lesson_id: lesson.id.clone(),
            step_id: 2,
            step_title: "Switch on".to_string(),
            step_description: String::new(),
            frames: vec!["f1".to_string(), "f2".to_string()],
        })
        .await
        .unwrap();
    assert_eq!(outcome.status, VerificationStatus::Complete);
    assert_eq!(outcome.confidence, 0.93);

    let feedback = FeedbackRequest {
        lesson_id: lesson.id.clone(),
        step_id: 2,
        mistake_type: "switch_not_pressed".to_string(),
        confidence: 0.75,
        frame: Some("current-frame".to_string()),
    };

    let corrected = service.feedback(&feedback).await.unwrap();
    assert!(corrected.success);
    assert_eq!(corrected.message, "Correction generated successfully");
    let overlay = corrected.overlay.unwrap();
    assert_eq!(overlay.elements.len(), 2);
    assert!(matches!(overlay.elements[0], OverlayElement::Circle(_)));
    assert_eq!(backend.last_request().unwrap().images, vec!["current-frame"]);

    // Queue exhausted: the backend now fails and the per-step fallback is used
    let fallback = service.feedback(&feedback).await.unwrap();
    assert!(fallback.success);
    assert_eq!(fallback.message, "Using fallback correction");
    assert_eq!(
        fallback.overlay.unwrap().audio_text,
        "Please check your technique for: Switch on"
    );

    service.delete_lesson(&lesson.id).await.unwrap();
    assert!(service.list_lessons().await.unwrap().is_empty());
    assert!(reopened.get_all().await.unwrap().is_empty());
    assert!(matches!(
        service.get_lesson(&lesson.id).await,
        Err(LessonError::LessonNotFound(_))
    ));
}

#[tokio::test]
async fn test_missing_video_is_rejected_before_storing() {
    let storage = TempDir::new().unwrap();
    let service = service(storage.path(), Arc::new(MockBackend::new()));

    let result = service
        .create_lesson(&storage.path().join("missing.mp4"), "Nothing")
        .await;
    assert!(matches!(result, Err(LessonError::InvalidRequest(_))));
    assert!(service.list_lessons().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_store_reads_as_empty() {
    let storage = TempDir::new().unwrap();
    std::fs::write(storage.path().join("lessons.json"), "{ not json").unwrap();

    let service = service(storage.path(), Arc::new(MockBackend::new()));
    assert!(service.list_lessons().await.unwrap().is_empty());
}

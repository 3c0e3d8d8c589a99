//! Extraction pipeline tests against a scripted backend
//!
//! The sampler is a stub, so these run without ffmpeg or a model server.

use async_trait::async_trait;
use cyclops::ai::{BackendError, MockBackend, MockResponse};
use cyclops::media::{MediaError, VideoInfo, VideoSampler};
use cyclops::procedure::{PipelineError, StepExtractionPipeline};
use cyclops::response::parse_procedure;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Fixed-duration video that records the clips it was asked to cut
struct StubSampler {
    duration: f64,
    frames: usize,
    clips: Mutex<Vec<(String, f64, f64)>>,
}

impl StubSampler {
    fn new(duration: f64) -> Self {
        Self {
            duration,
            frames: usize::MAX,
            clips: Mutex::new(Vec::new()),
        }
    }

    fn without_frames(mut self) -> Self {
        self.frames = 0;
        self
    }

    fn clips(&self) -> Vec<(String, f64, f64)> {
        self.clips.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoSampler for StubSampler {
    async fn get_info(&self, _path: &Path) -> Result<VideoInfo, MediaError> {
        Ok(VideoInfo {
            duration: self.duration,
            fps: 30.0,
            width: 1280,
            height: 720,
        })
    }

    async fn extract_frames(
        &self,
        _path: &Path,
        count: usize,
        _max_size: u32,
    ) -> Result<Vec<String>, MediaError> {
        Ok((0..count.min(self.frames)).map(|i| format!("frame-{}", i)).collect())
    }

    async fn extract_clip(
        &self,
        _path: &Path,
        start: f64,
        end: f64,
        name: &str,
    ) -> Result<PathBuf, MediaError> {
        self.clips.lock().unwrap().push((name.to_string(), start, end));
        Ok(PathBuf::from("/clips").join(name))
    }
}

const FOUR_UNTIMED_STEPS: &str = r#"{"steps": [
    {"step_id": 1, "title": "Remove hubcap", "description": "Pry off the cap"},
    {"step_id": 2, "title": "Loosen nuts", "description": "Quarter turn each"},
    {"step_id": 3, "title": "Jack up car", "description": "Raise until the tire clears"},
    {"step_id": 4, "title": "Remove nuts", "description": "Spin them off by hand"}
]}"#;

#[tokio::test]
async fn test_missing_timestamps_are_split_evenly() {
    let backend = Arc::new(MockBackend::new());
    backend.add_response(MockResponse::text(FOUR_UNTIMED_STEPS));
    let sampler = Arc::new(StubSampler::new(20.0));

    let report = StepExtractionPipeline::new(backend, sampler.clone())
        .extract(Path::new("tire.mp4"), "Change a tire", "lesson-1")
        .await
        .unwrap();

    let windows: Vec<(f64, f64)> = report
        .procedure
        .steps
        .iter()
        .map(|s| (s.start_time, s.end_time))
        .collect();
    assert_eq!(
        windows,
        vec![(0.0, 5.0), (5.0, 10.0), (10.0, 15.0), (15.0, 20.0)]
    );
    assert!(report
        .procedure
        .steps
        .iter()
        .all(|s| s.expected_duration_seconds == 5));

    assert_eq!(report.parse_quality, "complete");
    assert_eq!(report.clips_extracted, 4);
    assert_eq!(sampler.clips()[3], ("lesson-1_step_4.mp4".to_string(), 15.0, 20.0));
    assert_eq!(
        report.procedure.steps[0].clip_url.as_deref(),
        Some("/lessons/lesson-1/clips/1")
    );
}

#[test]
fn test_truncated_answer_keeps_complete_steps() {
    let text = r#"{"steps": [
        {"step_id": 1, "title": "Fill kettle", "description": "d", "start_time": 0.0, "end_time": 3.0},
        {"step_id": 2, "title": "Boil water", "description": "d", "start_time": 3.0, "end_time": 8.0},
        {"step_id": 3, "tit"#;

    let outcome = parse_procedure(text, "tea");
    assert!(outcome.is_degraded());
    assert!(!outcome.is_fallback());

    let procedure = outcome.into_inner();
    assert_eq!(procedure.total_steps, 2);
    assert_eq!(procedure.steps[1].title, "Boil water");
}

#[tokio::test]
async fn test_model_windows_are_clamped_to_video() {
    let backend = Arc::new(MockBackend::new());
    backend.add_response(MockResponse::text(
        r#"{"steps": [
            {"step_id": 1, "title": "A", "description": "d", "start_time": -2, "end_time": 4},
            {"step_id": 2, "title": "B", "description": "d", "start_time": 3, "end_time": 9},
            {"step_id": 3, "title": "C", "description": "d", "start_time": 9, "end_time": 40}
        ]}"#,
    ));

    let report = StepExtractionPipeline::new(backend, Arc::new(StubSampler::new(12.0)))
        .with_clips(false)
        .extract(Path::new("v.mp4"), "", "l")
        .await
        .unwrap();

    let steps = &report.procedure.steps;
    assert_eq!((steps[0].start_time, steps[0].end_time), (0.0, 4.0));
    assert_eq!((steps[1].start_time, steps[1].end_time), (4.0, 9.0));
    assert_eq!((steps[2].start_time, steps[2].end_time), (9.0, 12.0));
    assert_eq!(report.clips_extracted, 0);
    assert!(steps.iter().all(|s| s.clip_url.is_none()));
}

#[tokio::test]
async fn test_unreadable_answer_uses_single_step_fallback() {
    let backend = Arc::new(MockBackend::new());
    backend.add_response(MockResponse::text("I could not see the video clearly."));

    let report = StepExtractionPipeline::new(backend, Arc::new(StubSampler::new(30.0)))
        .with_clips(false)
        .extract(Path::new("v.mp4"), "", "l")
        .await
        .unwrap();

    assert_eq!(report.parse_quality, "fallback");
    assert_eq!(report.procedure.total_steps, 1);
    let step = &report.procedure.steps[0];
    assert_eq!(step.title, "Procedure");
    assert_eq!((step.start_time, step.end_time), (0.0, 30.0));
}

#[tokio::test]
async fn test_frames_are_thinned_to_backend_budget() {
    let backend = Arc::new(MockBackend::new().with_frame_budget(4));
    backend.add_response(MockResponse::text(FOUR_UNTIMED_STEPS));

    let report = StepExtractionPipeline::new(backend.clone(), Arc::new(StubSampler::new(20.0)))
        .with_clips(false)
        .extract(Path::new("v.mp4"), "", "l")
        .await
        .unwrap();

    assert_eq!(report.frames_sent, 4);
    let request = backend.last_request().unwrap();
    assert_eq!(request.images.len(), 4);
    assert!(request.json_mode);
    assert!(request.prompt.contains("Frame 4 = 20.0s"));
}

#[tokio::test]
async fn test_backend_failure_is_an_error() {
    let backend = Arc::new(MockBackend::new());
    backend.add_response(MockResponse::error(BackendError::TimeoutError { seconds: 120 }));

    let err = StepExtractionPipeline::new(backend, Arc::new(StubSampler::new(20.0)))
        .extract(Path::new("v.mp4"), "", "l")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Backend(BackendError::TimeoutError { seconds: 120 })
    ));
    assert!(err.help_message().contains("--timeout 240"));
}

#[tokio::test]
async fn test_video_without_frames_is_an_error() {
    let backend = Arc::new(MockBackend::new());
    let sampler = Arc::new(StubSampler::new(20.0).without_frames());

    let err = StepExtractionPipeline::new(backend.clone(), sampler)
        .extract(Path::new("blank.mp4"), "", "l")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NoFrames(_)));
    assert_eq!(backend.call_count(), 0);
}

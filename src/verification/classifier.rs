use crate::ai::{BackendError, ModelBackend};
use crate::prompt::PromptBuilder;
use crate::response::{excerpt, parse_verification};
use crate::verification::{RateGate, VerificationOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One live check: a burst of recent frames against the active step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub lesson_id: String,
    pub step_id: u32,
    pub step_title: String,
    pub step_description: String,
    /// Base64 JPEG frames, oldest first
    #[serde(default)]
    pub frames: Vec<String>,
}

/// Rate-limited three-way classifier for live frames
///
/// Verification is advisory: every failure path resolves to an `in_progress`
/// outcome with a short reason instead of an error.
pub struct VerificationClassifier {
    backend: Arc<dyn ModelBackend>,
    gate: RateGate,
}

impl VerificationClassifier {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self::with_gate(backend, RateGate::default())
    }

    pub fn with_gate(backend: Arc<dyn ModelBackend>, gate: RateGate) -> Self {
        Self { backend, gate }
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    pub async fn verify(&self, request: &VerificationRequest) -> VerificationOutcome {
        self.verify_at(request, Instant::now()).await
    }

    /// Same as [`verify`](Self::verify) with an explicit clock reading
    pub async fn verify_at(
        &self,
        request: &VerificationRequest,
        now: Instant,
    ) -> VerificationOutcome {
        if !self.gate.try_acquire(&request.lesson_id, now) {
            debug!(lesson_id = %request.lesson_id, "Verification rate limited");
            return VerificationOutcome::rate_limited();
        }

        let forgotten = self.gate.forget_older_than(self.gate.idle_after(), now);
        if forgotten > 0 {
            debug!(forgotten, "Dropped idle lessons from the rate gate");
        }

        if request.frames.is_empty() {
            return VerificationOutcome::in_progress("No frames");
        }

        let prompt = PromptBuilder::verification(
            &request.step_title,
            &request.step_description,
            request.frames.len().min(crate::ai::backend::VERIFICATION_FRAME_LIMIT),
        );

        let text = match self.backend.analyze_frames(&request.frames, prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    lesson_id = %request.lesson_id,
                    step_id = request.step_id,
                    backend = self.backend.name(),
                    "Verification call failed: {}",
                    e
                );
                return VerificationOutcome::in_progress(unavailable_reason(&e));
            }
        };

        let outcome = parse_verification(&text);
        if outcome.is_degraded() {
            warn!(
                lesson_id = %request.lesson_id,
                step_id = request.step_id,
                quality = outcome.label(),
                response = %excerpt(&text),
                "Verification answer degraded: {}",
                outcome.reason().unwrap_or_default()
            );
        }

        let outcome = outcome.into_inner();
        info!(
            lesson_id = %request.lesson_id,
            step_id = request.step_id,
            status = %outcome.status,
            confidence = outcome.confidence,
            "Verified step"
        );
        outcome
    }
}

fn unavailable_reason(error: &BackendError) -> &'static str {
    if error.is_timeout() {
        "Timed out"
    } else {
        "AI unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockBackend, MockResponse};
    use crate::verification::VerificationStatus;
    use std::time::Duration;

    fn request(lesson: &str, frames: usize) -> VerificationRequest {
        VerificationRequest {
            lesson_id: lesson.to_string(),
            step_id: 1,
            step_title: "Tighten bolt".to_string(),
            step_description: "Use the 10mm wrench".to_string(),
            frames: (0..frames).map(|i| format!("frame{}", i)).collect(),
        }
    }

    #[tokio::test]
    async fn test_rate_gate_skips_backend() {
        let backend = Arc::new(MockBackend::new().with_fallback(MockResponse::text(
            r#"{"status": "complete", "confidence": 0.9, "reason": "Done"}"#,
        )));
        let classifier = VerificationClassifier::new(backend.clone());
        let t0 = Instant::now();

        let first = classifier.verify_at(&request("L1", 3), t0).await;
        assert_eq!(first.status, VerificationStatus::Complete);

        let second = classifier
            .verify_at(&request("L1", 3), t0 + Duration::from_secs(1))
            .await;
        assert_eq!(second, VerificationOutcome::rate_limited());
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_idle_lessons_leave_the_gate() {
        let backend = Arc::new(MockBackend::new().with_fallback(MockResponse::text(
            r#"{"status": "in_progress", "confidence": 0.4, "reason": "Working"}"#,
        )));
        let classifier = VerificationClassifier::new(backend.clone());
        let t0 = Instant::now();

        classifier.verify_at(&request("L1", 1), t0).await;
        classifier
            .verify_at(&request("L2", 1), t0 + Duration::from_secs(5))
            .await;
        assert_eq!(classifier.gate().tracked_lessons(), 2);

        classifier
            .verify_at(&request("L2", 1), t0 + Duration::from_secs(25))
            .await;
        assert_eq!(classifier.gate().tracked_lessons(), 1);
        assert!(classifier.gate().last_accepted("L1").is_none());
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_frames_are_trimmed_to_most_recent() {
        let backend = Arc::new(MockBackend::new().with_fallback(MockResponse::text(
            r#"{"status": "in_progress", "confidence": 0.4, "reason": "Working"}"#,
        )));
        let classifier = VerificationClassifier::new(backend.clone());

        classifier.verify(&request("L1", 8)).await;

        let sent = backend.last_request().unwrap();
        assert_eq!(sent.images.len(), 5);
        assert_eq!(sent.images[0], "frame3");
        assert_eq!(sent.temperature, Some(0.1));
        assert!(sent.prompt.contains("shown 5 frames"));
    }

    #[tokio::test]
    async fn test_backend_failure_degrades() {
        let backend = Arc::new(MockBackend::new());
        backend.add_responses([
            MockResponse::error(BackendError::NetworkError {
                message: "connection refused".to_string(),
            }),
            MockResponse::error(BackendError::TimeoutError { seconds: 30 }),
        ]);
        let classifier = VerificationClassifier::new(backend);
        let t0 = Instant::now();

        let outcome = classifier.verify_at(&request("L1", 3), t0).await;
        assert_eq!(outcome.status, VerificationStatus::InProgress);
        assert_eq!(outcome.reason, "AI unavailable");
        assert_eq!(outcome.confidence, 0.0);

        let outcome = classifier
            .verify_at(&request("L1", 3), t0 + Duration::from_secs(3))
            .await;
        assert_eq!(outcome.reason, "Timed out");
    }

    #[tokio::test]
    async fn test_empty_frames_do_not_call_backend() {
        let backend = Arc::new(MockBackend::new());
        let classifier = VerificationClassifier::new(backend.clone());

        let outcome = classifier.verify(&request("L1", 0)).await;
        assert_eq!(outcome.reason, "No frames");
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_is_clamped() {
        let backend = Arc::new(MockBackend::new());
        backend.add_response(MockResponse::text(
            r#"{"status": "complete", "confidence": 1.7, "reason": "Bolt tight"}"#,
        ));

        let outcome = VerificationClassifier::new(backend)
            .verify(&request("L1", 3))
            .await;
        assert_eq!(outcome.confidence, 1.0);
    }
}

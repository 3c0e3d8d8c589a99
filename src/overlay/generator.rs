use crate::ai::ModelBackend;
use crate::overlay::OverlayInstruction;
use crate::procedure::Step;
use crate::prompt::PromptBuilder;
use crate::response::{excerpt, parse_overlay, ParseOutcome};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one overlay generation
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayResult {
    pub instruction: OverlayInstruction,
    /// True when the instruction is the fixed per-step fallback
    pub degraded: bool,
}

impl OverlayResult {
    fn fallback(step: &Step) -> Self {
        Self {
            instruction: OverlayInstruction::review_step(&step.title),
            degraded: true,
        }
    }
}

/// Turns a detected mistake into a renderable correction
///
/// Generation never fails. A backend error, a timeout, or an answer with no
/// usable element all produce [`OverlayInstruction::review_step`] for the step.
pub struct OverlayGenerator {
    backend: Arc<dyn ModelBackend>,
}

impl OverlayGenerator {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }

    pub async fn generate(
        &self,
        step: &Step,
        mistake_type: &str,
        frame: Option<&str>,
    ) -> OverlayResult {
        let start = Instant::now();
        let request = PromptBuilder::overlay(step, mistake_type);

        let text = match self.backend.generate_overlay(request, frame).await {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    step_id = step.step_id,
                    mistake = mistake_type,
                    backend = self.backend.name(),
                    "Overlay generation failed, using fallback: {}",
                    e
                );
                return OverlayResult::fallback(step);
            }
        };

        let outcome = parse_overlay(&text);
        match outcome {
            ParseOutcome::Fallback { reason, .. } => {
                warn!(
                    step_id = step.step_id,
                    mistake = mistake_type,
                    response = %excerpt(&text),
                    "Overlay answer unusable ({}), using fallback",
                    reason
                );
                OverlayResult::fallback(step)
            }
            outcome => {
                if let Some(reason) = outcome.reason() {
                    debug!(step_id = step.step_id, "Overlay answer repaired: {}", reason);
                }
                let instruction = outcome.into_inner();
                info!(
                    step_id = step.step_id,
                    elements = instruction.elements.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Generated overlay"
                );
                OverlayResult {
                    instruction,
                    degraded: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{BackendError, MockBackend, MockResponse};
    use crate::overlay::OverlayElement;

    fn step() -> Step {
        Step::new(2, "Insert key", "BEFORE: key in hand. ACTION: push key into lock.")
    }

    #[tokio::test]
    async fn test_generate_overlay() {
        let backend = Arc::new(MockBackend::new());
        backend.add_response(MockResponse::text(
            r##"{"audio_text": "Push the key all the way in.", "elements": [
                {"type": "circle", "center": [0.5, 0.5], "radius": 0.1},
                {"type": "arrow", "from": [0.2, 0.5], "to": [0.45, 0.5]}
            ]}"##,
        ));

        let generator = OverlayGenerator::new(backend.clone());
        let result = generator
            .generate(&step(), "key_not_inserted", Some("data:image/jpeg;base64,AAAA"))
            .await;

        assert!(!result.degraded);
        assert_eq!(result.instruction.audio_text, "Push the key all the way in.");
        assert_eq!(result.instruction.elements.len(), 2);

        let request = backend.last_request().unwrap();
        assert_eq!(request.images.len(), 1);
        assert!(request.json_mode);
        assert!(request.prompt.contains("key_not_inserted"));
    }

    #[tokio::test]
    async fn test_backend_error_uses_step_fallback() {
        let backend = Arc::new(MockBackend::new());
        backend.add_response(MockResponse::error(BackendError::TimeoutError { seconds: 30 }));

        let result = OverlayGenerator::new(backend)
            .generate(&step(), "wrong_tool", None)
            .await;

        assert!(result.degraded);
        assert_eq!(
            result.instruction.audio_text,
            "Please check your technique for: Insert key"
        );
        match &result.instruction.elements[0] {
            OverlayElement::Label(label) => assert_eq!(label.text, "Review: Insert key"),
            other => panic!("expected label, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unusable_answer_uses_step_fallback() {
        let backend = Arc::new(MockBackend::new());
        backend.add_response(MockResponse::text("I can't see the frame clearly."));

        let result = OverlayGenerator::new(backend)
            .generate(&step(), "wrong_tool", None)
            .await;

        assert!(result.degraded);
        assert_eq!(result.instruction.duration_seconds, 5.0);
        assert!(!result.instruction.elements.is_empty());
    }
}

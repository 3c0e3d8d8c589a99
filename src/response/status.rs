use crate::response::repair::{outer_object, parse_object, strip_code_fence};
use crate::response::{excerpt, lenient_f64, lenient_string, ParseOutcome};
use crate::verification::{VerificationOutcome, VerificationStatus};
use tracing::{debug, warn};

/// Confidence assumed when the model omits one
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Parses a verification answer into a status object
///
/// Unknown statuses become `in_progress`, confidence is clamped into `[0, 1]`,
/// and an answer without a JSON object becomes an `in_progress` placeholder.
pub fn parse_verification(text: &str) -> ParseOutcome<VerificationOutcome> {
    let body = strip_code_fence(text);

    let Some(candidate) = outer_object(body) else {
        debug!("No JSON object in verification response");
        return ParseOutcome::Fallback {
            value: VerificationOutcome::in_progress("Processing..."),
            reason: "no JSON object in model output".to_string(),
        };
    };

    let Some(map) = parse_object(candidate) else {
        warn!(response = %excerpt(text), "Verification response is not valid JSON");
        return ParseOutcome::Fallback {
            value: VerificationOutcome::in_progress("Analyzing..."),
            reason: "invalid JSON in model output".to_string(),
        };
    };

    let raw_status = lenient_string(map.get("status"));
    let status = raw_status
        .as_deref()
        .and_then(VerificationStatus::parse)
        .unwrap_or(VerificationStatus::InProgress);

    let raw_confidence = lenient_f64(map.get("confidence")).unwrap_or(DEFAULT_CONFIDENCE);
    let reason = lenient_string(map.get("reason")).unwrap_or_else(|| "Analyzing...".to_string());

    let outcome = VerificationOutcome::new(status, reason, raw_confidence)
        .with_suggestion(lenient_string(map.get("suggestion")));

    if outcome.confidence != raw_confidence {
        warn!(
            "Confidence value {} was out of range, clamped to {}",
            raw_confidence, outcome.confidence
        );
    }

    match raw_status {
        Some(tag) if VerificationStatus::parse(&tag).is_none() => {
            warn!(status = %tag, "Unknown verification status, treating as in_progress");
            ParseOutcome::Partial {
                value: outcome,
                recovered: 1,
                reason: format!("unknown status '{}'", tag),
            }
        }
        None => ParseOutcome::Partial {
            value: outcome,
            recovered: 1,
            reason: "missing status".to_string(),
        },
        Some(_) => ParseOutcome::Complete(outcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[test]
    fn test_complete_answer() {
        let outcome = parse_verification(
            r#"{"status": "complete", "confidence": 0.92, "reason": "Screw is flush", "suggestion": null}"#,
        );
        assert!(!outcome.is_degraded());

        let value = outcome.into_inner();
        assert_eq!(value.status, VerificationStatus::Complete);
        assert_eq!(value.confidence, 0.92);
        assert_eq!(value.reason, "Screw is flush");
        assert!(value.suggestion.is_none());
    }

    #[test]
    fn test_mistake_keeps_suggestion() {
        let value = parse_verification(
            "```json\n{\"status\": \"mistake\", \"confidence\": 0.8, \"reason\": \"Wrong tool\", \"suggestion\": \"Use the Phillips screwdriver\"}\n```",
        )
        .into_inner();
        assert!(value.is_mistake());
        assert_eq!(
            value.suggestion.as_deref(),
            Some("Use the Phillips screwdriver")
        );
    }

    #[test]
    fn test_confidence_above_one_is_clamped() {
        let value =
            parse_verification(r#"{"status": "complete", "confidence": 1.7, "reason": "done"}"#)
                .into_inner();
        assert_eq!(value.confidence, 1.0);
    }

    #[parameterized(
        unknown = { "finished" },
        numeric = { "3" },
        empty = { "" },
    )]
    fn test_invalid_status_becomes_in_progress(status: &str) {
        let text = format!(r#"{{"status": "{}", "confidence": 0.9, "reason": "r"}}"#, status);
        let outcome = parse_verification(&text);
        assert!(outcome.is_degraded());
        assert_eq!(outcome.value().status, VerificationStatus::InProgress);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let value = parse_verification(r#"{"status": "in_progress"}"#).into_inner();
        assert_eq!(value.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(value.reason, "Analyzing...");
    }

    #[test]
    fn test_no_json_is_placeholder() {
        let outcome = parse_verification("The user is still working.");
        assert!(outcome.is_fallback());
        let value = outcome.into_inner();
        assert_eq!(value.status, VerificationStatus::InProgress);
        assert_eq!(value.confidence, 0.0);
        assert_eq!(value.reason, "Processing...");
    }

    #[test]
    fn test_broken_json_is_placeholder() {
        let value = parse_verification(r#"{"status": "complete", "confidence": }"#).into_inner();
        assert_eq!(value.status, VerificationStatus::InProgress);
        assert_eq!(value.reason, "Analyzing...");
        assert_eq!(value.confidence, 0.0);
    }

    #[test]
    fn test_prose_around_object() {
        let value = parse_verification(
            r#"Looking at the frames: {"status": "mistake", "confidence": "0.7", "reason": "Bolt cross-threaded"} That's my answer."#,
        )
        .into_inner();
        assert_eq!(value.status, VerificationStatus::Mistake);
        assert_eq!(value.confidence, 0.7);
    }
}

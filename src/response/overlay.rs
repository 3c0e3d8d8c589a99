use crate::overlay::{OverlayElement, OverlayInstruction};
use crate::response::repair::{outer_object, parse_object, strip_code_fence};
use crate::response::{excerpt, lenient_f64, lenient_string, ParseOutcome};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Spoken text used when the model returned shapes but no sentence
pub const DEFAULT_AUDIO_TEXT: &str = "Please adjust your technique.";

/// Parses a correction answer into an overlay instruction
///
/// Elements are read one at a time; unknown shapes and malformed entries are
/// dropped. An answer with no readable element falls back to a single
/// "Check your technique" label.
pub fn parse_overlay(text: &str) -> ParseOutcome<OverlayInstruction> {
    let body = strip_code_fence(text);

    let Some(map) = outer_object(body).and_then(parse_object) else {
        warn!(response = %excerpt(text), "Overlay response is not valid JSON");
        return ParseOutcome::Fallback {
            value: OverlayInstruction::unreadable(),
            reason: "invalid JSON in model output".to_string(),
        };
    };

    let audio_text = lenient_string(map.get("audio_text"));
    let raw_elements = match map.get("elements") {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    };

    let elements: Vec<OverlayElement> = raw_elements.iter().filter_map(parse_element).collect();
    let dropped = raw_elements.len() - elements.len();

    if elements.is_empty() {
        let mut value = OverlayInstruction::unreadable();
        if let Some(audio) = audio_text {
            value.audio_text = audio;
        }
        return ParseOutcome::Fallback {
            value,
            reason: format!("no readable elements ({} dropped)", dropped),
        };
    }

    let mut value =
        OverlayInstruction::new(audio_text.unwrap_or_else(|| DEFAULT_AUDIO_TEXT.to_string()), elements);
    if let Some(duration) = lenient_f64(map.get("duration_seconds")).filter(|d| *d > 0.0) {
        value.duration_seconds = duration.min(30.0);
    }

    if dropped > 0 {
        debug!("Dropped {} unreadable overlay elements", dropped);
        return ParseOutcome::Partial {
            recovered: value.elements.len(),
            value,
            reason: format!("{} element(s) dropped", dropped),
        };
    }

    ParseOutcome::Complete(value)
}

fn parse_element(raw: &Value) -> Option<OverlayElement> {
    let Value::Object(map) = raw else {
        return None;
    };

    let mut element: OverlayElement = serde_json::from_value(Value::Object(normalize(map)))
        .map_err(|e| debug!("Skipping overlay element: {}", e))
        .ok()?;
    element.clamp_to_frame();
    Some(element)
}

/// Lowercases the type tag, maps `text` to `label`, and rounds float font sizes
fn normalize(map: &Map<String, Value>) -> Map<String, Value> {
    let mut map = map.clone();

    if let Some(kind) = map.get("type").and_then(Value::as_str) {
        let kind = match kind.trim().to_lowercase().as_str() {
            "text" => "label".to_string(),
            "rect" => "rectangle".to_string(),
            other => other.to_string(),
        };
        map.insert("type".to_string(), Value::String(kind));
    }

    if let Some(size) = lenient_f64(map.get("font_size")) {
        map.insert(
            "font_size".to_string(),
            Value::from(size.round().max(1.0) as u32),
        );
    }

    for key in ["stroke_width", "radius", "corner_radius"] {
        if let Some(number) = lenient_f64(map.get(key)) {
            map.insert(key.to_string(), Value::from(number));
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[test]
    fn test_complete_overlay() {
        let text = r##"```json
{
    "audio_text": "Turn the key clockwise until it stops.",
    "elements": [
        {"type": "circle", "center": [0.5, 0.5], "radius": 0.1, "color": "#FFD700", "stroke_width": 3, "style": "solid"},
        {"type": "arrow", "from": [0.3, 0.6], "to": [0.5, 0.4], "color": "#FF4444", "stroke_width": 3, "style": "curved"},
        {"type": "label", "position": [0.5, 0.2], "text": "Clockwise", "font_size": 16}
    ]
}
```"##;

        let outcome = parse_overlay(text);
        assert!(!outcome.is_degraded());

        let overlay = outcome.into_inner();
        assert_eq!(overlay.audio_text, "Turn the key clockwise until it stops.");
        assert_eq!(overlay.elements.len(), 3);
        assert_eq!(overlay.overlay_type, "diagram");
        assert_eq!(overlay.duration_seconds, 5.0);
    }

    #[test]
    fn test_unknown_elements_are_dropped() {
        let text = r#"{"audio_text": "Move left", "elements": [
            {"type": "sparkle", "center": [0.5, 0.5]},
            {"type": "Text", "position": [0.4, 0.1], "text": "Left", "font_size": 15.6},
            {"type": "circle"}
        ]}"#;

        let outcome = parse_overlay(text);
        assert!(matches!(outcome, ParseOutcome::Partial { recovered: 1, .. }));
        match &outcome.value().elements[0] {
            OverlayElement::Label(label) => {
                assert_eq!(label.text, "Left");
                assert_eq!(label.font_size, 16);
            }
            other => panic!("expected label, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_frame_coordinates_are_clamped() {
        let text = r#"{"audio_text": "x", "elements": [{"type": "rectangle", "origin": [-0.2, 0.5], "size": [1.5, 0.2]}]}"#;
        match &parse_overlay(text).into_inner().elements[0] {
            OverlayElement::Rectangle(rect) => {
                assert_eq!(rect.origin, [0.0, 0.5]);
                assert_eq!(rect.size, [1.0, 0.2]);
            }
            other => panic!("expected rectangle, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_audio_uses_default() {
        let text = r#"{"elements": [{"type": "label", "position": [0.5, 0.5], "text": "Here"}]}"#;
        assert_eq!(parse_overlay(text).into_inner().audio_text, DEFAULT_AUDIO_TEXT);
    }

    #[parameterized(
        prose = { "Sorry, I cannot help with that." },
        truncated = { r#"{"audio_text": "Tur"# },
        empty_elements = { r#"{"audio_text": "Turn it", "elements": []}"# },
        elements_not_array = { r#"{"audio_text": "Turn it", "elements": "circle"}"# },
    )]
    fn test_unusable_overlay_falls_back(text: &str) {
        let outcome = parse_overlay(text);
        assert!(outcome.is_fallback());

        let overlay = outcome.into_inner();
        assert!(!overlay.audio_text.is_empty());
        assert_eq!(overlay.elements.len(), 1);
        assert_eq!(overlay.elements[0].kind(), "label");
    }

    #[test]
    fn test_fallback_keeps_model_audio() {
        let overlay = parse_overlay(r#"{"audio_text": "Turn it", "elements": []}"#).into_inner();
        assert_eq!(overlay.audio_text, "Turn it");

        let overlay = parse_overlay("nope").into_inner();
        assert_eq!(overlay.audio_text, "Please check your technique and try again.");
    }
}

use crate::procedure::{MistakePattern, MotionType, Procedure, Step};
use crate::response::repair::{outer_object, parse_object, salvage_records, strip_code_fence};
use crate::response::{excerpt, lenient_f64, lenient_string, ParseOutcome};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Mistake type recorded for the FAILURE clause of a structured description
pub const DESCRIBED_FAILURE_KIND: &str = "incorrect_execution";

const DESCRIPTION_SECTIONS: [&str; 4] = ["before", "action", "after", "failure"];

/// Parses a step-extraction answer into a procedure
///
/// Never fails. A clean answer yields `Complete`; a damaged one yields
/// `Partial` with every step object that could be salvaged on its own; an
/// answer with nothing usable yields the one-step fallback procedure.
pub fn parse_procedure(text: &str, lesson_id: &str) -> ParseOutcome<Procedure> {
    debug!("Parsing extraction response ({} chars)", text.len());

    let body = strip_code_fence(text);

    if let Some(entries) = direct_entries(body) {
        let steps = convert_entries(&entries);
        if !steps.is_empty() {
            let dropped = entries.len() - steps.len();
            let procedure = Procedure::new(lesson_id, normalize_ids(steps));
            if dropped == 0 {
                return ParseOutcome::Complete(procedure);
            }
            return ParseOutcome::Partial {
                recovered: procedure.steps.len(),
                value: procedure,
                reason: format!("{} step entries were not objects", dropped),
            };
        }
    }

    let records = salvage_records(body, "step_id");
    if !records.is_empty() {
        let entries: Vec<Value> = records.into_iter().map(Value::Object).collect();
        let steps = convert_entries(&entries);
        let recovered = steps.len();
        warn!(
            lesson_id,
            recovered,
            response = %excerpt(text),
            "Extraction response was damaged, salvaged complete step objects"
        );
        return ParseOutcome::Partial {
            value: Procedure::new(lesson_id, normalize_ids(steps)),
            recovered,
            reason: format!("recovered {} step(s) from damaged output", recovered),
        };
    }

    warn!(
        lesson_id,
        response = %excerpt(text),
        "No usable steps in extraction response, using fallback procedure"
    );
    ParseOutcome::Fallback {
        value: Procedure::fallback(lesson_id),
        reason: "no usable step objects in model output".to_string(),
    }
}

/// Step entries from an answer that parses as a whole
fn direct_entries(body: &str) -> Option<Vec<Value>> {
    if body.starts_with('[') {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(body) {
            return Some(items);
        }
    }

    let map = parse_object(outer_object(body)?)?;
    match map.get("steps") {
        Some(Value::Array(items)) => Some(items.clone()),
        _ if map.contains_key("step_id") => Some(vec![Value::Object(map)]),
        _ => None,
    }
}

fn convert_entries(entries: &[Value]) -> Vec<Step> {
    entries
        .iter()
        .filter_map(Value::as_object)
        .enumerate()
        .map(|(position, map)| convert_step(map, position))
        .collect()
}

fn convert_step(map: &Map<String, Value>, position: usize) -> Step {
    let step_id = lenient_f64(map.get("step_id"))
        .filter(|id| *id >= 1.0 && *id <= u32::MAX as f64)
        .map(|id| id as u32)
        .unwrap_or(position as u32 + 1);

    let title = lenient_string(map.get("title")).unwrap_or_else(|| format!("Step {}", position + 1));
    let description = render_description(map);

    let mut step = Step::new(step_id, title, description);
    step.instruction = lenient_string(map.get("instruction"));
    step.expected_objects = string_list(map.get("expected_objects"));
    step.expected_motion = lenient_string(map.get("expected_motion"))
        .map(MotionType::from)
        .unwrap_or_default();
    step.start_time = lenient_f64(map.get("start_time")).unwrap_or(0.0);
    step.end_time = lenient_f64(map.get("end_time")).unwrap_or(0.0);
    if let Some(expected) = lenient_f64(map.get("expected_duration_seconds")).filter(|d| *d >= 1.0) {
        step.expected_duration_seconds = expected.round() as u32;
    }

    step.mistake_patterns = mistake_patterns(map.get("mistake_patterns"));
    if step.mistake_patterns.is_empty() {
        if let Some(failure) = failure_clause(&step.description) {
            step.mistake_patterns.push(MistakePattern {
                kind: DESCRIBED_FAILURE_KIND.to_string(),
                description: failure,
            });
        }
    }

    step
}

/// Plain string, structured `{before, action, after, failure}` object, or
/// those four sections as sibling fields
fn render_description(map: &Map<String, Value>) -> String {
    match map.get("description") {
        Some(Value::String(text)) => return text.trim().to_string(),
        Some(Value::Object(sections)) => return render_sections(sections),
        _ => {}
    }
    render_sections(map)
}

fn render_sections(sections: &Map<String, Value>) -> String {
    DESCRIPTION_SECTIONS
        .iter()
        .filter_map(|name| {
            let value = sections
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .and_then(|(_, value)| lenient_string(Some(value)))?;
            Some(format!(
                "{}: {}.",
                name.to_uppercase(),
                value.trim_end_matches('.')
            ))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn failure_clause(description: &str) -> Option<String> {
    let idx = description.find("FAILURE:")?;
    let clause = description[idx + "FAILURE:".len()..]
        .trim()
        .trim_end_matches('.')
        .trim();
    (!clause.is_empty()).then(|| clause.to_string())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| lenient_string(Some(item)))
            .collect(),
        Some(Value::String(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn mistake_patterns(value: Option<&Value>) -> Vec<MistakePattern> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(map) => {
                let kind = lenient_string(map.get("type"))?;
                let description =
                    lenient_string(map.get("description")).unwrap_or_else(|| kind.clone());
                Some(MistakePattern { kind, description })
            }
            Value::String(text) if !text.trim().is_empty() => Some(MistakePattern {
                kind: DESCRIBED_FAILURE_KIND.to_string(),
                description: text.trim().to_string(),
            }),
            _ => None,
        })
        .collect()
}

/// Orders steps by id; duplicate ids are replaced by answer order numbering
fn normalize_ids(mut steps: Vec<Step>) -> Vec<Step> {
    let mut seen = HashSet::new();
    let unique = steps.iter().all(|step| seen.insert(step.step_id));

    if unique {
        steps.sort_by_key(|step| step.step_id);
    } else {
        warn!("Duplicate step ids in model output, renumbering in answer order");
        for (idx, step) in steps.iter_mut().enumerate() {
            step.step_id = idx as u32 + 1;
        }
    }

    steps
}

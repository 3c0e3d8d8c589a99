//! Parsing of raw model output
//!
//! Model answers are non-deterministic and often damaged. Every parser in this
//! module is total: it never fails, and instead reports how much of the answer
//! it could use through [`ParseOutcome`].
//!
//! - [`steps`]: step extraction answers into a [`Procedure`](crate::procedure::Procedure)
//! - [`status`]: live verification answers into a
//!   [`VerificationOutcome`](crate::verification::VerificationOutcome)
//! - [`overlay`]: correction answers into an
//!   [`OverlayInstruction`](crate::overlay::OverlayInstruction)
//! - [`repair`]: schema-agnostic JSON recovery helpers

pub mod overlay;
pub mod repair;
pub mod status;
pub mod steps;

pub use overlay::parse_overlay;
pub use status::parse_verification;
pub use steps::parse_procedure;

use serde_json::Value;

/// Longest excerpt of a model answer that goes into logs
pub const LOG_EXCERPT_CHARS: usize = 200;

/// How much of a model answer made it into the parsed value
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    /// The answer parsed as a whole
    Complete(T),
    /// The answer was damaged; `recovered` records were salvaged from it
    Partial {
        value: T,
        recovered: usize,
        reason: String,
    },
    /// Nothing usable came back; `value` is the fixed default
    Fallback { value: T, reason: String },
}

impl<T> ParseOutcome<T> {
    pub fn value(&self) -> &T {
        match self {
            ParseOutcome::Complete(value) => value,
            ParseOutcome::Partial { value, .. } => value,
            ParseOutcome::Fallback { value, .. } => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            ParseOutcome::Complete(value) => value,
            ParseOutcome::Partial { value, .. } => value,
            ParseOutcome::Fallback { value, .. } => value,
        }
    }

    /// True for anything other than a clean parse
    pub fn is_degraded(&self) -> bool {
        !matches!(self, ParseOutcome::Complete(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ParseOutcome::Fallback { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ParseOutcome::Complete(_) => None,
            ParseOutcome::Partial { reason, .. } => Some(reason),
            ParseOutcome::Fallback { reason, .. } => Some(reason),
        }
    }

    /// Short label for logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            ParseOutcome::Complete(_) => "complete",
            ParseOutcome::Partial { .. } => "partial",
            ParseOutcome::Fallback { .. } => "fallback",
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseOutcome<U> {
        match self {
            ParseOutcome::Complete(value) => ParseOutcome::Complete(f(value)),
            ParseOutcome::Partial {
                value,
                recovered,
                reason,
            } => ParseOutcome::Partial {
                value: f(value),
                recovered,
                reason,
            },
            ParseOutcome::Fallback { value, reason } => ParseOutcome::Fallback {
                value: f(value),
                reason,
            },
        }
    }
}

/// First `LOG_EXCERPT_CHARS` characters of a model answer
pub fn excerpt(text: &str) -> String {
    text.chars().take(LOG_EXCERPT_CHARS).collect()
}

/// Reads a number that the model may have emitted as a string
pub(crate) fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('s').trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

pub(crate) fn lenient_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

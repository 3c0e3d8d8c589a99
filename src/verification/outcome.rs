use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a learner's progress on the current step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    InProgress,
    Complete,
    Mistake,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::InProgress => "in_progress",
            VerificationStatus::Complete => "complete",
            VerificationStatus::Mistake => "mistake",
        }
    }

    /// Recognizes the three status tags, tolerating case and separators
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "in_progress" => Some(VerificationStatus::InProgress),
            "complete" | "completed" => Some(VerificationStatus::Complete),
            "mistake" => Some(VerificationStatus::Mistake),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one live verification check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    pub reason: String,
    /// Always within `[0, 1]`
    pub confidence: f64,
    /// What to fix; only present for mistakes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl VerificationOutcome {
    pub fn new(status: VerificationStatus, reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            status,
            reason: reason.into(),
            confidence: clamp_confidence(confidence),
            suggestion: None,
        }
    }

    pub fn in_progress(reason: impl Into<String>) -> Self {
        Self::new(VerificationStatus::InProgress, reason, 0.0)
    }

    /// Answer for a call rejected by the per-lesson rate gate
    pub fn rate_limited() -> Self {
        Self::in_progress("Checking...")
    }

    /// Attaches a suggestion, kept only when the status is a mistake
    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && self.status == VerificationStatus::Mistake);
        self
    }

    pub fn is_mistake(&self) -> bool {
        self.status == VerificationStatus::Mistake
    }
}

/// Clamps into `[0, 1]`; NaN becomes 0
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

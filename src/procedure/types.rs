//! Procedure data model
//!
//! A [`Procedure`] is the ordered list of [`Step`]s extracted from one
//! demonstration video. Steps carry the time window of the source video they
//! were observed in, plus the annotations added after extraction (clip and
//! audio URLs).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Correction mode assigned to every extracted step
pub const DEFAULT_CORRECTION_MODE: &str = "diagram_overlay_audio";

/// Expected duration used when the time window says nothing useful
pub const DEFAULT_EXPECTED_DURATION_SECS: u32 = 10;

/// Kind of hand motion a step is expected to involve
///
/// Known motions serialize to their snake_case tag. Anything else the model
/// invents survives as [`MotionType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MotionType {
    Positioning,
    RotationClockwise,
    RotationCounterclockwise,
    Pressing,
    Pulling,
    Folding,
    Cutting,
    Connecting,
    Holding,
    Releasing,
    #[default]
    Unspecified,
    Other(String),
}

impl MotionType {
    /// All motion tags the extraction prompt advertises
    pub const KNOWN: [MotionType; 10] = [
        MotionType::Positioning,
        MotionType::RotationClockwise,
        MotionType::RotationCounterclockwise,
        MotionType::Pressing,
        MotionType::Pulling,
        MotionType::Folding,
        MotionType::Cutting,
        MotionType::Connecting,
        MotionType::Holding,
        MotionType::Releasing,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            MotionType::Positioning => "positioning",
            MotionType::RotationClockwise => "rotation_clockwise",
            MotionType::RotationCounterclockwise => "rotation_counterclockwise",
            MotionType::Pressing => "pressing",
            MotionType::Pulling => "pulling",
            MotionType::Folding => "folding",
            MotionType::Cutting => "cutting",
            MotionType::Connecting => "connecting",
            MotionType::Holding => "holding",
            MotionType::Releasing => "releasing",
            MotionType::Unspecified => "",
            MotionType::Other(tag) => tag,
        }
    }
}

impl From<String> for MotionType {
    fn from(value: String) -> Self {
        let normalized = value.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "" => MotionType::Unspecified,
            "positioning" => MotionType::Positioning,
            "rotation_clockwise" => MotionType::RotationClockwise,
            "rotation_counterclockwise" => MotionType::RotationCounterclockwise,
            "pressing" => MotionType::Pressing,
            "pulling" => MotionType::Pulling,
            "folding" => MotionType::Folding,
            "cutting" => MotionType::Cutting,
            "connecting" => MotionType::Connecting,
            "holding" => MotionType::Holding,
            "releasing" => MotionType::Releasing,
            _ => MotionType::Other(value.trim().to_string()),
        }
    }
}

impl From<MotionType> for String {
    fn from(value: MotionType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for MotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A common mistake the learner may make during a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MistakePattern {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

/// One procedural step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step_id: u32,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub expected_objects: Vec<String>,
    #[serde(default)]
    pub expected_motion: MotionType,
    #[serde(default = "default_expected_duration")]
    pub expected_duration_seconds: u32,
    #[serde(default)]
    pub mistake_patterns: Vec<MistakePattern>,
    #[serde(default = "default_correction_mode")]
    pub correction_mode: String,
    /// Window start in the source video, seconds
    #[serde(default)]
    pub start_time: f64,
    /// Window end in the source video, seconds
    #[serde(default)]
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

fn default_expected_duration() -> u32 {
    DEFAULT_EXPECTED_DURATION_SECS
}

fn default_correction_mode() -> String {
    DEFAULT_CORRECTION_MODE.to_string()
}

impl Step {
    /// Creates a step with an empty window and no annotations
    pub fn new(step_id: u32, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            step_id,
            title: title.into(),
            description: description.into(),
            expected_objects: Vec::new(),
            expected_motion: MotionType::Unspecified,
            expected_duration_seconds: DEFAULT_EXPECTED_DURATION_SECS,
            mistake_patterns: Vec::new(),
            correction_mode: default_correction_mode(),
            start_time: 0.0,
            end_time: 0.0,
            instruction: None,
            clip_url: None,
            audio_url: None,
        }
    }

    pub fn with_window(mut self, start_time: f64, end_time: f64) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    pub fn with_motion(mut self, motion: MotionType) -> Self {
        self.expected_motion = motion;
        self
    }

    pub fn with_objects(mut self, objects: Vec<String>) -> Self {
        self.expected_objects = objects;
        self
    }

    /// True when the window is non-empty
    pub fn has_valid_window(&self) -> bool {
        self.end_time > self.start_time
    }

    pub fn window_len(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    /// Text to speak for this step: the spoken instruction, else the title
    pub fn spoken_text(&self) -> &str {
        self.instruction
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.title)
    }
}

/// Ordered step list for one lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub lesson_id: String,
    pub total_steps: usize,
    pub steps: Vec<Step>,
}

impl Procedure {
    pub fn new(lesson_id: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            lesson_id: lesson_id.into(),
            total_steps: steps.len(),
            steps,
        }
    }

    /// The single-step procedure used when nothing usable came back from the model
    pub fn fallback(lesson_id: impl Into<String>) -> Self {
        let mut step = Step::new(1, "Procedure", "Follow the demonstration");
        step.expected_duration_seconds = 30;
        Self::new(lesson_id, vec![step])
    }

    pub fn step(&self, step_id: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn step_mut(&mut self, step_id: u32) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.step_id == step_id)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

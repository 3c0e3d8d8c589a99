//! Corrective overlay model
//!
//! An [`OverlayInstruction`] is rendered by the client on top of the live
//! camera feed. Positions and sizes are normalized to `[0, 1]` with the origin
//! at the top-left corner.

use serde::{Deserialize, Serialize};

/// Normalized `[x, y]` coordinate
pub type Point = [f64; 2];

/// Highlight color for targets
pub const TARGET_COLOR: &str = "#FFD700";
/// Color for direction arrows and wrong states
pub const WRONG_COLOR: &str = "#FF4444";
/// Color for correct positions
pub const CORRECT_COLOR: &str = "#00FF00";

pub const LABEL_TEXT_COLOR: &str = "#FFFFFF";
pub const LABEL_BACKGROUND: &str = "#000000AA";
/// Background used by the fallback labels
pub const ALERT_BACKGROUND: &str = "#FF4444CC";

pub const DEFAULT_OVERLAY_TYPE: &str = "diagram";
pub const DEFAULT_DURATION_SECS: f64 = 5.0;

fn target_color() -> String {
    TARGET_COLOR.to_string()
}

fn wrong_color() -> String {
    WRONG_COLOR.to_string()
}

fn correct_color() -> String {
    CORRECT_COLOR.to_string()
}

fn label_text_color() -> String {
    LABEL_TEXT_COLOR.to_string()
}

fn label_background() -> Option<String> {
    Some(LABEL_BACKGROUND.to_string())
}

fn solid() -> String {
    "solid".to_string()
}

fn filled() -> String {
    "filled".to_string()
}

fn thick_stroke() -> f64 {
    3.0
}

fn thin_stroke() -> f64 {
    2.0
}

fn default_font_size() -> u32 {
    14
}

fn default_overlay_type() -> String {
    DEFAULT_OVERLAY_TYPE.to_string()
}

fn default_duration() -> f64 {
    DEFAULT_DURATION_SECS
}

/// Ring highlighting a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleElement {
    pub center: Point,
    /// Fraction of screen width
    pub radius: f64,
    #[serde(default = "target_color")]
    pub color: String,
    #[serde(default = "thick_stroke")]
    pub stroke_width: f64,
    #[serde(default = "solid")]
    pub style: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
}

/// Directional arrow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowElement {
    #[serde(alias = "from_point")]
    pub from: Point,
    #[serde(alias = "to_point")]
    pub to: Point,
    #[serde(default = "wrong_color")]
    pub color: String,
    #[serde(default = "thick_stroke")]
    pub stroke_width: f64,
    #[serde(default = "solid")]
    pub style: String,
    #[serde(default = "filled")]
    pub head_style: String,
}

/// Text callout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelElement {
    pub position: Point,
    pub text: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "label_text_color")]
    pub color: String,
    #[serde(default = "label_background")]
    pub background: Option<String>,
}

/// Highlighted area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangleElement {
    /// Top-left corner
    pub origin: Point,
    /// `[width, height]`
    pub size: Point,
    #[serde(default = "correct_color")]
    pub color: String,
    #[serde(default = "thin_stroke")]
    pub stroke_width: f64,
    #[serde(default)]
    pub corner_radius: f64,
}

/// One drawable shape; the set is closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OverlayElement {
    Circle(CircleElement),
    Arrow(ArrowElement),
    Label(LabelElement),
    Rectangle(RectangleElement),
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn clamp_point(point: &mut Point) {
    point[0] = clamp_unit(point[0]);
    point[1] = clamp_unit(point[1]);
}

impl OverlayElement {
    /// A label in the house alert style
    pub fn alert_label(position: Point, text: impl Into<String>) -> Self {
        OverlayElement::Label(LabelElement {
            position,
            text: text.into(),
            font_size: 18,
            color: LABEL_TEXT_COLOR.to_string(),
            background: Some(ALERT_BACKGROUND.to_string()),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OverlayElement::Circle(_) => "circle",
            OverlayElement::Arrow(_) => "arrow",
            OverlayElement::Label(_) => "label",
            OverlayElement::Rectangle(_) => "rectangle",
        }
    }

    /// Pulls every positional field back into `[0, 1]`
    pub fn clamp_to_frame(&mut self) {
        match self {
            OverlayElement::Circle(circle) => {
                clamp_point(&mut circle.center);
                circle.radius = clamp_unit(circle.radius);
            }
            OverlayElement::Arrow(arrow) => {
                clamp_point(&mut arrow.from);
                clamp_point(&mut arrow.to);
            }
            OverlayElement::Label(label) => clamp_point(&mut label.position),
            OverlayElement::Rectangle(rect) => {
                clamp_point(&mut rect.origin);
                clamp_point(&mut rect.size);
            }
        }
    }
}

/// Complete corrective overlay plus the sentence to speak alongside it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayInstruction {
    #[serde(default = "default_overlay_type")]
    pub overlay_type: String,
    pub audio_text: String,
    #[serde(default)]
    pub elements: Vec<OverlayElement>,
    #[serde(default = "default_duration")]
    pub duration_seconds: f64,
}

impl OverlayInstruction {
    pub fn new(audio_text: impl Into<String>, elements: Vec<OverlayElement>) -> Self {
        Self {
            overlay_type: default_overlay_type(),
            audio_text: audio_text.into(),
            elements,
            duration_seconds: DEFAULT_DURATION_SECS,
        }
    }

    /// Generic overlay used when a correction answer cannot be read
    pub fn unreadable() -> Self {
        Self::new(
            "Please check your technique and try again.",
            vec![OverlayElement::alert_label([0.5, 0.1], "Check your technique")],
        )
    }

    /// Overlay used when no correction could be generated for `step_title`
    pub fn review_step(step_title: &str) -> Self {
        Self::new(
            format!("Please check your technique for: {}", step_title),
            vec![OverlayElement::alert_label(
                [0.5, 0.1],
                format!("Review: {}", step_title),
            )],
        )
    }
}

//! Prompt templates for the three model calls
//!
//! Templates are pure functions of their inputs. Each builder returns a
//! [`VisionRequest`] with the system message, sampling temperature and token
//! budget already set; callers only attach frames.

use crate::ai::types::{
    VisionRequest, EXTRACTION_TEMPERATURE, OVERLAY_TEMPERATURE, VERIFICATION_TEMPERATURE,
};
use crate::procedure::{MotionType, Step};
use std::fmt::Write;

/// System message for whole-video step extraction
pub const EXTRACTION_SYSTEM_PROMPT: &str =
    "You are an expert instructor who turns demonstration videos into precise, timestamped step-by-step procedures. Output only valid JSON.";

/// System message for live step verification
pub const VERIFICATION_SYSTEM_PROMPT: &str =
    "You are a patient teacher monitoring a student. Output only valid JSON.";

/// System message for corrective overlay generation
pub const OVERLAY_SYSTEM_PROMPT: &str =
    "You are an expert at creating visual instructional overlays for AR training systems. Output only valid JSON.";

const EXTRACTION_MAX_TOKENS: u32 = 4096;
const VERIFICATION_MAX_TOKENS: u32 = 300;
const OVERLAY_MAX_TOKENS: u32 = 800;

const EXTRACTION_TEMPLATE: &str = r#"Analyze this video and extract procedural steps with EXACT timestamps.

=== RULES ===

1. SKIP intro content: title screens, logos, setup frames, hands positioning before the action starts
2. Each step must show ONE distinct action
3. Provide EXACT start/end times in seconds (e.g., 2.5, not frame numbers)
4. Steps should be granular - one action per step
5. Steps must not overlap and must stay within the video duration

=== DESCRIPTION FORMAT ===

Each description MUST include:
- BEFORE: What you see at the START of this action
- ACTION: The SINGLE specific movement happening
- AFTER: What it looks like when done correctly
- FAILURE: What wrong execution looks like

Also give each step a one-sentence spoken "instruction" addressed to the learner.

=== JSON OUTPUT ===

{
  "steps": [
    {
      "step_id": 1,
      "title": "Short action title",
      "description": "BEFORE: [state]. ACTION: [movement]. AFTER: [result]. FAILURE: [what's wrong].",
      "instruction": "One sentence telling the learner what to do.",
      "start_time": 2.5,
      "end_time": 5.0,
      "expected_objects": ["object1", "object2"],
      "expected_motion": "motion_type",
      "mistake_patterns": [{"type": "mistake_id", "description": "What goes wrong"}]
    }
  ]
}
"#;

/// Stateless builder for every prompt the system sends
pub struct PromptBuilder;

impl PromptBuilder {
    /// Full extraction request for a video of `duration` seconds sampled into `frame_count` frames
    pub fn extraction(title: &str, duration: f64, frame_count: usize) -> VisionRequest {
        let mut prompt = Self::extraction_prompt(title);
        prompt.push('\n');
        prompt.push_str(&Self::frame_timeline(duration, frame_count));

        VisionRequest::new(prompt)
            .with_system(EXTRACTION_SYSTEM_PROMPT)
            .with_temperature(EXTRACTION_TEMPERATURE)
            .with_max_tokens(EXTRACTION_MAX_TOKENS)
    }

    /// Extraction instructions without the timing hints
    pub fn extraction_prompt(title: &str) -> String {
        let mut prompt = String::new();
        let title = title.trim();
        if !title.is_empty() {
            let _ = writeln!(prompt, "Title: {}\n", title);
        }
        prompt.push_str(EXTRACTION_TEMPLATE);

        let motions: Vec<String> = MotionType::KNOWN.iter().map(MotionType::to_string).collect();
        let _ = writeln!(prompt, "\nMotion types: {}.", motions.join(", "));
        prompt.push_str("\nOutput ONLY valid JSON, no other text.\n");
        prompt
    }

    /// Per-frame timestamp hints, frames spread evenly over the video
    ///
    /// With `n` frames the interval is `duration / (n - 1)`, so the first frame
    /// sits at 0 and the last at the end of the video.
    pub fn frame_timeline(duration: f64, frame_count: usize) -> String {
        let mut timeline = format!("Video duration: {:.1} seconds.", duration.max(0.0));
        if frame_count == 0 {
            return timeline;
        }

        let interval = if frame_count > 1 {
            duration.max(0.0) / (frame_count - 1) as f64
        } else {
            0.0
        };

        timeline.push_str(" Frame timestamps:");
        for i in 0..frame_count {
            let _ = write!(timeline, "\nFrame {} = {:.1}s", i + 1, interval * i as f64);
        }
        timeline.push('\n');
        timeline
    }

    /// Three-way status classification over a burst of live frames
    pub fn verification(step_title: &str, step_description: &str, frame_count: usize) -> VisionRequest {
        let prompt = format!(
            r#"You are monitoring a student performing a procedural task step-by-step.

CURRENT STEP:
Title: {title}
Description: {description}

You are shown {frames} frames in temporal order, captured over about 2 seconds.

ANALYZE and determine the status:
1. "in_progress" - The student is still working on the step and has not completed it yet
2. "complete" - The step has been completed successfully (matches the AFTER state)
3. "mistake" - The student made an error that needs correction

OUTPUT FORMAT (JSON only):
{{
    "status": "in_progress" | "complete" | "mistake",
    "confidence": 0.0 to 1.0,
    "reason": "Brief observation (max 8 words)",
    "suggestion": "What to fix (only if mistake, else null)"
}}

GUIDELINES:
- CHECK TOOL USAGE: verify the student is using the tools named in the step description.
- If the WRONG tool is used, mark status as "mistake" and reason as "Wrong tool".
- Be patient: when unsure between "in_progress" and "complete", answer "in_progress".
- Be helpful: if there is a clear mistake, identify it specifically.
- Most checks will be "in_progress" - that's normal.

Return ONLY JSON, no other text."#,
            title = step_title.trim(),
            description = step_description.trim(),
            frames = frame_count,
        );

        VisionRequest::new(prompt)
            .with_system(VERIFICATION_SYSTEM_PROMPT)
            .with_temperature(VERIFICATION_TEMPERATURE)
            .with_max_tokens(VERIFICATION_MAX_TOKENS)
    }

    /// Corrective overlay for `mistake_type` made during `step`
    pub fn overlay(step: &Step, mistake_type: &str) -> VisionRequest {
        let prompt = format!(
            r##"The learner is on this step: "{title}"
Description: {description}
Expected objects: {objects}
Expected motion: {motion}

They made this mistake: "{mistake}"

Generate a helpful diagram-style overlay to correct them. The overlay should look like a technical instruction manual, NOT like raw bounding boxes.

Respond with ONLY valid JSON:
{{
    "audio_text": "One clear sentence of spoken correction",
    "elements": [
        {{"type": "circle", "center": [0.5, 0.5], "radius": 0.1, "color": "#FFD700", "stroke_width": 3, "style": "solid"}},
        {{"type": "arrow", "from": [0.3, 0.6], "to": [0.5, 0.4], "color": "#FF4444", "stroke_width": 3, "style": "curved"}},
        {{"type": "label", "position": [0.5, 0.2], "text": "Brief instruction", "font_size": 16, "color": "#FFFFFF", "background": "#000000AA"}},
        {{"type": "rectangle", "origin": [0.4, 0.6], "size": [0.2, 0.15], "color": "#00FF00", "stroke_width": 2}}
    ]
}}

Guidelines:
- Use normalized coordinates (0.0 to 1.0) where (0,0) is top-left
- Use gold (#FFD700) for highlighting targets
- Use red (#FF4444) for arrows showing direction and for wrong states
- Use green (#00FF00) for correct positions
- Keep labels short and actionable
- Place elements where they would logically appear based on the task
- Use 2-4 elements; element types are circle, arrow, label, rectangle"##,
            title = step.title,
            description = step.description,
            objects = if step.expected_objects.is_empty() {
                "none listed".to_string()
            } else {
                step.expected_objects.join(", ")
            },
            motion = if step.expected_motion.as_str().is_empty() {
                "unspecified"
            } else {
                step.expected_motion.as_str()
            },
            mistake = mistake_type.trim(),
        );

        VisionRequest::new(prompt)
            .with_system(OVERLAY_SYSTEM_PROMPT)
            .with_temperature(OVERLAY_TEMPERATURE)
            .with_max_tokens(OVERLAY_MAX_TOKENS)
    }
}

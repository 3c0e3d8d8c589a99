//! Model request types
//!
//! Provider-independent description of a single vision call. Backends translate
//! a [`VisionRequest`] into their own wire format.

use serde::{Deserialize, Serialize};

/// Sampling temperature used for whole-video step extraction
pub const EXTRACTION_TEMPERATURE: f32 = 0.2;

/// Sampling temperature used for live step verification
pub const VERIFICATION_TEMPERATURE: f32 = 0.1;

/// Sampling temperature used for corrective overlay generation
pub const OVERLAY_TEMPERATURE: f32 = 0.2;

/// A single prompt plus the images that accompany it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionRequest {
    /// Optional system instruction
    pub system: Option<String>,
    /// User prompt text
    pub prompt: String,
    /// Base64-encoded JPEG frames, in temporal order
    pub images: Vec<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Ask the provider to constrain output to a JSON object
    pub json_mode: bool,
}

impl VisionRequest {
    /// Creates a text-only request
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            images: Vec::new(),
            temperature: None,
            max_tokens: None,
            json_mode: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Strips a `data:image/...;base64,` prefix if the frame carries one
pub fn raw_base64(frame: &str) -> &str {
    if frame.starts_with("data:") {
        if let Some(idx) = frame.find(',') {
            return &frame[idx + 1..];
        }
    }
    frame
}

/// Renders a frame as a JPEG data URL
pub fn data_url(frame: &str) -> String {
    if frame.starts_with("data:") {
        frame.to_string()
    } else {
        format!("data:image/jpeg;base64,{}", frame)
    }
}

/// Picks `budget` frames spread evenly across `frames`, keeping the first and last
pub fn spread_evenly(frames: &[String], budget: usize) -> Vec<String> {
    if budget == 0 {
        return Vec::new();
    }
    if frames.len() <= budget {
        return frames.to_vec();
    }
    if budget == 1 {
        return vec![frames[0].clone()];
    }

    let last = frames.len() - 1;
    (0..budget)
        .map(|i| frames[i * last / (budget - 1)].clone())
        .collect()
}

/// Keeps the most recent `budget` frames
pub fn most_recent(frames: &[String], budget: usize) -> Vec<String> {
    let skip = frames.len().saturating_sub(budget);
    frames[skip..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    #[test]
    fn test_builder() {
        let request = VisionRequest::new("describe")
            .with_system("sys")
            .with_temperature(0.1)
            .with_max_tokens(300)
            .json();

        assert_eq!(request.system.as_deref(), Some("sys"));
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.max_tokens, Some(300));
        assert!(request.json_mode);
        assert!(request.images.is_empty());
    }

    #[test]
    fn test_spread_evenly_keeps_endpoints() {
        let picked = spread_evenly(&frames(30), 10);
        assert_eq!(picked.len(), 10);
        assert_eq!(picked[0], "f0");
        assert_eq!(picked[9], "f29");
    }

    #[test]
    fn test_spread_evenly_under_budget() {
        assert_eq!(spread_evenly(&frames(3), 10).len(), 3);
        assert!(spread_evenly(&frames(3), 0).is_empty());
        assert_eq!(spread_evenly(&frames(5), 1), vec!["f0".to_string()]);
    }

    #[test]
    fn test_most_recent() {
        assert_eq!(most_recent(&frames(8), 5)[0], "f3");
        assert_eq!(most_recent(&frames(2), 5).len(), 2);
    }

    #[test]
    fn test_data_url_round_trip() {
        assert_eq!(data_url("abc"), "data:image/jpeg;base64,abc");
        assert_eq!(raw_base64("data:image/jpeg;base64,abc"), "abc");
        assert_eq!(raw_base64("abc"), "abc");
        assert_eq!(data_url("data:image/png;base64,xyz"), "data:image/png;base64,xyz");
    }
}

//! Video sampling
//!
//! The extraction pipeline only needs three things from a video: its
//! duration, a handful of evenly spaced frames, and short clips cut out of it.
//! [`VideoSampler`] is that contract; [`FfmpegSampler`] implements it with the
//! `ffmpeg` and `ffprobe` binaries.

pub mod ffmpeg;

pub use ffmpeg::FfmpegSampler;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longest edge of a sampled frame, pixels
pub const DEFAULT_FRAME_SIZE: u32 = 512;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Video not found: {0}")]
    NotFound(PathBuf),

    #[error("{tool} is not installed or not on PATH")]
    ToolMissing { tool: String },

    #[error("{tool} failed: {message}")]
    CommandFailed { tool: String, message: String },

    #[error("Could not read video metadata: {0}")]
    Probe(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Basic metadata of a video file
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Seconds
    pub duration: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait VideoSampler: Send + Sync {
    async fn get_info(&self, path: &Path) -> Result<VideoInfo, MediaError>;

    /// Grabs `count` frames spread evenly over the video as base64 JPEG
    ///
    /// Frames that cannot be decoded are skipped, so the result may be shorter
    /// than requested or empty.
    async fn extract_frames(
        &self,
        path: &Path,
        count: usize,
        max_size: u32,
    ) -> Result<Vec<String>, MediaError>;

    /// Cuts `[start, end]` into a standalone clip named `name`
    async fn extract_clip(
        &self,
        path: &Path,
        start: f64,
        end: f64,
        name: &str,
    ) -> Result<PathBuf, MediaError>;
}

/// Timestamps of `count` frames spread over `duration`, first at 0 and last at the end
pub fn frame_timestamps(duration: f64, count: usize) -> Vec<f64> {
    let duration = duration.max(0.0);
    match count {
        0 => Vec::new(),
        1 => vec![0.0],
        n => (0..n)
            .map(|i| duration * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Keeps a clip window inside the video and at least half a second long
pub fn clip_bounds(start: f64, end: f64, duration: f64) -> (f64, f64) {
    if duration <= 0.0 {
        let start = start.max(0.0);
        return (start, end.max(start + 0.5));
    }
    let start = start.clamp(0.0, duration);
    let end = end.min(duration).max(start + 0.5);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_timestamps() {
        assert_eq!(frame_timestamps(20.0, 5), vec![0.0, 5.0, 10.0, 15.0, 20.0]);
        assert_eq!(frame_timestamps(20.0, 1), vec![0.0]);
        assert!(frame_timestamps(20.0, 0).is_empty());
    }

    #[test]
    fn test_clip_bounds() {
        assert_eq!(clip_bounds(2.0, 5.0, 10.0), (2.0, 5.0));
        assert_eq!(clip_bounds(-1.0, 30.0, 10.0), (0.0, 10.0));
        assert_eq!(clip_bounds(12.0, 14.0, 10.0), (10.0, 10.5));
        assert_eq!(clip_bounds(3.0, 3.0, 0.0), (3.0, 3.5));
    }
}

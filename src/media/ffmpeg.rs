use crate::media::{clip_bounds, frame_timestamps, MediaError, VideoInfo, VideoSampler};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Video sampler driving the `ffmpeg` and `ffprobe` binaries
#[derive(Debug, Clone)]
pub struct FfmpegSampler {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    clips_dir: PathBuf,
}

impl FfmpegSampler {
    /// Uses the binaries on `PATH` and writes clips into `clips_dir`
    pub fn new(clips_dir: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            clips_dir: clips_dir.into(),
        }
    }

    pub fn with_binaries(mut self, ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    pub fn clips_dir(&self) -> &Path {
        &self.clips_dir
    }

    /// Checks that both binaries can be started
    pub async fn check_available(&self) -> Result<(), MediaError> {
        run(&self.ffmpeg, Command::new(&self.ffmpeg).arg("-version")).await?;
        run(&self.ffprobe, Command::new(&self.ffprobe).arg("-version")).await?;
        Ok(())
    }

    async fn grab_frame(&self, path: &Path, at: f64, max_size: u32) -> Result<String, MediaError> {
        let scale = format!(
            "scale='min({size},iw)':'min({size},ih)':force_original_aspect_ratio=decrease",
            size = max_size
        );
        let output = run(
            &self.ffmpeg,
            Command::new(&self.ffmpeg)
                .args(["-v", "error", "-ss", &format!("{:.3}", at), "-i"])
                .arg(path)
                .args(["-frames:v", "1", "-vf", &scale, "-q:v", "3"])
                .args(["-f", "image2pipe", "-vcodec", "mjpeg", "-"]),
        )
        .await?;

        if output.stdout.is_empty() {
            return Err(MediaError::CommandFailed {
                tool: "ffmpeg".to_string(),
                message: format!("no frame decoded at {:.2}s", at),
            });
        }
        Ok(STANDARD.encode(&output.stdout))
    }
}

async fn run(binary: &Path, command: &mut Command) -> Result<Output, MediaError> {
    let tool = binary
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| binary.display().to_string());

    let output = command.output().await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => MediaError::ToolMissing { tool: tool.clone() },
        _ => MediaError::Io(e),
    })?;

    if !output.status.success() {
        return Err(MediaError::CommandFailed {
            tool,
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

fn ensure_exists(path: &Path) -> Result<(), MediaError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(MediaError::NotFound(path.to_path_buf()))
    }
}

/// Parses rates like `30000/1001` or `25`
pub(crate) fn parse_framerate(rate: &str) -> f64 {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().unwrap_or(0.0);
            let den: f64 = den.trim().parse().unwrap_or(0.0);
            if den == 0.0 {
                0.0
            } else {
                num / den
            }
        }
        None => rate.trim().parse().unwrap_or(0.0),
    }
}

/// Reads ffprobe's `-print_format json` output
pub(crate) fn parse_probe(json: &Value) -> Result<VideoInfo, MediaError> {
    let stream = json["streams"]
        .as_array()
        .and_then(|s| s.first())
        .ok_or_else(|| MediaError::Probe("no video stream found".to_string()))?;

    let duration = json["format"]["duration"]
        .as_str()
        .or_else(|| stream["duration"].as_str())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let fps = parse_framerate(
        stream["avg_frame_rate"]
            .as_str()
            .filter(|r| *r != "0/0")
            .or_else(|| stream["r_frame_rate"].as_str())
            .unwrap_or("0"),
    );

    Ok(VideoInfo {
        duration,
        fps,
        width: stream["width"].as_u64().unwrap_or(0) as u32,
        height: stream["height"].as_u64().unwrap_or(0) as u32,
    })
}

#[async_trait]
impl VideoSampler for FfmpegSampler {
    async fn get_info(&self, path: &Path) -> Result<VideoInfo, MediaError> {
        ensure_exists(path)?;

        let output = run(
            &self.ffprobe,
            Command::new(&self.ffprobe)
                .args(["-v", "quiet", "-print_format", "json"])
                .args(["-show_format", "-show_streams", "-select_streams", "v:0"])
                .arg(path),
        )
        .await?;

        let json: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| MediaError::Probe(format!("invalid ffprobe output: {}", e)))?;
        let info = parse_probe(&json)?;
        debug!(
            "Probed {}: {:.2}s, {:.2} fps, {}x{}",
            path.display(),
            info.duration,
            info.fps,
            info.width,
            info.height
        );
        Ok(info)
    }

    async fn extract_frames(
        &self,
        path: &Path,
        count: usize,
        max_size: u32,
    ) -> Result<Vec<String>, MediaError> {
        let info = self.get_info(path).await?;

        // Seeking to the exact end decodes nothing, so the last grab backs off slightly
        let last = (info.duration - 0.1).max(0.0);
        let mut frames = Vec::with_capacity(count);
        for at in frame_timestamps(info.duration, count) {
            match self.grab_frame(path, at.min(last), max_size).await {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!("Skipping frame at {:.2}s of {}: {}", at, path.display(), e),
            }
        }

        info!(
            "Extracted {}/{} frames from {}",
            frames.len(),
            count,
            path.display()
        );
        Ok(frames)
    }

    async fn extract_clip(
        &self,
        path: &Path,
        start: f64,
        end: f64,
        name: &str,
    ) -> Result<PathBuf, MediaError> {
        let info = self.get_info(path).await?;
        let (start, end) = clip_bounds(start, end, info.duration);

        tokio::fs::create_dir_all(&self.clips_dir).await?;
        let output_path = self.clips_dir.join(name);

        run(
            &self.ffmpeg,
            Command::new(&self.ffmpeg)
                .args(["-v", "error", "-y"])
                .args(["-ss", &format!("{:.3}", start), "-to", &format!("{:.3}", end)])
                .arg("-i")
                .arg(path)
                .args(["-c:v", "libx264", "-b:v", "1000k", "-c:a", "aac"])
                .args(["-movflags", "+faststart"])
                .arg(&output_path),
        )
        .await?;

        debug!(
            "Cut clip {} [{:.2}s, {:.2}s]",
            output_path.display(),
            start,
            end
        );
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_framerate() {
        assert!((parse_framerate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_framerate("25"), 25.0);
        assert_eq!(parse_framerate("0/0"), 0.0);
        assert_eq!(parse_framerate("garbage"), 0.0);
    }

    #[test]
    fn test_parse_probe() {
        let json = json!({
            "streams": [{"width": 1920, "height": 1080, "avg_frame_rate": "30/1", "r_frame_rate": "30/1"}],
            "format": {"duration": "20.480000"}
        });
        let info = parse_probe(&json).unwrap();
        assert_eq!(info.duration, 20.48);
        assert_eq!(info.fps, 30.0);
        assert_eq!((info.width, info.height), (1920, 1080));
    }

    #[test]
    fn test_parse_probe_without_stream() {
        let json = json!({"streams": [], "format": {"duration": "3.0"}});
        assert!(matches!(parse_probe(&json), Err(MediaError::Probe(_))));
    }

    #[tokio::test]
    async fn test_missing_video_is_not_found() {
        let sampler = FfmpegSampler::new(std::env::temp_dir());
        let result = sampler
            .get_info(Path::new("/definitely/not/here/video.mp4"))
            .await;
        assert!(matches!(result, Err(MediaError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let sampler = FfmpegSampler::new(std::env::temp_dir())
            .with_binaries("/nonexistent/ffmpeg-bin", "/nonexistent/ffprobe-bin");
        match sampler.check_available().await {
            Err(MediaError::ToolMissing { tool }) => assert_eq!(tool, "ffmpeg-bin"),
            other => panic!("expected ToolMissing, got {:?}", other),
        }
    }
}

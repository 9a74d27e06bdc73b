//! FFmpeg-backed video toolkit
//!
//! Probes, extracts poster frames and compresses videos by driving the
//! `ffmpeg`/`ffprobe` binaries as child processes.

use async_trait::async_trait;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::domains::compression::compressors::video_compressor::{
    CancelToken, VideoCompressionOutcome, VideoCompressionRequest, VideoProbe, VideoToolkit,
};
use crate::domains::settings::PickerSettings;
use crate::errors::{DomainError, DomainResult};

/// Environment overrides for binary discovery
pub const FFMPEG_ENV: &str = "PICKER_FFMPEG_PATH";
pub const FFPROBE_ENV: &str = "PICKER_FFPROBE_PATH";

/// Audio bitrate of compressed exports
const AUDIO_BITRATE: &str = "128k";

/// Locations of the binaries the toolkit runs
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInfo {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl FfmpegInfo {
    /// Environment variables win over settings; otherwise fall back to `PATH` lookup by name.
    pub fn resolve(settings: &PickerSettings) -> Self {
        let pick = |env: &str, configured: &Option<PathBuf>, name: &str| -> PathBuf {
            std::env::var_os(env)
                .map(PathBuf::from)
                .or_else(|| configured.clone())
                .unwrap_or_else(|| PathBuf::from(name))
        };
        Self {
            ffmpeg_path: pick(FFMPEG_ENV, &settings.ffmpeg_path, "ffmpeg"),
            ffprobe_path: pick(FFPROBE_ENV, &settings.ffprobe_path, "ffprobe"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    info: FfmpegInfo,
}

impl FfmpegToolkit {
    pub fn new(info: FfmpegInfo) -> Self {
        Self { info }
    }

    fn ensure_input(path: &Path) -> DomainResult<()> {
        if path.exists() {
            Ok(())
        } else {
            Err(DomainError::File(format!("Input file does not exist: {}", path.display())))
        }
    }

    fn compress_args(request: &VideoCompressionRequest) -> Vec<String> {
        let plan = &request.plan;
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            request.source.to_string_lossy().to_string(),
            "-vf".to_string(),
            format!("scale={}:{}", plan.width, plan.height),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
        ];
        match plan.bitrate {
            Some(bitrate) => {
                args.push("-b:v".to_string());
                args.push(bitrate.to_string());
            }
            None => {
                args.push("-crf".to_string());
                args.push("28".to_string());
            }
        }
        args.extend([
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            AUDIO_BITRATE.to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-nostats".to_string(),
            // destination carries a temp suffix, so name the container explicitly
            "-f".to_string(),
            "mp4".to_string(),
            request.destination.to_string_lossy().to_string(),
        ]);
        args
    }
}

#[async_trait]
impl VideoToolkit for FfmpegToolkit {
    async fn probe(&self, path: &Path) -> DomainResult<VideoProbe> {
        Self::ensure_input(path)?;

        let output = Command::new(&self.info.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                &path.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(|e| DomainError::External(format!("Failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DomainError::External(format!("FFprobe failed: {}", stderr)));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn extract_first_frame(&self, path: &Path) -> DomainResult<DynamicImage> {
        Self::ensure_input(path)?;

        // autorotate is on by default, so the frame comes out upright
        let output = Command::new(&self.info.ffmpeg_path)
            .args([
                "-v",
                "error",
                "-ss",
                "0",
                "-i",
                &path.to_string_lossy(),
                "-frames:v",
                "1",
                "-f",
                "image2pipe",
                "-vcodec",
                "png",
                "pipe:1",
            ])
            .output()
            .await
            .map_err(|e| DomainError::External(format!("Failed to run ffmpeg: {}", e)))?;

        if !output.status.success() || output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DomainError::External(format!("Frame extraction failed: {}", stderr)));
        }

        image::load_from_memory(&output.stdout)
            .map_err(|e| DomainError::Compression(format!("Failed to decode extracted frame: {}", e)))
    }

    async fn compress(
        &self,
        request: VideoCompressionRequest,
        progress: Option<mpsc::Sender<f32>>,
        mut cancel: CancelToken,
    ) -> VideoCompressionOutcome {
        if let Err(e) = Self::ensure_input(&request.source) {
            return VideoCompressionOutcome::Failed(e.to_string());
        }
        if cancel.is_cancelled() {
            return VideoCompressionOutcome::Cancelled;
        }

        log::info!(
            "Compressing {} -> {} at {}x{}",
            request.source.display(),
            request.destination.display(),
            request.plan.width,
            request.plan.height
        );

        let mut cmd = Command::new(&self.info.ffmpeg_path);
        cmd.args(Self::compress_args(&request))
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return VideoCompressionOutcome::Failed(format!("Failed to run ffmpeg: {}", e)),
        };

        if let Some(stdout) = child.stdout.take() {
            let duration = request.duration_sec;
            let tx = progress;
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                let mut current_time = 0.0f64;
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(value) = line.strip_prefix("out_time_ms=") {
                        let us: u64 = value.trim().parse().unwrap_or(0);
                        current_time = us as f64 / 1_000_000.0;
                    } else if line.starts_with("progress=") {
                        if let Some(tx) = &tx {
                            if tx.send(progress_fraction(current_time, duration)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }

        let status = tokio::select! {
            status = child.wait() => status,
            _ = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to stop ffmpeg after cancel: {}", e);
                }
                let _ = tokio::fs::remove_file(&request.destination).await;
                log::info!("Compression of {} cancelled", request.source.display());
                return VideoCompressionOutcome::Cancelled;
            }
        };

        match status {
            Ok(status) if status.success() => match self.probe(&request.destination).await {
                Ok(probe) => VideoCompressionOutcome::Succeeded {
                    path: request.destination.clone(),
                    width: probe.width,
                    height: probe.height,
                },
                // output exists but cannot be inspected: report the planned size
                Err(e) => {
                    log::warn!("Could not probe compressed video: {}", e);
                    VideoCompressionOutcome::Succeeded {
                        path: request.destination.clone(),
                        width: request.plan.width,
                        height: request.plan.height,
                    }
                }
            },
            Ok(status) => VideoCompressionOutcome::Failed(format!("ffmpeg exited with {}", status)),
            Err(e) => VideoCompressionOutcome::Failed(format!("Failed to wait for ffmpeg: {}", e)),
        }
    }
}

fn progress_fraction(current_sec: f64, duration_sec: f64) -> f32 {
    if duration_sec > 0.0 {
        (current_sec / duration_sec).clamp(0.0, 1.0) as f32
    } else {
        0.0
    }
}

/// Parse `ffprobe -print_format json` output into a probe of the first video stream.
pub fn parse_probe_output(json_str: &str) -> DomainResult<VideoProbe> {
    let json: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| DomainError::External(format!("Failed to parse FFprobe output: {}", e)))?;

    let format = json.get("format");
    let format_duration = format
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
        .and_then(|s| s.parse::<f64>().ok());

    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();

    let video = streams
        .iter()
        .find(|s| s.get("codec_type").and_then(|c| c.as_str()) == Some("video"));

    let Some(video) = video else {
        return Ok(VideoProbe {
            duration_sec: format_duration.unwrap_or(0.0),
            ..VideoProbe::default()
        });
    };

    let width = video.get("width").and_then(|w| w.as_u64()).unwrap_or(0) as u32;
    let height = video.get("height").and_then(|h| h.as_u64()).unwrap_or(0) as u32;
    let (width, height) = if is_quarter_turn(stream_rotation(video)) {
        (height, width)
    } else {
        (width, height)
    };

    let duration_sec = format_duration
        .or_else(|| {
            video
                .get("duration")
                .and_then(|d| d.as_str())
                .and_then(|s| s.parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    let bitrate = video
        .get("bit_rate")
        .and_then(|b| b.as_str())
        .and_then(|s| s.parse::<u64>().ok())
        .or_else(|| {
            format
                .and_then(|f| f.get("bit_rate"))
                .and_then(|b| b.as_str())
                .and_then(|s| s.parse::<u64>().ok())
        });

    Ok(VideoProbe { width, height, duration_sec, bitrate })
}

/// Rotation from the display matrix side data, or the legacy `rotate` tag
fn stream_rotation(stream: &serde_json::Value) -> i64 {
    let side_data = stream
        .get("side_data_list")
        .and_then(|list| list.as_array())
        .and_then(|list| list.iter().find_map(|entry| entry.get("rotation").and_then(|r| r.as_i64())));
    side_data
        .or_else(|| {
            stream
                .get("tags")
                .and_then(|t| t.get("rotate"))
                .and_then(|r| r.as_str())
                .and_then(|s| s.parse::<i64>().ok())
        })
        .unwrap_or(0)
}

fn is_quarter_turn(rotation: i64) -> bool {
    rotation.rem_euclid(180) == 90
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::compression::compressors::video_compressor::VideoCompressionPlan;

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio", "sample_rate": "44100"},
                {"codec_type": "video", "width": 1920, "height": 1080, "bit_rate": "12000000"}
            ],
            "format": {"duration": "12.5", "bit_rate": "12500000"}
        }"#;
        let probe = parse_probe_output(json).unwrap();
        assert_eq!((probe.width, probe.height), (1920, 1080));
        assert_eq!(probe.duration_sec, 12.5);
        assert_eq!(probe.bitrate, Some(12_000_000));
        assert!(probe.has_video_track());
    }

    #[test]
    fn test_parse_probe_applies_rotation() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 1920, "height": 1080,
                         "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]}],
            "format": {"duration": "3.0"}
        }"#;
        let probe = parse_probe_output(json).unwrap();
        assert_eq!((probe.width, probe.height), (1080, 1920));

        let legacy = r#"{"streams": [{"codec_type": "video", "width": 640, "height": 480, "tags": {"rotate": "270"}}], "format": {}}"#;
        let probe = parse_probe_output(legacy).unwrap();
        assert_eq!((probe.width, probe.height), (480, 640));
    }

    #[test]
    fn test_parse_probe_without_video_track() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "5.0"}}"#;
        let probe = parse_probe_output(json).unwrap();
        assert!(!probe.has_video_track());
        assert_eq!(probe.duration_sec, 5.0);
        assert!(parse_probe_output("{not json").is_err());
    }

    #[test]
    fn test_compress_args_name_container() {
        let request = VideoCompressionRequest {
            source: PathBuf::from("/in/clip.mov"),
            destination: PathBuf::from("/out/key.mp4.ABC"),
            plan: VideoCompressionPlan { width: 960, height: 528, bitrate: Some(1_600_000) },
            duration_sec: 10.0,
        };
        let args = FfmpegToolkit::compress_args(&request);
        assert!(args.windows(2).any(|w| w[0] == "-vf" && w[1] == "scale=960:528"));
        assert!(args.windows(2).any(|w| w[0] == "-b:v" && w[1] == "1600000"));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "mp4"));
        assert_eq!(args.last().map(String::as_str), Some("/out/key.mp4.ABC"));
    }

    #[test]
    fn test_progress_fraction_is_clamped() {
        assert_eq!(progress_fraction(5.0, 10.0), 0.5);
        assert_eq!(progress_fraction(12.0, 10.0), 1.0);
        assert_eq!(progress_fraction(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_resolve_prefers_settings_over_default() {
        let settings = PickerSettings {
            ffprobe_path: Some(PathBuf::from("/opt/ffprobe")),
            ..PickerSettings::default()
        };
        let info = FfmpegInfo::resolve(&settings);
        if std::env::var_os(FFPROBE_ENV).is_none() {
            assert_eq!(info.ffprobe_path, PathBuf::from("/opt/ffprobe"));
        }
        if std::env::var_os(FFMPEG_ENV).is_none() {
            assert_eq!(info.ffmpeg_path, PathBuf::from("ffmpeg"));
        }
    }

    #[tokio::test]
    async fn test_missing_input_fails_fast() {
        let toolkit = FfmpegToolkit::new(FfmpegInfo {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        });
        assert!(toolkit.probe(Path::new("/no/such/video.mp4")).await.is_err());
        let request = VideoCompressionRequest {
            source: PathBuf::from("/no/such/video.mp4"),
            destination: PathBuf::from("/tmp/out.mp4"),
            plan: VideoCompressionPlan { width: 16, height: 16, bitrate: None },
            duration_sec: 0.0,
        };
        let outcome = toolkit.compress(request, None, CancelToken::never()).await;
        assert!(matches!(outcome, VideoCompressionOutcome::Failed(_)));
    }
}

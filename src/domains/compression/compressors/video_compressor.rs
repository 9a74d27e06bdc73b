//! Video compression contract: size/bitrate planning, the toolkit trait and its outcomes

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, watch};

use crate::errors::DomainResult;

/// Share of the source bitrate the low tier aims for
const LOW_TIER_BITRATE_FACTOR: f64 = 0.1;
/// Sources at or below this bitrate are not re-targeted
const MIN_BITRATE: u64 = 2_000_000;
/// Fixed output size for mid-size sources (long side, short side)
const MID_TIER_SIZE: (f64, f64) = (640.0, 360.0);

/// What ffprobe (or a fake) reports about a video file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoProbe {
    /// Display width, rotation applied
    pub width: u32,
    /// Display height, rotation applied
    pub height: u32,
    pub duration_sec: f64,
    /// Video stream bitrate in bits/s
    pub bitrate: Option<u64>,
}

impl VideoProbe {
    pub fn has_video_track(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Output size and bitrate for one compression run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoCompressionPlan {
    pub width: u32,
    pub height: u32,
    pub bitrate: Option<u64>,
}

impl VideoCompressionPlan {
    /// The picker always exports on the low tier: larger videos are scaled down,
    /// every side is rounded down to a multiple of 16, and bitrate drops to a tenth.
    pub fn low_tier(source: &VideoProbe) -> Self {
        let (width, height) = scaled_size(source.width, source.height);
        let bitrate = source.bitrate.map(|bitrate| {
            if bitrate <= MIN_BITRATE {
                bitrate
            } else {
                (bitrate as f64 * LOW_TIER_BITRATE_FACTOR).round() as u64
            }
        });
        Self { width, height, bitrate }
    }
}

fn round16(value: f64) -> u32 {
    ((value / 16.0).floor() as u32 * 16).max(16)
}

fn scaled_size(width: u32, height: u32) -> (u32, u32) {
    let (w, h) = (width as f64, height as f64);
    if width >= 1920 || height >= 1920 {
        (round16(w * 0.5), round16(h * 0.5))
    } else if width >= 1280 || height >= 1280 {
        (round16(w * 0.75), round16(h * 0.75))
    } else if width >= 960 || height >= 960 {
        let (long, short) = (round16(MID_TIER_SIZE.0 * 0.95), round16(MID_TIER_SIZE.1 * 0.95));
        if width >= height { (long, short) } else { (short, long) }
    } else {
        (round16(w * 0.9), round16(h * 0.9))
    }
}

/// One compression job
#[derive(Debug, Clone)]
pub struct VideoCompressionRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub plan: VideoCompressionPlan,
    /// Source duration, used to turn encoder timestamps into a fraction
    pub duration_sec: f64,
}

/// How a compression run ended
#[derive(Debug, Clone, PartialEq)]
pub enum VideoCompressionOutcome {
    Succeeded { path: PathBuf, width: u32, height: u32 },
    Failed(String),
    Cancelled,
}

/// Sender half: flip to cancel an in-progress compression
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiver half handed to the compressor
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
    // set only for `never()`, keeps the channel open
    _sender: Option<std::sync::Arc<watch::Sender<bool>>>,
}

impl CancelToken {
    pub fn pair() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx: std::sync::Arc::new(tx) }, CancelToken { rx, _sender: None })
    }

    /// A token nobody can cancel
    pub fn never() -> CancelToken {
        let (tx, rx) = watch::channel(false);
        CancelToken { rx, _sender: Some(std::sync::Arc::new(tx)) }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancel is requested; pends forever if the handle is dropped first.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Media operations the video export needs from the platform
#[async_trait]
pub trait VideoToolkit: Send + Sync {
    /// Inspect a video file: display size, duration, bitrate
    async fn probe(&self, path: &Path) -> DomainResult<VideoProbe>;

    /// First frame with the track's rotation applied
    async fn extract_first_frame(&self, path: &Path) -> DomainResult<DynamicImage>;

    /// Encode `request.source` into `request.destination`.
    /// Progress fractions (0.0-1.0) go to `progress` when given.
    async fn compress(
        &self,
        request: VideoCompressionRequest,
        progress: Option<mpsc::Sender<f32>>,
        cancel: CancelToken,
    ) -> VideoCompressionOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(width: u32, height: u32, bitrate: Option<u64>) -> VideoProbe {
        VideoProbe { width, height, duration_sec: 10.0, bitrate }
    }

    #[test]
    fn test_full_hd_is_halved() {
        let plan = VideoCompressionPlan::low_tier(&probe(1920, 1080, Some(16_000_000)));
        assert_eq!((plan.width, plan.height), (960, 528));
        assert_eq!(plan.bitrate, Some(1_600_000));
    }

    #[test]
    fn test_hd_is_three_quarters() {
        let plan = VideoCompressionPlan::low_tier(&probe(1280, 720, None));
        assert_eq!((plan.width, plan.height), (960, 528));
        assert_eq!(plan.bitrate, None);
    }

    #[test]
    fn test_mid_tier_is_fixed_and_keeps_orientation() {
        let landscape = VideoCompressionPlan::low_tier(&probe(960, 540, None));
        assert_eq!((landscape.width, landscape.height), (608, 336));
        let portrait = VideoCompressionPlan::low_tier(&probe(540, 960, None));
        assert_eq!((portrait.width, portrait.height), (336, 608));
    }

    #[test]
    fn test_small_video_scaled_by_ninety_percent() {
        let plan = VideoCompressionPlan::low_tier(&probe(640, 480, Some(1_500_000)));
        assert_eq!((plan.width, plan.height), (576, 432));
        // low bitrates are kept as-is
        assert_eq!(plan.bitrate, Some(1_500_000));
    }

    #[test]
    fn test_bitrate_just_above_floor_is_retargeted() {
        let plan = VideoCompressionPlan::low_tier(&probe(640, 480, Some(2_000_001)));
        assert_eq!(plan.bitrate, Some(200_000));
    }

    #[tokio::test]
    async fn test_cancel_token_resolves() {
        let (handle, mut token) = CancelToken::pair();
        assert!(!token.is_cancelled());
        handle.cancel();
        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_never_token_is_not_cancelled() {
        assert!(!CancelToken::never().is_cancelled());
    }
}

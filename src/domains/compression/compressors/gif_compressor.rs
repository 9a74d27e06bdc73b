//! Animated GIF re-encoding with frame sampling

use async_trait::async_trait;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::{AnimationDecoder, Delay, Frame};
use std::io::Cursor;
use tokio::task;

use crate::errors::{DomainError, DomainResult};
use super::Compressor;
use crate::domains::compression::types::{CompressionConfig, CompressionMethod};

/// Keeps every n-th frame of a GIF and re-encodes it.
/// A sample count of 1 keeps every frame; larger counts give the small check preview.
#[derive(Clone)]
pub struct GifCompressor;

#[async_trait]
impl Compressor for GifCompressor {
    async fn compress(
        &self,
        data: Vec<u8>,
        config: CompressionConfig,
    ) -> DomainResult<Vec<u8>> {
        if config.method != CompressionMethod::Animated {
            return Err(DomainError::Compression(format!(
                "GifCompressor cannot run method {}",
                config.method.as_str()
            )));
        }
        let sample_count = config.sample_count.max(1);

        task::spawn_blocking(move || resample_gif(&data, sample_count))
            .await
            .map_err(|e| DomainError::Internal(format!("Task join error: {}", e)))?
    }

    fn compressor_name(&self) -> &'static str {
        "GifCompressor"
    }
}

fn delay_ms(delay: Delay) -> u32 {
    let (numer, denom) = delay.numer_denom_ms();
    if denom == 0 {
        0
    } else {
        numer / denom
    }
}

/// Group frames in runs of `sample_count`; each run becomes its first frame shown for the whole run.
pub fn sample_frames(frames: Vec<Frame>, sample_count: usize) -> Vec<Frame> {
    let sample_count = sample_count.max(1);
    let mut kept: Vec<Frame> = Vec::with_capacity(frames.len() / sample_count + 1);
    let mut run_head: Option<(Frame, u32)> = None;

    for (index, frame) in frames.into_iter().enumerate() {
        let ms = delay_ms(frame.delay());
        if index % sample_count == 0 {
            if let Some((head, total)) = run_head.take() {
                kept.push(with_delay(head, total));
            }
            run_head = Some((frame, ms));
        } else if let Some((_, total)) = run_head.as_mut() {
            *total = total.saturating_add(ms);
        }
    }
    if let Some((head, total)) = run_head {
        kept.push(with_delay(head, total));
    }
    kept
}

fn with_delay(frame: Frame, total_ms: u32) -> Frame {
    let (left, top) = (frame.left(), frame.top());
    Frame::from_parts(frame.into_buffer(), left, top, Delay::from_numer_denom_ms(total_ms, 1))
}

fn resample_gif(data: &[u8], sample_count: usize) -> DomainResult<Vec<u8>> {
    let decoder = GifDecoder::new(Cursor::new(data))
        .map_err(|e| DomainError::Compression(format!("Failed to read GIF: {}", e)))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| DomainError::Compression(format!("Failed to decode GIF frames: {}", e)))?;
    if frames.is_empty() {
        return Err(DomainError::Compression("GIF has no frames".to_string()));
    }

    let frame_total = frames.len();
    let kept = sample_frames(frames, sample_count);
    log::debug!("GIF resampled: {} of {} frames kept (sample {})", kept.len(), frame_total, sample_count);

    // Sampled previews trade palette quality for speed
    let speed = if sample_count > 1 { 30 } else { 10 };
    let mut output = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut output, speed);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| DomainError::Compression(format!("GIF encoding error: {}", e)))?;
        encoder
            .encode_frames(kept)
            .map_err(|e| DomainError::Compression(format!("GIF encoding error: {}", e)))?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn frame(shade: u8, ms: u32) -> Frame {
        let buffer = RgbaImage::from_pixel(8, 8, Rgba([shade, shade, shade, 255]));
        Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(ms, 1))
    }

    fn encode_test_gif(count: usize) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut out);
            encoder.set_repeat(Repeat::Infinite).unwrap();
            encoder
                .encode_frames((0..count).map(|i| frame((i * 10) as u8, 100)))
                .unwrap();
        }
        out
    }

    fn frame_count(data: &[u8]) -> usize {
        GifDecoder::new(Cursor::new(data))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap()
            .len()
    }

    #[test]
    fn test_sampling_folds_delays() {
        let frames: Vec<Frame> = (0..5).map(|i| frame(i as u8, 100)).collect();
        let kept = sample_frames(frames, 2);
        assert_eq!(kept.len(), 3);
        assert_eq!(delay_ms(kept[0].delay()), 200);
        assert_eq!(delay_ms(kept[2].delay()), 100);
    }

    #[test]
    fn test_sample_one_keeps_every_frame() {
        let frames: Vec<Frame> = (0..4).map(|i| frame(i as u8, 50)).collect();
        assert_eq!(sample_frames(frames, 1).len(), 4);
    }

    #[tokio::test]
    async fn test_check_pass_keeps_first_frame() {
        let data = encode_test_gif(30);
        let full = GifCompressor.compress(data.clone(), CompressionConfig::animated(1)).await.unwrap();
        let check = GifCompressor.compress(data, CompressionConfig::animated(24)).await.unwrap();
        assert_eq!(frame_count(&full), 30);
        assert_eq!(frame_count(&check), 2);
    }

    #[tokio::test]
    async fn test_rejects_still_method_and_bad_data() {
        let data = encode_test_gif(2);
        assert!(GifCompressor.compress(data, CompressionConfig::default()).await.is_err());
        assert!(GifCompressor.compress(b"GIF89a".to_vec(), CompressionConfig::animated(1)).await.is_err());
    }
}

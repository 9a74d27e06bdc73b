//! Still image compression: Luban-style thumbs, origin re-encodes and check previews

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView};
use std::io::Cursor;
use tokio::task;

use crate::errors::{DomainError, DomainResult};
use super::Compressor;
use crate::domains::compression::types::{CompressionConfig, CompressionMethod};

/// Quality decrement of the size-targeting loops
const QUALITY_STEP: u8 = 6;

/// Image compressor using the `image` crate; every output is JPEG
#[derive(Clone)]
pub struct ImageCompressor;

#[async_trait]
impl Compressor for ImageCompressor {
    async fn compress(
        &self,
        data: Vec<u8>,
        config: CompressionConfig,
    ) -> DomainResult<Vec<u8>> {
        // Run image operations in a blocking task to avoid blocking the runtime
        task::spawn_blocking(move || -> DomainResult<Vec<u8>> {
            let img = decode_oriented(&data)?;

            match config.method {
                CompressionMethod::Thumb => compress_thumb(img, data.len(), &config),
                CompressionMethod::Origin => compress_origin(img, data.len(), &config),
                CompressionMethod::Check => compress_check(img, &config),
                CompressionMethod::Animated => Err(DomainError::Compression(
                    "ImageCompressor does not handle animated images".to_string(),
                )),
            }
        }).await.map_err(|e| DomainError::Internal(format!("Task join error: {}", e)))?
    }

    fn compressor_name(&self) -> &'static str {
        "ImageCompressor"
    }
}

/// Target produced by the Luban size rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LubanPlan {
    /// Small enough already: re-encode at the original size
    Keep,
    /// Resize to the given size and aim for `target_kb`
    Resize { width: u32, height: u32, target_kb: u64 },
}

/// Work out the thumb size for a `width`×`height` image whose source is `source_bytes` long.
pub fn luban_plan(width: u32, height: u32, source_bytes: usize) -> LubanPlan {
    let even = |v: u32| if v % 2 == 1 { v + 1 } else { v };
    let (w, h) = (even(width) as f64, even(height) as f64);
    let short = w.min(h);
    let long = w.max(h);
    let scale = short / long;
    let source_kb = (source_bytes / 1024) as u64;

    let (short_out, long_out, target) = if scale <= 1.0 && scale > 0.5625 {
        if long < 1664.0 {
            if source_kb < 150 {
                return LubanPlan::Keep;
            }
            let size = short * long / 1664f64.powi(2) * 150.0;
            (short, long, size.max(60.0))
        } else if long < 4990.0 {
            let (s, l) = (short / 2.0, long / 2.0);
            let size = s * l / 2495f64.powi(2) * 300.0;
            (s, l, size.max(60.0))
        } else if long < 10240.0 {
            let (s, l) = (short / 4.0, long / 4.0);
            let size = s * l / 2560f64.powi(2) * 300.0;
            (s, l, size.max(100.0))
        } else {
            let multiple = (long / 1280.0).floor().max(1.0);
            let (s, l) = (short / multiple, long / multiple);
            let size = s * l / 2560f64.powi(2) * 300.0;
            (s, l, size.max(100.0))
        }
    } else if scale <= 0.5625 && scale > 0.5 {
        if long < 1280.0 && source_kb < 200 {
            return LubanPlan::Keep;
        }
        let multiple = (long / 1280.0).floor().max(1.0);
        let (s, l) = (short / multiple, long / multiple);
        let size = s * l / (1440.0 * 2560.0) * 400.0;
        (s, l, size.max(100.0))
    } else {
        let multiple = (long / (1280.0 / scale)).ceil().max(1.0);
        let (s, l) = (short / multiple, long / multiple);
        let size = s * l / (1280.0 * (1280.0 / scale)) * 500.0;
        (s, l, size.max(100.0))
    };

    let (short_px, long_px) = ((short_out as u32).max(1), (long_out as u32).max(1));
    let (width, height) = if width >= height {
        (long_px, short_px)
    } else {
        (short_px, long_px)
    };
    LubanPlan::Resize { width, height, target_kb: target as u64 }
}

/// Decode and apply the EXIF orientation so pixels come out upright.
pub fn decode_oriented(data: &[u8]) -> DomainResult<DynamicImage> {
    let img = image::load_from_memory(data)
        .map_err(|e| DomainError::Compression(format!("Failed to load image: {}", e)))?;
    Ok(apply_orientation(img, read_orientation(data)))
}

fn read_orientation(data: &[u8]) -> u32 {
    let mut cursor = Cursor::new(data);
    exif::Reader::new()
        .read_from_container(&mut cursor)
        .ok()
        .and_then(|exif| {
            exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1)
}

fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Encode as baseline JPEG; alpha is dropped.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> DomainResult<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));
    encoder
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .map_err(|e| DomainError::Compression(format!("JPEG encoding error: {}", e)))?;
    Ok(output)
}

/// Step the JPEG quality down until the output is at most `max_bytes` or the floor is hit.
fn encode_jpeg_within(img: &DynamicImage, max_bytes: usize, start: u8, floor: u8) -> DomainResult<Vec<u8>> {
    let floor = floor.clamp(1, 100);
    let mut quality = start.clamp(floor, 100);
    let mut output = encode_jpeg(img, quality)?;
    while output.len() > max_bytes && quality > floor {
        quality = quality.saturating_sub(QUALITY_STEP).max(floor);
        output = encode_jpeg(img, quality)?;
    }
    log::debug!(
        "JPEG settled at quality {} ({} bytes, limit {})",
        quality, output.len(), max_bytes
    );
    Ok(output)
}

fn compress_thumb(img: DynamicImage, source_bytes: usize, config: &CompressionConfig) -> DomainResult<Vec<u8>> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(DomainError::Compression("Image has no pixels".to_string()));
    }

    match luban_plan(width, height, source_bytes) {
        LubanPlan::Keep => encode_jpeg(&img, config.quality_level),
        LubanPlan::Resize { width: w, height: h, target_kb } => {
            let resized = if (w, h) == (width, height) {
                img
            } else {
                img.resize_exact(w, h, FilterType::Triangle)
            };
            encode_jpeg_within(&resized, (target_kb as usize) * 1024, config.quality_level, config.min_quality)
        }
    }
}

fn compress_origin(img: DynamicImage, source_bytes: usize, config: &CompressionConfig) -> DomainResult<Vec<u8>> {
    encode_jpeg_within(&img, source_bytes, config.quality_level, config.min_quality)
}

fn compress_check(img: DynamicImage, config: &CompressionConfig) -> DomainResult<Vec<u8>> {
    let edge = config.check_edge.max(1);
    let (width, height) = img.dimensions();
    let preview = if width > edge || height > edge {
        img.resize(edge, edge, FilterType::Triangle)
    } else {
        img
    };
    encode_jpeg(&preview, config.quality_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};

    fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 255) as u8, (y * 13 % 255) as u8, ((x ^ y) % 255) as u8])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_luban_keeps_small_images() {
        assert_eq!(luban_plan(1000, 800, 100 * 1024), LubanPlan::Keep);
        assert_eq!(luban_plan(700, 1260, 150 * 1024), LubanPlan::Keep);
    }

    #[test]
    fn test_luban_halves_large_photos() {
        match luban_plan(4032, 3024, 3_000_000) {
            LubanPlan::Resize { width, height, target_kb } => {
                assert_eq!((width, height), (2016, 1512));
                assert!(target_kb >= 60);
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_luban_keeps_portrait_orientation() {
        match luban_plan(3024, 4032, 3_000_000) {
            LubanPlan::Resize { width, height, .. } => assert_eq!((width, height), (1512, 2016)),
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_luban_long_screenshots() {
        // 1:4 strip falls into the narrow bucket and is split by 1280/scale
        match luban_plan(1000, 4000, 2_000_000) {
            LubanPlan::Resize { width, height, target_kb } => {
                assert_eq!((width, height), (1000, 4000));
                assert!(target_kb >= 100);
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_luban_rounds_odd_sizes_up() {
        match luban_plan(2001, 1999, 1_000_000) {
            LubanPlan::Resize { width, height, .. } => assert_eq!((width, height), (1001, 1000)),
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_thumb_outputs_jpeg() {
        let data = noisy_png(64, 48);
        let out = ImageCompressor
            .compress(data, CompressionConfig::default())
            .await
            .unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (64, 48));
    }

    #[tokio::test]
    async fn test_check_fits_inside_edge() {
        let data = noisy_png(640, 320);
        let config = CompressionConfig { method: CompressionMethod::Check, check_edge: 312, ..CompressionConfig::default() };
        let out = ImageCompressor.compress(data, config).await.unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (312, 156));
    }

    #[tokio::test]
    async fn test_origin_keeps_dimensions() {
        let data = noisy_png(120, 90);
        let config = CompressionConfig { method: CompressionMethod::Origin, quality_level: 90, ..CompressionConfig::default() };
        let out = ImageCompressor.compress(data, config).await.unwrap();
        assert_eq!(image::load_from_memory(&out).unwrap().dimensions(), (120, 90));
    }

    #[tokio::test]
    async fn test_garbage_is_rejected() {
        let result = ImageCompressor.compress(b"not an image".to_vec(), CompressionConfig::default()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_orientation_six_rotates() {
        let img = DynamicImage::new_rgb8(4, 2);
        assert_eq!(apply_orientation(img, 6).dimensions(), (2, 4));
    }
}

//! Type definitions for the compression domain.

use serde::{Deserialize, Serialize};
use crate::domains::settings::PickerSettings;

/// Compression methods the export pipeline asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionMethod {
    /// Size-targeted downscale for quick sharing
    Thumb,

    /// Original dimensions, re-encoded at high quality
    Origin,

    /// Small preview that fits inside the check edge
    Check,

    /// Animated image re-encode with frame sampling
    Animated,
}

impl CompressionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionMethod::Thumb => "thumb",
            CompressionMethod::Origin => "origin",
            CompressionMethod::Check => "check",
            CompressionMethod::Animated => "animated",
        }
    }
}

/// Configuration for a single compression pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub method: CompressionMethod,
    pub quality_level: u8, // JPEG starting quality, 1-100
    pub min_quality: u8,   // floor for size-targeting loops
    pub sample_count: usize, // keep every n-th frame (animated only)
    pub check_edge: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            method: CompressionMethod::Thumb,
            quality_level: 100,
            min_quality: 10,
            sample_count: 1,
            check_edge: 312,
        }
    }
}

impl CompressionConfig {
    pub fn thumb(settings: &PickerSettings) -> Self {
        Self {
            method: CompressionMethod::Thumb,
            quality_level: 100,
            min_quality: settings.min_jpeg_quality,
            ..Self::default()
        }
    }

    pub fn origin(settings: &PickerSettings) -> Self {
        Self {
            method: CompressionMethod::Origin,
            quality_level: settings.origin_quality,
            min_quality: settings.min_jpeg_quality,
            ..Self::default()
        }
    }

    pub fn check(settings: &PickerSettings) -> Self {
        Self {
            method: CompressionMethod::Check,
            quality_level: 100,
            min_quality: settings.min_jpeg_quality,
            check_edge: settings.check_edge,
            ..Self::default()
        }
    }

    pub fn animated(sample_count: usize) -> Self {
        Self {
            method: CompressionMethod::Animated,
            sample_count: sample_count.max(1),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configs_follow_settings() {
        let settings = PickerSettings { origin_quality: 80, check_edge: 200, ..PickerSettings::default() };
        assert_eq!(CompressionConfig::origin(&settings).quality_level, 80);
        assert_eq!(CompressionConfig::check(&settings).check_edge, 200);
        assert_eq!(CompressionConfig::animated(0).sample_count, 1);
        assert_eq!(CompressionConfig::animated(24).sample_count, 24);
    }
}

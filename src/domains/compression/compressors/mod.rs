//! Different compressors for the media kinds the picker exports

pub mod image_compressor;
pub mod gif_compressor;
pub mod video_compressor;

use async_trait::async_trait;
use crate::errors::DomainResult;
use super::types::CompressionConfig;

pub use image_compressor::ImageCompressor;
pub use gif_compressor::GifCompressor;

/// Common trait for the still and animated image compressors
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Compress file data
    async fn compress(
        &self,
        data: Vec<u8>,
        config: CompressionConfig,
    ) -> DomainResult<Vec<u8>>;

    /// Name used in log lines
    fn compressor_name(&self) -> &'static str;
}

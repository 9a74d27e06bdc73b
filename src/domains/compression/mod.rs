// Declare submodules for the compression domain
pub mod types;
pub mod compressors;
pub mod ffmpeg;

pub use types::{CompressionConfig, CompressionMethod};

pub use compressors::{Compressor, GifCompressor, ImageCompressor};
pub use compressors::video_compressor::{
    CancelHandle, CancelToken, VideoCompressionOutcome, VideoCompressionPlan,
    VideoCompressionRequest, VideoProbe, VideoToolkit,
};
pub use ffmpeg::{FfmpegInfo, FfmpegToolkit};

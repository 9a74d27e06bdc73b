pub mod library;
pub mod types;

pub use library::{AssetLibrary, LocalAssetLibrary, VideoSource};
pub use types::{AssetRef, MediaKind};

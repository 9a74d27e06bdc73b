//! Deterministic output names for exported assets

use std::path::PathBuf;

use crate::domains::asset::{AssetRef, MediaKind};

/// What an asset exports as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportKind {
    Image { thumb: bool },
    Gif,
    Video,
}

impl ExportKind {
    /// Videos go through the video path; everything else is an image, animated when the filename says GIF.
    pub fn for_asset(asset: &AssetRef, thumb: bool) -> Option<Self> {
        match asset.media_kind {
            MediaKind::Video => Some(ExportKind::Video),
            MediaKind::Image | MediaKind::Unknown if asset.is_gif() => Some(ExportKind::Gif),
            MediaKind::Image | MediaKind::Unknown => Some(ExportKind::Image { thumb }),
            MediaKind::Audio => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Image { thumb: true } => "thumb",
            ExportKind::Image { thumb: false } => "origin",
            ExportKind::Gif => "gif",
            ExportKind::Video => "video",
        }
    }
}

/// Adds the trailing separator output names are appended to.
pub fn normalize_save_dir(save_dir: &str) -> String {
    if save_dir.is_empty() || save_dir.ends_with('/') || save_dir.ends_with(std::path::MAIN_SEPARATOR) {
        save_dir.to_string()
    } else {
        format!("{}/", save_dir)
    }
}

/// Main file plus its companion: the check preview for images, the poster frame for videos.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPaths {
    pub name: String,
    pub file_path: String,
    pub companion_name: String,
    pub companion_path: String,
}

impl ExportPaths {
    pub fn new(kind: ExportKind, cache_key: &str, save_dir: &str) -> Self {
        let dir = normalize_save_dir(save_dir);
        let (name, companion_name) = match kind {
            ExportKind::Image { thumb } => {
                let name = format!("{}-{}.jpg", cache_key, if thumb { "thumb" } else { "origin" });
                let check = format!("{}.check", name);
                (name, check)
            }
            ExportKind::Gif => (format!("{}.gif", cache_key), format!("{}-check.gif", cache_key)),
            ExportKind::Video => (format!("{}.mp4", cache_key), format!("{}.jpg", cache_key)),
        };
        Self {
            file_path: format!("{}{}", dir, name),
            companion_path: format!("{}{}", dir, companion_name),
            name,
            companion_name,
        }
    }

    pub fn file(&self) -> PathBuf {
        PathBuf::from(&self.file_path)
    }

    pub fn companion(&self) -> PathBuf {
        PathBuf::from(&self.companion_path)
    }
}

/// `<final>.<token>`
pub fn temp_path(final_path: &str, token: &str) -> PathBuf {
    PathBuf::from(format!("{}.{}", final_path, token))
}

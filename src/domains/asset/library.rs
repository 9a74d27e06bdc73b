use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

use crate::domains::asset::types::{AssetRef, MediaKind};
use crate::errors::{DomainError, DomainResult, ValidationError};

/// Handle to a playable video behind an asset
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSource {
    pub path: PathBuf,
}

/// Read-only access to the media library the picker browses.
#[async_trait]
pub trait AssetLibrary: Send + Sync {
    /// Raw bytes of an image asset (`None` when unavailable)
    async fn request_image_data(&self, asset: &AssetRef) -> Option<Vec<u8>>;

    /// Video behind an asset (`None` when unavailable)
    async fn request_video(&self, asset: &AssetRef) -> Option<VideoSource>;
}

/// Library backed by files the host resolved and registered.
pub struct LocalAssetLibrary {
    assets: RwLock<HashMap<String, AssetRef>>,
}

impl LocalAssetLibrary {
    pub fn new() -> Self {
        Self {
            assets: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) an asset.
    /// Unknown media kinds are sniffed from the source file's header.
    pub async fn register(&self, mut asset: AssetRef) -> DomainResult<AssetRef> {
        if asset.identifier.trim().is_empty() {
            return Err(ValidationError::required("identifier").into());
        }
        let source = asset
            .source_path
            .clone()
            .ok_or_else(|| DomainError::Validation(ValidationError::required("source_path")))?;

        if asset.media_kind == MediaKind::Unknown {
            asset.media_kind = sniff_file(&source).await?;
            log::debug!("Sniffed media kind {} for asset {}", asset.media_kind.as_str(), asset.identifier);
        }
        if asset.filename.is_none() {
            asset.filename = source
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.to_string());
        }
        if asset.media_kind == MediaKind::Image && (asset.pixel_width == 0 || asset.pixel_height == 0) {
            let path = source.clone();
            let dimensions = tokio::task::spawn_blocking(move || image::image_dimensions(&path))
                .await
                .map_err(|e| DomainError::Internal(format!("Task join error: {}", e)))?;
            match dimensions {
                Ok((width, height)) => {
                    asset.pixel_width = width;
                    asset.pixel_height = height;
                }
                Err(e) => log::warn!("Could not read pixel size of {}: {}", source.display(), e),
            }
        }

        self.assets.write().await.insert(asset.identifier.clone(), asset.clone());
        Ok(asset)
    }

    pub async fn get(&self, identifier: &str) -> Option<AssetRef> {
        self.assets.read().await.get(identifier).cloned()
    }

    pub async fn remove(&self, identifier: &str) -> bool {
        self.assets.write().await.remove(identifier).is_some()
    }

    pub async fn len(&self) -> usize {
        self.assets.read().await.len()
    }

    /// Size of the asset's source file in bytes (0 when unknown)
    pub async fn file_size(&self, asset: &AssetRef) -> u64 {
        match &asset.source_path {
            Some(path) => fs::metadata(path).await.map(|meta| meta.len()).unwrap_or(0),
            None => 0,
        }
    }

    /// Filename the asset was created with, falling back to the source file's name
    pub fn original_filename(asset: &AssetRef) -> Option<String> {
        asset.filename.clone().or_else(|| {
            asset
                .source_path
                .as_deref()
                .and_then(Path::file_name)
                .and_then(|name| name.to_str())
                .map(|name| name.to_string())
        })
    }

    fn source_of(asset: &AssetRef) -> Option<&Path> {
        asset.source_path.as_deref()
    }
}

impl Default for LocalAssetLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetLibrary for LocalAssetLibrary {
    async fn request_image_data(&self, asset: &AssetRef) -> Option<Vec<u8>> {
        let path = Self::source_of(asset)?;
        match fs::read(path).await {
            Ok(data) if !data.is_empty() => Some(data),
            Ok(_) => {
                log::warn!("Source file for asset {} is empty", asset.identifier);
                None
            }
            Err(e) => {
                log::warn!("Failed to read source for asset {}: {}", asset.identifier, e);
                None
            }
        }
    }

    async fn request_video(&self, asset: &AssetRef) -> Option<VideoSource> {
        let path = Self::source_of(asset)?;
        if fs::try_exists(path).await.unwrap_or(false) {
            Some(VideoSource { path: path.to_path_buf() })
        } else {
            log::warn!("Video source for asset {} is missing: {}", asset.identifier, path.display());
            None
        }
    }
}

async fn sniff_file(path: &Path) -> DomainResult<MediaKind> {
    use tokio::io::AsyncReadExt;

    let mut file = fs::File::open(path).await?;
    let mut header = vec![0u8; 512];
    let read = file.read(&mut header).await?;
    header.truncate(read);
    Ok(MediaKind::sniff(&header))
}

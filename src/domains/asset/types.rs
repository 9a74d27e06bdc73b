//! Asset references handed over by the host.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Media category of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    #[default]
    Unknown,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Unknown => "unknown",
        }
    }

    /// Guess the media kind from magic bytes
    pub fn sniff(data: &[u8]) -> MediaKind {
        match infer::get(data).map(|kind| kind.matcher_type()) {
            Some(infer::MatcherType::Image) => MediaKind::Image,
            Some(infer::MatcherType::Video) => MediaKind::Video,
            Some(infer::MatcherType::Audio) => MediaKind::Audio,
            _ => MediaKind::Unknown,
        }
    }
}

/// A photo or video item the host resolved to a file on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRef {
    /// Platform-stable identifier (may contain slashes)
    pub identifier: String,
    /// Seconds since the Unix epoch; hosts may also send an RFC 3339 string
    #[serde(default, deserialize_with = "deserialize_modification_date")]
    pub modification_date: Option<f64>,
    #[serde(default)]
    pub media_kind: MediaKind,
    /// Original filename, used to detect animated GIFs
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub pixel_width: u32,
    #[serde(default)]
    pub pixel_height: u32,
    #[serde(default)]
    pub source_path: Option<PathBuf>,
}

impl AssetRef {
    pub fn new(identifier: &str, media_kind: MediaKind) -> Self {
        Self {
            identifier: identifier.to_string(),
            modification_date: None,
            media_kind,
            filename: None,
            pixel_width: 0,
            pixel_height: 0,
            source_path: None,
        }
    }

    pub fn with_filename(mut self, filename: &str) -> Self {
        self.filename = Some(filename.to_string());
        self
    }

    pub fn with_pixel_size(mut self, width: u32, height: u32) -> Self {
        self.pixel_width = width;
        self.pixel_height = height;
        self
    }

    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Stable key for output filenames: identifier and modification time, slashes stripped.
    pub fn cache_key(&self) -> String {
        let timestamp = self.modification_date.unwrap_or(0.0);
        format!("{}-{:?}", self.identifier, timestamp).replace('/', "")
    }

    /// Animated GIFs are recognised by filename, the same way the photo library reports them.
    pub fn is_gif(&self) -> bool {
        self.filename
            .as_deref()
            .map(|name| name.to_uppercase().ends_with("GIF"))
            .unwrap_or(false)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawModificationDate {
    Seconds(f64),
    Text(String),
}

fn deserialize_modification_date<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawModificationDate>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawModificationDate::Seconds(seconds)) => Ok(Some(seconds)),
        Some(RawModificationDate::Text(text)) => {
            let when = DateTime::parse_from_rfc3339(&text)
                .map_err(|e| de::Error::custom(format!("invalid modification_date {:?}: {}", text, e)))?;
            Ok(Some(epoch_seconds(when.with_timezone(&Utc))))
        }
    }
}

fn epoch_seconds(when: DateTime<Utc>) -> f64 {
    when.timestamp() as f64 + when.timestamp_subsec_nanos() as f64 / 1_000_000_000.0
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domains::asset::AssetRef;
use crate::errors::ExportError;

/// Still or animated image export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageExport {
    pub identifier: String,
    pub file_path: String,
    /// Preview file; the main file when no preview was produced
    pub check_path: String,
    pub width: u32,
    pub height: u32,
    pub name: String,
}

/// Compressed video plus its poster frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoExport {
    pub identifier: String,
    pub file_path: String,
    pub width: u32,
    pub height: u32,
    pub name: String,
    /// Seconds
    pub duration: f64,
    pub thumb_path: String,
    pub thumb_name: String,
    pub thumb_width: u32,
    pub thumb_height: u32,
}

/// Result of one successful export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportRecord {
    Image(ImageExport),
    Gif(ImageExport),
    Video(VideoExport),
}

impl ExportRecord {
    pub fn file_type(&self) -> &'static str {
        match self {
            ExportRecord::Image(_) => "image/jpeg",
            ExportRecord::Gif(_) => "image/gif",
            ExportRecord::Video(_) => "video",
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            ExportRecord::Image(image) | ExportRecord::Gif(image) => &image.identifier,
            ExportRecord::Video(video) => &video.identifier,
        }
    }

    pub fn file_path(&self) -> &str {
        match self {
            ExportRecord::Image(image) | ExportRecord::Gif(image) => &image.file_path,
            ExportRecord::Video(video) => &video.file_path,
        }
    }

    /// Flat mapping the host reads, `fileType` included
    pub fn to_host_map(&self) -> Map<String, Value> {
        let value = match self {
            ExportRecord::Image(image) | ExportRecord::Gif(image) => serde_json::to_value(image),
            ExportRecord::Video(video) => serde_json::to_value(video),
        };
        let mut map = match value {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert("fileType".to_string(), Value::String(self.file_type().to_string()));
        map
    }
}

/// Export request as the host sends it
#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    /// Registered asset identifier; ignored when `asset` is given
    #[serde(default)]
    pub identifier: Option<String>,
    /// Inline asset description, for hosts that do not register assets
    #[serde(default)]
    pub asset: Option<AssetRef>,
    /// Falls back to the configured default
    #[serde(default)]
    pub thumb: Option<bool>,
    /// Falls back to the configured save directory
    #[serde(default)]
    pub save_dir: Option<String>,
}

/// Failure payload handed to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFailure {
    pub identifier: String,
    pub error_code: String,
    pub message: String,
}

impl From<&ExportError> for ExportFailure {
    fn from(error: &ExportError) -> Self {
        Self {
            identifier: error.identifier().to_string(),
            error_code: error.error_code().as_str().to_string(),
            message: error.domain_message(),
        }
    }
}

/// Progress payload handed to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportProgress {
    pub identifier: String,
    pub progress: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_host_map() {
        let record = ExportRecord::Image(ImageExport {
            identifier: "id/1".to_string(),
            file_path: "/d/k-thumb.jpg".to_string(),
            check_path: "/d/k-thumb.jpg.check".to_string(),
            width: 400,
            height: 300,
            name: "k-thumb.jpg".to_string(),
        });
        let map = record.to_host_map();
        assert_eq!(map["filePath"], "/d/k-thumb.jpg");
        assert_eq!(map["checkPath"], "/d/k-thumb.jpg.check");
        assert_eq!(map["width"], 400);
        assert_eq!(map["fileType"], "image/jpeg");
        assert!(!map.contains_key("kind"));
    }

    #[test]
    fn test_video_host_map() {
        let record = ExportRecord::Video(VideoExport {
            identifier: "v".to_string(),
            file_path: "/d/k.mp4".to_string(),
            width: 960,
            height: 528,
            name: "k.mp4".to_string(),
            duration: 12.5,
            thumb_path: "/d/k.jpg".to_string(),
            thumb_name: "k.jpg".to_string(),
            thumb_width: 1920,
            thumb_height: 1080,
        });
        let map = record.to_host_map();
        assert_eq!(map["fileType"], "video");
        assert_eq!(map["thumbPath"], "/d/k.jpg");
        assert_eq!(map["thumbWidth"], 1920);
        assert_eq!(map["duration"], 12.5);
        assert_eq!(record.file_type(), "video");
    }

    #[test]
    fn test_failure_payload() {
        let failure = ExportFailure::from(&ExportError::cancelled("v"));
        assert_eq!(failure.error_code, "2");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["errorCode"], "2");
        assert_eq!(json["identifier"], "v");
    }

    #[test]
    fn test_request_defaults() {
        let request: ExportRequest = serde_json::from_str(r#"{"identifier": "abc"}"#).unwrap();
        assert_eq!(request.identifier.as_deref(), Some("abc"));
        assert!(request.thumb.is_none() && request.save_dir.is_none() && request.asset.is_none());
    }
}

use crate::domains::asset::types::MediaKind;
use crate::errors::{DomainError, DomainResult, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Edge length of the square a static image must exceed before a check file is produced.
pub const DEFAULT_CHECK_EDGE: u32 = 312;

/// Which media the picker lets the user select.
/// Parsed leniently so the host's `selectImage`/`selectVideo` names work too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum SelectType {
    #[default]
    All,
    Image,
    Video,
}

impl FromStr for SelectType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "all" => Ok(SelectType::All),
            "image" | "selectimage" => Ok(SelectType::Image),
            "video" | "selectvideo" => Ok(SelectType::Video),
            _ => Err(ValidationError::invalid_value("select_type", &format!("unknown select type {:?}", s))),
        }
    }
}

impl TryFrom<String> for SelectType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl SelectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectType::All => "all",
            SelectType::Image => "image",
            SelectType::Video => "video",
        }
    }

    pub fn accepts(&self, kind: MediaKind) -> bool {
        match self {
            SelectType::All => true,
            SelectType::Image => kind == MediaKind::Image,
            SelectType::Video => kind == MediaKind::Video,
        }
    }
}

/// Settings handed over by the host when the plugin is initialized.
/// Every field has a default, so `{}` is a valid settings payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerSettings {
    /// Default quality tier when a request does not say (true = thumb)
    pub thumb: bool,
    pub select_type: SelectType,
    pub max_number_of_selections: usize,
    /// Default output directory for exports
    pub save_dir: Option<String>,

    pub check_edge: u32,
    /// JPEG quality of video poster frames (1-100)
    pub video_poster_quality: u8,
    /// Starting JPEG quality of origin exports (1-100)
    pub origin_quality: u8,
    /// Lowest JPEG quality the size-targeting loops step down to
    pub min_jpeg_quality: u8,
    pub gif_sample_count: usize,
    pub gif_check_sample_count: usize,

    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

impl Default for PickerSettings {
    fn default() -> Self {
        Self {
            thumb: true,
            select_type: SelectType::All,
            max_number_of_selections: usize::MAX,
            save_dir: None,
            check_edge: DEFAULT_CHECK_EDGE,
            video_poster_quality: 60,
            origin_quality: 90,
            min_jpeg_quality: 10,
            gif_sample_count: 1,
            gif_check_sample_count: 24,
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

impl PickerSettings {
    /// Parse settings from the host's JSON payload and validate them.
    pub fn from_json(json: &str) -> DomainResult<Self> {
        let trimmed = json.trim();
        let settings: PickerSettings = if trimmed.is_empty() {
            PickerSettings::default()
        } else {
            serde_json::from_str(trimmed)
                .map_err(|e| DomainError::Configuration(format!("Invalid settings JSON: {}", e)))?
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.max_number_of_selections == 0 {
            return Err(ValidationError::range("max_number_of_selections", 1, usize::MAX).into());
        }
        if self.check_edge == 0 {
            return Err(ValidationError::invalid_value("check_edge", "must be greater than zero").into());
        }
        for (field, value) in [
            ("video_poster_quality", self.video_poster_quality),
            ("origin_quality", self.origin_quality),
            ("min_jpeg_quality", self.min_jpeg_quality),
        ] {
            if !(1..=100).contains(&value) {
                return Err(ValidationError::range(field, 1, 100).into());
            }
        }
        if self.min_jpeg_quality > self.origin_quality {
            return Err(ValidationError::invalid_value(
                "min_jpeg_quality",
                "cannot exceed origin_quality",
            ).into());
        }
        if self.gif_sample_count == 0 || self.gif_check_sample_count == 0 {
            return Err(ValidationError::invalid_value("gif_sample_count", "sample counts start at 1").into());
        }
        if let Some(dir) = &self.save_dir {
            if dir.trim().is_empty() {
                return Err(ValidationError::required("save_dir").into());
            }
        }
        Ok(())
    }

    /// Pixel area above which a static image export also writes a check file
    pub fn check_area_threshold(&self) -> u64 {
        self.check_edge as u64 * self.check_edge as u64
    }
}

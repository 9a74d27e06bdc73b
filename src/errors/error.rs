use std::fmt;
use serde::Serialize;
use thiserror::Error;

/// Error code tags the host application matches on.
/// Values are stable and surface as strings in failure payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExportErrorCode {
    /// Compressing or copying the media failed ("1")
    CompressionFailed,
    /// Source data was unavailable or could not be decoded ("2")
    RequestFailed,
    /// Output file was not found after the write ("3")
    SaveFailed,
}

impl ExportErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportErrorCode::CompressionFailed => "1",
            ExportErrorCode::RequestFailed => "2",
            ExportErrorCode::SaveFailed => "3",
        }
    }
}

impl fmt::Display for ExportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the asset export pipeline.
/// Every variant carries the identifier of the asset being exported.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum ExportError {
    #[error("Request failed for asset {identifier}: {message}")]
    RequestFailed {
        identifier: String,
        message: String,
    },

    #[error("Compression failed for asset {identifier}: {message}")]
    CompressionFailed {
        identifier: String,
        message: String,
    },

    #[error("Save failed for asset {identifier}: {message}")]
    SaveFailed {
        identifier: String,
        message: String,
    },

    #[error("Compression cancelled for asset {identifier}")]
    Cancelled {
        identifier: String,
    },
}

impl ExportError {
    pub fn request_failed(identifier: &str, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            identifier: identifier.to_string(),
            message: message.into(),
        }
    }

    pub fn compression_failed(identifier: &str, message: impl Into<String>) -> Self {
        Self::CompressionFailed {
            identifier: identifier.to_string(),
            message: message.into(),
        }
    }

    pub fn save_failed(identifier: &str, message: impl Into<String>) -> Self {
        Self::SaveFailed {
            identifier: identifier.to_string(),
            message: message.into(),
        }
    }

    pub fn cancelled(identifier: &str) -> Self {
        Self::Cancelled {
            identifier: identifier.to_string(),
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            ExportError::RequestFailed { identifier, .. }
            | ExportError::CompressionFailed { identifier, .. }
            | ExportError::SaveFailed { identifier, .. }
            | ExportError::Cancelled { identifier } => identifier,
        }
    }

    /// Cancellation reports the request-failed tag; hosts treat both as "try again".
    pub fn error_code(&self) -> ExportErrorCode {
        match self {
            ExportError::RequestFailed { .. } => ExportErrorCode::RequestFailed,
            ExportError::CompressionFailed { .. } => ExportErrorCode::CompressionFailed,
            ExportError::SaveFailed { .. } => ExportErrorCode::SaveFailed,
            ExportError::Cancelled { .. } => ExportErrorCode::RequestFailed,
        }
    }

    /// Short domain message, without the identifier prefix.
    pub fn domain_message(&self) -> String {
        match self {
            ExportError::RequestFailed { message, .. }
            | ExportError::CompressionFailed { message, .. }
            | ExportError::SaveFailed { message, .. } => message.clone(),
            ExportError::Cancelled { .. } => "Video compression was cancelled".to_string(),
        }
    }
}

/// Domain-level errors
#[derive(Debug, Error, Clone, Serialize)]
pub enum DomainError {
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("File error: {0}")]
    File(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("External error: {0}")]
    External(String),
}

impl From<std::io::Error> for DomainError {
    fn from(error: std::io::Error) -> Self {
        DomainError::File(error.to_string())
    }
}

impl From<image::ImageError> for DomainError {
    fn from(error: image::ImageError) -> Self {
        DomainError::Compression(format!("Image codec error: {}", error))
    }
}

/// Validation errors
#[derive(Debug, Error, Clone, Serialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required {
        field: String,
    },

    #[error("Field '{field}' must be between {min} and {max}")]
    Range {
        field: String,
        min: String,
        max: String,
    },

    #[error("Field '{field}' contains an invalid value: {reason}")]
    InvalidValue {
        field: String,
        reason: String,
    },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::Required {
            field: field.to_string(),
        }
    }

    pub fn range<T: fmt::Display>(field: &str, min: T, max: T) -> Self {
        Self::Range {
            field: field.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_match_host_contract() {
        assert_eq!(ExportError::compression_failed("a", "x").error_code().as_str(), "1");
        assert_eq!(ExportError::request_failed("a", "x").error_code().as_str(), "2");
        assert_eq!(ExportError::save_failed("a", "x").error_code().as_str(), "3");
        assert_eq!(ExportError::cancelled("a").error_code().as_str(), "2");
    }

    #[test]
    fn test_identifier_is_carried() {
        let err = ExportError::save_failed("ABC/L0/001", "missing");
        assert_eq!(err.identifier(), "ABC/L0/001");
        assert!(err.to_string().contains("ABC/L0/001"));
        assert_eq!(err.domain_message(), "missing");
    }

    #[test]
    fn test_domain_error_wraps_export_error() {
        let err: DomainError = ExportError::cancelled("id").into();
        assert!(err.to_string().contains("cancelled"));
    }
}

use std::fmt;
use serde::{Deserialize, Serialize};
use crate::errors::{DomainError, ExportError, ValidationError};

/// Error codes for FFI boundary
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Success (no error)
    Success = 0,

    // General errors (1-99)
    InvalidArgument = 2,
    NullPointer = 3,
    InvalidUtf8 = 4,
    InternalError = 6,
    NotInitialized = 7,

    // Domain errors (200-299)
    EntityNotFound = 201,
    ValidationFailed = 204,
    FileError = 207,
    CompressionError = 208,

    // Service errors (300-399)
    ConfigurationError = 310,
    ExternalServiceError = 311,

    // Export errors (500-599)
    ExportCompressionFailed = 501,
    ExportRequestFailed = 502,
    ExportSaveFailed = 503,
    ExportCancelled = 504,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, *self as i32)
    }
}

/// Error type for FFI boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FFIError {
    /// Error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (JSON string)
    pub details: Option<String>,
}

impl fmt::Display for FFIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(details) = &self.details {
            write!(f, "{}: {} ({})", self.code, self.message, details)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for FFIError {}

impl FFIError {
    pub fn new(code: ErrorCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: &str, details: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: Some(details.to_string()),
        }
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn internal(message: String) -> Self {
        Self::new(ErrorCode::InternalError, &message)
    }

    pub fn not_initialized(what: &str) -> Self {
        Self::new(ErrorCode::NotInitialized, &format!("{} not initialized; call picker_initialize first", what))
    }
}

/// Result type for FFI operations
pub type FFIResult<T> = Result<T, FFIError>;

impl From<ExportError> for FFIError {
    fn from(err: ExportError) -> Self {
        let code = match &err {
            ExportError::CompressionFailed { .. } => ErrorCode::ExportCompressionFailed,
            ExportError::RequestFailed { .. } => ErrorCode::ExportRequestFailed,
            ExportError::SaveFailed { .. } => ErrorCode::ExportSaveFailed,
            ExportError::Cancelled { .. } => ErrorCode::ExportCancelled,
        };
        let details = serde_json::json!({
            "identifier": err.identifier(),
            "errorCode": err.error_code().as_str(),
        });
        Self::with_details(code, &err.domain_message(), &details.to_string())
    }
}

impl From<DomainError> for FFIError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Export(export_err) => export_err.into(),
            DomainError::Validation(val_err) => val_err.into(),
            DomainError::AssetNotFound(identifier) => {
                Self::with_details(
                    ErrorCode::EntityNotFound,
                    &format!("Asset not found: {}", identifier),
                    &serde_json::json!({ "identifier": identifier }).to_string(),
                )
            }
            DomainError::File(msg) => Self::new(ErrorCode::FileError, &msg),
            DomainError::Compression(msg) => Self::new(ErrorCode::CompressionError, &msg),
            DomainError::Configuration(msg) => Self::new(ErrorCode::ConfigurationError, &msg),
            DomainError::Internal(msg) => Self::new(ErrorCode::InternalError, &msg),
            DomainError::External(msg) => {
                Self::new(ErrorCode::ExternalServiceError, &format!("External error: {}", msg))
            }
        }
    }
}

impl From<ValidationError> for FFIError {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        let details = match &err {
            ValidationError::Required { field } => {
                serde_json::json!({ "field": field, "type": "required" })
            }
            ValidationError::Range { field, min, max } => {
                serde_json::json!({ "field": field, "type": "range", "min": min, "max": max })
            }
            ValidationError::InvalidValue { field, reason } => {
                serde_json::json!({ "field": field, "type": "invalid_value", "reason": reason })
            }
        };
        Self::with_details(ErrorCode::ValidationFailed, &message, &details.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_error_keeps_host_code() {
        let ffi: FFIError = ExportError::save_failed("id/1", "gone").into();
        assert_eq!(ffi.code, ErrorCode::ExportSaveFailed);
        assert_eq!(ffi.message, "gone");
        let details: serde_json::Value = serde_json::from_str(ffi.details.as_deref().unwrap()).unwrap();
        assert_eq!(details["errorCode"], "3");
        assert_eq!(details["identifier"], "id/1");
    }

    #[test]
    fn test_domain_error_mapping() {
        let ffi: FFIError = DomainError::Configuration("bad".to_string()).into();
        assert_eq!(ffi.code, ErrorCode::ConfigurationError);
        let ffi: FFIError = DomainError::Validation(ValidationError::required("identifier")).into();
        assert_eq!(ffi.code, ErrorCode::ValidationFailed);
        assert!(ffi.details.unwrap().contains("\"required\""));
    }

    #[test]
    fn test_error_serializes_for_host() {
        let json = serde_json::to_value(FFIError::invalid_argument("nope")).unwrap();
        assert_eq!(json["code"], "InvalidArgument");
        assert_eq!(json["message"], "nope");
    }
}

mod error;

pub use error::{DomainError, ExportError, ExportErrorCode, ValidationError};

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for asset export operations
pub type ExportResult<T> = Result<T, ExportError>;

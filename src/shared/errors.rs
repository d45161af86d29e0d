use thiserror::Error;

/// Errors raised by the todo store and its persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File I/O failed: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse data: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Failed to create directory: {0}")]
    DirectoryError(String),

    #[error("Todo not found: {0}")]
    NotFound(String),

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Refusing to overwrite {0}: it could not be loaded, fix or move it first")]
    Unreadable(String),
}

impl StoreError {
    pub fn directory(msg: impl Into<String>) -> Self {
        StoreError::DirectoryError(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound(id.into())
    }

    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns true when the error only means the addressed todo is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

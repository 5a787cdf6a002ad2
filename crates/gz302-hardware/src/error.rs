//! Error types for sysfs device operations.
//!
//! Device-control failures on sysfs are almost always one of: the attribute
//! vanished (hot-unplug race), the write was refused by the kernel, or the
//! caller lacks privilege. The variants mirror those cases so log lines can
//! tell them apart after a hang.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while reading or writing sysfs attributes.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Attribute or device directory does not exist.
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// Caller lacks privilege for this attribute.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    /// Kernel refused the write (EINVAL, ENODEV, EBUSY and friends).
    #[error("Write rejected: {path}: {reason}")]
    WriteRejected { path: String, reason: String },

    /// Attribute content could not be interpreted.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a new permission denied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied { path: path.into() }
    }

    /// Create a new write rejected error.
    pub fn write_rejected(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteRejected {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Map an I/O error on `path` to the closest variant.
    pub fn from_io(path: impl Into<String>, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::Io(err),
        }
    }
}

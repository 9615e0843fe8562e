//! Media error types and handling
//!
//! Host device layers report acquisition failures with a human-readable
//! reason and a coarse category. [`MediaError`] keeps the reason exactly as the
//! host phrased it so that it can be shown to the user unchanged.

use posecam_core::CoreError;
use thiserror::Error;

/// Main error type for media operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    /// The user or platform refused access to the device
    #[error("NotAllowedError: {reason}")]
    PermissionDenied {
        /// Host-supplied reason
        reason: String,
    },

    /// No device matched the request
    #[error("NotFoundError: {reason}")]
    DeviceNotFound {
        /// Host-supplied reason
        reason: String,
    },

    /// A required constraint cannot be met by any device
    #[error("OverconstrainedError: {constraint} - {reason}")]
    Overconstrained {
        /// Name of the unsatisfiable constraint
        constraint: String,
        /// Host-supplied reason
        reason: String,
    },

    /// The device exists but could not be started (busy or hardware fault)
    #[error("NotReadableError: {reason}")]
    NotReadable {
        /// Host-supplied reason
        reason: String,
    },

    /// The request was aborted by the host
    #[error("AbortError: {reason}")]
    Aborted {
        /// Host-supplied reason
        reason: String,
    },

    /// Malformed request
    #[error("TypeError: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// Capture backend failure
    #[error("Backend error: {backend} - {message}")]
    Backend {
        /// Backend name
        backend: String,
        /// Error message
        message: String,
    },

    /// Core resource error
    #[error("Resource error: {source}")]
    Core {
        #[from]
        source: CoreError,
    },
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Reason hosts give when a device is present but already in use
pub const DEVICE_IN_USE_REASON: &str = "Could not start video source";

impl MediaError {
    /// The reason string as reported by the host
    pub fn reason(&self) -> String {
        match self {
            MediaError::PermissionDenied { reason }
            | MediaError::DeviceNotFound { reason }
            | MediaError::Overconstrained { reason, .. }
            | MediaError::NotReadable { reason }
            | MediaError::Aborted { reason } => reason.clone(),
            MediaError::InvalidConfiguration { message } => message.clone(),
            MediaError::Backend { message, .. } => message.clone(),
            MediaError::Core { source } => source.to_string(),
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::PermissionDenied { .. } => ErrorCategory::PermissionDenied,
            MediaError::DeviceNotFound { .. } => ErrorCategory::NotFound,
            MediaError::Overconstrained { .. } => ErrorCategory::Overconstrained,
            MediaError::NotReadable { .. } => ErrorCategory::Other,
            MediaError::Aborted { .. } => ErrorCategory::Other,
            MediaError::InvalidConfiguration { .. } => ErrorCategory::Other,
            MediaError::Backend { .. } => ErrorCategory::Other,
            MediaError::Core { .. } => ErrorCategory::Other,
        }
    }

    /// Check if a later, user-initiated attempt could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::NotReadable { .. } => true,
            MediaError::Aborted { .. } => true,
            MediaError::Core { source } => source.is_recoverable(),
            MediaError::PermissionDenied { .. } => false,
            MediaError::DeviceNotFound { .. } => false,
            MediaError::Overconstrained { .. } => false,
            MediaError::InvalidConfiguration { .. } => false,
            MediaError::Backend { .. } => false,
        }
    }

    /// Map a lease failure to the error a host reports for a busy device
    pub fn from_lease_error(error: CoreError) -> Self {
        match error {
            CoreError::ResourceBusy { .. } => MediaError::NotReadable {
                reason: DEVICE_IN_USE_REASON.to_string(),
            },
            other => MediaError::Core { source: other },
        }
    }
}

/// Error categories reported by the host device layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Access refused by the user or platform policy
    PermissionDenied,
    /// No matching device
    NotFound,
    /// Constraints cannot be satisfied
    Overconstrained,
    /// Any other host-reported failure
    Other,
}

impl ErrorCategory {
    /// Short label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::PermissionDenied => "permission_denied",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Overconstrained => "overconstrained",
            ErrorCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

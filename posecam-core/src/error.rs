//! Error types for posecam

use thiserror::Error;

/// Main error type for core posecam operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Initialization error
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for initialization failure
        reason: String,
    },

    /// A device is already leased to another holder
    #[error("Resource busy: {resource} is held by {holders} lease(s)")]
    ResourceBusy {
        /// Resource that is busy
        resource: String,
        /// Number of outstanding leases on the resource
        holders: u32,
    },

    /// Invalid state error
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Check if the operation may succeed when attempted again later
    pub fn is_recoverable(&self) -> bool {
        match self {
            CoreError::ResourceBusy { .. } => true,
            CoreError::Initialization { .. } => false,
            CoreError::InvalidState { .. } => false,
        }
    }

    /// Suggested action for the user or caller
    pub fn suggested_action(&self) -> &'static str {
        match self {
            CoreError::ResourceBusy { .. } => {
                "Stop the stream currently holding the device before acquiring it again"
            }
            CoreError::Initialization { .. } => "Check the host runtime and device drivers",
            CoreError::InvalidState { .. } => "Check the component lifecycle order",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_error_display() {
        let error = CoreError::ResourceBusy {
            resource: "camera:0".to_string(),
            holders: 1,
        };
        assert_eq!(
            error.to_string(),
            "Resource busy: camera:0 is held by 1 lease(s)"
        );
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_invalid_state_not_recoverable() {
        let error = CoreError::InvalidState {
            expected: "Idle".to_string(),
            actual: "Active".to_string(),
        };
        assert!(!error.is_recoverable());
        assert!(!error.suggested_action().is_empty());
    }
}

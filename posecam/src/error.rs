//! The single error kind surfaced at the view boundary

use posecam_media::{ErrorCategory, MediaError};
use thiserror::Error;

/// Camera acquisition failed
///
/// Carries the host-supplied reason unchanged so the user sees exactly what
/// the host reported.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Camera acquisition failed ({category}): {reason}")]
pub struct DeviceAcquisitionFailure {
    /// Host failure category
    pub category: ErrorCategory,
    /// Host-supplied reason
    pub reason: String,
}

impl From<MediaError> for DeviceAcquisitionFailure {
    fn from(error: MediaError) -> Self {
        Self {
            category: error.category(),
            reason: error.reason(),
        }
    }
}

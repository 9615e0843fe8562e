//! Host device access
//!
//! [`MediaDevices`] is the single boundary between posecam and whatever owns
//! the cameras: a browser-style host, the native capture stack, or a scripted
//! mock in tests.

use crate::constraints::{FacingMode, MediaStreamConstraints};
use crate::error::MediaResult;
use crate::stream::MediaStream;
use async_trait::async_trait;

/// Kind of media device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaDeviceKind {
    VideoInput,
}

/// Media device information
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub kind: MediaDeviceKind,
    pub label: String,
    pub facing_mode: Option<FacingMode>,
}

/// Host-side device layer
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Request a stream satisfying `constraints`.
    ///
    /// The request may suspend for as long as the host negotiates permissions
    /// and opens the device. It cannot be aborted once issued; a caller that
    /// no longer wants the stream must stop it after it resolves.
    async fn get_user_media(&self, constraints: &MediaStreamConstraints) -> MediaResult<MediaStream>;

    /// List devices known to the host
    fn enumerate_devices(&self) -> MediaResult<Vec<MediaDeviceInfo>>;

    /// Name of the host implementation, for logs
    fn backend_name(&self) -> &'static str;
}

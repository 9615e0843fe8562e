//! # posecam media
//!
//! Capture constraints, owned media streams and the host device boundary.
//! This crate knows how to ask a host for a camera and how to give it back;
//! it does not know anything about views or surfaces.

#![warn(clippy::all)]

pub mod constraints;
pub mod devices;
pub mod error;
pub mod mock;
#[cfg(feature = "native")]
pub mod native;
pub mod stream;

// Re-export main types
pub use constraints::{
    ConstrainFacingMode, ConstrainULong, FacingMode, MediaStreamConstraints, VideoConstraints,
    VideoResolution,
};
pub use devices::{MediaDeviceInfo, MediaDeviceKind, MediaDevices};
pub use error::{ErrorCategory, MediaError, MediaResult};
pub use mock::{IssuedStream, MockCamera, MockMediaDevices};
#[cfg(feature = "native")]
pub use native::NativeMediaDevices;
pub use stream::{
    MediaStream, MediaStreamTrack, TrackDriver, TrackKind, TrackProbe, TrackSettings, TrackState,
};

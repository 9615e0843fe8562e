//! # posecam - camera view with guaranteed release
//!
//! posecam acquires a single camera stream for a view, presents it on a
//! playback surface, and hands the camera back to the host on every teardown
//! path, including teardown that races a still-pending acquisition.
//!
//! ## Key Features
//!
//! - **Owned streams**: a [`MediaStream`] stops its tracks when dropped
//! - **Advisory cancellation**: a stream that resolves after teardown is
//!   stopped immediately and never shown
//! - **Scriptable hosts**: [`MockMediaDevices`] for tests, a nokhwa-backed
//!   host behind the `native` feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use posecam::{CameraView, ConsoleNotifier, MockMediaDevices, ResourceManager, ViewConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (resources, _warnings) = ResourceManager::exclusive();
//!     let host = Arc::new(MockMediaDevices::new(resources));
//!
//!     let mut view = CameraView::new(ViewConfig::default(), host, Arc::new(ConsoleNotifier));
//!     let mut events = view.subscribe();
//!
//!     view.mount()?;
//!     view.settled().await;
//!     while let Some(event) = events.try_next() {
//!         println!("View event: {:?}", event);
//!     }
//!
//!     view.unmount();
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use posecam_core::{
    CoreError, CoreResult, DeviceLease, ResourceLimits, ResourceManager, ResourceUsage,
    ResourceWarning, WarningSeverity,
};

pub use posecam_media::{
    ConstrainFacingMode, ConstrainULong, ErrorCategory, FacingMode, MediaDevices, MediaError,
    MediaStream, MediaStreamConstraints, MediaStreamTrack, MockCamera, MockMediaDevices,
    TrackState, VideoConstraints, VideoResolution,
};

#[cfg(feature = "native")]
pub use posecam_media::NativeMediaDevices;

#[cfg(feature = "diagnostics")]
pub use posecam_diagnostics::{DebugLogger, DiagnosticLog, DiagnosticRecord};

// Public API modules
pub mod config;
pub mod error;
pub mod event;
pub mod notify;
pub mod surface;
pub mod view;

// Re-export main API types
pub use config::{Locale, ViewConfig};
pub use error::DeviceAcquisitionFailure;
pub use event::{EventStream, ViewEvent};
pub use notify::{ConsoleNotifier, Notifier, RecordingNotifier};
pub use surface::{DrawSurface, NetworkChannelSlot, PlaybackSurface, SurfaceLayout};
pub use view::{CameraView, ViewState};

//! # posecam core
//!
//! Error types and camera resource management shared by the posecam crates.
//! Hosts lease capture devices from a [`ResourceManager`] so that a stream
//! which is never stopped keeps its camera visibly locked.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod resource;

// Re-export main types
pub use error::{CoreError, CoreResult};
pub use resource::{
    DeviceLease, LeaseInfo, ResourceLimits, ResourceManager, ResourceUsage, ResourceWarning,
    WarningSeverity,
};

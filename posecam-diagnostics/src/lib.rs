//! # posecam diagnostics
//!
//! Logging setup and an in-memory diagnostic channel. Everything in posecam
//! reports through `tracing`; this crate decides where those events go.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod debug_logger;
pub mod diagnostic_log;

// Re-export main types
pub use debug_logger::DebugLogger;
pub use diagnostic_log::{DiagnosticLog, DiagnosticRecord};

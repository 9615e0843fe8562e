//! Lifecycle events published by a camera view

use posecam_media::ErrorCategory;
use tokio::sync::broadcast;
use tracing::warn;

/// Something that happened to a view's camera
///
/// `generation` identifies the mount the event belongs to; it increases by
/// one on every mount.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// A stream request was issued to the host
    AcquisitionStarted {
        /// Mount generation
        generation: u64,
    },
    /// A stream was bound to the playback surface
    StreamBound {
        /// Mount generation
        generation: u64,
        /// Bound stream
        stream_id: String,
        /// Labels of the stream's tracks
        track_labels: Vec<String>,
    },
    /// The host refused or failed the request
    AcquisitionFailed {
        /// Mount generation
        generation: u64,
        /// Host failure category
        category: ErrorCategory,
        /// Host-supplied reason
        reason: String,
        /// Whether the user was notified
        notified: bool,
    },
    /// The bound stream was stopped on teardown
    StreamReleased {
        /// Mount generation
        generation: u64,
        /// Released stream
        stream_id: String,
        /// Tracks ended by the release
        tracks_stopped: usize,
    },
    /// A stream resolved after teardown and was stopped without binding
    LateStreamStopped {
        /// Mount generation
        generation: u64,
        /// Stopped stream
        stream_id: String,
        /// Tracks ended
        tracks_stopped: usize,
    },
    /// The view was unmounted
    Unmounted {
        /// Mount generation
        generation: u64,
    },
}

impl ViewEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            ViewEvent::AcquisitionStarted { .. } => "acquisition_started",
            ViewEvent::StreamBound { .. } => "stream_bound",
            ViewEvent::AcquisitionFailed { .. } => "acquisition_failed",
            ViewEvent::StreamReleased { .. } => "stream_released",
            ViewEvent::LateStreamStopped { .. } => "late_stream_stopped",
            ViewEvent::Unmounted { .. } => "unmounted",
        }
    }

    /// Mount generation the event belongs to
    pub fn generation(&self) -> u64 {
        match self {
            ViewEvent::AcquisitionStarted { generation }
            | ViewEvent::StreamBound { generation, .. }
            | ViewEvent::AcquisitionFailed { generation, .. }
            | ViewEvent::StreamReleased { generation, .. }
            | ViewEvent::LateStreamStopped { generation, .. }
            | ViewEvent::Unmounted { generation } => *generation,
        }
    }

    /// Check if this is an error event
    pub fn is_error_event(&self) -> bool {
        matches!(self, ViewEvent::AcquisitionFailed { .. })
    }

    /// Check if this event ended tracks
    pub fn is_release_event(&self) -> bool {
        matches!(
            self,
            ViewEvent::StreamReleased { .. } | ViewEvent::LateStreamStopped { .. }
        )
    }
}

/// Stream of view events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<ViewEvent>,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<ViewEvent>) -> Self {
        Self { receiver }
    }

    /// Get the next event. Returns `None` once the view is gone.
    pub async fn next(&mut self) -> Option<ViewEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, skipped {} event(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Get the next event without waiting
    pub fn try_next(&mut self) -> Option<ViewEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, skipped {} event(s)", skipped);
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain every event already published
    pub fn drain(&mut self) -> Vec<ViewEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

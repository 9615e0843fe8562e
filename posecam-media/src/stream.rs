//! Media streams and tracks
//!
//! A [`MediaStream`] is an owned handle: it is not `Clone`, and dropping it
//! stops every track it still holds. Stopping a track is the only way the
//! underlying capture device is handed back to the host.

use crate::constraints::{FacingMode, VideoResolution};
use crate::error::MediaResult;
use parking_lot::RwLock;
use posecam_core::DeviceLease;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Track kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
}

/// Track lifecycle state. There is no way back from `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

/// Settings the host actually applied to a track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSettings {
    pub device_id: String,
    pub resolution: VideoResolution,
    pub frame_rate: Option<f64>,
    pub facing_mode: Option<FacingMode>,
}

/// Releases whatever a host allocated for a track
pub trait TrackDriver: Send {
    /// Stop the underlying source. Called at most once per track.
    fn stop(&mut self) -> MediaResult<()>;
}

#[derive(Debug)]
struct TrackShared {
    state: RwLock<TrackState>,
    stop_count: AtomicU32,
}

/// Read-only view of a track's state, kept by hosts and diagnostics
#[derive(Debug, Clone)]
pub struct TrackProbe {
    id: String,
    shared: Arc<TrackShared>,
}

impl TrackProbe {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TrackState {
        *self.shared.state.read()
    }

    pub fn is_live(&self) -> bool {
        self.state() == TrackState::Live
    }

    /// How many times the track transitioned to `Ended` (0 or 1)
    pub fn stop_count(&self) -> u32 {
        self.shared.stop_count.load(Ordering::SeqCst)
    }
}

/// A single live media source
pub struct MediaStreamTrack {
    id: String,
    kind: TrackKind,
    label: String,
    settings: TrackSettings,
    started_at: Instant,
    shared: Arc<TrackShared>,
    driver: Option<Box<dyn TrackDriver>>,
    lease: Option<DeviceLease>,
}

impl std::fmt::Debug for MediaStreamTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStreamTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("settings", &self.settings)
            .field("state", &self.state())
            .field("driver", &self.driver.is_some())
            .field("lease", &self.lease.as_ref().map(|l| l.id()))
            .finish()
    }
}

impl MediaStreamTrack {
    /// Create a live video track
    pub fn video(
        label: impl Into<String>,
        settings: TrackSettings,
        driver: Box<dyn TrackDriver>,
        lease: Option<DeviceLease>,
    ) -> Self {
        let track = Self {
            id: Uuid::new_v4().to_string(),
            kind: TrackKind::Video,
            label: label.into(),
            settings,
            started_at: Instant::now(),
            shared: Arc::new(TrackShared {
                state: RwLock::new(TrackState::Live),
                stop_count: AtomicU32::new(0),
            }),
            driver: Some(driver),
            lease,
        };
        debug!("Created video track {} ({})", track.id, track.label);
        track
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn settings(&self) -> &TrackSettings {
        &self.settings
    }

    pub fn state(&self) -> TrackState {
        *self.shared.state.read()
    }

    pub fn is_live(&self) -> bool {
        self.state() == TrackState::Live
    }

    pub fn probe(&self) -> TrackProbe {
        TrackProbe {
            id: self.id.clone(),
            shared: self.shared.clone(),
        }
    }

    /// Stop the track and release its device.
    ///
    /// Returns `true` if this call ended the track, `false` if it had already
    /// ended. Driver failures are logged; the track is ended regardless.
    pub fn stop(&mut self) -> bool {
        {
            let mut state = self.shared.state.write();
            if *state == TrackState::Ended {
                return false;
            }
            *state = TrackState::Ended;
        }
        self.shared.stop_count.fetch_add(1, Ordering::SeqCst);

        if let Some(mut driver) = self.driver.take() {
            if let Err(e) = driver.stop() {
                warn!("Track {} driver failed to stop cleanly: {}", self.id, e);
            }
        }
        if let Some(mut lease) = self.lease.take() {
            lease.release();
        }

        info!(
            "Stopped {:?} track {} ({}) after {:?}",
            self.kind,
            self.id,
            self.label,
            self.started_at.elapsed()
        );
        true
    }
}

impl Drop for MediaStreamTrack {
    fn drop(&mut self) {
        if self.stop() {
            debug!("Track {} stopped on drop", self.id);
        }
    }
}

/// An owned group of tracks returned by a host
#[derive(Debug)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaStreamTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaStreamTrack>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaStreamTrack] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaStreamTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    /// Whether any track is still live
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaStreamTrack::is_live)
    }

    pub fn probes(&self) -> Vec<TrackProbe> {
        self.tracks.iter().map(MediaStreamTrack::probe).collect()
    }

    /// Stop every track individually. Returns how many tracks this call ended.
    pub fn stop_all(&mut self) -> usize {
        let stopped = self
            .tracks
            .iter_mut()
            .map(MediaStreamTrack::stop)
            .filter(|ended| *ended)
            .count();
        if stopped > 0 {
            debug!("Stream {} stopped {} track(s)", self.id, stopped);
        }
        stopped
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        let stopped = self.stop_all();
        if stopped > 0 {
            warn!(
                "Stream {} dropped with {} live track(s); stopped them",
                self.id, stopped
            );
        }
    }
}

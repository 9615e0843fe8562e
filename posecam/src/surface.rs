//! Presentation surfaces owned by a mounted view
//!
//! The playback surface is the only surface that ever holds a stream. The
//! draw surface and the network channel are reserved extension points: they
//! exist so later frame processing has somewhere to attach, and they expose
//! nothing beyond that.

use posecam_media::{MediaStream, VideoResolution};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sizing of a surface inside its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceLayout {
    /// Preferred width in logical pixels
    pub width: Option<u32>,
    /// Upper bound as a percentage of the container width
    pub max_width_percent: Option<u32>,
    /// Whether the surface is displayed at all
    pub visible: bool,
}

impl SurfaceLayout {
    /// 640px wide, never wider than its container
    pub const fn playback() -> Self {
        Self {
            width: Some(640),
            max_width_percent: Some(100),
            visible: true,
        }
    }

    /// Not displayed
    pub const fn hidden() -> Self {
        Self {
            width: None,
            max_width_percent: None,
            visible: false,
        }
    }

    /// Rendered width inside a container `container_width` pixels wide
    pub fn fit_width(&self, container_width: u32) -> u32 {
        if !self.visible {
            return 0;
        }
        let cap = self
            .max_width_percent
            .map(|percent| (container_width as u64 * percent as u64 / 100) as u32);
        match (self.width, cap) {
            (Some(width), Some(cap)) => width.min(cap),
            (Some(width), None) => width,
            (None, Some(cap)) => cap,
            (None, None) => container_width,
        }
    }

    /// Inline style equivalent
    pub fn to_css(&self) -> String {
        if !self.visible {
            return "display: none".to_string();
        }
        let mut rules = Vec::new();
        if let Some(percent) = self.max_width_percent {
            rules.push(format!("max-width: {}%", percent));
        }
        if let Some(width) = self.width {
            rules.push(format!("width: {}px", width));
        }
        rules.join("; ")
    }
}

/// The visible video surface
#[derive(Debug)]
pub struct PlaybackSurface {
    layout: SurfaceLayout,
    autoplay: bool,
    plays_inline: bool,
    muted: bool,
    source: Option<MediaStream>,
    playing: bool,
}

impl PlaybackSurface {
    /// Create a surface configured to start playback without user interaction
    pub fn new(layout: SurfaceLayout) -> Self {
        Self {
            layout,
            autoplay: true,
            plays_inline: true,
            muted: true,
            source: None,
            playing: false,
        }
    }

    /// Surface layout
    pub fn layout(&self) -> SurfaceLayout {
        self.layout
    }

    /// Starts playing as soon as a source is set
    pub fn autoplay(&self) -> bool {
        self.autoplay
    }

    /// Plays inside the page instead of fullscreen
    pub fn plays_inline(&self) -> bool {
        self.plays_inline
    }

    /// Audio output is muted
    pub fn muted(&self) -> bool {
        self.muted
    }

    /// Whether playback is running
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// The bound stream, if any
    pub fn source(&self) -> Option<&MediaStream> {
        self.source.as_ref()
    }

    /// Identifier of the bound stream, if any
    pub fn source_id(&self) -> Option<&str> {
        self.source.as_ref().map(MediaStream::id)
    }

    /// Whether the surface is allowed to start on its own
    fn can_autoplay(&self) -> bool {
        // Unmuted autoplay is blocked by host policy
        self.autoplay && self.muted
    }

    /// Bind `stream` as the source. Returns a previously bound stream.
    pub(crate) fn bind(&mut self, stream: MediaStream) -> Option<MediaStream> {
        let previous = self.source.replace(stream);
        self.playing = self.can_autoplay();
        debug!(
            "Playback surface bound to stream {} (playing: {})",
            self.source_id().unwrap_or_default(),
            self.playing
        );
        previous
    }

    /// Detach the source and stop playback
    pub(crate) fn unbind(&mut self) -> Option<MediaStream> {
        self.playing = false;
        self.source.take()
    }

    /// Negotiated resolution of the bound video track
    pub fn video_resolution(&self) -> Option<VideoResolution> {
        self.source
            .as_ref()
            .and_then(|s| s.video_tracks().next())
            .map(|t| t.settings().resolution)
    }
}

/// Hidden drawing target kept for future frame processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawSurface {
    layout: SurfaceLayout,
    width: u32,
    height: u32,
}

impl DrawSurface {
    /// Create a reserved surface. Dimensions follow the requested resolution.
    pub fn reserved(layout: SurfaceLayout, resolution: VideoResolution) -> Self {
        Self {
            layout,
            width: resolution.width,
            height: resolution.height,
        }
    }

    /// Always true; nothing reads or writes this surface
    pub fn is_reserved(&self) -> bool {
        true
    }

    /// Surface layout
    pub fn layout(&self) -> SurfaceLayout {
        self.layout
    }

    /// Backing dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Slot for a channel that would carry frames off-device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkChannelSlot {
    /// Declared, never connected
    #[default]
    Reserved,
}

impl NetworkChannelSlot {
    /// Always false
    pub fn is_connected(&self) -> bool {
        false
    }
}

//! Configuration types and defaults

use crate::surface::SurfaceLayout;
use posecam_media::MediaStreamConstraints;

/// Language used for user-facing notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    /// Japanese
    #[default]
    Japanese,
    /// English
    English,
}

impl Locale {
    /// Notification shown when the camera cannot be acquired
    pub fn camera_failure_message(&self, reason: &str) -> String {
        match self {
            Locale::Japanese => format!("カメラへのアクセスに失敗しました: {}", reason),
            Locale::English => format!("Failed to access camera: {}", reason),
        }
    }

    /// BCP 47 tag
    pub fn tag(&self) -> &'static str {
        match self {
            Locale::Japanese => "ja",
            Locale::English => "en",
        }
    }
}

/// Camera view configuration
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Constraints sent to the host on every mount
    pub constraints: MediaStreamConstraints,
    /// Notification language
    pub locale: Locale,
    /// Page heading
    pub heading: String,
    /// Outer container padding in logical pixels
    pub container_padding: u32,
    /// Layout of the visible playback surface
    pub playback_layout: SurfaceLayout,
    /// Layout of the reserved draw surface
    pub draw_layout: SurfaceLayout,
    /// Capacity of the view event channel
    pub event_capacity: usize,
    /// Enable debug logging
    pub debug_logging: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            constraints: MediaStreamConstraints::front_camera_vga(),
            locale: Locale::default(),
            heading: "Pose Detection".to_string(),
            container_padding: 20,
            playback_layout: SurfaceLayout::playback(),
            draw_layout: SurfaceLayout::hidden(),
            event_capacity: 64,
            debug_logging: false,
        }
    }
}

impl ViewConfig {
    /// Set the acquisition constraints
    pub fn with_constraints(mut self, constraints: MediaStreamConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Set the notification language
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Set the page heading
    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = heading.into();
        self
    }

    /// Set the playback surface layout
    pub fn with_playback_layout(mut self, layout: SurfaceLayout) -> Self {
        self.playback_layout = layout;
        self
    }

    /// Enable debug logging
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Log filter directives matching `debug_logging`
    pub fn log_filter(&self) -> &'static str {
        if self.debug_logging {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_page() {
        let config = ViewConfig::default();
        assert_eq!(config.locale, Locale::Japanese);
        assert_eq!(config.heading, "Pose Detection");
        assert_eq!(config.container_padding, 20);
        assert_eq!(config.constraints, MediaStreamConstraints::default());
        assert_eq!(config.playback_layout.fit_width(1024), 640);
        assert!(!config.draw_layout.visible);
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            Locale::English.camera_failure_message("Permission denied"),
            "Failed to access camera: Permission denied"
        );
        assert_eq!(
            Locale::Japanese.camera_failure_message("Permission denied"),
            "カメラへのアクセスに失敗しました: Permission denied"
        );
    }

    #[test]
    fn test_builder() {
        let config = ViewConfig::default()
            .with_locale(Locale::English)
            .with_heading("Camera")
            .with_debug_logging(true);
        assert_eq!(config.locale.tag(), "en");
        assert_eq!(config.heading, "Camera");
        assert_eq!(config.log_filter(), "debug");
    }
}

//! Capture constraints
//!
//! Constraints are built once and then passed by reference to the host; there
//! are no setters after construction. Their serde form is the JSON request a
//! browser-style host expects, e.g.
//! `{"video":{"width":{"ideal":640},"height":{"ideal":480},"facingMode":"user"}}`.

use crate::error::{MediaError, MediaResult};
use serde::{Deserialize, Serialize};

/// Ideal width requested by default
pub const DEFAULT_IDEAL_WIDTH: u32 = 640;
/// Ideal height requested by default
pub const DEFAULT_IDEAL_HEIGHT: u32 = 480;

/// Video resolution information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoResolution {
    pub width: u32,
    pub height: u32,
}

impl VideoResolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const VGA: Self = Self::new(640, 480);
    pub const HD: Self = Self::new(1280, 720);
    pub const FULL_HD: Self = Self::new(1920, 1080);
}

/// Which way a camera faces relative to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera, facing the user
    User,
    /// Rear camera, facing away from the user
    Environment,
    Left,
    Right,
}

impl FacingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
            FacingMode::Left => "left",
            FacingMode::Right => "right",
        }
    }
}

/// Numeric constraint with soft (`ideal`) and hard (`exact`, `min`, `max`) parts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstrainULong {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ideal: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

impl ConstrainULong {
    pub fn ideal(value: u32) -> Self {
        Self {
            ideal: Some(value),
            ..Self::default()
        }
    }

    pub fn exact(value: u32) -> Self {
        Self {
            exact: Some(value),
            ..Self::default()
        }
    }

    pub fn range(min: u32, max: u32) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::default()
        }
    }

    /// Check the hard bounds. `ideal` never rejects a value.
    pub fn admits(&self, value: u32) -> bool {
        self.exact.map_or(true, |exact| value == exact)
            && self.min.map_or(true, |min| value >= min)
            && self.max.map_or(true, |max| value <= max)
    }

    /// Value a host should aim for when it can choose freely
    pub fn target(&self) -> Option<u32> {
        self.exact.or(self.ideal).or(self.min).or(self.max)
    }

    /// Relative distance from the ideal, in `[0, 1)`
    fn fitness_distance(&self, value: u32) -> f64 {
        match self.ideal {
            Some(ideal) if ideal != value => {
                let diff = (ideal as f64 - value as f64).abs();
                diff / ideal.max(value) as f64
            }
            _ => 0.0,
        }
    }
}

/// Facing-mode constraint; the bare value form means "ideal"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstrainFacingMode {
    Ideal(FacingMode),
    Exact { exact: FacingMode },
}

impl ConstrainFacingMode {
    pub fn mode(&self) -> FacingMode {
        match self {
            ConstrainFacingMode::Ideal(mode) | ConstrainFacingMode::Exact { exact: mode } => *mode,
        }
    }

    pub fn admits(&self, facing: Option<FacingMode>) -> bool {
        match self {
            ConstrainFacingMode::Ideal(_) => true,
            ConstrainFacingMode::Exact { exact } => facing == Some(*exact),
        }
    }

    pub fn prefers(&self, facing: Option<FacingMode>) -> bool {
        facing == Some(self.mode())
    }
}

/// Video part of a capture request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    width: Option<ConstrainULong>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<ConstrainULong>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    facing_mode: Option<ConstrainFacingMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,
}

impl VideoConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_width(mut self, width: ConstrainULong) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_height(mut self, height: ConstrainULong) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_facing_mode(mut self, facing_mode: ConstrainFacingMode) -> Self {
        self.facing_mode = Some(facing_mode);
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    // Getters
    pub fn width(&self) -> Option<&ConstrainULong> {
        self.width.as_ref()
    }

    pub fn height(&self) -> Option<&ConstrainULong> {
        self.height.as_ref()
    }

    pub fn facing_mode(&self) -> Option<&ConstrainFacingMode> {
        self.facing_mode.as_ref()
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Resolution a host should request when it can pick any size
    pub fn target_resolution(&self) -> VideoResolution {
        VideoResolution::new(
            self.width
                .and_then(|w| w.target())
                .unwrap_or(DEFAULT_IDEAL_WIDTH),
            self.height
                .and_then(|h| h.target())
                .unwrap_or(DEFAULT_IDEAL_HEIGHT),
        )
    }

    /// Pick the supported resolution closest to the ideal that meets every
    /// hard bound.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Overconstrained` naming `width` or `height` when
    /// no supported resolution satisfies the hard bounds.
    pub fn select_resolution(&self, supported: &[VideoResolution]) -> MediaResult<VideoResolution> {
        let width = self.width.unwrap_or_default();
        let height = self.height.unwrap_or_default();

        if supported.is_empty() {
            return Ok(self.target_resolution());
        }

        if !supported.iter().any(|r| width.admits(r.width)) {
            return Err(overconstrained("width"));
        }

        supported
            .iter()
            .filter(|r| width.admits(r.width) && height.admits(r.height))
            .min_by(|a, b| {
                let da = width.fitness_distance(a.width) + height.fitness_distance(a.height);
                let db = width.fitness_distance(b.width) + height.fitness_distance(b.height);
                da.total_cmp(&db)
            })
            .copied()
            .ok_or_else(|| overconstrained("height"))
    }
}

fn overconstrained(constraint: &str) -> MediaError {
    MediaError::Overconstrained {
        constraint: constraint.to_string(),
        reason: "Constraints could not be satisfied by available devices.".to_string(),
    }
}

/// A complete capture request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStreamConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    video: Option<VideoConstraints>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    audio: bool,
}

impl MediaStreamConstraints {
    /// Video-only request
    pub fn video(video: VideoConstraints) -> Self {
        Self {
            video: Some(video),
            audio: false,
        }
    }

    /// Preferred 640x480 front camera, video only
    pub fn front_camera_vga() -> Self {
        Self::video(
            VideoConstraints::new()
                .with_width(ConstrainULong::ideal(DEFAULT_IDEAL_WIDTH))
                .with_height(ConstrainULong::ideal(DEFAULT_IDEAL_HEIGHT))
                .with_facing_mode(ConstrainFacingMode::Ideal(FacingMode::User)),
        )
    }

    pub fn video_constraints(&self) -> Option<&VideoConstraints> {
        self.video.as_ref()
    }

    pub fn wants_audio(&self) -> bool {
        self.audio
    }

    /// Reject requests that ask for nothing
    pub fn validate(&self) -> MediaResult<()> {
        if self.video.is_none() && !self.audio {
            return Err(MediaError::InvalidConfiguration {
                message: "At least one of audio and video must be requested".to_string(),
            });
        }
        Ok(())
    }

    /// JSON form of the request, as sent to a browser-style host
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for MediaStreamConstraints {
    fn default() -> Self {
        Self::front_camera_vga()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request_shape() {
        let constraints = MediaStreamConstraints::default();
        let json: serde_json::Value = serde_json::from_str(&constraints.to_json()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "video": {
                    "width": { "ideal": 640 },
                    "height": { "ideal": 480 },
                    "facingMode": "user"
                }
            })
        );
    }

    #[test]
    fn test_exact_facing_mode_shape() {
        let video = VideoConstraints::new().with_facing_mode(ConstrainFacingMode::Exact {
            exact: FacingMode::Environment,
        });
        let json = serde_json::to_value(MediaStreamConstraints::video(video)).unwrap();
        assert_eq!(json["video"]["facingMode"]["exact"], "environment");
    }

    #[test]
    fn test_parse_request() {
        let parsed: MediaStreamConstraints = serde_json::from_str(
            r#"{"video":{"width":{"ideal":640},"height":{"ideal":480},"facingMode":"user"}}"#,
        )
        .unwrap();
        assert_eq!(parsed, MediaStreamConstraints::default());
        assert!(!parsed.wants_audio());
    }

    #[test]
    fn test_select_closest_to_ideal() {
        let video = MediaStreamConstraints::default().video_constraints().cloned().unwrap();
        let supported = [VideoResolution::FULL_HD, VideoResolution::HD, VideoResolution::VGA];
        assert_eq!(video.select_resolution(&supported).unwrap(), VideoResolution::VGA);

        let supported = [VideoResolution::FULL_HD, VideoResolution::HD];
        assert_eq!(video.select_resolution(&supported).unwrap(), VideoResolution::HD);
    }

    #[test]
    fn test_select_handles_extreme_sizes() {
        let huge = VideoResolution::new(u32::MAX, u32::MAX);
        let video = VideoConstraints::new()
            .with_width(ConstrainULong::ideal(u32::MAX))
            .with_height(ConstrainULong::ideal(u32::MAX));
        let supported = [VideoResolution::VGA, huge];
        assert_eq!(video.select_resolution(&supported).unwrap(), huge);

        let video = MediaStreamConstraints::default().video_constraints().cloned().unwrap();
        assert_eq!(video.select_resolution(&supported).unwrap(), VideoResolution::VGA);
    }

    #[test]
    fn test_select_rejects_unsatisfiable_exact() {
        let video = VideoConstraints::new()
            .with_width(ConstrainULong::exact(3840))
            .with_height(ConstrainULong::ideal(2160));
        let err = video
            .select_resolution(&[VideoResolution::VGA, VideoResolution::HD])
            .unwrap_err();
        match err {
            MediaError::Overconstrained { constraint, .. } => assert_eq!(constraint, "width"),
            other => panic!("Expected Overconstrained, got {:?}", other),
        }

        let video = VideoConstraints::new()
            .with_width(ConstrainULong::exact(640))
            .with_height(ConstrainULong::range(700, 800));
        let err = video.select_resolution(&[VideoResolution::VGA]).unwrap_err();
        assert!(matches!(err, MediaError::Overconstrained { ref constraint, .. } if constraint == "height"));
    }

    #[test]
    fn test_validate_empty_request() {
        let empty: MediaStreamConstraints = serde_json::from_str("{}").unwrap();
        assert!(empty.validate().is_err());
        assert!(MediaStreamConstraints::default().validate().is_ok());
    }
}

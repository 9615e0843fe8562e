//! Scriptable in-process host
//!
//! `MockMediaDevices` behaves like a browser host with a fixed set of cameras.
//! Tests and demos script it: deny the next requests, hold requests pending
//! until released, and inspect every stream it handed out through
//! [`TrackProbe`]s.

use crate::constraints::{FacingMode, MediaStreamConstraints, VideoResolution};
use crate::devices::{MediaDeviceInfo, MediaDeviceKind, MediaDevices};
use crate::error::{MediaError, MediaResult};
use crate::stream::{MediaStream, MediaStreamTrack, TrackDriver, TrackProbe, TrackSettings};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use posecam_core::ResourceManager;
use tokio::sync::watch;
use tracing::{debug, info};

/// A simulated camera
#[derive(Debug, Clone)]
pub struct MockCamera {
    pub device_id: String,
    pub label: String,
    pub facing_mode: Option<FacingMode>,
    pub supported_resolutions: Vec<VideoResolution>,
    pub frame_rate: f64,
}

impl MockCamera {
    /// Front-facing camera supporting VGA, HD and Full HD
    pub fn front(label: &str) -> Self {
        Self {
            device_id: format!("mock:{}", label),
            label: label.to_string(),
            facing_mode: Some(FacingMode::User),
            supported_resolutions: vec![
                VideoResolution::VGA,
                VideoResolution::HD,
                VideoResolution::FULL_HD,
            ],
            frame_rate: 30.0,
        }
    }

    /// Rear-facing camera supporting HD and Full HD
    pub fn rear(label: &str) -> Self {
        Self {
            device_id: format!("mock:{}", label),
            label: label.to_string(),
            facing_mode: Some(FacingMode::Environment),
            supported_resolutions: vec![VideoResolution::HD, VideoResolution::FULL_HD],
            frame_rate: 30.0,
        }
    }
}

/// Record of a stream the mock handed out
#[derive(Debug, Clone)]
pub struct IssuedStream {
    pub stream_id: String,
    pub device_id: String,
    pub track_labels: Vec<String>,
    pub probes: Vec<TrackProbe>,
}

impl IssuedStream {
    /// Whether any track of the stream is still live
    pub fn is_live(&self) -> bool {
        self.probes.iter().any(TrackProbe::is_live)
    }
}

struct MockTrackDriver {
    device_id: String,
}

impl TrackDriver for MockTrackDriver {
    fn stop(&mut self) -> MediaResult<()> {
        debug!("Mock camera {} stopped", self.device_id);
        Ok(())
    }
}

/// Mock host for tests and hosts without capture hardware
pub struct MockMediaDevices {
    cameras: Vec<MockCamera>,
    resources: ResourceManager,
    denial: RwLock<Option<MediaError>>,
    gate: watch::Sender<bool>,
    requests: Mutex<Vec<MediaStreamConstraints>>,
    issued: Mutex<Vec<IssuedStream>>,
}

impl std::fmt::Debug for MockMediaDevices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockMediaDevices")
            .field("cameras", &self.cameras)
            .field("denial", &*self.denial.read())
            .field("held", &!*self.gate.borrow())
            .field("requests", &self.requests.lock().len())
            .field("issued", &self.issued.lock().len())
            .finish()
    }
}

impl MockMediaDevices {
    /// Host with a single front camera labelled `cam0`
    pub fn new(resources: ResourceManager) -> Self {
        Self::with_cameras(resources, vec![MockCamera::front("cam0")])
    }

    pub fn with_cameras(resources: ResourceManager, cameras: Vec<MockCamera>) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            cameras,
            resources,
            denial: RwLock::new(None),
            gate,
            requests: Mutex::new(Vec::new()),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Fail every following request with `error`
    pub fn deny(&self, error: MediaError) {
        *self.denial.write() = Some(error);
    }

    /// Stop failing requests
    pub fn allow(&self) {
        *self.denial.write() = None;
    }

    /// Keep following requests pending until [`resume`](Self::resume)
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Let pending and future requests resolve
    pub fn resume(&self) {
        self.gate.send_replace(true);
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<MediaStreamConstraints> {
        self.requests.lock().clone()
    }

    /// Every stream handed out, in order
    pub fn issued(&self) -> Vec<IssuedStream> {
        self.issued.lock().clone()
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    fn select_camera(&self, constraints: &MediaStreamConstraints) -> MediaResult<&MockCamera> {
        let not_found = || MediaError::DeviceNotFound {
            reason: "Requested device not found".to_string(),
        };

        let video = constraints.video_constraints().ok_or_else(not_found)?;
        if self.cameras.is_empty() {
            return Err(not_found());
        }

        let mut candidates: Vec<&MockCamera> = self.cameras.iter().collect();
        if let Some(device_id) = video.device_id() {
            candidates.retain(|c| c.device_id == device_id);
            if candidates.is_empty() {
                return Err(MediaError::Overconstrained {
                    constraint: "deviceId".to_string(),
                    reason: "Constraints could not be satisfied by available devices.".to_string(),
                });
            }
        }

        if let Some(facing) = video.facing_mode() {
            candidates.retain(|c| facing.admits(c.facing_mode));
            if candidates.is_empty() {
                return Err(MediaError::Overconstrained {
                    constraint: "facingMode".to_string(),
                    reason: "Constraints could not be satisfied by available devices.".to_string(),
                });
            }
            if let Some(preferred) = candidates
                .iter()
                .copied()
                .find(|c| facing.prefers(c.facing_mode))
            {
                return Ok(preferred);
            }
        }

        Ok(candidates[0])
    }
}

#[async_trait]
impl MediaDevices for MockMediaDevices {
    async fn get_user_media(&self, constraints: &MediaStreamConstraints) -> MediaResult<MediaStream> {
        self.requests.lock().push(constraints.clone());
        debug!("Mock getUserMedia request: {}", constraints.to_json());

        // Permission prompt; resolves immediately unless the test holds it
        let mut gate = self.gate.subscribe();
        let opened = gate.wait_for(|open| *open).await.is_ok();
        if !opened {
            return Err(MediaError::Aborted {
                reason: "Host shut down".to_string(),
            });
        }
        tokio::task::yield_now().await;

        constraints.validate()?;
        let denial = self.denial.read().clone();
        if let Some(error) = denial {
            return Err(error);
        }

        let camera = self.select_camera(constraints)?;
        let video = constraints.video_constraints().cloned().unwrap_or_default();
        let resolution = video.select_resolution(&camera.supported_resolutions)?;
        let lease = self
            .resources
            .acquire(&camera.device_id)
            .map_err(MediaError::from_lease_error)?;

        let settings = TrackSettings {
            device_id: camera.device_id.clone(),
            resolution,
            frame_rate: Some(camera.frame_rate),
            facing_mode: camera.facing_mode,
        };
        let track = MediaStreamTrack::video(
            camera.label.clone(),
            settings,
            Box::new(MockTrackDriver {
                device_id: camera.device_id.clone(),
            }),
            Some(lease),
        );
        let stream = MediaStream::new(vec![track]);

        self.issued.lock().push(IssuedStream {
            stream_id: stream.id().to_string(),
            device_id: camera.device_id.clone(),
            track_labels: stream.tracks().iter().map(|t| t.label().to_string()).collect(),
            probes: stream.probes(),
        });

        info!(
            "Mock camera {} granted at {}x{}",
            camera.label, resolution.width, resolution.height
        );
        Ok(stream)
    }

    fn enumerate_devices(&self) -> MediaResult<Vec<MediaDeviceInfo>> {
        Ok(self
            .cameras
            .iter()
            .map(|c| MediaDeviceInfo {
                device_id: c.device_id.clone(),
                kind: MediaDeviceKind::VideoInput,
                label: c.label.clone(),
                facing_mode: c.facing_mode,
            })
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{ConstrainFacingMode, ConstrainULong, VideoConstraints};

    fn host() -> MockMediaDevices {
        let (resources, _warnings) = ResourceManager::exclusive();
        MockMediaDevices::with_cameras(
            resources,
            vec![MockCamera::rear("back"), MockCamera::front("cam0")],
        )
    }

    #[tokio::test]
    async fn test_prefers_requested_facing_mode() {
        let host = host();
        let stream = host
            .get_user_media(&MediaStreamConstraints::default())
            .await
            .unwrap();

        let track = &stream.tracks()[0];
        assert_eq!(track.label(), "cam0");
        assert_eq!(track.settings().resolution, VideoResolution::VGA);
        assert_eq!(track.settings().facing_mode, Some(FacingMode::User));
    }

    #[tokio::test]
    async fn test_exact_facing_mode_mismatch() {
        let (resources, _warnings) = ResourceManager::exclusive();
        let host = MockMediaDevices::new(resources);
        let constraints = MediaStreamConstraints::video(
            VideoConstraints::new().with_facing_mode(ConstrainFacingMode::Exact {
                exact: FacingMode::Environment,
            }),
        );

        let err = host.get_user_media(&constraints).await.unwrap_err();
        assert!(matches!(err, MediaError::Overconstrained { .. }));
        assert!(host.issued().is_empty());
    }

    #[tokio::test]
    async fn test_busy_camera_rejected() {
        let host = host();
        let constraints = MediaStreamConstraints::default();
        let first = host.get_user_media(&constraints).await.unwrap();

        let err = host.get_user_media(&constraints).await.unwrap_err();
        assert_eq!(err.reason(), crate::error::DEVICE_IN_USE_REASON);

        drop(first);
        assert!(host.get_user_media(&constraints).await.is_ok());
    }

    #[tokio::test]
    async fn test_unsatisfiable_resolution() {
        let host = host();
        let constraints = MediaStreamConstraints::video(
            VideoConstraints::new()
                .with_width(ConstrainULong::exact(4096))
                .with_facing_mode(ConstrainFacingMode::Ideal(FacingMode::User)),
        );
        let err = host.get_user_media(&constraints).await.unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Overconstrained);
        assert!(!host.resources().is_held("mock:cam0"));
    }

    #[test]
    fn test_enumerate_devices() {
        let devices = host().enumerate_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| d.kind == MediaDeviceKind::VideoInput));
    }
}

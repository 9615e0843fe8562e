//! Native capture host backed by nokhwa
//!
//! Each granted stream owns one capture thread. The thread opens the camera,
//! reports the negotiated format back, then keeps draining frames until the
//! track is stopped, at which point it closes the stream and exits. The
//! camera handle never leaves its thread.

use crate::constraints::{FacingMode, MediaStreamConstraints, VideoResolution};
use crate::devices::{MediaDeviceInfo, MediaDeviceKind, MediaDevices};
use crate::error::{MediaError, MediaResult};
use crate::stream::{MediaStream, MediaStreamTrack, TrackDriver, TrackSettings};
use async_trait::async_trait;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use posecam_core::{DeviceLease, ResourceManager};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

const BACKEND: &str = "nokhwa";
const DEFAULT_FRAME_RATE: u32 = 30;

/// Format the capture thread ended up with
#[derive(Debug, Clone, Copy)]
struct Negotiated {
    resolution: VideoResolution,
    frame_rate: u32,
}

/// Stops a capture thread. The device lease is returned once the thread
/// has closed the camera.
struct NativeTrackDriver {
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
    lease: Option<DeviceLease>,
    frames: Arc<AtomicU64>,
}

impl NativeTrackDriver {
    fn join(
        handle: JoinHandle<()>,
        lease: Option<DeviceLease>,
        frames: &AtomicU64,
    ) -> MediaResult<()> {
        let joined = handle.join();
        drop(lease);
        joined.map_err(|_| MediaError::Backend {
            backend: BACKEND.to_string(),
            message: "capture thread panicked".to_string(),
        })?;

        debug!(
            "Capture thread finished after {} frames",
            frames.load(Ordering::Relaxed)
        );
        Ok(())
    }
}

impl TrackDriver for NativeTrackDriver {
    fn stop(&mut self) -> MediaResult<()> {
        // Dropping the sender also wakes the thread
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }

        let lease = self.lease.take();
        let Some(handle) = self.thread_handle.take() else {
            return Ok(());
        };

        // A frame read in progress delays the join; keep it off async workers
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let frames = self.frames.clone();
                runtime.spawn_blocking(move || {
                    if let Err(e) = Self::join(handle, lease, &frames) {
                        warn!("Capture thread did not stop cleanly: {}", e);
                    }
                });
                Ok(())
            }
            Err(_) => Self::join(handle, lease, &self.frames),
        }
    }
}

/// Host that opens real cameras through nokhwa
#[derive(Debug, Clone)]
pub struct NativeMediaDevices {
    resources: ResourceManager,
    backend: ApiBackend,
}

impl NativeMediaDevices {
    pub fn new(resources: ResourceManager) -> Self {
        Self {
            resources,
            backend: ApiBackend::Auto,
        }
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    fn camera_index(device_id: &str) -> CameraIndex {
        match device_id.parse::<u32>() {
            Ok(index) => CameraIndex::Index(index),
            Err(_) => CameraIndex::String(device_id.to_string()),
        }
    }

    /// Blocking device query
    fn query(backend: ApiBackend) -> MediaResult<Vec<MediaDeviceInfo>> {
        let cameras = nokhwa::query(backend).map_err(|e| Self::classify(e.to_string()))?;
        Ok(cameras
            .into_iter()
            .map(|info| MediaDeviceInfo {
                device_id: info.index().to_string(),
                kind: MediaDeviceKind::VideoInput,
                label: info.human_name(),
                facing_mode: Some(FacingMode::User),
            })
            .collect())
    }

    async fn query_devices(&self) -> MediaResult<Vec<MediaDeviceInfo>> {
        let backend = self.backend;
        tokio::task::spawn_blocking(move || Self::query(backend))
            .await
            .map_err(|e| MediaError::Backend {
                backend: BACKEND.to_string(),
                message: format!("device query failed: {}", e),
            })?
    }

    /// Map a nokhwa failure onto the host error categories
    fn classify(message: String) -> MediaError {
        let lower = message.to_lowercase();
        if lower.contains("permission") || lower.contains("denied") || lower.contains("authoriz") {
            MediaError::PermissionDenied { reason: message }
        } else if lower.contains("not found") || lower.contains("no such") {
            MediaError::DeviceNotFound { reason: message }
        } else if lower.contains("busy") || lower.contains("in use") {
            MediaError::NotReadable { reason: message }
        } else {
            MediaError::Backend {
                backend: BACKEND.to_string(),
                message,
            }
        }
    }

    /// Capture thread body
    fn capture_loop(
        index: CameraIndex,
        target: VideoResolution,
        ready_tx: oneshot::Sender<MediaResult<Negotiated>>,
        stop_rx: std_mpsc::Receiver<()>,
        frames: Arc<AtomicU64>,
    ) {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(target.width, target.height),
                FrameFormat::MJPEG,
                DEFAULT_FRAME_RATE,
            ),
        ));

        let mut camera = match Camera::new(index, requested) {
            Ok(camera) => camera,
            Err(e) => {
                let _ = ready_tx.send(Err(Self::classify(e.to_string())));
                return;
            }
        };

        if let Err(e) = camera.open_stream() {
            let _ = ready_tx.send(Err(Self::classify(e.to_string())));
            return;
        }

        let resolution = camera.resolution();
        let negotiated = Negotiated {
            resolution: VideoResolution::new(resolution.width(), resolution.height()),
            frame_rate: camera.frame_rate(),
        };

        if ready_tx.send(Ok(negotiated)).is_err() {
            // Requester vanished before the stream was handed over
            let _ = camera.stop_stream();
            return;
        }

        let frame_interval = Duration::from_millis(1000 / negotiated.frame_rate.max(1) as u64);
        loop {
            match stop_rx.recv_timeout(frame_interval) {
                Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                Err(std_mpsc::RecvTimeoutError::Timeout) => {}
            }

            match camera.frame() {
                Ok(_) => {
                    frames.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    error!("Frame read failed: {}", e);
                    break;
                }
            }
        }

        if let Err(e) = camera.stop_stream() {
            warn!("Failed to stop camera stream: {}", e);
        }
    }
}

#[async_trait]
impl MediaDevices for NativeMediaDevices {
    async fn get_user_media(&self, constraints: &MediaStreamConstraints) -> MediaResult<MediaStream> {
        constraints.validate()?;
        let video = constraints
            .video_constraints()
            .cloned()
            .ok_or_else(|| MediaError::DeviceNotFound {
                reason: "Requested device not found".to_string(),
            })?;

        // Desktop webcams face the user
        if let Some(facing) = video.facing_mode() {
            if !facing.admits(Some(FacingMode::User)) {
                return Err(MediaError::Overconstrained {
                    constraint: "facingMode".to_string(),
                    reason: "Constraints could not be satisfied by available devices.".to_string(),
                });
            }
        }

        let devices = self.query_devices().await?;
        let device_id = match video.device_id() {
            Some(id) => id.to_string(),
            None => devices
                .first()
                .map(|d| d.device_id.clone())
                .ok_or_else(|| MediaError::DeviceNotFound {
                    reason: "Requested device not found".to_string(),
                })?,
        };

        let lease = self
            .resources
            .acquire(&device_id)
            .map_err(MediaError::from_lease_error)?;

        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();
        let frames = Arc::new(AtomicU64::new(0));
        let index = Self::camera_index(&device_id);
        let target = video.target_resolution();
        let thread_frames = frames.clone();

        let thread_handle = thread::Builder::new()
            .name(format!("posecam-capture-{}", device_id))
            .spawn(move || Self::capture_loop(index, target, ready_tx, stop_rx, thread_frames))
            .map_err(|e| MediaError::Backend {
                backend: BACKEND.to_string(),
                message: format!("failed to spawn capture thread: {}", e),
            })?;

        let negotiated = match ready_rx.await {
            Ok(Ok(negotiated)) => negotiated,
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread_handle.join();
                return Err(MediaError::Backend {
                    backend: BACKEND.to_string(),
                    message: "capture thread exited during startup".to_string(),
                });
            }
        };

        let label = devices
            .into_iter()
            .find(|d| d.device_id == device_id)
            .map(|d| d.label)
            .unwrap_or_else(|| device_id.clone());

        let track = MediaStreamTrack::video(
            label,
            TrackSettings {
                device_id: device_id.clone(),
                resolution: negotiated.resolution,
                frame_rate: Some(negotiated.frame_rate as f64),
                facing_mode: Some(FacingMode::User),
            },
            Box::new(NativeTrackDriver {
                stop_tx: Some(stop_tx),
                thread_handle: Some(thread_handle),
                lease: Some(lease),
                frames,
            }),
            None,
        );

        // Closest-format negotiation may land outside hard bounds
        for (name, constraint, actual) in [
            ("width", video.width(), negotiated.resolution.width),
            ("height", video.height(), negotiated.resolution.height),
        ] {
            if constraint.is_some_and(|c| !c.admits(actual)) {
                drop(track);
                return Err(MediaError::Overconstrained {
                    constraint: name.to_string(),
                    reason: "Constraints could not be satisfied by available devices.".to_string(),
                });
            }
        }

        info!(
            "Opened camera {} at {}x{} @ {}fps",
            device_id,
            negotiated.resolution.width,
            negotiated.resolution.height,
            negotiated.frame_rate
        );
        Ok(MediaStream::new(vec![track]))
    }

    fn enumerate_devices(&self) -> MediaResult<Vec<MediaDeviceInfo>> {
        Self::query(self.backend)
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

//! The camera view component
//!
//! A [`CameraView`] acquires one camera stream per mount, binds it to its
//! playback surface and stops it on every teardown path: [`unmount`],
//! [`release`] or drop.
//!
//! Acquisition runs as a detached task. Host requests cannot be aborted once
//! issued, so teardown never cancels that task; instead it marks the mount as
//! torn down and the task stops whatever stream eventually arrives.
//!
//! [`unmount`]: CameraView::unmount
//! [`release`]: CameraView::release

use crate::config::ViewConfig;
use crate::error::DeviceAcquisitionFailure;
use crate::event::{EventStream, ViewEvent};
use crate::notify::Notifier;
use crate::surface::{DrawSurface, NetworkChannelSlot, PlaybackSurface};
use parking_lot::Mutex;
use posecam_core::{CoreError, CoreResult};
use posecam_media::{MediaDevices, MediaStream, MediaStreamConstraints, VideoResolution};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Whether a stream is currently bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// No stream held
    Idle,
    /// Stream held and bound to the playback surface
    Active,
}

/// Per-mount state shared with the acquisition task
#[derive(Debug)]
struct MountShared {
    torn_down: bool,
    playback: PlaybackSurface,
    draw: DrawSurface,
}

#[derive(Debug)]
struct Mount {
    generation: u64,
    shared: Arc<Mutex<MountShared>>,
    task: Option<JoinHandle<()>>,
}

/// Everything the acquisition task needs, moved into it
struct Acquisition {
    generation: u64,
    devices: Arc<dyn MediaDevices>,
    constraints: MediaStreamConstraints,
    shared: Arc<Mutex<MountShared>>,
    notifier: Arc<dyn Notifier>,
    events: broadcast::Sender<ViewEvent>,
    config: ViewConfig,
}

impl Acquisition {
    async fn run(self) {
        let _ = self.events.send(ViewEvent::AcquisitionStarted {
            generation: self.generation,
        });
        debug!(
            "Requesting camera from {} host: {}",
            self.devices.backend_name(),
            self.constraints.to_json()
        );

        match self.devices.get_user_media(&self.constraints).await {
            Ok(stream) => self.bind(stream),
            Err(e) => self.fail(DeviceAcquisitionFailure::from(e)),
        }
    }

    fn bind(self, stream: MediaStream) {
        let mut shared = self.shared.lock();
        if shared.torn_down {
            drop(shared);
            self.stop_late(stream);
            return;
        }

        let stream_id = stream.id().to_string();
        let track_labels: Vec<String> = stream
            .tracks()
            .iter()
            .map(|t| t.label().to_string())
            .collect();
        let previous = shared.playback.bind(stream);
        drop(shared);
        // One acquisition per mount, and every mount starts with a fresh surface
        debug_assert!(previous.is_none(), "playback surface was already bound");

        info!(
            "Camera started successfully: stream {} ({})",
            stream_id,
            track_labels.join(", ")
        );
        let _ = self.events.send(ViewEvent::StreamBound {
            generation: self.generation,
            stream_id,
            track_labels,
        });
    }

    fn stop_late(self, mut stream: MediaStream) {
        let stream_id = stream.id().to_string();
        let tracks_stopped = stream.stop_all();
        info!(
            "Stream {} resolved after teardown of mount {}; stopped {} track(s)",
            stream_id, self.generation, tracks_stopped
        );
        drop(stream);

        let _ = self.events.send(ViewEvent::LateStreamStopped {
            generation: self.generation,
            stream_id,
            tracks_stopped,
        });
    }

    fn fail(self, failure: DeviceAcquisitionFailure) {
        error!(
            "Camera access error ({}): {}",
            failure.category, failure.reason
        );

        // The notification blocks; never hold the mount lock across it
        let torn_down = self.shared.lock().torn_down;
        let notified = !torn_down;
        if notified {
            let message = self.config.locale.camera_failure_message(&failure.reason);
            self.notifier.notify(&message);
        } else {
            debug!("Mount {} already torn down; not notifying", self.generation);
        }

        let _ = self.events.send(ViewEvent::AcquisitionFailed {
            generation: self.generation,
            category: failure.category,
            reason: failure.reason,
            notified,
        });
    }
}

/// A view that presents one camera stream while mounted
pub struct CameraView {
    config: ViewConfig,
    devices: Arc<dyn MediaDevices>,
    notifier: Arc<dyn Notifier>,
    events: broadcast::Sender<ViewEvent>,
    network: NetworkChannelSlot,
    mount: Option<Mount>,
    detached: Vec<JoinHandle<()>>,
    generation: u64,
}

impl std::fmt::Debug for CameraView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraView")
            .field("config", &self.config)
            .field("backend", &self.devices.backend_name())
            .field("generation", &self.generation)
            .field("mounted", &self.mount.is_some())
            .field("state", &self.state())
            .field("detached", &self.detached.len())
            .finish()
    }
}

impl CameraView {
    /// Create an unmounted view
    pub fn new(
        config: ViewConfig,
        devices: Arc<dyn MediaDevices>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            devices,
            notifier,
            events,
            network: NetworkChannelSlot::Reserved,
            mount: None,
            detached: Vec::new(),
            generation: 0,
        }
    }

    /// Mount the view and start acquiring the camera.
    ///
    /// Returns as soon as the request is issued; the stream is bound (or the
    /// failure reported) when the host answers. Must be called inside a tokio
    /// runtime.
    pub fn mount(&mut self) -> CoreResult<()> {
        if let Some(mount) = &self.mount {
            return Err(CoreError::InvalidState {
                expected: "unmounted".to_string(),
                actual: format!("mounted (generation {})", mount.generation),
            });
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            CoreError::Initialization {
                reason: format!("CameraView::mount requires a tokio runtime: {}", e),
            }
        })?;
        self.reap_detached();

        self.generation += 1;
        let generation = self.generation;
        let constraints = self.config.constraints.clone();
        let draw_resolution = constraints
            .video_constraints()
            .map(|v| v.target_resolution())
            .unwrap_or(VideoResolution::VGA);

        let shared = Arc::new(Mutex::new(MountShared {
            torn_down: false,
            playback: PlaybackSurface::new(self.config.playback_layout),
            draw: DrawSurface::reserved(self.config.draw_layout, draw_resolution),
        }));

        let acquisition = Acquisition {
            generation,
            devices: self.devices.clone(),
            constraints,
            shared: shared.clone(),
            notifier: self.notifier.clone(),
            events: self.events.clone(),
            config: self.config.clone(),
        };
        let task = runtime.spawn(acquisition.run());

        info!("Mounted camera view (generation {})", generation);
        self.mount = Some(Mount {
            generation,
            shared,
            task: Some(task),
        });
        Ok(())
    }

    /// Stop every track of the held stream.
    ///
    /// Marks the current mount as torn down, so a stream still in flight is
    /// stopped when it arrives instead of being bound. Calling this again, or
    /// with no stream held, is a no-op. Returns how many tracks were ended.
    pub fn release(&mut self) -> usize {
        let Some(mount) = &self.mount else {
            return 0;
        };

        let released = {
            let mut shared = mount.shared.lock();
            shared.torn_down = true;
            shared.playback.unbind()
        };
        let Some(mut stream) = released else {
            return 0;
        };

        let stream_id = stream.id().to_string();
        let tracks_stopped = stream.stop_all();
        drop(stream);

        info!(
            "Released stream {} ({} track(s) stopped)",
            stream_id, tracks_stopped
        );
        let _ = self.events.send(ViewEvent::StreamReleased {
            generation: mount.generation,
            stream_id,
            tracks_stopped,
        });
        tracks_stopped
    }

    /// Release the camera and discard this mount's surfaces.
    ///
    /// Returns `false` if the view was not mounted.
    pub fn unmount(&mut self) -> bool {
        self.release();
        let Some(mut mount) = self.mount.take() else {
            return false;
        };

        if let Some(task) = mount.task.take() {
            if !task.is_finished() {
                debug!(
                    "Acquisition for mount {} still pending; leaving it to finish",
                    mount.generation
                );
                self.detached.push(task);
            }
        }

        info!("Unmounted camera view (generation {})", mount.generation);
        let _ = self.events.send(ViewEvent::Unmounted {
            generation: mount.generation,
        });
        true
    }

    /// Wait for every acquisition this view has started to finish.
    pub async fn settled(&mut self) {
        let mut tasks: Vec<JoinHandle<()>> = self.detached.drain(..).collect();
        if let Some(task) = self.mount.as_mut().and_then(|m| m.task.take()) {
            tasks.push(task);
        }

        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                error!("Acquisition task failed: {}", e);
            }
        }
    }

    /// Current state
    pub fn state(&self) -> ViewState {
        match &self.mount {
            Some(mount) if mount.shared.lock().playback.source().is_some() => ViewState::Active,
            _ => ViewState::Idle,
        }
    }

    /// Whether the view is mounted
    pub fn is_mounted(&self) -> bool {
        self.mount.is_some()
    }

    /// Generation of the current or most recent mount, 0 before the first
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Inspect the playback surface of the current mount
    pub fn with_playback<R>(&self, f: impl FnOnce(&PlaybackSurface) -> R) -> Option<R> {
        self.mount.as_ref().map(|m| f(&m.shared.lock().playback))
    }

    /// Id of the stream bound to the playback surface
    pub fn playback_source_id(&self) -> Option<String> {
        self.with_playback(|p| p.source_id().map(str::to_string))
            .flatten()
    }

    /// Reserved draw surface of the current mount
    pub fn draw_surface(&self) -> Option<DrawSurface> {
        self.mount.as_ref().map(|m| m.shared.lock().draw.clone())
    }

    /// Reserved network channel
    pub fn network_channel(&self) -> NetworkChannelSlot {
        self.network
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// View configuration
    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    fn reap_detached(&mut self) {
        self.detached.retain(|task| !task.is_finished());
    }
}

impl Drop for CameraView {
    fn drop(&mut self) {
        if self.unmount() {
            debug!("Camera view dropped while mounted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use posecam_core::ResourceManager;
    use posecam_media::MockMediaDevices;

    fn view() -> (CameraView, Arc<MockMediaDevices>, Arc<RecordingNotifier>) {
        let (resources, _warnings) = ResourceManager::exclusive();
        let host = Arc::new(MockMediaDevices::new(resources));
        let notifier = Arc::new(RecordingNotifier::new());
        let view = CameraView::new(ViewConfig::default(), host.clone(), notifier.clone());
        (view, host, notifier)
    }

    #[test]
    fn test_mount_requires_runtime() {
        let (mut view, host, _notifier) = view();
        let err = view.mount().unwrap_err();
        assert!(matches!(err, CoreError::Initialization { .. }));
        assert!(!view.is_mounted());
        assert!(host.requests().is_empty());
    }

    #[tokio::test]
    async fn test_double_mount_rejected() {
        let (mut view, _host, _notifier) = view();
        view.mount().unwrap();
        let err = view.mount().unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
        assert_eq!(view.generation(), 1);
        view.settled().await;
    }

    #[tokio::test]
    async fn test_release_without_mount_is_noop() {
        let (mut view, _host, _notifier) = view();
        assert_eq!(view.release(), 0);
        assert!(!view.unmount());
        assert_eq!(view.state(), ViewState::Idle);
    }

    #[tokio::test]
    async fn test_draw_surface_follows_requested_resolution() {
        let (mut view, _host, _notifier) = view();
        assert!(view.draw_surface().is_none());

        view.mount().unwrap();
        let draw = view.draw_surface().unwrap();
        assert!(draw.is_reserved());
        assert_eq!(draw.dimensions(), (640, 480));
        assert!(!view.network_channel().is_connected());
        view.settled().await;
    }
}

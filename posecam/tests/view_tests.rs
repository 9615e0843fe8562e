//! Integration tests for the camera view lifecycle
//!
//! Every test runs on a current-thread runtime so that acquisition tasks
//! spawned by the view report into the same thread-local diagnostic log.

use posecam::*;
use posecam_diagnostics::DiagnosticLog;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::subscriber::DefaultGuard;
use tracing::Level;
use tracing_subscriber::prelude::*;

const DEFAULT_REQUEST: &str =
    r#"{"video":{"width":{"ideal":640},"height":{"ideal":480},"facingMode":"user"}}"#;

struct Harness {
    host: Arc<MockMediaDevices>,
    notifier: Arc<RecordingNotifier>,
    log: DiagnosticLog,
    _guard: DefaultGuard,
}

impl Harness {
    fn new() -> Self {
        let log = DiagnosticLog::new();
        let guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(log.clone()));
        let (resources, _warnings) = ResourceManager::exclusive();
        Self {
            host: Arc::new(MockMediaDevices::new(resources)),
            notifier: Arc::new(RecordingNotifier::new()),
            log,
            _guard: guard,
        }
    }

    fn view(&self, config: ViewConfig) -> CameraView {
        CameraView::new(config, self.host.clone(), self.notifier.clone())
    }

    fn english_view(&self) -> CameraView {
        self.view(ViewConfig::default().with_locale(Locale::English))
    }
}

fn event_types(events: &mut EventStream) -> Vec<&'static str> {
    events.drain().iter().map(ViewEvent::event_type).collect()
}

// ============================================================================
// ACQUISITION TESTS
// ============================================================================

#[tokio::test]
async fn test_cam0_stream_is_bound_and_playing() {
    let harness = Harness::new();
    let mut view = harness.english_view();
    let mut events = view.subscribe();

    view.mount().unwrap();
    view.settled().await;

    let requests = harness.host.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].to_json(), DEFAULT_REQUEST);

    let issued = harness.host.issued();
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].track_labels, vec!["cam0".to_string()]);

    assert_eq!(view.state(), ViewState::Active);
    assert_eq!(view.playback_source_id(), Some(issued[0].stream_id.clone()));
    let (autoplay, inline, muted, playing) = view
        .with_playback(|p| (p.autoplay(), p.plays_inline(), p.muted(), p.is_playing()))
        .unwrap();
    assert!(autoplay && inline && muted && playing);

    assert!(harness.log.contains("Camera started successfully"));
    assert_eq!(harness.notifier.count(), 0);
    assert_eq!(event_types(&mut events), vec!["acquisition_started", "stream_bound"]);
}

#[tokio::test]
async fn test_custom_constraints_reach_host() {
    let harness = Harness::new();
    let constraints = MediaStreamConstraints::video(
        VideoConstraints::new()
            .with_width(ConstrainULong::ideal(1280))
            .with_height(ConstrainULong::ideal(720))
            .with_facing_mode(ConstrainFacingMode::Ideal(FacingMode::User)),
    );
    let mut view = harness.view(ViewConfig::default().with_constraints(constraints.clone()));

    view.mount().unwrap();
    view.settled().await;

    assert_eq!(harness.host.requests(), vec![constraints]);
    assert_eq!(
        view.with_playback(|p| p.video_resolution()).flatten(),
        Some(VideoResolution::HD)
    );
    assert_eq!(view.draw_surface().unwrap().dimensions(), (1280, 720));
}

// ============================================================================
// FAILURE TESTS
// ============================================================================

#[tokio::test]
async fn test_permission_denied_notifies_once() {
    let harness = Harness::new();
    harness.host.deny(MediaError::PermissionDenied {
        reason: "Permission denied".to_string(),
    });
    let mut view = harness.english_view();
    let mut events = view.subscribe();

    view.mount().unwrap();
    view.settled().await;

    assert_eq!(
        harness.notifier.messages(),
        vec!["Failed to access camera: Permission denied".to_string()]
    );
    assert_eq!(view.state(), ViewState::Idle);
    assert_eq!(view.playback_source_id(), None);
    assert!(harness.host.issued().is_empty());

    let errors = harness.log.records_at(Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("Permission denied"));

    let failed: Vec<_> = events.drain().into_iter().filter(|e| e.is_error_event()).collect();
    assert_eq!(
        failed,
        vec![ViewEvent::AcquisitionFailed {
            generation: 1,
            category: ErrorCategory::PermissionDenied,
            reason: "Permission denied".to_string(),
            notified: true,
        }]
    );
}

#[tokio::test]
async fn test_default_locale_is_japanese() {
    let harness = Harness::new();
    harness.host.deny(MediaError::PermissionDenied {
        reason: "Permission denied".to_string(),
    });
    let mut view = harness.view(ViewConfig::default());

    view.mount().unwrap();
    view.settled().await;

    assert_eq!(
        harness.notifier.messages(),
        vec!["カメラへのアクセスに失敗しました: Permission denied".to_string()]
    );
}

/// Holds every notification on screen for a while
struct SlowNotifier {
    entered: Arc<Notify>,
    hold: Duration,
}

impl Notifier for SlowNotifier {
    fn notify(&self, _message: &str) {
        self.entered.notify_one();
        std::thread::sleep(self.hold);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_open_notification_does_not_block_view() {
    let (resources, _warnings) = ResourceManager::exclusive();
    let host = Arc::new(MockMediaDevices::new(resources));
    host.deny(MediaError::PermissionDenied {
        reason: "Permission denied".to_string(),
    });
    let entered = Arc::new(Notify::new());
    let notifier = Arc::new(SlowNotifier {
        entered: entered.clone(),
        hold: Duration::from_millis(800),
    });
    let mut view = CameraView::new(ViewConfig::default(), host, notifier);

    view.mount().unwrap();
    tokio::time::timeout(Duration::from_secs(5), entered.notified())
        .await
        .unwrap();

    let started = Instant::now();
    assert_eq!(view.state(), ViewState::Idle);
    assert_eq!(view.playback_source_id(), None);
    assert_eq!(view.release(), 0);
    assert!(started.elapsed() < Duration::from_millis(400));

    view.settled().await;
}

#[tokio::test]
async fn test_failure_is_not_retried() {
    let harness = Harness::new();
    harness.host.deny(MediaError::DeviceNotFound {
        reason: "Requested device not found".to_string(),
    });
    let mut view = harness.english_view();

    view.mount().unwrap();
    view.settled().await;
    harness.host.allow();
    tokio::task::yield_now().await;

    assert_eq!(harness.host.requests().len(), 1);
    assert_eq!(view.state(), ViewState::Idle);
    assert_eq!(harness.notifier.count(), 1);
}

#[tokio::test]
async fn test_busy_camera_fails_second_view() {
    let harness = Harness::new();
    let mut first = harness.english_view();
    let mut second = harness.english_view();

    first.mount().unwrap();
    first.settled().await;
    second.mount().unwrap();
    second.settled().await;

    assert_eq!(first.state(), ViewState::Active);
    assert_eq!(second.state(), ViewState::Idle);
    assert_eq!(
        harness.notifier.messages(),
        vec!["Failed to access camera: Could not start video source".to_string()]
    );

    // Releasing the first view frees the camera for a fresh mount
    first.unmount();
    second.unmount();
    second.mount().unwrap();
    second.settled().await;
    assert_eq!(second.state(), ViewState::Active);
}

// ============================================================================
// RELEASE TESTS
// ============================================================================

#[tokio::test]
async fn test_unmount_stops_every_track() {
    let harness = Harness::new();
    let mut view = harness.english_view();
    let mut events = view.subscribe();

    view.mount().unwrap();
    view.settled().await;
    assert!(view.unmount());

    let issued = harness.host.issued();
    assert!(!issued[0].is_live());
    assert!(issued[0].probes.iter().all(|p| p.state() == TrackState::Ended));
    assert!(!harness.host.resources().is_held("mock:cam0"));
    assert_eq!(view.state(), ViewState::Idle);
    assert!(view.with_playback(|_| ()).is_none());

    assert_eq!(
        event_types(&mut events),
        vec!["acquisition_started", "stream_bound", "stream_released", "unmounted"]
    );
}

#[tokio::test]
async fn test_double_release_stops_tracks_once() {
    let harness = Harness::new();
    let mut view = harness.english_view();

    view.mount().unwrap();
    view.settled().await;

    assert_eq!(view.release(), 1);
    assert_eq!(view.release(), 0);
    assert!(view.unmount());
    assert!(!view.unmount());
    drop(view);

    let issued = harness.host.issued();
    assert_eq!(issued[0].probes[0].stop_count(), 1);
}

#[tokio::test]
async fn test_drop_releases_camera() {
    let harness = Harness::new();
    let mut view = harness.english_view();

    view.mount().unwrap();
    view.settled().await;
    assert!(harness.host.resources().is_held("mock:cam0"));

    drop(view);
    assert!(!harness.host.issued()[0].is_live());
    assert!(!harness.host.resources().is_held("mock:cam0"));
}

// ============================================================================
// TEARDOWN RACE TESTS
// ============================================================================

#[tokio::test]
async fn test_stream_resolving_after_teardown_is_stopped() {
    let harness = Harness::new();
    harness.host.hold();
    let mut view = harness.english_view();
    let mut events = view.subscribe();

    view.mount().unwrap();
    tokio::task::yield_now().await;
    assert_eq!(harness.host.requests().len(), 1);
    assert!(harness.host.issued().is_empty());

    assert!(view.unmount());
    harness.host.resume();
    view.settled().await;

    let issued = harness.host.issued();
    assert_eq!(issued.len(), 1);
    assert!(!issued[0].is_live());
    assert_eq!(issued[0].probes[0].stop_count(), 1);
    assert!(!harness.host.resources().is_held("mock:cam0"));
    assert_eq!(view.playback_source_id(), None);

    let types = event_types(&mut events);
    assert!(types.contains(&"late_stream_stopped"));
    assert!(!types.contains(&"stream_bound"));
    assert_eq!(harness.notifier.count(), 0);
}

#[tokio::test]
async fn test_failure_after_teardown_is_only_logged() {
    let harness = Harness::new();
    harness.host.hold();
    harness.host.deny(MediaError::PermissionDenied {
        reason: "Permission denied".to_string(),
    });
    let mut view = harness.english_view();
    let mut events = view.subscribe();

    view.mount().unwrap();
    view.unmount();
    harness.host.resume();
    view.settled().await;

    assert_eq!(harness.notifier.count(), 0);
    assert_eq!(harness.log.records_at(Level::ERROR).len(), 1);
    assert!(events.drain().iter().any(|e| matches!(
        e,
        ViewEvent::AcquisitionFailed { notified: false, .. }
    )));
}

#[tokio::test]
async fn test_rapid_remount_leaves_one_live_stream() {
    let harness = Harness::new();
    harness.host.hold();
    let mut view = harness.english_view();

    view.mount().unwrap();
    view.unmount();
    view.mount().unwrap();
    harness.host.resume();
    view.settled().await;

    assert_eq!(view.generation(), 2);
    assert_eq!(view.state(), ViewState::Active);
    assert_eq!(harness.notifier.count(), 0);

    let live: Vec<_> = harness
        .host
        .issued()
        .into_iter()
        .filter(|s| s.is_live())
        .collect();
    assert_eq!(live.len(), 1);
    assert_eq!(view.playback_source_id(), Some(live[0].stream_id.clone()));
}

#[tokio::test]
async fn test_remount_gets_fresh_surfaces() {
    let harness = Harness::new();
    let mut view = harness.english_view();

    view.mount().unwrap();
    view.settled().await;
    let first = view.playback_source_id().unwrap();
    view.unmount();

    view.mount().unwrap();
    assert_eq!(view.playback_source_id(), None);
    view.settled().await;
    let second = view.playback_source_id().unwrap();

    assert_ne!(first, second);
    let issued = harness.host.issued();
    assert_eq!(issued.len(), 2);
    assert!(!issued[0].is_live());
    assert!(issued[1].is_live());
}

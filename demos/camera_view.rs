//! Camera View Demo
//!
//! Mounts a camera view against a host, prints its lifecycle events, then
//! walks through a denied request and a teardown that races a pending
//! request. Uses the mock host unless built with `--features native`.

use anyhow::Context;
use posecam::{
    CameraView, ConsoleNotifier, DebugLogger, DiagnosticLog, Locale, MediaDevices, MediaError,
    MockMediaDevices, ResourceManager, ViewConfig, ViewEvent,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ViewConfig::default().with_locale(Locale::English);

    // Initialize logging
    let log = DiagnosticLog::with_capacity(256);
    DebugLogger::new()
        .with_filter(config.log_filter())
        .with_diagnostic_log(log.clone())
        .init()
        .context("failed to initialize logging")?;

    println!("🎥 posecam Camera View Demo");
    println!("===========================");
    println!(
        "{} (container padding {}px, playback {})",
        config.heading,
        config.container_padding,
        config.playback_layout.to_css()
    );

    let (resources, mut warnings) = ResourceManager::exclusive();

    // Demo 1: Mount against the selected host
    println!("\n📹 Demo 1: Mount and present the camera");
    let host = select_host(resources.clone());
    for device in host.enumerate_devices()? {
        println!("   • {} ({})", device.label, device.device_id);
    }
    demo_mount(config.clone(), host).await?;

    // Demo 2: Permission denied
    println!("\n🚫 Demo 2: Permission denied");
    demo_denied(config.clone(), resources.clone()).await?;

    // Demo 3: Teardown before the host answers
    println!("\n⏱️  Demo 3: Unmount while the request is pending");
    demo_teardown_race(config, resources.clone()).await?;

    let usage = resources.current_usage();
    println!("\n📊 Camera leases");
    println!("   • active: {}", usage.active_leases);
    println!("   • acquired: {}", usage.total_acquired);
    println!("   • released: {}", usage.total_released);
    println!("   • rejected: {}", usage.rejected);
    while let Ok(warning) = warnings.try_recv() {
        println!(
            "   ⚠️  {:?}: {}",
            warning.severity(),
            warning.recommended_action()
        );
    }

    println!("\n📝 Diagnostic log: {} record(s)", log.len());
    println!("\n✨ Camera view demo completed!");
    Ok(())
}

#[cfg(feature = "native")]
fn select_host(resources: ResourceManager) -> Arc<dyn MediaDevices> {
    println!("Using native capture host");
    Arc::new(posecam::NativeMediaDevices::new(resources))
}

#[cfg(not(feature = "native"))]
fn select_host(resources: ResourceManager) -> Arc<dyn MediaDevices> {
    println!("Using mock capture host (build with --features native for real cameras)");
    Arc::new(MockMediaDevices::new(resources))
}

async fn demo_mount(config: ViewConfig, host: Arc<dyn MediaDevices>) -> anyhow::Result<()> {
    let mut view = CameraView::new(config, host, Arc::new(ConsoleNotifier));
    let mut events = view.subscribe();

    view.mount()?;
    view.settled().await;
    print_events(&mut events);

    if let Some(resolution) = view.with_playback(|p| p.video_resolution()).flatten() {
        println!(
            "   ✅ Playing {}x{} (state: {:?})",
            resolution.width,
            resolution.height,
            view.state()
        );
    }

    view.unmount();
    print_events(&mut events);
    Ok(())
}

async fn demo_denied(config: ViewConfig, resources: ResourceManager) -> anyhow::Result<()> {
    let host = Arc::new(MockMediaDevices::new(resources));
    host.deny(MediaError::PermissionDenied {
        reason: "Permission denied".to_string(),
    });

    let mut view = CameraView::new(config, host, Arc::new(ConsoleNotifier));
    let mut events = view.subscribe();
    view.mount()?;
    view.settled().await;
    print_events(&mut events);
    println!("   State after failure: {:?}", view.state());
    Ok(())
}

async fn demo_teardown_race(config: ViewConfig, resources: ResourceManager) -> anyhow::Result<()> {
    let host = Arc::new(MockMediaDevices::new(resources));
    host.hold();

    let mut view = CameraView::new(config, host.clone(), Arc::new(ConsoleNotifier));
    let mut events = view.subscribe();
    view.mount()?;
    tokio::task::yield_now().await;
    view.unmount();

    host.resume();
    view.settled().await;
    print_events(&mut events);

    let leaked = host.issued().iter().filter(|s| s.is_live()).count();
    println!("   Live streams after teardown: {}", leaked);
    Ok(())
}

fn print_events(events: &mut posecam::EventStream) {
    for event in events.drain() {
        match &event {
            ViewEvent::StreamBound { track_labels, .. } => {
                println!("   📡 {} [{}]", event.event_type(), track_labels.join(", "));
            }
            ViewEvent::AcquisitionFailed { reason, .. } => {
                println!("   ❌ {}: {}", event.event_type(), reason);
            }
            _ => println!("   📡 {}", event.event_type()),
        }
    }
}

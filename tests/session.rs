//! End-to-end tests for `LocationSession`: provider switching, staleness,
//! option reactivity and failure projection.

mod common;

use common::{ScriptedPrompt, SlowSource, StaticWifi};
use locus_tui::credentials::MemoryCredentialStore;
use locus_tui::device::{DeviceLocationProvider, PositionSource};
use locus_tui::ip::IpLocationProvider;
use locus_tui::models::{DeviceSettings, LocationResult, ProviderId, RemoteOptions};
use locus_tui::provider::{ProviderEvent, ProviderRegistry};
use locus_tui::remote::RemoteApiProvider;
use locus_tui::session::{LocationSession, NOTIFICATION_TTL};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

struct Harness {
    session: LocationSession,
    rx: mpsc::UnboundedReceiver<ProviderEvent>,
    ip_server: MockServer,
    _remote_server: MockServer,
    prompt: Arc<ScriptedPrompt>,
}

async fn harness(
    active: ProviderId,
    source: Option<Arc<dyn PositionSource>>,
    device: DeviceSettings,
    remote: RemoteOptions,
) -> Harness {
    let ip_server = MockServer::start().await;
    let remote_server = MockServer::start().await;
    let prompt = Arc::new(ScriptedPrompt::default());
    let client = reqwest::Client::new();

    let registry = ProviderRegistry::new(
        DeviceLocationProvider::new(source),
        RemoteApiProvider::new(
            client.clone(),
            format!("{}/geolocate", remote_server.uri()),
            Arc::new(MemoryCredentialStore::default()),
            prompt.clone(),
            Arc::new(StaticWifi(vec![])),
        ),
        IpLocationProvider::new(client, format!("{}/json/", ip_server.uri())),
    );
    let (tx, rx) = mpsc::unbounded_channel();
    Harness {
        session: LocationSession::new(registry, tx, active, device, remote),
        rx,
        ip_server,
        _remote_server: remote_server,
        prompt,
    }
}

async fn mount_ip(server: &MockServer, status: u16, body: serde_json::Value) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status).set_body_json(&body))
        .mount(server)
        .await;
}

/// Feeds events into the session until it stops loading.
async fn settle(h: &mut Harness) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while h.session.state().loading {
            let event = h.rx.recv().await.expect("event channel closed");
            h.session.handle_event(event);
        }
    })
    .await
    .expect("session did not settle");
}

fn fix(provider: ProviderId, lat: f64) -> LocationResult {
    LocationResult::new(provider, lat, 0.0, 1.0, false)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn ip_provider_end_to_end() {
    let mut h = harness(ProviderId::Device, None, DeviceSettings::default(), RemoteOptions::default()).await;
    mount_ip(&h.ip_server, 200, json!({ "latitude": 48.8, "longitude": 2.3 })).await;

    h.session.switch_provider(ProviderId::Ip);
    assert!(h.session.state().loading);
    settle(&mut h).await;

    let state = h.session.state();
    assert!(!state.loading);
    assert!(state.failure.is_none());
    let result = state.result.as_ref().unwrap();
    assert_eq!(result.latitude, 48.8);
    assert_eq!(result.accuracy_meters, 5000.0);
}

#[tokio::test]
async fn late_result_from_previous_provider_is_discarded() {
    let source: Arc<dyn PositionSource> = Arc::new(SlowSource::new(Duration::from_millis(500), 1.0, 1.0));
    let mut h = harness(ProviderId::Device, Some(source), DeviceSettings::default(), RemoteOptions::default()).await;
    mount_ip(&h.ip_server, 200, json!({ "latitude": 48.8, "longitude": 2.3 })).await;

    h.session.refresh();
    h.session.switch_provider(ProviderId::Ip);
    settle(&mut h).await;
    assert_eq!(h.session.state().result.as_ref().unwrap().latitude, 48.8);

    // The device fix lands afterwards and must not replace the IP result.
    let late = tokio::time::timeout(Duration::from_secs(2), h.rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(late, ProviderEvent::Settled { provider: ProviderId::Device, .. }));
    assert!(!h.session.handle_event(late));
    assert_eq!(h.session.state().result.as_ref().unwrap().provider_id, ProviderId::Ip);
}

#[tokio::test]
async fn events_tagged_with_inactive_provider_are_ignored() {
    let mut h = harness(ProviderId::Ip, None, DeviceSettings::default(), RemoteOptions::default()).await;
    mount_ip(&h.ip_server, 200, json!({ "latitude": 1.0, "longitude": 2.0 })).await;
    h.session.refresh();
    let generation = h.session.generation();

    let stale = ProviderEvent::Update {
        provider: ProviderId::Device,
        generation,
        result: fix(ProviderId::Device, 99.0),
    };
    assert!(!h.session.handle_event(stale));
    assert!(h.session.state().result.is_none());

    settle(&mut h).await;
    assert_eq!(h.session.state().result.as_ref().unwrap().latitude, 1.0);
}

#[tokio::test]
async fn switching_to_active_provider_still_refreshes() {
    let mut h = harness(ProviderId::Ip, None, DeviceSettings::default(), RemoteOptions::default()).await;
    mount_ip(&h.ip_server, 200, json!({ "latitude": 1.0, "longitude": 2.0 })).await;

    h.session.refresh();
    settle(&mut h).await;
    assert!(h.session.state().result.is_some());
    let before = h.session.generation();

    h.session.switch_provider(ProviderId::Ip);
    assert!(h.session.state().loading);
    assert!(h.session.state().result.is_none());
    assert!(h.session.state().failure.is_none());
    assert_eq!(h.session.generation(), before + 1);

    settle(&mut h).await;
    assert_eq!(h.ip_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn failures_are_projected_with_notification() {
    let mut h = harness(ProviderId::Ip, None, DeviceSettings::default(), RemoteOptions::default()).await;
    mount_ip(&h.ip_server, 429, json!({})).await;

    h.session.refresh();
    settle(&mut h).await;

    let state = h.session.state();
    let failure = state.failure.as_ref().unwrap();
    assert_eq!(failure.summary, "Rate limit exceeded");
    assert!(state.result.is_none());
    assert_eq!(state.notification.as_ref().unwrap().message, "Rate limit exceeded");

    h.session.expire_notification(Instant::now());
    assert!(h.session.state().notification.is_some());
    h.session.expire_notification(Instant::now() + NOTIFICATION_TTL);
    assert!(h.session.state().notification.is_none());
    assert!(h.session.state().failure.is_some());
}

#[tokio::test]
async fn remote_without_methods_fails_without_prompt() {
    let remote = RemoteOptions {
        use_wifi: false,
        use_cell: false,
        consider_ip: false,
        ..Default::default()
    };
    let mut h = harness(ProviderId::Device, None, DeviceSettings::default(), remote).await;

    h.session.switch_provider(ProviderId::Remote);
    settle(&mut h).await;

    assert_eq!(
        h.session.state().failure.as_ref().unwrap().summary,
        "No location methods selected"
    );
    assert_eq!(h.prompt.calls(), 0);
}

#[tokio::test]
async fn option_changes_refresh_only_the_active_idle_provider() {
    let remote = RemoteOptions {
        consider_ip: false,
        ..Default::default()
    };
    let mut h = harness(ProviderId::Ip, None, DeviceSettings::default(), remote.clone()).await;
    mount_ip(&h.ip_server, 200, json!({ "latitude": 1.0, "longitude": 2.0 })).await;

    // Remote is not active: stored lazily, nothing starts.
    let ip_on = RemoteOptions {
        consider_ip: true,
        ..remote
    };
    h.session.set_remote_options(ip_on.clone());
    assert!(!h.session.state().loading);
    assert_eq!(h.session.generation(), 0);

    // Same for device settings while IP is active.
    h.session.set_device_settings(DeviceSettings {
        timeout_seconds: 30,
        live_tracking: false,
    });
    assert_eq!(h.session.generation(), 0);

    // Remote active and idle: a change triggers a refresh.
    h.session.switch_provider(ProviderId::Remote);
    settle(&mut h).await;
    let generation = h.session.generation();
    h.session.set_remote_options(RemoteOptions {
        consider_ip: false,
        ..ip_on
    });
    assert_eq!(h.session.generation(), generation + 1);
    assert!(h.session.state().loading);

    // While loading, further changes do not stack refreshes.
    h.session.set_remote_options(RemoteOptions::default());
    assert_eq!(h.session.generation(), generation + 1);
}

#[tokio::test]
async fn live_tracking_status_and_cleanup_on_switch() {
    let source = Arc::new(SlowSource::new(Duration::ZERO, 5.0, 5.0));
    let device = DeviceSettings {
        timeout_seconds: 5,
        live_tracking: true,
    };
    let dyn_source: Arc<dyn PositionSource> = source.clone();
    let mut h = harness(ProviderId::Device, Some(dyn_source), device, RemoteOptions::default()).await;
    mount_ip(&h.ip_server, 200, json!({ "latitude": 1.0, "longitude": 2.0 })).await;

    h.session.refresh();
    assert!(!h.session.is_live_active());
    while source.watch_count() == 0 {
        tokio::task::yield_now().await;
    }
    source.emit(5.0);
    settle(&mut h).await;
    assert!(h.session.is_live_active());
    assert!(h.session.state().result.as_ref().unwrap().is_live);

    // A later reading updates state without a new settlement.
    source.emit(6.0);
    loop {
        let event = h.rx.recv().await.unwrap();
        if h.session.handle_event(event)
            && h.session.state().result.as_ref().unwrap().latitude == 6.0
        {
            break;
        }
    }
    assert!(!h.session.state().loading);

    h.session.switch_provider(ProviderId::Ip);
    assert_eq!(source.watch_count(), 0);
    assert_eq!(*source.cleared.lock().unwrap(), vec![1]);
    assert!(!h.session.is_live_active());
}

#[tokio::test]
async fn device_setting_changes_refresh_the_active_device_provider() {
    let source = Arc::new(SlowSource::new(Duration::ZERO, 5.0, 5.0));
    let dyn_source: Arc<dyn PositionSource> = source.clone();
    let mut h = harness(ProviderId::Device, Some(dyn_source), DeviceSettings::default(), RemoteOptions::default()).await;

    h.session.refresh();
    settle(&mut h).await;
    assert_eq!(source.single_reads.load(std::sync::atomic::Ordering::SeqCst), 1);
    let generation = h.session.generation();

    // Turning live tracking on restarts the acquisition as a watch.
    let live = DeviceSettings {
        timeout_seconds: 10,
        live_tracking: true,
    };
    h.session.set_device_settings(live);
    assert_eq!(h.session.generation(), generation + 1);
    while source.watch_count() == 0 {
        tokio::task::yield_now().await;
    }
    source.emit(5.5);
    settle(&mut h).await;
    assert!(h.session.is_live_active());

    // A timeout change restarts it again and drops the previous watch.
    h.session.set_device_settings(DeviceSettings {
        timeout_seconds: 30,
        ..live
    });
    assert_eq!(h.session.generation(), generation + 2);
    tokio::time::timeout(Duration::from_secs(2), async {
        while source.cleared.lock().unwrap().is_empty() || source.watch_count() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("watch was not replaced");
    assert_eq!(*source.cleared.lock().unwrap(), vec![1]);
    assert_eq!(source.watch_count(), 1);
}

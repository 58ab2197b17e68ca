//! Integration tests for `IpLocationProvider` using wiremock HTTP mocks.

mod common;

use locus_tui::error::ErrorKind;
use locus_tui::ip::{IpLocationProvider, IP_ACCURACY_METERS};
use locus_tui::models::ProviderId;
use locus_tui::provider::LocationProvider;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup(status: u16, body: serde_json::Value) -> (MockServer, IpLocationProvider) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/"))
        .respond_with(ResponseTemplate::new(status).set_body_json(&body))
        .mount(&server)
        .await;
    let provider = IpLocationProvider::new(reqwest::Client::new(), format!("{}/json/", server.uri()));
    (server, provider)
}

#[tokio::test]
async fn resolves_coordinates_with_city_accuracy() {
    let (_server, provider) = setup(200, serde_json::json!({ "latitude": 10, "longitude": 20, "city": "X" })).await;
    let (updates, mut rx) = common::updates(ProviderId::Ip);

    let result = provider.get_location((), updates).await.expect("lookup should succeed");

    assert_eq!(result.latitude, 10.0);
    assert_eq!(result.longitude, 20.0);
    assert_eq!(result.accuracy_meters, IP_ACCURACY_METERS);
    assert_eq!(result.accuracy_meters, 5000.0);
    assert_eq!(result.provider_id, ProviderId::Ip);
    assert!(!result.is_live);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn rate_limit_is_classified() {
    let (_server, provider) = setup(429, serde_json::json!({ "error": true })).await;
    let (updates, _rx) = common::updates(ProviderId::Ip);

    let err = provider.get_location((), updates).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::RateLimited);
    assert_eq!(err.http_status, Some(429));
}

#[tokio::test]
async fn other_statuses_are_ip_service_errors() {
    let (_server, provider) = setup(503, serde_json::json!({})).await;
    let (updates, _rx) = common::updates(ProviderId::Ip);

    let err = provider.get_location((), updates).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::UpstreamError);
    assert_eq!(err.summary, "IP geolocation error");
}

#[tokio::test]
async fn missing_longitude_is_invalid_location_data() {
    let (_server, provider) = setup(200, serde_json::json!({ "latitude": 10 })).await;
    let (updates, _rx) = common::updates(ProviderId::Ip);

    let err = provider.get_location((), updates).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidUpstreamResponse);
    assert_eq!(err.summary, "Invalid location data");
}

#[tokio::test]
async fn unreachable_host_is_network_error() {
    // Nothing listens on the discard port.
    let provider = IpLocationProvider::new(reqwest::Client::new(), "http://127.0.0.1:9/json/");
    let (updates, _rx) = common::updates(ProviderId::Ip);

    let err = provider.get_location((), updates).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NetworkError);
    assert!(err.detail.contains("internet connection"));
}

#[tokio::test]
async fn cleanup_is_a_repeatable_no_op() {
    let (_server, provider) = setup(200, serde_json::json!({})).await;
    provider.cleanup();
    provider.cleanup();
}

//! Network-based location through a remote geolocation API.
//!
//! Combines any of Wi-Fi access points, cellular identity and the caller's
//! IP into one `POST` against a Google-style geolocation endpoint. The API
//! key comes from the injected [`CredentialStore`]; when it is missing or
//! rejected the user is asked for a new one through [`CredentialPrompt`].
//! A rejected key is retried at most once per acquisition.

use crate::credentials::{CredentialPrompt, CredentialStore, PromptReason};
use crate::error::{ErrorKind, LocationError};
use crate::models::{
    ApiErrorBody, GeolocationRequest, GeolocationResponse, LocationResult, ProviderDescriptor,
    ProviderId, RemoteOptions, WifiAccessPoint,
};
use crate::provider::{LocationProvider, UpdateSender};
use crate::wifi::WifiScanner;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/geolocation/v1/geolocate";

/// Minimum access points when Wi-Fi is the only method.
pub const MIN_WIFI_ACCESS_POINTS: usize = 2;

/// Where the acquisition stands with respect to its key.
enum KeyAttempt {
    First(String),
    /// Running with a replacement key after a rejection. No further retry.
    Retry(String),
}

pub struct RemoteApiProvider {
    client: Client,
    endpoint: String,
    credentials: Arc<dyn CredentialStore>,
    prompt: Arc<dyn CredentialPrompt>,
    wifi: Arc<dyn WifiScanner>,
}

impl RemoteApiProvider {
    pub const DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
        id: ProviderId::Remote,
        display_name: "Network (Wi-Fi / cell / IP)",
        description: "Geolocation API using nearby Wi-Fi, cell towers and your IP",
        credential_field: Some("API key"),
    };

    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
        prompt: Arc<dyn CredentialPrompt>,
        wifi: Arc<dyn WifiScanner>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            credentials,
            prompt,
            wifi,
        }
    }

    async fn scan_wifi(&self) -> Vec<WifiAccessPoint> {
        match self.wifi.scan().await {
            Ok(aps) => aps,
            Err(e) => {
                warn!("Wi-Fi scan failed, continuing without access points: {}", e);
                Vec::new()
            }
        }
    }

    async fn ask_for_key(&self, reason: PromptReason) -> Option<String> {
        let key = self.prompt.request_key(reason).await?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        self.credentials.set(key);
        Some(key.to_string())
    }

    async fn send(&self, request: &GeolocationRequest, key: &str) -> Result<LocationResult, LocationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", key)])
            .json(request)
            .send()
            .await
            .map_err(|e| LocationError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .map(|e| e.message)
                .unwrap_or_default();
            return Err(classify_status(status, &message));
        }

        let body: GeolocationResponse = response
            .json()
            .await
            .map_err(|e| LocationError::from_transport(&e))?;
        Ok(LocationResult::new(
            ProviderId::Remote,
            body.location.lat,
            body.location.lng,
            body.accuracy,
            false,
        ))
    }
}

impl LocationProvider for RemoteApiProvider {
    type Request = RemoteOptions;

    fn descriptor(&self) -> ProviderDescriptor {
        Self::DESCRIPTOR
    }

    async fn get_location(
        &self,
        options: RemoteOptions,
        _updates: UpdateSender,
    ) -> Result<LocationResult, LocationError> {
        if !options.use_wifi && !options.use_cell && !options.consider_ip {
            return Err(LocationError::no_methods_selected());
        }

        let (mcc, mnc) = if options.use_cell {
            (
                validate_code(options.mcc.as_deref(), LocationError::invalid_mcc)?,
                validate_code(options.mnc.as_deref(), LocationError::invalid_mnc)?,
            )
        } else {
            (None, None)
        };

        let access_points = if options.use_wifi {
            Some(self.scan_wifi().await)
        } else {
            None
        };
        if let Some(aps) = &access_points {
            if !options.use_cell && !options.consider_ip && aps.len() < MIN_WIFI_ACCESS_POINTS {
                return Err(LocationError::insufficient_data(aps.len()));
            }
        }

        let request = build_request(&options, mcc, mnc, access_points);
        debug!("Geolocation request: {:?}", request);

        let key = match self.credentials.get() {
            Some(key) => key,
            None => self
                .ask_for_key(PromptReason::Missing)
                .await
                .ok_or_else(LocationError::missing_credential)?,
        };

        let mut attempt = KeyAttempt::First(key);
        loop {
            let (key, is_retry) = match &attempt {
                KeyAttempt::First(key) => (key.as_str(), false),
                KeyAttempt::Retry(key) => (key.as_str(), true),
            };
            match self.send(&request, key).await {
                Ok(result) => {
                    info!(
                        "Network geolocation fix ({}, {}) ±{}m",
                        result.latitude, result.longitude, result.accuracy_meters
                    );
                    return Ok(result);
                }
                Err(err) if err.kind == ErrorKind::InvalidCredential => {
                    warn!("API key rejected: {}", err);
                    self.credentials.remove();
                    if is_retry {
                        return Err(err);
                    }
                    match self.ask_for_key(PromptReason::Rejected).await {
                        Some(new_key) => attempt = KeyAttempt::Retry(new_key),
                        None => return Err(err),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn cleanup(&self) {}
}

/// Checks an optional MCC/MNC. Empty counts as absent.
fn validate_code(
    value: Option<&str>,
    invalid: fn(&str) -> LocationError,
) -> Result<Option<u32>, LocationError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(value));
    }
    value.parse().map(Some).map_err(|_| invalid(value))
}

fn build_request(
    options: &RemoteOptions,
    mcc: Option<u32>,
    mnc: Option<u32>,
    wifi_access_points: Option<Vec<WifiAccessPoint>>,
) -> GeolocationRequest {
    let mut request = GeolocationRequest {
        consider_ip: options.consider_ip,
        radio_type: None,
        home_mobile_country_code: None,
        home_mobile_network_code: None,
        carrier: None,
        wifi_access_points,
        cell_towers: None,
    };
    if options.use_cell {
        if let (Some(mcc), Some(mnc)) = (mcc, mnc) {
            request.radio_type = Some(options.radio_type.clone());
            request.home_mobile_country_code = Some(mcc);
            request.home_mobile_network_code = Some(mnc);
            request.carrier = options.carrier.clone().filter(|c| !c.is_empty());
        }
        if !options.cell_towers.is_empty() {
            request.cell_towers = Some(options.cell_towers.clone());
        }
    }
    request
}

fn classify_status(status: StatusCode, message: &str) -> LocationError {
    let code = status.as_u16();
    match status {
        StatusCode::BAD_REQUEST if message.to_lowercase().contains("key") => {
            LocationError::invalid_credential(code, message)
        }
        StatusCode::FORBIDDEN => LocationError::invalid_credential(code, message),
        StatusCode::TOO_MANY_REQUESTS => LocationError::rate_limited(code),
        StatusCode::BAD_REQUEST => LocationError::request_error(code, message),
        _ => LocationError::api_error(code),
    }
}

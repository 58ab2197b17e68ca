//! User location resolution via IP geolocation.
//!
//! Single-shot `GET` against an IP lookup service. The service reports no
//! error radius, so every fix gets the city-level [`IP_ACCURACY_METERS`].

use crate::error::LocationError;
use crate::models::{IpLookupResponse, LocationResult, ProviderDescriptor, ProviderId};
use crate::provider::{LocationProvider, UpdateSender};
use reqwest::{Client, StatusCode};
use tracing::{error, info};

pub const DEFAULT_ENDPOINT: &str = "https://ipapi.co/json/";

/// City-level precision.
pub const IP_ACCURACY_METERS: f64 = 5000.0;

pub struct IpLocationProvider {
    client: Client,
    endpoint: String,
}

impl IpLocationProvider {
    pub const DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
        id: ProviderId::Ip,
        display_name: "IP lookup",
        description: "Approximate, city-level location from your public IP address",
        credential_field: None,
    };

    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    async fn lookup(&self) -> Result<LocationResult, LocationError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| LocationError::from_transport(&e))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(LocationError::rate_limited(429)),
            status if !status.is_success() => {
                return Err(LocationError::ip_service_error(status.as_u16()))
            }
            _ => {}
        }

        let body: IpLookupResponse = response
            .json()
            .await
            .map_err(|e| LocationError::from_transport(&e))?;
        let (Some(latitude), Some(longitude)) = (body.latitude, body.longitude) else {
            return Err(LocationError::invalid_location_data());
        };

        Ok(LocationResult::new(
            ProviderId::Ip,
            latitude,
            longitude,
            IP_ACCURACY_METERS,
            false,
        ))
    }
}

impl LocationProvider for IpLocationProvider {
    type Request = ();

    fn descriptor(&self) -> ProviderDescriptor {
        Self::DESCRIPTOR
    }

    async fn get_location(&self, _request: (), _updates: UpdateSender) -> Result<LocationResult, LocationError> {
        match self.lookup().await {
            Ok(result) => {
                info!("Geolocation successful - ({}, {})", result.latitude, result.longitude);
                Ok(result)
            }
            Err(e) => {
                error!("Error using IP geolocation service: {}", e);
                Err(e)
            }
        }
    }

    fn cleanup(&self) {}
}

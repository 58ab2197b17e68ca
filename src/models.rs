use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Device,
    Remote,
    Ip,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Device, ProviderId::Remote, ProviderId::Ip];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Device => "device",
            ProviderId::Remote => "remote",
            ProviderId::Ip => "ip",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "device" | "gps" => Ok(ProviderId::Device),
            "remote" | "network" => Ok(ProviderId::Remote),
            "ip" => Ok(ProviderId::Ip),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Static metadata used to populate the provider picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub display_name: &'static str,
    pub description: &'static str,
    /// Label of the credential the provider needs, if any.
    pub credential_field: Option<&'static str>,
}

/// One successful location fix.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationResult {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
    pub provider_id: ProviderId,
    pub is_live: bool,
    pub acquired_at: DateTime<Utc>,
}

impl LocationResult {
    pub fn new(
        provider_id: ProviderId,
        latitude: f64,
        longitude: f64,
        accuracy_meters: f64,
        is_live: bool,
    ) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
            provider_id,
            is_live,
            acquired_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub timeout_seconds: u64,
    pub live_tracking: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            live_tracking: false,
        }
    }
}

/// Method selection and network identity for the remote provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteOptions {
    pub use_wifi: bool,
    pub use_cell: bool,
    pub consider_ip: bool,
    pub radio_type: String,
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub carrier: Option<String>,
    #[serde(default)]
    pub cell_towers: Vec<CellTower>,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            use_wifi: false,
            use_cell: false,
            consider_ip: true,
            radio_type: "lte".to_string(),
            mcc: None,
            mnc: None,
            carrier: None,
            cell_towers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiAccessPoint {
    pub mac_address: String,
    pub signal_strength: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellTower {
    pub cell_id: u64,
    pub location_area_code: u32,
    pub mobile_country_code: u32,
    pub mobile_network_code: u32,
}

// Wire shapes of the remote geolocation API.

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeolocationRequest {
    pub consider_ip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radio_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_mobile_country_code: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_mobile_network_code: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi_access_points: Option<Vec<WifiAccessPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_towers: Option<Vec<CellTower>>,
}

#[derive(Debug, Deserialize)]
pub struct GeolocationResponse {
    pub location: LatLng,
    pub accuracy: f64,
}

#[derive(Debug, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    pub error: Option<ApiErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
}

// Wire shape of the IP lookup service. Both fields may be absent.

#[derive(Debug, Deserialize)]
pub struct IpLookupResponse {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

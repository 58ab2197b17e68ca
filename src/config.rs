use crate::models::{CellTower, DeviceSettings, ProviderId, RemoteOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const CONFIG_PATH: &str = "config.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub device: DeviceConfig,
    pub remote: RemoteConfig,
    pub ip: IpConfig,
    pub ui: UiConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub timeout_seconds: u64, // Deadline for a GPS fix
    pub live_tracking: bool,  // Keep streaming fixes after the first
    pub gpsd_addr: String,    // host:port of the gpsd daemon
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub use_wifi: bool,
    pub use_cell: bool,
    pub consider_ip: bool,
    pub radio_type: String, // gsm, cdma, wcdma, lte or nr
    #[serde(default)]
    pub mcc: Option<String>,
    #[serde(default)]
    pub mnc: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    pub credentials_path: String, // File holding the API key
    /// Known serving and neighbouring cells, sent when cellular is enabled.
    #[serde(default)]
    pub cell_towers: Vec<CellTower>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IpConfig {
    pub endpoint: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UiConfig {
    pub default_provider: ProviderId, // "device", "remote" or "ip"
    pub tick_rate_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device: DeviceConfig {
                timeout_seconds: 10,
                live_tracking: false,
                gpsd_addr: "127.0.0.1:2947".to_string(),
            },
            remote: RemoteConfig {
                endpoint: crate::remote::DEFAULT_ENDPOINT.to_string(),
                use_wifi: false,
                use_cell: false,
                consider_ip: true,
                radio_type: "lte".to_string(),
                mcc: None,
                mnc: None,
                carrier: None,
                credentials_path: ".locus_api_key".to_string(),
                cell_towers: Vec::new(),
            },
            ip: IpConfig {
                endpoint: crate::ip::DEFAULT_ENDPOINT.to_string(),
            },
            ui: UiConfig {
                default_provider: ProviderId::Ip,
                tick_rate_ms: 250,
            },
        }
    }
}

impl Config {
    /// Loads config.toml from the root directory.
    /// If it doesn't exist, creates a default one.
    pub fn load() -> Self {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    return Config::default();
                }
            },
            Err(_) => info!("No {} found, writing defaults.", path.display()),
        }

        // Save default config to disk for the user to edit later
        let default_config = Config::default();
        if let Err(e) = default_config.save_to(path) {
            warn!("Could not write default config: {}", e);
        }
        default_config
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> color_eyre::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn device_settings(&self) -> DeviceSettings {
        DeviceSettings {
            timeout_seconds: self.device.timeout_seconds,
            live_tracking: self.device.live_tracking,
        }
    }

    pub fn remote_options(&self) -> RemoteOptions {
        RemoteOptions {
            use_wifi: self.remote.use_wifi,
            use_cell: self.remote.use_cell,
            consider_ip: self.remote.consider_ip,
            radio_type: self.remote.radio_type.clone(),
            mcc: self.remote.mcc.clone(),
            mnc: self.remote.mnc.clone(),
            carrier: self.remote.carrier.clone(),
            cell_towers: self.remote.cell_towers.clone(),
        }
    }

    /// Folds runtime settings back in so they can be saved.
    pub fn apply(&mut self, device: DeviceSettings, remote: &RemoteOptions) {
        self.device.timeout_seconds = device.timeout_seconds;
        self.device.live_tracking = device.live_tracking;
        self.remote.use_wifi = remote.use_wifi;
        self.remote.use_cell = remote.use_cell;
        self.remote.consider_ip = remote.consider_ip;
        self.remote.radio_type = remote.radio_type.clone();
        self.remote.mcc = remote.mcc.clone();
        self.remote.mnc = remote.mnc.clone();
        self.remote.carrier = remote.carrier.clone();
        self.remote.cell_towers = remote.cell_towers.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config::load_from(&path);
        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn parses_user_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.ui.default_provider = ProviderId::Remote;
        config.remote.mcc = Some("310".into());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.ui.default_provider, ProviderId::Remote);
        assert_eq!(loaded.remote_options().mcc.as_deref(), Some("310"));
    }

    #[test]
    fn broken_file_falls_back_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "device = 3").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "device = 3");
    }

    #[test]
    fn cell_towers_reach_remote_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[device]
timeout_seconds = 10
live_tracking = false
gpsd_addr = ""

[remote]
endpoint = "http://localhost/geolocate"
use_wifi = false
use_cell = true
consider_ip = false
radio_type = "gsm"
mcc = "310"
mnc = "410"
credentials_path = ".key"

[[remote.cell_towers]]
cellId = 42
locationAreaCode = 415
mobileCountryCode = 310
mobileNetworkCode = 410

[ip]
endpoint = "http://localhost/json/"

[ui]
default_provider = "remote"
tick_rate_ms = 250
"#,
        )
        .unwrap();

        let options = Config::load_from(&path).remote_options();
        assert_eq!(
            options.cell_towers,
            vec![CellTower {
                cell_id: 42,
                location_area_code: 415,
                mobile_country_code: 310,
                mobile_network_code: 410,
            }]
        );
    }
}

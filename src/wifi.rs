//! Wi-Fi access-point scanning for the network geolocation request.
//!
//! Uses the platform's own survey tool (`airport -s` on macOS,
//! `netsh wlan show networks mode=Bssid` on Windows) and parses its
//! human-readable output into [`WifiAccessPoint`]s.

use crate::models::WifiAccessPoint;
use futures::future::BoxFuture;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

const AIRPORT_PATH: &str =
    "/System/Library/PrivateFrameworks/Apple80211.framework/Versions/Current/Resources/airport";

static MAC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}").expect("valid regex"));
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));
static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)%").expect("valid regex"));
static CHANNEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\s*(\d+)").expect("valid regex"));

#[derive(Debug, Error)]
pub enum WifiScanError {
    #[error("Wi-Fi scanning is not supported on {0}")]
    Unsupported(String),
    #[error("scan command failed: {0}")]
    CommandFailed(String),
    #[error("could not run scan command: {0}")]
    Io(#[from] std::io::Error),
}

pub trait WifiScanner: Send + Sync {
    fn scan(&self) -> BoxFuture<'_, Result<Vec<WifiAccessPoint>, WifiScanError>>;
}

/// Scans with the host operating system's tooling.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWifiScanner;

impl SystemWifiScanner {
    async fn run(program: &str, args: &[&str]) -> Result<String, WifiScanError> {
        debug!("Running {} {}", program, args.join(" "));
        let output = Command::new(program).args(args).output().await?;
        if !output.status.success() {
            return Err(WifiScanError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl WifiScanner for SystemWifiScanner {
    fn scan(&self) -> BoxFuture<'_, Result<Vec<WifiAccessPoint>, WifiScanError>> {
        Box::pin(async move {
            let networks = match std::env::consts::OS {
                "macos" => parse_airport(&Self::run(AIRPORT_PATH, &["-s"]).await?),
                "windows" => parse_netsh(
                    &Self::run("netsh", &["wlan", "show", "networks", "mode=Bssid"]).await?,
                ),
                other => return Err(WifiScanError::Unsupported(other.to_string())),
            };
            info!("Wi-Fi scan found {} access points", networks.len());
            Ok(networks)
        })
    }
}

/// Parses `airport -s` output: `SSID BSSID RSSI CHANNEL ...` after a header line.
pub fn parse_airport(output: &str) -> Vec<WifiAccessPoint> {
    let mut networks = Vec::new();
    for line in output.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }
        let Ok(rssi) = parts[2].parse::<i32>() else {
            warn!("Failed to parse airport line '{}'", line.trim());
            continue;
        };
        let channel = DIGITS_RE
            .find(parts[3])
            .and_then(|m| m.as_str().parse().ok());
        networks.push(WifiAccessPoint {
            mac_address: parts[1].to_string(),
            signal_strength: rssi,
            channel,
            age: None,
        });
    }
    if networks.is_empty() {
        warn!("No networks found in airport output");
    }
    networks
}

/// Parses `netsh wlan show networks mode=Bssid` output. Signal quality is
/// reported as a percentage and converted to an approximate dBm value.
/// BSSIDs without a signal line are dropped.
pub fn parse_netsh(output: &str) -> Vec<WifiAccessPoint> {
    struct Pending {
        mac_address: String,
        signal_strength: Option<i32>,
        channel: Option<u32>,
    }

    fn finish(pending: Option<Pending>, networks: &mut Vec<WifiAccessPoint>) {
        let Some(p) = pending else { return };
        match p.signal_strength {
            Some(signal_strength) => networks.push(WifiAccessPoint {
                mac_address: p.mac_address,
                signal_strength,
                channel: p.channel,
                age: None,
            }),
            None => warn!("Skipping BSSID {} without a signal reading", p.mac_address),
        }
    }

    let mut networks = Vec::new();
    let mut current: Option<Pending> = None;

    for line in output.lines().map(str::trim) {
        if line.is_empty() {
            finish(current.take(), &mut networks);
            continue;
        }
        if line.contains("BSSID") {
            if let Some(mac) = MAC_RE.find(line) {
                finish(current.take(), &mut networks);
                current = Some(Pending {
                    mac_address: mac.as_str().to_string(),
                    signal_strength: None,
                    channel: None,
                });
            }
        } else if line.contains("Signal") {
            if let (Some(ap), Some(caps)) = (current.as_mut(), PERCENT_RE.captures(line)) {
                if let Ok(percent) = caps[1].parse::<f64>() {
                    ap.signal_strength = Some((-100.0 + percent * 0.7) as i32);
                }
            }
        } else if line.contains("Channel") {
            if let (Some(ap), Some(caps)) = (current.as_mut(), CHANNEL_RE.captures(line)) {
                ap.channel = caps[1].parse().ok();
            }
        }
    }
    finish(current, &mut networks);
    networks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_airport_survey() {
        let output = "\
                            SSID BSSID             RSSI CHANNEL HT CC SECURITY
                        HomeNet a4:2b:b0:01:02:03 -48  36,+1   Y  US WPA2(PSK/AES/AES)
                         Cafe   10:fe:ed:aa:bb:cc -71  6       Y  -- WPA2(PSK/AES/AES)
                       broken line
";
        let aps = parse_airport(output);
        assert_eq!(aps.len(), 2);
        assert_eq!(aps[0].mac_address, "a4:2b:b0:01:02:03");
        assert_eq!(aps[0].signal_strength, -48);
        assert_eq!(aps[0].channel, Some(36));
        assert_eq!(aps[1].channel, Some(6));
    }

    #[test]
    fn parses_netsh_with_several_bssids_per_ssid() {
        let output = "\
SSID 1 : HomeNet
    Network type            : Infrastructure
    Authentication          : WPA2-Personal
    BSSID 1                 : a4:2b:b0:01:02:03
         Signal             : 90%
         Radio type         : 802.11ac
         Channel            : 44
    BSSID 2                 : a4:2b:b0:01:02:04
         Signal             : 40%
         Channel            : 1

SSID 2 : Cafe
    BSSID 1                 : 10-fe-ed-aa-bb-cc
         Signal             : 50%
";
        let aps = parse_netsh(output);
        assert_eq!(aps.len(), 3);
        assert_eq!(aps[0].signal_strength, -37);
        assert_eq!(aps[0].channel, Some(44));
        assert_eq!(aps[1].mac_address, "a4:2b:b0:01:02:04");
        assert_eq!(aps[1].signal_strength, -72);
        assert_eq!(aps[2].mac_address, "10-fe-ed-aa-bb-cc");
        assert_eq!(aps[2].channel, None);
    }

    #[test]
    fn netsh_bssid_without_signal_is_dropped() {
        let output = "\
SSID 1 : Hidden
    BSSID 1                 : a4:2b:b0:01:02:03
         Channel            : 11
    BSSID 2                 : a4:2b:b0:01:02:04
         Signal             : 70%
";
        let aps = parse_netsh(output);
        assert_eq!(aps.len(), 1);
        assert_eq!(aps[0].mac_address, "a4:2b:b0:01:02:04");
        assert_eq!(aps[0].signal_strength, -51);
    }
}

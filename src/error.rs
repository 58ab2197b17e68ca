//! Failure taxonomy shared by every location provider.
//!
//! Providers never hand raw transport or platform errors to the session;
//! they translate into a [`LocationError`] first. Each error carries a
//! technical message (its `Display`, meant for the log) plus a short
//! user-facing summary and a longer remediation text.
//!
//! [`project_failure`] turns any error, structured or not, into the
//! [`FailureView`] the UI renders.

use std::fmt;
use thiserror::Error;

/// Classification of a failed acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CapabilityUnsupported,
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    MissingCredential,
    InvalidCredential,
    RateLimited,
    ValidationError,
    InsufficientData,
    UpstreamError,
    InvalidUpstreamResponse,
    NetworkError,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::CapabilityUnsupported => "capability unsupported",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::PositionUnavailable => "position unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::MissingCredential => "missing credential",
            ErrorKind::InvalidCredential => "invalid credential",
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::ValidationError => "validation error",
            ErrorKind::InsufficientData => "insufficient data",
            ErrorKind::UpstreamError => "upstream error",
            ErrorKind::InvalidUpstreamResponse => "invalid upstream response",
            ErrorKind::NetworkError => "network error",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A classified acquisition failure.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct LocationError {
    pub kind: ErrorKind,
    /// Technical message for logs.
    pub message: String,
    /// One-line user-facing summary.
    pub summary: String,
    /// Multi-line remediation guidance.
    pub detail: String,
    pub http_status: Option<u16>,
}

impl LocationError {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            summary: summary.into(),
            detail: detail.into(),
            http_status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    // Device

    pub fn unsupported() -> Self {
        Self::new(
            ErrorKind::CapabilityUnsupported,
            "no position source is available on this host",
            "Location not supported",
            "This system exposes no location capability.\n\
             Start gpsd with a connected receiver, or switch to the\n\
             network or IP provider.",
        )
    }

    /// Translates a platform error, interpolating the configured deadline
    /// into the timeout guidance.
    pub fn from_position(err: &PositionError, timeout_seconds: u64) -> Self {
        let (kind, summary, detail) = position_texts(err.code, Some(timeout_seconds));
        Self::new(kind, err.to_string(), summary, detail)
    }

    // Remote API

    pub fn missing_credential() -> Self {
        Self::new(
            ErrorKind::MissingCredential,
            "no API key provided",
            "No API key provided",
            "The network provider needs a geolocation API key.\n\
             Press 'k' to enter one, or switch to another provider.",
        )
    }

    pub fn invalid_credential(status: u16, server_message: &str) -> Self {
        Self::new(
            ErrorKind::InvalidCredential,
            format!("geolocation API rejected the key ({status}): {server_message}"),
            "Invalid API key",
            "The stored API key was rejected and has been removed.\n\
             Check that the key is active and that the Geolocation API\n\
             is enabled for it, then enter it again with 'k'.",
        )
        .with_status(status)
    }

    pub fn no_methods_selected() -> Self {
        Self::new(
            ErrorKind::ValidationError,
            "no methods selected",
            "No location methods selected",
            "Enable at least one of Wi-Fi, cellular or IP in the\n\
             network provider settings.",
        )
    }

    pub fn invalid_mcc(value: &str) -> Self {
        Self::new(
            ErrorKind::ValidationError,
            format!("invalid MCC {value:?}"),
            "Invalid MCC",
            "The mobile country code must contain digits only (e.g. 310).",
        )
    }

    pub fn invalid_mnc(value: &str) -> Self {
        Self::new(
            ErrorKind::ValidationError,
            format!("invalid MNC {value:?}"),
            "Invalid MNC",
            "The mobile network code must contain digits only (e.g. 260).",
        )
    }

    pub fn insufficient_data(access_points: usize) -> Self {
        Self::new(
            ErrorKind::InsufficientData,
            format!("only {access_points} Wi-Fi access points available with no other method"),
            "Not enough location data",
            "At least two Wi-Fi access points are needed when Wi-Fi is the\n\
             only method. Move closer to other networks, or enable IP or\n\
             cellular lookup.",
        )
    }

    pub fn request_error(status: u16, server_message: &str) -> Self {
        Self::new(
            ErrorKind::UpstreamError,
            format!("geolocation request rejected ({status}): {server_message}"),
            "Request error",
            format!("The geolocation service rejected the request:\n{server_message}"),
        )
        .with_status(status)
    }

    pub fn api_error(status: u16) -> Self {
        Self::new(
            ErrorKind::UpstreamError,
            format!("geolocation API returned {status}"),
            "Geolocation API error",
            "The geolocation service returned an unexpected error.\n\
             Try again in a moment.",
        )
        .with_status(status)
    }

    pub fn rate_limited(status: u16) -> Self {
        Self::new(
            ErrorKind::RateLimited,
            format!("rate limited ({status})"),
            "Rate limit exceeded",
            "Too many requests were sent to the location service.\n\
             Wait a minute before refreshing.",
        )
        .with_status(status)
    }

    // IP lookup

    pub fn ip_service_error(status: u16) -> Self {
        Self::new(
            ErrorKind::UpstreamError,
            format!("IP geolocation service returned {status}"),
            "IP geolocation error",
            "The IP lookup service could not resolve your location.\n\
             Try again later or use another provider.",
        )
        .with_status(status)
    }

    pub fn invalid_location_data() -> Self {
        Self::new(
            ErrorKind::InvalidUpstreamResponse,
            "response is missing latitude or longitude",
            "Invalid location data",
            "The location service answered without usable coordinates.",
        )
    }

    // Transport

    pub fn invalid_response(err: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::InvalidUpstreamResponse,
            format!("could not decode response: {err}"),
            "Invalid response",
            "The location service returned data that could not be read.",
        )
    }

    pub fn network(err: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::NetworkError,
            format!("network error: {err}"),
            "Network error",
            "The location service could not be reached.\n\
             - Check your internet connection\n\
             - Check firewall or proxy settings\n\
             - Try again in a moment",
        )
    }

    pub fn unknown(err: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::Unknown,
            err.to_string(),
            UNKNOWN_SUMMARY,
            UNKNOWN_DETAIL,
        )
    }

    /// Classifies a transport failure from `reqwest`.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::network(err)
        } else if err.is_decode() {
            Self::invalid_response(err)
        } else {
            Self::unknown(err)
        }
    }
}

/// Raw error reported by a platform position source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("position error {code}: {message}")]
pub struct PositionError {
    pub code: u16,
    pub message: String,
}

impl PositionError {
    pub const PERMISSION_DENIED: u16 = 1;
    pub const POSITION_UNAVAILABLE: u16 = 2;
    pub const TIMEOUT: u16 = 3;

    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

const UNKNOWN_SUMMARY: &str = "Unknown error";
const UNKNOWN_DETAIL: &str = "An unexpected error occurred while getting your location.\n\
                              Try again, or switch to another provider.";

fn position_texts(code: u16, timeout_seconds: Option<u64>) -> (ErrorKind, String, String) {
    match code {
        PositionError::PERMISSION_DENIED => (
            ErrorKind::PermissionDenied,
            "Location permission denied".to_string(),
            "Access to the position source was refused.\n\
             - Check that your user may read the GPS device\n\
             - Check the gpsd socket permissions\n\
             - Or switch to the network or IP provider"
                .to_string(),
        ),
        PositionError::POSITION_UNAVAILABLE => (
            ErrorKind::PositionUnavailable,
            "Position unavailable".to_string(),
            "No position fix could be obtained.\n\
             - Check that gpsd is running and a receiver is attached\n\
             - Move to a spot with a clear view of the sky\n\
             - Or switch to the network or IP provider"
                .to_string(),
        ),
        PositionError::TIMEOUT => {
            let within = match timeout_seconds {
                Some(secs) => format!("within {secs} seconds"),
                None => "within the configured time".to_string(),
            };
            (
                ErrorKind::Timeout,
                "Location request timed out".to_string(),
                format!(
                    "No position fix arrived {within}.\n\
                     - Increase the timeout in the device settings\n\
                     - Move to a spot with better reception\n\
                     - Or switch to the network or IP provider"
                ),
            )
        }
        _ => (
            ErrorKind::Unknown,
            "Location error".to_string(),
            "The position source reported an unexpected error.".to_string(),
        ),
    }
}

/// What the UI shows for the current failure.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureView {
    pub summary: String,
    pub detail: String,
    /// Short text for the transient notification.
    pub toast: String,
}

/// Normalises any failure into a [`FailureView`].
///
/// Structured [`LocationError`]s are used as-is, raw [`PositionError`]s are
/// looked up by code, anything else falls back to the generic text.
pub fn project_failure(err: &(dyn std::error::Error + 'static)) -> FailureView {
    if let Some(err) = err.downcast_ref::<LocationError>() {
        return FailureView {
            summary: err.summary.clone(),
            detail: err.detail.clone(),
            toast: err.summary.clone(),
        };
    }
    if let Some(err) = err.downcast_ref::<PositionError>() {
        let (_, summary, detail) = position_texts(err.code, None);
        return FailureView {
            toast: summary.clone(),
            summary,
            detail,
        };
    }
    FailureView {
        summary: UNKNOWN_SUMMARY.to_string(),
        detail: UNKNOWN_DETAIL.to_string(),
        toast: format!("{UNKNOWN_SUMMARY}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_detail_interpolates_seconds() {
        let err = LocationError::from_position(
            &PositionError::new(PositionError::TIMEOUT, "deadline elapsed"),
            15,
        );
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.detail.contains("within 15 seconds"));
    }

    #[test]
    fn unknown_platform_code_is_generic_location_error() {
        let err = LocationError::from_position(&PositionError::new(9, "weird"), 10);
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.summary, "Location error");
    }

    #[test]
    fn projection_prefers_structured_fields() {
        let err = LocationError::rate_limited(429);
        let view = project_failure(&err);
        assert_eq!(view.summary, "Rate limit exceeded");
        assert_eq!(view.toast, "Rate limit exceeded");
    }

    #[test]
    fn projection_looks_up_platform_codes() {
        let err = PositionError::new(PositionError::PERMISSION_DENIED, "EACCES");
        let view = project_failure(&err);
        assert_eq!(view.summary, "Location permission denied");

        let err = PositionError::new(42, "?");
        assert_eq!(project_failure(&err).summary, "Location error");
    }

    #[test]
    fn projection_falls_back_to_unknown() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let view = project_failure(&err);
        assert_eq!(view.summary, "Unknown error");
        assert!(view.toast.contains("boom"));
    }
}

//! Error types for checkin-core operations.
//!
//! Redemption failures never surface as errors: the gateway folds them into a
//! `RedemptionOutcome`. The types here cover the capabilities around it.

use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// Capture Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Failures of the injected capture device.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Capture device failed to start: {0}")]
    StartFailed(String),

    #[error("Capture device failed to {action}: {details}")]
    ControlFailed {
        action: &'static str,
        details: String,
    },

    #[error("Capture session is not running")]
    NotRunning,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Decode Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// No payload could be recovered from a frame.
///
/// Transient: callers show the message and let the user scan again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("No QR code found in the image")]
    NotFound,

    #[error("No image loaded")]
    NoImage,

    #[error("Selected region is empty")]
    EmptyRegion,

    #[error("Image buffer is malformed: {0}")]
    MalformedImage(String),

    #[error("Decoder failed: {0}")]
    Decoder(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Transport Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Transport-level failure of an HTTP call (no response was received).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid request URL {url}: {details}")]
    InvalidUrl { url: String, details: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(err.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file unreadable: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file malformed: {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Convenience type alias for configuration results.
pub type Result<T> = std::result::Result<T, ConfigError>;

// Conversion for string error compatibility
impl From<ConfigError> for String {
    fn from(err: ConfigError) -> String {
        err.to_string()
    }
}

//! Centralized error types for the Herald core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps every error to a machine-readable code via [`ErrorCode`]

use serde::Serialize;
use thiserror::Error;

use crate::sonos::soap::SoapError;
use crate::sonos::subscription::GenaError;
use crate::tts::TtsError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

impl ErrorCode for SoapError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "transport_error",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::Fault { .. } => "protocol_fault",
            Self::Parse => "soap_parse_error",
            Self::InvalidRequest(_) => "soap_invalid_request",
        }
    }
}

impl ErrorCode for GenaError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::SubscriptionFailed(_) => "gena_subscription_failed",
            Self::MissingSid => "gena_missing_sid",
            Self::InvalidMethod(_) => "gena_invalid_method",
        }
    }
}

impl ErrorCode for TtsError {
    fn code(&self) -> &'static str {
        match self {
            Self::EmptyText => "tts_empty_text",
            Self::Spawn(_) => "tts_spawn_failed",
            Self::EngineFailed(_) => "tts_engine_failed",
            Self::MissingOutput(_) => "tts_missing_output",
            Self::Cancelled => "tts_cancelled",
            Self::TimedOut(_) => "tts_timed_out",
        }
    }
}

/// Application-wide error type for Herald.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum HeraldError {
    /// No device is registered under the requested room.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// A SOAP request to a device failed.
    #[error("SOAP request failed: {0}")]
    Soap(String),

    /// Capturing the pre-interruption state partially failed.
    #[error("State capture failed: {0}")]
    StateCapture(String),

    /// Writing back the captured state failed.
    #[error("Restore failed: {0}")]
    Restore(String),

    /// Speech synthesis failed or was cancelled.
    #[error("Speech synthesis failed: {0}")]
    Speech(String),

    /// An announcement file could not be resolved or probed.
    #[error("Media error: {0}")]
    Media(String),

    /// The caller sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration is missing or inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ErrorCode for HeraldError {
    fn code(&self) -> &'static str {
        match self {
            Self::DeviceNotFound(_) => "device_not_found",
            Self::Soap(_) => "soap_error",
            Self::StateCapture(_) => "state_capture_failed",
            Self::Restore(_) => "restore_failed",
            Self::Speech(_) => "speech_failed",
            Self::Media(_) => "media_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Configuration(_) => "configuration_error",
        }
    }
}

impl HeraldError {
    /// True for errors a caller handles by ending the interaction quietly.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DeviceNotFound(_) | Self::StateCapture(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::sonos::soap::SoapResult;
pub use crate::sonos::subscription::GenaResult;

/// Convenient Result alias for application-wide operations.
pub type HeraldResult<T> = Result<T, HeraldError>;

impl From<SoapError> for HeraldError {
    fn from(err: SoapError) -> Self {
        Self::Soap(err.to_string())
    }
}

impl From<GenaError> for HeraldError {
    fn from(err: GenaError) -> Self {
        Self::Soap(err.to_string())
    }
}

impl From<TtsError> for HeraldError {
    fn from(err: TtsError) -> Self {
        Self::Speech(err.to_string())
    }
}

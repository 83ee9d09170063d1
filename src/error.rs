//! Error types for vodkey.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Main error type for vodkey operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The credential was rejected by the provider's identity endpoint.
    #[error("Credential is invalid or expired")]
    Unauthorized,

    /// The external credential source could not produce a fresh credential.
    #[error("Credential acquisition failed: {0}")]
    CredentialAcquisition(String),

    /// The manifest carries no Widevine protection header.
    #[error("Widevine PSSH not found in manifest")]
    ManifestNotProtected,

    /// The manifest is not a well-formed XML document.
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// No `.wvd` device identity was found in the device directory.
    #[error("No .wvd device file found in {}", .0.display())]
    DeviceIdentityMissing(PathBuf),

    /// The license service did not answer the challenge successfully.
    #[error("License request failed: {}", describe_license_failure(.status, .body))]
    LicenseRequest { status: Option<u16>, body: String },

    /// The license was parsed but carried no content keys.
    #[error("No decryption keys found in license")]
    NoContentKeys,

    /// The identity claim carries no usable subject identifier.
    #[error("Could not extract subject from credential: {0}")]
    NoSubject(String),

    /// The provider API answered with an error or an unexpected payload.
    #[error("Provider API error: {0}")]
    Provider(String),

    /// An HTTP exchange answered with a non-success status.
    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// A media URL could not be parsed.
    #[error("Invalid URL {0}")]
    InvalidUrl(String),

    /// The HTTP request could not be completed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A header name or value cannot be sent over HTTP.
    #[error("Invalid HTTP header: {0}")]
    InvalidHeader(String),

    /// Too many sessions are open.
    #[error("Too many sessions open (max {max})")]
    TooManySessions { max: usize },

    /// No session is open with the specified identifier.
    #[error("Session identifier {0:?} is invalid")]
    InvalidSession(Vec<u8>),

    /// The Widevine Cenc Header Data is invalid or empty.
    #[error("Invalid init data: {0}")]
    InvalidInitData(String),

    /// The License Message is invalid or missing.
    #[error("Invalid license message: {0}")]
    InvalidLicenseMessage(String),

    /// The request context for a license is invalid or missing.
    #[error("Invalid context: {0}")]
    InvalidContext(String),

    /// The license signature did not match.
    #[error("Signature mismatch: {0}")]
    SignatureMismatch(String),

    /// Failed to decode data.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Failed to parse protobuf message.
    #[error("Protobuf decode error: {0}")]
    ProtobufDecodeError(#[from] prost::DecodeError),

    /// RSA error.
    #[error("RSA error: {0}")]
    RsaError(#[from] rsa::Error),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    /// JSON decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid WVD file.
    #[error("Invalid WVD file: {0}")]
    InvalidWvdFile(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`Error`], reported in user-facing outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    CredentialAcquisition,
    ManifestNotProtected,
    InvalidManifest,
    DeviceIdentityMissing,
    LicenseRequest,
    NoContentKeys,
    Provider,
    Transport,
    Protocol,
    Config,
    Internal,
}

impl Error {
    /// Classify the error for callers that only need the failure category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthorized => ErrorKind::Unauthorized,
            Error::CredentialAcquisition(_) => ErrorKind::CredentialAcquisition,
            Error::ManifestNotProtected => ErrorKind::ManifestNotProtected,
            Error::InvalidManifest(_) => ErrorKind::InvalidManifest,
            Error::DeviceIdentityMissing(_) => ErrorKind::DeviceIdentityMissing,
            Error::LicenseRequest { .. } => ErrorKind::LicenseRequest,
            Error::NoContentKeys => ErrorKind::NoContentKeys,
            Error::Provider(_) | Error::Json(_) => ErrorKind::Provider,
            Error::UnexpectedStatus { .. } | Error::Transport(_) => ErrorKind::Transport,
            Error::NoSubject(_)
            | Error::InvalidUrl(_)
            | Error::InvalidHeader(_)
            | Error::TooManySessions { .. }
            | Error::InvalidSession(_)
            | Error::InvalidInitData(_)
            | Error::InvalidLicenseMessage(_)
            | Error::InvalidContext(_)
            | Error::SignatureMismatch(_)
            | Error::DecodeError(_)
            | Error::ProtobufDecodeError(_)
            | Error::RsaError(_)
            | Error::Base64DecodeError(_)
            | Error::InvalidWvdFile(_) => ErrorKind::Protocol,
            Error::Config(_) => ErrorKind::Config,
            Error::IoError(_) | Error::Other(_) => ErrorKind::Internal,
        }
    }
}

fn describe_license_failure(status: &Option<u16>, body: &str) -> String {
    match status {
        Some(status) if body.is_empty() => format!("[{}]", status),
        Some(status) => format!("[{}] {}", status, body),
        None => body.to_string(),
    }
}

/// Result type alias for vodkey operations.
pub type Result<T> = std::result::Result<T, Error>;

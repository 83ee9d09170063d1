//! Client for the video provider's HTTP API.
//!
//! Two endpoints are used: the user-details endpoint as a credential probe,
//! and the signed-URL endpoint that maps a video URL to its DRM manifest and
//! license server.
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::IdentityProbe;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::transport::{Headers, HttpTransport};

/// Default provider API base.
pub const DEFAULT_API_BASE: &str = "https://api.classplusapp.com";

/// Header carrying the bearer credential.
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

const USER_DETAILS_PATH: &str = "/v2/users/details";
const SIGNED_URL_PATH: &str = "/cams/uploader/video/jw-signed-url";

/// Timeouts of the provider API calls.
#[derive(Debug, Clone, Copy)]
pub struct ProviderTimeouts {
    pub identity_probe: Duration,
    pub metadata: Duration,
}

impl Default for ProviderTimeouts {
    fn default() -> Self {
        Self {
            identity_probe: Duration::from_secs(5),
            metadata: Duration::from_secs(15),
        }
    }
}

/// DRM locations of a protected video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrmUrls {
    #[serde(rename = "manifestUrl")]
    pub manifest_url: String,
    #[serde(rename = "licenseUrl")]
    pub license_url: String,
}

#[derive(Debug, Deserialize)]
struct VideoMetadataResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "drmUrls", default)]
    drm_urls: Option<DrmUrls>,
}

/// Build the auth header list for a credential.
#[must_use]
pub fn auth_headers(credential: &Credential) -> Headers {
    vec![(
        ACCESS_TOKEN_HEADER.to_string(),
        credential.as_str().to_string(),
    )]
}

/// Provider API client.
pub struct ProviderApi {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    timeouts: ProviderTimeouts,
}

impl ProviderApi {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
            timeouts: ProviderTimeouts::default(),
        }
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: ProviderTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve the DRM manifest and license URLs of `video_url`.
    pub fn video_metadata(&self, credential: &Credential, video_url: &str) -> Result<DrmUrls> {
        let endpoint = format!("{}{}", self.base_url, SIGNED_URL_PATH);
        let url = reqwest::Url::parse_with_params(&endpoint, &[("url", video_url)])
            .map_err(|e| Error::Config(format!("Invalid API base {}: {}", self.base_url, e)))?;

        let response = self.transport.get(
            url.as_str(),
            &auth_headers(credential),
            self.timeouts.metadata,
        )?;
        if !response.is_success() {
            return Err(Error::Provider(format!(
                "API request failed with status {}: {}",
                response.status,
                response.text().trim()
            )));
        }

        let metadata: VideoMetadataResponse = serde_json::from_slice(&response.body)?;
        if metadata.status.as_deref() != Some("ok") {
            return Err(Error::Provider(
                metadata
                    .message
                    .unwrap_or_else(|| "Could not get video info".to_string()),
            ));
        }

        let drm_urls = metadata
            .drm_urls
            .ok_or_else(|| Error::Provider("Response carries no drmUrls".to_string()))?;
        debug!("Manifest at {}", drm_urls.manifest_url);
        Ok(drm_urls)
    }
}

impl IdentityProbe for ProviderApi {
    fn probe(&self, credential: &Credential) -> Result<bool> {
        let url = format!("{}{}", self.base_url, USER_DETAILS_PATH);
        let response = self.transport.get(
            &url,
            &auth_headers(credential),
            self.timeouts.identity_probe,
        )?;
        Ok(response.status == 200)
    }
}

impl std::fmt::Debug for ProviderApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderApi")
            .field("base_url", &self.base_url)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

//! Request orchestration.
//!
//! Sequences credential validation, provider metadata, manifest retrieval,
//! the license exchange and URL signing for the two user-facing operations:
//! [`Orchestrator::decode`] and [`Orchestrator::get_keys`].
use std::sync::Arc;
use std::time::Duration;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Serialize;

use crate::cache::CredentialCache;
use crate::config::Config;
use crate::credential::{
    CommandCredentialSource, Credential, CredentialSource, UnconfiguredCredentialSource,
};
use crate::error::{Error, ErrorKind, Result};
use crate::exchange::LicenseExchange;
use crate::key::ContentKey;
use crate::manifest::extract_protection_header;
use crate::provider::{auth_headers, ProviderApi};
use crate::signer::{PlayableUrl, UrlSigner};
use crate::transport::{Headers, HttpTransport};
use crate::utils::redact;

/// Reported when `decode` had to replace the caller's credential.
pub const REGENERATED_MESSAGE: &str =
    "Your old token was expired. A new token has been generated and used.";

const DEFAULT_MANIFEST_TIMEOUT: Duration = Duration::from_secs(15);

const INDIFFERENT_PADDING: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const LENIENT_STANDARD: GeneralPurpose =
    GeneralPurpose::new(&alphabet::STANDARD, INDIFFERENT_PADDING);
const LENIENT_URL_SAFE: GeneralPurpose =
    GeneralPurpose::new(&alphabet::URL_SAFE, INDIFFERENT_PADDING);

/// A media URL as received: base64-encoded or already plain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum DecodedUrl {
    /// The input was base64 text of this URL.
    Decoded(String),
    /// The input is not base64 text and is used unchanged.
    Passthrough(String),
}

impl DecodedUrl {
    /// Interpret `input` as base64 (either alphabet, any padding) of a
    /// UTF-8 string without control characters, else pass it through.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        LENIENT_STANDARD
            .decode(input)
            .or_else(|_| LENIENT_URL_SAFE.decode(input))
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .filter(|text| !text.is_empty() && !text.chars().any(char::is_control))
            .map_or_else(|| DecodedUrl::Passthrough(input.to_string()), DecodedUrl::Decoded)
    }

    pub fn as_str(&self) -> &str {
        match self {
            DecodedUrl::Decoded(url) | DecodedUrl::Passthrough(url) => url,
        }
    }
}

/// A credential obtained from the credential source during `decode`.
#[derive(Debug, Clone, Serialize)]
pub struct RegeneratedCredential {
    pub token: String,
    pub generated_by: Option<String>,
}

/// Output of `decode`.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeResult {
    pub url: PlayableUrl,
    pub input: DecodedUrl,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regenerated: Option<RegeneratedCredential>,
}

/// Output of `get_keys`.
#[derive(Debug, Clone, Serialize)]
pub struct KeySet {
    pub manifest_url: String,
    pub keys: Vec<ContentKey>,
}

impl KeySet {
    /// Keys as `--key kid:key` decrypter arguments.
    pub fn decrypt_args(&self) -> Vec<String> {
        self.keys.iter().map(ContentKey::decrypt_arg).collect()
    }
}

/// User-facing result envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Outcome<T> {
    pub fn ok(data: T, message: Option<String>) -> Self {
        Self {
            success: true,
            message,
            error: None,
            data: Some(data),
        }
    }

    pub fn failed(error: &Error) -> Self {
        Self {
            success: false,
            message: Some(error.to_string()),
            error: Some(error.kind()),
            data: None,
        }
    }
}

/// Entry point of the engine.
pub struct Orchestrator {
    provider: Arc<ProviderApi>,
    cache: CredentialCache,
    credential_source: Arc<dyn CredentialSource>,
    exchange: LicenseExchange,
    signer: UrlSigner,
    transport: Arc<dyn HttpTransport>,
    manifest_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<ProviderApi>,
        cache: CredentialCache,
        credential_source: Arc<dyn CredentialSource>,
        exchange: LicenseExchange,
        signer: UrlSigner,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            provider,
            cache,
            credential_source,
            exchange,
            signer,
            transport,
            manifest_timeout: DEFAULT_MANIFEST_TIMEOUT,
        }
    }

    /// Wire every component from configuration.
    ///
    /// The device identity is loaded here, once.
    pub fn from_config(config: &Config, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        config.validate()?;
        let provider = Arc::new(
            ProviderApi::new(&config.api_base, Arc::clone(&transport))
                .with_timeouts(config.timeouts.provider()),
        );
        let cache = CredentialCache::with_ttl(provider.clone(), config.cache_ttl());
        let credential_source: Arc<dyn CredentialSource> = match config
            .credential_command
            .as_deref()
            .and_then(CommandCredentialSource::from_argv)
        {
            Some(source) => Arc::new(source),
            None => Arc::new(UnconfiguredCredentialSource),
        };
        let exchange = LicenseExchange::provision(&config.device_dir, Arc::clone(&transport))?
            .with_timeout(config.timeouts.license());
        let signer = UrlSigner::new(config.signing_secret());

        Ok(
            Self::new(provider, cache, credential_source, exchange, signer, transport)
                .with_manifest_timeout(config.timeouts.manifest()),
        )
    }

    #[must_use]
    pub fn with_manifest_timeout(mut self, timeout: Duration) -> Self {
        self.manifest_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_credential_source(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credential_source = source;
        self
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    /// Produce a playable URL for a possibly base64-encoded media URL.
    ///
    /// An invalid credential is replaced by exactly one call to the
    /// credential source; its failure ends the request.
    pub fn try_decode(&self, credential: &Credential, input: &str) -> Result<DecodeResult> {
        if input.trim().is_empty() {
            return Err(Error::InvalidUrl("empty URL".to_string()));
        }

        let (credential, regenerated) = if self.cache.is_valid(credential) {
            (credential.clone(), None)
        } else {
            warn!("Credential failed validation, acquiring a new one");
            let fresh = self
                .credential_source
                .acquire_fresh_credential()
                .map_err(|e| match e {
                    Error::CredentialAcquisition(_) => e,
                    other => Error::CredentialAcquisition(other.to_string()),
                })?;
            info!(
                "Acquired credential {} from {}",
                redact(fresh.credential.as_str()),
                fresh.source.as_deref().unwrap_or("credential source")
            );
            let regenerated = RegeneratedCredential {
                token: fresh.credential.as_str().to_string(),
                generated_by: fresh.source,
            };
            (fresh.credential, Some(regenerated))
        };

        let decoded = DecodedUrl::parse(input);
        let url = self.signer.sign(decoded.as_str(), &credential);
        Ok(DecodeResult {
            url,
            input: decoded,
            regenerated,
        })
    }

    /// [`Orchestrator::try_decode`] wrapped in an [`Outcome`].
    pub fn decode(&self, credential: &Credential, input: &str) -> Outcome<DecodeResult> {
        match self.try_decode(credential, input) {
            Ok(result) => {
                let message = result
                    .regenerated
                    .as_ref()
                    .map(|_| REGENERATED_MESSAGE.to_string());
                Outcome::ok(result, message)
            }
            Err(e) => {
                error!("Decode failed: {}", e);
                Outcome::failed(&e)
            }
        }
    }

    /// Extract the content keys of a protected video.
    ///
    /// An invalid credential fails immediately with [`Error::Unauthorized`];
    /// no other call is made.
    pub fn try_get_keys(&self, credential: &Credential, video_url: &str) -> Result<KeySet> {
        if video_url.trim().is_empty() {
            return Err(Error::InvalidUrl("empty URL".to_string()));
        }
        if !self.cache.is_valid(credential) {
            return Err(Error::Unauthorized);
        }

        info!("Extracting DRM keys for {}", video_url);
        let drm = self.provider.video_metadata(credential, video_url)?;
        let manifest = self.fetch_manifest(&drm.manifest_url)?;
        let header = extract_protection_header(&manifest)?;
        debug!("Protection header {}", redact(header.as_str()));

        let keys = self
            .exchange
            .exchange(&header, &drm.license_url, &auth_headers(credential))?;
        Ok(KeySet {
            manifest_url: drm.manifest_url,
            keys,
        })
    }

    /// [`Orchestrator::try_get_keys`] wrapped in an [`Outcome`].
    pub fn get_keys(&self, credential: &Credential, video_url: &str) -> Outcome<KeySet> {
        match self.try_get_keys(credential, video_url) {
            Ok(keys) => Outcome::ok(keys, None),
            Err(e @ Error::ManifestNotProtected) => {
                info!("{} is not DRM protected", video_url);
                Outcome::failed(&e)
            }
            Err(e) => {
                error!("Key extraction failed: {}", e);
                Outcome::failed(&e)
            }
        }
    }

    fn fetch_manifest(&self, url: &str) -> Result<String> {
        let response = self
            .transport
            .get(url, &Headers::new(), self.manifest_timeout)?;
        if !response.is_success() {
            return Err(Error::UnexpectedStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        String::from_utf8(response.body)
            .map_err(|_| Error::InvalidManifest("manifest is not UTF-8".to_string()))
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider)
            .field("cache", &self.cache)
            .field("exchange", &self.exchange)
            .field("signer", &self.signer)
            .field("manifest_timeout", &self.manifest_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use base64::Engine;
    use uuid::Uuid;

    use super::{DecodedUrl, Orchestrator, REGENERATED_MESSAGE};
    use crate::cache::CredentialCache;
    use crate::credential::{Credential, FreshCredential};
    use crate::device::tests::test_device;
    use crate::error::{Error, ErrorKind, Result};
    use crate::exchange::tests::{test_header, FakeLicenseServer, LicenseReply};
    use crate::exchange::LicenseExchange;
    use crate::license_protocol::license::key_container::KeyType;
    use crate::provider::ProviderApi;
    use crate::signer::UrlSigner;
    use crate::transport::{Headers, HttpResponse, HttpTransport};

    const API: &str = "https://api.example.com";
    const MANIFEST_URL: &str = "https://cdn.example.com/v/1/manifest.mpd";
    const LICENSE_URL: &str = "https://license.example.com/wv";

    /// Provider, CDN and license server behind one transport.
    struct Router {
        details_status: u16,
        metadata: String,
        manifest: String,
        license: Arc<FakeLicenseServer>,
        log: Mutex<Vec<String>>,
    }

    impl Router {
        fn hits(&self, prefix: &str) -> usize {
            self.log
                .lock()
                .expect("lock")
                .iter()
                .filter(|entry| entry.starts_with(prefix))
                .count()
        }
    }

    impl HttpTransport for Router {
        fn get(&self, url: &str, _headers: &Headers, _timeout: Duration) -> Result<HttpResponse> {
            self.log.lock().expect("lock").push(format!("GET {}", url));
            let (status, body) = if url.ends_with("/v2/users/details") {
                (self.details_status, "{}".to_string())
            } else if url.contains("/jw-signed-url?") {
                (200, self.metadata.clone())
            } else if url == MANIFEST_URL {
                (200, self.manifest.clone())
            } else {
                (404, String::new())
            };
            Ok(HttpResponse {
                status,
                body: body.into_bytes(),
            })
        }

        fn post(
            &self,
            url: &str,
            headers: &Headers,
            body: &[u8],
            _timeout: Duration,
        ) -> Result<HttpResponse> {
            self.log.lock().expect("lock").push(format!("POST {}", url));
            self.license.answer(headers, body)
        }
    }

    fn manifest_with(header: &str) -> String {
        format!(
            r#"<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" xmlns:cenc="urn:mpeg:cenc:2013">
  <Period><AdaptationSet>
    <ContentProtection schemeIdUri="urn:uuid:edef8ba9-79d6-4ace-a3c8-27dcd51d21ed">
      <cenc:pssh>{}</cenc:pssh>
    </ContentProtection>
  </AdaptationSet></Period>
</MPD>"#,
            header
        )
    }

    fn metadata_ok() -> String {
        format!(
            r#"{{"status":"ok","drmUrls":{{"manifestUrl":"{}","licenseUrl":"{}"}}}}"#,
            MANIFEST_URL, LICENSE_URL
        )
    }

    fn orchestrator(
        details_status: u16,
        metadata: String,
        manifest: String,
        reply: LicenseReply,
    ) -> (Orchestrator, Arc<Router>, Arc<AtomicUsize>) {
        let device = Arc::new(test_device(1));
        let router = Arc::new(Router {
            details_status,
            metadata,
            manifest,
            license: FakeLicenseServer::new(Arc::clone(&device), reply),
            log: Mutex::new(Vec::new()),
        });

        let provider = Arc::new(ProviderApi::new(API, router.clone()));
        let cache = CredentialCache::new(provider.clone());
        let exchange = LicenseExchange::new(Some(device), "WVDs", router.clone());

        let acquisitions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&acquisitions);
        let source = move || -> Result<FreshCredential> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(FreshCredential {
                credential: Credential::new(token(r#"{"id":99}"#)),
                source: Some("inbox@example.com".to_string()),
            })
        };

        let orchestrator = Orchestrator::new(
            provider,
            cache,
            Arc::new(source),
            exchange,
            UrlSigner::default(),
            router.clone(),
        );
        (orchestrator, router, acquisitions)
    }

    fn token(payload: &str) -> String {
        format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn decoded_url_variants() {
        let url = "https://cdn.example.com/videos/abc/master.mpd";
        assert_eq!(
            DecodedUrl::parse(&STANDARD.encode(url)),
            DecodedUrl::Decoded(url.to_string())
        );
        assert_eq!(
            DecodedUrl::parse(&URL_SAFE_NO_PAD.encode(url)),
            DecodedUrl::Decoded(url.to_string())
        );
        assert_eq!(DecodedUrl::parse(url), DecodedUrl::Passthrough(url.to_string()));
        assert_eq!(
            DecodedUrl::parse(&STANDARD.encode([0xff, 0xfe, 0x00])),
            DecodedUrl::Passthrough(STANDARD.encode([0xff, 0xfe, 0x00]))
        );
    }

    #[test]
    fn get_keys_end_to_end() {
        let kid = Uuid::from_u128(0xa1b2c3d4e5f60718293a4b5c6d7e8f90);
        let (orchestrator, router, _) = orchestrator(
            200,
            metadata_ok(),
            manifest_with(test_header().as_str()),
            LicenseReply::Keys(vec![
                (KeyType::Signing, Uuid::new_v4(), vec![7; 32]),
                (KeyType::Content, kid, vec![0xCD; 16]),
            ]),
        );

        let credential = Credential::new(token(r#"{"id":1}"#));
        let outcome = orchestrator.get_keys(&credential, "https://media/v/1");
        assert!(outcome.success, "{:?}", outcome.message);
        let keys = outcome.data.expect("keys");
        assert_eq!(keys.manifest_url, MANIFEST_URL);
        assert_eq!(
            keys.decrypt_args(),
            vec![format!("--key a1b2c3d4e5f60718293a4b5c6d7e8f90:{}", "cd".repeat(16))]
        );
        assert_eq!(router.hits("POST"), 1);
    }

    #[test]
    fn get_keys_rejects_invalid_credential_without_side_effects() {
        let (orchestrator, router, acquisitions) =
            orchestrator(401, metadata_ok(), String::new(), LicenseReply::Garbage);

        let outcome = orchestrator.get_keys(&Credential::new("expired"), "https://media/v/1");
        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ErrorKind::Unauthorized));
        assert_eq!(router.hits("GET"), 1);
        assert_eq!(router.hits("POST"), 0);
        assert_eq!(acquisitions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unprotected_manifest_is_reported() {
        let (orchestrator, router, _) = orchestrator(
            200,
            metadata_ok(),
            "<MPD><Period/></MPD>".to_string(),
            LicenseReply::Garbage,
        );
        let outcome = orchestrator.get_keys(&Credential::new("ok"), "https://media/v/1");
        assert_eq!(outcome.error, Some(ErrorKind::ManifestNotProtected));
        assert_eq!(router.hits("POST"), 0);
    }

    #[test]
    fn provider_error_message_is_surfaced() {
        let (orchestrator, _, _) = orchestrator(
            200,
            r#"{"status":"failure","message":"Invalid url"}"#.to_string(),
            String::new(),
            LicenseReply::Garbage,
        );
        let err = orchestrator
            .try_get_keys(&Credential::new("ok"), "https://media/v/1")
            .expect_err("provider error");
        assert!(matches!(err, Error::Provider(ref m) if m == "Invalid url"));
    }

    #[test]
    fn rejected_license_is_reported() {
        let (orchestrator, _, _) = orchestrator(
            200,
            metadata_ok(),
            manifest_with(test_header().as_str()),
            LicenseReply::Status(403, "denied"),
        );
        let outcome = orchestrator.get_keys(&Credential::new("ok"), "https://media/v/1");
        assert_eq!(outcome.error, Some(ErrorKind::LicenseRequest));
        assert_eq!(outcome.message.as_deref(), Some("License request failed: [403] denied"));
    }

    #[test]
    fn decode_with_valid_credential_signs_directly() {
        let (orchestrator, _, acquisitions) =
            orchestrator(200, metadata_ok(), String::new(), LicenseReply::Garbage);
        let input = STANDARD.encode("https://cdn.example.com/videos/abc/master.mpd");

        let outcome = orchestrator.decode(&Credential::new(token(r#"{"id":42}"#)), &input);
        assert!(outcome.success);
        assert!(outcome.message.is_none());
        let result = outcome.data.expect("data");
        assert!(result.regenerated.is_none());
        assert!(result.url.as_str().ends_with("&userIds=42"));
        assert_eq!(acquisitions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn decode_regenerates_invalid_credential_once() {
        let (orchestrator, _, acquisitions) =
            orchestrator(401, metadata_ok(), String::new(), LicenseReply::Garbage);

        let outcome = orchestrator.decode(
            &Credential::new(token(r#"{"id":42}"#)),
            "https://cdn.example.com/videos/abc/master.mpd",
        );
        assert!(outcome.success);
        assert_eq!(outcome.message.as_deref(), Some(REGENERATED_MESSAGE));
        let result = outcome.data.expect("data");
        let regenerated = result.regenerated.expect("regenerated");
        assert_eq!(regenerated.generated_by.as_deref(), Some("inbox@example.com"));
        assert!(result.url.as_str().ends_with("&userIds=99"));
        assert_eq!(acquisitions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let (orchestrator, router, _) =
            orchestrator(200, metadata_ok(), String::new(), LicenseReply::Garbage);
        assert!(orchestrator.try_decode(&Credential::new("t"), "  ").is_err());
        assert!(orchestrator.try_get_keys(&Credential::new("t"), "").is_err());
        assert_eq!(router.hits(""), 0);
    }
}

//! Signed playback URLs.
//!
//! The provider's CDN accepts an `hdnts` token of the form
//! `URLPrefix=<b64>~Expires=<unix>~hmac=<hex>`, where the HMAC-SHA256 covers
//! `URLPrefix=<b64>~Expires=<unix>` and the prefix is the media URL without
//! its final file segment. The request also names the subject in `userIds`.
use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Url;
use serde::Serialize;
use sha2::Sha256;

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::utils::unix_now;

type HmacSha256 = Hmac<Sha256>;

/// Shared secret used when none is configured.
///
/// This value is an estimate and has not been confirmed against the
/// provider; deployments should configure the real secret.
pub const DEFAULT_SIGNING_SECRET: &str = "classplus_-$-video_encryption_--$-key";

/// Lifetime of a generated token.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(3600);

/// HMAC key for URL tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for SigningSecret {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNING_SECRET)
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// The three parts of an `hdnts` token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedUrlToken {
    pub url_prefix_b64: String,
    pub expires: u64,
    pub hmac_hex: String,
}

impl fmt::Display for SignedUrlToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "URLPrefix={}~Expires={}~hmac={}",
            self.url_prefix_b64, self.expires, self.hmac_hex
        )
    }
}

/// Result of URL signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayableUrl {
    /// A URL carrying a freshly generated token.
    Signed {
        url: String,
        token: SignedUrlToken,
        subject: String,
    },
    /// The input URL, returned unchanged because signing failed.
    Unsigned { url: String, reason: String },
}

impl PlayableUrl {
    /// The URL to hand to a player.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            PlayableUrl::Signed { url, .. } | PlayableUrl::Unsigned { url, .. } => url,
        }
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        matches!(self, PlayableUrl::Signed { .. })
    }
}

impl fmt::Display for PlayableUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives `hdnts` tokens with a shared secret.
#[derive(Debug, Clone, Default)]
pub struct UrlSigner {
    secret: SigningSecret,
    validity: Option<Duration>,
}

impl UrlSigner {
    pub fn new(secret: SigningSecret) -> Self {
        Self {
            secret,
            validity: None,
        }
    }

    #[must_use]
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Sign `url` for the credential's subject, falling back to the
    /// unchanged URL when any step fails.
    pub fn sign(&self, url: &str, credential: &Credential) -> PlayableUrl {
        match self.try_sign(url, credential) {
            Ok(signed) => signed,
            Err(e) => {
                warn!("Returning unsigned URL: {}", e);
                PlayableUrl::Unsigned {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Sign `url` for the credential's subject, expiring one validity
    /// period from now.
    pub fn try_sign(&self, url: &str, credential: &Credential) -> Result<PlayableUrl> {
        let subject = credential.subject()?;
        let validity = self.validity.unwrap_or(DEFAULT_VALIDITY);
        self.sign_at(url, &subject, unix_now() + validity.as_secs())
    }

    /// Deterministic signing with an explicit subject and expiry.
    ///
    /// The URL must parse as absolute, but the signed prefix and the output
    /// are built from its literal authority and path, never a normalized form.
    pub fn sign_at(&self, url: &str, subject: &str, expires: u64) -> Result<PlayableUrl> {
        Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;
        let (scheme, authority, path) = split_url(url)?;

        let prefix = format!("{}://{}/{}", scheme, authority, prefix_path(path));
        let token = self.token_for_prefix(&prefix, expires)?;
        let signed_url = format!(
            "{}://{}{}?hdnts={}&userIds={}",
            scheme, authority, path, token, subject
        );
        debug!("Signed URL prefix {} until {}", prefix, expires);

        Ok(PlayableUrl::Signed {
            url: signed_url,
            token,
            subject: subject.to_string(),
        })
    }

    /// Token for an explicit URL prefix.
    pub fn token_for_prefix(&self, prefix: &str, expires: u64) -> Result<SignedUrlToken> {
        let url_prefix_b64 = STANDARD_NO_PAD.encode(prefix);
        let signing_input = format!("URLPrefix={}~Expires={}", url_prefix_b64, expires);

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| Error::Other(format!("Invalid HMAC key: {}", e)))?;
        mac.update(signing_input.as_bytes());

        Ok(SignedUrlToken {
            url_prefix_b64,
            expires,
            hmac_hex: hex::encode(mac.finalize().into_bytes()),
        })
    }
}

/// Literal `(scheme, authority, path)` of an absolute URL. The scheme is
/// lowercased; query and fragment are dropped.
fn split_url(url: &str) -> Result<(String, &str, &str)> {
    let invalid = |reason: &str| Error::InvalidUrl(format!("{}: {}", url, reason));
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| invalid("no authority"))?;
    let rest = rest.find(['?', '#']).map_or(rest, |end| &rest[..end]);
    let (authority, path) = rest.find('/').map_or((rest, ""), |start| rest.split_at(start));
    if authority.is_empty() {
        return Err(invalid("no host"));
    }
    Ok((scheme.to_ascii_lowercase(), authority, path))
}

/// URL path without surrounding slashes and without a final segment that
/// names a file.
fn prefix_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    let mut segments: Vec<&str> = trimmed.split('/').collect();
    if segments.last().is_some_and(|last| last.contains('.')) {
        segments.pop();
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
    use base64::Engine;

    use super::{prefix_path, PlayableUrl, SigningSecret, UrlSigner};
    use crate::credential::Credential;
    use crate::utils::unix_now;

    fn credential(payload: &str) -> Credential {
        Credential::new(format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", URL_SAFE_NO_PAD.encode(payload)))
    }

    #[test]
    fn prefix_drops_file_segment() {
        assert_eq!(prefix_path("/videos/abc/master.mpd"), "videos/abc");
        assert_eq!(prefix_path("/videos/abc/"), "videos/abc");
        assert_eq!(prefix_path("/index.m3u8"), "");
        assert_eq!(prefix_path("/"), "");
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = UrlSigner::default();
        let url = "https://cdn.example.com/v/a.mpd";
        let a = signer.sign_at(url, "42", 1_700_000_000).expect("sign");
        let b = signer.sign_at(url, "42", 1_700_000_000).expect("sign");
        assert_eq!(a, b);
    }

    #[test]
    fn one_character_changes_the_hmac() {
        let signer = UrlSigner::default();
        let prefix = "https://cdn.example.com/videos/abc";
        let a = signer.token_for_prefix(prefix, 1_700_000_000).expect("token");
        let b = signer
            .token_for_prefix("https://cdn.example.com/videos/abd", 1_700_000_000)
            .expect("token");
        let c = signer.token_for_prefix(prefix, 1_700_000_001).expect("token");
        assert_ne!(a.hmac_hex, b.hmac_hex);
        assert_ne!(a.hmac_hex, c.hmac_hex);

        let other = UrlSigner::new(SigningSecret::new("another secret"));
        let d = other.token_for_prefix(prefix, 1_700_000_000).expect("token");
        assert_ne!(a.hmac_hex, d.hmac_hex);
    }

    #[test]
    fn hmac_is_64_lowercase_hex() {
        let token = UrlSigner::default().token_for_prefix("https://h/p", 1).expect("token");
        assert_eq!(token.hmac_hex.len(), 64);
        assert!(token.hmac_hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn prefix_base64_round_trips() {
        let prefix = "https://cdn.example.com:8443/videos/abc";
        let token = UrlSigner::default().token_for_prefix(prefix, 1).expect("token");
        assert!(!token.url_prefix_b64.ends_with('='));

        let decoded = STANDARD_NO_PAD.decode(&token.url_prefix_b64).expect("decode");
        assert_eq!(decoded, prefix.as_bytes());
    }

    #[test]
    fn signed_url_shape() {
        let input = STANDARD.encode("https://cdn.example.com/videos/abc/master.mpd");
        let url = String::from_utf8(STANDARD.decode(input).expect("b64")).expect("utf8");
        let before = unix_now();
        let signed = UrlSigner::default().sign(&url, &credential(r#"{"id": 42}"#));
        let after = unix_now();

        let PlayableUrl::Signed { url, token, subject } = signed else {
            panic!("expected a signed url");
        };
        assert_eq!(subject, "42");
        assert_eq!(
            token.url_prefix_b64,
            STANDARD_NO_PAD.encode("https://cdn.example.com/videos/abc")
        );
        assert!(token.expires >= before + 3600 && token.expires <= after + 3600);
        assert_eq!(
            url,
            format!(
                "https://cdn.example.com/videos/abc/master.mpd?hdnts={}&userIds=42",
                format_args!(
                    "URLPrefix={}~Expires={}~hmac={}",
                    token.url_prefix_b64, token.expires, token.hmac_hex
                )
            )
        );
    }

    #[test]
    fn query_is_dropped_and_port_kept() {
        let signed = UrlSigner::default()
            .sign_at("https://cdn.example.com:8443/a/b.mpd?old=1", "7", 10)
            .expect("sign");
        assert!(signed
            .as_str()
            .starts_with("https://cdn.example.com:8443/a/b.mpd?hdnts=URLPrefix="));
        assert!(signed.as_str().ends_with("&userIds=7"));
    }

    #[test]
    fn prefix_keeps_literal_authority_and_path() {
        let signer = UrlSigner::default();
        let cases = [
            (
                "https://cdn.example.com/videos/a b/master.mpd",
                "https://cdn.example.com/videos/a b",
            ),
            (
                "https://CDN.Example.com/videos/abc/master.mpd",
                "https://CDN.Example.com/videos/abc",
            ),
            (
                "https://cdn.example.com:443/videos/abc/master.mpd",
                "https://cdn.example.com:443/videos/abc",
            ),
            (
                "https://cdn.example.com/videos/x/../abc/master.mpd",
                "https://cdn.example.com/videos/x/../abc",
            ),
        ];
        for (url, prefix) in cases {
            let PlayableUrl::Signed { url: signed, token, .. } =
                signer.sign_at(url, "7", 10).expect("sign")
            else {
                panic!("expected a signed url for {}", url);
            };
            assert_eq!(token.url_prefix_b64, STANDARD_NO_PAD.encode(prefix), "{}", url);
            assert_eq!(
                token,
                signer.token_for_prefix(prefix, 10).expect("token"),
                "{}",
                url
            );
            assert!(signed.starts_with(&format!("{}?hdnts=", url)), "{}", signed);
        }
    }

    #[test]
    fn falls_back_without_subject() {
        let url = "https://cdn.example.com/videos/abc/master.mpd";
        let signed = UrlSigner::default().sign(url, &credential(r#"{"name":"x"}"#));
        assert!(!signed.is_signed());
        assert_eq!(signed.as_str(), url);
    }

    #[test]
    fn falls_back_on_relative_url() {
        let signed =
            UrlSigner::default().sign("videos/abc/master.mpd", &credential(r#"{"id":1}"#));
        assert!(matches!(
            signed,
            PlayableUrl::Unsigned { ref reason, .. } if reason.contains("Invalid URL")
        ));
    }

    #[test]
    fn secret_is_not_printed() {
        let debug = format!("{:?}", UrlSigner::default());
        assert!(!debug.contains("classplus"));
    }
}

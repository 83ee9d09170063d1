//! Bearer credentials and the external source of fresh ones.
//!
//! A credential is an opaque `header.payload.signature` string whose payload
//! carries the subject identifier used when signing playback URLs. It is
//! never mutated: an invalid credential is replaced, not repaired.
use std::fmt;
use std::process::Command;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::utils::redact;

/// Opaque bearer credential.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw credential string; it is kept exactly as given.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw credential string, as sent in `x-access-token`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Subject identifier (`id` claim) from the credential payload.
    ///
    /// The payload segment may use the URL-safe or standard base64 alphabet,
    /// with or without padding. Numeric and string ids are both accepted.
    pub fn subject(&self) -> Result<String> {
        let payload = self
            .0
            .split('.')
            .nth(1)
            .ok_or_else(|| Error::NoSubject("credential has no payload segment".to_string()))?;

        let payload = payload.trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| STANDARD_NO_PAD.decode(payload))
            .map_err(|e| Error::NoSubject(format!("payload is not base64: {}", e)))?;

        let claims: Claims = serde_json::from_slice(&bytes)
            .map_err(|e| Error::NoSubject(format!("payload is not a JSON object: {}", e)))?;

        match claims.id {
            Some(ClaimId::Number(n)) => Ok(n.to_string()),
            Some(ClaimId::Text(s)) if !s.is_empty() => Ok(s),
            _ => Err(Error::NoSubject("payload has no id claim".to_string())),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&redact(&self.0)).finish()
    }
}

impl From<&str> for Credential {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Credential {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    id: Option<ClaimId>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClaimId {
    Number(serde_json::Number),
    Text(String),
}

/// A newly acquired credential and a label naming where it came from.
#[derive(Debug, Clone)]
pub struct FreshCredential {
    pub credential: Credential,
    pub source: Option<String>,
}

/// External source of fresh credentials.
///
/// Called at most once per request that needs a replacement credential.
pub trait CredentialSource: Send + Sync {
    fn acquire_fresh_credential(&self) -> Result<FreshCredential>;
}

impl<F> CredentialSource for F
where
    F: Fn() -> Result<FreshCredential> + Send + Sync,
{
    fn acquire_fresh_credential(&self) -> Result<FreshCredential> {
        self()
    }
}

/// Source used when no acquisition mechanism is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredCredentialSource;

impl CredentialSource for UnconfiguredCredentialSource {
    fn acquire_fresh_credential(&self) -> Result<FreshCredential> {
        Err(Error::CredentialAcquisition(
            "no credential source configured".to_string(),
        ))
    }
}

/// Runs an operator-supplied command and reads the credential from stdout.
///
/// The first non-empty output line is the credential; an optional second
/// line is reported as the source label.
#[derive(Debug, Clone)]
pub struct CommandCredentialSource {
    program: String,
    args: Vec<String>,
}

impl CommandCredentialSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from an argv-style list; `None` when the list is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

impl CredentialSource for CommandCredentialSource {
    fn acquire_fresh_credential(&self) -> Result<FreshCredential> {
        info!("Acquiring a fresh credential via {}", self.program);
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| {
                Error::CredentialAcquisition(format!("failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CredentialAcquisition(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
        let credential = lines.next().ok_or_else(|| {
            Error::CredentialAcquisition(format!("{} printed no credential", self.program))
        })?;

        Ok(FreshCredential {
            credential: Credential::new(credential),
            source: lines.next().map(str::to_string),
        })
    }
}

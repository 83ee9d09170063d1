//! Runtime configuration.
//!
//! Loaded from an optional YAML file; every field has a default. A few
//! values can be overridden from the environment so deployments can change
//! them without editing the file.
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::provider::{ProviderTimeouts, DEFAULT_API_BASE};
use crate::signer::{SigningSecret, DEFAULT_SIGNING_SECRET};

/// Overrides [`Config::api_base`].
pub const ENV_API_BASE: &str = "VODKEY_API_BASE";
/// Overrides [`Config::signing_secret`].
pub const ENV_SIGNING_SECRET: &str = "VODKEY_SIGNING_SECRET";
/// Overrides [`Config::device_dir`].
pub const ENV_DEVICE_DIR: &str = "VODKEY_DEVICE_DIR";

/// Per-call timeouts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub identity_probe_secs: u64,
    pub metadata_secs: u64,
    pub manifest_secs: u64,
    pub license_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            identity_probe_secs: 5,
            metadata_secs: 15,
            manifest_secs: 15,
            license_secs: 20,
        }
    }
}

impl Timeouts {
    pub fn provider(&self) -> ProviderTimeouts {
        ProviderTimeouts {
            identity_probe: Duration::from_secs(self.identity_probe_secs),
            metadata: Duration::from_secs(self.metadata_secs),
        }
    }

    pub fn manifest(&self) -> Duration {
        Duration::from_secs(self.manifest_secs)
    }

    pub fn license(&self) -> Duration {
        Duration::from_secs(self.license_secs)
    }
}

/// vodkey configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider API base URL.
    pub api_base: String,
    /// Shared secret for URL tokens.
    pub signing_secret: String,
    /// Directory searched for a `.wvd` device identity.
    pub device_dir: PathBuf,
    /// Lifetime of credential validity verdicts.
    pub cache_ttl_secs: u64,
    pub timeouts: Timeouts,
    /// Command (program and arguments) that prints a fresh credential.
    pub credential_command: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            signing_secret: DEFAULT_SIGNING_SECRET.to_string(),
            device_dir: PathBuf::from("WVDs"),
            cache_ttl_secs: 300,
            timeouts: Timeouts::default(),
            credential_command: None,
        }
    }
}

impl Config {
    /// Parse a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Load from `path` (or defaults) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(api_base) = lookup(ENV_API_BASE) {
            self.api_base = api_base;
        }
        if let Some(secret) = lookup(ENV_SIGNING_SECRET) {
            self.signing_secret = secret;
        }
        if let Some(dir) = lookup(ENV_DEVICE_DIR) {
            self.device_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.api_base)
            .map_err(|e| Error::Config(format!("Invalid api_base {}: {}", self.api_base, e)))?;
        if self.signing_secret.is_empty() {
            return Err(Error::Config("signing_secret must not be empty".to_string()));
        }
        let t = &self.timeouts;
        if [t.identity_probe_secs, t.metadata_secs, t.manifest_secs, t.license_secs].contains(&0) {
            return Err(Error::Config("timeouts must be at least one second".to_string()));
        }
        if self.credential_command.as_ref().is_some_and(Vec::is_empty) {
            return Err(Error::Config("credential_command must name a program".to_string()));
        }
        Ok(())
    }

    pub fn signing_secret(&self) -> SigningSecret {
        SigningSecret::new(self.signing_secret.as_bytes())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_base", &self.api_base)
            .field("signing_secret", &"<redacted>")
            .field("device_dir", &self.device_dir)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("timeouts", &self.timeouts)
            .field("credential_command", &self.credential_command)
            .finish()
    }
}

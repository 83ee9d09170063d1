//! Time-bounded memo of credential validity verdicts.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::utils::redact;

/// Default lifetime of a memoized verdict.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Asks the provider whether a credential is currently accepted.
///
/// `Ok(verdict)` is authoritative and gets memoized. [`Error::InvalidHeader`]
/// means the credential cannot be sent at all; any other `Err` means the
/// provider could not be reached.
pub trait IdentityProbe: Send + Sync {
    fn probe(&self, credential: &Credential) -> Result<bool>;
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    valid: bool,
    checked_at: Instant,
}

/// In-memory credential validity cache.
pub struct CredentialCache {
    probe: Arc<dyn IdentityProbe>,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CredentialCache {
    pub fn new(probe: Arc<dyn IdentityProbe>) -> Self {
        Self::with_ttl(probe, DEFAULT_TTL)
    }

    pub fn with_ttl(probe: Arc<dyn IdentityProbe>, ttl: Duration) -> Self {
        Self {
            probe,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `credential` is currently valid.
    ///
    /// A verdict younger than the TTL is returned without a network call.
    /// When the probe cannot reach the provider the credential is assumed
    /// valid and nothing is memoized. A credential that cannot be sent as a
    /// header is memoized as invalid.
    pub fn is_valid(&self, credential: &Credential) -> bool {
        if let Some(entry) = self.entries().get(credential.as_str()) {
            if entry.checked_at.elapsed() < self.ttl {
                trace!("Cached verdict for {}: {}", redact(credential.as_str()), entry.valid);
                return entry.valid;
            }
        }

        // The lock is not held across the probe.
        let valid = match self.probe.probe(credential) {
            Ok(valid) => valid,
            Err(e @ Error::InvalidHeader(_)) => {
                warn!("Credential cannot be sent: {}", e);
                false
            }
            Err(e) => {
                warn!("Credential validation unavailable, assuming valid: {}", e);
                return true;
            }
        };
        info!(
            "Credential {} validated: {}",
            redact(credential.as_str()),
            if valid { "VALID" } else { "INVALID" }
        );

        let now = Instant::now();
        let mut entries = self.entries();
        entries.retain(|_, entry| now.duration_since(entry.checked_at) < self.ttl);
        entries.insert(
            credential.as_str().to_string(),
            CacheEntry {
                valid,
                checked_at: now,
            },
        );
        valid
    }

    /// Number of memoized verdicts, expired ones included until the next write.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}

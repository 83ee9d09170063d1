//! License exchange against a remote license server.
//!
//! One call opens a CDM session, posts the signed challenge, parses the
//! license and returns the content keys. The session never outlives the
//! call.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cdm::Cdm;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::key::ContentKey;
use crate::license_protocol::license::key_container::KeyType;
use crate::license_protocol::LicenseType;
use crate::manifest::ProtectionHeader;
use crate::transport::{Headers, HttpTransport};

/// Default license POST timeout.
pub const DEFAULT_LICENSE_TIMEOUT: Duration = Duration::from_secs(20);

/// Longest license server body kept in an error.
const MAX_ERROR_BODY: usize = 512;

/// Closes its session on drop.
struct SessionGuard<'a> {
    cdm: &'a Cdm,
    id: Vec<u8>,
}

impl<'a> SessionGuard<'a> {
    fn open(cdm: &'a Cdm) -> Result<Self> {
        let id = cdm.open()?;
        Ok(Self { cdm, id })
    }

    fn id(&self) -> &[u8] {
        &self.id
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.cdm.close(&self.id) {
            warn!("Failed to close CDM session: {}", e);
        }
    }
}

/// License exchange client bound to one device identity.
///
/// Every call runs on its own [`Cdm`] over the shared device, so concurrent
/// exchanges are not bounded by a CDM session table.
pub struct LicenseExchange {
    device: Option<Arc<Device>>,
    device_dir: PathBuf,
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl LicenseExchange {
    /// Create an exchange client. `device` is `None` when no device
    /// identity was found in `device_dir`.
    pub fn new(
        device: Option<Arc<Device>>,
        device_dir: impl Into<PathBuf>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            device,
            device_dir: device_dir.into(),
            transport,
            timeout: DEFAULT_LICENSE_TIMEOUT,
        }
    }

    /// Load the device identity from `device_dir` and build a client.
    ///
    /// A directory without a `.wvd` file is not an error here: exchanges
    /// fail with [`Error::DeviceIdentityMissing`] instead. A bundle that
    /// exists but cannot be parsed is reported immediately.
    pub fn provision(device_dir: &Path, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let device = match Device::discover(device_dir) {
            Ok(device) => {
                info!(
                    "Loaded device identity (system id {}, {:?}, L{})",
                    device.system_id, device.device_type, device.security_level
                );
                Some(Arc::new(device))
            }
            Err(Error::DeviceIdentityMissing(dir)) => {
                warn!("No device identity in {}, key extraction disabled", dir.display());
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self::new(device, device_dir, transport))
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The loaded device identity, if any.
    pub fn device(&self) -> Option<&Device> {
        self.device.as_deref()
    }

    /// Run one license exchange and return the content keys.
    ///
    /// `auth_headers` are sent with the challenge, followed by
    /// `Content-Type: application/octet-stream`.
    pub fn exchange(
        &self,
        header: &ProtectionHeader,
        license_url: &str,
        auth_headers: &Headers,
    ) -> Result<Vec<ContentKey>> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| Error::DeviceIdentityMissing(self.device_dir.clone()))?;
        let pssh = header.to_pssh()?;

        let cdm = Cdm::new(Arc::clone(device));
        let session = SessionGuard::open(&cdm)?;
        let challenge = cdm.get_license_challenge(session.id(), &pssh, LicenseType::Streaming)?;

        let mut headers = auth_headers.clone();
        headers.push((
            "Content-Type".to_string(),
            "application/octet-stream".to_string(),
        ));

        debug!("Posting {} byte challenge to {}", challenge.len(), license_url);
        let response = self
            .transport
            .post(license_url, &headers, &challenge, self.timeout)
            .map_err(|e| Error::LicenseRequest {
                status: None,
                body: e.to_string(),
            })?;
        if !response.is_success() {
            return Err(Error::LicenseRequest {
                status: Some(response.status),
                body: response.text().trim().chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        cdm.parse_license(session.id(), &response.body)?;
        let keys: Vec<ContentKey> = cdm
            .get_keys(session.id(), Some(KeyType::Content))?
            .iter()
            .map(ContentKey::from)
            .collect();

        if keys.is_empty() {
            return Err(Error::NoContentKeys);
        }
        info!("Obtained {} content key(s)", keys.len());
        Ok(keys)
    }
}

impl std::fmt::Debug for LicenseExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseExchange")
            .field("provisioned", &self.device.is_some())
            .field("device_dir", &self.device_dir)
            .field("timeout", &self.timeout)
            .finish()
    }
}

//! Widevine Device (.wvd) identity loading.
//!
//! A device bundle holds the RSA private key and the ClientIdentification
//! blob used to sign license challenges. It is loaded once at startup and
//! shared read-only by every license exchange.
//!
//! Layout (all lengths big endian):
//! `"WVD" | version | type | security level | flags | u16 key len | key DER |
//! u16 client id len | client id | (v1 only) u16 vmp len | vmp`.

use std::path::Path;

use prost::Message;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::RsaPrivateKey;

use crate::error::{Error, Result};
use crate::license_protocol::{ClientIdentification, DrmCertificate, SignedDrmCertificate};
use crate::utils::files_with_extension;

/// Magic bytes for WVD files.
const WVD_MAGIC: &[u8; 3] = b"WVD";

/// Current WVD version.
const WVD_VERSION: u8 = 2;

/// File extension of device bundles.
pub const WVD_EXTENSION: &str = "wvd";

/// Device types supported by Widevine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceType {
    /// Chrome CDM device.
    Chrome = 1,
    /// Android CDM device.
    Android = 2,
}

impl TryFrom<u8> for DeviceType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(DeviceType::Chrome),
            2 => Ok(DeviceType::Android),
            _ => Err(Error::InvalidWvdFile(format!(
                "Invalid device type: {}",
                value
            ))),
        }
    }
}

impl From<DeviceType> for u8 {
    fn from(device_type: DeviceType) -> Self {
        device_type as u8
    }
}

/// Provisioned device identity.
#[derive(Debug)]
pub struct Device {
    /// Device type (Chrome or Android).
    pub device_type: DeviceType,
    /// Security level (1-3, where 1 is highest).
    pub security_level: u8,
    /// Device flags (reserved).
    pub flags: u8,
    /// RSA private key for signing challenges and unwrapping session keys.
    pub private_key: RsaPrivateKey,
    /// Client identification blob sent with every challenge.
    pub client_id: ClientIdentification,
    /// System ID extracted from the DRM certificate.
    pub system_id: u32,
}

impl Device {
    /// Create a Device from components.
    ///
    /// The system id is read from the signed DRM certificate carried in the
    /// client id token.
    pub fn new(
        device_type: DeviceType,
        security_level: u8,
        flags: u8,
        private_key: RsaPrivateKey,
        client_id: ClientIdentification,
    ) -> Result<Self> {
        let token = client_id
            .token
            .as_ref()
            .ok_or_else(|| Error::InvalidWvdFile("Client ID token missing".to_string()))?;

        let signed_drm_cert = SignedDrmCertificate::decode(token.as_slice()).map_err(|e| {
            Error::DecodeError(format!("Failed to parse SignedDrmCertificate: {}", e))
        })?;
        let drm_cert_bytes = signed_drm_cert
            .drm_certificate
            .as_ref()
            .ok_or_else(|| Error::InvalidWvdFile("DRM certificate missing".to_string()))?;
        let drm_cert = DrmCertificate::decode(drm_cert_bytes.as_slice())
            .map_err(|e| Error::DecodeError(format!("Failed to parse DrmCertificate: {}", e)))?;

        let system_id = drm_cert
            .system_id
            .ok_or_else(|| Error::InvalidWvdFile("System ID missing".to_string()))?;

        Ok(Self {
            device_type,
            security_level,
            flags,
            private_key,
            client_id,
            system_id,
        })
    }

    /// Load the device bundle from a WVD file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Load the first `.wvd` bundle (by file name) found in `dir`.
    ///
    /// Fails with [`Error::DeviceIdentityMissing`] when the directory is
    /// absent or holds no bundle.
    pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let path = files_with_extension(dir, WVD_EXTENSION)
            .into_iter()
            .next()
            .ok_or_else(|| Error::DeviceIdentityMissing(dir.to_path_buf()))?;

        debug!("Loading device identity from {}", path.display());
        Self::from_path(&path)
    }

    /// Parse raw WVD bytes (v1 or v2).
    ///
    /// v1 files carry VMP data after the client id; it is merged into the
    /// ClientIdentification when that has none of its own.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = WvdReader::new(data);

        if reader.take(3, "magic")? != WVD_MAGIC {
            return Err(Error::InvalidWvdFile("Invalid magic bytes".to_string()));
        }
        let version = reader.byte("version")?;
        if version != 1 && version != WVD_VERSION {
            return Err(Error::InvalidWvdFile(format!(
                "Unsupported version: {}",
                version
            )));
        }

        let device_type = DeviceType::try_from(reader.byte("device type")?)?;
        let security_level = reader.byte("security level")?;
        let flags = reader.byte("flags")?;

        let private_key_der = reader.prefixed("private key")?;
        let private_key = RsaPrivateKey::from_pkcs8_der(private_key_der)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(private_key_der))
            .map_err(|e| Error::InvalidWvdFile(format!("Failed to parse RSA key: {}", e)))?;

        let client_id_bytes = reader.prefixed("client ID")?;
        let mut client_id = ClientIdentification::decode(client_id_bytes).map_err(|e| {
            Error::DecodeError(format!("Failed to parse ClientIdentification: {}", e))
        })?;

        if version == 1 {
            let vmp = reader.prefixed("VMP")?;
            let has_vmp = client_id.vmp_data.as_ref().is_some_and(|d| !d.is_empty());
            if !vmp.is_empty() && !has_vmp {
                client_id.vmp_data = Some(vmp.to_vec());
            }
        }

        Self::new(device_type, security_level, flags, private_key, client_id)
    }

    /// Serialize to WVD v2 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let private_key_der = self
            .private_key
            .to_pkcs8_der()
            .map_err(|e| Error::Other(format!("Failed to encode RSA key: {}", e)))?;
        let client_id_bytes = self.client_id.encode_to_vec();

        let mut buf =
            Vec::with_capacity(11 + private_key_der.as_bytes().len() + client_id_bytes.len());
        buf.extend_from_slice(WVD_MAGIC);
        buf.push(WVD_VERSION);
        buf.push(self.device_type.into());
        buf.push(self.security_level);
        buf.push(self.flags);
        write_prefixed(&mut buf, private_key_der.as_bytes(), "private key")?;
        write_prefixed(&mut buf, &client_id_bytes, "client ID")?;
        Ok(buf)
    }
}

fn write_prefixed(buf: &mut Vec<u8>, data: &[u8], what: &str) -> Result<()> {
    let len = u16::try_from(data.len())
        .map_err(|_| Error::InvalidWvdFile(format!("{} is too large", what)))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(data);
    Ok(())
}

/// Bounds-checked cursor over WVD bytes.
struct WvdReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> WvdReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::InvalidWvdFile(format!("Data too short for {}", what)))?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn byte(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn prefixed(&mut self, what: &str) -> Result<&'a [u8]> {
        let len = self.take(2, what)?;
        let len = u16::from_be_bytes([len[0], len[1]]) as usize;
        self.take(len, what)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use prost::Message;
    use rsa::rand_core::OsRng;
    use rsa::RsaPrivateKey;

    use super::{Device, DeviceType};
    use crate::error::Error;
    use crate::license_protocol::client_identification::{NameValue, TokenType};
    use crate::license_protocol::{ClientIdentification, DrmCertificate, SignedDrmCertificate};

    /// Build a throwaway device with a fresh 1024-bit key.
    pub(crate) fn test_device(system_id: u32) -> Device {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).expect("generate key");
        let drm_certificate = DrmCertificate {
            system_id: Some(system_id),
            ..Default::default()
        };
        let token = SignedDrmCertificate {
            drm_certificate: Some(drm_certificate.encode_to_vec()),
            signature: Some(vec![0u8; 4]),
        };
        let client_id = ClientIdentification {
            r#type: Some(TokenType::DrmDeviceCertificate as i32),
            token: Some(token.encode_to_vec()),
            client_info: vec![NameValue {
                name: Some("company_name".to_string()),
                value: Some("vodkey".to_string()),
            }],
            ..Default::default()
        };
        Device::new(DeviceType::Chrome, 3, 0, private_key, client_id).expect("device")
    }

    #[test]
    fn wvd_roundtrip_v2() {
        let device = test_device(4464);
        let bytes = device.to_bytes().expect("serialize");
        assert_eq!(&bytes[..4], b"WVD\x02");

        let parsed = Device::from_bytes(&bytes).expect("parse");
        assert_eq!(parsed.system_id, 4464);
        assert_eq!(parsed.device_type, DeviceType::Chrome);
        assert_eq!(parsed.security_level, 3);
        assert_eq!(parsed.client_id, device.client_id);
    }

    #[test]
    fn wvd_v1_merges_vmp() {
        let device = test_device(7);
        let mut bytes = device.to_bytes().expect("serialize");
        bytes[3] = 1;
        bytes.extend_from_slice(&3u16.to_be_bytes());
        bytes.extend_from_slice(b"vmp");

        let parsed = Device::from_bytes(&bytes).expect("parse v1");
        assert_eq!(parsed.client_id.vmp_data.as_deref(), Some(&b"vmp"[..]));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let device = test_device(7);
        let bytes = device.to_bytes().expect("serialize");
        let err = Device::from_bytes(&bytes[..20]).expect_err("truncated");
        assert!(matches!(err, Error::InvalidWvdFile(_)));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let err = Device::from_bytes(b"XYZ\x02\x01\x03\x00\x00").expect_err("magic");
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn discover_picks_first_bundle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let device = test_device(99);
        std::fs::write(dir.path().join("b_device.wvd"), b"garbage").expect("write");
        std::fs::write(
            dir.path().join("a_device.wvd"),
            device.to_bytes().expect("serialize"),
        )
        .expect("write");

        let loaded = Device::discover(dir.path()).expect("discover");
        assert_eq!(loaded.system_id, 99);
    }

    #[test]
    fn discover_without_bundle_is_missing_identity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Device::discover(dir.path()).expect_err("no device");
        assert!(matches!(err, Error::DeviceIdentityMissing(ref p) if p == dir.path()));
    }
}

//! Keys unwrapped from License messages.
//!
//! Key containers are decrypted with AES-128-CBC under the derived
//! encryption key. Only CONTENT keys leave the crate, as [`ContentKey`].

use std::fmt;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::license_protocol::license::key_container::KeyType;
use crate::license_protocol::license::KeyContainer;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// A decrypted key of any type.
#[derive(Debug, Clone)]
pub struct Key {
    /// Key purpose as declared by the license.
    pub key_type: KeyType,
    /// Key ID as UUID.
    pub kid: Uuid,
    /// Decrypted key bytes.
    pub key: Vec<u8>,
}

impl Key {
    /// Decrypt a key container with the session's derived encryption key.
    pub fn from_key_container(container: &KeyContainer, enc_key: &[u8]) -> Result<Self> {
        let key_type = container
            .r#type
            .and_then(|v| KeyType::try_from(v).ok())
            .ok_or_else(|| Error::InvalidLicenseMessage("Missing key type".to_string()))?;

        let kid_bytes = container
            .id
            .as_deref()
            .ok_or_else(|| Error::InvalidLicenseMessage("Missing key ID".to_string()))?;
        let key_bytes = container
            .key
            .as_deref()
            .ok_or_else(|| Error::InvalidLicenseMessage("Missing key bytes".to_string()))?;
        let iv_bytes = container
            .iv
            .as_deref()
            .ok_or_else(|| Error::InvalidLicenseMessage("Missing IV bytes".to_string()))?;

        Ok(Self {
            key_type,
            kid: Self::kid_to_uuid(kid_bytes),
            key: decrypt_key(key_bytes, iv_bytes, enc_key)?,
        })
    }

    /// Whether the key decrypts media (as opposed to signing or control keys).
    #[must_use]
    pub fn is_content(&self) -> bool {
        self.key_type == KeyType::Content
    }

    /// Convert a Key ID to a UUID.
    ///
    /// Handles various formats:
    /// - Decimal ASCII bytes: parsed as integer
    /// - 16 bytes: direct UUID bytes
    /// - 32 bytes: hex-encoded UUID string
    /// - Other lengths: zero padded or truncated to 16 bytes
    #[must_use]
    pub fn kid_to_uuid(kid: &[u8]) -> Uuid {
        if kid.is_empty() {
            return Uuid::nil();
        }

        if let Ok(s) = std::str::from_utf8(kid) {
            if s.bytes().all(|c| c.is_ascii_digit()) {
                if let Ok(n) = s.parse::<u128>() {
                    return Uuid::from_u128(n);
                }
            }
            if kid.len() == 32 {
                if let Ok(uuid) = Uuid::parse_str(s) {
                    return uuid;
                }
            }
        }

        let mut buf = [0u8; 16];
        let len = kid.len().min(16);
        buf[..len].copy_from_slice(&kid[..len]);
        Uuid::from_bytes(buf)
    }
}

fn decrypt_key(encrypted_key: &[u8], iv: &[u8], enc_key: &[u8]) -> Result<Vec<u8>> {
    let decryptor = Aes128CbcDec::new_from_slices(enc_key, iv).map_err(|_| {
        Error::InvalidLicenseMessage(format!(
            "Invalid key/IV length: {}/{}",
            enc_key.len(),
            iv.len()
        ))
    })?;

    let mut buffer = encrypted_key.to_vec();
    let decrypted = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|e| Error::InvalidLicenseMessage(format!("Failed to decrypt key: {}", e)))?;
    Ok(decrypted.to_vec())
}

/// A content key rendered as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentKey {
    /// Key ID, 32 hex characters.
    pub kid: String,
    /// Key bytes, hex.
    pub key: String,
}

impl ContentKey {
    /// Render the key as an `mp4decrypt`-style `--key kid:key` argument.
    #[must_use]
    pub fn decrypt_arg(&self) -> String {
        format!("--key {}:{}", self.kid, self.key)
    }
}

impl From<&Key> for ContentKey {
    fn from(key: &Key) -> Self {
        Self {
            kid: key.kid.as_simple().to_string(),
            key: hex::encode(&key.key),
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kid, self.key)
    }
}

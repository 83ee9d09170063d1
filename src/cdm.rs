//! Local Widevine Content Decryption Module.
//!
//! Handles session lifecycle, license challenge generation, license parsing
//! and key derivation against a provisioned [`Device`]. The device is shared
//! read-only; the session table sits behind a mutex so one `Cdm` can serve
//! concurrent exchanges.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aes::Aes128;
use cmac::Cmac;
use hmac::{Hmac, Mac};
use prost::Message;
use rsa::rand_core::{OsRng, RngCore};
use rsa::{Oaep, Pss, RsaPrivateKey};
use sha1::{Digest as Sha1Digest, Sha1};
use sha2::Sha256;

use crate::device::{Device, DeviceType};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::license_protocol::license::key_container::KeyType;
use crate::license_protocol::license_request::content_identification::{
    ContentIdVariant, WidevinePsshData as WidevinePsshDataRequest,
};
use crate::license_protocol::license_request::{ContentIdentification, RequestType};
use crate::license_protocol::signed_message::MessageType;
use crate::license_protocol::{
    License, LicenseRequest, LicenseType, ProtocolVersion, SignedMessage,
};
use crate::pssh::Pssh;
use crate::session::{RequestContext, Session};
use crate::utils::unix_now;

type HmacSha256 = Hmac<Sha256>;
type CmacAes128 = Cmac<Aes128>;

/// Widevine URN used as `schemeIdUri` in DASH manifests.
pub const WIDEVINE_URN: &str = "urn:uuid:edef8ba9-79d6-4ace-a3c8-27dcd51d21ed";

/// Keys derived from a session key: `(enc_key, mac_key_server, mac_key_client)`.
pub type DerivedKeys = (Vec<u8>, Vec<u8>, Vec<u8>);

/// Widevine Content Decryption Module (CDM).
#[derive(Debug)]
pub struct Cdm {
    device: Arc<Device>,
    sessions: Mutex<HashMap<Vec<u8>, Session>>,
}

impl Cdm {
    /// Maximum number of concurrently opened sessions.
    pub const MAX_NUM_OF_SESSIONS: usize = 16;

    /// Create a CDM over a shared device identity.
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Create a CDM that owns a parsed device.
    pub fn from_device(device: Device) -> Self {
        Self::new(Arc::new(device))
    }

    /// The device identity this CDM signs with.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Number of sessions currently open.
    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    /// Open a new session and return its session id.
    ///
    /// Returns an error if the maximum number of sessions has been reached.
    pub fn open(&self) -> Result<Vec<u8>> {
        let mut sessions = self.sessions();
        if sessions.len() >= Self::MAX_NUM_OF_SESSIONS {
            return Err(Error::TooManySessions {
                max: Self::MAX_NUM_OF_SESSIONS,
            });
        }

        let session = Session::new(sessions.len() as u32 + 1);
        let session_id = session.id.clone();
        sessions.insert(session_id.clone(), session);
        trace!("Opened session {}", hex::encode(&session_id));
        Ok(session_id)
    }

    /// Close a session by id.
    pub fn close(&self, session_id: &[u8]) -> Result<()> {
        if self.sessions().remove(session_id).is_none() {
            return Err(Error::InvalidSession(session_id.to_vec()));
        }
        trace!("Closed session {}", hex::encode(session_id));
        Ok(())
    }

    /// Build a signed license request for the given PSSH.
    ///
    /// For Android devices, the request_id is generated in a counter-like form
    /// to match OEMCrypto behavior.
    pub fn get_license_challenge(
        &self,
        session_id: &[u8],
        pssh: &Pssh,
        license_type: LicenseType,
    ) -> Result<Vec<u8>> {
        let number = self
            .sessions()
            .get(session_id)
            .map(|session| session.number)
            .ok_or_else(|| Error::InvalidSession(session_id.to_vec()))?;

        let request_id = if self.device.device_type == DeviceType::Android {
            let mut req = [0u8; 16];
            OsRng.fill_bytes(&mut req[..4]);
            // bytes 4..8 remain 0
            req[8..].copy_from_slice(&u64::from(number).to_le_bytes());
            req.iter()
                .map(|b| format!("{:02X}", b))
                .collect::<String>()
                .into_bytes()
        } else {
            let mut req = vec![0u8; 16];
            OsRng.fill_bytes(&mut req);
            req
        };

        let content_id = ContentIdentification {
            content_id_variant: Some(ContentIdVariant::WidevinePsshData(
                WidevinePsshDataRequest {
                    pssh_data: vec![pssh.init_data.clone()],
                    license_type: Some(license_type as i32),
                    request_id: Some(request_id.clone()),
                },
            )),
        };

        let license_request = LicenseRequest {
            client_id: Some(self.device.client_id.clone()),
            content_id: Some(content_id),
            r#type: Some(RequestType::New as i32),
            request_time: Some(unix_now() as i64),
            key_control_nonce_deprecated: None,
            protocol_version: Some(ProtocolVersion::Version21 as i32),
            key_control_nonce: Some(random_u32()),
            encrypted_client_id: None,
        };

        let license_request_bytes = license_request.encode_to_vec();
        let signature = sign_pss_sha1(&self.device.private_key, &license_request_bytes)?;

        let signed_message = SignedMessage {
            r#type: Some(MessageType::LicenseRequest as i32),
            msg: Some(license_request_bytes.clone()),
            signature: Some(signature),
            ..Default::default()
        };

        self.sessions()
            .get_mut(session_id)
            .ok_or_else(|| Error::InvalidSession(session_id.to_vec()))?
            .context
            .insert(request_id, Self::derive_context(&license_request_bytes));

        Ok(signed_message.encode_to_vec())
    }

    /// Parse a license response and load keys into the session.
    ///
    /// This validates the HMAC signature (including oemcrypto_core_message if
    /// present), derives session keys, and decrypts every key container.
    /// Context is removed after successful parsing. If the session has no
    /// context, the license did not originate from this session.
    pub fn parse_license(&self, session_id: &[u8], license_message: &[u8]) -> Result<()> {
        let signed_message = SignedMessage::decode(license_message).map_err(|e| {
            Error::InvalidLicenseMessage(format!("Failed to parse SignedMessage: {}", e))
        })?;

        if signed_message.r#type != Some(MessageType::License as i32) {
            return Err(Error::InvalidLicenseMessage(
                "Expected LICENSE message".to_string(),
            ));
        }

        let msg_bytes = signed_message
            .msg
            .as_ref()
            .ok_or_else(|| Error::InvalidLicenseMessage("Missing license message".to_string()))?;

        let license = License::decode(msg_bytes.as_slice())
            .map_err(|e| Error::InvalidLicenseMessage(format!("Failed to parse License: {}", e)))?;

        let request_id = license
            .id
            .as_ref()
            .and_then(|id| id.request_id.clone())
            .ok_or_else(|| Error::InvalidContext("Missing request_id".to_string()))?;

        let (enc_context, mac_context) = self.request_context(session_id, &request_id)?;

        let session_key = signed_message
            .session_key
            .as_ref()
            .ok_or_else(|| Error::InvalidLicenseMessage("Missing session_key".to_string()))?;

        let decrypted_session_key = self
            .device
            .private_key
            .decrypt(Oaep::new::<Sha1>(), session_key)
            .map_err(Error::RsaError)?;

        let (enc_key, mac_key_server, _) =
            Self::derive_keys(&enc_context, &mac_context, &decrypted_session_key)?;

        let signature = signed_message
            .signature
            .as_ref()
            .ok_or_else(|| Error::InvalidLicenseMessage("Missing signature".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(&mac_key_server)
            .map_err(|e| Error::Other(format!("Invalid HMAC key: {}", e)))?;
        if let Some(ref core) = signed_message.oemcrypto_core_message {
            mac.update(core);
        }
        mac.update(msg_bytes);
        mac.verify_slice(signature).map_err(|_| {
            Error::SignatureMismatch("Signature mismatch on license message".to_string())
        })?;

        let keys = license
            .key
            .iter()
            .map(|container| Key::from_key_container(container, &enc_key))
            .collect::<Result<Vec<_>>>()?;
        debug!("License carried {} key(s)", keys.len());

        let mut sessions = self.sessions();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::InvalidSession(session_id.to_vec()))?;
        session.keys = keys;
        session.context.remove(&request_id);
        Ok(())
    }

    /// Return decrypted keys from a session, optionally filtered by key type.
    pub fn get_keys(&self, session_id: &[u8], key_type: Option<KeyType>) -> Result<Vec<Key>> {
        let sessions = self.sessions();
        let session = sessions
            .get(session_id)
            .ok_or_else(|| Error::InvalidSession(session_id.to_vec()))?;

        Ok(session
            .keys
            .iter()
            .filter(|k| key_type.map_or(true, |t| k.key_type == t))
            .cloned()
            .collect())
    }

    /// Derive encryption and MAC context from a message.
    ///
    /// Context format follows Widevine's ENCRYPTION/AUTHENTICATION labels.
    #[must_use]
    pub fn derive_context(message: &[u8]) -> RequestContext {
        fn enc_context(msg: &[u8]) -> Vec<u8> {
            let mut out = Vec::with_capacity(11 + msg.len() + 4);
            out.extend_from_slice(b"ENCRYPTION");
            out.push(0);
            out.extend_from_slice(msg);
            out.extend_from_slice(&(16u32 * 8).to_be_bytes());
            out
        }

        fn mac_context(msg: &[u8]) -> Vec<u8> {
            let mut out = Vec::with_capacity(15 + msg.len() + 4);
            out.extend_from_slice(b"AUTHENTICATION");
            out.push(0);
            out.extend_from_slice(msg);
            out.extend_from_slice(&(32u32 * 8 * 2).to_be_bytes());
            out
        }

        (enc_context(message), mac_context(message))
    }

    /// Derive encryption and MAC keys from context and session key.
    ///
    /// Returns (enc_key, mac_key_server, mac_key_client) using AES-CMAC over
    /// the context data. The session key must be 16 bytes.
    pub fn derive_keys(enc_context: &[u8], mac_context: &[u8], key: &[u8]) -> Result<DerivedKeys> {
        fn derive(session_key: &[u8], context: &[u8], counter: u8) -> Result<Vec<u8>> {
            let mut mac = CmacAes128::new_from_slice(session_key).map_err(|_| {
                Error::InvalidLicenseMessage(format!(
                    "Invalid session key length: {}",
                    session_key.len()
                ))
            })?;
            mac.update(&[counter]);
            mac.update(context);
            Ok(mac.finalize().into_bytes().to_vec())
        }

        let enc_key = derive(key, enc_context, 1)?;
        let mut mac_key_server = derive(key, mac_context, 1)?;
        mac_key_server.extend_from_slice(&derive(key, mac_context, 2)?);
        let mut mac_key_client = derive(key, mac_context, 3)?;
        mac_key_client.extend_from_slice(&derive(key, mac_context, 4)?);
        Ok((enc_key, mac_key_server, mac_key_client))
    }

    fn request_context(&self, session_id: &[u8], request_id: &[u8]) -> Result<RequestContext> {
        self.sessions()
            .get(session_id)
            .ok_or_else(|| Error::InvalidSession(session_id.to_vec()))?
            .context
            .get(request_id)
            .cloned()
            .ok_or_else(|| Error::InvalidContext("Missing context".to_string()))
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Vec<u8>, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn sign_pss_sha1(private_key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>> {
    let hash = Sha1::digest(message);
    let signature = private_key
        .sign_with_rng(&mut OsRng, Pss::new::<Sha1>(), &hash)
        .map_err(Error::RsaError)?;
    Ok(signature)
}

#[must_use]
fn random_u32() -> u32 {
    OsRng.next_u32()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
    use hmac::Mac;
    use prost::Message;
    use rsa::rand_core::{OsRng, RngCore};
    use rsa::{Oaep, Pss, RsaPublicKey};
    use sha1::{Digest, Sha1};
    use uuid::Uuid;

    use super::{Cdm, HmacSha256};
    use crate::device::tests::test_device;
    use crate::device::Device;
    use crate::error::Error;
    use crate::license_protocol::license::key_container::KeyType;
    use crate::license_protocol::license::KeyContainer;
    use crate::license_protocol::license_request::content_identification::ContentIdVariant;
    use crate::license_protocol::signed_message::MessageType;
    use crate::license_protocol::{
        License, LicenseIdentification, LicenseRequest, LicenseType, SignedMessage,
    };
    use crate::pssh::{Pssh, WIDEVINE_SYSTEM_ID};

    type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

    /// Answer a challenge the way a license server would: wrap a fresh
    /// session key for the device and sign a License carrying `keys`.
    pub(crate) fn build_license(
        device: &Device,
        challenge: &[u8],
        keys: &[(KeyType, Uuid, Vec<u8>)],
    ) -> Vec<u8> {
        let signed = SignedMessage::decode(challenge).expect("signed challenge");
        let msg = signed.msg.expect("challenge msg");
        let request = LicenseRequest::decode(msg.as_slice()).expect("license request");
        let request_id = match request
            .content_id
            .and_then(|c| c.content_id_variant)
            .expect("content id")
        {
            ContentIdVariant::WidevinePsshData(data) => data.request_id.expect("request id"),
        };

        let mut session_key = [0u8; 16];
        OsRng.fill_bytes(&mut session_key);
        let public_key = RsaPublicKey::from(&device.private_key);
        let wrapped_session_key = public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha1>(), &session_key)
            .expect("wrap session key");

        let (enc_ctx, mac_ctx) = Cdm::derive_context(&msg);
        let (enc_key, mac_key_server, _) =
            Cdm::derive_keys(&enc_ctx, &mac_ctx, &session_key).expect("derive");

        let containers = keys
            .iter()
            .map(|(key_type, kid, key)| {
                let mut iv = [0u8; 16];
                OsRng.fill_bytes(&mut iv);
                let enc_key: [u8; 16] = enc_key.as_slice().try_into().expect("16-byte key");
                KeyContainer {
                    id: Some(kid.as_bytes().to_vec()),
                    iv: Some(iv.to_vec()),
                    key: Some(
                        Aes128CbcEnc::new(&enc_key.into(), &iv.into())
                            .encrypt_padded_vec_mut::<Pkcs7>(key),
                    ),
                    r#type: Some(*key_type as i32),
                    ..Default::default()
                }
            })
            .collect();

        let license = License {
            id: Some(LicenseIdentification {
                request_id: Some(request_id),
                r#type: Some(LicenseType::Streaming as i32),
                ..Default::default()
            }),
            key: containers,
            ..Default::default()
        }
        .encode_to_vec();

        let core = b"core-message".to_vec();
        let mut mac = HmacSha256::new_from_slice(&mac_key_server).expect("hmac");
        mac.update(&core);
        mac.update(&license);

        SignedMessage {
            r#type: Some(MessageType::License as i32),
            msg: Some(license),
            signature: Some(mac.finalize().into_bytes().to_vec()),
            session_key: Some(wrapped_session_key),
            oemcrypto_core_message: Some(core),
            ..Default::default()
        }
        .encode_to_vec()
    }

    fn test_pssh() -> Pssh {
        Pssh::new(WIDEVINE_SYSTEM_ID, None, Some(b"init-data".to_vec()), 0, 0).expect("pssh")
    }

    #[test]
    fn derive_context_contains_labels() {
        let message = b"test-message";
        let (enc, mac) = Cdm::derive_context(message);

        assert!(enc.starts_with(b"ENCRYPTION\0"));
        assert!(mac.starts_with(b"AUTHENTICATION\0"));
        assert!(enc.windows(message.len()).any(|w| w == message));
        assert!(mac.windows(message.len()).any(|w| w == message));
    }

    #[test]
    fn derive_keys_lengths() {
        let (enc_ctx, mac_ctx) = Cdm::derive_context(b"context");
        let (enc_key, mac_server, mac_client) =
            Cdm::derive_keys(&enc_ctx, &mac_ctx, &[0u8; 16]).expect("derive");

        assert_eq!(enc_key.len(), 16);
        assert_eq!(mac_server.len(), 32);
        assert_eq!(mac_client.len(), 32);
    }

    #[test]
    fn derive_keys_rejects_bad_session_key() {
        let (enc_ctx, mac_ctx) = Cdm::derive_context(b"context");
        assert!(Cdm::derive_keys(&enc_ctx, &mac_ctx, &[0u8; 5]).is_err());
    }

    #[test]
    fn session_limit_is_enforced() {
        let cdm = Cdm::from_device(test_device(1));
        let ids: Vec<_> = (0..Cdm::MAX_NUM_OF_SESSIONS)
            .map(|_| cdm.open().expect("open"))
            .collect();
        assert!(matches!(cdm.open(), Err(Error::TooManySessions { max: 16 })));

        cdm.close(&ids[0]).expect("close");
        assert!(cdm.open().is_ok());
    }

    #[test]
    fn closing_unknown_session_fails() {
        let cdm = Cdm::from_device(test_device(1));
        assert!(matches!(cdm.close(b"nope"), Err(Error::InvalidSession(_))));
    }

    #[test]
    fn challenge_is_signed_license_request() {
        let cdm = Cdm::from_device(test_device(1));
        let session_id = cdm.open().expect("open");
        let challenge = cdm
            .get_license_challenge(&session_id, &test_pssh(), LicenseType::Streaming)
            .expect("challenge");

        let signed = SignedMessage::decode(challenge.as_slice()).expect("decode");
        assert_eq!(signed.r#type, Some(MessageType::LicenseRequest as i32));
        let msg = signed.msg.expect("msg");
        let request = LicenseRequest::decode(msg.as_slice()).expect("request");
        assert!(request.client_id.is_some());
        assert!(request.key_control_nonce.is_some());

        let public_key = RsaPublicKey::from(&cdm.device().private_key);
        public_key
            .verify(
                Pss::new::<Sha1>(),
                &Sha1::digest(&msg),
                &signed.signature.expect("signature"),
            )
            .expect("valid PSS signature");
    }

    #[test]
    fn license_round_trip_loads_keys() {
        let device = Arc::new(test_device(1));
        let cdm = Cdm::new(Arc::clone(&device));
        let session_id = cdm.open().expect("open");
        let challenge = cdm
            .get_license_challenge(&session_id, &test_pssh(), LicenseType::Streaming)
            .expect("challenge");

        let kid = Uuid::new_v4();
        let license = build_license(
            &device,
            &challenge,
            &[
                (KeyType::Signing, Uuid::nil(), vec![1; 32]),
                (KeyType::Content, kid, vec![0xAB; 16]),
            ],
        );
        cdm.parse_license(&session_id, &license).expect("parse");

        assert_eq!(cdm.get_keys(&session_id, None).expect("keys").len(), 2);
        let content = cdm
            .get_keys(&session_id, Some(KeyType::Content))
            .expect("content keys");
        assert_eq!(content.len(), 1);
        assert_eq!(content[0].kid, kid);
        assert_eq!(content[0].key, vec![0xAB; 16]);
    }

    #[test]
    fn tampered_license_is_rejected() {
        let device = Arc::new(test_device(1));
        let cdm = Cdm::new(Arc::clone(&device));
        let session_id = cdm.open().expect("open");
        let challenge = cdm
            .get_license_challenge(&session_id, &test_pssh(), LicenseType::Streaming)
            .expect("challenge");

        let license = build_license(
            &device,
            &challenge,
            &[(KeyType::Content, Uuid::new_v4(), vec![2; 16])],
        );
        let mut signed = SignedMessage::decode(license.as_slice()).expect("decode");
        signed.oemcrypto_core_message = Some(b"tampered".to_vec());

        let err = cdm
            .parse_license(&session_id, &signed.encode_to_vec())
            .expect_err("tampered");
        assert!(matches!(err, Error::SignatureMismatch(_)));
    }

    #[test]
    fn license_for_other_session_has_no_context() {
        let device = Arc::new(test_device(1));
        let cdm = Cdm::new(Arc::clone(&device));
        let first = cdm.open().expect("open");
        let second = cdm.open().expect("open");
        let challenge = cdm
            .get_license_challenge(&first, &test_pssh(), LicenseType::Streaming)
            .expect("challenge");
        let license = build_license(&device, &challenge, &[]);

        let err = cdm.parse_license(&second, &license).expect_err("wrong session");
        assert!(matches!(err, Error::InvalidContext(_)));
    }
}

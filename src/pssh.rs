//! PSSH parsing.
//!
//! Accepts a full `pssh` box, bare Widevine CencHeader data, or (leniently)
//! arbitrary init data, which is wrapped as a v0 Widevine box.
use std::str::FromStr;

use base64::Engine;
use byteorder::{BigEndian, ByteOrder};
use prost::Message;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::license_protocol::WidevinePsshData;

/// Widevine system UUID.
pub const WIDEVINE_SYSTEM_ID: Uuid = Uuid::from_u128(0xedef8ba979d64acea3c827dcd51d21ed);

/// Parsed PSSH box or DRM init data wrapper.
#[derive(Debug, Clone)]
pub struct Pssh {
    pub version: u8,
    pub flags: u32,
    pub system_id: Uuid,
    key_ids: Vec<Uuid>,
    pub init_data: Vec<u8>,
}

impl Pssh {
    /// Parse a PSSH box or init data from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::InvalidInitData("Data must not be empty".to_string()));
        }

        if let Ok(pssh) = parse_pssh_box(data) {
            return Ok(pssh);
        }

        if let Ok(pssh) = parse_widevine_pssh_data(data) {
            return Ok(pssh);
        }

        trace!("Init data is neither a box nor CencHeader, wrapping as Widevine");
        Pssh::new(WIDEVINE_SYSTEM_ID, None, Some(data.to_vec()), 0, 0)
    }

    /// Parse a base64 PSSH box or init data. Surrounding whitespace is ignored.
    pub fn from_base64(data_b64: &str) -> Result<Self> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(data_b64.trim())
            .map_err(Error::Base64DecodeError)?;
        Self::from_bytes(&data)
    }

    /// Create a new PSSH box wrapper.
    ///
    /// Version 0 uses only init_data. Version 1 requires init_data or key_ids.
    pub fn new(
        system_id: Uuid,
        key_ids: Option<Vec<Uuid>>,
        init_data: Option<Vec<u8>>,
        version: u8,
        flags: u32,
    ) -> Result<Self> {
        match (version, &key_ids, &init_data) {
            (0, Some(_), Some(_)) => Err(Error::InvalidInitData(
                "Version 0 PSSH boxes must use only init_data".to_string(),
            )),
            (1, None, None) => Err(Error::InvalidInitData(
                "Version 1 PSSH boxes must use init_data or key_ids".to_string(),
            )),
            (0 | 1, _, _) => Ok(Self {
                version,
                flags,
                system_id,
                key_ids: key_ids.unwrap_or_default(),
                init_data: init_data.unwrap_or_default(),
            }),
            _ => Err(Error::InvalidInitData(format!(
                "Invalid version: {}",
                version
            ))),
        }
    }

    /// Whether this box targets the Widevine system.
    #[must_use]
    pub fn is_widevine(&self) -> bool {
        self.system_id == WIDEVINE_SYSTEM_ID
    }

    /// Serialize as a full PSSH box.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        build_pssh_box(self)
    }

    /// Serialize as a base64 PSSH box.
    #[must_use]
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.to_bytes())
    }

    /// Key IDs carried by the box (v1) or its Widevine CencHeader.
    pub fn key_ids(&self) -> Result<Vec<Uuid>> {
        if self.version == 1 && !self.key_ids.is_empty() {
            return Ok(self.key_ids.clone());
        }

        if !self.is_widevine() {
            return Err(Error::InvalidInitData(format!(
                "Unsupported system ID {} for key_ids",
                self.system_id
            )));
        }

        let pssh_data = WidevinePsshData::decode(self.init_data.as_slice())
            .map_err(|e| Error::DecodeError(format!("Failed to parse WidevinePsshData: {}", e)))?;
        Ok(pssh_data
            .key_ids
            .iter()
            .map(|key_id| parse_key_id_bytes(key_id))
            .collect())
    }
}

impl FromStr for Pssh {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Pssh::from_base64(s)
    }
}

fn parse_pssh_box(data: &[u8]) -> Result<Pssh> {
    if data.len() < 8 {
        return Err(Error::InvalidInitData("Data too short".to_string()));
    }

    let size = BigEndian::read_u32(&data[0..4]) as usize;
    if &data[4..8] != b"pssh" {
        return Err(Error::InvalidInitData("Not a PSSH box".to_string()));
    }
    let mut offset = 8;

    let box_size = match size {
        0 => data.len(),
        1 => {
            if data.len() < 16 {
                return Err(Error::InvalidInitData("Data too short".to_string()));
            }
            offset += 8;
            BigEndian::read_u64(&data[8..16]) as usize
        }
        size => size,
    };
    if box_size > data.len() {
        return Err(Error::InvalidInitData("PSSH size exceeds data length".to_string()));
    }
    if data.len() < offset + 4 + 16 {
        return Err(Error::InvalidInitData("PSSH header incomplete".to_string()));
    }

    let version = data[offset];
    let flags = BigEndian::read_u24(&data[offset + 1..offset + 4]);
    offset += 4;

    let system_id = Uuid::from_slice(&data[offset..offset + 16])
        .map_err(|_| Error::InvalidInitData("Invalid system ID".to_string()))?;
    offset += 16;

    let mut key_ids = Vec::new();
    if version == 1 {
        if data.len() < offset + 4 {
            return Err(Error::InvalidInitData("Missing KID count".to_string()));
        }
        let kid_count = BigEndian::read_u32(&data[offset..offset + 4]) as usize;
        offset += 4;

        let kids_end = kid_count
            .checked_mul(16)
            .and_then(|len| len.checked_add(offset))
            .filter(|end| *end <= data.len())
            .ok_or_else(|| Error::InvalidInitData("Missing KIDs".to_string()))?;
        key_ids.extend(
            data[offset..kids_end]
                .chunks_exact(16)
                .map(|kid| Uuid::from_slice(kid).unwrap_or_else(|_| Uuid::nil())),
        );
        offset = kids_end;
    }

    if data.len() < offset + 4 {
        return Err(Error::InvalidInitData("Missing init data length".to_string()));
    }
    let data_size = BigEndian::read_u32(&data[offset..offset + 4]) as usize;
    offset += 4;
    if data.len() - offset < data_size {
        return Err(Error::InvalidInitData("Missing init data".to_string()));
    }

    Ok(Pssh {
        version,
        flags,
        system_id,
        key_ids,
        init_data: data[offset..offset + data_size].to_vec(),
    })
}

fn build_pssh_box(pssh: &Pssh) -> Vec<u8> {
    let mut body = Vec::new();
    body.push(pssh.version);
    let mut flags = [0u8; 3];
    BigEndian::write_u24(&mut flags, pssh.flags & 0x00FF_FFFF);
    body.extend_from_slice(&flags);
    body.extend_from_slice(pssh.system_id.as_bytes());

    if pssh.version == 1 {
        body.extend_from_slice(&(pssh.key_ids.len() as u32).to_be_bytes());
        for kid in &pssh.key_ids {
            body.extend_from_slice(kid.as_bytes());
        }
    }

    body.extend_from_slice(&(pssh.init_data.len() as u32).to_be_bytes());
    body.extend_from_slice(&pssh.init_data);

    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(&((body.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(b"pssh");
    out.extend_from_slice(&body);
    out
}

/// Accept bare CencHeader bytes only when they re-encode identically.
fn parse_widevine_pssh_data(data: &[u8]) -> Result<Pssh> {
    let pssh_data = WidevinePsshData::decode(data)
        .map_err(|e| Error::DecodeError(format!("Failed to parse WidevinePsshData: {}", e)))?;
    let encoded = pssh_data.encode_to_vec();
    if encoded != data {
        return Err(Error::InvalidInitData("Partial WidevinePsshData parse".to_string()));
    }

    Pssh::new(WIDEVINE_SYSTEM_ID, None, Some(encoded), 0, 0)
}

fn parse_key_id_bytes(key_id: &[u8]) -> Uuid {
    if key_id.len() == 16 {
        return Uuid::from_slice(key_id).unwrap_or_else(|_| Uuid::nil());
    }

    if key_id.len() == 32 {
        if let Some(uuid) = std::str::from_utf8(key_id)
            .ok()
            .and_then(|s| Uuid::parse_str(s).ok())
        {
            return uuid;
        }
    }

    let mut buf = [0u8; 16];
    if key_id.len() >= 16 {
        buf.copy_from_slice(&key_id[key_id.len() - 16..]);
    } else {
        buf[16 - key_id.len()..].copy_from_slice(key_id);
    }
    Uuid::from_bytes(buf)
}

//! CDM session state.
//!
//! A session lives for exactly one license exchange: it records the derived
//! request contexts of every challenge it issued and the keys loaded from
//! the matching license.

use std::collections::HashMap;

use rsa::rand_core::{OsRng, RngCore};

use crate::key::Key;

/// Derived `(encryption, authentication)` contexts of one license request.
pub type RequestContext = (Vec<u8>, Vec<u8>);

/// A Widevine CDM session.
#[derive(Debug)]
pub struct Session {
    /// Session number (1-indexed), used for Android request ids.
    pub number: u32,
    /// Unique session identifier (16 random bytes).
    pub id: Vec<u8>,
    /// Maps request_id to the contexts derived from that request.
    pub context: HashMap<Vec<u8>, RequestContext>,
    /// Decrypted keys from the license.
    pub keys: Vec<Key>,
}

impl Session {
    /// Create a new session with the given session number.
    pub fn new(number: u32) -> Self {
        let mut id = vec![0u8; 16];
        OsRng.fill_bytes(&mut id);

        Self {
            number,
            id,
            context: HashMap::new(),
            keys: Vec::new(),
        }
    }
}

//! DASH manifest inspection.
//!
//! Locates the Widevine protection header (`cenc:pssh`) in an MPD document.
use std::fmt;

use roxmltree::{Document, Node};

use crate::cdm::WIDEVINE_URN;
use crate::error::{Error, Result};
use crate::pssh::Pssh;

/// Namespace of the `cenc:pssh` element.
pub const CENC_NAMESPACE: &str = "urn:mpeg:cenc:2013";

/// Base64 protection header text taken from a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionHeader(String);

impl ProtectionHeader {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into().trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the header into a PSSH box.
    pub fn to_pssh(&self) -> Result<Pssh> {
        Pssh::from_base64(&self.0)
    }
}

impl fmt::Display for ProtectionHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the protection header from MPD text.
///
/// A `cenc:pssh` inside a Widevine `ContentProtection` wins; otherwise the
/// first non-empty `cenc:pssh` in document order is used.
pub fn extract_protection_header(manifest: &str) -> Result<ProtectionHeader> {
    let document =
        Document::parse(manifest).map_err(|e| Error::InvalidManifest(e.to_string()))?;

    let mut first = None;
    for node in document.descendants().filter(is_cenc_pssh) {
        let Some(text) = node.text().map(str::trim).filter(|t| !t.is_empty()) else {
            continue;
        };
        if in_widevine_protection(&node) {
            return Ok(ProtectionHeader::new(text));
        }
        first.get_or_insert(text);
    }

    first
        .map(ProtectionHeader::new)
        .ok_or(Error::ManifestNotProtected)
}

fn is_cenc_pssh(node: &Node<'_, '_>) -> bool {
    node.is_element()
        && node.tag_name().name() == "pssh"
        && node.tag_name().namespace() == Some(CENC_NAMESPACE)
}

fn in_widevine_protection(node: &Node<'_, '_>) -> bool {
    node.ancestors()
        .find(|n| n.is_element() && n.tag_name().name() == "ContentProtection")
        .and_then(|n| n.attribute("schemeIdUri"))
        .is_some_and(|uri| uri.eq_ignore_ascii_case(WIDEVINE_URN))
}

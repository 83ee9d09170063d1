//! vodkey - Widevine key extraction and signed playback URLs for a hosted
//! video provider.
//!
//! This crate provides:
//! - Widevine device (.wvd) parsing and a local CDM (challenge, license
//!   parsing, key unwrapping).
//! - DASH manifest inspection for the Widevine protection header.
//! - The provider API client, credential validity caching and pluggable
//!   credential acquisition.
//! - HMAC `hdnts` URL signing.
//! - [`orchestrator::Orchestrator`], tying the above into `decode` and
//!   `get_keys`.
//!
//! Feature flags:
//! - `cli`: enable the `vodkey` binary.
//! - `tracing`: enable tracing macros (on by default).
#![allow(clippy::result_large_err)]

#[macro_use]
mod macros;

/// Credential validity cache.
pub mod cache;
/// Core CDM implementation.
pub mod cdm;
/// Runtime configuration.
pub mod config;
/// Credentials and credential sources.
pub mod credential;
/// Widevine device (.wvd) parsing and serialization.
pub mod device;
/// Common error types and Result alias.
pub mod error;
/// One-shot license exchange.
pub mod exchange;
/// Decrypted key representation.
pub mod key;
/// Protobuf license protocol definitions.
pub mod license_protocol;
/// Protection header extraction from DASH manifests.
pub mod manifest;
/// Request orchestration.
pub mod orchestrator;
/// Provider HTTP API client.
pub mod provider;
/// PSSH box parsing and generation.
pub mod pssh;
/// CDM session container.
pub mod session;
/// Signed playback URLs.
pub mod signer;
/// HTTP transport abstraction.
pub mod transport;
/// Shared helper utilities.
pub mod utils;

pub use config::Config;
pub use credential::Credential;
pub use error::{Error, ErrorKind, Result};
pub use orchestrator::{DecodeResult, KeySet, Orchestrator, Outcome};

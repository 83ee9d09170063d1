#![cfg(feature = "cli")]
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;

use vodkey::config::Config;
use vodkey::credential::Credential;
use vodkey::device::Device;
use vodkey::license_protocol::client_identification::client_capabilities::{
    AnalogOutputCapabilities, CertificateKeyType, HdcpVersion,
};
use vodkey::license_protocol::client_identification::ClientCapabilities;
use vodkey::license_protocol::ClientIdentification;
use vodkey::manifest::extract_protection_header;
use vodkey::orchestrator::{Orchestrator, Outcome};
use vodkey::transport::ReqwestTransport;

use rsa::traits::PublicKeyParts;
use tracing::{error, info, warn, Level};

#[derive(Parser)]
#[command(name = "vodkey", version, about = "vodkey CLI")]
struct Cli {
    #[arg(short = 'd', long = "debug", action = ArgAction::SetTrue)]
    debug: bool,

    /// YAML configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Produce a signed playback URL for a (possibly base64) media URL.
    ///
    /// An invalid token is replaced using the configured credential command.
    Decode {
        #[arg(short = 't', long = "token")]
        token: String,
        #[arg(short = 'u', long = "url")]
        url: String,
    },
    /// Extract the content keys of a DRM protected video.
    Keys {
        #[arg(short = 't', long = "token")]
        token: String,
        #[arg(short = 'u', long = "url")]
        url: String,
    },
    /// Print the Widevine protection header of a local DASH manifest.
    Pssh { manifest: PathBuf },
    /// Describe the device identity found in a directory.
    DeviceInfo {
        #[arg(long = "dir")]
        dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    info!("vodkey version {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Decode { token, url } => run_decode(&config, &token, &url),
        Commands::Keys { token, url } => run_keys(&config, &token, &url),
        Commands::Pssh { manifest } => run_pssh(&manifest),
        Commands::DeviceInfo { dir } => {
            run_device_info(dir.as_deref().unwrap_or(config.device_dir.as_path()))
        }
    }
}

fn orchestrator(config: &Config) -> anyhow::Result<Orchestrator> {
    let transport = Arc::new(ReqwestTransport::new().context("Failed to build HTTP client")?);
    Orchestrator::from_config(config, transport).context("Failed to set up")
}

fn run_decode(config: &Config, token: &str, url: &str) -> anyhow::Result<()> {
    let outcome = orchestrator(config)?.decode(&Credential::new(token), url);
    if let Some(result) = outcome.data.as_ref() {
        if !result.url.is_signed() {
            warn!("[-] URL returned unsigned");
        }
        if let Some(regenerated) = result.regenerated.as_ref() {
            info!(
                "[+] New token generated by {}",
                regenerated.generated_by.as_deref().unwrap_or("credential command")
            );
        }
    }
    print_outcome(&outcome)
}

fn run_keys(config: &Config, token: &str, url: &str) -> anyhow::Result<()> {
    let outcome = orchestrator(config)?.get_keys(&Credential::new(token), url);
    if let Some(keys) = outcome.data.as_ref() {
        info!("[+] Manifest: {}", keys.manifest_url);
        for arg in keys.decrypt_args() {
            info!("{}", arg);
        }
    }
    print_outcome(&outcome)
}

fn print_outcome<T: Serialize>(outcome: &Outcome<T>) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    if !outcome.success {
        let message = outcome.message.as_deref().unwrap_or("request failed");
        error!("[-] {}", message);
        anyhow::bail!("{}", message);
    }
    Ok(())
}

fn run_pssh(manifest: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(manifest).context("Failed to read manifest")?;
    let header = extract_protection_header(&text)?;
    println!("{}", header);

    match header.to_pssh().and_then(|pssh| pssh.key_ids()) {
        Ok(key_ids) => {
            for kid in key_ids {
                info!(" + KID: {}", kid.as_simple());
            }
        }
        Err(e) => warn!("Could not read key IDs: {}", e),
    }
    Ok(())
}

fn run_device_info(dir: &Path) -> anyhow::Result<()> {
    let device = Device::discover(dir).context("Failed to load device")?;
    info!("[+] Loaded Device from {}", dir.display());
    info!(" + Type: {:?}", device.device_type);
    info!(" + System ID: {}", device.system_id);
    info!(" + Security Level: {}", device.security_level);
    info!(" + Private Key: {} bit", device.private_key.n().bits());

    let meta = DeviceMeta {
        device_type: format!("{:?}", device.device_type),
        system_id: device.system_id,
        security_level: device.security_level,
        has_vmp: device.client_id.vmp_data.as_ref().is_some_and(|d| !d.is_empty()),
        client_info: client_info_map(&device.client_id),
        capabilities: device
            .client_id
            .client_capabilities
            .as_ref()
            .map(client_capabilities_to_value),
    };
    print!("{}", serde_yaml::to_string(&meta)?);
    Ok(())
}

fn client_info_map(client_id: &ClientIdentification) -> HashMap<String, String> {
    client_id
        .client_info
        .iter()
        .filter_map(|entry| Some((entry.name.clone()?, entry.value.clone()?)))
        .collect()
}

fn client_capabilities_to_value(cap: &ClientCapabilities) -> serde_json::Value {
    let cert_types: Vec<&str> = cap
        .supported_certificate_key_type
        .iter()
        .filter_map(|v| CertificateKeyType::try_from(*v).ok())
        .map(|v| v.as_str_name())
        .collect();

    serde_json::json!({
        "client_token": cap.client_token.unwrap_or(false),
        "session_token": cap.session_token.unwrap_or(false),
        "max_hdcp_version": cap
            .max_hdcp_version
            .and_then(|v| HdcpVersion::try_from(v).ok())
            .map_or("HDCP_NONE", |v| v.as_str_name()),
        "oem_crypto_api_version": cap.oem_crypto_api_version,
        "supported_certificate_key_type": cert_types,
        "analog_output_capabilities": cap
            .analog_output_capabilities
            .and_then(|v| AnalogOutputCapabilities::try_from(v).ok())
            .map_or("ANALOG_OUTPUT_UNKNOWN", |v| v.as_str_name()),
    })
}

#[derive(Serialize)]
struct DeviceMeta {
    device_type: String,
    system_id: u32,
    security_level: u8,
    has_vmp: bool,
    client_info: HashMap<String, String>,
    capabilities: Option<serde_json::Value>,
}

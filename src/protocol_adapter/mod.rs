//! ProtocolAdapter - Snapshot Protocol Dispatch
//!
//! ## Responsibilities
//!
//! - Protocol tag resolution (lenient on the dispatch path, strict in the
//!   explicit URL builder)
//! - Effective ip/port/channel/credentials with camera > device > default
//!   precedence
//! - Channel encoding per protocol and Hikvision -> Intelbras conversion
//! - Snapshot URL construction

use crate::error::{Error, Result};
use crate::models::Camera;
use serde::{Deserialize, Serialize};

/// Default HTTP port when neither camera nor device carries one
pub const DEFAULT_PORT: u16 = 80;

/// Snapshot retrieval protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// ISAPI path-based streaming-channel picture endpoint
    Hikvision,
    /// CGI query-string snapshot endpoint
    Intelbras,
}

impl Default for Protocol {
    fn default() -> Self {
        Self::Hikvision
    }
}

impl Protocol {
    /// Lenient resolution used on the dispatch path: unknown or missing
    /// tags fall back to Hikvision, never an error
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_lowercase()).as_deref() {
            Some("intelbras") => Self::Intelbras,
            _ => Self::Hikvision,
        }
    }

    /// Strict parse used by the explicit URL builder
    pub fn parse(tag: &str) -> Result<Self> {
        match tag.trim().to_lowercase().as_str() {
            "hikvision" => Ok(Self::Hikvision),
            "intelbras" => Ok(Self::Intelbras),
            other => Err(Error::Validation(format!(
                "Unsupported protocol: {}. Use 'hikvision' or 'intelbras'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hikvision => "hikvision",
            Self::Intelbras => "intelbras",
        }
    }

    /// Channel used when the record carries none
    pub fn default_channel(&self) -> &'static str {
        match self {
            Self::Hikvision => "101",
            Self::Intelbras => "1",
        }
    }
}

/// Convert a Hikvision channel token to the Intelbras bare number.
///
/// Hikvision encodes channel N as "{N}01" (1 -> "101", 15 -> "1501").
/// Tokens that do not look like that encoding pass through unchanged,
/// which makes the conversion idempotent: "101" -> "1", "1" -> "1".
pub fn convert_channel_to_intelbras(channel: &str) -> String {
    let channel = channel.trim();
    if channel.len() >= 3 && channel.ends_with("01") {
        if let Ok(n) = channel.parse::<u32>() {
            return (n / 100).to_string();
        }
    }
    channel.to_string()
}

/// Build the snapshot URL for an already-resolved protocol
pub fn snapshot_url(ip: &str, port: u16, channel: &str, protocol: Protocol) -> String {
    match protocol {
        Protocol::Hikvision => {
            format!(
                "http://{}:{}/ISAPI/Streaming/channels/{}/picture",
                ip, port, channel
            )
        }
        Protocol::Intelbras => {
            let channel = convert_channel_to_intelbras(channel);
            format!("http://{}:{}/cgi-bin/snapshot.cgi?channel={}", ip, port, channel)
        }
    }
}

/// Build a snapshot URL from a raw protocol tag, rejecting unknown tags
pub fn build_snapshot_url(ip: &str, port: u16, channel: &str, tag: &str) -> Result<String> {
    let protocol = Protocol::parse(tag)?;
    Ok(snapshot_url(ip, port, channel, protocol))
}

/// Everything a probe needs for one camera, resolved once
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub protocol: Protocol,
    /// Effective ip after precedence resolution
    pub ip: String,
    pub port: u16,
    /// Effective channel in the protocol's own encoding
    pub channel: String,
    pub username: String,
    pub password: String,
    pub url: String,
}

/// Resolve a camera into a probe target.
///
/// Precedence per field: camera-level over device-level over hard default.
/// The port defaults to 80 and the channel to the protocol default, but
/// ip and credentials have no fallback: a camera missing any of them is
/// not probeable and must be reported NO_CONFIG.
pub fn resolve(camera: &Camera) -> Result<ProbeTarget> {
    let protocol = Protocol::from_tag(
        camera
            .protocol
            .as_deref()
            .or(camera.device_protocol.as_deref()),
    );

    let ip = camera
        .ip
        .clone()
        .or_else(|| camera.device_ip.clone())
        .ok_or_else(|| Error::MissingConfig(camera.name.clone()))?;
    let username = camera
        .username
        .clone()
        .or_else(|| camera.device_username.clone())
        .ok_or_else(|| Error::MissingConfig(camera.name.clone()))?;
    let password = camera
        .password
        .clone()
        .or_else(|| camera.device_password.clone())
        .ok_or_else(|| Error::MissingConfig(camera.name.clone()))?;

    let port = camera.port.or(camera.device_port).unwrap_or(DEFAULT_PORT);
    let mut channel = camera
        .channel
        .clone()
        .unwrap_or_else(|| protocol.default_channel().to_string());
    if protocol == Protocol::Intelbras {
        channel = convert_channel_to_intelbras(&channel);
    }

    let url = snapshot_url(&ip, port, &channel, protocol);

    Ok(ProbeTarget {
        protocol,
        ip,
        port,
        channel,
        username,
        password,
        url,
    })
}

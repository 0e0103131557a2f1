//! Client Format Transformers
//!
//! Converts canonical text into the WireGuard outbound syntax of three
//! proxy clients. Every converter re-parses the canonical text first, so
//! hand edits to a generated config flow through.
//!
//! | Format | Output |
//! |--------|--------|
//! | Surge | `[Proxy]` line + `[WireGuard NAME]` section |
//! | mihomo | YAML proxy mapping + indented `peers:` list |
//! | sing-box | JSON outbound object, compact-pretty at 80 columns |

mod compact_json;
mod mihomo;
mod sing_box;
mod surge;

pub use mihomo::to_mihomo;
pub use sing_box::to_sing_box;
pub use surge::{to_surge, to_surge_with_section};

use crate::ip::split_endpoint;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Target client format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Surge,
    Mihomo,
    SingBox,
}

impl Format {
    /// All supported formats
    pub fn all() -> &'static [Format] {
        &[Format::Surge, Format::Mihomo, Format::SingBox]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::Surge => "surge",
            Format::Mihomo => "mihomo",
            Format::SingBox => "sing-box",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "surge" => Ok(Format::Surge),
            "mihomo" | "clash" => Ok(Format::Mihomo),
            "sing-box" | "singbox" => Ok(Format::SingBox),
            _ => Err(TransformError::UnknownFormat(s.to_string())),
        }
    }
}

/// Transformer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("Peer #{peer}: invalid endpoint {endpoint:?}")]
    InvalidEndpoint { peer: usize, endpoint: String },

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Serialization failed: {0}")]
    Serialize(String),
}

/// Convert canonical text into `format`
pub fn transform(format: Format, text: &str) -> Result<String, TransformError> {
    match format {
        Format::Surge => Ok(to_surge(text)),
        Format::Mihomo => to_mihomo(text),
        Format::SingBox => to_sing_box(text),
    }
}

/// Pick one IPv4 and one IPv6 self address (prefix stripped, last one wins)
pub(crate) fn self_ips(address: &str) -> (Option<&str>, Option<&str>) {
    let mut v4 = None;
    let mut v6 = None;

    for token in address.split(',').map(crate::ip::strip_prefix) {
        if token.is_empty() {
            continue;
        }
        if token.contains(':') {
            v6 = Some(token);
        } else {
            v4 = Some(token);
        }
    }

    (v4, v6)
}

/// Split a comma-separated list, trimming items and dropping empty ones
pub(crate) fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// One reserved-bytes entry: digits become numbers, anything else stays text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub(crate) enum ReservedToken {
    Number(u64),
    Text(String),
}

pub(crate) fn reserved_tokens(reserved: &str) -> Vec<ReservedToken> {
    split_list(reserved)
        .into_iter()
        .map(|item| {
            let numeric = item.bytes().all(|b| b.is_ascii_digit());
            match item.parse::<u64>() {
                Ok(n) if numeric => ReservedToken::Number(n),
                _ => ReservedToken::Text(item),
            }
        })
        .collect()
}

/// Endpoint host and port for peer `index`
///
/// A port that does not parse is logged and left out.
pub(crate) fn endpoint_parts(
    index: usize,
    endpoint: &str,
) -> Result<(Option<String>, Option<u16>), TransformError> {
    let (host, port) = split_endpoint(endpoint).map_err(|_| TransformError::InvalidEndpoint {
        peer: index,
        endpoint: endpoint.to_string(),
    })?;

    let port = port.and_then(|p| match p.parse::<u16>() {
        Ok(port) => Some(port),
        Err(_) => {
            warn!("Peer #{}: ignoring unparseable port {:?}", index, p);
            None
        }
    });
    let host = (!host.is_empty()).then(|| host.to_string());

    Ok((host, port))
}

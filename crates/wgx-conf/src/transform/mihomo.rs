//! mihomo (Clash Meta) Converter
//!
//! Emits one `wireguard` proxy as a YAML mapping followed by a `peers:`
//! list indented two spaces, ready to paste under `proxies:`.
//!
//! Mappings are block style and lists are flow style:
//!
//! ```yaml
//! name: wg
//! type: wireguard
//! dns: [1.1.1.1, 8.8.8.8]
//! peers:
//!   - public-key: cHVibGlj
//!     allowed-ips: [0.0.0.0/0, '::/0']
//! ```

use super::{ReservedToken, TransformError, endpoint_parts, reserved_tokens, self_ips, split_list};
use crate::codec::parse;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

#[derive(Debug, Serialize)]
struct MihomoProxy {
    name: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "private-key")]
    private_key: String,
    udp: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipv6: Option<String>,
    #[serde(rename = "remote-dns-resolve", skip_serializing_if = "Option::is_none")]
    remote_dns_resolve: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mtu: Option<u32>,
}

#[derive(Debug, Serialize)]
struct MihomoPeer {
    #[serde(rename = "public-key")]
    public_key: String,
    #[serde(rename = "allowed-ips")]
    allowed_ips: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(rename = "pre-shared-key", skip_serializing_if = "Option::is_none")]
    pre_shared_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reserved: Option<Vec<ReservedToken>>,
}

fn yaml_error(e: serde_yaml::Error) -> TransformError {
    TransformError::Serialize(e.to_string())
}

fn to_mapping<T: Serialize>(value: &T) -> Result<Mapping, TransformError> {
    match serde_yaml::to_value(value).map_err(yaml_error)? {
        Value::Mapping(map) => Ok(map),
        _ => Err(TransformError::Serialize("expected a mapping".to_string())),
    }
}

/// A scalar as it appears in block context
fn scalar(value: &Value) -> Result<String, TransformError> {
    let rendered = serde_yaml::to_string(value).map_err(yaml_error)?;
    Ok(rendered.trim_end_matches('\n').to_string())
}

/// A scalar inside `[...]`, where `,`, `:` and brackets need quoting
fn flow_scalar(value: &Value) -> Result<String, TransformError> {
    let rendered = scalar(value)?;
    let plain = !rendered.starts_with(['\'', '"']);
    let needs_quotes = value.is_string()
        && plain
        && rendered.contains([',', ':', '[', ']', '{', '}']);

    if needs_quotes {
        Ok(format!("'{}'", rendered.replace('\'', "''")))
    } else {
        Ok(rendered)
    }
}

/// Write `map` one key per line, sequences in flow style
///
/// `first` prefixes the first line and `rest` every following one.
fn write_mapping(
    out: &mut String,
    map: &Mapping,
    first: &str,
    rest: &str,
) -> Result<(), TransformError> {
    for (index, (key, value)) in map.iter().enumerate() {
        let rendered = match value {
            Value::Sequence(items) => {
                let items = items
                    .iter()
                    .map(flow_scalar)
                    .collect::<Result<Vec<_>, _>>()?;
                format!("[{}]", items.join(", "))
            }
            other => scalar(other)?,
        };
        let lead = if index == 0 { first } else { rest };
        out.push_str(&format!("{}{}: {}\n", lead, scalar(key)?, rendered));
    }
    Ok(())
}

/// Convert canonical text to a mihomo proxy definition
pub fn to_mihomo(text: &str) -> Result<String, TransformError> {
    let config = parse(text);
    let (v4, v6) = self_ips(&config.address);
    let dns = config
        .dns
        .as_deref()
        .map(split_list)
        .filter(|d| !d.is_empty());

    let proxy = MihomoProxy {
        name: "wg",
        kind: "wireguard",
        private_key: config.private_key.clone(),
        udp: true,
        ip: v4.map(str::to_string),
        ipv6: v6.map(str::to_string),
        remote_dns_resolve: dns.as_ref().map(|_| true),
        dns,
        mtu: config.mtu.filter(|m| *m != 0),
    };

    let mut peers = Vec::with_capacity(config.peers.len());
    for (index, peer) in config.peers.iter().enumerate() {
        let (server, port) = match peer.endpoint.as_deref().filter(|e| !e.is_empty()) {
            Some(endpoint) => endpoint_parts(index, endpoint)?,
            None => (None, None),
        };

        peers.push(MihomoPeer {
            public_key: peer.public_key.clone(),
            allowed_ips: split_list(&peer.allowed_ips),
            server,
            port,
            pre_shared_key: peer.preshared_key.clone().filter(|k| !k.is_empty()),
            reserved: peer
                .reserved
                .as_deref()
                .map(reserved_tokens)
                .filter(|r| !r.is_empty()),
        });
    }

    let mut out = String::new();
    write_mapping(&mut out, &to_mapping(&proxy)?, "", "")?;

    out.push_str("peers:\n");
    if peers.is_empty() {
        out.push_str("  []\n");
    }
    for peer in &peers {
        write_mapping(&mut out, &to_mapping(peer)?, "  - ", "    ")?;
    }
    Ok(out)
}

//! Surge Converter
//!
//! ```text
//! [Proxy]
//! wg-proxy = wireguard, section-name = K3Q9ZT
//!
//! [WireGuard K3Q9ZT]
//! private-key = ...
//! self-ip = 10.0.0.1
//! peer = (public-key = ..., allowed-ips = "0.0.0.0/0", endpoint = 1.2.3.4:51820)
//! ```

use crate::codec::parse;
use crate::config::PeerSection;
use rand::Rng;
use std::fmt::{self, Write as _};

const SECTION_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SECTION_NAME_LEN: usize = 6;

/// Random 6-character section name from `A-Z0-9`
pub(crate) fn random_section_name(rng: &mut impl Rng) -> String {
    (0..SECTION_NAME_LEN)
        .map(|_| char::from(SECTION_CHARSET[rng.gen_range(0..SECTION_CHARSET.len())]))
        .collect()
}

/// Convert canonical text to a Surge proxy + WireGuard section
pub fn to_surge(text: &str) -> String {
    let name = random_section_name(&mut rand::thread_rng());
    to_surge_with_section(text, &name)
}

/// Same as [`to_surge`] with a caller-chosen section name
pub fn to_surge_with_section(text: &str, section: &str) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_surge(&mut out, text, section);
    out
}

fn write_surge(out: &mut String, text: &str, section: &str) -> fmt::Result {
    let config = parse(text);
    let (v4, v6) = super::self_ips(&config.address);

    writeln!(out, "[Proxy]")?;
    writeln!(out, "wg-proxy = wireguard, section-name = {}", section)?;
    writeln!(out)?;
    writeln!(out, "[WireGuard {}]", section)?;
    writeln!(out, "private-key = {}", config.private_key)?;
    if let Some(ip) = v4 {
        writeln!(out, "self-ip = {}", ip)?;
    }
    if let Some(ip) = v6 {
        writeln!(out, "self-ip-v6 = {}", ip)?;
    }
    if let Some(dns) = config.dns.as_deref().filter(|d| !d.is_empty()) {
        writeln!(out, "dns-server = {}", dns)?;
    }
    if let Some(mtu) = config.mtu.filter(|m| *m != 0) {
        writeln!(out, "mtu = {}", mtu)?;
    }

    write!(out, "peer = ")?;
    for (index, peer) in config.peers.iter().enumerate() {
        if index != 0 {
            write!(out, ", ")?;
        }
        write_peer(out, peer)?;
    }
    Ok(())
}

fn write_peer(out: &mut String, peer: &PeerSection) -> fmt::Result {
    write!(
        out,
        "(public-key = {}, allowed-ips = \"{}\"",
        peer.public_key, peer.allowed_ips
    )?;
    if let Some(endpoint) = peer.endpoint.as_deref().filter(|e| !e.is_empty()) {
        write!(out, ", endpoint = {}", endpoint)?;
    }
    if let Some(psk) = peer.preshared_key.as_deref().filter(|k| !k.is_empty()) {
        write!(out, ", preshared-key = {}", psk)?;
    }
    if let Some(keepalive) = peer.persistent_keepalive.filter(|k| *k != 0) {
        write!(out, ", keepalive = {}", keepalive)?;
    }
    if let Some(reserved) = peer.reserved.as_deref().filter(|r| !r.is_empty()) {
        let client_id: Vec<&str> = reserved.split(',').map(str::trim).collect();
        write!(out, ", client-id = {}", client_id.join("/"))?;
    }
    write!(out, ")")
}

//! WireGuard Configuration Model
//!
//! Structured form of one endpoint's `[Interface]` section and its ordered
//! `[Peer]` sections. Every optional field is explicit so that each output
//! dialect has to decide what to do with it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Lowest port handed out by [`random_listen_port`]
pub const LISTEN_PORT_MIN: u16 = 10000;

/// Pick a random listen port in `[10000, 65535]`
pub fn random_listen_port() -> u16 {
    rand::thread_rng().gen_range(LISTEN_PORT_MIN..=u16::MAX)
}

/// One `[Peer]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSection {
    /// Peer's public key (base64, opaque)
    pub public_key: String,
    /// Optional pre-shared key (base64, opaque)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preshared_key: Option<String>,
    /// Comma-separated CIDR list routed to this peer
    pub allowed_ips: String,
    /// Keepalive interval in seconds (1..=65535)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_keepalive: Option<u16>,
    /// `host:port` to connect to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Comma-separated reserved bytes, carried as a `# reserved = ...` comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved: Option<String>,
}

impl PeerSection {
    /// Create a peer with the two mandatory fields
    pub fn new(public_key: impl Into<String>, allowed_ips: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            allowed_ips: allowed_ips.into(),
            ..Self::default()
        }
    }

    /// A peer is reachable when it carries a non-empty endpoint
    pub fn is_reachable(&self) -> bool {
        self.endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}

/// Complete endpoint configuration (`[Interface]` plus peers)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireGuardConfig {
    /// Our private key (base64, opaque)
    pub private_key: String,
    /// UDP listen port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fw_mark: Option<String>,
    /// Comma-separated IP or CIDR list, e.g. `10.0.0.1/24, fd00::1/64`
    pub address: String,
    /// Comma-separated DNS servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,

    // wg-quick passthrough, emitted verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_up: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_up: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_down: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_down: Option<String>,

    /// Peers in declaration order
    #[serde(default)]
    pub peers: Vec<PeerSection>,
}

impl WireGuardConfig {
    /// Create a configuration with a random listen port and no peers
    pub fn new(private_key: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            address: address.into(),
            listen_port: Some(random_listen_port()),
            ..Self::default()
        }
    }

    /// Append a peer, keeping declaration order
    pub fn with_peer(mut self, peer: PeerSection) -> Self {
        self.peers.push(peer);
        self
    }

    /// Address tokens with surrounding whitespace removed
    pub fn address_list(&self) -> impl Iterator<Item = &str> {
        self.address.split(',').map(str::trim).filter(|t| !t.is_empty())
    }
}

impl fmt::Display for WireGuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::codec::write_config(f, self)
    }
}

impl FromStr for WireGuardConfig {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(crate::codec::parse(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_listen_port_range() {
        for _ in 0..1000 {
            assert!(random_listen_port() >= LISTEN_PORT_MIN);
        }
    }

    #[test]
    fn test_new_config() {
        let config = WireGuardConfig::new("P", "10.0.0.1/24");

        assert_eq!(config.private_key, "P");
        assert!(config.listen_port.is_some());
        assert!(config.peers.is_empty());
    }

    #[test]
    fn test_peer_reachable() {
        let mut peer = PeerSection::new("Q", "0.0.0.0/0");
        assert!(!peer.is_reachable());

        peer.endpoint = Some("  ".to_string());
        assert!(!peer.is_reachable());

        peer.endpoint = Some("1.2.3.4:51820".to_string());
        assert!(peer.is_reachable());
    }

    #[test]
    fn test_address_list() {
        let config = WireGuardConfig::new("P", "10.0.0.1/24, fd00::1/64,");
        let tokens: Vec<_> = config.address_list().collect();
        assert_eq!(tokens, vec!["10.0.0.1/24", "fd00::1/64"]);
    }

    #[test]
    fn test_display_and_from_str() {
        let config = WireGuardConfig::new("P", "10.0.0.1/24")
            .with_peer(PeerSection::new("Q", "0.0.0.0/0"));

        let text = config.to_string();
        let parsed: WireGuardConfig = text.parse().unwrap();
        assert_eq!(parsed, config);
    }
}

//! Batch Peer Derivation
//!
//! Builds complete configs for N peers from one template. Peer `i` gets the
//! template address offset by `i`. Peers with an endpoint are reachable and
//! act as servers:
//!
//! - a reachable peer lists every other peer as a host route
//!   (`/32` or `/128`), with the endpoint of those that are reachable too
//! - an unreachable peer lists only the reachable peers, with the template's
//!   allowed IPs, keepalive and reserved bytes
//!
//! # Example template (TOML)
//!
//! ```toml
//! address = "10.0.0.1/24"
//! quantity = 3
//! endpoints = ["vpn.example.com:51820"]
//! allowed_ips = "10.0.0.0/24"
//! ```

use crate::config::{PeerSection, WireGuardConfig, random_listen_port};
use crate::ip::{AddressError, batch_increment_address, host_routes, parse_cidr, split_endpoint};
use crate::keys::{KeyPair, KeyProvider};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

fn default_address() -> String {
    "10.0.0.1/24".to_string()
}

fn default_allowed_ips() -> String {
    "0.0.0.0/0, ::/0".to_string()
}

fn default_keepalive() -> Option<u16> {
    Some(25)
}

fn default_quantity() -> usize {
    2
}

/// Shared settings for a batch of peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTemplate {
    /// Address list of peer 0; peer i gets it offset by i
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    /// Listen port, also appended to endpoints given without one
    #[serde(default = "random_listen_port")]
    pub listen_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    /// AllowedIPs that unreachable peers route to reachable ones
    #[serde(default = "default_allowed_ips")]
    pub allowed_ips: String,
    /// Endpoint of peer j at index j; blank or missing means unreachable
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default = "default_keepalive", skip_serializing_if = "Option::is_none")]
    pub persistent_keepalive: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved: Option<String>,
    /// Number of peers to derive
    #[serde(default = "default_quantity")]
    pub quantity: usize,

    // Applied to reachable peers only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fw_mark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_up: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_up: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_down: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_down: Option<String>,
}

impl Default for BatchTemplate {
    fn default() -> Self {
        Self {
            address: default_address(),
            dns: None,
            listen_port: random_listen_port(),
            mtu: None,
            allowed_ips: default_allowed_ips(),
            endpoints: Vec::new(),
            persistent_keepalive: default_keepalive(),
            reserved: None,
            quantity: default_quantity(),
            save_config: None,
            table: None,
            fw_mark: None,
            pre_up: None,
            post_up: None,
            pre_down: None,
            post_down: None,
        }
    }
}

impl BatchTemplate {
    /// Load from TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self, DeriveError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DeriveError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Load from TOML string
    pub fn from_toml(content: &str) -> Result<Self, DeriveError> {
        toml::from_str(content).map_err(|e| DeriveError::Config(e.to_string()))
    }

    /// Export as TOML
    pub fn to_toml(&self) -> Result<String, DeriveError> {
        toml::to_string_pretty(self).map_err(|e| DeriveError::Config(e.to_string()))
    }

    /// Check every field the way the config form does
    pub fn validate(&self) -> Result<(), DeriveError> {
        let address = list(&self.address);
        if address.is_empty() {
            return Err(invalid("address", "at least one address is required"));
        }
        if let Some(bad) = address.iter().find(|a| parse_cidr(a).is_none()) {
            return Err(invalid("address", format!("{:?} is not an IP or CIDR", bad)));
        }

        if let Some(dns) = &self.dns {
            if let Some(bad) = list(dns).iter().find(|d| d.parse::<IpAddr>().is_err()) {
                return Err(invalid("dns", format!("{:?} is not an IP address", bad)));
            }
        }

        if self.listen_port == 0 {
            return Err(invalid("listen_port", "port must be in 1..=65535"));
        }

        if self.mtu == Some(0) {
            return Err(invalid("mtu", "MTU must be a positive integer"));
        }

        if let Some(save) = self.save_config.as_deref() {
            if save != "true" && save != "false" {
                return Err(invalid("save_config", "expected \"true\" or \"false\""));
            }
        }

        let allowed = list(&self.allowed_ips);
        if allowed.is_empty() {
            return Err(invalid("allowed_ips", "at least one CIDR is required"));
        }
        let not_cidr = |c: &str| !matches!(parse_cidr(c), Some((_, Some(_))));
        if let Some(bad) = allowed.iter().copied().find(|&c| not_cidr(c)) {
            return Err(invalid("allowed_ips", format!("{:?} is not a CIDR", bad)));
        }

        if self.persistent_keepalive == Some(0) {
            return Err(invalid("persistent_keepalive", "keepalive must be in 1..=65535"));
        }

        if self.quantity == 0 {
            return Err(invalid("quantity", "at least one peer is required"));
        }

        Ok(())
    }

    /// Endpoint of each peer, `None` for unreachable ones
    ///
    /// Endpoints without a port get `:listen_port`.
    pub fn resolved_endpoints(&self) -> Result<Vec<Option<String>>, DeriveError> {
        (0..self.quantity)
            .map(|index| -> Result<Option<String>, DeriveError> {
                let Some(endpoint) = self
                    .endpoints
                    .get(index)
                    .map(|e| e.trim())
                    .filter(|e| !e.is_empty())
                else {
                    return Ok(None);
                };

                match split_endpoint(endpoint)? {
                    (_, Some(_)) => Ok(Some(endpoint.to_string())),
                    (host, None) if host.contains(':') => {
                        Ok(Some(format!("[{}]:{}", host, self.listen_port)))
                    }
                    (host, None) => Ok(Some(format!("{}:{}", host, self.listen_port))),
                }
            })
            .collect()
    }
}

fn list(s: &str) -> Vec<&str> {
    s.split(',').map(str::trim).filter(|t| !t.is_empty()).collect()
}

fn invalid(field: &'static str, reason: impl Into<String>) -> DeriveError {
    DeriveError::InvalidTemplate {
        field,
        reason: reason.into(),
    }
}

/// Port of a resolved endpoint
fn endpoint_port(endpoint: &str) -> Option<u16> {
    split_endpoint(endpoint).ok()?.1?.parse().ok()
}

/// Derive `template.quantity` complete configs
pub fn derive_configs(
    template: &BatchTemplate,
    keys: &mut impl KeyProvider,
) -> Result<Vec<WireGuardConfig>, DeriveError> {
    template.validate()?;
    let endpoints = template.resolved_endpoints()?;

    // All addresses up front; one overflow fails the whole batch
    let addresses = (0..template.quantity)
        .map(|i| -> Result<String, DeriveError> {
            let delta = i64::try_from(i).map_err(|_| invalid("quantity", "too many peers"))?;
            Ok(batch_increment_address(&template.address, delta)?)
        })
        .collect::<Result<Vec<_>, DeriveError>>()?;

    let key_pairs: Vec<KeyPair> = (0..template.quantity)
        .map(|_| keys.generate_key_pair())
        .collect();

    let configs: Vec<WireGuardConfig> = (0..template.quantity)
        .map(|j| {
            let mut config = WireGuardConfig {
                private_key: key_pairs[j].private.clone(),
                address: addresses[j].clone(),
                dns: template.dns.clone(),
                mtu: template.mtu,
                ..WireGuardConfig::default()
            };

            let others = (0..template.quantity).filter(|i| *i != j);

            if let Some(endpoint) = &endpoints[j] {
                debug!("Peer {} is reachable at {}", j, endpoint);
                config.listen_port = endpoint_port(endpoint);
                config.save_config = template.save_config.clone();
                config.table = template.table.clone();
                config.fw_mark = template.fw_mark.clone();
                config.pre_up = template.pre_up.clone();
                config.post_up = template.post_up.clone();
                config.pre_down = template.pre_down.clone();
                config.post_down = template.post_down.clone();

                config.peers = others
                    .map(|i| PeerSection {
                        endpoint: endpoints[i].clone(),
                        ..PeerSection::new(key_pairs[i].public.clone(), host_routes(&addresses[i]))
                    })
                    .collect();
            } else {
                config.peers = others
                    .filter_map(|i| {
                        let endpoint = endpoints[i].clone()?;
                        Some(PeerSection {
                            endpoint: Some(endpoint),
                            persistent_keepalive: template.persistent_keepalive,
                            reserved: template.reserved.clone(),
                            ..PeerSection::new(
                                key_pairs[i].public.clone(),
                                template.allowed_ips.clone(),
                            )
                        })
                    })
                    .collect();
            }

            config
        })
        .collect();

    let reachable = endpoints.iter().filter(|e| e.is_some()).count();
    info!("Derived {} configs ({} reachable)", configs.len(), reachable);
    Ok(configs)
}

/// Batch derivation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeriveError {
    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    #[error("Invalid {field}: {reason}")]
    InvalidTemplate { field: &'static str, reason: String },

    #[error("Template error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Predictable keys: priv-N / pub-N
    #[derive(Default)]
    struct CountingKeys(usize);

    impl KeyProvider for CountingKeys {
        fn generate_key_pair(&mut self) -> KeyPair {
            let n = self.0;
            self.0 += 1;
            KeyPair {
                private: format!("priv-{}", n),
                public: format!("pub-{}", n),
            }
        }

        fn generate_preshared_key(&mut self) -> String {
            "psk".to_string()
        }
    }

    fn template(quantity: usize, endpoints: &[&str]) -> BatchTemplate {
        BatchTemplate {
            address: "10.0.0.1/24".to_string(),
            listen_port: 51820,
            quantity,
            endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
            ..BatchTemplate::default()
        }
    }

    #[test]
    fn test_hub_and_spokes() {
        let configs = derive_configs(&template(3, &["h:51820"]), &mut CountingKeys::default()).unwrap();
        assert_eq!(configs.len(), 3);

        let hub = &configs[0];
        assert_eq!(hub.address, "10.0.0.1/24");
        assert_eq!(hub.listen_port, Some(51820));
        assert_eq!(hub.peers.len(), 2);
        assert_eq!(hub.peers[0].public_key, "pub-1");
        assert_eq!(hub.peers[0].allowed_ips, "10.0.0.2/32");
        assert_eq!(hub.peers[1].allowed_ips, "10.0.0.3/32");
        assert!(hub.peers.iter().all(|p| p.endpoint.is_none()));
        assert!(hub.peers.iter().all(|p| p.persistent_keepalive.is_none()));

        for (index, spoke) in configs.iter().enumerate().skip(1) {
            assert_eq!(spoke.private_key, format!("priv-{}", index));
            assert_eq!(spoke.listen_port, None);
            assert_eq!(spoke.peers.len(), 1);

            let peer = &spoke.peers[0];
            assert_eq!(peer.public_key, "pub-0");
            assert_eq!(peer.endpoint.as_deref(), Some("h:51820"));
            assert_eq!(peer.allowed_ips, "0.0.0.0/0, ::/0");
            assert_eq!(peer.persistent_keepalive, Some(25));
        }
        assert_eq!(configs[1].address, "10.0.0.2/24");
        assert_eq!(configs[2].address, "10.0.0.3/24");
    }

    #[test]
    fn test_two_reachable_peers_see_each_other() {
        let mut t = template(3, &["a.example:51820", "b.example:51821"]);
        t.address = "10.0.0.1/24, fd00::1/64".to_string();
        t.reserved = Some("1,2,3".to_string());
        t.post_up = Some("echo up".to_string());
        let configs = derive_configs(&t, &mut CountingKeys::default()).unwrap();

        let a = &configs[0];
        assert_eq!(a.post_up.as_deref(), Some("echo up"));
        assert_eq!(a.peers[0].endpoint.as_deref(), Some("b.example:51821"));
        assert_eq!(a.peers[0].allowed_ips, "10.0.0.2/32,fd00::2/128");
        assert_eq!(a.peers[1].endpoint, None);
        assert_eq!(configs[1].listen_port, Some(51821));

        let c = &configs[2];
        assert_eq!(c.post_up, None);
        assert_eq!(c.peers.len(), 2);
        assert!(c.peers.iter().all(|p| p.reserved.as_deref() == Some("1,2,3")));
    }

    #[test]
    fn test_no_reachable_peers() {
        let configs = derive_configs(&template(2, &[]), &mut CountingKeys::default()).unwrap();
        assert!(configs.iter().all(|c| c.peers.is_empty()));
    }

    #[test]
    fn test_single_peer() {
        let configs = derive_configs(&template(1, &["h"]), &mut CountingKeys::default()).unwrap();
        assert_eq!(configs.len(), 1);
        assert!(configs[0].peers.is_empty());
        assert_eq!(configs[0].listen_port, Some(51820));
    }

    #[test]
    fn test_endpoint_port_defaulting() {
        let t = template(4, &["h", "", "[fd00::1]", "h:1"]);
        assert_eq!(
            t.resolved_endpoints().unwrap(),
            vec![
                Some("h:51820".to_string()),
                None,
                Some("[fd00::1]:51820".to_string()),
                Some("h:1".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = derive_configs(&template(2, &["a:b:c"]), &mut CountingKeys::default()).unwrap_err();
        assert!(matches!(err, DeriveError::Address(AddressError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_address_overflow_aborts() {
        let mut t = template(3, &["h:1"]);
        t.address = "255.255.255.254".to_string();
        let err = derive_configs(&t, &mut CountingKeys::default()).unwrap_err();
        assert!(matches!(err, DeriveError::Address(AddressError::OutOfRange { .. })));
    }

    #[test]
    fn test_validate() {
        let bad = [
            BatchTemplate { address: " , ".to_string(), ..template(2, &[]) },
            BatchTemplate { address: "10.0.0.300".to_string(), ..template(2, &[]) },
            BatchTemplate { dns: Some("1.1.1.1, dns.google".to_string()), ..template(2, &[]) },
            BatchTemplate { listen_port: 0, ..template(2, &[]) },
            BatchTemplate { mtu: Some(0), ..template(2, &[]) },
            BatchTemplate { save_config: Some("yes".to_string()), ..template(2, &[]) },
            BatchTemplate { allowed_ips: "10.0.0.1".to_string(), ..template(2, &[]) },
            BatchTemplate { persistent_keepalive: Some(0), ..template(2, &[]) },
            BatchTemplate { quantity: 0, ..template(2, &[]) },
        ];
        for t in &bad {
            assert!(
                matches!(t.validate(), Err(DeriveError::InvalidTemplate { .. })),
                "{t:?} should be rejected"
            );
        }
        assert!(template(2, &[]).validate().is_ok());
    }

    #[test]
    fn test_template_toml_defaults() {
        let t = BatchTemplate::from_toml("quantity = 3\nendpoints = [\"h:51820\"]\n").unwrap();

        assert_eq!(t.address, "10.0.0.1/24");
        assert_eq!(t.allowed_ips, "0.0.0.0/0, ::/0");
        assert_eq!(t.persistent_keepalive, Some(25));
        assert!(t.listen_port >= 10000);
        assert_eq!(t.quantity, 3);
    }

    #[test]
    fn test_template_toml_roundtrip() {
        let mut t = template(3, &["h:51820"]);
        t.dns = Some("1.1.1.1".to_string());
        t.table = Some("off".to_string());

        let parsed = BatchTemplate::from_toml(&t.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, t);
    }

    #[test]
    fn test_template_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "address = \"192.168.7.1/24\"\nlisten_port = 4000").unwrap();

        let t = BatchTemplate::from_toml_file(file.path()).unwrap();
        assert_eq!(t.address, "192.168.7.1/24");
        assert_eq!(t.listen_port, 4000);
    }

    #[test]
    fn test_template_bad_toml() {
        assert!(matches!(
            BatchTemplate::from_toml("quantity = \"many\""),
            Err(DeriveError::Config(_))
        ));
    }
}

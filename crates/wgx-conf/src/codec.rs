//! Canonical Text Codec
//!
//! Reads and writes the wg-quick style `[Interface]`/`[Peer]` text.
//!
//! Parsing never fails. Unknown keys and stray lines are skipped, and a
//! number that does not parse is treated as if the line were absent.
//!
//! Reader and writer share the field tables in [`InterfaceKey`] and [`PeerKey`].

use crate::config::{PeerSection, WireGuardConfig};
use std::fmt::{self, Write as _};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Marker that introduces the reserved-bytes comment line
const RESERVED_MARKER: &str = "# reserved";

/// Recoverable field-level failures (never escape [`parse`])
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("{key} = {value:?} is not a valid number")]
    NumericParse { key: &'static str, value: String },
}

/// Keys recognized in the `[Interface]` section, in emit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterfaceKey {
    PrivateKey,
    ListenPort,
    FwMark,
    Address,
    Dns,
    Mtu,
    Table,
    SaveConfig,
    PreUp,
    PostUp,
    PreDown,
    PostDown,
}

impl InterfaceKey {
    const ALL: [InterfaceKey; 12] = [
        InterfaceKey::PrivateKey,
        InterfaceKey::ListenPort,
        InterfaceKey::FwMark,
        InterfaceKey::Address,
        InterfaceKey::Dns,
        InterfaceKey::Mtu,
        InterfaceKey::Table,
        InterfaceKey::SaveConfig,
        InterfaceKey::PreUp,
        InterfaceKey::PostUp,
        InterfaceKey::PreDown,
        InterfaceKey::PostDown,
    ];

    fn name(self) -> &'static str {
        match self {
            InterfaceKey::PrivateKey => "PrivateKey",
            InterfaceKey::ListenPort => "ListenPort",
            InterfaceKey::FwMark => "FWMark",
            InterfaceKey::Address => "Address",
            InterfaceKey::Dns => "DNS",
            InterfaceKey::Mtu => "MTU",
            InterfaceKey::Table => "Table",
            InterfaceKey::SaveConfig => "SaveConfig",
            InterfaceKey::PreUp => "PreUp",
            InterfaceKey::PostUp => "PostUp",
            InterfaceKey::PreDown => "PreDown",
            InterfaceKey::PostDown => "PostDown",
        }
    }

    fn lookup(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == key)
    }

    /// Text to emit for this key, `None` when the line is omitted
    fn value(self, config: &WireGuardConfig) -> Option<String> {
        match self {
            // mandatory lines
            InterfaceKey::PrivateKey => Some(first_line(&config.private_key).to_string()),
            InterfaceKey::Address => Some(first_line(&config.address).to_string()),

            InterfaceKey::ListenPort => nonzero(config.listen_port),
            InterfaceKey::Mtu => nonzero(config.mtu),
            InterfaceKey::FwMark => text(&config.fw_mark),
            InterfaceKey::Dns => text(&config.dns),
            InterfaceKey::Table => text(&config.table),
            InterfaceKey::SaveConfig => text(&config.save_config),
            InterfaceKey::PreUp => text(&config.pre_up),
            InterfaceKey::PostUp => text(&config.post_up),
            InterfaceKey::PreDown => text(&config.pre_down),
            InterfaceKey::PostDown => text(&config.post_down),
        }
    }

    fn assign(self, config: &mut WireGuardConfig, value: &str) {
        let owned = || Some(value.to_string());
        match self {
            InterfaceKey::PrivateKey => config.private_key = value.to_string(),
            InterfaceKey::Address => config.address = value.to_string(),
            InterfaceKey::ListenPort => config.listen_port = numeric(self.name(), value),
            InterfaceKey::Mtu => config.mtu = numeric(self.name(), value),
            InterfaceKey::FwMark => config.fw_mark = owned(),
            InterfaceKey::Dns => config.dns = owned(),
            InterfaceKey::Table => config.table = owned(),
            InterfaceKey::SaveConfig => config.save_config = owned(),
            InterfaceKey::PreUp => config.pre_up = owned(),
            InterfaceKey::PostUp => config.post_up = owned(),
            InterfaceKey::PreDown => config.pre_down = owned(),
            InterfaceKey::PostDown => config.post_down = owned(),
        }
    }
}

/// Keys recognized in a `[Peer]` section, in emit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerKey {
    PublicKey,
    PresharedKey,
    Endpoint,
    AllowedIps,
    PersistentKeepalive,
    Reserved,
}

impl PeerKey {
    const ALL: [PeerKey; 6] = [
        PeerKey::PublicKey,
        PeerKey::PresharedKey,
        PeerKey::Endpoint,
        PeerKey::AllowedIps,
        PeerKey::PersistentKeepalive,
        PeerKey::Reserved,
    ];

    fn name(self) -> &'static str {
        match self {
            PeerKey::PublicKey => "PublicKey",
            PeerKey::PresharedKey => "PresharedKey",
            PeerKey::Endpoint => "Endpoint",
            PeerKey::AllowedIps => "AllowedIPs",
            PeerKey::PersistentKeepalive => "PersistentKeepalive",
            PeerKey::Reserved => "reserved",
        }
    }

    fn lookup(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == key)
    }

    fn value(self, peer: &PeerSection) -> Option<String> {
        match self {
            PeerKey::PublicKey => Some(first_line(&peer.public_key).to_string()),
            PeerKey::AllowedIps => Some(first_line(&peer.allowed_ips).to_string()),
            PeerKey::PresharedKey => text(&peer.preshared_key),
            PeerKey::Endpoint => text(&peer.endpoint),
            PeerKey::PersistentKeepalive => nonzero(peer.persistent_keepalive),
            PeerKey::Reserved => text(&peer.reserved),
        }
    }

    fn assign(self, peer: &mut PeerSection, value: &str) {
        match self {
            PeerKey::PublicKey => peer.public_key = value.to_string(),
            PeerKey::AllowedIps => peer.allowed_ips = value.to_string(),
            PeerKey::PresharedKey => peer.preshared_key = Some(value.to_string()),
            PeerKey::Endpoint => peer.endpoint = Some(value.to_string()),
            PeerKey::PersistentKeepalive => {
                peer.persistent_keepalive = numeric(self.name(), value)
            }
            PeerKey::Reserved => peer.reserved = Some(value.to_string()),
        }
    }
}

/// First line of a value, trimmed. A value never spans lines in the output.
fn first_line(value: &str) -> &str {
    value.trim().split(['\n', '\r']).next().unwrap_or_default().trim()
}

fn text(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(first_line)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn nonzero<T: Default + PartialEq + ToString>(field: Option<T>) -> Option<String> {
    field.filter(|v| *v != T::default()).map(|v| v.to_string())
}

fn parse_numeric<T: FromStr>(key: &'static str, value: &str) -> Result<T, FieldError> {
    value.parse().map_err(|_| FieldError::NumericParse {
        key,
        value: value.to_string(),
    })
}

/// Numeric reader that downgrades failures to an absent field
fn numeric<T: FromStr>(key: &'static str, value: &str) -> Option<T> {
    match parse_numeric(key, value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring field: {}", e);
            None
        }
    }
}

/// Write the canonical text form of `config` into `out`
pub(crate) fn write_config(out: &mut impl fmt::Write, config: &WireGuardConfig) -> fmt::Result {
    writeln!(out, "[Interface]")?;
    for key in InterfaceKey::ALL {
        if let Some(value) = key.value(config) {
            writeln!(out, "{} = {}", key.name(), value)?;
        }
    }

    for peer in &config.peers {
        writeln!(out)?;
        writeln!(out, "[Peer]")?;
        for key in PeerKey::ALL {
            let Some(value) = key.value(peer) else {
                continue;
            };
            if key == PeerKey::Reserved {
                writeln!(out, "{} = {}", RESERVED_MARKER, value)?;
            } else {
                writeln!(out, "{} = {}", key.name(), value)?;
            }
        }
    }
    Ok(())
}

/// Render a configuration as canonical text
///
/// Values are trimmed and cut at the first line break, so no field can
/// spill into another line or section.
pub fn generate(config: &WireGuardConfig) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_config(&mut out, config);
    out
}

/// Section the reader is currently in
enum Section {
    Interface,
    /// Inside `[Peer]`, holding the not-yet-committed peer
    Peer(PeerSection),
}

/// Parse canonical text into a configuration. Never fails.
pub fn parse(text: &str) -> WireGuardConfig {
    let mut config = WireGuardConfig::default();
    let mut section = Section::Interface;

    for raw in text.lines() {
        let mut line = raw.trim();

        if line.starts_with(RESERVED_MARKER) {
            line = line.trim_start_matches('#').trim_start();
        } else if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line {
            "[Interface]" => {
                if let Section::Peer(open) = &section {
                    debug!("Discarding uncommitted peer {:?}", open.public_key);
                }
                section = Section::Interface;
                continue;
            }
            "[Peer]" => {
                if let Section::Peer(open) = std::mem::replace(&mut section, Section::Interface) {
                    config.peers.push(open);
                }
                section = Section::Peer(PeerSection::default());
                continue;
            }
            _ => {}
        }

        let Some((key, value)) = line.split_once('=') else {
            debug!("Skipping line without '=': {:?}", line);
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        match &mut section {
            Section::Interface => match InterfaceKey::lookup(key) {
                Some(k) => k.assign(&mut config, value),
                None => debug!("Unknown interface key {:?}", key),
            },
            Section::Peer(peer) => match PeerKey::lookup(key) {
                Some(k) => k.assign(peer, value),
                None => debug!("Unknown peer key {:?}", key),
            },
        }
    }

    if let Section::Peer(open) = section {
        config.peers.push(open);
    }

    config
}

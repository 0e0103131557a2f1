//! wgx - WireGuard configuration toolkit
//!
//! Translates between the canonical `[Interface]`/`[Peer]` text form of a
//! WireGuard endpoint and the configuration dialects of several proxy
//! clients, and derives complete configs for a batch of peers.
//!
//! # Architecture
//!
//! ```text
//!  BatchTemplate ──▶ derive ──▶ WireGuardConfig ──generate──▶ canonical text
//!        │                            ▲                              │
//!        ▼                            └────────────parse─────────────┤
//!   ip arithmetic                                                    ▼
//!                                                transform ──▶ surge / mihomo / sing-box
//! ```
//!
//! # Features
//!
//! - **Lossless codec**: `generate(parse(generate(c))) == generate(c)`
//! - **Three output dialects**: Surge, mihomo (Clash) YAML, sing-box JSON
//! - **Address arithmetic**: 128-bit offsets for IPv4 and IPv6 with overflow detection
//! - **Batch derivation**: hub/spoke topologies for N peers in one call

mod codec;
mod config;
mod derive;
mod ip;
mod keys;
mod transform;

pub use codec::{FieldError, generate, parse};
pub use config::{PeerSection, WireGuardConfig, random_listen_port};
pub use derive::{BatchTemplate, DeriveError, derive_configs};
pub use ip::{
    AddressError, batch_increment_address, default_cidr_for, host_routes, increment_address,
    split_endpoint, strip_prefix,
};
pub use keys::{KeyError, KeyPair, KeyProvider, X25519KeyProvider};
pub use transform::{
    Format, TransformError, to_mihomo, to_sing_box, to_surge, to_surge_with_section, transform,
};

/// Offset every address in a comma-separated list by `delta`.
///
/// Alias of [`batch_increment_address`], the name used by the core contract.
pub fn increment_batch(list: &str, delta: i64) -> Result<String, AddressError> {
    batch_increment_address(list, delta)
}

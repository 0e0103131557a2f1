//! IP Address Arithmetic
//!
//! Offsets IPv4 and IPv6 addresses (with or without a CIDR suffix) as plain
//! integers. Both families are widened to `u128`, so the whole IPv6 range
//! is covered and nothing ever wraps.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// Address arithmetic errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Malformed address: {0:?}")]
    Malformed(String),

    #[error("Address {address} offset by {delta} is out of range")]
    OutOfRange { address: String, delta: i64 },

    #[error("Invalid endpoint: {0:?}")]
    InvalidEndpoint(String),
}

/// Split `addr/prefix` into its parts
fn split_prefix(token: &str) -> (&str, Option<&str>) {
    match token.split_once('/') {
        Some((ip, prefix)) => (ip, Some(prefix)),
        None => (token, None),
    }
}

/// Drop a `/prefix` suffix, if any
pub fn strip_prefix(token: &str) -> &str {
    split_prefix(token.trim()).0
}

/// Syntactic family check: anything with a colon is IPv6
fn looks_like_v6(token: &str) -> bool {
    token.contains(':')
}

/// Parse an IP or CIDR token (e.g., "10.0.0.1" or "0.0.0.0/0")
pub(crate) fn parse_cidr(token: &str) -> Option<(IpAddr, Option<u8>)> {
    let (ip, prefix) = split_prefix(token.trim());
    let ip: IpAddr = ip.parse().ok()?;
    let bits = if ip.is_ipv4() { 32 } else { 128 };

    match prefix {
        None => Some((ip, None)),
        Some(p) => {
            let p: u8 = p.parse().ok()?;
            (p <= bits).then_some((ip, Some(p)))
        }
    }
}

/// Offset one IP or CIDR token by `delta`, keeping its prefix text as written
///
/// # Examples
///
/// ```
/// use wgx_conf::increment_address;
///
/// assert_eq!(increment_address("10.0.0.1/24", 1).unwrap(), "10.0.0.2/24");
/// assert_eq!(increment_address("::1", 1).unwrap(), "::2");
/// assert!(increment_address("255.255.255.255", 1).is_err());
/// ```
pub fn increment_address(token: &str, delta: i64) -> Result<String, AddressError> {
    let token = token.trim();
    let (ip, _) = parse_cidr(token).ok_or_else(|| AddressError::Malformed(token.to_string()))?;
    let (_, prefix) = split_prefix(token);

    let out_of_range = || AddressError::OutOfRange {
        address: token.to_string(),
        delta,
    };

    let shifted = match ip {
        IpAddr::V4(v4) => {
            let next = u128::from(u32::from(v4))
                .checked_add_signed(i128::from(delta))
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(out_of_range)?;
            IpAddr::V4(Ipv4Addr::from(next))
        }
        IpAddr::V6(v6) => {
            let next = u128::from(v6)
                .checked_add_signed(i128::from(delta))
                .ok_or_else(out_of_range)?;
            IpAddr::V6(Ipv6Addr::from(next))
        }
    };

    Ok(match prefix {
        Some(p) => format!("{}/{}", shifted, p),
        None => shifted.to_string(),
    })
}

/// Offset every token of a comma-separated list; any failure fails the whole list
pub fn batch_increment_address(list: &str, delta: i64) -> Result<String, AddressError> {
    let shifted = list
        .split(',')
        .map(|token| increment_address(token, delta))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(shifted.join(", "))
}

/// Give every bare address a host prefix (`/32` or `/128`)
///
/// Tokens that already carry a prefix are left alone.
pub fn default_cidr_for(list: &str) -> String {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            if t.contains('/') {
                t.to_string()
            } else if looks_like_v6(t) {
                format!("{}/128", t)
            } else {
                format!("{}/32", t)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Host routes for an interface address list (prefixes replaced by `/32` or `/128`)
pub fn host_routes(list: &str) -> String {
    let bare = list
        .split(',')
        .map(strip_prefix)
        .collect::<Vec<_>>()
        .join(",");
    default_cidr_for(&bare)
}

/// Split an endpoint into host and (unparsed) port
///
/// Accepts `host:port`, a bare `host`, and bracketed IPv6 `[addr]:port`.
pub fn split_endpoint(endpoint: &str) -> Result<(&str, Option<&str>), AddressError> {
    let endpoint = endpoint.trim();
    let invalid = || AddressError::InvalidEndpoint(endpoint.to_string());

    if let Some(rest) = endpoint.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        if tail.is_empty() {
            return Ok((host, None));
        }
        let port = tail.strip_prefix(':').ok_or_else(invalid)?;
        return Ok((host, Some(port.trim())));
    }

    match endpoint.split_once(':') {
        None => Ok((endpoint, None)),
        Some((host, port)) if !port.contains(':') => Ok((host.trim(), Some(port.trim()))),
        Some(_) => Err(invalid()),
    }
}

//! sing-box Converter
//!
//! Emits a single `wireguard` outbound object.

use super::compact_json::to_string_compact;
use super::{ReservedToken, TransformError, endpoint_parts, reserved_tokens, split_list};
use crate::codec::parse;
use serde::Serialize;

const INDENT: usize = 2;
const MAX_WIDTH: usize = 80;

#[derive(Debug, Serialize)]
struct SingBoxOutbound {
    #[serde(rename = "type")]
    kind: &'static str,
    tag: &'static str,
    local_address: Vec<String>,
    private_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mtu: Option<u32>,
    peers: Vec<SingBoxPeer>,
}

#[derive(Debug, Serialize)]
struct SingBoxPeer {
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_port: Option<u16>,
    public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pre_shared_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_ips: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reserved: Option<Vec<ReservedToken>>,
}

/// Convert canonical text to a sing-box outbound
pub fn to_sing_box(text: &str) -> Result<String, TransformError> {
    let config = parse(text);

    let peers = config
        .peers
        .iter()
        .enumerate()
        .map(|(index, peer)| -> Result<SingBoxPeer, TransformError> {
            let (server, server_port) = match peer.endpoint.as_deref().filter(|e| !e.is_empty()) {
                Some(endpoint) => endpoint_parts(index, endpoint)?,
                None => (None, None),
            };

            Ok(SingBoxPeer {
                server,
                server_port,
                public_key: peer.public_key.clone(),
                pre_shared_key: peer.preshared_key.clone().filter(|k| !k.is_empty()),
                allowed_ips: Some(split_list(&peer.allowed_ips)).filter(|a| !a.is_empty()),
                reserved: peer
                    .reserved
                    .as_deref()
                    .map(reserved_tokens)
                    .filter(|r| !r.is_empty()),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let outbound = SingBoxOutbound {
        kind: "wireguard",
        tag: "wireguard-out",
        local_address: split_list(&config.address),
        private_key: config.private_key,
        mtu: config.mtu.filter(|m| *m != 0),
        peers,
    };

    let value =
        serde_json::to_value(&outbound).map_err(|e| TransformError::Serialize(e.to_string()))?;
    Ok(to_string_compact(&value, INDENT, MAX_WIDTH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_layout() {
        let text = "\
[Interface]
PrivateKey = P
Address = 10.0.0.1/24

[Peer]
PublicKey = Q
AllowedIPs = 0.0.0.0/0
Endpoint = 1.2.3.4:51820
# reserved = 1, 2, abc
";
        let expected = r#"{
  "type": "wireguard",
  "tag": "wireguard-out",
  "local_address": ["10.0.0.1/24"],
  "private_key": "P",
  "peers": [
    {
      "server": "1.2.3.4",
      "server_port": 51820,
      "public_key": "Q",
      "allowed_ips": ["0.0.0.0/0"],
      "reserved": [1, 2, "abc"]
    }
  ]
}"#;
        assert_eq!(to_sing_box(text).unwrap(), expected);
    }

    #[test]
    fn test_fields() {
        let text = "\
[Interface]
PrivateKey = P
Address = 10.0.0.2/24, fd00::2/64
MTU = 1408

[Peer]
PublicKey = A
PresharedKey = S
AllowedIPs = 0.0.0.0/0, ::/0
Endpoint = [2001:db8::1]:443

[Peer]
PublicKey = B
AllowedIPs =
";
        let value: Value = serde_json::from_str(&to_sing_box(text).unwrap()).unwrap();

        assert_eq!(value["local_address"], json!(["10.0.0.2/24", "fd00::2/64"]));
        assert_eq!(value["mtu"], json!(1408));
        assert_eq!(value["peers"][0]["server"], json!("2001:db8::1"));
        assert_eq!(value["peers"][0]["server_port"], json!(443));
        assert_eq!(value["peers"][0]["pre_shared_key"], json!("S"));
        assert_eq!(value["peers"][0]["allowed_ips"], json!(["0.0.0.0/0", "::/0"]));

        let second = value["peers"][1].as_object().unwrap();
        assert_eq!(second.keys().collect::<Vec<_>>(), vec!["public_key"]);
    }

    #[test]
    fn test_key_order() {
        let text = "[Interface]\nPrivateKey = P\nAddress = 10.0.0.1\nMTU = 1420\n";
        let value: Value = serde_json::from_str(&to_sing_box(text).unwrap()).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();

        assert_eq!(
            keys,
            vec!["type", "tag", "local_address", "private_key", "mtu", "peers"]
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let text = "[Peer]\nPublicKey = A\nAllowedIPs = ::/0\nEndpoint = a:b:c\n";
        assert!(matches!(
            to_sing_box(text),
            Err(TransformError::InvalidEndpoint { peer: 0, .. })
        ));
    }
}

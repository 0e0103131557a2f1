//! Key Provider
//!
//! Batch derivation needs fresh key pairs but never looks inside them. The
//! [`KeyProvider`] trait is that seam; [`X25519KeyProvider`] fills it with
//! real Curve25519 keys in WireGuard's base64 text form.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

/// A key pair in base64 text form
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub private: String,
    pub public: String,
}

impl KeyPair {
    /// Rebuild the pair for an existing base64 private key
    pub fn from_private_base64(private: &str) -> Result<Self, KeyError> {
        let secret = StaticSecret::from(decode_key(private)?);
        let public = X25519Public::from(&secret);

        Ok(Self {
            private: BASE64.encode(secret.to_bytes()),
            public: BASE64.encode(public.to_bytes()),
        })
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish()
    }
}

fn decode_key(s: &str) -> Result<[u8; 32], KeyError> {
    let bytes = BASE64.decode(s.trim()).map_err(|_| KeyError::InvalidBase64)?;

    bytes.try_into().map_err(|_| KeyError::InvalidLength)
}

/// Source of key material for derived configs
pub trait KeyProvider {
    /// Produce a fresh (private, public) pair
    fn generate_key_pair(&mut self) -> KeyPair;

    /// Produce a fresh pre-shared key
    fn generate_preshared_key(&mut self) -> String;
}

/// Curve25519 keys from the operating system RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519KeyProvider;

impl KeyProvider for X25519KeyProvider {
    fn generate_key_pair(&mut self) -> KeyPair {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519Public::from(&secret);

        KeyPair {
            private: BASE64.encode(secret.to_bytes()),
            public: BASE64.encode(public.to_bytes()),
        }
    }

    fn generate_preshared_key(&mut self) -> String {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        BASE64.encode(key)
    }
}

/// Key parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid base64 encoding")]
    InvalidBase64,

    #[error("Invalid key length (expected 32 bytes)")]
    InvalidLength,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let pair = X25519KeyProvider.generate_key_pair();

        assert_eq!(pair.private.len(), 44);
        assert_eq!(pair.public.len(), 44);
        assert_ne!(pair.private, pair.public);
    }

    #[test]
    fn test_public_from_private() {
        let pair = X25519KeyProvider.generate_key_pair();
        let rebuilt = KeyPair::from_private_base64(&pair.private).unwrap();

        assert_eq!(rebuilt, pair);
    }

    #[test]
    fn test_preshared_key() {
        let mut provider = X25519KeyProvider;
        let a = provider.generate_preshared_key();
        let b = provider.generate_preshared_key();

        assert_eq!(a.len(), 44);
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_base64() {
        let result = KeyPair::from_private_base64("not-valid-base64!!!");
        assert_eq!(result.unwrap_err(), KeyError::InvalidBase64);
    }

    #[test]
    fn test_invalid_length() {
        let result = KeyPair::from_private_base64("AAAA");
        assert_eq!(result.unwrap_err(), KeyError::InvalidLength);
    }

    #[test]
    fn test_debug_redacts_private() {
        let pair = KeyPair {
            private: "secret".to_string(),
            public: "public".to_string(),
        };
        assert!(!format!("{:?}", pair).contains("secret"));
    }
}

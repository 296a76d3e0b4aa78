use super::hash::keccak256;
use crate::error::KeyError;
use k256::ecdsa::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

pub const ADDRESS_SIZE: usize = 20;

/// 20-byte EVM address.
///
/// Two kinds reference the same ledger account:
/// - mirror ("long-zero") addresses derived from an entity id
/// - alias addresses derived from an ECDSA secp256k1 public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EvmAddress([u8; ADDRESS_SIZE]);

impl EvmAddress {
    pub const ZERO: EvmAddress = EvmAddress([0u8; ADDRESS_SIZE]);

    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; ADDRESS_SIZE] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    // First 12 bytes zero means the address encodes shard 0, realm 0 and an entity number
    pub fn is_mirror(&self) -> bool {
        self.0[..12].iter().all(|b| *b == 0)
    }

    /// Alias address of a secp256k1 public key: last 20 bytes of
    /// keccak256 over the uncompressed point without its 0x04 prefix.
    ///
    /// Accepts compressed (33 bytes) or uncompressed (65 bytes) SEC1 encodings.
    pub fn from_public_key(sec1: &[u8]) -> Result<Self, KeyError> {
        let key = VerifyingKey::from_sec1_bytes(sec1).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self::from_verifying_key(&key))
    }

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&hash.as_bytes()[12..]);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for EvmAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl FromStr for EvmAddress {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim().trim_start_matches("0x"))
            .map_err(|_| KeyError::InvalidPublicKey)?;
        Self::from_slice(&bytes).ok_or(KeyError::InvalidPublicKey)
    }
}

impl Serialize for EvmAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EvmAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid EVM address '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    #[test]
    fn test_alias_from_known_private_key() {
        // Private key 1 => generator point, well-known Ethereum address
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let signing = SigningKey::from_slice(&secret).unwrap();
        let address = EvmAddress::from_verifying_key(signing.verifying_key());
        assert_eq!(
            address.to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_compressed_and_uncompressed_agree() {
        let mut secret = [0u8; 32];
        secret[31] = 7;
        let signing = SigningKey::from_slice(&secret).unwrap();
        let verifying = signing.verifying_key();
        let compressed = verifying.to_encoded_point(true);
        let uncompressed = verifying.to_encoded_point(false);
        assert_eq!(
            EvmAddress::from_public_key(compressed.as_bytes()).unwrap(),
            EvmAddress::from_public_key(uncompressed.as_bytes()).unwrap()
        );
    }

    #[test]
    fn test_alias_is_not_mirror() {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let signing = SigningKey::from_slice(&secret).unwrap();
        assert!(!EvmAddress::from_verifying_key(signing.verifying_key()).is_mirror());
    }

    #[test]
    fn test_parse_display_round_trip() {
        let address: EvmAddress = "0x00000000000000000000000000000000000003e9".parse().unwrap();
        assert!(address.is_mirror());
        assert_eq!(address.to_string(), "0x00000000000000000000000000000000000003e9");
    }
}

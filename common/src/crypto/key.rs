use super::address::EvmAddress;
use crate::entity::ContractId;
use crate::error::KeyError;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public key structure controlling an account, token role or contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Key {
    /// Compressed SEC1 secp256k1 public key
    Secp256k1(#[serde(with = "hex")] Vec<u8>),
    /// Active only when the given contract is the caller
    ContractId(ContractId),
    /// Like `ContractId`, but also honoured through delegate calls
    DelegatableContractId(ContractId),
    /// At least `threshold` of `keys` must be active
    Threshold { threshold: u32, keys: Vec<Key> },
    /// Hollow accounts have no key until they are completed
    Empty,
}

impl Key {
    pub fn is_empty(&self) -> bool {
        matches!(self, Key::Empty)
    }

    /// Evaluate the key structure against a leaf predicate
    pub fn is_satisfied_by<F>(&self, leaf: &mut F) -> bool
    where
        F: FnMut(&Key) -> bool,
    {
        match self {
            Key::Empty => false,
            Key::Threshold { threshold, keys } => {
                let mut active = 0u32;
                for key in keys {
                    if key.is_satisfied_by(leaf) {
                        active += 1;
                    }
                    if active >= *threshold {
                        return true;
                    }
                }
                false
            }
            leaf_key => leaf(leaf_key),
        }
    }

    /// EVM alias of a simple secp256k1 key
    pub fn evm_address(&self) -> Option<EvmAddress> {
        match self {
            Key::Secp256k1(bytes) => EvmAddress::from_public_key(bytes).ok(),
            _ => None,
        }
    }
}

/// secp256k1 signing key
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    pub fn generate<R: RngCore>(rng: &mut R) -> Self {
        loop {
            let mut secret = [0u8; 32];
            rng.fill_bytes(&mut secret);
            // Zero and values above the curve order are rejected, retry
            if let Ok(key) = SigningKey::from_slice(&secret) {
                return Self(key);
            }
        }
    }

    pub fn from_bytes(secret: &[u8]) -> Result<Self, KeyError> {
        SigningKey::from_slice(secret)
            .map(Self)
            .map_err(|_| KeyError::InvalidPrivateKey)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes =
            hex::decode(hex_str.trim_start_matches("0x")).map_err(|_| KeyError::InvalidPrivateKey)?;
        Self::from_bytes(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn public_key(&self) -> Vec<u8> {
        self.0.verifying_key().to_encoded_point(true).as_bytes().to_vec()
    }

    pub fn evm_address(&self) -> EvmAddress {
        EvmAddress::from_verifying_key(self.0.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.0.sign(message);
        signature.to_bytes().to_vec()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(0x{})", hex::encode(self.public_key()))
    }
}

pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
    let key = VerifyingKey::from_sec1_bytes(public_key).map_err(|_| KeyError::InvalidPublicKey)?;
    let signature = Signature::from_slice(signature).map_err(|_| KeyError::InvalidSignature)?;
    Ok(key.verify(message, &signature).is_ok())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    #[serde(with = "hex")]
    pub public_key: Vec<u8>,
    #[serde(with = "hex")]
    pub signature: Vec<u8>,
}

impl SignaturePair {
    pub fn verify(&self, message: &[u8]) -> bool {
        verify_signature(&self.public_key, message, &self.signature).unwrap_or(false)
    }
}

/// A key structure together with whatever private keys the harness holds for it
#[derive(Clone)]
pub struct KeyMaterial {
    key: Key,
    private_keys: Vec<PrivateKey>,
}

impl KeyMaterial {
    pub fn simple(private_key: PrivateKey) -> Self {
        Self {
            key: Key::Secp256k1(private_key.public_key()),
            private_keys: vec![private_key],
        }
    }

    pub fn generate<R: RngCore>(rng: &mut R) -> Self {
        Self::simple(PrivateKey::generate(rng))
    }

    /// Threshold-1 list of a simple key and a delegatable contract id
    pub fn delegate(private_key: PrivateKey, contract: ContractId) -> Self {
        Self {
            key: Key::Threshold {
                threshold: 1,
                keys: vec![
                    Key::Secp256k1(private_key.public_key()),
                    Key::DelegatableContractId(contract),
                ],
            },
            private_keys: vec![private_key],
        }
    }

    pub fn contract(contract: ContractId) -> Self {
        Self {
            key: Key::ContractId(contract),
            private_keys: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self {
            key: Key::Empty,
            private_keys: Vec::new(),
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn private_keys(&self) -> &[PrivateKey] {
        &self.private_keys
    }

    pub fn evm_address(&self) -> Option<EvmAddress> {
        self.key.evm_address()
    }

    /// Simple secp256k1 public key, if this material is one
    pub fn public_key(&self) -> Option<&[u8]> {
        match &self.key {
            Key::Secp256k1(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn sign(&self, message: &[u8]) -> Vec<SignaturePair> {
        self.private_keys
            .iter()
            .map(|pk| SignaturePair {
                public_key: pk.public_key(),
                signature: pk.sign(message),
            })
            .collect()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &self.key)
            .field("private_keys", &self.private_keys.len())
            .finish()
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sign_and_verify() {
        let mut rng = StdRng::seed_from_u64(42);
        let material = KeyMaterial::generate(&mut rng);
        let pairs = material.sign(b"body");
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].verify(b"body"));
        assert!(!pairs[0].verify(b"other body"));
    }

    #[test]
    fn test_generation_is_seeded() {
        let a = KeyMaterial::generate(&mut StdRng::seed_from_u64(7));
        let b = KeyMaterial::generate(&mut StdRng::seed_from_u64(7));
        assert_eq!(a.key(), b.key());
        assert_eq!(a.evm_address(), b.evm_address());
    }

    #[test]
    fn test_threshold_evaluation() {
        let mut rng = StdRng::seed_from_u64(1);
        let pk = PrivateKey::generate(&mut rng);
        let contract = ContractId::from_num(1001);
        let delegate = KeyMaterial::delegate(pk, contract);

        let mut only_contract = |leaf: &Key| matches!(leaf, Key::DelegatableContractId(c) if *c == contract);
        assert!(delegate.key().is_satisfied_by(&mut only_contract));

        let mut nothing = |_: &Key| false;
        assert!(!delegate.key().is_satisfied_by(&mut nothing));
        assert!(!Key::Empty.is_satisfied_by(&mut |_: &Key| true));
    }

    #[test]
    fn test_key_serde_tags() {
        let json = serde_json::to_string(&Key::ContractId(ContractId::from_num(5))).unwrap();
        assert_eq!(json, r#"{"type":"contract_id","value":"0.0.5"}"#);
        let back: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Key::ContractId(ContractId::from_num(5)));
    }
}

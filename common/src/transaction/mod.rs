use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use strum::AsRefStr;

use crate::{
    crypto::{KeyMaterial, SignaturePair},
    entity::AccountId,
};

mod payload;

pub use payload::*;

/// Consensus-style timestamp
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    const NANOS_PER_SECOND: u64 = 1_000_000_000;

    pub fn from_nanos(total: u64) -> Self {
        Self {
            seconds: (total / Self::NANOS_PER_SECOND) as i64,
            nanos: (total % Self::NANOS_PER_SECOND) as u32,
        }
    }

    pub fn as_nanos(&self) -> u64 {
        (self.seconds.max(0) as u64) * Self::NANOS_PER_SECOND + self.nanos as u64
    }

    pub fn plus_nanos(&self, nanos: u64) -> Self {
        Self::from_nanos(self.as_nanos() + nanos)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

/// Payer plus valid-start; child transactions share it and differ by nonce
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransactionId {
    pub payer: AccountId,
    pub valid_start: Timestamp,
    #[serde(default)]
    pub nonce: u32,
}

impl TransactionId {
    pub fn new(payer: AccountId, valid_start: Timestamp) -> Self {
        Self {
            payer,
            valid_start,
            nonce: 0,
        }
    }

    /// Id of the `nonce`-th child of this transaction
    pub fn child(&self, nonce: u32) -> Self {
        Self { nonce, ..*self }
    }

    pub fn parent(&self) -> Self {
        self.child(0)
    }

    pub fn is_child(&self) -> bool {
        self.nonce > 0
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.payer, self.valid_start)?;
        if self.nonce > 0 {
            write!(f, "/{}", self.nonce)?;
        }
        Ok(())
    }
}

// Every transaction kind the harness can submit
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "PascalCase")]
pub enum TransactionData {
    CryptoCreate(CryptoCreatePayload),
    CryptoUpdate(CryptoUpdatePayload),
    CryptoTransfer(CryptoTransferPayload),
    CryptoApproveAllowance(CryptoApproveAllowancePayload),
    TokenCreate(TokenCreatePayload),
    TokenAssociate(TokenAssociationPayload),
    TokenDissociate(TokenAssociationPayload),
    TokenMint(TokenMintPayload),
    TokenBurn(TokenBurnPayload),
    TokenGrantKyc(TokenKycPayload),
    TokenRevokeKyc(TokenKycPayload),
    ContractCreate(ContractCreatePayload),
    ContractCall(ContractCallPayload),
    NetworkProperties(NetworkPropertiesPayload),
}

impl TransactionData {
    pub fn kind(&self) -> &str {
        self.as_ref()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransactionBody {
    pub transaction_id: TransactionId,
    pub max_fee: u64,
    #[serde(default)]
    pub memo: String,
    pub data: TransactionData,
}

impl TransactionBody {
    /// Bytes covered by signatures
    pub fn bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SignedTransaction {
    pub body: TransactionBody,
    pub signatures: Vec<SignaturePair>,
}

impl SignedTransaction {
    pub fn sign<'a, I>(body: TransactionBody, signers: I) -> Result<Self, serde_json::Error>
    where
        I: IntoIterator<Item = &'a KeyMaterial>,
    {
        let bytes = body.bytes()?;
        let signatures = signers
            .into_iter()
            .flat_map(|material| material.sign(&bytes))
            .collect();
        Ok(Self { body, signatures })
    }

    pub fn id(&self) -> TransactionId {
        self.body.transaction_id
    }

    /// Compressed public keys that produced a valid signature over the body
    pub fn verified_keys(&self) -> Vec<Vec<u8>> {
        let Ok(bytes) = self.body.bytes() else {
            return Vec::new();
        };
        self.signatures
            .iter()
            .filter(|pair| pair.verify(&bytes))
            .map(|pair| pair.public_key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use crate::entity::TokenId;

    fn body() -> TransactionBody {
        TransactionBody {
            transaction_id: TransactionId::new(AccountId::from_num(2), Timestamp::from_nanos(5)),
            max_fee: 100,
            memo: String::new(),
            data: TransactionData::TokenAssociate(TokenAssociationPayload {
                account: AccountId::from_num(1001),
                tokens: vec![TokenId::from_num(1002)],
            }),
        }
    }

    #[test]
    fn test_transaction_id_display() {
        let id = TransactionId::new(AccountId::from_num(2), Timestamp::from_nanos(1_500_000_000));
        assert_eq!(id.to_string(), "0.0.2@1.500000000");
        assert_eq!(id.child(2).to_string(), "0.0.2@1.500000000/2");
        assert_eq!(id.child(2).parent(), id);
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(body().data.kind(), "TokenAssociate");
    }

    #[test]
    fn test_signatures_verify_against_body() {
        let material = KeyMaterial::simple(PrivateKey::from_bytes(&[7u8; 32]).unwrap());
        let signed = SignedTransaction::sign(body(), [&material]).unwrap();
        assert_eq!(signed.verified_keys(), vec![material.public_key().unwrap().to_vec()]);

        let mut tampered = signed.clone();
        tampered.body.max_fee = 1;
        assert!(tampered.verified_keys().is_empty());
    }
}

use crate::crypto::{EvmAddress, Key};
use crate::entity::{AccountId, ContractId, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

/// Signed hbar or fungible-token movement
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AccountAmount {
    pub account: AccountId,
    pub amount: i64,
    // Debit authorized by an allowance rather than the owner's key
    #[serde(default)]
    pub is_approval: bool,
}

impl AccountAmount {
    pub fn new(account: AccountId, amount: i64) -> Self {
        Self {
            account,
            amount,
            is_approval: false,
        }
    }

    pub fn approved(account: AccountId, amount: i64) -> Self {
        Self {
            account,
            amount,
            is_approval: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NftTransfer {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub serial_number: i64,
    #[serde(default)]
    pub is_approval: bool,
}

/// All movements of a single token inside one transaction
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenTransferList {
    pub token: TokenId,
    #[serde(default)]
    pub transfers: Vec<AccountAmount>,
    #[serde(default)]
    pub nft_transfers: Vec<NftTransfer>,
}

impl TokenTransferList {
    pub fn fungible(token: TokenId, transfers: Vec<AccountAmount>) -> Self {
        Self {
            token,
            transfers,
            nft_transfers: Vec::new(),
        }
    }

    pub fn nft(token: TokenId, nft_transfers: Vec<NftTransfer>) -> Self {
        Self {
            token,
            transfers: Vec::new(),
            nft_transfers,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CryptoAllowance {
    pub owner: AccountId,
    pub spender: AccountId,
    pub amount: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenAllowance {
    pub token: TokenId,
    pub owner: AccountId,
    pub spender: AccountId,
    pub amount: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NftAllowance {
    pub token: TokenId,
    pub owner: AccountId,
    pub spender: AccountId,
    #[serde(default)]
    pub serial_numbers: Vec<i64>,
    #[serde(default)]
    pub approved_for_all: bool,
}

#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TokenType {
    #[default]
    FungibleCommon,
    NonFungibleUnique,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CryptoCreatePayload {
    pub key: Key,
    pub initial_balance: u64,
    #[serde(default)]
    pub receiver_sig_required: bool,
    #[serde(default)]
    pub max_automatic_token_associations: i32,
    #[serde(default)]
    pub memo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<EvmAddress>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CryptoUpdatePayload {
    pub account: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_sig_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_automatic_token_associations: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct CryptoTransferPayload {
    #[serde(default)]
    pub hbar_transfers: Vec<AccountAmount>,
    #[serde(default)]
    pub token_transfers: Vec<TokenTransferList>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct CryptoApproveAllowancePayload {
    #[serde(default)]
    pub crypto_allowances: Vec<CryptoAllowance>,
    #[serde(default)]
    pub token_allowances: Vec<TokenAllowance>,
    #[serde(default)]
    pub nft_allowances: Vec<NftAllowance>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenCreatePayload {
    pub name: String,
    pub symbol: String,
    pub token_type: TokenType,
    pub decimals: u32,
    pub initial_supply: u64,
    pub treasury: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_key: Option<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_key: Option<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyc_key: Option<Key>,
    #[serde(default)]
    pub memo: String,
}

/// Associate or dissociate `tokens` with `account`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenAssociationPayload {
    pub account: AccountId,
    pub tokens: Vec<TokenId>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenMintPayload {
    pub token: TokenId,
    #[serde(default)]
    pub amount: u64,
    // One entry per NFT to mint
    #[serde(default)]
    pub metadata: Vec<Vec<u8>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenBurnPayload {
    pub token: TokenId,
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub serial_numbers: Vec<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenKycPayload {
    pub token: TokenId,
    pub account: AccountId,
}

/// Contracts are deployed by program name; the ledger owns the code
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContractCreatePayload {
    pub program: String,
    pub gas: u64,
    #[serde(default)]
    pub initial_balance: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_key: Option<Key>,
    #[serde(default)]
    pub max_automatic_token_associations: i32,
    #[serde(default)]
    pub memo: String,
    #[serde(default, with = "hex")]
    pub constructor_parameters: Vec<u8>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContractCallPayload {
    pub contract: ContractId,
    pub gas: u64,
    #[serde(default)]
    pub amount: u64,
    #[serde(with = "hex")]
    pub function_parameters: Vec<u8>,
}

/// Network property changes; `reset` keys go back to their defaults
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct NetworkPropertiesPayload {
    #[serde(default)]
    pub set: BTreeMap<String, String>,
    #[serde(default)]
    pub reset: Vec<String>,
}

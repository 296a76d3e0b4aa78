//! Read-only queries and their answers

use crate::crypto::{EvmAddress, Key};
use crate::entity::{AccountId, ContractId, TokenId};
use crate::record::TransactionRecord;
use crate::response_code::ResponseCode;
use crate::transaction::{CryptoAllowance, TokenAllowance, TokenType, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use strum::AsRefStr;

/// An account is addressed either by id or by its EVM alias
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccountLookup {
    Id(AccountId),
    Alias(EvmAddress),
}

impl Display for AccountLookup {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AccountLookup::Id(id) => write!(f, "{}", id),
            AccountLookup::Alias(address) => write!(f, "{}", address),
        }
    }
}

impl From<AccountId> for AccountLookup {
    fn from(id: AccountId) -> Self {
        AccountLookup::Id(id)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, AsRefStr)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    AccountBalance(AccountLookup),
    AccountInfo(AccountLookup),
    TokenInfo(TokenId),
    ContractInfo(ContractId),
    TransactionRecord {
        transaction_id: TransactionId,
        include_children: bool,
    },
    NetworkProperties(Vec<String>),
}

impl Query {
    /// Balance lookups are free on the ledger
    pub fn is_free(&self) -> bool {
        matches!(self, Query::AccountBalance(_))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AccountBalance {
    pub account: AccountId,
    pub hbars: u64,
    #[serde(default)]
    pub tokens: BTreeMap<TokenId, u64>,
}

impl AccountBalance {
    pub fn token(&self, token: &TokenId) -> u64 {
        self.tokens.get(token).copied().unwrap_or_default()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    #[default]
    KycNotApplicable,
    Granted,
    Revoked,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenRelationship {
    pub token: TokenId,
    pub balance: u64,
    pub kyc_status: KycStatus,
    #[serde(default)]
    pub automatic_association: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AccountInfo {
    pub account: AccountId,
    // Alias for hollow and aliased accounts, mirror address otherwise
    pub evm_address: EvmAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<EvmAddress>,
    pub key: Key,
    pub balance: u64,
    pub receiver_sig_required: bool,
    pub memo: String,
    pub max_automatic_token_associations: i32,
    #[serde(default)]
    pub crypto_allowances: Vec<CryptoAllowance>,
    #[serde(default)]
    pub token_allowances: Vec<TokenAllowance>,
    #[serde(default)]
    pub token_relationships: Vec<TokenRelationship>,
}

impl AccountInfo {
    pub fn relationship(&self, token: &TokenId) -> Option<&TokenRelationship> {
        self.token_relationships.iter().find(|rel| rel.token == *token)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
    pub token: TokenId,
    pub name: String,
    pub symbol: String,
    pub token_type: TokenType,
    pub decimals: u32,
    pub total_supply: u64,
    pub treasury: AccountId,
    pub evm_address: EvmAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_key: Option<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_key: Option<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyc_key: Option<Key>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContractInfo {
    pub contract: ContractId,
    pub account: AccountId,
    pub evm_address: EvmAddress,
    pub program: String,
    pub balance: u64,
    pub memo: String,
    pub max_automatic_token_associations: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_key: Option<Key>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, AsRefStr)]
#[serde(rename_all = "snake_case")]
pub enum QueryResponse {
    AccountBalance(AccountBalance),
    AccountInfo(Box<AccountInfo>),
    TokenInfo(Box<TokenInfo>),
    ContractInfo(Box<ContractInfo>),
    TransactionRecord(Box<TransactionRecord>),
    NetworkProperties(BTreeMap<String, String>),
}

/// Answer to a paid query: precheck status, then the payload on OK
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct QueryAnswer {
    pub precheck: ResponseCode,
    #[serde(default)]
    pub cost: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<QueryResponse>,
}

impl QueryAnswer {
    pub fn ok(cost: u64, response: QueryResponse) -> Self {
        Self {
            precheck: ResponseCode::Ok,
            cost,
            response: Some(response),
        }
    }

    pub fn rejected(precheck: ResponseCode) -> Self {
        Self {
            precheck,
            cost: 0,
            response: None,
        }
    }
}

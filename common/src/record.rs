//! Receipts and records returned by the ledger once a transaction reaches
//! consensus. Child records produced during a parent's execution are nested
//! inside the parent in emission order.

use crate::abi::{FunctionType, PrecompileResult};
use crate::crypto::{EvmAddress, Hash};
use crate::entity::{AccountId, ContractId, TokenId};
use crate::error::AbiError;
use crate::response_code::ResponseCode;
use crate::transaction::{AccountAmount, NftTransfer, Timestamp, TokenTransferList, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct TransactionReceipt {
    pub status: ResponseCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<TokenId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<ContractId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_total_supply: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub serial_numbers: Vec<i64>,
}

impl TransactionReceipt {
    pub fn with_status(status: ResponseCode) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContractLog {
    pub contract: ContractId,
    pub topics: Vec<Hash>,
    #[serde(with = "hex")]
    pub data: Vec<u8>,
}

/// Result of a contract call, or of a precompile dispatch in a child record
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ContractFunctionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<ContractId>,
    #[serde(default, with = "hex")]
    pub result: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub gas_used: u64,
    #[serde(default)]
    pub logs: Vec<ContractLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_address: Option<EvmAddress>,
}

impl ContractFunctionResult {
    /// Interpret the raw result as an HTS precompile result
    pub fn precompile_result(&self, function: FunctionType) -> Result<PrecompileResult, AbiError> {
        PrecompileResult::decode(function, &self.result)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TokenAssociation {
    pub token: TokenId,
    pub account: AccountId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    pub receipt: TransactionReceipt,
    pub consensus_timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_consensus_timestamp: Option<Timestamp>,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub transaction_fee: u64,
    #[serde(default)]
    pub hbar_transfers: Vec<AccountAmount>,
    #[serde(default)]
    pub token_transfer_lists: Vec<TokenTransferList>,
    #[serde(default)]
    pub automatic_token_associations: Vec<TokenAssociation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_call_result: Option<ContractFunctionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_create_result: Option<ContractFunctionResult>,
    // EVM alias of an account created by this transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_address: Option<EvmAddress>,
    #[serde(default)]
    pub children: Vec<TransactionRecord>,
}

impl TransactionRecord {
    pub fn new(transaction_id: TransactionId, status: ResponseCode, consensus_timestamp: Timestamp) -> Self {
        Self {
            transaction_id,
            receipt: TransactionReceipt::with_status(status),
            consensus_timestamp,
            parent_consensus_timestamp: None,
            memo: String::new(),
            transaction_fee: 0,
            hbar_transfers: Vec::new(),
            token_transfer_lists: Vec::new(),
            automatic_token_associations: Vec::new(),
            contract_call_result: None,
            contract_create_result: None,
            evm_address: None,
            children: Vec::new(),
        }
    }

    pub fn status(&self) -> ResponseCode {
        self.receipt.status
    }

    pub fn is_child(&self) -> bool {
        self.parent_consensus_timestamp.is_some()
    }

    /// Hbar net change per account
    pub fn net_hbar_changes(&self) -> BTreeMap<AccountId, i64> {
        let mut changes = BTreeMap::new();
        for aa in &self.hbar_transfers {
            let total = changes.entry(aa.account).or_insert(0i64);
            *total = total.saturating_add(aa.amount);
        }
        changes
    }

    /// Fungible net change per (account, token)
    pub fn net_token_changes(&self) -> BTreeMap<(AccountId, TokenId), i64> {
        let mut changes = BTreeMap::new();
        for list in &self.token_transfer_lists {
            for aa in &list.transfers {
                let total = changes.entry((aa.account, list.token)).or_insert(0i64);
                *total = total.saturating_add(aa.amount);
            }
        }
        changes
    }

    pub fn nft_transfers(&self) -> impl Iterator<Item = (TokenId, &NftTransfer)> {
        self.token_transfer_lists
            .iter()
            .flat_map(|list| list.nft_transfers.iter().map(move |t| (list.token, t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_changes_are_summed() {
        let id = TransactionId::new(AccountId::from_num(2), Timestamp::default());
        let mut record = TransactionRecord::new(id, ResponseCode::Success, Timestamp::from_nanos(1));
        let a = AccountId::from_num(1001);
        let b = AccountId::from_num(1002);
        let token = TokenId::from_num(1003);
        record.hbar_transfers = vec![
            AccountAmount::new(a, -10),
            AccountAmount::new(b, 4),
            AccountAmount::new(b, 6),
        ];
        record.token_transfer_lists = vec![
            TokenTransferList::fungible(token, vec![AccountAmount::new(a, -3)]),
            TokenTransferList::fungible(token, vec![AccountAmount::new(a, 1), AccountAmount::new(b, 2)]),
        ];

        assert_eq!(record.net_hbar_changes()[&b], 10);
        assert_eq!(record.net_token_changes()[&(a, token)], -2);
        assert_eq!(record.net_token_changes()[&(b, token)], 2);
    }

    #[test]
    fn test_record_json_shape() {
        let id = TransactionId::new(AccountId::from_num(2), Timestamp::default());
        let record = TransactionRecord::new(id, ResponseCode::ContractRevertExecuted, Timestamp::from_nanos(3));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["receipt"]["status"], "CONTRACT_REVERT_EXECUTED");
        let back: TransactionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}

// Read-only queries with optional expectations and exposures.

use super::QueryExposure;
use crate::assertions::{
    AccountInfoExpectation, BalanceExpectation, ContractInfoExpectation, RecordExpectation, TokenInfoExpectation,
};
use crate::error::{HarnessError, HarnessResult};
use crate::registry::{Registry, RegistryValue};
use hts_common::query::QueryResponse;
use hts_common::ResponseCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountSelector {
    Named(String),
    /// By the EVM alias bound to (or derived from the key bound to) this name
    Alias(String),
}

impl AccountSelector {
    fn name(&self) -> &str {
        match self {
            AccountSelector::Named(name) | AccountSelector::Alias(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    AccountBalance(AccountSelector),
    AccountInfo(AccountSelector),
    TokenInfo(String),
    ContractInfo(String),
    TxnRecord { txn: String, include_children: bool },
    NetworkProperties(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub payer: Option<String>,
    /// Expected precheck of the cost and answer steps
    pub expected_precheck: ResponseCode,
    pub logged: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            payer: None,
            expected_precheck: ResponseCode::Ok,
            logged: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum QueryExpectation {
    Balance(BalanceExpectation),
    AccountInfo(AccountInfoExpectation),
    TokenInfo(TokenInfoExpectation),
    ContractInfo(ContractInfoExpectation),
    Record(RecordExpectation),
}

pub struct QueryOp {
    pub target: QueryTarget,
    pub options: QueryOptions,
    pub expectation: Option<QueryExpectation>,
    pub exposures: Vec<QueryExposure>,
}

impl QueryOp {
    fn new(target: QueryTarget) -> Self {
        Self {
            target,
            options: QueryOptions::default(),
            expectation: None,
            exposures: Vec::new(),
        }
    }

    pub fn has(mut self, expectation: QueryExpectation) -> Self {
        self.expectation = Some(expectation);
        self
    }

    pub fn has_balance(self, expectation: BalanceExpectation) -> Self {
        self.has(QueryExpectation::Balance(expectation))
    }

    pub fn has_info(self, expectation: AccountInfoExpectation) -> Self {
        self.has(QueryExpectation::AccountInfo(expectation))
    }

    pub fn has_token_info(self, expectation: TokenInfoExpectation) -> Self {
        self.has(QueryExpectation::TokenInfo(expectation))
    }

    pub fn has_contract_info(self, expectation: ContractInfoExpectation) -> Self {
        self.has(QueryExpectation::ContractInfo(expectation))
    }

    pub fn has_record(self, expectation: RecordExpectation) -> Self {
        self.has(QueryExpectation::Record(expectation))
    }

    pub fn paying_with(mut self, payer: &str) -> Self {
        self.options.payer = Some(payer.to_string());
        self
    }

    /// Expect the cost or answer step to be rejected with `code`
    pub fn has_cost_answer_precheck(mut self, code: ResponseCode) -> Self {
        self.options.expected_precheck = code;
        self
    }

    pub fn logged(mut self) -> Self {
        self.options.logged = true;
        self
    }

    pub fn exposing<F>(mut self, exposure: F) -> Self
    where
        F: FnOnce(&QueryResponse, &mut Registry) -> HarnessResult<()> + Send + 'static,
    {
        self.exposures.push(Box::new(exposure));
        self
    }

    pub(crate) fn describe(&self) -> String {
        match &self.target {
            QueryTarget::AccountBalance(who) => format!("getAccountBalance({})", who.name()),
            QueryTarget::AccountInfo(who) => format!("getAccountInfo({})", who.name()),
            QueryTarget::TokenInfo(token) => format!("getTokenInfo({})", token),
            QueryTarget::ContractInfo(contract) => format!("getContractInfo({})", contract),
            QueryTarget::TxnRecord { txn, .. } => format!("getTxnRecord({})", txn),
            QueryTarget::NetworkProperties(keys) => format!("getNetworkProperties({})", keys.join(",")),
        }
    }
}

pub fn get_account_balance(account: &str) -> QueryOp {
    QueryOp::new(QueryTarget::AccountBalance(AccountSelector::Named(account.to_string())))
}

pub fn get_aliased_account_balance(alias: &str) -> QueryOp {
    QueryOp::new(QueryTarget::AccountBalance(AccountSelector::Alias(alias.to_string())))
}

pub fn get_account_info(account: &str) -> QueryOp {
    QueryOp::new(QueryTarget::AccountInfo(AccountSelector::Named(account.to_string())))
}

pub fn get_aliased_account_info(alias: &str) -> QueryOp {
    QueryOp::new(QueryTarget::AccountInfo(AccountSelector::Alias(alias.to_string())))
}

pub fn get_token_info(token: &str) -> QueryOp {
    QueryOp::new(QueryTarget::TokenInfo(token.to_string()))
}

pub fn get_contract_info(contract: &str) -> QueryOp {
    QueryOp::new(QueryTarget::ContractInfo(contract.to_string()))
}

pub fn get_txn_record(txn: &str) -> QueryOp {
    QueryOp::new(QueryTarget::TxnRecord {
        txn: txn.to_string(),
        include_children: false,
    })
}

/// Record of `txn` with all its child records
pub fn get_txn_record_with_children(txn: &str) -> QueryOp {
    QueryOp::new(QueryTarget::TxnRecord {
        txn: txn.to_string(),
        include_children: true,
    })
}

pub fn get_network_properties(keys: &[&str]) -> QueryOp {
    QueryOp::new(QueryTarget::NetworkProperties(
        keys.iter().map(|k| k.to_string()).collect(),
    ))
}

/// Bind the current balance of `account` as snapshot `name`
pub fn balance_snapshot(name: &str, account: &str) -> QueryOp {
    let name = name.to_string();
    get_account_balance(account).exposing(move |response, registry| match response {
        QueryResponse::AccountBalance(balance) => Ok(registry.put(&name, RegistryValue::Snapshot(balance.clone()))?),
        other => Err(HarnessError::transport(format!(
            "balance snapshot got a {} answer",
            other.as_ref()
        ))),
    })
}

/// Bind the EVM address reported for `account` under `name`
pub fn expose_evm_address(name: &str, account: &str) -> QueryOp {
    let name = name.to_string();
    get_account_info(account).exposing(move |response, registry| match response {
        QueryResponse::AccountInfo(info) => Ok(registry.put(&name, RegistryValue::Address(info.evm_address))?),
        other => Err(HarnessError::transport(format!(
            "address exposure got a {} answer",
            other.as_ref()
        ))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hts_common::query::AccountBalance;
    use hts_common::AccountId;

    #[test]
    fn test_snapshot_exposure_binds_balance() {
        let op = balance_snapshot("before", "alice");
        assert_eq!(op.describe(), "getAccountBalance(alice)");
        let mut registry = Registry::new();
        let response = QueryResponse::AccountBalance(AccountBalance {
            account: AccountId::from_num(1001),
            hbars: 42,
            tokens: Default::default(),
        });
        for exposure in op.exposures {
            exposure(&response, &mut registry).unwrap();
        }
        assert_eq!(registry.snapshot("before").unwrap().hbars, 42);
    }

    #[test]
    fn test_cost_answer_precheck_option() {
        let op = get_aliased_account_info("alias").has_cost_answer_precheck(ResponseCode::InvalidAccountId);
        assert_eq!(op.options.expected_precheck, ResponseCode::InvalidAccountId);
        assert!(matches!(op.target, QueryTarget::AccountInfo(AccountSelector::Alias(_))));
    }
}

//! Expectations over a single transaction record.
//!
//! A [`RecordExpectation`] names entities by registry name; they are resolved
//! when the expectation is checked, so it can be written before the entities
//! exist. Only the fields that were set are compared.

use super::logs::{match_logs, LogExpectation};
use super::status::match_status;
use super::transfers::match_including;
use crate::error::{HarnessResult, Mismatch};
use crate::registry::Registry;
use hts_common::abi::{FunctionType, Token};
use hts_common::record::{ContractFunctionResult, TransactionRecord};
use hts_common::{AccountId, ResponseCode, TokenId};
use primitive_types::U256;
use std::fmt::{self, Display, Formatter};

/// Expected decoded fields of an HTS precompile result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecompileExpectation {
    pub function: FunctionType,
    pub status: ResponseCode,
    pub allowance: Option<U256>,
    pub total_supply: Option<u64>,
    pub serial_numbers: Option<Vec<i64>>,
    pub flag: Option<bool>,
}

impl PrecompileExpectation {
    /// Status-only result; every precompile layout starts with it
    pub fn status(status: ResponseCode) -> Self {
        Self::for_function(FunctionType::HapiTransfer, status)
    }

    pub fn for_function(function: FunctionType, status: ResponseCode) -> Self {
        Self {
            function,
            status,
            allowance: None,
            total_supply: None,
            serial_numbers: None,
            flag: None,
        }
    }

    pub fn with_allowance(mut self, allowance: u64) -> Self {
        self.allowance = Some(U256::from(allowance));
        self
    }

    pub fn with_total_supply(mut self, total_supply: u64) -> Self {
        self.total_supply = Some(total_supply);
        self
    }

    pub fn with_serial_numbers(mut self, serial_numbers: Vec<i64>) -> Self {
        self.serial_numbers = Some(serial_numbers);
        self
    }

    pub fn with_flag(mut self, flag: bool) -> Self {
        self.flag = Some(flag);
        self
    }

    fn check(&self, result: &ContractFunctionResult) -> Vec<Mismatch> {
        let decoded = match result.precompile_result(self.function) {
            Ok(decoded) => decoded,
            Err(err) => return vec![Mismatch::new("precompile", "decodable result", err)],
        };
        let mut mismatches: Vec<Mismatch> = match_status("precompile.status", self.status, decoded.status)
            .into_iter()
            .collect();
        if let Some(allowance) = self.allowance {
            let observed = decoded.allowance.unwrap_or_default();
            if observed != allowance {
                mismatches.push(Mismatch::new("precompile.allowance", allowance, observed));
            }
        }
        if let Some(total_supply) = self.total_supply {
            if decoded.total_supply != Some(total_supply) {
                mismatches.push(Mismatch::new(
                    "precompile.total_supply",
                    total_supply,
                    OptionDisplay(decoded.total_supply),
                ));
            }
        }
        if let Some(serials) = &self.serial_numbers {
            if *serials != decoded.serial_numbers {
                mismatches.push(Mismatch::new(
                    "precompile.serial_numbers",
                    format!("{:?}", serials),
                    format!("{:?}", decoded.serial_numbers),
                ));
            }
        }
        if let Some(flag) = self.flag {
            if decoded.flag != Some(flag) {
                mismatches.push(Mismatch::new("precompile.flag", flag, OptionDisplay(decoded.flag)));
            }
        }
        mismatches
    }
}

/// Values a contract function returned, decoded through its declared outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnExpectation {
    pub contract: String,
    pub function: String,
    pub values: Vec<Token>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractResultExpectation {
    pub return_values: Option<ReturnExpectation>,
    pub gas_used: Option<u64>,
    pub error_message: Option<String>,
    pub logs: Option<Vec<LogExpectation>>,
    pub precompile: Option<PrecompileExpectation>,
}

impl ContractResultExpectation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(mut self, contract: &str, function: &str, values: Vec<Token>) -> Self {
        self.return_values = Some(ReturnExpectation {
            contract: contract.to_string(),
            function: function.to_string(),
            values,
        });
        self
    }

    pub fn gas_used(mut self, gas: u64) -> Self {
        self.gas_used = Some(gas);
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn logs(mut self, logs: Vec<LogExpectation>) -> Self {
        self.logs = Some(logs);
        self
    }

    pub fn precompile(mut self, precompile: PrecompileExpectation) -> Self {
        self.precompile = Some(precompile);
        self
    }

    fn check(&self, result: &ContractFunctionResult, registry: &Registry) -> HarnessResult<Vec<Mismatch>> {
        let mut mismatches = Vec::new();
        if let Some(expected) = &self.return_values {
            let contract = registry.contract(&expected.contract)?;
            let function = contract.abi.function(&expected.function)?;
            match function.decode_output(&result.result) {
                Ok(values) if values == expected.values => {}
                Ok(values) => mismatches.push(Mismatch::new(
                    "return_values",
                    TokenList(&expected.values),
                    TokenList(&values),
                )),
                Err(err) => mismatches.push(Mismatch::new("return_values", "decodable output", err)),
            }
        }
        if let Some(gas) = self.gas_used {
            if result.gas_used != gas {
                mismatches.push(Mismatch::new("gas_used", gas, result.gas_used));
            }
        }
        if let Some(message) = &self.error_message {
            if result.error_message.as_deref() != Some(message.as_str()) {
                mismatches.push(Mismatch::new(
                    "error_message",
                    message,
                    OptionDisplay(result.error_message.as_deref()),
                ));
            }
        }
        if let Some(logs) = &self.logs {
            mismatches.extend(match_logs(&result.logs, logs));
        }
        if let Some(precompile) = &self.precompile {
            mismatches.extend(precompile.check(result));
        }
        Ok(mismatches)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NftMovement {
    token: String,
    from: String,
    to: String,
    serial: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordExpectation {
    status: Option<ResponseCode>,
    memo: Option<String>,
    alias: Option<String>,
    hbar_transfers: Vec<(String, i64)>,
    token_transfers: Vec<(String, String, i64)>,
    nft_transfers: Vec<NftMovement>,
    new_associations: Vec<(String, String)>,
    new_total_supply: Option<u64>,
    serial_numbers: Option<Vec<i64>>,
    child_count: Option<usize>,
    contract_result: Option<ContractResultExpectation>,
}

impl RecordExpectation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ResponseCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// The record created an account whose EVM alias is the address bound to `name`
    pub fn alias(mut self, name: &str) -> Self {
        self.alias = Some(name.to_string());
        self
    }

    /// Net hbar movement of `amount` tinybars from `from` to `to`
    pub fn hbar_transfer(mut self, from: &str, to: &str, amount: i64) -> Self {
        self.hbar_transfers.push((from.to_string(), -amount));
        self.hbar_transfers.push((to.to_string(), amount));
        self
    }

    /// Net hbar change of a single account
    pub fn hbar_change(mut self, account: &str, amount: i64) -> Self {
        self.hbar_transfers.push((account.to_string(), amount));
        self
    }

    pub fn token_transfer(mut self, token: &str, from: &str, to: &str, amount: i64) -> Self {
        self.token_transfers.push((token.to_string(), from.to_string(), -amount));
        self.token_transfers.push((token.to_string(), to.to_string(), amount));
        self
    }

    pub fn token_change(mut self, token: &str, account: &str, amount: i64) -> Self {
        self.token_transfers.push((token.to_string(), account.to_string(), amount));
        self
    }

    pub fn nft_transfer(mut self, token: &str, from: &str, to: &str, serial: i64) -> Self {
        self.nft_transfers.push(NftMovement {
            token: token.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            serial,
        });
        self
    }

    pub fn new_association(mut self, token: &str, account: &str) -> Self {
        self.new_associations.push((token.to_string(), account.to_string()));
        self
    }

    pub fn new_total_supply(mut self, supply: u64) -> Self {
        self.new_total_supply = Some(supply);
        self
    }

    pub fn serial_numbers(mut self, serials: Vec<i64>) -> Self {
        self.serial_numbers = Some(serials);
        self
    }

    pub fn child_count(mut self, count: usize) -> Self {
        self.child_count = Some(count);
        self
    }

    pub fn contract_result(mut self, expectation: ContractResultExpectation) -> Self {
        self.contract_result = Some(expectation);
        self
    }

    /// Shorthand for a contract result holding only a precompile expectation
    pub fn precompile(self, expectation: PrecompileExpectation) -> Self {
        self.contract_result(ContractResultExpectation::new().precompile(expectation))
    }

    /// Every differing field, or an authoring error if a name does not resolve
    pub fn check(&self, record: &TransactionRecord, registry: &Registry) -> HarnessResult<Vec<Mismatch>> {
        let mut mismatches = Vec::new();

        if let Some(status) = self.status {
            mismatches.extend(match_status("status", status, record.status()));
        }
        if let Some(memo) = &self.memo {
            if record.memo != *memo {
                mismatches.push(Mismatch::new("memo", memo, &record.memo));
            }
        }
        if let Some(name) = &self.alias {
            let expected = registry.address_of(name)?;
            if record.evm_address != Some(expected) {
                mismatches.push(Mismatch::new("evm_address", expected, OptionDisplay(record.evm_address)));
            }
        }
        if !self.hbar_transfers.is_empty() {
            let expected = self
                .hbar_transfers
                .iter()
                .map(|(name, amount)| Ok((registry.account_id(name)?, *amount)))
                .collect::<HarnessResult<Vec<(AccountId, i64)>>>()?;
            mismatches.extend(match_including("hbar_transfers", &record.net_hbar_changes(), &expected));
        }
        if !self.token_transfers.is_empty() {
            let expected = self
                .token_transfers
                .iter()
                .map(|(token, name, amount)| {
                    Ok((TokenAccount(registry.account_id(name)?, registry.token_id(token)?), *amount))
                })
                .collect::<HarnessResult<Vec<(TokenAccount, i64)>>>()?;
            let observed = record
                .net_token_changes()
                .into_iter()
                .map(|((account, token), amount)| (TokenAccount(account, token), amount))
                .collect();
            mismatches.extend(match_including("token_transfers", &observed, &expected));
        }
        for movement in &self.nft_transfers {
            let token = registry.token_id(&movement.token)?;
            let from = registry.account_id(&movement.from)?;
            let to = registry.account_id(&movement.to)?;
            let present = record.nft_transfers().any(|(t, nft)| {
                t == token && nft.sender == from && nft.receiver == to && nft.serial_number == movement.serial
            });
            if !present {
                mismatches.push(Mismatch::new(
                    format!("nft_transfers[{}#{}]", token, movement.serial),
                    format!("{} -> {}", from, to),
                    "absent",
                ));
            }
        }
        for (token, account) in &self.new_associations {
            let token = registry.token_id(token)?;
            let account = registry.account_id(account)?;
            let present = record
                .automatic_token_associations
                .iter()
                .any(|a| a.token == token && a.account == account);
            if !present {
                mismatches.push(Mismatch::new(
                    "automatic_token_associations",
                    format!("{} with {}", account, token),
                    "absent",
                ));
            }
        }
        if let Some(supply) = self.new_total_supply {
            if record.receipt.new_total_supply != Some(supply) {
                mismatches.push(Mismatch::new(
                    "receipt.new_total_supply",
                    supply,
                    OptionDisplay(record.receipt.new_total_supply),
                ));
            }
        }
        if let Some(serials) = &self.serial_numbers {
            if *serials != record.receipt.serial_numbers {
                mismatches.push(Mismatch::new(
                    "receipt.serial_numbers",
                    format!("{:?}", serials),
                    format!("{:?}", record.receipt.serial_numbers),
                ));
            }
        }
        if let Some(count) = self.child_count {
            if record.children.len() != count {
                mismatches.push(Mismatch::new("children.len", count, record.children.len()));
            }
        }
        if let Some(expectation) = &self.contract_result {
            let result = record
                .contract_call_result
                .as_ref()
                .or(record.contract_create_result.as_ref());
            match result {
                Some(result) => mismatches.extend(
                    expectation
                        .check(result, registry)?
                        .into_iter()
                        .map(|m| m.nested("contract_result")),
                ),
                None => mismatches.push(Mismatch::new("contract_result", "present", "absent")),
            }
        }
        Ok(mismatches)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TokenAccount(AccountId, TokenId);

impl Display for TokenAccount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.1, self.0)
    }
}

struct OptionDisplay<T>(Option<T>);

impl<T: Display> Display for OptionDisplay<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "none"),
        }
    }
}

struct TokenList<'a>(&'a [Token]);

impl Display for TokenList<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", token)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AccountRef, RegistryValue, TokenRef};
    use hts_common::abi::PrecompileResult;
    use hts_common::crypto::KeyMaterial;
    use hts_common::transaction::{AccountAmount, Timestamp, TokenTransferList, TokenType, TransactionId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn registry() -> Registry {
        let mut rng = StdRng::seed_from_u64(3);
        let mut registry = Registry::new();
        for (name, num) in [("sender", 1001), ("receiver", 1002)] {
            registry
                .put(
                    name,
                    RegistryValue::Account(AccountRef::new(
                        AccountId::from_num(num),
                        KeyMaterial::generate(&mut rng),
                    )),
                )
                .unwrap();
        }
        registry
            .put(
                "token",
                RegistryValue::Token(TokenRef {
                    id: TokenId::from_num(1003),
                    token_type: TokenType::FungibleCommon,
                    treasury: AccountId::from_num(1001),
                    admin_key: None,
                    supply_key: None,
                    kyc_key: None,
                }),
            )
            .unwrap();
        registry
    }

    fn record(status: ResponseCode) -> TransactionRecord {
        let id = TransactionId::new(AccountId::from_num(2), Timestamp::from_nanos(1));
        TransactionRecord::new(id.child(1), status, Timestamp::from_nanos(2))
    }

    #[test]
    fn test_transfers_use_including_semantics() {
        let registry = registry();
        let mut child = record(ResponseCode::Success);
        child.hbar_transfers = vec![
            AccountAmount::new(AccountId::from_num(1001), -50),
            AccountAmount::new(AccountId::from_num(1002), 50),
            AccountAmount::new(AccountId::from_num(98), 1),
        ];
        child.token_transfer_lists = vec![TokenTransferList::fungible(
            TokenId::from_num(1003),
            vec![
                AccountAmount::new(AccountId::from_num(1001), -2),
                AccountAmount::new(AccountId::from_num(1002), 2),
            ],
        )];

        let expectation = RecordExpectation::new()
            .status(ResponseCode::Success)
            .hbar_transfer("sender", "receiver", 50)
            .token_transfer("token", "sender", "receiver", 2);
        assert!(expectation.check(&child, &registry).unwrap().is_empty());

        let wrong = RecordExpectation::new().hbar_transfer("sender", "receiver", 40);
        assert_eq!(wrong.check(&child, &registry).unwrap().len(), 2);
    }

    #[test]
    fn test_precompile_status_decoded_from_child_result() {
        let registry = registry();
        let mut child = record(ResponseCode::InvalidFullPrefixSignatureForPrecompile);
        child.contract_call_result = Some(ContractFunctionResult {
            result: PrecompileResult::new(
                FunctionType::HapiTransfer,
                ResponseCode::InvalidFullPrefixSignatureForPrecompile,
            )
            .encode()
            .unwrap(),
            ..Default::default()
        });

        let expectation = RecordExpectation::new()
            .status(ResponseCode::InvalidFullPrefixSignatureForPrecompile)
            .precompile(PrecompileExpectation::status(
                ResponseCode::InvalidFullPrefixSignatureForPrecompile,
            ));
        assert!(expectation.check(&child, &registry).unwrap().is_empty());

        let wrong = RecordExpectation::new().precompile(PrecompileExpectation::status(ResponseCode::Success));
        let mismatches = wrong.check(&child, &registry).unwrap();
        assert_eq!(mismatches[0].field, "contract_result.precompile.status");
    }

    #[test]
    fn test_mint_result_fields() {
        let registry = registry();
        let mut child = record(ResponseCode::Success);
        child.receipt.new_total_supply = Some(12);
        child.receipt.serial_numbers = vec![1, 2];
        child.contract_call_result = Some(ContractFunctionResult {
            result: PrecompileResult::new(FunctionType::HapiMint, ResponseCode::Success)
                .with_total_supply(12)
                .with_serial_numbers(vec![1, 2])
                .encode()
                .unwrap(),
            ..Default::default()
        });
        let expectation = RecordExpectation::new()
            .new_total_supply(12)
            .serial_numbers(vec![1, 2])
            .precompile(
                PrecompileExpectation::for_function(FunctionType::HapiMint, ResponseCode::Success)
                    .with_total_supply(12)
                    .with_serial_numbers(vec![1, 2]),
            );
        assert!(expectation.check(&child, &registry).unwrap().is_empty());
    }

    #[test]
    fn test_missing_contract_result_reported() {
        let registry = registry();
        let expectation = RecordExpectation::new().contract_result(ContractResultExpectation::new().gas_used(1));
        let mismatches = expectation.check(&record(ResponseCode::Success), &registry).unwrap();
        assert_eq!(mismatches[0].field, "contract_result");
    }
}

//! YAML scenario execution engine
//!
//! A parsed scenario becomes an ordinary [`Spec`]: each step maps onto one
//! operation of the catalogue, so scenarios run through the same executor,
//! matchers and runner as specs written in Rust.
//!
//! # Example
//!
//! ```rust,ignore
//! use hts_testing_framework::scenarios::{parse_scenario, ScenarioExecutor};
//!
//! let yaml = r#"
//! name: "hbar transfer"
//! given:
//!   - action: crypto_create
//!     name: alice
//!     balance: "1000000000"
//! when:
//!   - action: crypto_transfer
//!     transfers:
//!       - { from: alice, to: genesis, amount: "100" }
//! then:
//!   - action: assert_balance
//!     account: alice
//!     tinybars: "999999900"
//! "#;
//!
//! let scenario = parse_scenario(yaml)?;
//! let report = ScenarioExecutor::new(&harness).run(vec![scenario]).await?;
//! assert!(report.is_success());
//! ```

use super::parser::{
    AccountAmountSpec, ArgSpec, ChildSpec, KeyShapeSpec, MatchModeSpec, Step, TestScenario, TokenKind, TxnStep,
};
use crate::assertions::{
    AccountInfoExpectation, BalanceExpectation, KeyExpectation, MatchMode, RecordExpectation, TokenInfoExpectation,
    TokenRelationshipExpectation,
};
use crate::executor::Harness;
use crate::ops::contract::{
    account_amount, address, addresses, boolean, contract_call, contract_create, int, ints, token_transfer_list,
    transfer_list, uint, Arg, ContractCreateOptions,
};
use crate::ops::crypto::{
    crypto_approve_allowance, crypto_create, crypto_transfer, crypto_update_key, new_contract_key, new_delegate_key,
    new_key_named, Allowance, CryptoCreateOptions, Movement,
};
use crate::ops::queries::{
    get_account_balance, get_account_info, get_aliased_account_balance, get_aliased_account_info, get_token_info,
    get_txn_record,
};
use crate::ops::token::{
    burn_token, grant_token_kyc, mint_token, revoke_token_kyc, token_associate, token_create, token_dissociate,
    TokenCreateOptions,
};
use crate::ops::util::{child_records_check, overriding_all, reset_to_default};
use crate::ops::{Operation, TxnOptions};
use crate::runner::{Suite, SuiteReport, SuiteRunner};
use crate::spec::Spec;
use anyhow::{bail, Context, Result};
use hts_common::transaction::TokenType;
use std::path::Path;

/// Suite name used for scenario runs
pub const SCENARIO_SUITE: &str = "scenarios";

/// Read and parse a scenario file
pub async fn load_scenario_file(path: impl AsRef<Path>) -> Result<TestScenario> {
    let path = path.as_ref();
    let yaml = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    super::parse_scenario(&yaml).with_context(|| format!("Invalid scenario {}", path.display()))
}

/// Runs scenarios as specs of one suite
pub struct ScenarioExecutor<'h> {
    harness: &'h Harness,
}

impl<'h> ScenarioExecutor<'h> {
    pub fn new(harness: &'h Harness) -> Self {
        Self { harness }
    }

    /// Convert every scenario, then run them together
    ///
    /// # Errors
    ///
    /// Returns an error if a scenario cannot be turned into a spec. Failing
    /// specs are reported in the [`SuiteReport`], not as errors.
    pub async fn run(&self, scenarios: Vec<TestScenario>) -> Result<SuiteReport> {
        let specs = scenarios
            .into_iter()
            .map(scenario_to_spec)
            .collect::<Result<Vec<_>>>()?;
        Ok(SuiteRunner::new(self.harness)
            .run(Suite::new(SCENARIO_SUITE, specs))
            .await)
    }
}

pub fn scenario_to_spec(scenario: TestScenario) -> Result<Spec> {
    let phase = |steps: &[Step]| -> Result<Vec<Operation>> { steps.iter().map(step_to_operation).collect() };
    let mut spec = Spec::new(scenario.name.clone())
        .given(phase(&scenario.given).context("given")?)
        .when(phase(&scenario.when).context("when")?)
        .then(phase(&scenario.then).context("then")?);
    if scenario.expect_failure {
        spec = spec.expecting_failure();
    }
    if !scenario.preserving.is_empty() {
        spec = spec.preserving(&refs(&scenario.preserving));
    }
    Ok(spec)
}

fn refs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}

fn txn_options(step: &TxnStep) -> TxnOptions {
    let mut options = TxnOptions::new().also_signing_with(&refs(&step.also_signing_with));
    if let Some(payer) = &step.payer {
        options = options.payer(payer);
    }
    if let Some(signers) = &step.signers {
        options = options.signed_by(&refs(signers));
    }
    if let Some(memo) = &step.memo {
        options = options.memo(memo.clone());
    }
    if let Some(precheck) = step.precheck {
        options = options.precheck(precheck);
    }
    if let Some(status) = step.status {
        options = options.status(status);
    }
    if let Some(via) = &step.via {
        options = options.via(via);
    }
    if step.logged {
        options = options.logged();
    }
    options
}

fn amounts(entries: &[AccountAmountSpec]) -> Vec<Arg> {
    entries
        .iter()
        .map(|e| account_amount(&e.account, e.amount, e.approval))
        .collect()
}

fn to_arg(arg: &ArgSpec) -> Arg {
    match arg {
        ArgSpec::Address(name) => address(name),
        ArgSpec::Int(value) => int(*value),
        ArgSpec::Uint(value) => uint(*value),
        ArgSpec::Bool(value) => boolean(*value),
        ArgSpec::Addresses(names) => addresses(&refs(names)),
        ArgSpec::Ints(values) => ints(values),
        ArgSpec::TransferList(entries) => transfer_list(amounts(entries)),
        ArgSpec::TokenTransferLists(lists) => Arg::Array(
            lists
                .iter()
                .map(|list| token_transfer_list(&list.token, amounts(&list.transfers), Vec::new()))
                .collect(),
        ),
    }
}

fn child_expectation(child: &ChildSpec) -> RecordExpectation {
    let mut expectation = RecordExpectation::new();
    if let Some(status) = child.status {
        expectation = expectation.status(status);
    }
    if let Some(alias) = &child.alias {
        expectation = expectation.alias(alias);
    }
    if let Some(memo) = &child.memo {
        expectation = expectation.memo(memo.clone());
    }
    expectation
}

fn step_to_operation(step: &Step) -> Result<Operation> {
    let op = match step {
        Step::NewKey { name, shape, contract } => match (shape, contract) {
            (KeyShapeSpec::Secp256k1, _) => new_key_named(name).into(),
            (KeyShapeSpec::Delegate, Some(contract)) => new_delegate_key(name, contract).into(),
            (KeyShapeSpec::Contract, Some(contract)) => new_contract_key(name, contract).into(),
            (_, None) => bail!("key '{}' of shape {:?} needs a contract", name, shape),
        },
        Step::CryptoCreate {
            name,
            balance,
            key,
            alias_key,
            receiver_sig_required,
            max_automatic_token_associations,
            memo,
        } => crypto_create(
            name,
            CryptoCreateOptions {
                balance: *balance,
                key: key.clone(),
                receiver_sig_required: *receiver_sig_required,
                max_automatic_token_associations: *max_automatic_token_associations,
                memo: memo.clone(),
                alias_key: alias_key.clone(),
            },
        )
        .into(),
        Step::TokenCreate {
            name,
            treasury,
            kind,
            initial_supply,
            admin_key,
            supply_key,
            kyc_key,
        } => {
            let mut options = TokenCreateOptions::fungible(*initial_supply, treasury);
            if *kind == TokenKind::NonFungible {
                options.token_type = TokenType::NonFungibleUnique;
            }
            options.admin_key = admin_key.clone();
            options.supply_key = supply_key.clone();
            options.kyc_key = kyc_key.clone();
            token_create(name, options).into()
        }
        Step::ContractCreate {
            name,
            program,
            admin_key,
            max_automatic_token_associations,
            constructor_args,
        } => {
            let mut options = ContractCreateOptions::program(program)
                .max_automatic_token_associations(*max_automatic_token_associations)
                .constructor_args(constructor_args.iter().map(to_arg).collect());
            if let Some(admin_key) = admin_key {
                options = options.admin_key(admin_key);
            }
            contract_create(name, options).into()
        }
        Step::CryptoUpdateKey { account, key, options } => {
            crypto_update_key(account, key).with(txn_options(options)).into()
        }
        Step::CryptoTransfer { transfers, options } => crypto_transfer(
            transfers
                .iter()
                .map(|t| match &t.token {
                    Some(token) => Movement::token(token, &t.from, &t.to, t.amount),
                    None => Movement::hbar(&t.from, &t.to, t.amount),
                })
                .collect(),
        )
        .with(txn_options(options))
        .into(),
        Step::ApproveAllowance { allowances, options } => crypto_approve_allowance(
            allowances
                .iter()
                .map(|a| match &a.token {
                    Some(token) => Allowance::token(&a.owner, token, &a.spender, a.amount),
                    None => Allowance::hbar(&a.owner, &a.spender, a.amount),
                })
                .collect(),
        )
        .with(txn_options(options))
        .into(),
        Step::TokenAssociate {
            account,
            tokens,
            options,
        } => token_associate(account, &refs(tokens)).with(txn_options(options)).into(),
        Step::TokenDissociate {
            account,
            tokens,
            options,
        } => token_dissociate(account, &refs(tokens)).with(txn_options(options)).into(),
        Step::MintToken { token, amount, options } => mint_token(token, *amount).with(txn_options(options)).into(),
        Step::BurnToken { token, amount, options } => burn_token(token, *amount).with(txn_options(options)).into(),
        Step::GrantKyc {
            token,
            account,
            options,
        } => grant_token_kyc(token, account).with(txn_options(options)).into(),
        Step::RevokeKyc {
            token,
            account,
            options,
        } => revoke_token_kyc(token, account).with(txn_options(options)).into(),
        Step::ContractCall {
            contract,
            function,
            args,
            gas,
            options,
        } => {
            let mut call = contract_call(contract, function, args.iter().map(to_arg).collect()).with(txn_options(options));
            if let Some(gas) = gas {
                call = call.gas(*gas);
            }
            call.into()
        }
        Step::Override { properties } => {
            let pairs: Vec<(&str, &str)> = properties.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            overriding_all(&pairs).into()
        }
        Step::ResetProperties { keys } => reset_to_default(&refs(keys)).into(),
        Step::AssertBalance {
            account,
            by_alias,
            tinybars,
            tokens,
        } => {
            let mut expectation = tinybars.map(BalanceExpectation::tiny_bars);
            for (token, amount) in tokens {
                expectation = Some(match expectation {
                    Some(e) => e.and_token(token, *amount),
                    None => BalanceExpectation::token(token, *amount),
                });
            }
            let expectation =
                expectation.with_context(|| format!("assert_balance on '{}' expects nothing", account))?;
            let query = if *by_alias {
                get_aliased_account_balance(account)
            } else {
                get_account_balance(account)
            };
            query.has_balance(expectation).into()
        }
        Step::AssertAccountInfo {
            account,
            by_alias,
            memo,
            receiver_sig_required,
            empty_key,
            kyc,
        } => {
            let mut expectation = AccountInfoExpectation::new();
            if let Some(memo) = memo {
                expectation = expectation.memo(memo.clone());
            }
            if let Some(required) = receiver_sig_required {
                expectation = expectation.receiver_sig_required(*required);
            }
            if *empty_key {
                expectation = expectation.key(KeyExpectation::Empty);
            }
            for (token, status) in kyc {
                expectation = expectation.relationship(TokenRelationshipExpectation::new(token).kyc(*status));
            }
            let query = if *by_alias {
                get_aliased_account_info(account)
            } else {
                get_account_info(account)
            };
            query.has_info(expectation).into()
        }
        Step::AssertTokenInfo {
            token,
            total_supply,
            treasury,
        } => {
            let mut expectation = TokenInfoExpectation::new();
            if let Some(supply) = total_supply {
                expectation = expectation.total_supply(*supply);
            }
            if let Some(treasury) = treasury {
                expectation = expectation.treasury(treasury);
            }
            get_token_info(token).has_token_info(expectation).into()
        }
        Step::AssertRecord {
            txn,
            status,
            child_count,
        } => {
            let mut expectation = RecordExpectation::new();
            if let Some(status) = status {
                expectation = expectation.status(*status);
            }
            if let Some(count) = child_count {
                expectation = expectation.child_count(*count);
            }
            get_txn_record(txn).has_record(expectation).into()
        }
        Step::AssertChildRecords {
            txn,
            parent_status,
            mode,
            children,
        } => {
            let mode = match mode {
                MatchModeSpec::OrderedExact => MatchMode::OrderedExact,
                MatchModeSpec::Containing => MatchMode::Containing,
            };
            child_records_check(txn, *parent_status, mode, children.iter().map(child_expectation).collect()).into()
        }
    };
    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::parse_scenario;

    #[test]
    fn test_scenario_becomes_spec() {
        let yaml = r#"
name: "kyc grant"
preserving: ["lazyCreation.enabled"]
given:
  - action: new_key
    name: kycKey
  - action: crypto_create
    name: treasury
    balance: "10000000000"
  - action: token_create
    name: token
    treasury: treasury
    initial_supply: 100
    kyc_key: kycKey
when:
  - action: grant_kyc
    token: token
    account: treasury
then:
  - action: assert_token_info
    token: token
    total_supply: "100"
"#;
        let spec = scenario_to_spec(parse_scenario(yaml).unwrap()).unwrap();
        assert_eq!(spec.name, "kyc grant");
        assert_eq!((spec.given.len(), spec.when.len(), spec.then.len()), (3, 1, 1));
        assert!(spec.sequential);
        assert!(!spec.expect_failure);
    }

    #[test]
    fn test_delegate_key_needs_contract() {
        let yaml = r#"
name: "bad key"
given:
  - action: new_key
    name: delegate
    shape: delegate
"#;
        assert!(scenario_to_spec(parse_scenario(yaml).unwrap()).is_err());
    }

    #[test]
    fn test_balance_assertion_needs_an_expectation() {
        let yaml = r#"
name: "empty balance check"
then:
  - action: assert_balance
    account: genesis
"#;
        assert!(scenario_to_spec(parse_scenario(yaml).unwrap()).is_err());
    }
}

//! YAML scenario parser with validation
//!
//! Numbers may be written as YAML numbers or as strings (`"100000000"`),
//! so large tinybar amounts survive tools that mangle big integers. Amounts
//! containing `_` or `~` are rejected.

use anyhow::{bail, Context, Result};
use hts_common::query::KycStatus;
use hts_common::ResponseCode;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashSet};

/// Parse and validate a scenario document
pub fn parse_scenario(yaml: &str) -> Result<TestScenario> {
    let scenario: TestScenario = serde_yaml::from_str(yaml).context("Failed to parse scenario YAML")?;
    scenario.validate()?;
    Ok(scenario)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expect_failure: bool,
    /// Network properties restored after the scenario
    #[serde(default)]
    pub preserving: Vec<String>,
    #[serde(default)]
    pub given: Vec<Step>,
    #[serde(default)]
    pub when: Vec<Step>,
    #[serde(default)]
    pub then: Vec<Step>,
}

impl TestScenario {
    pub fn step_count(&self) -> usize {
        self.given.len() + self.when.len() + self.then.len()
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.given.iter().chain(&self.when).chain(&self.then)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Scenario name must not be empty");
        }
        if self.step_count() == 0 {
            bail!("Scenario '{}' has no steps", self.name);
        }

        let mut created = HashSet::new();
        for step in self.steps() {
            for name in step.binds() {
                if !created.insert(name) {
                    bail!("Duplicate name '{}' in scenario '{}'", name, self.name);
                }
            }
        }
        Ok(())
    }
}

/// Options shared by every transaction step
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TxnStep {
    #[serde(default)]
    pub payer: Option<String>,
    #[serde(default)]
    pub signers: Option<Vec<String>>,
    #[serde(default)]
    pub also_signing_with: Vec<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub precheck: Option<ResponseCode>,
    #[serde(default)]
    pub status: Option<ResponseCode>,
    /// Bind the record under this name
    #[serde(default)]
    pub via: Option<String>,
    #[serde(default)]
    pub logged: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyShapeSpec {
    #[default]
    Secp256k1,
    Delegate,
    Contract,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    #[default]
    Fungible,
    NonFungible,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchModeSpec {
    #[default]
    OrderedExact,
    Containing,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MovementSpec {
    pub from: String,
    pub to: String,
    #[serde(deserialize_with = "deserialize_u64")]
    pub amount: u64,
    /// Fungible token; hbar when absent
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AllowanceSpec {
    pub owner: String,
    pub spender: String,
    #[serde(deserialize_with = "deserialize_u64")]
    pub amount: u64,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountAmountSpec {
    pub account: String,
    #[serde(deserialize_with = "deserialize_i64")]
    pub amount: i64,
    #[serde(default)]
    pub approval: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenTransferListSpec {
    pub token: String,
    #[serde(default)]
    pub transfers: Vec<AccountAmountSpec>,
}

/// Contract call argument, written as a one-key map (`- address: token`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgSpec {
    Address(String),
    #[serde(deserialize_with = "deserialize_i64")]
    Int(i64),
    #[serde(deserialize_with = "deserialize_u64")]
    Uint(u64),
    Bool(bool),
    Addresses(Vec<String>),
    Ints(Vec<i64>),
    TransferList(Vec<AccountAmountSpec>),
    TokenTransferLists(Vec<TokenTransferListSpec>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChildSpec {
    #[serde(default)]
    pub status: Option<ResponseCode>,
    /// Key name whose EVM alias the child created
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    NewKey {
        name: String,
        #[serde(default)]
        shape: KeyShapeSpec,
        /// Contract for delegate and contract shapes
        #[serde(default)]
        contract: Option<String>,
    },
    CryptoCreate {
        name: String,
        #[serde(default, deserialize_with = "deserialize_u64")]
        balance: u64,
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        alias_key: Option<String>,
        #[serde(default)]
        receiver_sig_required: bool,
        #[serde(default)]
        max_automatic_token_associations: i32,
        #[serde(default)]
        memo: String,
    },
    TokenCreate {
        name: String,
        treasury: String,
        #[serde(default, rename = "type")]
        kind: TokenKind,
        #[serde(default, deserialize_with = "deserialize_u64")]
        initial_supply: u64,
        #[serde(default)]
        admin_key: Option<String>,
        #[serde(default)]
        supply_key: Option<String>,
        #[serde(default)]
        kyc_key: Option<String>,
    },
    ContractCreate {
        name: String,
        program: String,
        #[serde(default)]
        admin_key: Option<String>,
        #[serde(default)]
        max_automatic_token_associations: i32,
        #[serde(default)]
        constructor_args: Vec<ArgSpec>,
    },
    CryptoUpdateKey {
        account: String,
        key: String,
        #[serde(flatten)]
        options: TxnStep,
    },
    CryptoTransfer {
        transfers: Vec<MovementSpec>,
        #[serde(flatten)]
        options: TxnStep,
    },
    ApproveAllowance {
        allowances: Vec<AllowanceSpec>,
        #[serde(flatten)]
        options: TxnStep,
    },
    TokenAssociate {
        account: String,
        tokens: Vec<String>,
        #[serde(flatten)]
        options: TxnStep,
    },
    TokenDissociate {
        account: String,
        tokens: Vec<String>,
        #[serde(flatten)]
        options: TxnStep,
    },
    MintToken {
        token: String,
        #[serde(deserialize_with = "deserialize_u64")]
        amount: u64,
        #[serde(flatten)]
        options: TxnStep,
    },
    BurnToken {
        token: String,
        #[serde(deserialize_with = "deserialize_u64")]
        amount: u64,
        #[serde(flatten)]
        options: TxnStep,
    },
    GrantKyc {
        token: String,
        account: String,
        #[serde(flatten)]
        options: TxnStep,
    },
    RevokeKyc {
        token: String,
        account: String,
        #[serde(flatten)]
        options: TxnStep,
    },
    ContractCall {
        contract: String,
        function: String,
        #[serde(default)]
        args: Vec<ArgSpec>,
        #[serde(default)]
        gas: Option<u64>,
        #[serde(flatten)]
        options: TxnStep,
    },
    Override {
        properties: BTreeMap<String, String>,
    },
    ResetProperties {
        keys: Vec<String>,
    },
    AssertBalance {
        account: String,
        /// Look the account up by the EVM alias of this key name
        #[serde(default)]
        by_alias: bool,
        #[serde(default, deserialize_with = "deserialize_opt_u64")]
        tinybars: Option<u64>,
        #[serde(default)]
        tokens: BTreeMap<String, u64>,
    },
    AssertAccountInfo {
        account: String,
        #[serde(default)]
        by_alias: bool,
        #[serde(default)]
        memo: Option<String>,
        #[serde(default)]
        receiver_sig_required: Option<bool>,
        #[serde(default)]
        empty_key: bool,
        #[serde(default)]
        kyc: BTreeMap<String, KycStatus>,
    },
    AssertTokenInfo {
        token: String,
        #[serde(default, deserialize_with = "deserialize_opt_u64")]
        total_supply: Option<u64>,
        #[serde(default)]
        treasury: Option<String>,
    },
    AssertRecord {
        txn: String,
        #[serde(default)]
        status: Option<ResponseCode>,
        #[serde(default)]
        child_count: Option<usize>,
    },
    AssertChildRecords {
        txn: String,
        parent_status: ResponseCode,
        #[serde(default)]
        mode: MatchModeSpec,
        #[serde(default)]
        children: Vec<ChildSpec>,
    },
}

impl Step {
    /// Registry names the step creates
    pub fn binds(&self) -> Vec<&str> {
        let created = match self {
            Step::NewKey { name, .. }
            | Step::CryptoCreate { name, .. }
            | Step::TokenCreate { name, .. }
            | Step::ContractCreate { name, .. } => Some(name.as_str()),
            _ => None,
        };
        let via = match self {
            Step::CryptoUpdateKey { options, .. }
            | Step::CryptoTransfer { options, .. }
            | Step::ApproveAllowance { options, .. }
            | Step::TokenAssociate { options, .. }
            | Step::TokenDissociate { options, .. }
            | Step::MintToken { options, .. }
            | Step::BurnToken { options, .. }
            | Step::GrantKyc { options, .. }
            | Step::RevokeKyc { options, .. }
            | Step::ContractCall { options, .. } => options.via.as_deref(),
            _ => None,
        };
        created.into_iter().chain(via).collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Unsigned(u64),
    Signed(i64),
    Text(String),
}

fn parse_number<T: std::str::FromStr>(text: &str) -> std::result::Result<T, String> {
    if text.contains('_') || text.contains('~') {
        return Err(format!("'{}': write amounts without '_' or '~'", text));
    }
    text.trim()
        .parse()
        .map_err(|_| format!("'{}' is not a valid amount", text))
}

fn deserialize_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Unsigned(value) => Ok(value),
        NumberOrString::Signed(value) => {
            Err(serde::de::Error::custom(format!("amount {} must not be negative", value)))
        }
        NumberOrString::Text(text) => parse_number(&text).map_err(serde::de::Error::custom),
    }
}

fn deserialize_i64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Unsigned(value) => i64::try_from(value).map_err(serde::de::Error::custom),
        NumberOrString::Signed(value) => Ok(value),
        NumberOrString::Text(text) => parse_number(&text).map_err(serde::de::Error::custom),
    }
}

fn deserialize_opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u64>, D::Error> {
    deserialize_u64(deserializer).map(Some)
}

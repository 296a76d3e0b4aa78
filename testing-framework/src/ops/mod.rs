//! Operations, the unit of work inside a spec phase.
//!
//! Every operation is plain data: registry names instead of ids, and option
//! structs instead of mutation. Names are resolved by the executor right
//! before dispatch, so an operation may refer to entities created earlier in
//! the same spec. Values that only exist at run time are reached through
//! [`Operation::Deferred`], whose builder sees the registry as it is when the
//! operation is reached.

pub mod contract;
pub mod crypto;
pub mod queries;
pub mod token;
pub mod util;

use crate::assertions::{MatchMode, RecordExpectation};
use crate::error::HarnessResult;
use crate::registry::Registry;
use hts_common::query::QueryResponse;
use hts_common::record::TransactionRecord;
use hts_common::ResponseCode;
use std::collections::BTreeMap;
use std::fmt;

pub use contract::{Arg, ContractCallOp, ContractCallOptions, ContractCreateOptions};
pub use crypto::{Allowance, CryptoCreateOptions, KeyShape, Movement};
pub use queries::{AccountSelector, QueryExpectation, QueryOp, QueryOptions, QueryTarget};
pub use token::TokenCreateOptions;

/// Captures values from a finalized record into the registry
pub type RecordExposure = Box<dyn FnOnce(&TransactionRecord, &mut Registry) -> HarnessResult<()> + Send>;

/// Captures values from a query answer into the registry
pub type QueryExposure = Box<dyn FnOnce(&QueryResponse, &mut Registry) -> HarnessResult<()> + Send>;

/// Builds an operation from the registry at dispatch time
pub type OperationBuilder = Box<dyn FnOnce(&Registry) -> HarnessResult<Operation> + Send>;

/// Free-form check against the registry
pub type CustomCheck = Box<dyn FnOnce(&Registry) -> HarnessResult<()> + Send>;

pub enum Operation {
    Create(CreateOp),
    Transact(TxnOp),
    ContractCall(ContractCallOp),
    Query(QueryOp),
    Assertion(AssertionOp),
    /// Runs its children in order, stopping at the first failure
    Composite(Vec<Operation>),
    Deferred {
        label: String,
        build: OperationBuilder,
    },
}

impl Operation {
    /// One-line description used in logs and failure reports
    pub fn describe(&self) -> String {
        match self {
            Operation::Create(op) => op.describe(),
            Operation::Transact(op) => op.describe(),
            Operation::ContractCall(op) => op.describe(),
            Operation::Query(op) => op.describe(),
            Operation::Assertion(op) => op.describe(),
            Operation::Composite(ops) => format!("composite of {} operations", ops.len()),
            Operation::Deferred { label, .. } => format!("deferred '{}'", label),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Collect operations of mixed kinds into a phase list
#[macro_export]
macro_rules! ops {
    ($($op:expr),* $(,)?) => {
        vec![$($crate::ops::Operation::from($op)),*]
    };
}

macro_rules! into_operation {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Operation {
            fn from(op: $ty) -> Self {
                Operation::$variant(op)
            }
        }
    };
}

into_operation!(CreateOp, Create);
into_operation!(TxnOp, Transact);
into_operation!(ContractCallOp, ContractCall);
into_operation!(QueryOp, Query);
into_operation!(AssertionOp, Assertion);

impl From<Vec<Operation>> for Operation {
    fn from(ops: Vec<Operation>) -> Self {
        Operation::Composite(ops)
    }
}

/// Options shared by every submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnOptions {
    /// Paying account; the harness default payer when unset
    pub payer: Option<String>,
    /// Replaces the default signers entirely, payer included
    pub signers: Option<Vec<String>>,
    /// Added on top of the default or explicit signers
    pub extra_signers: Vec<String>,
    pub fee: Option<u64>,
    pub memo: Option<String>,
    pub expected_precheck: ResponseCode,
    pub expected_status: ResponseCode,
    /// Bind the finalized record under this name
    pub via: Option<String>,
    /// Dump the record at info level
    pub logged: bool,
}

impl Default for TxnOptions {
    fn default() -> Self {
        Self {
            payer: None,
            signers: None,
            extra_signers: Vec::new(),
            fee: None,
            memo: None,
            expected_precheck: ResponseCode::Ok,
            expected_status: ResponseCode::Success,
            via: None,
            logged: false,
        }
    }
}

impl TxnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paid_by(payer: &str) -> Self {
        Self::new().payer(payer)
    }

    pub fn payer(mut self, payer: &str) -> Self {
        self.payer = Some(payer.to_string());
        self
    }

    pub fn signed_by(mut self, signers: &[&str]) -> Self {
        self.signers = Some(signers.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn also_signing_with(mut self, signers: &[&str]) -> Self {
        self.extra_signers.extend(signers.iter().map(|s| s.to_string()));
        self
    }

    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn precheck(mut self, code: ResponseCode) -> Self {
        self.expected_precheck = code;
        self
    }

    pub fn status(mut self, code: ResponseCode) -> Self {
        self.expected_status = code;
        self
    }

    pub fn via(mut self, name: &str) -> Self {
        self.via = Some(name.to_string());
        self
    }

    pub fn logged(mut self) -> Self {
        self.logged = true;
        self
    }
}

/// Entity creation; the created entity is bound under `name`
pub struct CreateOp {
    pub name: String,
    pub entity: NewEntity,
    pub options: TxnOptions,
    pub exposures: Vec<RecordExposure>,
}

pub enum NewEntity {
    /// Local only, nothing is submitted
    Key(KeyShape),
    Account(CryptoCreateOptions),
    Token(TokenCreateOptions),
    Contract(ContractCreateOptions),
}

impl CreateOp {
    pub(crate) fn new(name: &str, entity: NewEntity) -> Self {
        Self {
            name: name.to_string(),
            entity,
            options: TxnOptions::default(),
            exposures: Vec::new(),
        }
    }

    pub fn with(mut self, options: TxnOptions) -> Self {
        self.options = options;
        self
    }

    pub fn exposing<F>(mut self, exposure: F) -> Self
    where
        F: FnOnce(&TransactionRecord, &mut Registry) -> HarnessResult<()> + Send + 'static,
    {
        self.exposures.push(Box::new(exposure));
        self
    }

    fn describe(&self) -> String {
        let kind = match &self.entity {
            NewEntity::Key(_) => "key",
            NewEntity::Account(_) => "account",
            NewEntity::Token(_) => "token",
            NewEntity::Contract(_) => "contract",
        };
        format!("create {} '{}'", kind, self.name)
    }
}

/// Any other submitted transaction
pub struct TxnOp {
    pub action: TxnAction,
    pub options: TxnOptions,
    pub exposures: Vec<RecordExposure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnAction {
    CryptoUpdate {
        account: String,
        key: Option<String>,
        receiver_sig_required: Option<bool>,
        max_automatic_token_associations: Option<i32>,
        memo: Option<String>,
    },
    CryptoTransfer(Vec<Movement>),
    ApproveAllowance(Vec<Allowance>),
    TokenAssociate {
        account: String,
        tokens: Vec<String>,
    },
    TokenDissociate {
        account: String,
        tokens: Vec<String>,
    },
    MintToken {
        token: String,
        amount: u64,
        metadata: Vec<Vec<u8>>,
    },
    BurnToken {
        token: String,
        amount: u64,
        serial_numbers: Vec<i64>,
    },
    GrantKyc {
        token: String,
        account: String,
    },
    RevokeKyc {
        token: String,
        account: String,
    },
    NetworkProperties {
        set: BTreeMap<String, String>,
        reset: Vec<String>,
    },
}

impl TxnAction {
    pub fn name(&self) -> &'static str {
        match self {
            TxnAction::CryptoUpdate { .. } => "cryptoUpdate",
            TxnAction::CryptoTransfer(_) => "cryptoTransfer",
            TxnAction::ApproveAllowance(_) => "cryptoApproveAllowance",
            TxnAction::TokenAssociate { .. } => "tokenAssociate",
            TxnAction::TokenDissociate { .. } => "tokenDissociate",
            TxnAction::MintToken { .. } => "mintToken",
            TxnAction::BurnToken { .. } => "burnToken",
            TxnAction::GrantKyc { .. } => "grantTokenKyc",
            TxnAction::RevokeKyc { .. } => "revokeTokenKyc",
            TxnAction::NetworkProperties { .. } => "networkProperties",
        }
    }
}

impl TxnOp {
    pub(crate) fn new(action: TxnAction) -> Self {
        Self {
            action,
            options: TxnOptions::default(),
            exposures: Vec::new(),
        }
    }

    pub fn with(mut self, options: TxnOptions) -> Self {
        self.options = options;
        self
    }

    pub fn exposing<F>(mut self, exposure: F) -> Self
    where
        F: FnOnce(&TransactionRecord, &mut Registry) -> HarnessResult<()> + Send + 'static,
    {
        self.exposures.push(Box::new(exposure));
        self
    }

    fn describe(&self) -> String {
        match &self.options.via {
            Some(via) => format!("{} via '{}'", self.action.name(), via),
            None => self.action.name().to_string(),
        }
    }
}

pub enum AssertionOp {
    /// Fetch the record of `txn` with its children and match them
    ChildRecords {
        txn: String,
        parent_status: ResponseCode,
        mode: MatchMode,
        expected: Vec<RecordExpectation>,
    },
    Custom {
        label: String,
        check: CustomCheck,
    },
}

impl AssertionOp {
    fn describe(&self) -> String {
        match self {
            AssertionOp::ChildRecords { txn, expected, mode, .. } => {
                format!("child records of '{}' ({} expected, {})", txn, expected.len(), mode)
            }
            AssertionOp::Custom { label, .. } => format!("check '{}'", label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::crypto::{crypto_create, new_key_named};
    use crate::ops::util::{composite, sourcing};

    #[test]
    fn test_default_options_expect_success() {
        let options = TxnOptions::default();
        assert_eq!(options.expected_precheck, ResponseCode::Ok);
        assert_eq!(options.expected_status, ResponseCode::Success);
        assert!(options.signers.is_none());
    }

    #[test]
    fn test_options_builder() {
        let options = TxnOptions::paid_by("owner")
            .signed_by(&["owner", "payer"])
            .also_signing_with(&["multi"])
            .status(ResponseCode::ContractRevertExecuted)
            .via("txn");
        assert_eq!(options.payer.as_deref(), Some("owner"));
        assert_eq!(options.signers.as_ref().map(Vec::len), Some(2));
        assert_eq!(options.extra_signers, vec!["multi".to_string()]);
        assert_eq!(options.via.as_deref(), Some("txn"));
    }

    #[test]
    fn test_ops_macro_and_describe() {
        let phase = ops![
            new_key_named("k"),
            crypto_create("alice", CryptoCreateOptions::default()),
            composite(vec![]),
            sourcing("later", |_| Ok(crypto_create("bob", CryptoCreateOptions::default()).into())),
        ];
        let described: Vec<String> = phase.iter().map(Operation::describe).collect();
        assert_eq!(
            described,
            vec![
                "create key 'k'",
                "create account 'alice'",
                "composite of 0 operations",
                "deferred 'later'",
            ]
        );
    }
}

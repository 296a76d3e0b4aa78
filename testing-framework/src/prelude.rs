//! Convenient re-exports for writing specs.
//!
//! ```rust,ignore
//! use hts_testing_framework::prelude::*;
//! ```

pub use crate::assertions::{
    topic_address, topic_event, topic_u64, AccountInfoExpectation, BalanceExpectation, ContractInfoExpectation,
    ContractResultExpectation, KeyExpectation, LogExpectation, MatchMode, PrecompileExpectation, RecordExpectation,
    TokenInfoExpectation, TokenRelationshipExpectation,
};
pub use crate::config::HarnessConfig;
pub use crate::contracts::{
    ASSOCIATE_DISSOCIATE, ATOMIC_CRYPTO_TRANSFER, GRANT_REVOKE_KYC, HTS_APPROVE_ALLOWANCE, MINT_CONTRACT,
    PRECOMPILE_ALIAS_XFER,
};
pub use crate::error::{FailureKind, HarnessError, HarnessResult};
pub use crate::executor::Harness;
pub use crate::ledger::state::{ALLOW_AUTO_ASSOCIATIONS, LAZY_CREATION_ENABLED, MAX_PRECEDING_RECORDS};
pub use crate::ledger::{in_process_harness, TestLedger, TestLedgerBuilder};
pub use crate::ops;
pub use crate::ops::contract::{
    account_amount, address, address_literal, addresses, boolean, contract_call, contract_create, int, ints,
    nft_transfer, token_transfer_list, transfer_list, uint, uint256, Arg, ContractCreateOptions,
};
pub use crate::ops::crypto::{
    crypto_approve_allowance, crypto_create, crypto_transfer, crypto_update, crypto_update_key, new_contract_key,
    new_delegate_key, new_key_named, Allowance, CryptoCreateOptions, Movement,
};
pub use crate::ops::queries::{
    balance_snapshot, expose_evm_address, get_account_balance, get_account_info, get_aliased_account_balance,
    get_aliased_account_info, get_contract_info, get_network_properties, get_token_info, get_txn_record,
    get_txn_record_with_children,
};
pub use crate::ops::token::{
    burn_nfts, burn_token, grant_token_kyc, mint_nfts, mint_token, revoke_token_kyc, token_associate, token_create,
    token_dissociate, TokenCreateOptions,
};
pub use crate::ops::util::{
    assert_that, child_records_check, composite, empty_child_records_check, overriding, overriding_all,
    reset_to_default, sourcing, with_op_context,
};
pub use crate::ops::{ContractCallOp, Operation, TxnOptions};
pub use crate::orchestrator::{Clock, PausedClock, SystemClock, TestRng};
pub use crate::registry::{Registry, GENESIS};
pub use crate::runner::{Suite, SuiteReport, SuiteRunner};
pub use crate::spec::{Spec, SpecStatus};

pub use hts_common::abi::{FunctionType, Token};
pub use hts_common::query::KycStatus;
pub use hts_common::{ResponseCode, ONE_HBAR, ONE_HUNDRED_HBARS};

pub use std::sync::Arc;

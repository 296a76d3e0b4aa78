//! Ledger-facing data model shared by the precompile test harness.
//!
//! Everything the harness exchanges with a ledger lives here: entity ids and
//! their EVM mirror addresses, key material, response codes, transaction
//! bodies, receipts and records, and the schema-driven ABI codec used to talk
//! to contracts and to decode HTS precompile results.

#![allow(clippy::upper_case_acronyms)]

pub mod abi;
pub mod crypto;
pub mod entity;
pub mod error;
pub mod query;
pub mod record;
pub mod response_code;
pub mod transaction;

pub use entity::{AccountId, ContractId, EntityId, TokenId};
pub use error::{AbiError, EntityIdError, KeyError};
pub use response_code::ResponseCode;

/// Tinybars per hbar
pub const ONE_HBAR: u64 = 100_000_000;

/// Convenience for suites that fund accounts in hundreds of hbars
pub const ONE_HUNDRED_HBARS: u64 = 100 * ONE_HBAR;

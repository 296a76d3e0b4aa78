//! Assertion engine.
//!
//! Matchers compare observed ledger artifacts with expectations and return
//! the full list of differing fields instead of stopping at the first one.
//! Callers turn a non-empty list into an assertion failure.

pub mod account;
pub mod child_records;
pub mod logs;
pub mod record;
pub mod status;
pub mod transfers;

pub use account::{
    AccountInfoExpectation, BalanceExpectation, ContractInfoExpectation, KeyExpectation,
    TokenInfoExpectation, TokenRelationshipExpectation,
};
pub use child_records::{match_child_records, match_containing, match_ordered_exact, MatchMode};
pub use logs::{match_logs, topic_address, topic_event, topic_u64, LogExpectation};
pub use record::{ContractResultExpectation, PrecompileExpectation, RecordExpectation};
pub use status::match_status;

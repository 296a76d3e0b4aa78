//! # HTS Precompile Test Harness
//!
//! Given/when/then harness for ledger token-service precompile behaviour.
//!
//! ## Architecture Overview
//!
//! - **Registry**: per-spec name to entity bindings (keys, accounts, tokens,
//!   contracts, captured addresses and records)
//! - **Operations**: plain-data descriptions of what to create, submit or query
//! - **Executor**: resolves names, signs, submits and waits for finality
//! - **Assertions**: field-by-field matchers over records and query answers
//! - **Runner**: runs suites of specs concurrently and reports outcomes
//! - **Test ledger**: in-process [`LedgerClient`](client::LedgerClient) with a
//!   simulated token-service precompile, used to exercise everything above
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hts_testing_framework::prelude::*;
//!
//! #[tokio::test]
//! async fn test_transfer() {
//!     let (harness, _ledger) = in_process_harness(HarnessConfig::default(), Arc::new(SystemClock)).unwrap();
//!     let spec = Spec::new("transfer")
//!         .given(ops![crypto_create("alice", CryptoCreateOptions::with_balance(ONE_HBAR))])
//!         .when(ops![crypto_transfer(vec![Movement::hbar("alice", GENESIS, 10)])])
//!         .then(ops![get_account_balance("alice").has_balance(BalanceExpectation::tiny_bars(ONE_HBAR - 10))]);
//!     let report = SuiteRunner::new(&harness).run(Suite::new("smoke", vec![spec])).await;
//!     assert!(report.is_success());
//! }
//! ```
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: clock abstraction and seeded RNG for key generation
//! 2. **Isolated**: every spec gets its own registry and fresh entities
//! 3. **Error vs Fail**: broken specs and broken ledgers are reported apart

#![warn(clippy::all)]

/// Expectations and matchers
pub mod assertions;

/// Ledger client seam, retries and finality waiters
pub mod client;

pub mod config;

/// Contract programs and their ABIs
pub mod contracts;

pub mod error;

pub mod executor;

/// In-process ledger with a simulated token-service precompile
pub mod ledger;

pub mod ops;

/// Core orchestration - provides Clock, RNG, deterministic environment
pub mod orchestrator;

pub mod registry;

pub mod runner;

// YAML scenario parser and loader
pub mod scenarios;

pub mod spec;

/// Built-in precompile suites
pub mod suites;

/// Failure artifacts
pub mod utilities;

// Convenient re-exports for common usage
pub mod prelude;

// Re-export commonly used types at crate root
pub use config::HarnessConfig;
pub use error::{FailureKind, HarnessError, HarnessResult};
pub use executor::Harness;
pub use ledger::{in_process_harness, TestLedger, TestLedgerBuilder};
pub use orchestrator::{Clock, PausedClock, SystemClock, TestRng};
pub use runner::{Suite, SuiteReport, SuiteRunner};
pub use spec::{Spec, SpecStatus};

/// Framework version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

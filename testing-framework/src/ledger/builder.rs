//! TestLedgerBuilder - Fluent API for configuring TestLedger instances

use super::programs::{ContractProgram, ProgramRegistry};
use super::state::{LedgerState, GENESIS_ACCOUNT};
use super::TestLedger;
use crate::orchestrator::{Clock, SystemClock};
use crate::registry::AccountRef;
use anyhow::{Context, Result};
use hts_common::abi::{hts_abi, ContractAbi};
use hts_common::crypto::KeyMaterial;
use hts_common::ONE_HBAR;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Seed for the genesis key when neither a key nor a seed is given
pub const DEFAULT_GENESIS_SEED: u64 = 2;

/// Builder for TestLedger instances with fluent API
///
/// # Example
///
/// ```rust,ignore
/// use hts_testing_framework::ledger::TestLedgerBuilder;
///
/// let ledger = TestLedgerBuilder::new()
///     .with_clock(clock)
///     .with_finality_lag(Duration::from_millis(50))
///     .with_property(LAZY_CREATION_ENABLED, "false")
///     .build()?;
/// ```
pub struct TestLedgerBuilder {
    /// Clock implementation for record finality
    clock: Option<Arc<dyn Clock>>,

    /// Delay between submission and record visibility
    finality_lag: Duration,

    genesis_key: Option<KeyMaterial>,
    seed: u64,
    genesis_balance: u64,

    /// Programs registered on top of the builtin ones
    programs: Vec<(String, ContractAbi, Arc<dyn ContractProgram>)>,

    /// Property overrides applied over the defaults
    properties: BTreeMap<String, String>,
}

impl Default for TestLedgerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestLedgerBuilder {
    /// Create new builder with defaults
    ///
    /// Default configuration:
    /// - SystemClock (real time)
    /// - No finality lag
    /// - Genesis key derived from [`DEFAULT_GENESIS_SEED`]
    /// - 50,000,000 hbar genesis balance
    pub fn new() -> Self {
        Self {
            clock: None,
            finality_lag: Duration::ZERO,
            genesis_key: None,
            seed: DEFAULT_GENESIS_SEED,
            genesis_balance: 50_000_000 * ONE_HBAR,
            programs: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Set clock implementation
    ///
    /// If not set, uses `SystemClock` by default. Use the same clock as the
    /// harness so waiters and finality agree on time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Records stay invisible for `lag` after submission
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// // Receipts read UNKNOWN for the first 200ms
    /// let builder = TestLedgerBuilder::new()
    ///     .with_finality_lag(Duration::from_millis(200));
    /// ```
    pub fn with_finality_lag(mut self, lag: Duration) -> Self {
        self.finality_lag = lag;
        self
    }

    /// Use a fixed genesis key instead of a seeded one
    pub fn with_genesis_key(mut self, key: KeyMaterial) -> Self {
        self.genesis_key = Some(key);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the genesis balance in tinybars
    pub fn with_genesis_balance(mut self, balance: u64) -> Self {
        self.genesis_balance = balance;
        self
    }

    /// Register an extra deployable program
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let abi = ContractAbi::from_signatures(&[("ping", "ping()")])?;
    /// let builder = TestLedgerBuilder::new()
    ///     .with_program("Ping", abi, Arc::new(Ping));
    /// ```
    pub fn with_program(mut self, name: &str, abi: ContractAbi, program: Arc<dyn ContractProgram>) -> Self {
        self.programs.push((name.to_string(), abi, program));
        self
    }

    /// Override a network property at startup
    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    /// Build the TestLedger instance
    ///
    /// # Errors
    ///
    /// Returns an error if the builtin or HTS ABIs fail to parse.
    pub fn build(self) -> Result<TestLedger> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let key = self
            .genesis_key
            .unwrap_or_else(|| KeyMaterial::generate(&mut StdRng::seed_from_u64(self.seed)));

        let mut state = LedgerState::new(key.key().clone(), self.genesis_balance);
        for (property, value) in &self.properties {
            state.set_property(property, value);
        }

        let mut programs = ProgramRegistry::builtin().context("builtin contract ABIs")?;
        for (name, abi, program) in self.programs {
            programs.register(&name, abi, program);
        }
        let hts = hts_abi().context("HTS precompile ABI")?;

        log::debug!(
            "test ledger ready: genesis {}, {} programs, finality lag {:?}",
            GENESIS_ACCOUNT,
            programs.names().count(),
            self.finality_lag
        );
        Ok(TestLedger::new(
            state,
            clock,
            self.finality_lag,
            programs,
            hts,
            AccountRef::new(GENESIS_ACCOUNT, key),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::state::LAZY_CREATION_ENABLED;

    #[test]
    fn test_seeded_genesis_is_stable() {
        let a = TestLedgerBuilder::new().with_seed(7).build().unwrap();
        let b = TestLedgerBuilder::new().with_seed(7).build().unwrap();
        let c = TestLedgerBuilder::new().with_seed(8).build().unwrap();
        assert_eq!(a.genesis().key, b.genesis().key);
        assert_ne!(a.genesis().key, c.genesis().key);
        assert_eq!(a.genesis().id, GENESIS_ACCOUNT);
    }

    #[test]
    fn test_property_override() {
        let ledger = TestLedgerBuilder::new()
            .with_property(LAZY_CREATION_ENABLED, "false")
            .with_genesis_balance(ONE_HBAR)
            .build()
            .unwrap();
        assert_eq!(ledger.property(LAZY_CREATION_ENABLED).as_deref(), Some("false"));
        assert_eq!(ledger.state().account(&GENESIS_ACCOUNT).unwrap().balance, ONE_HBAR);
    }
}

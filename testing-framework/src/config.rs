//! Harness configuration.
//!
//! Loaded from YAML (all fields optional) and then overridden from the
//! environment. Ledger-side network properties are not configured here; specs
//! change those through operations.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::orchestrator::rng::parse_seed;

pub const POLL_INTERVAL_ENV_VAR: &str = "HTS_POLL_INTERVAL_MS";
pub const RECORD_TIMEOUT_ENV_VAR: &str = "HTS_RECORD_TIMEOUT_MS";
pub const CONCURRENCY_ENV_VAR: &str = "HTS_CONCURRENCY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Delay between receipt polls
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Upper bound on waiting for a receipt or record
    #[serde(with = "millis")]
    pub record_timeout: Duration,
    /// Attempts for idempotent queries on transient failures
    pub query_retries: u32,
    #[serde(with = "millis")]
    pub query_retry_backoff: Duration,
    /// Specs in flight at once
    pub concurrency: usize,
    pub default_payer: String,
    pub default_fee: u64,
    pub default_gas: u64,
    pub artifacts_dir: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            record_timeout: Duration::from_secs(10),
            query_retries: 3,
            query_retry_backoff: Duration::from_millis(25),
            concurrency: 4,
            default_payer: crate::registry::GENESIS.to_string(),
            default_fee: 2 * hts_common::ONE_HBAR,
            default_gas: 1_000_000,
            artifacts_dir: None,
            seed: None,
        }
    }
}

impl HarnessConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse harness configuration")
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("In {}", path.display()))
    }

    /// Apply `HTS_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(POLL_INTERVAL_ENV_VAR) {
            self.poll_interval = Duration::from_millis(parse_number(POLL_INTERVAL_ENV_VAR, &raw)?);
        }
        if let Some(raw) = lookup(RECORD_TIMEOUT_ENV_VAR) {
            self.record_timeout = Duration::from_millis(parse_number(RECORD_TIMEOUT_ENV_VAR, &raw)?);
        }
        if let Some(raw) = lookup(CONCURRENCY_ENV_VAR) {
            self.concurrency = parse_number(CONCURRENCY_ENV_VAR, &raw)? as usize;
        }
        if let Some(raw) = lookup(crate::orchestrator::rng::SEED_ENV_VAR) {
            let seed = parse_seed(&raw)
                .with_context(|| format!("Invalid {} '{}'", crate::orchestrator::rng::SEED_ENV_VAR, raw))?;
            self.seed = Some(seed);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.concurrency > 0, "concurrency must be at least 1");
        anyhow::ensure!(!self.poll_interval.is_zero(), "poll_interval must be positive");
        anyhow::ensure!(
            self.record_timeout >= self.poll_interval,
            "record_timeout must not be shorter than poll_interval"
        );
        anyhow::ensure!(!self.default_payer.is_empty(), "default_payer must be set");
        Ok(())
    }
}

fn parse_number(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid {} '{}'", name, raw))
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

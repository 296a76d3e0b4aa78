// Failure artifacts: one JSON file per failed spec, enough to replay it.

use crate::spec::{SpecFailure, SpecOutcome, SpecStatus};
use anyhow::{Context, Result};
use hts_common::ResponseCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Everything captured about a failed spec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureArtifact {
    pub metadata: ArtifactMetadata,
    pub failure: Option<SpecFailure>,
    pub precheck_counts: BTreeMap<ResponseCode, u32>,
    pub status_counts: BTreeMap<ResponseCode, u32>,
    pub log: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub suite: String,
    pub spec_name: String,
    pub status: SpecStatus,
    /// RNG seed of the run, for `HTS_TEST_SEED`
    pub rng_seed: u64,
    /// RFC 3339, when the artifact was captured
    pub timestamp: String,
    pub duration_ms: u64,
}

/// Collects a spec outcome into a [`FailureArtifact`] and writes it to disk.
///
/// ```rust,ignore
/// let report = runner.run(suite).await;
/// for outcome in report.outcomes.iter().filter(|o| !o.status.is_success()) {
///     let path = ArtifactCollector::new(&report.suite, outcome).save("./artifacts/").await?;
///     println!("artifact: {}", path.display());
/// }
/// ```
pub struct ArtifactCollector {
    artifact: FailureArtifact,
}

impl ArtifactCollector {
    pub fn new(suite: &str, outcome: &SpecOutcome) -> Self {
        Self {
            artifact: FailureArtifact {
                metadata: ArtifactMetadata {
                    suite: suite.to_string(),
                    spec_name: outcome.name.clone(),
                    status: outcome.status,
                    rng_seed: outcome.seed,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    duration_ms: outcome.duration_ms,
                },
                failure: outcome.failure.clone(),
                precheck_counts: outcome.precheck_counts.clone(),
                status_counts: outcome.status_counts.clone(),
                log: outcome.log.clone(),
            },
        }
    }

    pub fn artifact(&self) -> &FailureArtifact {
        &self.artifact
    }

    /// Extra line for the artifact log, e.g. a registry dump
    pub fn capture_log(&mut self, line: impl Into<String>) {
        self.artifact.log.push(line.into());
    }

    /// File name: `<suite>_<spec>_<timestamp>.json`, with path-unsafe characters replaced
    pub fn file_name(&self) -> String {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let stem = format!("{}_{}", self.artifact.metadata.suite, self.artifact.metadata.spec_name);
        let stem: String = stem
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}_{}.json", stem, timestamp)
    }

    pub async fn save(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)
            .await
            .context("Failed to create artifact directory")?;

        let filepath = output_dir.join(self.file_name());
        let json = serde_json::to_string_pretty(&self.artifact).context("Failed to serialize artifact")?;

        let mut file = fs::File::create(&filepath)
            .await
            .context("Failed to create artifact file")?;
        file.write_all(json.as_bytes())
            .await
            .context("Failed to write artifact data")?;
        file.flush().await.context("Failed to flush artifact file")?;

        Ok(filepath)
    }

    pub async fn load(filepath: impl AsRef<Path>) -> Result<FailureArtifact> {
        let filepath = filepath.as_ref();
        let content = fs::read_to_string(filepath)
            .await
            .with_context(|| format!("Failed to read artifact file {}", filepath.display()))?;
        serde_json::from_str(&content).context("Failed to parse artifact JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::spec::Phase;

    fn failed_outcome() -> SpecOutcome {
        let mut outcome = SpecOutcome::pending("transfer then revert", 0xdeadbeef);
        outcome.status = SpecStatus::Failed;
        outcome.failure = Some(SpecFailure {
            phase: Phase::Then,
            operation: "getAccountBalance(receiver)".to_string(),
            kind: FailureKind::Assertion,
            message: "hbars: expected 10, observed 0".to_string(),
            mismatches: Vec::new(),
        });
        outcome.status_counts.insert(ResponseCode::Success, 3);
        outcome
    }

    #[test]
    fn test_file_name_is_path_safe() {
        let collector = ArtifactCollector::new("lazy/create", &failed_outcome());
        let name = collector.file_name();
        assert!(name.starts_with("lazy_create_transfer_then_revert_"));
        assert!(name.ends_with(".json"));
    }

    #[tokio::test]
    async fn test_save_and_load_artifact() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut collector = ArtifactCollector::new("lazy_create", &failed_outcome());
        collector.capture_log("registry: receiver (account)");

        let filepath = collector.save(temp_dir.path()).await?;
        assert!(filepath.exists());

        let loaded = ArtifactCollector::load(&filepath).await?;
        assert_eq!(loaded.metadata.spec_name, "transfer then revert");
        assert_eq!(loaded.metadata.rng_seed, 0xdeadbeef);
        assert_eq!(loaded.metadata.status, SpecStatus::Failed);
        assert_eq!(loaded.status_counts.get(&ResponseCode::Success), Some(&3));
        assert_eq!(loaded.log, vec!["registry: receiver (account)"]);
        Ok(())
    }
}

//! Suite runner and reports.
//!
//! Specs of a suite are isolated from each other (fresh names, fresh
//! entities), so the runner keeps up to `concurrency` of them in flight.
//! Specs marked sequential run one at a time after that batch. Reports list
//! outcomes in declaration order whatever the completion order was.

use crate::executor::Harness;
use crate::spec::{run_spec, Spec, SpecOutcome, SpecStatus};
use crate::utilities::ArtifactCollector;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub struct Suite {
    pub name: String,
    pub specs: Vec<Spec>,
}

impl Suite {
    pub fn new(name: impl Into<String>, specs: Vec<Spec>) -> Self {
        Self {
            name: name.into(),
            specs,
        }
    }

    /// Keep only specs whose name contains `pattern`
    pub fn filtered(mut self, pattern: &str) -> Self {
        self.specs.retain(|spec| spec.name.contains(pattern));
        self
    }

    pub fn spec_names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub suite: String,
    pub seed: u64,
    pub outcomes: Vec<SpecOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
}

impl SuiteReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn count(&self, status: SpecStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }

    pub fn pass_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        self.passed() as f64 / self.outcomes.len() as f64
    }

    /// A suite passes only if all of its specs do
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_success())
    }

    pub fn failing(&self) -> impl Iterator<Item = &SpecOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }

    pub fn by_status(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.outcomes {
            *counts.entry(outcome.status.to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn print_summary(&self) {
        println!("Suite '{}' (seed 0x{:016x})", self.suite, self.seed);
        for outcome in &self.outcomes {
            println!("  {:<20} {} ({} ms)", outcome.status.to_string(), outcome.name, outcome.duration_ms);
            if let Some(failure) = &outcome.failure {
                println!("      {} {}: {}", failure.phase, failure.operation, failure.message);
            }
        }
        println!(
            "  {}/{} passed ({:.1}%)",
            self.passed(),
            self.total(),
            self.pass_rate() * 100.0
        );
        for path in &self.artifacts {
            println!("  artifact: {}", path);
        }
    }
}

pub struct SuiteRunner<'h> {
    harness: &'h Harness,
}

impl<'h> SuiteRunner<'h> {
    pub fn new(harness: &'h Harness) -> Self {
        Self { harness }
    }

    pub async fn run(&self, suite: Suite) -> SuiteReport {
        let Suite { name, specs } = suite;
        log::info!("Running suite '{}' with {} specs", name, specs.len());

        let (sequential, concurrent): (Vec<_>, Vec<_>) =
            specs.into_iter().enumerate().partition(|(_, spec)| spec.sequential);

        let harness = self.harness;
        let limit = harness.config().concurrency.max(1);
        let mut outcomes: Vec<(usize, SpecOutcome)> = stream::iter(concurrent)
            .map(|(index, spec)| async move { (index, run_spec(harness, spec).await) })
            .buffer_unordered(limit)
            .collect()
            .await;
        for (index, spec) in sequential {
            outcomes.push((index, run_spec(harness, spec).await));
        }
        outcomes.sort_by_key(|(index, _)| *index);

        let mut report = SuiteReport {
            suite: name,
            seed: harness.seed(),
            outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
            artifacts: Vec::new(),
        };
        self.write_artifacts(&mut report).await;
        log::info!(
            "Suite '{}' finished: {}/{} passed",
            report.suite,
            report.passed(),
            report.total()
        );
        report
    }

    pub async fn run_all(&self, suites: Vec<Suite>) -> Vec<SuiteReport> {
        let mut reports = Vec::with_capacity(suites.len());
        for suite in suites {
            reports.push(self.run(suite).await);
        }
        reports
    }

    async fn write_artifacts(&self, report: &mut SuiteReport) {
        let Some(dir) = &self.harness.config().artifacts_dir else {
            return;
        };
        for outcome in report.outcomes.iter().filter(|o| !o.status.is_success()) {
            match ArtifactCollector::new(&report.suite, outcome).save(dir).await {
                Ok(path) => report.artifacts.push(path.display().to_string()),
                Err(err) => log::error!("Failed to write artifact for '{}': {:#}", outcome.name, err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, status: SpecStatus) -> SpecOutcome {
        let mut outcome = SpecOutcome::pending(name, 7);
        outcome.status = status;
        outcome
    }

    #[test]
    fn test_report_aggregation() {
        let report = SuiteReport {
            suite: "kyc".to_string(),
            seed: 7,
            outcomes: vec![
                outcome("a", SpecStatus::Passed),
                outcome("b", SpecStatus::FailedAsExpected),
                outcome("c", SpecStatus::Error),
                outcome("d", SpecStatus::Failed),
            ],
            artifacts: Vec::new(),
        };
        assert_eq!(report.total(), 4);
        assert_eq!(report.passed(), 2);
        assert!(!report.is_success());
        assert_eq!(report.pass_rate(), 0.5);
        let failing: Vec<_> = report.failing().map(|o| o.name.as_str()).collect();
        assert_eq!(failing, vec!["c", "d"]);
        assert_eq!(report.by_status().get("ERROR"), Some(&1));
    }

    #[test]
    fn test_empty_report_passes() {
        let report = SuiteReport {
            suite: "empty".to_string(),
            seed: 0,
            outcomes: Vec::new(),
            artifacts: Vec::new(),
        };
        assert!(report.is_success());
        assert_eq!(report.pass_rate(), 1.0);
    }

    #[test]
    fn test_filter_by_name() {
        let suite = Suite::new("s", vec![Spec::new("tokenAllowance"), Spec::new("tokenApprove"), Spec::new("hbar")])
            .filtered("token");
        assert_eq!(suite.spec_names(), vec!["tokenAllowance", "tokenApprove"]);
    }
}

//! Specs: named given/when/then pipelines and their outcomes.
//!
//! A spec runs its phases strictly in order against a fresh
//! [`SpecContext`](crate::executor::SpecContext). The first failing operation
//! stops the spec. A failure in `given` is always ERROR; in `when` and `then`
//! the failure kind decides between FAILED and ERROR.

use crate::error::{FailureKind, HarnessError, Mismatch};
use crate::executor::{Harness, SpecContext};
use crate::ops::{Operation, TxnAction, TxnOp, TxnOptions};
use crate::registry::GENESIS;
use hts_common::ResponseCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use strum::{AsRefStr, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Given,
    When,
    Then,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Error,
    FailedAsExpected,
    PassedUnexpectedly,
}

impl SpecStatus {
    /// Whether the spec counts towards a passing suite
    pub fn is_success(&self) -> bool {
        matches!(self, SpecStatus::Passed | SpecStatus::FailedAsExpected)
    }
}

pub struct Spec {
    pub name: String,
    pub given: Vec<Operation>,
    pub when: Vec<Operation>,
    pub then: Vec<Operation>,
    /// Outcome is inverted: FAILED becomes FAILED_AS_EXPECTED
    pub expect_failure: bool,
    /// Must not overlap with any other spec
    pub sequential: bool,
    /// Network properties restored after the spec
    pub preserving: Vec<String>,
}

impl Spec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            given: Vec::new(),
            when: Vec::new(),
            then: Vec::new(),
            expect_failure: false,
            sequential: false,
            preserving: Vec::new(),
        }
    }

    pub fn given(mut self, ops: Vec<Operation>) -> Self {
        self.given = ops;
        self
    }

    pub fn when(mut self, ops: Vec<Operation>) -> Self {
        self.when = ops;
        self
    }

    pub fn then(mut self, ops: Vec<Operation>) -> Self {
        self.then = ops;
        self
    }

    pub fn expecting_failure(mut self) -> Self {
        self.expect_failure = true;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }

    /// Snapshot `keys` before the spec and restore them afterwards.
    ///
    /// Specs that change network properties run alone.
    pub fn preserving(mut self, keys: &[&str]) -> Self {
        self.preserving = keys.iter().map(|k| k.to_string()).collect();
        self.sequential = true;
        self
    }

    pub fn operation_count(&self) -> usize {
        self.given.len() + self.when.len() + self.then.len()
    }
}

/// First failure of a spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecFailure {
    pub phase: Phase,
    pub operation: String,
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<Mismatch>,
}

impl SpecFailure {
    fn new(phase: Phase, operation: String, err: HarnessError) -> Self {
        Self {
            phase,
            operation,
            kind: err.kind,
            message: err.message,
            mismatches: err.mismatches,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecOutcome {
    pub name: String,
    pub status: SpecStatus,
    pub failure: Option<SpecFailure>,
    pub seed: u64,
    pub duration_ms: u64,
    pub precheck_counts: BTreeMap<ResponseCode, u32>,
    pub status_counts: BTreeMap<ResponseCode, u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<String>,
}

impl SpecOutcome {
    /// Outcome of a spec that was never run
    pub fn pending(name: &str, seed: u64) -> Self {
        Self {
            name: name.to_string(),
            status: SpecStatus::Pending,
            failure: None,
            seed,
            duration_ms: 0,
            precheck_counts: BTreeMap::new(),
            status_counts: BTreeMap::new(),
            log: Vec::new(),
        }
    }
}

/// Map the first failure to a status, before any expected-failure inversion
pub fn classify(failure: Option<&SpecFailure>) -> SpecStatus {
    match failure {
        None => SpecStatus::Passed,
        Some(f) if f.phase == Phase::Given => SpecStatus::Error,
        Some(f) if f.kind.is_failure() => SpecStatus::Failed,
        Some(_) => SpecStatus::Error,
    }
}

/// Apply `expecting_failure`
pub fn invert_for_expected_failure(status: SpecStatus) -> SpecStatus {
    match status {
        SpecStatus::Failed => SpecStatus::FailedAsExpected,
        SpecStatus::Passed => SpecStatus::PassedUnexpectedly,
        other => other,
    }
}

/// Run one spec to completion
pub async fn run_spec(harness: &Harness, spec: Spec) -> SpecOutcome {
    let started = Instant::now();
    let Spec {
        name,
        given,
        when,
        then,
        expect_failure,
        preserving,
        ..
    } = spec;
    log::info!("'{}' started", name);
    let mut ctx = harness.context(&name);
    ctx.note(format!("status {}", SpecStatus::Running));

    let saved = if preserving.is_empty() {
        Ok(BTreeMap::new())
    } else {
        ctx.network_properties(&preserving).await
    };

    let failure = match &saved {
        Ok(_) => run_phases(&mut ctx, [(Phase::Given, given), (Phase::When, when), (Phase::Then, then)]).await,
        Err(err) => Some(SpecFailure::new(
            Phase::Given,
            "snapshot of preserved properties".to_string(),
            err.clone(),
        )),
    };

    if let Ok(saved) = saved {
        if !preserving.is_empty() {
            if let Err(err) = restore_properties(&mut ctx, &preserving, saved).await {
                log::warn!("'{}' could not restore network properties: {}", name, err);
            }
        }
    }

    let mut status = classify(failure.as_ref());
    if expect_failure {
        status = invert_for_expected_failure(status);
    }
    log::info!("'{}' final status: {}!", name, status);

    SpecOutcome {
        status,
        failure,
        seed: harness.seed(),
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        precheck_counts: ctx.precheck_counts().clone(),
        status_counts: ctx.status_counts().clone(),
        log: ctx.log_lines().to_vec(),
        name,
    }
}

async fn run_phases(ctx: &mut SpecContext<'_>, phases: [(Phase, Vec<Operation>); 3]) -> Option<SpecFailure> {
    for (phase, ops) in phases {
        ctx.note(format!("phase {}", phase));
        for op in ops {
            let description = op.describe();
            if let Err(err) = ctx.execute(op).await {
                log::warn!("'{}' finished initial execution of {}", ctx.spec_name(), description);
                log::warn!("'{}' {} failed: {}", ctx.spec_name(), phase, err);
                ctx.note(format!("failed {}: {}", description, err));
                return Some(SpecFailure::new(phase, description, err));
            }
        }
    }
    None
}

/// Set preserved keys back to their snapshot, resetting those that had none
async fn restore_properties(
    ctx: &mut SpecContext<'_>,
    keys: &[String],
    saved: BTreeMap<String, String>,
) -> Result<(), HarnessError> {
    let reset = keys.iter().filter(|k| !saved.contains_key(*k)).cloned().collect();
    let restore = TxnOp::new(TxnAction::NetworkProperties { set: saved, reset }).with(TxnOptions::paid_by(GENESIS));
    ctx.execute(Operation::from(restore)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(phase: Phase, kind: FailureKind) -> SpecFailure {
        SpecFailure {
            phase,
            operation: "op".to_string(),
            kind,
            message: "boom".to_string(),
            mismatches: Vec::new(),
        }
    }

    #[test]
    fn test_given_failures_are_errors() {
        assert_eq!(classify(Some(&failure(Phase::Given, FailureKind::Assertion))), SpecStatus::Error);
        assert_eq!(classify(Some(&failure(Phase::Given, FailureKind::Authoring))), SpecStatus::Error);
    }

    #[test]
    fn test_when_then_failures_by_kind() {
        assert_eq!(classify(Some(&failure(Phase::When, FailureKind::Assertion))), SpecStatus::Failed);
        assert_eq!(classify(Some(&failure(Phase::Then, FailureKind::Assertion))), SpecStatus::Failed);
        assert_eq!(classify(Some(&failure(Phase::Then, FailureKind::Transport))), SpecStatus::Error);
        assert_eq!(classify(Some(&failure(Phase::When, FailureKind::Timeout))), SpecStatus::Error);
        assert_eq!(classify(None), SpecStatus::Passed);
    }

    #[test]
    fn test_expected_failure_inversion() {
        assert_eq!(invert_for_expected_failure(SpecStatus::Failed), SpecStatus::FailedAsExpected);
        assert_eq!(invert_for_expected_failure(SpecStatus::Passed), SpecStatus::PassedUnexpectedly);
        assert_eq!(invert_for_expected_failure(SpecStatus::Error), SpecStatus::Error);
        assert!(SpecStatus::FailedAsExpected.is_success());
        assert!(!SpecStatus::PassedUnexpectedly.is_success());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SpecStatus::FailedAsExpected.to_string(), "FAILED_AS_EXPECTED");
        assert_eq!(Phase::Then.to_string(), "then");
    }

    #[test]
    fn test_preserving_forces_sequential() {
        let spec = Spec::new("s").preserving(&["lazyCreation.enabled"]);
        assert!(spec.sequential);
        assert_eq!(spec.preserving, vec!["lazyCreation.enabled"]);
    }
}

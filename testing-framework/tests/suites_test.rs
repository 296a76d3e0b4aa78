// Built-in suites against the in-process ledger

use hts_testing_framework::prelude::*;
use hts_testing_framework::{in_process_harness, suites, HarnessConfig, PausedClock, SpecStatus, SuiteReport};

fn harness() -> Harness {
    let config = HarnessConfig {
        seed: Some(42),
        ..Default::default()
    };
    let (harness, _ledger) = in_process_harness(config, Arc::new(PausedClock::new())).unwrap();
    harness
}

fn describe_failures(report: &SuiteReport) -> String {
    report
        .failing()
        .map(|o| format!("{} [{}]: {:?}", o.name, o.status, o.failure))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn assert_suite_passes(name: &str) {
    let harness = harness();
    let suite = suites::by_name(name).unwrap();
    let expected = suite.specs.len();
    let report = SuiteRunner::new(&harness).run(suite).await;
    assert_eq!(report.total(), expected);
    assert!(report.is_success(), "suite {} failed:\n{}", name, describe_failures(&report));
}

#[tokio::test(start_paused = true)]
async fn test_approve_allowance_suite() {
    assert_suite_passes("approve_allowance").await;
}

#[tokio::test(start_paused = true)]
async fn test_atomic_crypto_transfer_suite() {
    assert_suite_passes("atomic_crypto_transfer").await;
}

#[tokio::test(start_paused = true)]
async fn test_lazy_create_suite() {
    assert_suite_passes("lazy_create").await;
}

#[tokio::test(start_paused = true)]
async fn test_associate_suite() {
    assert_suite_passes("associate").await;
}

#[tokio::test(start_paused = true)]
async fn test_mint_burn_suite() {
    assert_suite_passes("mint_burn").await;
}

#[tokio::test(start_paused = true)]
async fn test_kyc_suite() {
    assert_suite_passes("kyc").await;
}

#[tokio::test(start_paused = true)]
async fn test_all_suites_share_one_ledger() {
    let harness = harness();
    let reports = SuiteRunner::new(&harness).run_all(suites::all()).await;
    assert_eq!(reports.len(), suites::SUITE_NAMES.len());
    for report in &reports {
        assert!(report.is_success(), "suite {} failed:\n{}", report.suite, describe_failures(report));
        assert_eq!(report.seed, 42);
    }
}

#[tokio::test(start_paused = true)]
async fn test_filter_selects_matching_specs() {
    let harness = harness();
    let suite = suites::by_name("lazy_create").unwrap().filtered("Disabled");
    assert_eq!(suite.spec_names(), vec!["lazyCreateWhenDisabledReverts"]);

    let report = SuiteRunner::new(&harness).run(suite).await;
    assert_eq!(report.count(SpecStatus::Passed), 1);
}

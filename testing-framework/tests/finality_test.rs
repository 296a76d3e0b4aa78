// Receipt and record waits against a ledger that finalizes late

use hts_testing_framework::prelude::*;
use std::time::Duration;

fn lagging(lag: Duration, record_timeout: Duration) -> (Harness, Arc<PausedClock>) {
    let clock = Arc::new(PausedClock::new());
    let ledger = Arc::new(
        TestLedgerBuilder::new()
            .with_clock(clock.clone())
            .with_finality_lag(lag)
            .build()
            .unwrap(),
    );
    let config = HarnessConfig {
        seed: Some(11),
        poll_interval: Duration::from_millis(50),
        record_timeout,
        ..Default::default()
    };
    let harness = Harness::new(ledger.clone(), clock.clone(), ledger.genesis(), config).unwrap();
    (harness, clock)
}

fn create_account() -> Spec {
    Spec::new("create").when(ops![crypto_create(
        "lagged",
        CryptoCreateOptions::with_balance(ONE_HBAR)
    )])
}

#[tokio::test(start_paused = true)]
async fn test_waits_out_finality_lag() {
    let (harness, clock) = lagging(Duration::from_millis(300), Duration::from_secs(5));
    let start = clock.now();

    let report = SuiteRunner::new(&harness)
        .run(Suite::new("lag", vec![create_account()]))
        .await;

    assert!(report.is_success(), "{:?}", report.outcomes[0].failure);
    assert!(clock.elapsed_since(start) >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_record_timeout_errors_spec() {
    let (harness, _clock) = lagging(Duration::from_secs(30), Duration::from_secs(1));

    let report = SuiteRunner::new(&harness)
        .run(Suite::new("lag", vec![create_account().expecting_failure()]))
        .await;

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, SpecStatus::Error);
    assert_eq!(outcome.failure.as_ref().unwrap().kind, FailureKind::Timeout);
}

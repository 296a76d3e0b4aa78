// Spec outcome classification and reporting

use async_trait::async_trait;
use hts_common::crypto::KeyMaterial;
use hts_common::query::{Query, QueryAnswer};
use hts_common::record::{TransactionReceipt, TransactionRecord};
use hts_common::transaction::{SignedTransaction, TransactionId};
use hts_common::AccountId;
use hts_testing_framework::client::LedgerClient;
use hts_testing_framework::error::ClientError;
use hts_testing_framework::prelude::*;
use hts_testing_framework::registry::AccountRef;
use hts_testing_framework::utilities::ArtifactCollector;
use hts_testing_framework::{in_process_harness, PausedClock, SpecStatus};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU32, Ordering};

fn harness_with(config: HarnessConfig) -> Harness {
    let (harness, _ledger) = in_process_harness(config, Arc::new(PausedClock::new())).unwrap();
    harness
}

fn harness() -> Harness {
    harness_with(HarnessConfig {
        seed: Some(7),
        ..Default::default()
    })
}

fn funded(name: &str) -> Operation {
    crypto_create(name, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)).into()
}

fn wrong_balance_spec(name: &str) -> Spec {
    Spec::new(name)
        .given(ops![funded("alice")])
        .then(ops![get_account_balance("alice").has_balance(BalanceExpectation::tiny_bars(1))])
}

async fn run_one(harness: &Harness, spec: Spec) -> SuiteReport {
    SuiteRunner::new(harness).run(Suite::new("runner", vec![spec])).await
}

#[tokio::test(start_paused = true)]
async fn test_passing_spec() {
    let harness = harness();
    let spec = Spec::new("transfer")
        .given(ops![funded("alice"), funded("bob")])
        .when(ops![crypto_transfer(vec![Movement::hbar("alice", "bob", ONE_HBAR)]).with(
            TxnOptions::paid_by("alice").via("xfer")
        )])
        .then(ops![
            get_account_balance("bob").has_balance(BalanceExpectation::tiny_bars(ONE_HUNDRED_HBARS + ONE_HBAR)),
            get_txn_record("xfer").has_record(
                RecordExpectation::new()
                    .status(ResponseCode::Success)
                    .hbar_transfer("alice", "bob", ONE_HBAR as i64)
            ),
        ]);

    let report = run_one(&harness, spec).await;
    assert!(report.is_success());
    assert_eq!(report.outcomes[0].status, SpecStatus::Passed);
    assert_eq!(report.outcomes[0].status_counts.get(&ResponseCode::Success), Some(&3));
}

#[tokio::test(start_paused = true)]
async fn test_assertion_mismatch_fails() {
    let harness = harness();
    let report = run_one(&harness, wrong_balance_spec("wrongBalance")).await;

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, SpecStatus::Failed);
    let failure = outcome.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Assertion);
    assert!(!failure.mismatches.is_empty());
    assert!(!report.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_expected_failure_inverts_outcome() {
    let harness = harness();
    let failing = wrong_balance_spec("failsAsExpected").expecting_failure();
    let passing = Spec::new("passesUnexpectedly")
        .given(ops![funded("carol")])
        .then(ops![get_account_balance("carol").has_balance(BalanceExpectation::tiny_bars(ONE_HUNDRED_HBARS))])
        .expecting_failure();

    let report = SuiteRunner::new(&harness)
        .run(Suite::new("inversion", vec![failing, passing]))
        .await;
    assert_eq!(report.outcomes[0].status, SpecStatus::FailedAsExpected);
    assert_eq!(report.outcomes[1].status, SpecStatus::PassedUnexpectedly);
    assert_eq!(report.passed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_name_is_an_error() {
    let harness = harness();
    let spec = Spec::new("ghost")
        .when(ops![crypto_transfer(vec![Movement::hbar("ghost", GENESIS, 1)])])
        .expecting_failure();

    let report = run_one(&harness, spec).await;
    let outcome = &report.outcomes[0];
    // Authoring mistakes are never inverted
    assert_eq!(outcome.status, SpecStatus::Error);
    assert_eq!(outcome.failure.as_ref().unwrap().kind, FailureKind::Authoring);
}

#[tokio::test(start_paused = true)]
async fn test_given_failure_is_an_error() {
    let harness = harness();
    let spec = Spec::new("badSetup")
        .given(ops![
            funded("dave"),
            crypto_transfer(vec![Movement::hbar("dave", GENESIS, 10 * ONE_HUNDRED_HBARS)])
        ])
        .then(ops![get_account_balance("dave").has_balance(BalanceExpectation::tiny_bars(0))]);

    let report = run_one(&harness, spec).await;
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, SpecStatus::Error);
    assert_eq!(outcome.failure.as_ref().unwrap().phase.to_string(), "given");
}

#[tokio::test(start_paused = true)]
async fn test_declared_failing_creation_passes_without_binding() {
    let harness = harness();
    let spec = Spec::new("duplicateAlias")
        .given(ops![
            new_key_named("aliasKey"),
            crypto_create(
                "first",
                CryptoCreateOptions {
                    balance: ONE_HBAR,
                    alias_key: Some("aliasKey".to_string()),
                    ..Default::default()
                }
            ),
        ])
        .when(ops![crypto_create(
            "second",
            CryptoCreateOptions {
                balance: ONE_HBAR,
                alias_key: Some("aliasKey".to_string()),
                ..Default::default()
            }
        )
        .with(TxnOptions::new().status(ResponseCode::InvalidTransaction))])
        .then(ops![
            get_aliased_account_balance("aliasKey").has_balance(BalanceExpectation::tiny_bars(ONE_HBAR)),
            assert_that("second is unbound", |registry| {
                assert!(!registry.contains("second"));
                Ok(())
            }),
        ]);

    let report = run_one(&harness, spec).await;
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, SpecStatus::Passed, "{:?}", outcome.failure);
    assert_eq!(outcome.status_counts.get(&ResponseCode::InvalidTransaction), Some(&1));
}

#[tokio::test(start_paused = true)]
async fn test_report_json_and_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness_with(HarnessConfig {
        seed: Some(7),
        artifacts_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    });

    let report = run_one(&harness, wrong_balance_spec("withArtifact")).await;
    let json = report.to_json().unwrap();
    assert!(json.contains("\"FAILED\""));
    assert!(json.contains("withArtifact"));

    assert_eq!(report.artifacts.len(), 1);
    let artifact = ArtifactCollector::load(&report.artifacts[0]).await.unwrap();
    assert_eq!(artifact.metadata.spec_name, "withArtifact");
    assert_eq!(artifact.metadata.suite, "runner");
}

/// Never answers anything
struct SilentLedger;

#[async_trait]
impl LedgerClient for SilentLedger {
    async fn submit(&self, _: SignedTransaction) -> Result<ResponseCode, ClientError> {
        std::future::pending().await
    }

    async fn get_receipt(&self, _: &TransactionId) -> Result<Option<TransactionReceipt>, ClientError> {
        std::future::pending().await
    }

    async fn get_record(&self, _: &TransactionId) -> Result<Option<TransactionRecord>, ClientError> {
        std::future::pending().await
    }

    async fn query_cost(&self, _: &Query) -> Result<QueryAnswer, ClientError> {
        std::future::pending().await
    }

    async fn query(&self, _: &Query, _: AccountId, _: u64) -> Result<QueryAnswer, ClientError> {
        std::future::pending().await
    }
}

fn silent_harness() -> Harness {
    let genesis = AccountRef::new(
        AccountId::from_num(2),
        KeyMaterial::generate(&mut StdRng::seed_from_u64(2)),
    );
    Harness::new(
        Arc::new(SilentLedger),
        Arc::new(PausedClock::new()),
        genesis,
        HarnessConfig {
            seed: Some(7),
            record_timeout: std::time::Duration::from_secs(1),
            ..Default::default()
        },
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_silent_ledger_times_out_each_spec() {
    let harness = silent_harness();
    let submit = Spec::new("silentSubmit").when(ops![crypto_transfer(vec![Movement::hbar(GENESIS, GENESIS, 1)])]);
    let query = Spec::new("silentQuery").then(ops![get_account_info(GENESIS).has_info(AccountInfoExpectation::new())]);

    let report = tokio::time::timeout(
        std::time::Duration::from_secs(3600),
        SuiteRunner::new(&harness).run(Suite::new("silent", vec![submit, query])),
    )
    .await
    .expect("suite must finish despite a silent ledger");

    for outcome in &report.outcomes {
        assert_eq!(outcome.status, SpecStatus::Error, "{}", outcome.name);
        assert_eq!(outcome.failure.as_ref().unwrap().kind, FailureKind::Timeout, "{}", outcome.name);
    }
}

/// Refuses every submission with a transport error
struct UnreachableLedger {
    submits: AtomicU32,
}

#[async_trait]
impl LedgerClient for UnreachableLedger {
    async fn submit(&self, _: SignedTransaction) -> Result<ResponseCode, ClientError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        Err(ClientError::Transport("connection refused".into()))
    }

    async fn get_receipt(&self, _: &TransactionId) -> Result<Option<TransactionReceipt>, ClientError> {
        Ok(None)
    }

    async fn get_record(&self, _: &TransactionId) -> Result<Option<TransactionRecord>, ClientError> {
        Ok(None)
    }

    async fn query_cost(&self, _: &Query) -> Result<QueryAnswer, ClientError> {
        Err(ClientError::Transport("connection refused".into()))
    }

    async fn query(&self, _: &Query, _: AccountId, _: u64) -> Result<QueryAnswer, ClientError> {
        Err(ClientError::Transport("connection refused".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_is_an_error() {
    let client = Arc::new(UnreachableLedger {
        submits: AtomicU32::new(0),
    });
    let genesis = AccountRef::new(
        AccountId::from_num(2),
        KeyMaterial::generate(&mut StdRng::seed_from_u64(2)),
    );
    let harness = Harness::new(
        client.clone(),
        Arc::new(PausedClock::new()),
        genesis,
        HarnessConfig {
            seed: Some(7),
            ..Default::default()
        },
    )
    .unwrap();

    let spec = Spec::new("unreachable")
        .when(ops![crypto_transfer(vec![Movement::hbar(GENESIS, GENESIS, 1)])])
        .expecting_failure();
    let report = run_one(&harness, spec).await;

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, SpecStatus::Error);
    assert_eq!(outcome.failure.as_ref().unwrap().kind, FailureKind::Transport);
    assert_eq!(client.submits.load(Ordering::SeqCst), 1);
}

// YAML scenarios: parsing, validation and execution

use hts_testing_framework::prelude::*;
use hts_testing_framework::scenarios::{load_scenario_file, parse_scenario, scenario_to_spec, ScenarioExecutor, Step};
use std::path::PathBuf;

fn scenario_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios")
}

fn sample_files() -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(scenario_dir())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn test_sample_scenarios_parse() {
    let files = sample_files();
    assert!(!files.is_empty());
    for file in files {
        let scenario = load_scenario_file(&file).await.unwrap();
        assert!(scenario.step_count() > 0, "{} has no steps", file.display());
        scenario_to_spec(scenario).unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_sample_scenarios_pass() {
    let mut scenarios = Vec::new();
    for file in sample_files() {
        scenarios.push(load_scenario_file(&file).await.unwrap());
    }
    let count = scenarios.len();

    let (harness, _ledger) = in_process_harness(
        HarnessConfig {
            seed: Some(3),
            ..Default::default()
        },
        Arc::new(PausedClock::new()),
    )
    .unwrap();
    let report = ScenarioExecutor::new(&harness).run(scenarios).await.unwrap();

    assert_eq!(report.total(), count);
    let failures: Vec<_> = report.failing().map(|o| (o.name.clone(), o.failure.clone())).collect();
    assert!(report.is_success(), "{:?}", failures);
}

#[tokio::test]
async fn test_missing_file_names_path() {
    let err = load_scenario_file(scenario_dir().join("does_not_exist.yaml"))
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("does_not_exist.yaml"));
}

#[test]
fn test_full_step_vocabulary() {
    let yaml = r#"
name: "vocabulary"
expect_failure: true
given:
  - action: new_key
    name: aliasKey
  - action: new_key
    name: delegateKey
    shape: delegate
    contract: xfer
  - action: crypto_create
    name: owner
    balance: 1000
    max_automatic_token_associations: -1
    memo: "owner"
  - action: token_create
    name: nft
    treasury: owner
    type: non_fungible
    supply_key: aliasKey
  - action: contract_create
    name: xfer
    program: PrecompileAliasXfer
    admin_key: aliasKey
  - action: override
    properties:
      lazyCreation.enabled: "false"
when:
  - action: contract_call
    contract: xfer
    function: transferTokensCall
    args:
      - address: nft
      - addresses: [owner, xfer]
      - ints: [-1, 1]
    gas: 500000
    status: CONTRACT_REVERT_EXECUTED
    via: call
  - action: approve_allowance
    allowances:
      - { owner: owner, spender: xfer, amount: 5 }
then:
  - action: assert_child_records
    txn: call
    parent_status: CONTRACT_REVERT_EXECUTED
    mode: containing
    children:
      - status: NOT_SUPPORTED
  - action: assert_account_info
    account: aliasKey
    by_alias: true
    empty_key: true
  - action: reset_properties
    keys: [lazyCreation.enabled]
"#;
    let scenario = parse_scenario(yaml).unwrap();
    assert_eq!(scenario.step_count(), 11);
    assert!(matches!(
        &scenario.when[0],
        Step::ContractCall { gas: Some(500_000), options, .. }
            if options.status == Some(ResponseCode::ContractRevertExecuted)
    ));

    let spec = scenario_to_spec(scenario).unwrap();
    assert!(spec.expect_failure);
    assert_eq!(spec.operation_count(), 11);
}

#[test]
fn test_validation_errors() {
    let cases = [
        ("name: \"\"\ngiven:\n  - action: new_key\n    name: k\n", "must not be empty"),
        ("name: empty\n", "has no steps"),
        (
            "name: dup\ngiven:\n  - action: new_key\n    name: k\n  - action: new_key\n    name: k\n",
            "Duplicate name 'k'",
        ),
        (
            "name: dupvia\ngiven:\n  - action: new_key\n    name: k\nwhen:\n  - action: mint_token\n    token: t\n    amount: 1\n    via: k\n",
            "Duplicate name 'k'",
        ),
    ];
    for (yaml, expected) in cases {
        let err = parse_scenario(yaml).unwrap_err();
        assert!(format!("{:#}", err).contains(expected), "{} -> {:#}", expected, err);
    }
}

#[test]
fn test_rejects_unknown_actions_and_fields() {
    assert!(parse_scenario("name: x\ngiven:\n  - action: teleport\n").is_err());
    assert!(parse_scenario("name: x\nsetup: []\ngiven:\n  - action: new_key\n    name: k\n").is_err());
    assert!(parse_scenario("name: x\ngiven:\n  - action: crypto_create\n    name: a\n    balance: 1_000\n").is_err());
}

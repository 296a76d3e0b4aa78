// Composition helpers, deferred builders, property overrides and child-record checks.

use super::{AssertionOp, Operation, TxnAction, TxnOp, TxnOptions};
use crate::assertions::{MatchMode, RecordExpectation};
use crate::error::HarnessResult;
use crate::registry::{Registry, GENESIS};
use hts_common::ResponseCode;
use std::collections::BTreeMap;

/// Build the operation from the registry right before it runs
pub fn sourcing<F>(label: &str, build: F) -> Operation
where
    F: FnOnce(&Registry) -> HarnessResult<Operation> + Send + 'static,
{
    Operation::Deferred {
        label: label.to_string(),
        build: Box::new(build),
    }
}

/// Build several operations from the registry and run them in order
pub fn with_op_context<F>(label: &str, build: F) -> Operation
where
    F: FnOnce(&Registry) -> HarnessResult<Vec<Operation>> + Send + 'static,
{
    sourcing(label, move |registry| build(registry).map(Operation::Composite))
}

pub fn composite(ops: Vec<Operation>) -> Operation {
    Operation::Composite(ops)
}

fn genesis_signed() -> TxnOptions {
    TxnOptions::paid_by(GENESIS)
}

pub fn overriding(key: &str, value: &str) -> TxnOp {
    overriding_all(&[(key, value)])
}

pub fn overriding_all(properties: &[(&str, &str)]) -> TxnOp {
    let set: BTreeMap<String, String> = properties
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    TxnOp::new(TxnAction::NetworkProperties { set, reset: Vec::new() }).with(genesis_signed())
}

pub fn reset_to_default(keys: &[&str]) -> TxnOp {
    TxnOp::new(TxnAction::NetworkProperties {
        set: BTreeMap::new(),
        reset: keys.iter().map(|k| k.to_string()).collect(),
    })
    .with(genesis_signed())
}

/// Children of `txn` must match `expected` under `mode`
pub fn child_records_check(
    txn: &str,
    parent_status: ResponseCode,
    mode: MatchMode,
    expected: Vec<RecordExpectation>,
) -> AssertionOp {
    AssertionOp::ChildRecords {
        txn: txn.to_string(),
        parent_status,
        mode,
        expected,
    }
}

pub fn empty_child_records_check(txn: &str, parent_status: ResponseCode) -> AssertionOp {
    child_records_check(txn, parent_status, MatchMode::OrderedExact, Vec::new())
}

pub fn assert_that<F>(label: &str, check: F) -> AssertionOp
where
    F: FnOnce(&Registry) -> HarnessResult<()> + Send + 'static,
{
    AssertionOp::Custom {
        label: label.to_string(),
        check: Box::new(check),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_are_genesis_paid() {
        let op = overriding("lazyCreation.enabled", "false");
        assert_eq!(op.options.payer.as_deref(), Some(GENESIS));
        match op.action {
            TxnAction::NetworkProperties { set, reset } => {
                assert_eq!(set.get("lazyCreation.enabled").map(String::as_str), Some("false"));
                assert!(reset.is_empty());
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_with_op_context_builds_composite() {
        let op = with_op_context("ctx", |_| Ok(vec![composite(vec![])]));
        match op {
            Operation::Deferred { build, .. } => {
                let built = build(&Registry::new()).unwrap();
                assert!(matches!(built, Operation::Composite(ref ops) if ops.len() == 1));
            }
            _ => panic!("expected a deferred operation"),
        }
    }
}

//! Child-record matching.
//!
//! Every call site names its [`MatchMode`] explicitly. `OrderedExact` is for
//! emission orders the ledger guarantees; `Containing` tolerates unrelated
//! housekeeping children interleaved with the expected ones.

use super::record::RecordExpectation;
use crate::error::{HarnessResult, Mismatch};
use crate::registry::Registry;
use hts_common::record::TransactionRecord;
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Same length, pairwise match
    OrderedExact,
    /// Expected entries form a subsequence of the observed ones
    Containing,
}

/// Pairwise matching; a length difference is reported with both lengths
pub fn match_ordered_exact<O, E, F>(field: &str, observed: &[O], expected: &[E], mut check: F) -> Vec<Mismatch>
where
    F: FnMut(usize, &O, &E) -> Vec<Mismatch>,
{
    let mut mismatches = Vec::new();
    if observed.len() != expected.len() {
        mismatches.push(Mismatch::new(
            format!("{}.len", field),
            expected.len(),
            observed.len(),
        ));
    }
    for (i, (o, e)) in observed.iter().zip(expected).enumerate() {
        let prefix = format!("{}[{}]", field, i);
        mismatches.extend(check(i, o, e).into_iter().map(|m| m.nested(&prefix)));
    }
    mismatches
}

/// Subsequence matching.
///
/// Each expected entry is matched against the earliest observed entry after
/// the previous match. Taking the earliest match never rules out a later one,
/// so this finds a subsequence whenever one exists.
pub fn match_containing<O, E, F>(field: &str, observed: &[O], expected: &[E], mut check: F) -> Vec<Mismatch>
where
    F: FnMut(usize, &O, &E) -> Vec<Mismatch>,
{
    let mut mismatches = Vec::new();
    let mut next = 0;
    for (j, e) in expected.iter().enumerate() {
        let found = (next..observed.len()).find(|&k| check(k, &observed[k], e).is_empty());
        match found {
            Some(k) => next = k + 1,
            None => mismatches.push(Mismatch::new(
                format!("{}[expected {}]", field, j),
                "a matching entry",
                format!("none among {} remaining", observed.len() - next),
            )),
        }
    }
    mismatches
}

/// Match the children of `parent` against `expected`
pub fn match_child_records(
    parent: &TransactionRecord,
    expected: &[RecordExpectation],
    mode: MatchMode,
    registry: &Registry,
) -> HarnessResult<Vec<Mismatch>> {
    // Name resolution errors are authoring defects, surface them before matching
    let mut resolution_error = None;
    let mut check = |index: usize, child: &TransactionRecord, expectation: &RecordExpectation| {
        let mut found = match expectation.check(child, registry) {
            Ok(found) => found,
            Err(err) => {
                resolution_error.get_or_insert(err);
                return vec![Mismatch::new("expectation", "resolvable", "authoring error")];
            }
        };
        if mode == MatchMode::OrderedExact {
            let expected_id = parent.transaction_id.child(index as u32 + 1);
            if child.transaction_id != expected_id {
                found.push(Mismatch::new(
                    "transaction_id",
                    expected_id,
                    child.transaction_id,
                ));
            }
        }
        found
    };

    let mismatches = match mode {
        MatchMode::OrderedExact => match_ordered_exact("children", &parent.children, expected, &mut check),
        MatchMode::Containing => match_containing("children", &parent.children, expected, &mut check),
    };
    match resolution_error {
        Some(err) => Err(err),
        None => Ok(mismatches),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hts_common::transaction::{Timestamp, TransactionId};
    use hts_common::{AccountId, ResponseCode};
    use proptest::prelude::*;

    fn equal(_: usize, o: &u8, e: &u8) -> Vec<Mismatch> {
        if o == e {
            Vec::new()
        } else {
            vec![Mismatch::new("value", e, o)]
        }
    }

    fn is_subsequence(needle: &[u8], haystack: &[u8]) -> bool {
        let mut it = haystack.iter();
        needle.iter().all(|n| it.any(|h| h == n))
    }

    proptest! {
        #[test]
        fn prop_ordered_exact_passes_iff_identical(
            observed in prop::collection::vec(0u8..4, 0..6),
            expected in prop::collection::vec(0u8..4, 0..6),
        ) {
            let mismatches = match_ordered_exact("children", &observed, &expected, equal);
            prop_assert_eq!(mismatches.is_empty(), observed == expected);
            if observed.len() != expected.len() {
                let len = &mismatches[0];
                prop_assert_eq!(&len.field, "children.len");
                prop_assert_eq!(&len.expected, &expected.len().to_string());
                prop_assert_eq!(&len.observed, &observed.len().to_string());
            }
        }

        #[test]
        fn prop_containing_passes_iff_subsequence(
            observed in prop::collection::vec(0u8..4, 0..8),
            expected in prop::collection::vec(0u8..4, 0..5),
        ) {
            let mismatches = match_containing("children", &observed, &expected, equal);
            prop_assert_eq!(mismatches.is_empty(), is_subsequence(&expected, &observed));
        }
    }

    #[test]
    fn test_containing_ignores_interleaved_extras() {
        assert!(match_containing("c", &[9, 1, 9, 2, 9], &[1, 2], equal).is_empty());
        assert_eq!(match_containing("c", &[2, 1], &[1, 2], equal).len(), 1);
    }

    #[test]
    fn test_ordered_exact_checks_child_nonces() {
        let registry = Registry::new();
        let parent_id = TransactionId::new(AccountId::from_num(2), Timestamp::from_nanos(10));
        let mut parent = TransactionRecord::new(parent_id, ResponseCode::Success, Timestamp::from_nanos(20));
        parent.children = vec![
            TransactionRecord::new(parent_id.child(1), ResponseCode::Success, Timestamp::from_nanos(19)),
            TransactionRecord::new(parent_id.child(3), ResponseCode::Success, Timestamp::from_nanos(21)),
        ];
        let expected = vec![
            RecordExpectation::new().status(ResponseCode::Success),
            RecordExpectation::new().status(ResponseCode::Success),
        ];

        let ordered = match_child_records(&parent, &expected, MatchMode::OrderedExact, &registry).unwrap();
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].field, "children[1].transaction_id");

        let containing = match_child_records(&parent, &expected, MatchMode::Containing, &registry).unwrap();
        assert!(containing.is_empty());
    }

    #[test]
    fn test_unknown_name_is_authoring_error() {
        let registry = Registry::new();
        let id = TransactionId::new(AccountId::from_num(2), Timestamp::from_nanos(1));
        let mut parent = TransactionRecord::new(id, ResponseCode::Success, Timestamp::from_nanos(2));
        parent.children = vec![TransactionRecord::new(id.child(1), ResponseCode::Success, Timestamp::from_nanos(2))];
        let expected = vec![RecordExpectation::new().alias("missing")];
        assert!(match_child_records(&parent, &expected, MatchMode::Containing, &registry).is_err());
    }
}

// Transfer-list matching: amounts are summed per key on both sides, so the
// order and the split of movements in the record never matter.

use crate::error::Mismatch;
use std::collections::BTreeMap;
use std::fmt::Display;

/// Net amount per key, or `None` when a total leaves the i64 range
pub fn aggregate<K, I>(entries: I) -> Option<BTreeMap<K, i64>>
where
    K: Ord,
    I: IntoIterator<Item = (K, i64)>,
{
    let mut totals = BTreeMap::new();
    for (key, amount) in entries {
        let total = totals.entry(key).or_insert(0i64);
        *total = total.checked_add(amount)?;
    }
    Some(totals)
}

/// Every expected net change must be present in `observed`; other keys are ignored
pub fn match_including<K>(field: &str, observed: &BTreeMap<K, i64>, expected: &[(K, i64)]) -> Vec<Mismatch>
where
    K: Ord + Clone + Display,
{
    let Some(totals) = aggregate(expected.iter().cloned()) else {
        return vec![Mismatch::new(field, "net changes within i64", "overflow")];
    };
    totals
        .into_iter()
        .filter_map(|(key, amount)| {
            let actual = observed.get(&key).copied().unwrap_or(0);
            (actual != amount).then(|| Mismatch::new(format!("{}[{}]", field, key), amount, actual))
        })
        .collect()
}

/// Debit `from` and credit `to` by `amount`
pub fn from_to<K: Clone>(from: K, to: K, amount: i64) -> [(K, i64); 2] {
    [(from, -amount), (to, amount)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_including_ignores_unrelated_accounts() {
        let observed = aggregate(vec![("a", -50), ("b", 40), ("c", 10), ("fee", 3)]).unwrap();
        let mut expected = from_to("a", "b", 40).to_vec();
        expected.extend(from_to("a", "c", 10));
        assert!(match_including("transfers", &observed, &expected).is_empty());
    }

    #[test]
    fn test_missing_key_counts_as_zero() {
        let observed = aggregate(vec![("a", -5), ("b", 5)]).unwrap();
        let mismatches = match_including("transfers", &observed, &from_to("a", "z", 5));
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].field, "transfers[z]");
        assert_eq!(mismatches[0].observed, "0");
    }

    #[test]
    fn test_overflowing_expectation_is_a_mismatch() {
        let observed = aggregate(vec![("a", 1), ("b", -1)]).unwrap();
        let mut expected = from_to("b", "a", i64::MAX).to_vec();
        expected.extend(from_to("b", "a", 1));
        let mismatches = match_including("transfers", &observed, &expected);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].field, "transfers");
        assert_eq!(mismatches[0].observed, "overflow");
    }

    proptest! {
        #[test]
        fn prop_order_and_split_do_not_matter(
            entries in prop::collection::vec((0u8..4, -100i64..100), 0..12),
            seed in any::<u64>(),
        ) {
            let observed = aggregate(entries.clone()).unwrap();
            let mut shuffled = entries.clone();
            let len = shuffled.len();
            if len > 1 {
                shuffled.rotate_left((seed as usize) % len);
            }
            prop_assert!(match_including("t", &observed, &shuffled).is_empty());
        }
    }
}

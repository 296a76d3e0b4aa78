//! Built-in precompile suites.
//!
//! Each module exposes `suite()`, building fresh specs on every call since
//! specs are consumed by a run.
//!
//! ```rust,ignore
//! let report = SuiteRunner::new(&harness).run(suites::by_name("kyc").unwrap()).await;
//! assert!(report.is_success());
//! ```

pub mod approve_allowance;
pub mod associate;
pub mod atomic_crypto_transfer;
pub mod kyc;
pub mod lazy_create;
pub mod mint_burn;

use crate::runner::Suite;

/// Names accepted by [`by_name`], in run order
pub const SUITE_NAMES: &[&str] = &[
    "approve_allowance",
    "atomic_crypto_transfer",
    "lazy_create",
    "associate",
    "mint_burn",
    "kyc",
];

pub fn by_name(name: &str) -> Option<Suite> {
    let suite = match name {
        "approve_allowance" => approve_allowance::suite(),
        "atomic_crypto_transfer" => atomic_crypto_transfer::suite(),
        "lazy_create" => lazy_create::suite(),
        "associate" => associate::suite(),
        "mint_burn" => mint_burn::suite(),
        "kyc" => kyc::suite(),
        _ => return None,
    };
    Some(suite)
}

pub fn all() -> Vec<Suite> {
    SUITE_NAMES.iter().filter_map(|name| by_name(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_name_resolves() {
        for name in SUITE_NAMES {
            let suite = by_name(name).unwrap();
            assert_eq!(suite.name, *name);
            assert!(!suite.specs.is_empty());
        }
        assert!(by_name("nope").is_none());
    }

    #[test]
    fn test_spec_names_unique_within_suite() {
        for suite in all() {
            let names = suite.spec_names();
            let unique: HashSet<_> = names.iter().collect();
            assert_eq!(unique.len(), names.len(), "duplicate spec name in {}", suite.name);
        }
    }

    #[test]
    fn test_property_changing_specs_run_alone() {
        for suite in all() {
            for spec in &suite.specs {
                if !spec.preserving.is_empty() {
                    assert!(spec.sequential, "{} changes properties concurrently", spec.name);
                }
            }
        }
    }
}

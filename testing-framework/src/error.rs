//! Error taxonomy of the harness.
//!
//! Every failure raised while running an operation ends up as a
//! [`HarnessError`], whose [`FailureKind`] decides the spec outcome:
//! assertion failures make a spec FAILED, everything else makes it ERROR.

use hts_common::{AbiError, EntityIdError, KeyError, ResponseCode};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use strum::Display as StrumDisplay;
use thiserror::Error;

/// Spec-authoring defects in name bindings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Name '{0}' is already bound in this spec run")]
    DuplicateName(String),

    #[error("Name '{0}' is not bound in this spec run")]
    UnknownName(String),

    #[error("Name '{name}' is bound to a {actual}, not a {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Failure talking to the ledger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger busy")]
    Busy,

    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

impl ClientError {
    /// Whether an idempotent request may be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Unavailable(_) | ClientError::Busy)
    }
}

/// How a failure affects the owning spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Malformed operation, unknown or duplicate name
    Authoring,
    /// The harness could not complete an interaction
    Transport,
    /// A per-operation wait expired
    Timeout,
    /// The ledger answered, but not as expected
    Assertion,
}

impl FailureKind {
    /// Assertion failures fail a spec, all others error it
    pub fn is_failure(&self) -> bool {
        matches!(self, FailureKind::Assertion)
    }
}

/// One field that differed from its expectation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub field: String,
    pub expected: String,
    pub observed: String,
}

impl Mismatch {
    pub fn new(field: impl Into<String>, expected: impl ToString, observed: impl ToString) -> Self {
        Self {
            field: field.into(),
            expected: expected.to_string(),
            observed: observed.to_string(),
        }
    }

    /// Prefix the field path, e.g. `children[1]` + `status`
    pub fn nested(mut self, prefix: &str) -> Self {
        self.field = format!("{}.{}", prefix, self.field);
        self
    }
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, observed {}",
            self.field, self.expected, self.observed
        )
    }
}

/// Failure of a single operation
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} failure: {message}")]
pub struct HarnessError {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<Mismatch>,
}

impl HarnessError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            mismatches: Vec::new(),
        }
    }

    pub fn authoring(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Authoring, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Assertion, message)
    }

    /// Assertion failure listing every differing field
    pub fn mismatches(context: impl Into<String>, mismatches: Vec<Mismatch>) -> Self {
        let context = context.into();
        let details: Vec<String> = mismatches.iter().map(ToString::to_string).collect();
        Self {
            kind: FailureKind::Assertion,
            message: format!("{}: {}", context, details.join("; ")),
            mismatches,
        }
    }

    /// Status expectation failure reporting both codes
    pub fn unexpected_status(what: &str, expected: ResponseCode, observed: ResponseCode) -> Self {
        Self::mismatches(
            format!("unexpected {}", what),
            vec![Mismatch::new(what, expected, observed)],
        )
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Prepend where the failure happened
    pub fn context(mut self, context: impl Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }
}

impl From<RegistryError> for HarnessError {
    fn from(err: RegistryError) -> Self {
        HarnessError::authoring(err.to_string())
    }
}

impl From<AbiError> for HarnessError {
    fn from(err: AbiError) -> Self {
        HarnessError::authoring(format!("ABI: {}", err))
    }
}

impl From<EntityIdError> for HarnessError {
    fn from(err: EntityIdError) -> Self {
        HarnessError::authoring(err.to_string())
    }
}

impl From<KeyError> for HarnessError {
    fn from(err: KeyError) -> Self {
        HarnessError::authoring(format!("key: {}", err))
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(err: serde_json::Error) -> Self {
        HarnessError::authoring(format!("encoding: {}", err))
    }
}

impl From<ClientError> for HarnessError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Timeout(_) => HarnessError::timeout(err.to_string()),
            _ => HarnessError::transport(err.to_string()),
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(ClientError::Busy.is_transient());
        assert!(ClientError::Unavailable("restarting".into()).is_transient());
        assert!(!ClientError::Transport("reset".into()).is_transient());
        assert!(!ClientError::Timeout(10).is_transient());

        assert_eq!(HarnessError::from(ClientError::Timeout(10)).kind(), FailureKind::Timeout);
        assert_eq!(HarnessError::from(ClientError::Busy).kind(), FailureKind::Transport);
    }

    #[test]
    fn test_registry_errors_are_authoring() {
        let err: HarnessError = RegistryError::UnknownName("alice".into()).into();
        assert_eq!(err.kind(), FailureKind::Authoring);
        assert!(err.message.contains("alice"));
    }

    #[test]
    fn test_mismatch_report_lists_all_fields() {
        let err = HarnessError::mismatches(
            "record",
            vec![
                Mismatch::new("status", "SUCCESS", "REVERTED_SUCCESS"),
                Mismatch::new("memo", "a", "b").nested("children[0]"),
            ],
        );
        assert!(err.kind().is_failure());
        assert!(err.message.contains("status: expected SUCCESS, observed REVERTED_SUCCESS"));
        assert!(err.message.contains("children[0].memo"));
    }
}

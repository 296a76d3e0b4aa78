//! Boundary between the harness and a ledger.
//!
//! The harness only ever talks to a ledger through [`LedgerClient`]: submit a
//! signed transaction and get its precheck, poll for the receipt and record,
//! and run queries in two steps (cost, then answer). The in-process
//! [`TestLedger`](crate::ledger::TestLedger) implements it, and so do the
//! scripted mocks used in tests.

/// Idempotent-request retry policy
pub mod retry;
/// Poll-until-visible waiters
pub mod waiters;

use crate::error::ClientError;
use async_trait::async_trait;
use hts_common::query::{Query, QueryAnswer};
use hts_common::record::{TransactionReceipt, TransactionRecord};
use hts_common::transaction::{SignedTransaction, Timestamp, TransactionId};
use hts_common::{AccountId, ResponseCode};
use std::sync::atomic::{AtomicU64, Ordering};

pub use retry::{retry_idempotent, RetryPolicy};
pub use waiters::{bounded, wait_for_receipt, wait_for_record};

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a transaction, returning its precheck status.
    ///
    /// Anything other than OK means the transaction never reaches consensus.
    async fn submit(&self, transaction: SignedTransaction) -> Result<ResponseCode, ClientError>;

    /// Receipt of a submitted transaction, `None` while not yet final
    async fn get_receipt(&self, id: &TransactionId) -> Result<Option<TransactionReceipt>, ClientError>;

    /// Full record with child records, `None` while not yet final
    async fn get_record(&self, id: &TransactionId) -> Result<Option<TransactionRecord>, ClientError>;

    /// Cost-answer step of a query: precheck status and price
    async fn query_cost(&self, query: &Query) -> Result<QueryAnswer, ClientError>;

    /// Answer a query paid for by `payer`
    async fn query(&self, query: &Query, payer: AccountId, payment: u64) -> Result<QueryAnswer, ClientError>;
}

/// Fixed origin for generated valid-start timestamps (2023-11-14T22:13:20Z)
const VALID_START_ORIGIN_NANOS: u64 = 1_700_000_000 * 1_000_000_000;

/// Hands out unique transaction ids.
///
/// Shared by every spec of a run, so concurrent specs paying from the same
/// account never produce the same id.
#[derive(Debug)]
pub struct TransactionIdFactory {
    next_nanos: AtomicU64,
}

impl TransactionIdFactory {
    pub fn new() -> Self {
        Self::starting_at(VALID_START_ORIGIN_NANOS)
    }

    pub fn starting_at(nanos: u64) -> Self {
        Self {
            next_nanos: AtomicU64::new(nanos),
        }
    }

    pub fn next(&self, payer: AccountId) -> TransactionId {
        let nanos = self.next_nanos.fetch_add(1, Ordering::Relaxed);
        TransactionId::new(payer, Timestamp::from_nanos(nanos))
    }
}

impl Default for TransactionIdFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_unique_per_payer() {
        let factory = TransactionIdFactory::new();
        let payer = AccountId::from_num(2);
        let a = factory.next(payer);
        let b = factory.next(payer);
        assert_ne!(a, b);
        assert!(b.valid_start > a.valid_start);
    }

    #[tokio::test]
    async fn test_ids_unique_across_tasks() {
        let factory = Arc::new(TransactionIdFactory::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let factory = factory.clone();
            handles.push(tokio::spawn(async move {
                (0..50)
                    .map(|_| factory.next(AccountId::from_num(2)))
                    .collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 400);
    }
}

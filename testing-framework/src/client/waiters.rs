// Poll-until-visible waiters.
//
// Consensus is asynchronous to submission, so after a transaction is accepted
// the harness polls until its receipt (and then its record) shows up. Each
// wait is bounded by a timeout on the injected clock; expiry is a Timeout
// failure for the spec.

use super::LedgerClient;
use crate::error::{ClientError, HarnessError};
use crate::orchestrator::Clock;
use hts_common::record::{TransactionReceipt, TransactionRecord};
use hts_common::transaction::TransactionId;
use std::future::Future;
use std::time::Duration;

async fn poll_until<T, F, Fut>(
    clock: &dyn Clock,
    poll_interval: Duration,
    timeout: Duration,
    what: String,
    mut poll: F,
) -> Result<T, HarnessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ClientError>>,
{
    let waiting = async {
        loop {
            match poll().await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                // Polling is a read, transient hiccups just mean "not yet"
                Err(err) if err.is_transient() => {
                    log::debug!("{}: transient error while polling: {}", what, err);
                }
                Err(err) => return Err(HarnessError::from(err).context(&what)),
            }
            clock.sleep(poll_interval).await;
        }
    };

    bounded(clock, timeout, &what, waiting).await?
}

/// Run `request`, giving up once `timeout` has passed on `clock`
pub async fn bounded<T, Fut>(clock: &dyn Clock, timeout: Duration, what: &str, request: Fut) -> Result<T, HarnessError>
where
    Fut: Future<Output = T>,
{
    tokio::select! {
        value = request => Ok(value),
        _ = clock.sleep(timeout) => Err(HarnessError::timeout(format!(
            "{} timed out after {} ms",
            what,
            timeout.as_millis()
        ))),
    }
}

/// Wait for a terminal receipt
pub async fn wait_for_receipt(
    client: &dyn LedgerClient,
    clock: &dyn Clock,
    id: &TransactionId,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<TransactionReceipt, HarnessError> {
    poll_until(clock, poll_interval, timeout, format!("receipt of {}", id), || async {
        let receipt = client.get_receipt(id).await?;
        Ok::<_, ClientError>(receipt.filter(|r| r.status.is_terminal()))
    })
    .await
}

/// Wait for the full record, children included
pub async fn wait_for_record(
    client: &dyn LedgerClient,
    clock: &dyn Clock,
    id: &TransactionId,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<TransactionRecord, HarnessError> {
    poll_until(clock, poll_interval, timeout, format!("record of {}", id), || {
        client.get_record(id)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::orchestrator::PausedClock;
    use async_trait::async_trait;
    use hts_common::query::{Query, QueryAnswer};
    use hts_common::transaction::{SignedTransaction, Timestamp};
    use hts_common::{AccountId, ResponseCode};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Receipt appears after `ready_after` polls
    struct MockProgressingLedger {
        polls: AtomicU32,
        ready_after: u32,
        failure: Option<ClientError>,
    }

    impl MockProgressingLedger {
        fn new(ready_after: u32) -> Self {
            Self {
                polls: AtomicU32::new(0),
                ready_after,
                failure: None,
            }
        }
    }

    #[async_trait]
    impl LedgerClient for MockProgressingLedger {
        async fn submit(&self, _: SignedTransaction) -> Result<ResponseCode, ClientError> {
            Ok(ResponseCode::Ok)
        }

        async fn get_receipt(&self, _: &TransactionId) -> Result<Option<TransactionReceipt>, ClientError> {
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.ready_after {
                Ok(Some(TransactionReceipt::with_status(ResponseCode::Success)))
            } else if n % 2 == 0 {
                Err(ClientError::Busy)
            } else {
                Ok(Some(TransactionReceipt::with_status(ResponseCode::Unknown)))
            }
        }

        async fn get_record(&self, _: &TransactionId) -> Result<Option<TransactionRecord>, ClientError> {
            Ok(None)
        }

        async fn query_cost(&self, _: &Query) -> Result<QueryAnswer, ClientError> {
            Ok(QueryAnswer::rejected(ResponseCode::NotSupported))
        }

        async fn query(&self, _: &Query, _: AccountId, _: u64) -> Result<QueryAnswer, ClientError> {
            Ok(QueryAnswer::rejected(ResponseCode::NotSupported))
        }
    }

    fn id() -> TransactionId {
        TransactionId::new(AccountId::from_num(2), Timestamp::from_nanos(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_receipt_polls_until_terminal() {
        let ledger = MockProgressingLedger::new(5);
        let clock = PausedClock::new();
        let start = clock.now();

        let receipt = wait_for_receipt(
            &ledger,
            &clock,
            &id(),
            Duration::from_millis(50),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(receipt.status, ResponseCode::Success);
        assert_eq!(ledger.polls.load(Ordering::SeqCst), 5);
        assert_eq!(clock.elapsed_since(start), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_record_times_out() {
        let ledger = MockProgressingLedger::new(1);
        let clock = PausedClock::new();
        let err = wait_for_record(
            &ledger,
            &clock,
            &id(),
            Duration::from_millis(50),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(err.message.contains("record of 0.0.2@"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_transport_error_aborts_wait() {
        let mut ledger = MockProgressingLedger::new(1);
        ledger.failure = Some(ClientError::Transport("connection refused".into()));
        let clock = PausedClock::new();
        let err = wait_for_receipt(
            &ledger,
            &clock,
            &id(),
            Duration::from_millis(50),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Transport);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_gives_up_on_silent_request() {
        let clock = PausedClock::new();
        let start = clock.now();
        let err = bounded(&clock, Duration::from_secs(2), "submit", std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(err.message.contains("submit timed out after 2000 ms"));
        assert_eq!(clock.elapsed_since(start), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_passes_through_answer() {
        let answer = bounded(&PausedClock::new(), Duration::from_secs(2), "query", async { 7 }).await;
        assert_eq!(answer.unwrap(), 7);
    }
}

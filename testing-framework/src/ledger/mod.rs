//! In-process test ledger.
//!
//! [`TestLedger`] implements [`LedgerClient`] without any network: accounts,
//! tokens, allowances, associations, KYC, hollow accounts, network
//! properties and records all live in memory behind one lock. Records become
//! visible a fixed finality lag after submission, measured on the injected
//! [`Clock`], so waiter behaviour is deterministic under a paused clock.
//!
//! Contracts are native [`ContractProgram`]s that reach a simulated token
//! service through [`CallFrame::hts`]. This is enough to exercise the
//! harness end to end; it is not an EVM.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hts_testing_framework::prelude::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_transfer_to_alias() {
//!     let ledger = Arc::new(TestLedgerBuilder::new().with_clock(Arc::new(PausedClock::new())).build().unwrap());
//!     let harness = Harness::new(ledger.clone(), clock, ledger.genesis(), HarnessConfig::default()).unwrap();
//!     // Run specs against `harness`...
//! }
//! ```

mod builder;
mod handlers;
pub mod precompile;
pub mod programs;
pub mod state;

pub use builder::TestLedgerBuilder;
pub use precompile::{CallFrame, Revert};
pub use programs::{ContractProgram, ProgramRegistry};
pub use state::LedgerState;

use crate::client::LedgerClient;
use crate::config::HarnessConfig;
use crate::error::ClientError;
use crate::executor::Harness;
use crate::orchestrator::Clock;
use crate::registry::AccountRef;
use async_trait::async_trait;
use handlers::{handle, HandleContext};
use hts_common::abi::ContractAbi;
use hts_common::query::{Query, QueryAnswer, QueryResponse};
use hts_common::record::{TransactionReceipt, TransactionRecord};
use hts_common::transaction::{SignedTransaction, Timestamp, TransactionId};
use hts_common::{AccountId, ResponseCode};
use parking_lot::Mutex;
use state::{Authorizer, FEE_COLLECTOR};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Network fee of every transaction that reaches consensus
pub const TRANSACTION_FEE: u64 = 1_000_000;
/// Price of every query except balance lookups
pub const QUERY_FEE: u64 = 10_000;
/// Distance between consecutive parent timestamps; leaves room for children
const CONSENSUS_STEP_NANOS: u64 = 1_000;
/// First consensus timestamp (2024-01-01T00:00:00Z)
const CONSENSUS_ORIGIN_NANOS: u64 = 1_704_067_200 * 1_000_000_000;

struct StoredRecord {
    record: TransactionRecord,
    visible_at: Instant,
}

struct Inner {
    state: LedgerState,
    records: HashMap<TransactionId, StoredRecord>,
    last_consensus: u64,
}

impl Inner {
    /// Parent record, or one of its children
    fn find(&self, id: &TransactionId) -> Option<(&TransactionRecord, Instant)> {
        let stored = self.records.get(&id.parent())?;
        if !id.is_child() {
            return Some((&stored.record, stored.visible_at));
        }
        stored
            .record
            .children
            .iter()
            .find(|child| child.transaction_id == *id)
            .map(|child| (child, stored.visible_at))
    }

    fn charge(&mut self, payer: AccountId, fee: u64) -> u64 {
        let Some(account) = self.state.accounts.get_mut(&payer) else {
            return 0;
        };
        let charged = fee.min(account.balance);
        account.balance -= charged;
        if let Some(collector) = self.state.accounts.get_mut(&FEE_COLLECTOR) {
            collector.balance = collector.balance.saturating_add(charged);
        }
        charged
    }
}

/// In-process ledger for harness runs and tests
pub struct TestLedger {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    finality_lag: Duration,
    programs: ProgramRegistry,
    hts: ContractAbi,
    genesis: AccountRef,
}

impl TestLedger {
    /// Use [`TestLedgerBuilder`] instead
    pub(crate) fn new(
        state: LedgerState,
        clock: Arc<dyn Clock>,
        finality_lag: Duration,
        programs: ProgramRegistry,
        hts: ContractAbi,
        genesis: AccountRef,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                records: HashMap::new(),
                last_consensus: CONSENSUS_ORIGIN_NANOS,
            }),
            clock,
            finality_lag,
            programs,
            hts,
            genesis,
        }
    }

    /// The genesis account with its signing key
    pub fn genesis(&self) -> AccountRef {
        self.genesis.clone()
    }

    /// Copy of the committed state, for direct assertions
    pub fn state(&self) -> LedgerState {
        self.inner.lock().state.clone()
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.inner.lock().state.property(key).map(str::to_string)
    }

    pub fn record_count(&self) -> usize {
        self.inner.lock().records.len()
    }

    fn precheck(&self, inner: &Inner, transaction: &SignedTransaction, verified: &[Vec<u8>]) -> ResponseCode {
        let id = transaction.id();
        if inner.records.contains_key(&id) {
            return ResponseCode::DuplicateTransaction;
        }
        let Some(payer) = inner.state.accounts.get(&id.payer) else {
            return ResponseCode::PayerAccountNotFound;
        };
        let auth = Authorizer::Signatures {
            verified,
            payer: id.payer,
        };
        if !auth.is_active(&payer.key) {
            return ResponseCode::InvalidSignature;
        }
        if transaction.body.max_fee < TRANSACTION_FEE {
            return ResponseCode::InsufficientTxFee;
        }
        if payer.balance < TRANSACTION_FEE {
            return ResponseCode::InsufficientPayerBalance;
        }
        ResponseCode::Ok
    }

    fn process(&self, transaction: SignedTransaction) -> ResponseCode {
        let id = transaction.id();
        let verified = transaction.verified_keys();
        let mut inner = self.inner.lock();

        let precheck = self.precheck(&inner, &transaction, &verified);
        if precheck != ResponseCode::Ok {
            log::debug!("{} {} rejected at precheck: {}", transaction.body.data.kind(), id, precheck);
            return precheck;
        }

        inner.last_consensus += CONSENSUS_STEP_NANOS;
        let consensus = Timestamp::from_nanos(inner.last_consensus);
        let body = &transaction.body;
        let ctx = HandleContext {
            transaction_id: id,
            consensus,
            verified: &verified,
            programs: &self.programs,
            hts: &self.hts,
        };

        let mut working = inner.state.clone();
        let mut record = TransactionRecord::new(id, ResponseCode::Success, consensus);
        if let Err(status) = handle(&mut working, &ctx, &body.data, &mut record) {
            record = TransactionRecord::new(id, status, consensus);
        }
        if record.status() == ResponseCode::Success {
            inner.state = working;
        }
        record.memo = body.memo.clone();
        record.transaction_fee = inner.charge(id.payer, TRANSACTION_FEE);

        log::debug!(
            "{} {} -> {} ({} children)",
            body.data.kind(),
            id,
            record.status(),
            record.children.len()
        );
        inner.records.insert(
            id,
            StoredRecord {
                record,
                visible_at: self.clock.now() + self.finality_lag,
            },
        );
        ResponseCode::Ok
    }

    fn answer(&self, inner: &Inner, query: &Query) -> Result<QueryResponse, ResponseCode> {
        let state = &inner.state;
        Ok(match query {
            Query::AccountBalance(lookup) => QueryResponse::AccountBalance(state.balance(state.lookup(lookup)?)?),
            Query::AccountInfo(lookup) => {
                QueryResponse::AccountInfo(Box::new(state.account_info(state.lookup(lookup)?)?))
            }
            Query::TokenInfo(token) => QueryResponse::TokenInfo(Box::new(state.token_info(*token)?)),
            Query::ContractInfo(contract) => QueryResponse::ContractInfo(Box::new(state.contract_info(*contract)?)),
            Query::TransactionRecord {
                transaction_id,
                include_children,
            } => {
                let (record, visible_at) = inner.find(transaction_id).ok_or(ResponseCode::RecordNotFound)?;
                if self.clock.now() < visible_at {
                    return Err(ResponseCode::RecordNotFound);
                }
                let mut record = record.clone();
                if !include_children {
                    record.children.clear();
                }
                QueryResponse::TransactionRecord(Box::new(record))
            }
            Query::NetworkProperties(keys) => QueryResponse::NetworkProperties(
                state
                    .properties
                    .iter()
                    .filter(|(key, _)| keys.is_empty() || keys.contains(key))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
        })
    }
}

#[async_trait]
impl LedgerClient for TestLedger {
    async fn submit(&self, transaction: SignedTransaction) -> Result<ResponseCode, ClientError> {
        Ok(self.process(transaction))
    }

    async fn get_receipt(&self, id: &TransactionId) -> Result<Option<TransactionReceipt>, ClientError> {
        let inner = self.inner.lock();
        Ok(inner.find(id).map(|(record, visible_at)| {
            if self.clock.now() < visible_at {
                TransactionReceipt::with_status(ResponseCode::Unknown)
            } else {
                record.receipt.clone()
            }
        }))
    }

    async fn get_record(&self, id: &TransactionId) -> Result<Option<TransactionRecord>, ClientError> {
        let inner = self.inner.lock();
        Ok(inner
            .find(id)
            .filter(|(_, visible_at)| self.clock.now() >= *visible_at)
            .map(|(record, _)| record.clone()))
    }

    async fn query_cost(&self, query: &Query) -> Result<QueryAnswer, ClientError> {
        let inner = self.inner.lock();
        Ok(match self.answer(&inner, query) {
            Ok(_) => QueryAnswer {
                precheck: ResponseCode::Ok,
                cost: if query.is_free() { 0 } else { QUERY_FEE },
                response: None,
            },
            Err(status) => QueryAnswer::rejected(status),
        })
    }

    async fn query(&self, query: &Query, payer: AccountId, payment: u64) -> Result<QueryAnswer, ClientError> {
        let mut inner = self.inner.lock();
        let Some(account) = inner.state.accounts.get(&payer) else {
            return Ok(QueryAnswer::rejected(ResponseCode::PayerAccountNotFound));
        };
        let cost = if query.is_free() { 0 } else { QUERY_FEE };
        if payment < cost {
            return Ok(QueryAnswer::rejected(ResponseCode::InsufficientTxFee));
        }
        if account.balance < payment {
            return Ok(QueryAnswer::rejected(ResponseCode::InsufficientPayerBalance));
        }
        inner.charge(payer, payment);
        Ok(match self.answer(&inner, query) {
            Ok(response) => QueryAnswer::ok(cost, response),
            Err(status) => QueryAnswer::rejected(status),
        })
    }
}

/// A harness wired to a fresh in-process ledger sharing `clock`
///
/// # Example
///
/// ```
/// use hts_testing_framework::prelude::*;
///
/// # tokio_test::block_on(async {
/// let (harness, ledger) = in_process_harness(HarnessConfig::default(), Arc::new(SystemClock)).unwrap();
/// let spec = Spec::new("create").when(ops![crypto_create("alice", CryptoCreateOptions::with_balance(ONE_HBAR))]);
/// let report = SuiteRunner::new(&harness).run(Suite::new("smoke", vec![spec])).await;
/// assert!(report.is_success());
/// assert_eq!(ledger.record_count(), 1);
/// # });
/// ```
pub fn in_process_harness(
    config: HarnessConfig,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<(Harness, Arc<TestLedger>)> {
    let ledger = Arc::new(TestLedgerBuilder::new().with_clock(clock.clone()).build()?);
    let harness = Harness::new(ledger.clone(), clock, ledger.genesis(), config)?;
    Ok((harness, ledger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::PausedClock;
    use hts_common::crypto::KeyMaterial;
    use hts_common::query::AccountLookup;
    use hts_common::transaction::{
        AccountAmount, CryptoCreatePayload, CryptoTransferPayload, TransactionBody, TransactionData,
    };
    use hts_common::ONE_HBAR;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ledger(lag: Duration) -> TestLedger {
        TestLedgerBuilder::new()
            .with_clock(Arc::new(PausedClock::new()))
            .with_finality_lag(lag)
            .build()
            .unwrap()
    }

    fn body(ledger: &TestLedger, nanos: u64, data: TransactionData) -> TransactionBody {
        TransactionBody {
            transaction_id: TransactionId::new(ledger.genesis().id, Timestamp::from_nanos(nanos)),
            max_fee: 2 * ONE_HBAR,
            memo: String::new(),
            data,
        }
    }

    fn create(key: &KeyMaterial, balance: u64) -> TransactionData {
        TransactionData::CryptoCreate(CryptoCreatePayload {
            key: key.key().clone(),
            initial_balance: balance,
            receiver_sig_required: false,
            max_automatic_token_associations: 0,
            memo: String::new(),
            alias: None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_precheck_rejections() {
        let ledger = ledger(Duration::ZERO);
        let genesis = ledger.genesis();
        let stranger = KeyMaterial::generate(&mut StdRng::seed_from_u64(9));

        let unsigned = SignedTransaction::sign(body(&ledger, 1, create(&stranger, 0)), [&stranger]).unwrap();
        assert_eq!(ledger.submit(unsigned).await.unwrap(), ResponseCode::InvalidSignature);

        let mut cheap = body(&ledger, 2, create(&stranger, 0));
        cheap.max_fee = 1;
        let cheap = SignedTransaction::sign(cheap, [&genesis.key]).unwrap();
        assert_eq!(ledger.submit(cheap).await.unwrap(), ResponseCode::InsufficientTxFee);

        let ok = SignedTransaction::sign(body(&ledger, 3, create(&stranger, 0)), [&genesis.key]).unwrap();
        assert_eq!(ledger.submit(ok.clone()).await.unwrap(), ResponseCode::Ok);
        assert_eq!(ledger.submit(ok).await.unwrap(), ResponseCode::DuplicateTransaction);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_visible_after_finality_lag() {
        let clock = Arc::new(PausedClock::new());
        let ledger = TestLedgerBuilder::new()
            .with_clock(clock.clone())
            .with_finality_lag(Duration::from_millis(200))
            .build()
            .unwrap();
        let genesis = ledger.genesis();
        let key = KeyMaterial::generate(&mut StdRng::seed_from_u64(1));
        let signed = SignedTransaction::sign(body(&ledger, 10, create(&key, ONE_HBAR)), [&genesis.key]).unwrap();
        let id = signed.id();
        ledger.submit(signed).await.unwrap();

        let pending = ledger.get_receipt(&id).await.unwrap().unwrap();
        assert_eq!(pending.status, ResponseCode::Unknown);
        assert!(ledger.get_record(&id).await.unwrap().is_none());

        clock.advance(Duration::from_millis(200)).await;
        let record = ledger.get_record(&id).await.unwrap().unwrap();
        assert_eq!(record.status(), ResponseCode::Success);
        assert_eq!(record.transaction_fee, TRANSACTION_FEE);
        let account = record.receipt.account_id.unwrap();
        let answer = ledger
            .query(&Query::AccountBalance(AccountLookup::Id(account)), genesis.id, 0)
            .await
            .unwrap();
        assert_eq!(
            answer.response,
            Some(QueryResponse::AccountBalance(hts_common::query::AccountBalance {
                account,
                hbars: ONE_HBAR,
                tokens: Default::default(),
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_transaction_charges_fee_and_keeps_state() {
        let ledger = ledger(Duration::ZERO);
        let genesis = ledger.genesis();
        let before = ledger.state().account(&genesis.id).unwrap().balance;
        let data = TransactionData::CryptoTransfer(CryptoTransferPayload {
            hbar_transfers: vec![
                AccountAmount::new(genesis.id, -5),
                AccountAmount::new(AccountId::from_num(4242), 5),
            ],
            token_transfers: Vec::new(),
        });
        let signed = SignedTransaction::sign(body(&ledger, 20, data), [&genesis.key]).unwrap();
        let id = signed.id();
        assert_eq!(ledger.submit(signed).await.unwrap(), ResponseCode::Ok);

        let record = ledger.get_record(&id).await.unwrap().unwrap();
        assert_eq!(record.status(), ResponseCode::InvalidAccountId);
        assert_eq!(ledger.state().account(&genesis.id).unwrap().balance, before - TRANSACTION_FEE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_cost_rejects_unknown_entities() {
        let ledger = ledger(Duration::ZERO);
        let unknown = Query::AccountInfo(AccountLookup::Id(AccountId::from_num(9999)));
        assert_eq!(
            ledger.query_cost(&unknown).await.unwrap().precheck,
            ResponseCode::InvalidAccountId
        );
        let properties = Query::NetworkProperties(vec![state::LAZY_CREATION_ENABLED.to_string()]);
        let cost = ledger.query_cost(&properties).await.unwrap();
        assert_eq!(cost.cost, QUERY_FEE);
        let answer = ledger
            .query(&properties, ledger.genesis().id, QUERY_FEE - 1)
            .await
            .unwrap();
        assert_eq!(answer.precheck, ResponseCode::InsufficientTxFee);
    }
}

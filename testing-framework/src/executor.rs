//! Operation executor.
//!
//! A [`Harness`] holds what every spec of a run shares: the ledger client,
//! the clock, the configuration, the transaction id factory and the contract
//! ABIs. A [`SpecContext`] is the per-spec half: its registry, its RNG stream,
//! its log lines and the status counts shown in reports. Operations run
//! against a context one at a time, in declaration order.

use crate::assertions::{match_child_records, match_status};
use crate::client::{bounded, retry_idempotent, wait_for_receipt, wait_for_record, LedgerClient, RetryPolicy, TransactionIdFactory};
use crate::config::HarnessConfig;
use crate::contracts::{AbiCatalog, CONSTRUCTOR};
use crate::error::{HarnessError, HarnessResult};
use crate::ops::contract::resolve_all;
use crate::ops::{
    AccountSelector, AssertionOp, ContractCallOp, CreateOp, KeyShape, Movement, NewEntity, Operation, QueryExpectation,
    QueryOp, QueryTarget, RecordExposure, TxnAction, TxnOp, TxnOptions,
};
use crate::ops::crypto::Allowance;
use crate::orchestrator::{Clock, TestRng};
use crate::registry::{AccountRef, ContractRef, Registry, RegistryValue, TokenRef};
use futures::future::BoxFuture;
use hts_common::abi::encode;
use hts_common::crypto::{KeyMaterial, PrivateKey};
use hts_common::query::{AccountLookup, Query, QueryResponse};
use hts_common::record::TransactionRecord;
use hts_common::transaction::*;
use hts_common::{AccountId, ResponseCode, TokenId};
use rand::RngCore;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct Harness {
    client: Arc<dyn LedgerClient>,
    clock: Arc<dyn Clock>,
    config: HarnessConfig,
    ids: Arc<TransactionIdFactory>,
    genesis: AccountRef,
    abis: AbiCatalog,
    rng: TestRng,
}

impl Harness {
    /// The RNG is seeded from `config.seed`, else from `HTS_TEST_SEED`, else randomly
    pub fn new(
        client: Arc<dyn LedgerClient>,
        clock: Arc<dyn Clock>,
        genesis: AccountRef,
        config: HarnessConfig,
    ) -> HarnessResult<Self> {
        let rng = match config.seed {
            Some(seed) => TestRng::with_seed(seed),
            None => TestRng::new_from_env_or_random(),
        };
        Ok(Self {
            client,
            clock,
            config,
            ids: Arc::new(TransactionIdFactory::new()),
            genesis,
            abis: AbiCatalog::builtin()?,
            rng,
        })
    }

    pub fn with_rng(mut self, rng: TestRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_abis(mut self, abis: AbiCatalog) -> Self {
        self.abis = abis;
        self
    }

    pub fn with_id_factory(mut self, ids: Arc<TransactionIdFactory>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn client(&self) -> &dyn LedgerClient {
        self.client.as_ref()
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    pub fn abis(&self) -> &AbiCatalog {
        &self.abis
    }

    pub fn genesis(&self) -> &AccountRef {
        &self.genesis
    }

    /// Fresh context for one run of the spec `name`
    pub fn context(&self, name: &str) -> SpecContext<'_> {
        SpecContext {
            harness: self,
            spec_name: name.to_string(),
            registry: Registry::with_genesis(self.genesis.clone()),
            rng: self.rng.derive(name),
            log: Vec::new(),
            precheck_counts: BTreeMap::new(),
            status_counts: BTreeMap::new(),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.query_retries, self.config.query_retry_backoff)
    }
}

/// Transaction data plus whoever must sign it besides the payer
struct Submission {
    data: TransactionData,
    signers: Vec<String>,
    extra_keys: Vec<KeyMaterial>,
}

impl Submission {
    fn new(data: TransactionData, signers: Vec<String>) -> Self {
        Self {
            data,
            signers,
            extra_keys: Vec::new(),
        }
    }
}

pub struct SpecContext<'h> {
    harness: &'h Harness,
    spec_name: String,
    registry: Registry,
    rng: TestRng,
    log: Vec<String>,
    precheck_counts: BTreeMap<ResponseCode, u32>,
    status_counts: BTreeMap<ResponseCode, u32>,
}

impl<'h> SpecContext<'h> {
    pub fn spec_name(&self) -> &str {
        &self.spec_name
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn log_lines(&self) -> &[String] {
        &self.log
    }

    pub fn precheck_counts(&self) -> &BTreeMap<ResponseCode, u32> {
        &self.precheck_counts
    }

    pub fn status_counts(&self) -> &BTreeMap<ResponseCode, u32> {
        &self.status_counts
    }

    pub fn note(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    /// Run one operation; a composite stops at its first failing child
    pub fn execute(&mut self, op: Operation) -> BoxFuture<'_, HarnessResult<()>> {
        Box::pin(async move {
            let description = op.describe();
            log::debug!("'{}' running {}", self.spec_name, description);
            self.note(format!("run {}", description));
            match op {
                Operation::Create(op) => self.create(op).await,
                Operation::Transact(op) => self.transact(op).await,
                Operation::ContractCall(op) => self.contract_call(op).await,
                Operation::Query(op) => self.query(op).await,
                Operation::Assertion(op) => self.assertion(op).await,
                Operation::Composite(ops) => {
                    for op in ops {
                        self.execute(op).await?;
                    }
                    Ok(())
                }
                Operation::Deferred { label, build } => {
                    let op = build(&self.registry).map_err(|e| e.context(format!("building '{}'", label)))?;
                    self.execute(op).await
                }
            }
        })
    }

    async fn create(&mut self, op: CreateOp) -> HarnessResult<()> {
        let CreateOp {
            name,
            entity,
            options,
            exposures,
        } = op;
        match entity {
            NewEntity::Key(shape) => {
                let key = self.new_key(&shape)?;
                self.registry.put(&name, RegistryValue::Key(key))?;
                Ok(())
            }
            NewEntity::Account(create) => {
                let (key, alias) = match &create.alias_key {
                    Some(alias_key) => {
                        let key = self.registry.signing_key(alias_key)?.clone();
                        let alias = key.evm_address().ok_or_else(|| {
                            HarnessError::authoring(format!("key '{}' has no EVM alias", alias_key))
                        })?;
                        (key, Some(alias))
                    }
                    None => match &create.key {
                        Some(key) => (self.registry.signing_key(key)?.clone(), None),
                        None => (self.generate_key(), None),
                    },
                };
                let data = TransactionData::CryptoCreate(CryptoCreatePayload {
                    key: key.key().clone(),
                    initial_balance: create.balance,
                    receiver_sig_required: create.receiver_sig_required,
                    max_automatic_token_associations: create.max_automatic_token_associations,
                    memo: create.memo.clone(),
                    alias,
                });
                let mut submission = Submission::new(data, Vec::new());
                submission.extra_keys.push(key.clone());
                let Some(record) = self.submit(&format!("cryptoCreate '{}'", name), submission, &options).await?
                else {
                    return Ok(());
                };
                if !created(&record) {
                    return Ok(());
                }
                let id = record
                    .receipt
                    .account_id
                    .ok_or_else(|| HarnessError::transport(format!("receipt of '{}' carries no account id", name)))?;
                let mut account = AccountRef::new(id, key);
                account.alias = alias;
                self.registry.put(&name, RegistryValue::Account(account))?;
                self.expose(&record, exposures)
            }
            NewEntity::Token(create) => {
                let treasury_name = match &create.treasury {
                    Some(treasury) => treasury.clone(),
                    None => self.payer_name(&options),
                };
                let treasury = self.registry.account_id(&treasury_name)?;
                let key_of = |name: &Option<String>| -> HarnessResult<_> {
                    name.as_ref()
                        .map(|n| Ok(self.registry.signing_key(n)?.key().clone()))
                        .transpose()
                };
                let data = TransactionData::TokenCreate(TokenCreatePayload {
                    name: create.token_name.clone(),
                    symbol: create.symbol.clone(),
                    token_type: create.token_type,
                    decimals: create.decimals,
                    initial_supply: create.initial_supply,
                    treasury,
                    admin_key: key_of(&create.admin_key)?,
                    supply_key: key_of(&create.supply_key)?,
                    kyc_key: key_of(&create.kyc_key)?,
                    memo: String::new(),
                });
                let mut signers = vec![treasury_name];
                signers.extend(create.admin_key.clone());
                let submission = Submission::new(data, signers);
                let Some(record) = self.submit(&format!("tokenCreate '{}'", name), submission, &options).await?
                else {
                    return Ok(());
                };
                if !created(&record) {
                    return Ok(());
                }
                let id = record
                    .receipt
                    .token_id
                    .ok_or_else(|| HarnessError::transport(format!("receipt of '{}' carries no token id", name)))?;
                self.registry.put(
                    &name,
                    RegistryValue::Token(TokenRef {
                        id,
                        token_type: create.token_type,
                        treasury,
                        admin_key: create.admin_key.clone(),
                        supply_key: create.supply_key.clone(),
                        kyc_key: create.kyc_key.clone(),
                    }),
                )?;
                if let Some(address_name) = &create.expose_address {
                    self.registry
                        .put(address_name, RegistryValue::Address(id.to_mirror_address()))?;
                }
                self.expose(&record, exposures)
            }
            NewEntity::Contract(create) => {
                let abi = self.harness.abis.get(&create.program)?;
                let args = resolve_all(&create.constructor_args, &self.registry)?;
                let constructor_parameters = match abi.function(CONSTRUCTOR) {
                    Ok(constructor) => encode(&constructor.inputs, &args)?,
                    Err(_) if args.is_empty() => Vec::new(),
                    Err(err) => return Err(err.into()),
                };
                let admin_key = create
                    .admin_key
                    .as_ref()
                    .map(|n| Ok::<_, HarnessError>(self.registry.signing_key(n)?.key().clone()))
                    .transpose()?;
                let data = TransactionData::ContractCreate(ContractCreatePayload {
                    program: create.program.clone(),
                    gas: create.gas.unwrap_or(self.harness.config.default_gas),
                    initial_balance: create.balance,
                    admin_key,
                    max_automatic_token_associations: create.max_automatic_token_associations,
                    memo: create.memo.clone(),
                    constructor_parameters,
                });
                let submission = Submission::new(data, create.admin_key.iter().cloned().collect());
                let Some(record) = self.submit(&format!("contractCreate '{}'", name), submission, &options).await?
                else {
                    return Ok(());
                };
                if !created(&record) {
                    return Ok(());
                }
                let id = record
                    .receipt
                    .contract_id
                    .ok_or_else(|| HarnessError::transport(format!("receipt of '{}' carries no contract id", name)))?;
                self.registry.put(
                    &name,
                    RegistryValue::Contract(ContractRef {
                        id,
                        program: create.program.clone(),
                        abi,
                        admin_key: create.admin_key.clone(),
                    }),
                )?;
                if let Some(address_name) = &create.expose_address {
                    self.registry
                        .put(address_name, RegistryValue::Address(id.to_mirror_address()))?;
                }
                self.expose(&record, exposures)
            }
        }
    }

    fn generate_key(&self) -> KeyMaterial {
        self.rng.with_rng(|mut rng: &mut dyn RngCore| KeyMaterial::generate(&mut rng))
    }

    fn new_key(&self, shape: &KeyShape) -> HarnessResult<KeyMaterial> {
        Ok(match shape {
            KeyShape::Secp256k1 => self.generate_key(),
            KeyShape::Delegate { contract } => {
                let contract = self.registry.contract_id(contract)?;
                let private_key = self.rng.with_rng(|mut rng: &mut dyn RngCore| PrivateKey::generate(&mut rng));
                KeyMaterial::delegate(private_key, contract)
            }
            KeyShape::ContractId { contract } => KeyMaterial::contract(self.registry.contract_id(contract)?),
        })
    }

    async fn transact(&mut self, op: TxnOp) -> HarnessResult<()> {
        let submission = self.resolve_action(&op.action)?;
        let Some(record) = self.submit(op.action.name(), submission, &op.options).await? else {
            return Ok(());
        };
        if let TxnAction::CryptoUpdate {
            account,
            key: Some(key),
            ..
        } = &op.action
        {
            let key = self.registry.signing_key(key)?.clone();
            self.registry.rebind_account_key(account, key)?;
        }
        self.expose(&record, op.exposures)
    }

    fn resolve_action(&self, action: &TxnAction) -> HarnessResult<Submission> {
        let registry = &self.registry;
        Ok(match action {
            TxnAction::CryptoUpdate {
                account,
                key,
                receiver_sig_required,
                max_automatic_token_associations,
                memo,
            } => {
                let new_key = key
                    .as_ref()
                    .map(|k| Ok::<_, HarnessError>(registry.signing_key(k)?.key().clone()))
                    .transpose()?;
                let mut signers = vec![account.clone()];
                signers.extend(key.clone());
                Submission::new(
                    TransactionData::CryptoUpdate(CryptoUpdatePayload {
                        account: registry.account_id(account)?,
                        key: new_key,
                        receiver_sig_required: *receiver_sig_required,
                        max_automatic_token_associations: *max_automatic_token_associations,
                        memo: memo.clone(),
                    }),
                    signers,
                )
            }
            TxnAction::CryptoTransfer(movements) => {
                let mut payload = CryptoTransferPayload::default();
                let mut lists: BTreeMap<TokenId, TokenTransferList> = BTreeMap::new();
                for movement in movements {
                    match movement {
                        Movement::Hbar { from, to, amount } => {
                            let amount = signed(*amount)?;
                            payload
                                .hbar_transfers
                                .push(AccountAmount::new(registry.account_id(from)?, -amount));
                            payload
                                .hbar_transfers
                                .push(AccountAmount::new(registry.account_id(to)?, amount));
                        }
                        Movement::Token { token, from, to, amount } => {
                            let token = registry.token_id(token)?;
                            let amount = signed(*amount)?;
                            let list = lists
                                .entry(token)
                                .or_insert_with(|| TokenTransferList::fungible(token, Vec::new()));
                            list.transfers.push(AccountAmount::new(registry.account_id(from)?, -amount));
                            list.transfers.push(AccountAmount::new(registry.account_id(to)?, amount));
                        }
                        Movement::Nft { token, from, to, serial } => {
                            let token = registry.token_id(token)?;
                            let list = lists
                                .entry(token)
                                .or_insert_with(|| TokenTransferList::nft(token, Vec::new()));
                            list.nft_transfers.push(NftTransfer {
                                sender: registry.account_id(from)?,
                                receiver: registry.account_id(to)?,
                                serial_number: *serial,
                                is_approval: false,
                            });
                        }
                    }
                }
                payload.token_transfers = lists.into_values().collect();
                let signers = unique(movements.iter().map(Movement::sender));
                Submission::new(TransactionData::CryptoTransfer(payload), signers)
            }
            TxnAction::ApproveAllowance(allowances) => {
                let mut payload = CryptoApproveAllowancePayload::default();
                for allowance in allowances {
                    match allowance {
                        Allowance::Hbar { owner, spender, amount } => payload.crypto_allowances.push(CryptoAllowance {
                            owner: registry.account_id(owner)?,
                            spender: registry.account_id(spender)?,
                            amount: *amount,
                        }),
                        Allowance::Token {
                            owner,
                            token,
                            spender,
                            amount,
                        } => payload.token_allowances.push(TokenAllowance {
                            token: registry.token_id(token)?,
                            owner: registry.account_id(owner)?,
                            spender: registry.account_id(spender)?,
                            amount: *amount,
                        }),
                        Allowance::Nft {
                            owner,
                            token,
                            spender,
                            serial_numbers,
                            approved_for_all,
                        } => payload.nft_allowances.push(NftAllowance {
                            token: registry.token_id(token)?,
                            owner: registry.account_id(owner)?,
                            spender: registry.account_id(spender)?,
                            serial_numbers: serial_numbers.clone(),
                            approved_for_all: *approved_for_all,
                        }),
                    }
                }
                let signers = unique(allowances.iter().map(Allowance::owner));
                Submission::new(TransactionData::CryptoApproveAllowance(payload), signers)
            }
            TxnAction::TokenAssociate { account, tokens } | TxnAction::TokenDissociate { account, tokens } => {
                let payload = TokenAssociationPayload {
                    account: registry.account_id(account)?,
                    tokens: tokens
                        .iter()
                        .map(|t| registry.token_id(t))
                        .collect::<Result<_, _>>()?,
                };
                let data = match action {
                    TxnAction::TokenAssociate { .. } => TransactionData::TokenAssociate(payload),
                    _ => TransactionData::TokenDissociate(payload),
                };
                Submission::new(data, vec![account.clone()])
            }
            TxnAction::MintToken {
                token,
                amount,
                metadata,
            } => {
                let token_ref = registry.token(token)?;
                Submission::new(
                    TransactionData::TokenMint(TokenMintPayload {
                        token: token_ref.id,
                        amount: *amount,
                        metadata: metadata.clone(),
                    }),
                    token_ref.supply_key.iter().cloned().collect(),
                )
            }
            TxnAction::BurnToken {
                token,
                amount,
                serial_numbers,
            } => {
                let token_ref = registry.token(token)?;
                Submission::new(
                    TransactionData::TokenBurn(TokenBurnPayload {
                        token: token_ref.id,
                        amount: *amount,
                        serial_numbers: serial_numbers.clone(),
                    }),
                    token_ref.supply_key.iter().cloned().collect(),
                )
            }
            TxnAction::GrantKyc { token, account } | TxnAction::RevokeKyc { token, account } => {
                let token_ref = registry.token(token)?;
                let payload = TokenKycPayload {
                    token: token_ref.id,
                    account: registry.account_id(account)?,
                };
                let data = match action {
                    TxnAction::GrantKyc { .. } => TransactionData::TokenGrantKyc(payload),
                    _ => TransactionData::TokenRevokeKyc(payload),
                };
                Submission::new(data, token_ref.kyc_key.iter().cloned().collect())
            }
            TxnAction::NetworkProperties { set, reset } => Submission::new(
                TransactionData::NetworkProperties(NetworkPropertiesPayload {
                    set: set.clone(),
                    reset: reset.clone(),
                }),
                Vec::new(),
            ),
        })
    }

    async fn contract_call(&mut self, op: ContractCallOp) -> HarnessResult<()> {
        let contract = self.registry.contract(&op.contract)?;
        let function = contract.abi.function(&op.function)?;
        let args = resolve_all(&op.args, &self.registry)?;
        let data = TransactionData::ContractCall(ContractCallPayload {
            contract: contract.id,
            gas: op.call.gas.unwrap_or(self.harness.config.default_gas),
            amount: op.call.value,
            function_parameters: function.encode_input(&args)?,
        });
        let what = format!("{}.{}", op.contract, op.function);
        let Some(record) = self.submit(&what, Submission::new(data, Vec::new()), &op.options).await? else {
            return Ok(());
        };
        self.expose(&record, op.exposures)
    }

    fn payer_name(&self, options: &TxnOptions) -> String {
        options
            .payer
            .clone()
            .unwrap_or_else(|| self.harness.config.default_payer.clone())
    }

    /// Sign, submit and wait for the record.
    ///
    /// `None` when the transaction was rejected at precheck as expected.
    async fn submit(
        &mut self,
        what: &str,
        submission: Submission,
        options: &TxnOptions,
    ) -> HarnessResult<Option<TransactionRecord>> {
        let harness = self.harness;
        let payer = self.payer_name(options);
        let transaction_id = harness.ids.next(self.registry.account_id(&payer)?);

        let mut signer_names = match &options.signers {
            Some(signers) => signers.clone(),
            None => {
                let mut names = vec![payer];
                names.extend(submission.signers);
                names
            }
        };
        signer_names.extend(options.extra_signers.iter().cloned());
        let mut keys = Vec::new();
        for name in unique(signer_names.iter().map(String::as_str)) {
            keys.push(self.registry.signing_key(&name)?.clone());
        }
        keys.extend(submission.extra_keys);

        let body = TransactionBody {
            transaction_id,
            max_fee: options.fee.unwrap_or(harness.config.default_fee),
            memo: options.memo.clone().unwrap_or_default(),
            data: submission.data,
        };
        let signed = SignedTransaction::sign(body, keys.iter())?;

        let client = harness.client.as_ref();
        let clock = harness.clock.as_ref();
        let timeout = harness.config.record_timeout;
        let precheck = bounded(clock, timeout, &format!("{} submit", what), client.submit(signed))
            .await?
            .map_err(|e| HarnessError::from(e).context(what))?;
        *self.precheck_counts.entry(precheck).or_insert(0) += 1;
        if let Some(mismatch) = match_status("precheck", options.expected_precheck, precheck) {
            return Err(HarnessError::mismatches(format!("{} {}", what, transaction_id), vec![mismatch]));
        }
        if precheck != ResponseCode::Ok {
            self.note(format!("{} rejected at precheck with {}", what, precheck));
            return Ok(None);
        }

        let poll = harness.config.poll_interval;
        wait_for_receipt(client, clock, &transaction_id, poll, timeout).await?;
        let record = wait_for_record(client, clock, &transaction_id, poll, timeout).await?;

        *self.status_counts.entry(record.status()).or_insert(0) += 1;
        self.note(format!("{} {} -> {}", what, transaction_id, record.status()));
        if options.logged {
            log::info!("'{}' {} record: {}", self.spec_name, what, serde_json::to_string_pretty(&record)?);
        }
        if let Some(via) = &options.via {
            self.registry.put(via, RegistryValue::Record(Box::new(record.clone())))?;
        }
        if let Some(mismatch) = match_status("status", options.expected_status, record.status()) {
            return Err(HarnessError::mismatches(format!("{} {}", what, transaction_id), vec![mismatch]));
        }
        Ok(Some(record))
    }

    fn expose(&mut self, record: &TransactionRecord, exposures: Vec<RecordExposure>) -> HarnessResult<()> {
        for exposure in exposures {
            exposure(record, &mut self.registry)?;
        }
        Ok(())
    }

    fn resolve_query(&self, target: &QueryTarget) -> HarnessResult<Query> {
        let lookup = |who: &AccountSelector| -> HarnessResult<AccountLookup> {
            Ok(match who {
                AccountSelector::Named(name) => AccountLookup::Id(self.registry.account_id(name)?),
                AccountSelector::Alias(name) => AccountLookup::Alias(self.registry.address_of(name)?),
            })
        };
        Ok(match target {
            QueryTarget::AccountBalance(who) => Query::AccountBalance(lookup(who)?),
            QueryTarget::AccountInfo(who) => Query::AccountInfo(lookup(who)?),
            QueryTarget::TokenInfo(token) => Query::TokenInfo(self.registry.token_id(token)?),
            QueryTarget::ContractInfo(contract) => Query::ContractInfo(self.registry.contract_id(contract)?),
            QueryTarget::TxnRecord { txn, include_children } => Query::TransactionRecord {
                transaction_id: self.registry.record(txn)?.transaction_id,
                include_children: *include_children,
            },
            QueryTarget::NetworkProperties(keys) => Query::NetworkProperties(keys.clone()),
        })
    }

    /// Cost step (unless free), then answer step; both retried on transient errors.
    ///
    /// `None` when either step was rejected with the expected precheck.
    async fn run_query(
        &mut self,
        query: &Query,
        payer: AccountId,
        expected_precheck: ResponseCode,
    ) -> HarnessResult<Option<QueryResponse>> {
        let harness = self.harness;
        let client = harness.client.as_ref();
        let clock = harness.clock.as_ref();
        let policy = harness.retry_policy();
        let timeout = harness.config.record_timeout;
        let what = query.as_ref().to_string();

        let cost = if query.is_free() {
            0
        } else {
            let label = format!("{} cost", what);
            let answer = bounded(
                clock,
                timeout,
                &label,
                retry_idempotent(clock, policy, &label, || client.query_cost(query)),
            )
            .await??;
            if answer.precheck != ResponseCode::Ok {
                return self.rejected_query(&what, expected_precheck, answer.precheck);
            }
            answer.cost
        };
        let answer = bounded(
            clock,
            timeout,
            &what,
            retry_idempotent(clock, policy, &what, || client.query(query, payer, cost)),
        )
        .await??;
        if answer.precheck != ResponseCode::Ok {
            return self.rejected_query(&what, expected_precheck, answer.precheck);
        }
        if let Some(mismatch) = match_status("answer precheck", expected_precheck, answer.precheck) {
            return Err(HarnessError::mismatches(what, vec![mismatch]));
        }
        let response = answer
            .response
            .ok_or_else(|| HarnessError::transport(format!("{} answered OK without a payload", what)))?;
        Ok(Some(response))
    }

    fn rejected_query(
        &mut self,
        what: &str,
        expected: ResponseCode,
        observed: ResponseCode,
    ) -> HarnessResult<Option<QueryResponse>> {
        *self.precheck_counts.entry(observed).or_insert(0) += 1;
        match match_status("answer precheck", expected, observed) {
            Some(mismatch) => Err(HarnessError::mismatches(what, vec![mismatch])),
            None => {
                self.note(format!("{} rejected with {} as expected", what, observed));
                Ok(None)
            }
        }
    }

    /// Current values of `keys`; keys the ledger does not know are absent
    pub async fn network_properties(&mut self, keys: &[String]) -> HarnessResult<BTreeMap<String, String>> {
        let payer = self.default_payer_id()?;
        let query = Query::NetworkProperties(keys.to_vec());
        match self.run_query(&query, payer, ResponseCode::Ok).await? {
            Some(QueryResponse::NetworkProperties(values)) => Ok(values),
            _ => Err(HarnessError::transport("network properties query returned no properties")),
        }
    }

    fn default_payer_id(&self) -> HarnessResult<AccountId> {
        Ok(self.registry.account_id(&self.harness.config.default_payer)?)
    }

    async fn query(&mut self, op: QueryOp) -> HarnessResult<()> {
        let description = op.describe();
        let query = self.resolve_query(&op.target)?;
        let payer = match &op.options.payer {
            Some(payer) => self.registry.account_id(payer)?,
            None => self.default_payer_id()?,
        };
        let Some(response) = self.run_query(&query, payer, op.options.expected_precheck).await? else {
            return Ok(());
        };
        if op.options.logged {
            log::info!("'{}' {}: {}", self.spec_name, description, serde_json::to_string_pretty(&response)?);
        }

        if let Some(expectation) = &op.expectation {
            let registry = &self.registry;
            let mismatches = match (expectation, &response) {
                (QueryExpectation::Balance(e), QueryResponse::AccountBalance(balance)) => e.check(balance, registry)?,
                (QueryExpectation::AccountInfo(e), QueryResponse::AccountInfo(info)) => e.check(info, registry)?,
                (QueryExpectation::TokenInfo(e), QueryResponse::TokenInfo(info)) => e.check(info, registry)?,
                (QueryExpectation::ContractInfo(e), QueryResponse::ContractInfo(info)) => e.check(info, registry)?,
                (QueryExpectation::Record(e), QueryResponse::TransactionRecord(record)) => e.check(record, registry)?,
                (_, other) => {
                    return Err(HarnessError::authoring(format!(
                        "{}: expectation does not apply to a {} answer",
                        description,
                        other.as_ref()
                    )))
                }
            };
            if !mismatches.is_empty() {
                return Err(HarnessError::mismatches(description, mismatches));
            }
        }
        for exposure in op.exposures {
            exposure(&response, &mut self.registry)?;
        }
        Ok(())
    }

    async fn assertion(&mut self, op: AssertionOp) -> HarnessResult<()> {
        match op {
            AssertionOp::ChildRecords {
                txn,
                parent_status,
                mode,
                expected,
            } => {
                let query = Query::TransactionRecord {
                    transaction_id: self.registry.record(&txn)?.transaction_id,
                    include_children: true,
                };
                let payer = self.default_payer_id()?;
                let parent = match self.run_query(&query, payer, ResponseCode::Ok).await? {
                    Some(QueryResponse::TransactionRecord(record)) => record,
                    _ => {
                        return Err(HarnessError::transport(format!(
                            "record query for '{}' returned no record",
                            txn
                        )))
                    }
                };
                let mut mismatches: Vec<_> = match_status("parent.status", parent_status, parent.status())
                    .into_iter()
                    .collect();
                mismatches.extend(match_child_records(&parent, &expected, mode, &self.registry)?);
                if mismatches.is_empty() {
                    Ok(())
                } else {
                    Err(HarnessError::mismatches(format!("child records of '{}'", txn), mismatches))
                }
            }
            AssertionOp::Custom { label, check } => check(&self.registry).map_err(|e| e.context(label)),
        }
    }
}

/// Whether a creation landed; a declared failing creation binds nothing
fn created(record: &TransactionRecord) -> bool {
    record.status() == ResponseCode::Success
}

fn signed(amount: u64) -> HarnessResult<i64> {
    i64::try_from(amount).map_err(|_| HarnessError::authoring(format!("amount {} does not fit in int64", amount)))
}

/// First occurrence of each name, in order
fn unique<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for name in names {
        if !seen.iter().any(|s| s == name) {
            seen.push(name.to_string());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_keeps_first_occurrence() {
        assert_eq!(unique(["a", "b", "a", "c", "b"].into_iter()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_signed_rejects_overflow() {
        assert_eq!(signed(5).unwrap(), 5);
        assert!(signed(u64::MAX).is_err());
    }
}

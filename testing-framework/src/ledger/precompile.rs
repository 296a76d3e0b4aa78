//! Simulated token-service precompile at address `0x167`.
//!
//! A contract program reaches the precompile through [`CallFrame::hts`]. The
//! call is ABI-encoded against the canonical HTS signatures and dispatched
//! by selector, the way an EVM would hand it over. Each dispatch runs on its
//! own rollback point and leaves a following child record; lazily created
//! accounts leave preceding child records.

use super::state::{AccountState, Authorizer, LedgerState, TransferEffects, LAZY_CREATION_ENABLED, MAX_PRECEDING_RECORDS};
use hts_common::abi::precompile::HTS_PRECOMPILE_NUM;
use hts_common::abi::{ContractAbi, Function, FunctionType, PrecompileResult, Token};
use hts_common::crypto::{EvmAddress, Hash};
use hts_common::record::{ContractFunctionResult, ContractLog, TransactionRecord};
use hts_common::transaction::{AccountAmount, NftTransfer, Timestamp, TokenAllowance, TokenTransferList, TransactionId};
use hts_common::{AccountId, ContractId, ResponseCode, TokenId};
use primitive_types::U256;

/// Intrinsic gas of a contract call
pub const BASE_CALL_GAS: u64 = 21_000;
/// Gas charged per precompile dispatch
pub const HTS_CALL_GAS: u64 = 50_000;
/// Gas a contract create needs at least
pub const CONTRACT_CREATE_GAS: u64 = 100_000;

/// Why a contract call stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revert {
    /// Solidity-style revert; finalizes as CONTRACT_REVERT_EXECUTED
    Reason(String),
    /// The call halted with this status
    Halt(ResponseCode),
}

impl Revert {
    pub fn reason(message: impl Into<String>) -> Self {
        Revert::Reason(message.into())
    }
}

/// Execution context of one top-level contract call
pub struct CallFrame<'a> {
    pub(crate) state: &'a mut LedgerState,
    hts: &'a ContractAbi,
    contract: ContractId,
    storage: Vec<Token>,
    verified: &'a [Vec<u8>],
    gas_limit: u64,
    gas_used: u64,
    preceding: Vec<TransactionRecord>,
    following: Vec<TransactionRecord>,
    logs: Vec<ContractLog>,
}

impl<'a> CallFrame<'a> {
    pub(crate) fn new(
        state: &'a mut LedgerState,
        hts: &'a ContractAbi,
        contract: ContractId,
        verified: &'a [Vec<u8>],
        gas_limit: u64,
    ) -> Result<Self, Revert> {
        if gas_limit < BASE_CALL_GAS {
            return Err(Revert::Halt(ResponseCode::InsufficientGas));
        }
        let storage = state
            .contracts
            .get(&contract)
            .map(|c| c.storage.clone())
            .unwrap_or_default();
        Ok(Self {
            state,
            hts,
            contract,
            storage,
            verified,
            gas_limit,
            gas_used: BASE_CALL_GAS,
            preceding: Vec::new(),
            following: Vec::new(),
            logs: Vec::new(),
        })
    }

    pub fn contract(&self) -> ContractId {
        self.contract
    }

    /// Constructor arguments the contract was deployed with
    pub fn storage(&self) -> &[Token] {
        &self.storage
    }

    pub fn gas_used(&self) -> u64 {
        self.gas_used
    }

    pub fn emit(&mut self, topics: Vec<Hash>, data: Vec<u8>) {
        self.logs.push(ContractLog {
            contract: self.contract,
            topics,
            data,
        });
    }

    fn charge(&mut self, gas: u64) -> Result<(), Revert> {
        self.gas_used = self.gas_used.saturating_add(gas);
        if self.gas_used > self.gas_limit {
            return Err(Revert::Halt(ResponseCode::InsufficientGas));
        }
        Ok(())
    }

    fn authorizer(&self) -> Authorizer<'a> {
        Authorizer::Contract {
            caller: self.contract,
            verified: self.verified,
        }
    }

    /// Call the token service.
    ///
    /// A failed dispatch is not an error here: it comes back as a result
    /// whose status is not SUCCESS, with its effects rolled back. Only a
    /// halting condition (out of gas, child record limit) stops the caller.
    pub fn hts(&mut self, function: &str, args: Vec<Token>) -> Result<PrecompileResult, Revert> {
        self.charge(HTS_CALL_GAS)?;
        let input = self
            .hts
            .function(function)
            .and_then(|f| f.encode_input(&args))
            .map_err(|e| Revert::reason(format!("bad precompile input: {}", e)))?;
        let hts = self.hts;
        let target = hts
            .by_selector(&input)
            .ok_or_else(|| Revert::reason("unknown precompile selector"))?;
        let function_type = FunctionType::for_function(target)
            .ok_or_else(|| Revert::reason(format!("unsupported precompile function {}", target.name)))?;
        let decoded = target
            .decode_input(&input)
            .map_err(|e| Revert::reason(format!("bad precompile input: {}", e)))?;

        let snapshot = self.state.clone();
        let preceding_before = self.preceding.len();
        let mut child = ChildEffects::default();
        let result = match self.dispatch(target, function_type, &decoded, &mut child) {
            Ok(result) => result,
            Err(Dispatch::Failed(status)) => PrecompileResult::new(function_type, status),
            Err(Dispatch::Halt(revert)) => {
                *self.state = snapshot;
                return Err(revert);
            }
        };
        if result.status != ResponseCode::Success {
            *self.state = snapshot;
            self.preceding.truncate(preceding_before);
            child = ChildEffects::default();
        }
        log::debug!("precompile {} from {} -> {}", target.name, self.contract, result.status);

        let mut record = child.into_record(result.status);
        record.contract_call_result = Some(ContractFunctionResult {
            contract: Some(ContractId::from_num(HTS_PRECOMPILE_NUM)),
            result: result
                .encode()
                .map_err(|e| Revert::reason(format!("bad precompile output: {}", e)))?,
            gas_used: HTS_CALL_GAS,
            ..Default::default()
        });
        if function_type == FunctionType::HapiMint {
            record.receipt.new_total_supply = result.total_supply;
            record.receipt.serial_numbers = result.serial_numbers.clone();
        }
        self.following.push(record);
        Ok(result)
    }

    fn dispatch(
        &mut self,
        function: &Function,
        function_type: FunctionType,
        args: &[Token],
        child: &mut ChildEffects,
    ) -> Result<PrecompileResult, Dispatch> {
        let success = PrecompileResult::new(function_type, ResponseCode::Success);
        let auth = self.authorizer();
        match function.name.as_str() {
            "cryptoTransfer" => {
                let hbar = self.account_amounts(list_at(args, 0).and_then(|t| list_at(t, 0)))?;
                let mut lists = Vec::new();
                for entry in list_at(args, 1).unwrap_or_default() {
                    let token = self.token_at(Some(entry), 0)?;
                    let transfers = self.account_amounts(list_at(entry.as_list().unwrap_or_default(), 1))?;
                    let mut nft_transfers = Vec::new();
                    for nft in list_at(entry.as_list().unwrap_or_default(), 2).unwrap_or_default() {
                        let fields = nft.as_list().unwrap_or_default();
                        nft_transfers.push(NftTransfer {
                            sender: self.sender(fields.first())?,
                            receiver: self.receiver(fields.get(1))?,
                            serial_number: int_at(fields, 2)?,
                            is_approval: fields.get(3).and_then(Token::as_bool).unwrap_or_default(),
                        });
                    }
                    lists.push(TokenTransferList {
                        token,
                        transfers,
                        nft_transfers,
                    });
                }
                child.transfers = self.state.apply_transfers(&hbar, &lists, &auth)?;
                Ok(success)
            }
            "transferToken" => {
                let token = resolve_token(self.state, args.first())?;
                let sender = self.sender(args.get(1))?;
                let receiver = self.receiver(args.get(2))?;
                let amount = int_at(args, 3)?;
                let list = TokenTransferList::fungible(
                    token,
                    vec![AccountAmount::new(sender, -amount), AccountAmount::new(receiver, amount)],
                );
                child.transfers = self.state.apply_transfers(&[], &[list], &auth)?;
                Ok(success)
            }
            "transferTokens" => {
                let token = resolve_token(self.state, args.first())?;
                let accounts = list_at(args, 1).unwrap_or_default();
                let amounts = list_at(args, 2).unwrap_or_default();
                if accounts.len() != amounts.len() {
                    return Err(Dispatch::Failed(ResponseCode::InvalidAccountAmounts));
                }
                let mut transfers = Vec::with_capacity(accounts.len());
                for (account, amount) in accounts.iter().zip(amounts) {
                    let amount = amount.as_i64().ok_or(Dispatch::Failed(ResponseCode::InvalidAccountAmounts))?;
                    let account = if amount > 0 {
                        self.receiver(Some(account))?
                    } else {
                        self.sender(Some(account))?
                    };
                    transfers.push(AccountAmount::new(account, amount));
                }
                let list = TokenTransferList::fungible(token, transfers);
                child.transfers = self.state.apply_transfers(&[], &[list], &auth)?;
                Ok(success)
            }
            "associateToken" | "dissociateToken" => {
                let account = self.sender(args.first())?;
                let token = resolve_token(self.state, args.get(1))?;
                let key = self.state.account(&account)?.key.clone();
                if AccountId::from(self.contract) != account {
                    auth.require(&key)?;
                }
                if function.name == "associateToken" {
                    self.state.associate(account, token, false)?;
                } else {
                    self.state.dissociate(account, token)?;
                }
                Ok(success)
            }
            "mintToken" => {
                let token = resolve_token(self.state, args.first())?;
                let amount = to_unsigned(int_at(args, 1)?)?;
                let metadata: Vec<Vec<u8>> = list_at(args, 2)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|t| t.as_bytes().map(<[u8]>::to_vec))
                    .collect();
                let (total_supply, serials, list) = self.state.mint(token, amount, &metadata, &auth)?;
                child.transfers.token_transfer_lists.push(list);
                Ok(success.with_total_supply(total_supply).with_serial_numbers(serials))
            }
            "burnToken" => {
                let token = resolve_token(self.state, args.first())?;
                let amount = to_unsigned(int_at(args, 1)?)?;
                let serials: Vec<i64> = list_at(args, 2)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Token::as_i64)
                    .collect();
                let (total_supply, list) = self.state.burn(token, amount, &serials, &auth)?;
                child.transfers.token_transfer_lists.push(list);
                Ok(success.with_total_supply(total_supply))
            }
            "approve" => {
                let token = resolve_token(self.state, args.first())?;
                let spender = self.sender(args.get(1)).map_err(|_| Dispatch::Failed(ResponseCode::InvalidAllowanceSpenderId))?;
                let amount = args
                    .get(2)
                    .and_then(Token::as_u64)
                    .ok_or(Dispatch::Failed(ResponseCode::AmountExceedsAllowance))?;
                let allowance = TokenAllowance {
                    token,
                    owner: AccountId::from(self.contract),
                    spender,
                    amount,
                };
                self.state.approve_token(&allowance, &auth)?;
                Ok(success.with_flag(true))
            }
            "allowance" => {
                let token = resolve_token(self.state, args.first())?;
                let owner = self.sender(args.get(1)).map_err(|_| Dispatch::Failed(ResponseCode::InvalidAllowanceOwnerId))?;
                let spender = self.sender(args.get(2)).map_err(|_| Dispatch::Failed(ResponseCode::InvalidAllowanceSpenderId))?;
                let amount = self.state.token_allowance(token, owner, spender)?;
                Ok(success.with_allowance(U256::from(amount)))
            }
            "grantTokenKyc" | "revokeTokenKyc" => {
                let token = resolve_token(self.state, args.first())?;
                let account = self.sender(args.get(1))?;
                self.state.set_kyc(token, account, function.name == "grantTokenKyc", &auth)?;
                Ok(success)
            }
            "isKyc" => {
                let token = resolve_token(self.state, args.first())?;
                let account = self.sender(args.get(1))?;
                let granted = self.state.is_kyc_granted(token, account)?;
                Ok(success.with_flag(granted))
            }
            _ => Err(Dispatch::Failed(ResponseCode::NotSupported)),
        }
    }

    fn token_at(&self, tuple: Option<&Token>, index: usize) -> Result<TokenId, Dispatch> {
        let fields = tuple.and_then(Token::as_list).ok_or(Dispatch::Failed(ResponseCode::InvalidTokenId))?;
        resolve_token(self.state, fields.get(index))
    }

    /// `(address,int64,bool)[]`; credits may lazily create their receiver
    fn account_amounts(&mut self, entries: Option<&[Token]>) -> Result<Vec<AccountAmount>, Dispatch> {
        let mut amounts = Vec::new();
        for entry in entries.unwrap_or_default() {
            let fields = entry.as_list().unwrap_or_default();
            let amount = int_at(fields, 1)?;
            let account = if amount > 0 {
                self.receiver(fields.first())?
            } else {
                self.sender(fields.first())?
            };
            amounts.push(AccountAmount {
                account,
                amount,
                is_approval: fields.get(2).and_then(Token::as_bool).unwrap_or_default(),
            });
        }
        Ok(amounts)
    }

    fn sender(&self, address: Option<&Token>) -> Result<AccountId, Dispatch> {
        address
            .and_then(Token::as_address)
            .and_then(|a| self.state.resolve_address(&a))
            .ok_or(Dispatch::Failed(ResponseCode::InvalidAccountId))
    }

    fn receiver(&mut self, address: Option<&Token>) -> Result<AccountId, Dispatch> {
        let address = address
            .and_then(Token::as_address)
            .ok_or(Dispatch::Failed(ResponseCode::InvalidAccountId))?;
        if let Some(account) = self.state.resolve_address(&address) {
            return Ok(account);
        }
        if address.is_mirror() {
            return Err(Dispatch::Failed(ResponseCode::InvalidAccountId));
        }
        self.lazy_create(address)
    }

    /// Hollow account for an unknown alias, recorded as a preceding child
    fn lazy_create(&mut self, alias: EvmAddress) -> Result<AccountId, Dispatch> {
        if !self.state.flag(LAZY_CREATION_ENABLED) {
            return Err(Dispatch::Failed(ResponseCode::NotSupported));
        }
        let limit = self.state.number(MAX_PRECEDING_RECORDS) as usize;
        if self.preceding.len() >= limit {
            return Err(Dispatch::Halt(Revert::Halt(ResponseCode::MaxChildRecordsExceeded)));
        }
        let account = self.state.create_account(AccountState::hollow(alias));
        log::debug!("lazy-created {} for alias {}", account, alias);

        let mut record = TransactionRecord::new(placeholder_id(), ResponseCode::Success, Timestamp::default());
        record.receipt.account_id = Some(account);
        record.evm_address = Some(alias);
        record.memo = super::state::HOLLOW_ACCOUNT_MEMO.to_string();
        self.preceding.push(record);
        Ok(account)
    }

    /// Child records in consensus order: preceding, then following
    pub(crate) fn finish(self) -> FrameOutput {
        FrameOutput {
            gas_used: self.gas_used,
            preceding: self.preceding,
            following: self.following,
            logs: self.logs,
        }
    }
}

pub(crate) struct FrameOutput {
    pub gas_used: u64,
    pub preceding: Vec<TransactionRecord>,
    pub following: Vec<TransactionRecord>,
    pub logs: Vec<ContractLog>,
}

/// Dispatch-level failure: either a status for the child record, or a halt
enum Dispatch {
    Failed(ResponseCode),
    Halt(Revert),
}

impl From<ResponseCode> for Dispatch {
    fn from(status: ResponseCode) -> Self {
        Dispatch::Failed(status)
    }
}

#[derive(Default)]
struct ChildEffects {
    transfers: TransferEffects,
}

impl ChildEffects {
    fn into_record(self, status: ResponseCode) -> TransactionRecord {
        let mut record = TransactionRecord::new(placeholder_id(), status, Timestamp::default());
        record.hbar_transfers = self.transfers.hbar_transfers;
        record.token_transfer_lists = self.transfers.token_transfer_lists;
        record.automatic_token_associations = self.transfers.automatic_token_associations;
        record
    }
}

/// Child ids and timestamps are assigned once the parent is finalized
fn placeholder_id() -> TransactionId {
    TransactionId::new(AccountId::default(), Timestamp::default())
}

fn resolve_token(state: &LedgerState, address: Option<&Token>) -> Result<TokenId, Dispatch> {
    address
        .and_then(Token::as_address)
        .and_then(|a| state.resolve_token(&a))
        .ok_or(Dispatch::Failed(ResponseCode::InvalidTokenId))
}

fn list_at(tokens: &[Token], index: usize) -> Option<&[Token]> {
    tokens.get(index).and_then(Token::as_list)
}

fn int_at(tokens: &[Token], index: usize) -> Result<i64, Dispatch> {
    tokens
        .get(index)
        .and_then(Token::as_i64)
        .ok_or(Dispatch::Failed(ResponseCode::InvalidAccountAmounts))
}

fn to_unsigned(value: i64) -> Result<u64, Dispatch> {
    u64::try_from(value).map_err(|_| Dispatch::Failed(ResponseCode::InvalidTokenMintAmount))
}

/// 32-byte log topic holding a big-endian integer
pub fn topic_u64(value: u64) -> Hash {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&value.to_be_bytes());
    Hash::new(bytes)
}

//! Transaction handlers of the test ledger.
//!
//! A handler either fills in the record and returns `Ok`, or fails the whole
//! transaction with a status. Contract calls are the exception: a revert
//! still returns `Ok`, with CONTRACT_REVERT_EXECUTED in the record, so that
//! the reverted child records survive.

use super::precompile::{CallFrame, Revert, CONTRACT_CREATE_GAS};
use super::programs::ProgramRegistry;
use super::state::{
    to_signed, AccountState, Authorizer, ContractState, LedgerState, TokenState, ALLOW_AUTO_ASSOCIATIONS,
    GENESIS_ACCOUNT,
};
use crate::contracts::CONSTRUCTOR;
use hts_common::abi::{decode, ContractAbi};
use hts_common::crypto::Key;
use hts_common::query::KycStatus;
use hts_common::record::{ContractFunctionResult, TransactionRecord};
use hts_common::transaction::*;
use hts_common::{AccountId, ContractId, ResponseCode, TokenId};

type Handled = Result<(), ResponseCode>;

pub(crate) struct HandleContext<'a> {
    pub transaction_id: TransactionId,
    pub consensus: Timestamp,
    pub verified: &'a [Vec<u8>],
    pub programs: &'a ProgramRegistry,
    pub hts: &'a ContractAbi,
}

impl<'a> HandleContext<'a> {
    fn payer(&self) -> AccountId {
        self.transaction_id.payer
    }

    fn signatures(&self) -> Authorizer<'a> {
        Authorizer::Signatures {
            verified: self.verified,
            payer: self.transaction_id.payer,
        }
    }
}

pub(crate) fn handle(
    state: &mut LedgerState,
    ctx: &HandleContext<'_>,
    data: &TransactionData,
    record: &mut TransactionRecord,
) -> Handled {
    match data {
        TransactionData::CryptoCreate(payload) => crypto_create(state, ctx, payload, record),
        TransactionData::CryptoUpdate(payload) => crypto_update(state, ctx, payload),
        TransactionData::CryptoTransfer(payload) => {
            let effects = state.apply_transfers(&payload.hbar_transfers, &payload.token_transfers, &ctx.signatures())?;
            record.hbar_transfers = effects.hbar_transfers;
            record.token_transfer_lists = effects.token_transfer_lists;
            record.automatic_token_associations = effects.automatic_token_associations;
            Ok(())
        }
        TransactionData::CryptoApproveAllowance(payload) => approve_allowance(state, ctx, payload),
        TransactionData::TokenCreate(payload) => token_create(state, ctx, payload, record),
        TransactionData::TokenAssociate(payload) => {
            require_account_key(state, ctx, &payload.account)?;
            for token in &payload.tokens {
                state.associate(payload.account, *token, false)?;
            }
            Ok(())
        }
        TransactionData::TokenDissociate(payload) => {
            require_account_key(state, ctx, &payload.account)?;
            for token in &payload.tokens {
                state.token(token)?;
                state.dissociate(payload.account, *token)?;
            }
            Ok(())
        }
        TransactionData::TokenMint(payload) => {
            let (total_supply, serials, list) =
                state.mint(payload.token, payload.amount, &payload.metadata, &ctx.signatures())?;
            record.receipt.new_total_supply = Some(total_supply);
            record.receipt.serial_numbers = serials;
            record.token_transfer_lists.push(list);
            Ok(())
        }
        TransactionData::TokenBurn(payload) => {
            let (total_supply, list) =
                state.burn(payload.token, payload.amount, &payload.serial_numbers, &ctx.signatures())?;
            record.receipt.new_total_supply = Some(total_supply);
            record.token_transfer_lists.push(list);
            Ok(())
        }
        TransactionData::TokenGrantKyc(payload) => {
            state.set_kyc(payload.token, payload.account, true, &ctx.signatures())
        }
        TransactionData::TokenRevokeKyc(payload) => {
            state.set_kyc(payload.token, payload.account, false, &ctx.signatures())
        }
        TransactionData::ContractCreate(payload) => contract_create(state, ctx, payload, record),
        TransactionData::ContractCall(payload) => contract_call(state, ctx, payload, record),
        TransactionData::NetworkProperties(payload) => {
            if ctx.payer() != GENESIS_ACCOUNT {
                return Err(ResponseCode::NotSupported);
            }
            for (key, value) in &payload.set {
                state.set_property(key, value);
            }
            for key in &payload.reset {
                state.reset_property(key);
            }
            Ok(())
        }
    }
}

fn require_account_key(state: &LedgerState, ctx: &HandleContext<'_>, account: &AccountId) -> Handled {
    let key = &state.account(account)?.key;
    ctx.signatures().require(key)
}

fn debit_payer(state: &mut LedgerState, payer: AccountId, amount: u64) -> Handled {
    let account = state.account_mut(&payer).map_err(|_| ResponseCode::PayerAccountNotFound)?;
    account.balance = account
        .balance
        .checked_sub(amount)
        .ok_or(ResponseCode::InsufficientPayerBalance)?;
    Ok(())
}

fn funding_transfers(payer: AccountId, receiver: AccountId, amount: u64) -> Result<Vec<AccountAmount>, ResponseCode> {
    if amount == 0 {
        return Ok(Vec::new());
    }
    let amount = to_signed(amount)?;
    Ok(vec![AccountAmount::new(payer, -amount), AccountAmount::new(receiver, amount)])
}

fn crypto_create(
    state: &mut LedgerState,
    ctx: &HandleContext<'_>,
    payload: &CryptoCreatePayload,
    record: &mut TransactionRecord,
) -> Handled {
    if payload.key.is_empty() {
        return Err(ResponseCode::InvalidTransaction);
    }
    if let Some(alias) = &payload.alias {
        if state.aliases.contains_key(alias) {
            return Err(ResponseCode::InvalidTransaction);
        }
    }
    debit_payer(state, ctx.payer(), payload.initial_balance)?;

    let mut account = AccountState::new(payload.key.clone(), payload.initial_balance);
    account.alias = payload.alias;
    account.receiver_sig_required = payload.receiver_sig_required;
    account.max_automatic_token_associations = payload.max_automatic_token_associations;
    account.memo = payload.memo.clone();
    let id = state.create_account(account);

    record.receipt.account_id = Some(id);
    record.evm_address = payload.alias;
    record.hbar_transfers = funding_transfers(ctx.payer(), id, payload.initial_balance)?;
    Ok(())
}

fn crypto_update(state: &mut LedgerState, ctx: &HandleContext<'_>, payload: &CryptoUpdatePayload) -> Handled {
    let auth = ctx.signatures();
    let account = state.account(&payload.account)?;
    match &payload.key {
        // Completing a hollow account only needs the new key
        Some(_) if account.is_hollow() => {}
        None if account.is_hollow() => return Err(ResponseCode::NotSupportedForHollowAccount),
        _ => auth.require(&account.key)?,
    }
    if let Some(key) = &payload.key {
        auth.require(key)?;
    }

    let account = state.account_mut(&payload.account)?;
    if let Some(key) = &payload.key {
        account.key = key.clone();
    }
    if let Some(required) = payload.receiver_sig_required {
        account.receiver_sig_required = required;
    }
    if let Some(max) = payload.max_automatic_token_associations {
        account.max_automatic_token_associations = max;
    }
    if let Some(memo) = &payload.memo {
        account.memo = memo.clone();
    }
    Ok(())
}

fn approve_allowance(
    state: &mut LedgerState,
    ctx: &HandleContext<'_>,
    payload: &CryptoApproveAllowancePayload,
) -> Handled {
    let auth = ctx.signatures();
    for allowance in &payload.crypto_allowances {
        state.approve_crypto(allowance, &auth)?;
    }
    for allowance in &payload.token_allowances {
        state.approve_token(allowance, &auth)?;
    }
    for allowance in &payload.nft_allowances {
        state.approve_nfts(
            allowance.token,
            allowance.owner,
            allowance.spender,
            &allowance.serial_numbers,
            allowance.approved_for_all,
            &auth,
        )?;
    }
    Ok(())
}

fn token_create(
    state: &mut LedgerState,
    ctx: &HandleContext<'_>,
    payload: &TokenCreatePayload,
    record: &mut TransactionRecord,
) -> Handled {
    let auth = ctx.signatures();
    require_account_key(state, ctx, &payload.treasury)?;
    if let Some(admin_key) = &payload.admin_key {
        auth.require(admin_key)?;
    }
    if payload.token_type == TokenType::NonFungibleUnique && payload.initial_supply > 0 {
        return Err(ResponseCode::InvalidTokenMintAmount);
    }

    let token = TokenId::from_num(state.next_entity_num());
    state.tokens.insert(
        token,
        TokenState {
            name: payload.name.clone(),
            symbol: payload.symbol.clone(),
            token_type: payload.token_type,
            decimals: payload.decimals,
            total_supply: payload.initial_supply,
            treasury: payload.treasury,
            admin_key: payload.admin_key.clone(),
            supply_key: payload.supply_key.clone(),
            kyc_key: payload.kyc_key.clone(),
            next_serial: 1,
        },
    );
    state.associate(payload.treasury, token, false)?;
    if let Some(relationship) = state.relationships.get_mut(&(payload.treasury, token)) {
        relationship.balance = payload.initial_supply;
        if payload.kyc_key.is_some() {
            relationship.kyc = KycStatus::Granted;
        }
    }

    record.receipt.token_id = Some(token);
    if payload.initial_supply > 0 {
        record.token_transfer_lists.push(TokenTransferList::fungible(
            token,
            vec![AccountAmount::new(payload.treasury, to_signed(payload.initial_supply)?)],
        ));
    }
    Ok(())
}

fn contract_create(
    state: &mut LedgerState,
    ctx: &HandleContext<'_>,
    payload: &ContractCreatePayload,
    record: &mut TransactionRecord,
) -> Handled {
    let (abi, _) = ctx.programs.get(&payload.program).ok_or(ResponseCode::NotSupported)?;
    if let Some(admin_key) = &payload.admin_key {
        ctx.signatures().require(admin_key)?;
    }
    if payload.max_automatic_token_associations != 0 && !state.flag(ALLOW_AUTO_ASSOCIATIONS) {
        return Err(ResponseCode::NotSupported);
    }
    if payload.gas < CONTRACT_CREATE_GAS {
        return Err(ResponseCode::InsufficientGas);
    }
    let storage = match abi.function(CONSTRUCTOR) {
        Ok(constructor) => {
            decode(&constructor.inputs, &payload.constructor_parameters).map_err(|_| ResponseCode::ContractRevertExecuted)?
        }
        Err(_) if payload.constructor_parameters.is_empty() => Vec::new(),
        Err(_) => return Err(ResponseCode::ContractRevertExecuted),
    };
    debit_payer(state, ctx.payer(), payload.initial_balance)?;

    let num = state.next_entity_num();
    let contract = ContractId::from_num(num);
    let account_id = AccountId::from(contract);
    let mut account = AccountState::new(
        payload.admin_key.clone().unwrap_or(Key::ContractId(contract)),
        payload.initial_balance,
    );
    account.max_automatic_token_associations = payload.max_automatic_token_associations;
    account.memo = payload.memo.clone();
    state.accounts.insert(account_id, account);
    state.contracts.insert(
        contract,
        ContractState {
            program: payload.program.clone(),
            admin_key: payload.admin_key.clone(),
            memo: payload.memo.clone(),
            storage,
        },
    );

    record.receipt.contract_id = Some(contract);
    record.contract_create_result = Some(ContractFunctionResult {
        contract: Some(contract),
        gas_used: CONTRACT_CREATE_GAS,
        evm_address: Some(contract.to_mirror_address()),
        ..Default::default()
    });
    record.hbar_transfers = funding_transfers(ctx.payer(), account_id, payload.initial_balance)?;
    Ok(())
}

fn contract_call(
    state: &mut LedgerState,
    ctx: &HandleContext<'_>,
    payload: &ContractCallPayload,
    record: &mut TransactionRecord,
) -> Handled {
    let program_name = state
        .contracts
        .get(&payload.contract)
        .map(|c| c.program.clone())
        .ok_or(ResponseCode::InvalidContractId)?;
    let (abi, program) = ctx.programs.get(&program_name).ok_or(ResponseCode::InvalidContractId)?;

    if payload.amount > 0 {
        let value = funding_transfers(ctx.payer(), AccountId::from(payload.contract), payload.amount)?;
        let effects = state.apply_transfers(&value, &[], &ctx.signatures())?;
        record.hbar_transfers = effects.hbar_transfers;
    }

    let mut frame = match CallFrame::new(state, ctx.hts, payload.contract, ctx.verified, payload.gas) {
        Ok(frame) => frame,
        Err(Revert::Halt(status)) => return Err(status),
        Err(Revert::Reason(_)) => return Err(ResponseCode::ContractRevertExecuted),
    };
    let outcome = match abi.by_selector(&payload.function_parameters) {
        Some(function) => function
            .decode_input(&payload.function_parameters)
            .map_err(|e| Revert::reason(format!("bad call data: {}", e)))
            .and_then(|args| program.call(&mut frame, function, &args))
            .and_then(|returns| {
                function
                    .encode_output(&returns)
                    .map_err(|e| Revert::reason(format!("bad return data: {}", e)))
            }),
        None => Err(Revert::reason("no function matches the call selector")),
    };
    let output = frame.finish();

    let mut result = ContractFunctionResult {
        contract: Some(payload.contract),
        gas_used: output.gas_used,
        ..Default::default()
    };
    match outcome {
        Ok(data) => {
            result.result = data;
            result.logs = output.logs;
            let preceding = output.preceding.len();
            record.children = output.preceding;
            record.children.extend(output.following);
            finalize_children(record, ctx, preceding);
        }
        Err(Revert::Reason(message)) => {
            log::debug!("contract {} reverted: {}", payload.contract, message);
            result.error_message = Some(message);
            record.receipt.status = ResponseCode::ContractRevertExecuted;
            record.hbar_transfers.clear();
            record.children = output
                .following
                .into_iter()
                .map(|mut child| {
                    if child.receipt.status == ResponseCode::Success {
                        child.receipt.status = ResponseCode::RevertedSuccess;
                    }
                    child
                })
                .collect();
            finalize_children(record, ctx, 0);
        }
        Err(Revert::Halt(status)) => return Err(status),
    }
    record.contract_call_result = Some(result);
    Ok(())
}

/// Give children their ids and consensus timestamps around the parent's
fn finalize_children(record: &mut TransactionRecord, ctx: &HandleContext<'_>, preceding: usize) {
    let consensus = ctx.consensus.as_nanos();
    for (index, child) in record.children.iter_mut().enumerate() {
        child.transaction_id = ctx.transaction_id.child(index as u32 + 1);
        child.parent_consensus_timestamp = Some(ctx.consensus);
        child.consensus_timestamp = if index < preceding {
            Timestamp::from_nanos(consensus.saturating_sub((preceding - index) as u64))
        } else {
            Timestamp::from_nanos(consensus + (index - preceding) as u64 + 1)
        };
    }
}

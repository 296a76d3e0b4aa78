//! Hbar and fungible token transfers through the precompile `cryptoTransfer`.
//!
//! Every holder's key is a delegate key of the transferring contract, so the
//! contract may move their funds. Accounts without such a key must have
//! signed the top-level transaction.

use crate::prelude::*;

const CONTRACT: &str = "atomicTransferContract";
const TRANSFER_MULTIPLE_TOKENS: &str = "transferMultipleTokens";
const SENDER: &str = "sender";
const SENDER2: &str = "sender2";
const RECEIVER: &str = "receiver";
const RECEIVER2: &str = "receiver2";
const DELEGATE_KEY: &str = "delegateKey";
const OWNER: &str = "owner";
const TREASURY: &str = "treasury";
const TOKEN: &str = "fungibleToken";

pub fn suite() -> Suite {
    Suite::new(
        "atomic_crypto_transfer",
        vec![
            crypto_transfer_for_hbar_only(),
            crypto_transfer_allowance_hbar_token(),
            crypto_transfer_for_fungible_token_only(),
            fungible_transfer_not_zero_sum(),
        ],
    )
}

fn hbars(amounts: &[(&str, i64, bool)]) -> Vec<Arg> {
    vec![
        transfer_list(
            amounts
                .iter()
                .map(|(account, amount, approval)| account_amount(account, *amount, *approval))
                .collect(),
        ),
        Arg::Array(Vec::new()),
    ]
}

fn transfer(txn: &str, amounts: &[(&str, i64, bool)], status: ResponseCode) -> Operation {
    contract_call(CONTRACT, TRANSFER_MULTIPLE_TOKENS, hbars(amounts))
        .with(TxnOptions::new().status(status).via(txn))
        .into()
}

fn reverted_with(txn: &str, status: ResponseCode) -> Operation {
    child_records_check(
        txn,
        ResponseCode::ContractRevertExecuted,
        MatchMode::OrderedExact,
        vec![RecordExpectation::new()
            .status(status)
            .precompile(PrecompileExpectation::status(status))],
    )
    .into()
}

fn crypto_transfer_for_hbar_only() -> Spec {
    let amount = (50 * ONE_HBAR) as i64;
    Spec::new("cryptoTransferForHbarOnly")
        .given(ops![
            crypto_create(SENDER, CryptoCreateOptions::with_balance(10 * ONE_HUNDRED_HBARS)),
            crypto_create(SENDER2, CryptoCreateOptions::with_balance(10 * ONE_HUNDRED_HBARS)),
            crypto_create(
                RECEIVER,
                CryptoCreateOptions {
                    balance: 2 * ONE_HUNDRED_HBARS,
                    receiver_sig_required: true,
                    ..Default::default()
                }
            ),
            crypto_create(
                RECEIVER2,
                CryptoCreateOptions {
                    balance: 2 * ONE_HUNDRED_HBARS,
                    receiver_sig_required: true,
                    ..Default::default()
                }
            ),
            contract_create(CONTRACT, ContractCreateOptions::program(ATOMIC_CRYPTO_TRANSFER)),
            new_delegate_key(DELEGATE_KEY, CONTRACT),
            crypto_update_key(SENDER, DELEGATE_KEY),
            crypto_update_key(RECEIVER, DELEGATE_KEY),
            crypto_update_key(RECEIVER2, DELEGATE_KEY),
        ])
        .when(ops![
            transfer(
                "hbarTransferTxn",
                &[(SENDER, -amount, false), (RECEIVER, amount, false)],
                ResponseCode::Success,
            ),
            transfer(
                "withoutSenderKeyTxn",
                &[(SENDER2, -amount, false), (RECEIVER, amount, false)],
                ResponseCode::ContractRevertExecuted,
            ),
            transfer(
                "insufficientBalanceTxn",
                &[(SENDER, -amount * 200, false), (RECEIVER, amount * 200, false)],
                ResponseCode::ContractRevertExecuted,
            ),
            transfer(
                "multiReceiverTxn",
                &[
                    (SENDER, -amount, false),
                    (RECEIVER, (40 * ONE_HBAR) as i64, false),
                    (RECEIVER2, (10 * ONE_HBAR) as i64, false),
                ],
                ResponseCode::Success,
            ),
            transfer(
                "notZeroSumTxn",
                &[(SENDER, -amount, false), (RECEIVER, amount + 1, false)],
                ResponseCode::ContractRevertExecuted,
            ),
        ])
        .then(ops![
            child_records_check(
                "hbarTransferTxn",
                ResponseCode::Success,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new()
                    .status(ResponseCode::Success)
                    .precompile(PrecompileExpectation::status(ResponseCode::Success))
                    .hbar_transfer(SENDER, RECEIVER, amount)],
            ),
            reverted_with("withoutSenderKeyTxn", ResponseCode::InvalidFullPrefixSignatureForPrecompile),
            reverted_with("insufficientBalanceTxn", ResponseCode::InsufficientAccountBalance),
            child_records_check(
                "multiReceiverTxn",
                ResponseCode::Success,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new()
                    .status(ResponseCode::Success)
                    .hbar_change(SENDER, -amount)
                    .hbar_change(RECEIVER, (40 * ONE_HBAR) as i64)
                    .hbar_change(RECEIVER2, (10 * ONE_HBAR) as i64)],
            ),
            reverted_with("notZeroSumTxn", ResponseCode::InvalidAccountAmounts),
            get_account_balance(SENDER).has_balance(BalanceExpectation::tiny_bars(9 * ONE_HUNDRED_HBARS)),
            get_account_balance(SENDER2).has_balance(BalanceExpectation::tiny_bars(10 * ONE_HUNDRED_HBARS)),
            get_account_balance(RECEIVER).has_balance(BalanceExpectation::tiny_bars(290 * ONE_HBAR)),
            get_account_balance(RECEIVER2).has_balance(BalanceExpectation::tiny_bars(210 * ONE_HBAR)),
        ])
}

/// Approved debits spend the contract's hbar allowance
fn crypto_transfer_allowance_hbar_token() -> Spec {
    Spec::new("cryptoTransferAllowanceHbarToken")
        .given(ops![
            crypto_create(OWNER, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
            crypto_create(RECEIVER, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
            contract_create(CONTRACT, ContractCreateOptions::program(ATOMIC_CRYPTO_TRANSFER)),
            crypto_approve_allowance(vec![Allowance::hbar(OWNER, CONTRACT, 10)]),
            get_account_info(OWNER).has_info(AccountInfoExpectation::new().crypto_allowance(CONTRACT, 10)),
            balance_snapshot("ownerBefore", OWNER),
            balance_snapshot("receiverBeforeExceed", RECEIVER),
        ])
        .when(ops![
            transfer(
                "exceedsAllowanceTxn",
                &[(OWNER, -11, true), (RECEIVER, 11, false)],
                ResponseCode::ContractRevertExecuted,
            ),
            get_account_balance(RECEIVER)
                .has_balance(BalanceExpectation::changed_from_snapshot("receiverBeforeExceed", 0)),
            transfer(
                "withoutApprovalTxn",
                &[(OWNER, -10, false), (RECEIVER, 10, false)],
                ResponseCode::ContractRevertExecuted,
            ),
            transfer(
                "firstHalfTxn",
                &[(OWNER, -5, true), (RECEIVER, 5, false)],
                ResponseCode::Success,
            ),
            transfer(
                "secondHalfTxn",
                &[(OWNER, -5, true), (RECEIVER, 5, false)],
                ResponseCode::Success,
            ),
            transfer(
                "allowanceSpentTxn",
                &[(OWNER, -1, true), (RECEIVER, 1, false)],
                ResponseCode::ContractRevertExecuted,
            ),
        ])
        .then(ops![
            reverted_with("exceedsAllowanceTxn", ResponseCode::AmountExceedsAllowance),
            reverted_with("withoutApprovalTxn", ResponseCode::InvalidFullPrefixSignatureForPrecompile),
            child_records_check(
                "secondHalfTxn",
                ResponseCode::Success,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new()
                    .status(ResponseCode::Success)
                    .hbar_transfer(OWNER, RECEIVER, 5)],
            ),
            reverted_with("allowanceSpentTxn", ResponseCode::SpenderDoesNotHaveAllowance),
            get_account_info(OWNER).has_info(AccountInfoExpectation::new().no_allowances()),
            get_account_balance(OWNER).has_balance(BalanceExpectation::changed_from_snapshot("ownerBefore", -10)),
        ])
}

fn token_transfer_setup() -> Vec<Operation> {
    ops![
        crypto_create(TREASURY, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
        crypto_create(SENDER, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
        crypto_create(RECEIVER, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
        token_create(TOKEN, TokenCreateOptions::fungible(1_000, TREASURY)),
        contract_create(CONTRACT, ContractCreateOptions::program(ATOMIC_CRYPTO_TRANSFER)),
        new_delegate_key(DELEGATE_KEY, CONTRACT),
        crypto_update_key(SENDER, DELEGATE_KEY),
        crypto_update_key(RECEIVER, DELEGATE_KEY),
        token_associate(SENDER, &[TOKEN]),
        token_associate(RECEIVER, &[TOKEN]),
        crypto_transfer(vec![Movement::token(TOKEN, TREASURY, SENDER, 200)]),
    ]
}

fn token_transfer(txn: &str, amounts: &[(&str, i64)], status: ResponseCode) -> Operation {
    let amounts = amounts
        .iter()
        .map(|(account, amount)| account_amount(account, *amount, false))
        .collect();
    contract_call(
        CONTRACT,
        TRANSFER_MULTIPLE_TOKENS,
        vec![
            transfer_list(Vec::new()),
            Arg::Array(vec![token_transfer_list(TOKEN, amounts, Vec::new())]),
        ],
    )
    .with(TxnOptions::new().status(status).via(txn))
    .into()
}

fn crypto_transfer_for_fungible_token_only() -> Spec {
    Spec::new("cryptoTransferForFungibleTokenOnly")
        .given(token_transfer_setup())
        .when(ops![token_transfer(
            "tokenTransferTxn",
            &[(SENDER, -50), (RECEIVER, 50)],
            ResponseCode::Success,
        )])
        .then(ops![
            child_records_check(
                "tokenTransferTxn",
                ResponseCode::Success,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new()
                    .status(ResponseCode::Success)
                    .precompile(PrecompileExpectation::status(ResponseCode::Success))
                    .token_transfer(TOKEN, SENDER, RECEIVER, 50)],
            ),
            get_account_balance(SENDER).has_balance(BalanceExpectation::token(TOKEN, 150)),
            get_account_balance(RECEIVER).has_balance(BalanceExpectation::token(TOKEN, 50)),
            get_token_info(TOKEN).has_token_info(TokenInfoExpectation::new().total_supply(1_000).treasury(TREASURY)),
        ])
}

fn fungible_transfer_not_zero_sum() -> Spec {
    Spec::new("cryptoTransferForFungibleTokenNotZeroSum")
        .given(token_transfer_setup())
        .when(ops![token_transfer(
            "notZeroSumTxn",
            &[(SENDER, -50), (RECEIVER, 40)],
            ResponseCode::ContractRevertExecuted,
        )])
        .then(ops![
            reverted_with("notZeroSumTxn", ResponseCode::TransfersNotZeroSumForToken),
            get_account_balance(SENDER).has_balance(BalanceExpectation::token(TOKEN, 200)),
        ])
}

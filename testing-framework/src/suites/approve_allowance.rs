// Token allowances read and granted by a contract through the precompile.

use crate::prelude::*;

const OWNER: &str = "owner";
const SPENDER: &str = "spender";
const TREASURY: &str = "treasury";
const TOKEN: &str = "fungibleToken";
const CONTRACT: &str = "approveContract";
const ADMIN_KEY: &str = "adminKey";

pub fn suite() -> Suite {
    Suite::new(
        "approve_allowance",
        vec![
            token_allowance(),
            hts_token_approve(),
            hts_token_approve_needs_association(),
            allowance_for_unknown_owner(),
        ],
    )
}

fn token_setup() -> Vec<Operation> {
    ops![
        crypto_create(TREASURY, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
        crypto_create(OWNER, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
        crypto_create(SPENDER, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
        token_create(TOKEN, TokenCreateOptions::fungible(1_000, TREASURY)),
        token_associate(OWNER, &[TOKEN]),
        token_associate(SPENDER, &[TOKEN]),
    ]
}

/// The contract reads an allowance granted off-chain
fn token_allowance() -> Spec {
    let mut given = token_setup();
    given.extend(ops![
        contract_create(CONTRACT, ContractCreateOptions::program(HTS_APPROVE_ALLOWANCE)),
        crypto_approve_allowance(vec![Allowance::token(OWNER, TOKEN, SPENDER, 2)]),
    ]);
    Spec::new("tokenAllowance")
        .given(given)
        .when(ops![contract_call(
            CONTRACT,
            "htsAllowance",
            vec![address(TOKEN), address(OWNER), address(SPENDER)],
        )
        .with(TxnOptions::new().via("allowanceTxn"))])
        .then(ops![
            child_records_check(
                "allowanceTxn",
                ResponseCode::Success,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new().status(ResponseCode::Success).precompile(
                    PrecompileExpectation::for_function(FunctionType::HapiAllowance, ResponseCode::Success)
                        .with_allowance(2),
                )],
            ),
            get_txn_record("allowanceTxn").has_record(RecordExpectation::new().contract_result(
                ContractResultExpectation::new().returning(CONTRACT, "htsAllowance", vec![Token::uint(2)]),
            )),
        ])
}

/// The contract approves a spender for its own balance
fn hts_token_approve() -> Spec {
    let mut given = token_setup();
    given.extend(ops![
        new_key_named(ADMIN_KEY),
        contract_create(
            CONTRACT,
            ContractCreateOptions::program(HTS_APPROVE_ALLOWANCE).admin_key(ADMIN_KEY),
        ),
        token_associate(CONTRACT, &[TOKEN]),
    ]);
    Spec::new("htsTokenApprove")
        .given(given)
        .when(ops![contract_call(
            CONTRACT,
            "htsApprove",
            vec![address(TOKEN), address(SPENDER), uint(10)],
        )
        .with(TxnOptions::new().via("approveTxn"))])
        .then(ops![
            child_records_check(
                "approveTxn",
                ResponseCode::Success,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new().status(ResponseCode::Success).precompile(
                    PrecompileExpectation::for_function(FunctionType::HapiApprove, ResponseCode::Success)
                        .with_flag(true),
                )],
            ),
            get_account_info(CONTRACT).has_info(AccountInfoExpectation::new().token_allowance(TOKEN, SPENDER, 10)),
        ])
}

fn hts_token_approve_needs_association() -> Spec {
    let mut given = token_setup();
    given.extend(ops![contract_create(
        CONTRACT,
        ContractCreateOptions::program(HTS_APPROVE_ALLOWANCE)
    )]);
    Spec::new("htsTokenApproveWithoutAssociationReverts")
        .given(given)
        .when(ops![contract_call(
            CONTRACT,
            "htsApprove",
            vec![address(TOKEN), address(SPENDER), uint(10)],
        )
        .with(
            TxnOptions::new()
                .status(ResponseCode::ContractRevertExecuted)
                .via("approveTxn")
        )])
        .then(ops![child_records_check(
            "approveTxn",
            ResponseCode::ContractRevertExecuted,
            MatchMode::OrderedExact,
            vec![RecordExpectation::new()
                .status(ResponseCode::TokenNotAssociatedToAccount)
                .precompile(PrecompileExpectation::for_function(
                    FunctionType::HapiApprove,
                    ResponseCode::TokenNotAssociatedToAccount,
                ))],
        )])
}

/// Asking for the allowance of a token instead of an account
fn allowance_for_unknown_owner() -> Spec {
    let mut given = token_setup();
    given.extend(ops![contract_create(
        CONTRACT,
        ContractCreateOptions::program(HTS_APPROVE_ALLOWANCE)
    )]);
    Spec::new("htsAllowanceWithInvalidOwnerReverts")
        .given(given)
        .when(ops![contract_call(
            CONTRACT,
            "htsAllowance",
            vec![address(TOKEN), address(TOKEN), address(SPENDER)],
        )
        .with(
            TxnOptions::new()
                .status(ResponseCode::ContractRevertExecuted)
                .via("allowanceTxn")
        )])
        .then(ops![child_records_check(
            "allowanceTxn",
            ResponseCode::ContractRevertExecuted,
            MatchMode::Containing,
            vec![RecordExpectation::new().status(ResponseCode::InvalidAllowanceOwnerId)],
        )])
}

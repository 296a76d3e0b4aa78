// Token transfers to unknown EVM aliases, which create hollow accounts.

use crate::prelude::*;

const CONTRACT: &str = "aliasTransferContract";
const ADMIN_KEY: &str = "adminKey";
const TREASURY: &str = "treasury";
const TOKEN: &str = "fungibleToken";
const ALIAS_KEY: &str = "aliasKey";
const HOLLOW_ACCOUNT_MEMO: &str = "lazy-created account";

pub fn suite() -> Suite {
    Suite::new(
        "lazy_create",
        vec![
            transfer_then_revert_and_lazy_create(),
            lazy_create_disabled(),
            lazy_create_bounded_by_preceding_records(),
        ],
    )
}

/// Contract holding 5 units of the token, able to send them
fn funded_contract() -> Vec<Operation> {
    ops![
        new_key_named(ALIAS_KEY),
        new_key_named(ADMIN_KEY),
        crypto_create(TREASURY, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
        token_create(TOKEN, TokenCreateOptions::fungible(1_000, TREASURY)),
        contract_create(
            CONTRACT,
            ContractCreateOptions::program(PRECOMPILE_ALIAS_XFER).admin_key(ADMIN_KEY)
        ),
        token_associate(CONTRACT, &[TOKEN]),
        crypto_transfer(vec![Movement::token(TOKEN, TREASURY, CONTRACT, 5)]),
    ]
}

fn transfer_to_alias(function: &str, alias: &str, amount: i64) -> ContractCallOp {
    contract_call(
        CONTRACT,
        function,
        vec![address(TOKEN), address(CONTRACT), address(alias), int(amount)],
    )
}

fn transfer_then_revert_and_lazy_create() -> Spec {
    let mut given = ops![overriding(LAZY_CREATION_ENABLED, "true")];
    given.extend(funded_contract());
    Spec::new("transferTokenThenRevertThenLazyCreate")
        .preserving(&[LAZY_CREATION_ENABLED])
        .given(given)
        .when(ops![
            balance_snapshot("contractBeforeRevert", CONTRACT),
            transfer_to_alias("transferTokenThanRevertCall", ALIAS_KEY, 2).with(
                TxnOptions::new()
                    .status(ResponseCode::ContractRevertExecuted)
                    .via("revertTxn")
            ),
            get_account_balance(CONTRACT).has_balance(BalanceExpectation::token_changed_from_snapshot(
                "contractBeforeRevert",
                TOKEN,
                0
            )),
            transfer_to_alias("transferTokenCall", ALIAS_KEY, 2).with(TxnOptions::new().via("lazyCreateTxn")),
            get_account_balance(CONTRACT).has_balance(BalanceExpectation::token_changed_from_snapshot(
                "contractBeforeRevert",
                TOKEN,
                -2
            )),
        ])
        .then(ops![
            child_records_check(
                "revertTxn",
                ResponseCode::ContractRevertExecuted,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new().status(ResponseCode::RevertedSuccess)],
            ),
            child_records_check(
                "lazyCreateTxn",
                ResponseCode::Success,
                MatchMode::OrderedExact,
                vec![
                    RecordExpectation::new()
                        .status(ResponseCode::Success)
                        .alias(ALIAS_KEY)
                        .memo(HOLLOW_ACCOUNT_MEMO),
                    RecordExpectation::new()
                        .status(ResponseCode::Success)
                        .token_change(TOKEN, CONTRACT, -2),
                ],
            ),
            get_aliased_account_info(ALIAS_KEY).has_info(
                AccountInfoExpectation::new()
                    .key(KeyExpectation::Empty)
                    .alias(ALIAS_KEY)
                    .memo(HOLLOW_ACCOUNT_MEMO)
                    .receiver_sig_required(false)
            ),
            get_aliased_account_balance(ALIAS_KEY).has_balance(BalanceExpectation::token(TOKEN, 2)),
            get_account_balance(CONTRACT).has_balance(BalanceExpectation::token(TOKEN, 3)),
            reset_to_default(&[LAZY_CREATION_ENABLED]),
        ])
}

fn lazy_create_disabled() -> Spec {
    let mut given = ops![overriding(LAZY_CREATION_ENABLED, "false")];
    given.extend(funded_contract());
    Spec::new("lazyCreateWhenDisabledReverts")
        .preserving(&[LAZY_CREATION_ENABLED])
        .given(given)
        .when(ops![transfer_to_alias("transferTokenCall", ALIAS_KEY, 2).with(
            TxnOptions::new()
                .status(ResponseCode::ContractRevertExecuted)
                .via("disabledTxn")
        )])
        .then(ops![
            child_records_check(
                "disabledTxn",
                ResponseCode::ContractRevertExecuted,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new().status(ResponseCode::NotSupported)],
            ),
            get_aliased_account_info(ALIAS_KEY).has_cost_answer_precheck(ResponseCode::InvalidAccountId),
            get_account_balance(CONTRACT).has_balance(BalanceExpectation::token(TOKEN, 5)),
        ])
}

/// Each hollow account takes one preceding child record slot
fn lazy_create_bounded_by_preceding_records() -> Spec {
    let aliases = ["alias1", "alias2", "alias3", "alias4"];
    let mut given = ops![overriding_all(&[
        (LAZY_CREATION_ENABLED, "true"),
        (MAX_PRECEDING_RECORDS, "3")
    ])];
    given.extend(funded_contract());
    given.extend(aliases.iter().map(|alias| Operation::from(new_key_named(alias))));

    let mut accounts = vec![CONTRACT];
    accounts.extend(aliases);
    Spec::new("lazyCreateBeyondPrecedingRecordLimit")
        .preserving(&[LAZY_CREATION_ENABLED, MAX_PRECEDING_RECORDS])
        .given(given)
        .when(ops![contract_call(
            CONTRACT,
            "transferTokensCall",
            vec![address(TOKEN), addresses(&accounts), ints(&[-4, 1, 1, 1, 1])],
        )
        .with(
            TxnOptions::new()
                .status(ResponseCode::MaxChildRecordsExceeded)
                .via("tooManyTxn")
        )])
        .then(ops![
            empty_child_records_check("tooManyTxn", ResponseCode::MaxChildRecordsExceeded),
            get_aliased_account_info("alias1").has_cost_answer_precheck(ResponseCode::InvalidAccountId),
            get_account_balance(CONTRACT).has_balance(BalanceExpectation::token(TOKEN, 5)),
        ])
}

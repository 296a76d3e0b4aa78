// Token association and dissociation requested by a contract.

use crate::prelude::*;

const CONTRACT: &str = "associateContract";
const ACCOUNT: &str = "account";
const DELEGATE_KEY: &str = "delegateKey";
const TREASURY: &str = "treasury";
const TOKEN: &str = "fungibleToken";

pub fn suite() -> Suite {
    Suite::new(
        "associate",
        vec![
            associate_via_precompile(),
            associate_already_associated(),
            associate_without_account_signature(),
            dissociate_via_precompile(),
            auto_association_on_contract(),
        ],
    )
}

fn setup(delegate: bool) -> Vec<Operation> {
    let mut given = ops![
        crypto_create(TREASURY, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
        crypto_create(ACCOUNT, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
        token_create(TOKEN, TokenCreateOptions::fungible(1_000, TREASURY)),
        contract_create(CONTRACT, ContractCreateOptions::program(ASSOCIATE_DISSOCIATE)),
    ];
    if delegate {
        given.extend(ops![
            new_delegate_key(DELEGATE_KEY, CONTRACT),
            crypto_update_key(ACCOUNT, DELEGATE_KEY),
        ]);
    }
    given
}

fn associate_call(txn: &str, status: ResponseCode) -> Operation {
    contract_call(CONTRACT, "tokenAssociate", vec![address(ACCOUNT), address(TOKEN)])
        .with(TxnOptions::new().status(status).via(txn))
        .into()
}

fn associate_via_precompile() -> Spec {
    Spec::new("associateViaPrecompile")
        .given(setup(true))
        .when(ops![associate_call("associateTxn", ResponseCode::Success)])
        .then(ops![
            child_records_check(
                "associateTxn",
                ResponseCode::Success,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new()
                    .status(ResponseCode::Success)
                    .precompile(PrecompileExpectation::for_function(
                        FunctionType::HapiAssociate,
                        ResponseCode::Success,
                    ))],
            ),
            get_account_info(ACCOUNT).has_info(
                AccountInfoExpectation::new().relationship(TokenRelationshipExpectation::new(TOKEN).balance(0))
            ),
        ])
}

fn associate_already_associated() -> Spec {
    let mut given = setup(true);
    given.extend(ops![token_associate(ACCOUNT, &[TOKEN])]);
    Spec::new("associateAlreadyAssociatedReverts")
        .given(given)
        .when(ops![associate_call(
            "associateTxn",
            ResponseCode::ContractRevertExecuted
        )])
        .then(ops![child_records_check(
            "associateTxn",
            ResponseCode::ContractRevertExecuted,
            MatchMode::OrderedExact,
            vec![RecordExpectation::new()
                .status(ResponseCode::TokenAlreadyAssociatedToAccount)
                .precompile(PrecompileExpectation::for_function(
                    FunctionType::HapiAssociate,
                    ResponseCode::TokenAlreadyAssociatedToAccount,
                ))],
        )])
}

fn associate_without_account_signature() -> Spec {
    Spec::new("associateWithoutAccountKeyReverts")
        .given(setup(false))
        .when(ops![associate_call(
            "associateTxn",
            ResponseCode::ContractRevertExecuted
        )])
        .then(ops![
            child_records_check(
                "associateTxn",
                ResponseCode::ContractRevertExecuted,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new().status(ResponseCode::InvalidFullPrefixSignatureForPrecompile)],
            ),
            get_account_balance(ACCOUNT).has_balance(BalanceExpectation::tiny_bars(ONE_HUNDRED_HBARS)),
        ])
}

fn dissociate_via_precompile() -> Spec {
    let mut given = setup(true);
    given.extend(ops![token_associate(ACCOUNT, &[TOKEN])]);
    Spec::new("dissociateViaPrecompile")
        .given(given)
        .when(ops![
            contract_call(CONTRACT, "tokenDissociate", vec![address(ACCOUNT), address(TOKEN)])
                .with(TxnOptions::new().via("dissociateTxn")),
            contract_call(CONTRACT, "tokenDissociate", vec![address(ACCOUNT), address(TOKEN)]).with(
                TxnOptions::new()
                    .status(ResponseCode::ContractRevertExecuted)
                    .via("againTxn")
            ),
        ])
        .then(ops![
            child_records_check(
                "dissociateTxn",
                ResponseCode::Success,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new().precompile(PrecompileExpectation::for_function(
                    FunctionType::HapiDissociate,
                    ResponseCode::Success,
                ))],
            ),
            child_records_check(
                "againTxn",
                ResponseCode::ContractRevertExecuted,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new().status(ResponseCode::TokenNotAssociatedToAccount)],
            ),
        ])
}

/// A contract with a free slot is associated by the first transfer it receives
fn auto_association_on_contract() -> Spec {
    Spec::new("autoAssociationOnContract")
        .preserving(&[ALLOW_AUTO_ASSOCIATIONS])
        .given(ops![
            overriding(ALLOW_AUTO_ASSOCIATIONS, "true"),
            crypto_create(TREASURY, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
            token_create(TOKEN, TokenCreateOptions::fungible(1_000, TREASURY)),
            contract_create(
                CONTRACT,
                ContractCreateOptions::program(ASSOCIATE_DISSOCIATE).max_automatic_token_associations(1)
            ),
            get_contract_info(CONTRACT)
                .has_contract_info(ContractInfoExpectation::new().max_automatic_token_associations(1)),
        ])
        .when(ops![crypto_transfer(vec![Movement::token(TOKEN, TREASURY, CONTRACT, 7)])
            .with(TxnOptions::new().via("autoAssociateTxn"))])
        .then(ops![
            get_txn_record("autoAssociateTxn").has_record(
                RecordExpectation::new()
                    .new_association(TOKEN, CONTRACT)
                    .token_transfer(TOKEN, TREASURY, CONTRACT, 7)
            ),
            get_account_balance(CONTRACT).has_balance(BalanceExpectation::token(TOKEN, 7)),
        ])
}

// KYC grant, revoke and lookup through the precompile.

use crate::prelude::*;

const CONTRACT: &str = "kycContract";
const TREASURY: &str = "treasury";
const ACCOUNT: &str = "account";
const KYC_KEY: &str = "kycKey";
const TOKEN: &str = "kycToken";
const PLAIN_TOKEN: &str = "plainToken";

pub fn suite() -> Suite {
    Suite::new(
        "kyc",
        vec![
            grant_and_revoke_via_precompile(),
            grant_without_kyc_signature(),
            grant_on_token_without_kyc_key(),
            revoked_account_cannot_receive(),
        ],
    )
}

fn setup() -> Vec<Operation> {
    ops![
        new_key_named(KYC_KEY),
        crypto_create(TREASURY, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
        crypto_create(ACCOUNT, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
        token_create(TOKEN, TokenCreateOptions::fungible(1_000, TREASURY).kyc_key(KYC_KEY)),
        contract_create(CONTRACT, ContractCreateOptions::program(GRANT_REVOKE_KYC)),
        token_associate(ACCOUNT, &[TOKEN]),
    ]
}

fn kyc_call(function: &str, token: &str, txn: &str) -> ContractCallOp {
    contract_call(CONTRACT, function, vec![address(token), address(ACCOUNT)])
        .with(TxnOptions::new().also_signing_with(&[KYC_KEY]).via(txn))
}

fn is_kyc_granted(txn: &str, granted: bool) -> Vec<Operation> {
    ops![
        kyc_call("isKycGranted", TOKEN, txn),
        get_txn_record(txn).has_record(RecordExpectation::new().contract_result(
            ContractResultExpectation::new().returning(CONTRACT, "isKycGranted", vec![Token::Bool(granted)])
        )),
        child_records_check(
            txn,
            ResponseCode::Success,
            MatchMode::OrderedExact,
            vec![RecordExpectation::new().precompile(
                PrecompileExpectation::for_function(FunctionType::HapiIsKyc, ResponseCode::Success).with_flag(granted)
            )],
        ),
    ]
}

fn kyc_status(status: KycStatus) -> Operation {
    get_account_info(ACCOUNT)
        .has_info(AccountInfoExpectation::new().relationship(TokenRelationshipExpectation::new(TOKEN).kyc(status)))
        .into()
}

fn grant_and_revoke_via_precompile() -> Spec {
    let mut when = ops![kyc_status(KycStatus::Revoked)];
    when.extend(is_kyc_granted("beforeGrantTxn", false));
    when.extend(ops![kyc_call("tokenGrantKyc", TOKEN, "grantTxn"), kyc_status(KycStatus::Granted)]);
    when.extend(is_kyc_granted("afterGrantTxn", true));
    when.extend(ops![kyc_call("tokenRevokeKyc", TOKEN, "revokeTxn")]);

    Spec::new("grantAndRevokeKycViaPrecompile")
        .given(setup())
        .when(when)
        .then(ops![
            child_records_check(
                "grantTxn",
                ResponseCode::Success,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new().precompile(PrecompileExpectation::for_function(
                    FunctionType::HapiGrantKyc,
                    ResponseCode::Success
                ))],
            ),
            child_records_check(
                "revokeTxn",
                ResponseCode::Success,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new().precompile(PrecompileExpectation::for_function(
                    FunctionType::HapiRevokeKyc,
                    ResponseCode::Success
                ))],
            ),
            kyc_status(KycStatus::Revoked),
            get_token_info(TOKEN)
                .has_token_info(TokenInfoExpectation::new().kyc_key(KeyExpectation::Named(KYC_KEY.to_string()))),
        ])
}

fn grant_without_kyc_signature() -> Spec {
    Spec::new("grantKycWithoutKycKeyReverts")
        .given(setup())
        .when(ops![contract_call(
            CONTRACT,
            "tokenGrantKyc",
            vec![address(TOKEN), address(ACCOUNT)]
        )
        .with(
            TxnOptions::new()
                .status(ResponseCode::ContractRevertExecuted)
                .via("grantTxn")
        )])
        .then(ops![
            child_records_check(
                "grantTxn",
                ResponseCode::ContractRevertExecuted,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new().status(ResponseCode::InvalidFullPrefixSignatureForPrecompile)],
            ),
            kyc_status(KycStatus::Revoked),
        ])
}

fn grant_on_token_without_kyc_key() -> Spec {
    let mut given = setup();
    given.extend(ops![
        token_create(PLAIN_TOKEN, TokenCreateOptions::fungible(1_000, TREASURY)),
        token_associate(ACCOUNT, &[PLAIN_TOKEN]),
    ]);
    Spec::new("grantKycOnTokenWithoutKycKeyReverts")
        .given(given)
        .when(ops![kyc_call("tokenGrantKyc", PLAIN_TOKEN, "grantTxn")
            .with(
                TxnOptions::new()
                    .also_signing_with(&[KYC_KEY])
                    .status(ResponseCode::ContractRevertExecuted)
                    .via("grantTxn")
            )])
        .then(ops![
            child_records_check(
                "grantTxn",
                ResponseCode::ContractRevertExecuted,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new().status(ResponseCode::TokenHasNoKycKey)],
            ),
            get_account_info(ACCOUNT).has_info(AccountInfoExpectation::new().relationship(
                TokenRelationshipExpectation::new(PLAIN_TOKEN).kyc(KycStatus::KycNotApplicable)
            )),
        ])
}

/// Without a grant the account cannot take part in transfers of the token
fn revoked_account_cannot_receive() -> Spec {
    Spec::new("revokedKycBlocksTransfers")
        .given(setup())
        .when(ops![
            crypto_transfer(vec![Movement::token(TOKEN, TREASURY, ACCOUNT, 10)])
                .with(TxnOptions::new().status(ResponseCode::AccountKycNotGrantedForToken)),
            grant_token_kyc(TOKEN, ACCOUNT),
            crypto_transfer(vec![Movement::token(TOKEN, TREASURY, ACCOUNT, 10)]),
            revoke_token_kyc(TOKEN, ACCOUNT),
        ])
        .then(ops![
            get_account_balance(ACCOUNT).has_balance(BalanceExpectation::token(TOKEN, 10)),
            kyc_status(KycStatus::Revoked),
        ])
}

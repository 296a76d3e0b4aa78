//! Supply changes through the precompile.
//!
//! The mint contract is deployed with the token address as its only
//! constructor argument. The token's supply key signs the top-level call,
//! which is what lets the contract mint and burn.

use crate::prelude::*;

const CONTRACT: &str = "mintContract";
const TREASURY: &str = "treasury";
const SUPPLY_KEY: &str = "supplyKey";
const TOKEN: &str = "fungibleToken";
const NFT: &str = "nonFungibleToken";
const INITIAL_SUPPLY: u64 = 1_000;

pub fn suite() -> Suite {
    Suite::new(
        "mint_burn",
        vec![
            mint_fungible_via_precompile(),
            mint_with_event(),
            burn_fungible_via_precompile(),
            mint_without_supply_key(),
            mint_without_supply_signature(),
            mint_and_burn_nfts(),
        ],
    )
}

fn setup(with_supply_key: bool) -> Vec<Operation> {
    let mut token = TokenCreateOptions::fungible(INITIAL_SUPPLY, TREASURY);
    if with_supply_key {
        token = token.supply_key(SUPPLY_KEY);
    }
    ops![
        new_key_named(SUPPLY_KEY),
        crypto_create(TREASURY, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
        token_create(TOKEN, token),
        contract_create(
            CONTRACT,
            ContractCreateOptions::program(MINT_CONTRACT).constructor_args(vec![address(TOKEN)])
        ),
    ]
}

fn supply_signed(txn: &str) -> TxnOptions {
    TxnOptions::new().also_signing_with(&[SUPPLY_KEY]).via(txn)
}

fn mint_fungible_via_precompile() -> Spec {
    let amount = 10;
    let new_supply = INITIAL_SUPPLY + amount;
    Spec::new("mintFungibleViaPrecompile")
        .given(setup(true))
        .when(ops![contract_call(CONTRACT, "mintFungibleToken", vec![uint(amount)]).with(supply_signed("mintTxn"))])
        .then(ops![
            child_records_check(
                "mintTxn",
                ResponseCode::Success,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new()
                    .status(ResponseCode::Success)
                    .new_total_supply(new_supply)
                    .token_change(TOKEN, TREASURY, amount as i64)
                    .precompile(
                        PrecompileExpectation::for_function(FunctionType::HapiMint, ResponseCode::Success)
                            .with_total_supply(new_supply)
                    )],
            ),
            get_token_info(TOKEN).has_token_info(
                TokenInfoExpectation::new()
                    .total_supply(new_supply)
                    .supply_key(KeyExpectation::Named(SUPPLY_KEY.to_string()))
            ),
            get_account_balance(TREASURY).has_balance(BalanceExpectation::token(TOKEN, new_supply)),
        ])
}

fn mint_with_event() -> Spec {
    Spec::new("mintFungibleWithEvent")
        .given(setup(true))
        .when(ops![
            contract_call(CONTRACT, "mintFungibleTokenWithEvent", vec![uint(15)]).with(supply_signed("mintTxn"))
        ])
        .then(ops![get_txn_record("mintTxn").has_record(
            RecordExpectation::new()
                .child_count(1)
                .contract_result(ContractResultExpectation::new().logs(vec![
                    LogExpectation::new().with_topics(vec![topic_u64(INITIAL_SUPPLY + 15), topic_u64(0)])
                ]))
        )])
}

fn burn_fungible_via_precompile() -> Spec {
    let new_supply = INITIAL_SUPPLY - 5;
    Spec::new("burnFungibleViaPrecompile")
        .given(setup(true))
        .when(ops![
            contract_call(CONTRACT, "burnToken", vec![uint(5), ints(&[])]).with(supply_signed("burnTxn"))
        ])
        .then(ops![
            child_records_check(
                "burnTxn",
                ResponseCode::Success,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new()
                    .status(ResponseCode::Success)
                    .token_change(TOKEN, TREASURY, -5)
                    .precompile(
                        PrecompileExpectation::for_function(FunctionType::HapiBurn, ResponseCode::Success)
                            .with_total_supply(new_supply)
                    )],
            ),
            get_token_info(TOKEN).has_token_info(TokenInfoExpectation::new().total_supply(new_supply)),
        ])
}

fn mint_without_supply_key() -> Spec {
    Spec::new("mintWithoutSupplyKeyReverts")
        .given(setup(false))
        .when(ops![contract_call(CONTRACT, "mintFungibleToken", vec![uint(10)]).with(
            supply_signed("mintTxn").status(ResponseCode::ContractRevertExecuted)
        )])
        .then(ops![
            child_records_check(
                "mintTxn",
                ResponseCode::ContractRevertExecuted,
                MatchMode::OrderedExact,
                vec![RecordExpectation::new()
                    .status(ResponseCode::TokenHasNoSupplyKey)
                    .precompile(PrecompileExpectation::for_function(
                        FunctionType::HapiMint,
                        ResponseCode::TokenHasNoSupplyKey
                    ))],
            ),
            get_txn_record("mintTxn").has_record(RecordExpectation::new().contract_result(
                ContractResultExpectation::new().error_message(ResponseCode::TokenHasNoSupplyKey.to_string())
            )),
            get_token_info(TOKEN).has_token_info(TokenInfoExpectation::new().total_supply(INITIAL_SUPPLY)),
        ])
}

fn mint_without_supply_signature() -> Spec {
    Spec::new("mintWithoutSupplySignatureReverts")
        .given(setup(true))
        .when(ops![contract_call(CONTRACT, "mintFungibleToken", vec![uint(10)]).with(
            TxnOptions::new()
                .status(ResponseCode::ContractRevertExecuted)
                .via("mintTxn")
        )])
        .then(ops![child_records_check(
            "mintTxn",
            ResponseCode::ContractRevertExecuted,
            MatchMode::OrderedExact,
            vec![RecordExpectation::new().status(ResponseCode::InvalidFullPrefixSignatureForPrecompile)],
        )])
}

/// Unique tokens are minted and burned by serial number
fn mint_and_burn_nfts() -> Spec {
    Spec::new("mintAndBurnNfts")
        .given(ops![
            new_key_named(SUPPLY_KEY),
            crypto_create(TREASURY, CryptoCreateOptions::with_balance(ONE_HUNDRED_HBARS)),
            token_create(NFT, TokenCreateOptions::non_fungible(TREASURY, SUPPLY_KEY)),
        ])
        .when(ops![
            mint_nfts(NFT, vec![b"first".to_vec(), b"second".to_vec()]).with(TxnOptions::new().via("nftMintTxn")),
            burn_nfts(NFT, vec![1]),
        ])
        .then(ops![
            get_txn_record("nftMintTxn").has_record(
                RecordExpectation::new()
                    .serial_numbers(vec![1, 2])
                    .new_total_supply(2)
            ),
            get_token_info(NFT).has_token_info(TokenInfoExpectation::new().total_supply(1)),
            get_account_balance(TREASURY).has_balance(BalanceExpectation::token(NFT, 1)),
        ])
}

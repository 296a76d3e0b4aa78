// Token creation and token-service transactions.

use super::{CreateOp, NewEntity, TxnAction, TxnOp};
use hts_common::transaction::TokenType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCreateOptions {
    pub token_name: String,
    pub symbol: String,
    pub token_type: TokenType,
    pub initial_supply: u64,
    pub decimals: u32,
    /// Registry name of the treasury; the payer when unset
    pub treasury: Option<String>,
    pub admin_key: Option<String>,
    pub supply_key: Option<String>,
    pub kyc_key: Option<String>,
    /// Also bind the token's EVM address under this name
    pub expose_address: Option<String>,
}

impl Default for TokenCreateOptions {
    fn default() -> Self {
        Self {
            token_name: "token".to_string(),
            symbol: "TKN".to_string(),
            token_type: TokenType::FungibleCommon,
            initial_supply: 0,
            decimals: 0,
            treasury: None,
            admin_key: None,
            supply_key: None,
            kyc_key: None,
            expose_address: None,
        }
    }
}

impl TokenCreateOptions {
    pub fn fungible(initial_supply: u64, treasury: &str) -> Self {
        Self {
            initial_supply,
            treasury: Some(treasury.to_string()),
            ..Default::default()
        }
    }

    pub fn non_fungible(treasury: &str, supply_key: &str) -> Self {
        Self {
            token_type: TokenType::NonFungibleUnique,
            treasury: Some(treasury.to_string()),
            supply_key: Some(supply_key.to_string()),
            ..Default::default()
        }
    }

    pub fn admin_key(mut self, key: &str) -> Self {
        self.admin_key = Some(key.to_string());
        self
    }

    pub fn supply_key(mut self, key: &str) -> Self {
        self.supply_key = Some(key.to_string());
        self
    }

    pub fn kyc_key(mut self, key: &str) -> Self {
        self.kyc_key = Some(key.to_string());
        self
    }
}

pub fn token_create(name: &str, options: TokenCreateOptions) -> CreateOp {
    CreateOp::new(name, NewEntity::Token(options))
}

fn names(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

pub fn token_associate(account: &str, tokens: &[&str]) -> TxnOp {
    TxnOp::new(TxnAction::TokenAssociate {
        account: account.to_string(),
        tokens: names(tokens),
    })
}

pub fn token_dissociate(account: &str, tokens: &[&str]) -> TxnOp {
    TxnOp::new(TxnAction::TokenDissociate {
        account: account.to_string(),
        tokens: names(tokens),
    })
}

pub fn mint_token(token: &str, amount: u64) -> TxnOp {
    TxnOp::new(TxnAction::MintToken {
        token: token.to_string(),
        amount,
        metadata: Vec::new(),
    })
}

/// One NFT per metadata entry
pub fn mint_nfts(token: &str, metadata: Vec<Vec<u8>>) -> TxnOp {
    TxnOp::new(TxnAction::MintToken {
        token: token.to_string(),
        amount: 0,
        metadata,
    })
}

pub fn burn_token(token: &str, amount: u64) -> TxnOp {
    TxnOp::new(TxnAction::BurnToken {
        token: token.to_string(),
        amount,
        serial_numbers: Vec::new(),
    })
}

pub fn burn_nfts(token: &str, serial_numbers: Vec<i64>) -> TxnOp {
    TxnOp::new(TxnAction::BurnToken {
        token: token.to_string(),
        amount: 0,
        serial_numbers,
    })
}

pub fn grant_token_kyc(token: &str, account: &str) -> TxnOp {
    TxnOp::new(TxnAction::GrantKyc {
        token: token.to_string(),
        account: account.to_string(),
    })
}

pub fn revoke_token_kyc(token: &str, account: &str) -> TxnOp {
    TxnOp::new(TxnAction::RevokeKyc {
        token: token.to_string(),
        account: account.to_string(),
    })
}

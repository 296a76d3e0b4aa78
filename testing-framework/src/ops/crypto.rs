// Keys, accounts, transfers and allowances.

use super::{CreateOp, NewEntity, TxnAction, TxnOp};

/// Shape of a key created with [`new_key_named`] and friends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyShape {
    Secp256k1,
    /// Threshold-1 list of a fresh secp256k1 key and the contract's
    /// delegatable id, so the contract may act for the holder
    Delegate { contract: String },
    /// The contract's plain id key
    ContractId { contract: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CryptoCreateOptions {
    pub balance: u64,
    /// Registry name of the key; a fresh key when unset
    pub key: Option<String>,
    pub receiver_sig_required: bool,
    pub max_automatic_token_associations: i32,
    pub memo: String,
    /// Create with the EVM alias derived from this key, which also becomes the account key
    pub alias_key: Option<String>,
}

impl CryptoCreateOptions {
    pub fn with_balance(balance: u64) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }
}

pub fn new_key_named(name: &str) -> CreateOp {
    CreateOp::new(name, NewEntity::Key(KeyShape::Secp256k1))
}

pub fn new_delegate_key(name: &str, contract: &str) -> CreateOp {
    CreateOp::new(
        name,
        NewEntity::Key(KeyShape::Delegate {
            contract: contract.to_string(),
        }),
    )
}

pub fn new_contract_key(name: &str, contract: &str) -> CreateOp {
    CreateOp::new(
        name,
        NewEntity::Key(KeyShape::ContractId {
            contract: contract.to_string(),
        }),
    )
}

pub fn crypto_create(name: &str, options: CryptoCreateOptions) -> CreateOp {
    CreateOp::new(name, NewEntity::Account(options))
}

/// Replace the key of `account` with the key bound to `key`
pub fn crypto_update_key(account: &str, key: &str) -> TxnOp {
    TxnOp::new(TxnAction::CryptoUpdate {
        account: account.to_string(),
        key: Some(key.to_string()),
        receiver_sig_required: None,
        max_automatic_token_associations: None,
        memo: None,
    })
}

pub fn crypto_update(
    account: &str,
    receiver_sig_required: Option<bool>,
    max_automatic_token_associations: Option<i32>,
    memo: Option<String>,
) -> TxnOp {
    TxnOp::new(TxnAction::CryptoUpdate {
        account: account.to_string(),
        key: None,
        receiver_sig_required,
        max_automatic_token_associations,
        memo,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Movement {
    Hbar { from: String, to: String, amount: u64 },
    Token { token: String, from: String, to: String, amount: u64 },
    Nft { token: String, from: String, to: String, serial: i64 },
}

impl Movement {
    pub fn hbar(from: &str, to: &str, amount: u64) -> Self {
        Movement::Hbar {
            from: from.to_string(),
            to: to.to_string(),
            amount,
        }
    }

    pub fn token(token: &str, from: &str, to: &str, amount: u64) -> Self {
        Movement::Token {
            token: token.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            amount,
        }
    }

    pub fn nft(token: &str, from: &str, to: &str, serial: i64) -> Self {
        Movement::Nft {
            token: token.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            serial,
        }
    }

    pub(crate) fn sender(&self) -> &str {
        match self {
            Movement::Hbar { from, .. } | Movement::Token { from, .. } | Movement::Nft { from, .. } => from,
        }
    }
}

pub fn crypto_transfer(movements: Vec<Movement>) -> TxnOp {
    TxnOp::new(TxnAction::CryptoTransfer(movements))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allowance {
    Hbar {
        owner: String,
        spender: String,
        amount: u64,
    },
    Token {
        owner: String,
        token: String,
        spender: String,
        amount: u64,
    },
    Nft {
        owner: String,
        token: String,
        spender: String,
        serial_numbers: Vec<i64>,
        approved_for_all: bool,
    },
}

impl Allowance {
    pub fn hbar(owner: &str, spender: &str, amount: u64) -> Self {
        Allowance::Hbar {
            owner: owner.to_string(),
            spender: spender.to_string(),
            amount,
        }
    }

    pub fn token(owner: &str, token: &str, spender: &str, amount: u64) -> Self {
        Allowance::Token {
            owner: owner.to_string(),
            token: token.to_string(),
            spender: spender.to_string(),
            amount,
        }
    }

    pub fn nft(owner: &str, token: &str, spender: &str, serial_numbers: Vec<i64>) -> Self {
        Allowance::Nft {
            owner: owner.to_string(),
            token: token.to_string(),
            spender: spender.to_string(),
            serial_numbers,
            approved_for_all: false,
        }
    }

    pub(crate) fn owner(&self) -> &str {
        match self {
            Allowance::Hbar { owner, .. } | Allowance::Token { owner, .. } | Allowance::Nft { owner, .. } => owner,
        }
    }
}

pub fn crypto_approve_allowance(allowances: Vec<Allowance>) -> TxnOp {
    TxnOp::new(TxnAction::ApproveAllowance(allowances))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_key_action() {
        let op = crypto_update_key("sender", "delegate");
        match op.action {
            TxnAction::CryptoUpdate { account, key, .. } => {
                assert_eq!(account, "sender");
                assert_eq!(key.as_deref(), Some("delegate"));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_movement_senders() {
        assert_eq!(Movement::hbar("a", "b", 1).sender(), "a");
        assert_eq!(Movement::nft("t", "c", "d", 1).sender(), "c");
        assert_eq!(Allowance::token("o", "t", "s", 1).owner(), "o");
    }
}

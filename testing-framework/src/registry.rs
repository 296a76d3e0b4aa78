//! Per-spec name bindings.
//!
//! Operations that create ledger entities, or that expose values captured from
//! records and queries, bind them under author-chosen names. Later operations
//! of the same spec resolve those names here. A registry is owned by exactly
//! one spec run and dropped with it.

use crate::error::RegistryError;
use hts_common::abi::ContractAbi;
use hts_common::crypto::{EvmAddress, KeyMaterial};
use hts_common::query::AccountBalance;
use hts_common::record::TransactionRecord;
use hts_common::transaction::TokenType;
use hts_common::{AccountId, ContractId, TokenId};
use indexmap::IndexMap;
use std::sync::Arc;

/// Name under which every registry starts with the genesis payer
pub const GENESIS: &str = "genesis";

#[derive(Debug, Clone)]
pub struct AccountRef {
    pub id: AccountId,
    pub key: KeyMaterial,
    /// Set when the account was created with (or lazily from) an EVM alias
    pub alias: Option<EvmAddress>,
}

impl AccountRef {
    pub fn new(id: AccountId, key: KeyMaterial) -> Self {
        Self { id, key, alias: None }
    }

    pub fn mirror_address(&self) -> EvmAddress {
        self.id.to_mirror_address()
    }
}

#[derive(Debug, Clone)]
pub struct TokenRef {
    pub id: TokenId,
    pub token_type: TokenType,
    pub treasury: AccountId,
    // Registry names of the keys the token was created with
    pub admin_key: Option<String>,
    pub supply_key: Option<String>,
    pub kyc_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ContractRef {
    pub id: ContractId,
    pub program: String,
    pub abi: Arc<ContractAbi>,
    /// Registry name of the admin key; signs for the contract's account
    pub admin_key: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RegistryValue {
    Account(AccountRef),
    Token(TokenRef),
    Contract(ContractRef),
    Key(KeyMaterial),
    Address(EvmAddress),
    Record(Box<TransactionRecord>),
    Snapshot(AccountBalance),
}

impl RegistryValue {
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryValue::Account(_) => "account",
            RegistryValue::Token(_) => "token",
            RegistryValue::Contract(_) => "contract",
            RegistryValue::Key(_) => "key",
            RegistryValue::Address(_) => "address",
            RegistryValue::Record(_) => "record",
            RegistryValue::Snapshot(_) => "snapshot",
        }
    }

    fn describe(&self) -> String {
        match self {
            RegistryValue::Account(a) => match a.alias {
                Some(alias) => format!("{} ({})", a.id, alias),
                None => a.id.to_string(),
            },
            RegistryValue::Token(t) => format!("{} [{}]", t.id, t.token_type),
            RegistryValue::Contract(c) => format!("{} <{}>", c.id, c.program),
            RegistryValue::Key(k) => format!("{:?}", k.key()),
            RegistryValue::Address(a) => a.to_string(),
            RegistryValue::Record(r) => format!("{} {}", r.transaction_id, r.status()),
            RegistryValue::Snapshot(s) => format!("{} @ {} tinybars", s.account, s.hbars),
        }
    }
}

/// Insertion-ordered name store
#[derive(Debug, Default)]
pub struct Registry {
    entries: IndexMap<String, RegistryValue>,
}

macro_rules! typed_getter {
    ($fn_name:ident, $variant:ident, $ty:ty, $label:expr) => {
        pub fn $fn_name(&self, name: &str) -> Result<&$ty, RegistryError> {
            match self.get(name)? {
                RegistryValue::$variant(value) => Ok(value),
                other => Err(RegistryError::WrongKind {
                    name: name.to_string(),
                    expected: $label,
                    actual: other.kind(),
                }),
            }
        }
    };
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the genesis payer
    pub fn with_genesis(genesis: AccountRef) -> Self {
        let mut registry = Self::new();
        registry
            .entries
            .insert(GENESIS.to_string(), RegistryValue::Account(genesis));
        registry
    }

    pub fn put(&mut self, name: &str, value: RegistryValue) -> Result<(), RegistryError> {
        if self.entries.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        log::debug!("bind '{}' = {}", name, value.describe());
        self.entries.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&RegistryValue, RegistryError> {
        self.entries
            .get(name)
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    typed_getter!(account, Account, AccountRef, "account");
    typed_getter!(token, Token, TokenRef, "token");
    typed_getter!(contract, Contract, ContractRef, "contract");
    typed_getter!(key, Key, KeyMaterial, "key");
    typed_getter!(snapshot, Snapshot, AccountBalance, "snapshot");

    pub fn record(&self, name: &str) -> Result<&TransactionRecord, RegistryError> {
        match self.get(name)? {
            RegistryValue::Record(record) => Ok(record),
            other => Err(RegistryError::WrongKind {
                name: name.to_string(),
                expected: "record",
                actual: other.kind(),
            }),
        }
    }

    /// Ledger account id behind a name; contracts are accounts too
    pub fn account_id(&self, name: &str) -> Result<AccountId, RegistryError> {
        match self.get(name)? {
            RegistryValue::Account(account) => Ok(account.id),
            RegistryValue::Contract(contract) => Ok(contract.id.into()),
            other => Err(RegistryError::WrongKind {
                name: name.to_string(),
                expected: "account",
                actual: other.kind(),
            }),
        }
    }

    pub fn token_id(&self, name: &str) -> Result<TokenId, RegistryError> {
        self.token(name).map(|t| t.id)
    }

    pub fn contract_id(&self, name: &str) -> Result<ContractId, RegistryError> {
        self.contract(name).map(|c| c.id)
    }

    /// EVM address a contract would use to reference `name`.
    ///
    /// Entities resolve to their mirror address, captured addresses to
    /// themselves and keys to their alias.
    pub fn address_of(&self, name: &str) -> Result<EvmAddress, RegistryError> {
        match self.get(name)? {
            RegistryValue::Account(account) => Ok(account.mirror_address()),
            RegistryValue::Token(token) => Ok(token.id.to_mirror_address()),
            RegistryValue::Contract(contract) => Ok(contract.id.to_mirror_address()),
            RegistryValue::Address(address) => Ok(*address),
            RegistryValue::Key(key) => key.evm_address().ok_or_else(|| RegistryError::WrongKind {
                name: name.to_string(),
                expected: "secp256k1 key",
                actual: "complex key",
            }),
            other => Err(RegistryError::WrongKind {
                name: name.to_string(),
                expected: "addressable entity",
                actual: other.kind(),
            }),
        }
    }

    /// Key material that signs on behalf of `name`
    pub fn signing_key(&self, name: &str) -> Result<&KeyMaterial, RegistryError> {
        match self.get(name)? {
            RegistryValue::Account(account) => Ok(&account.key),
            RegistryValue::Key(key) => Ok(key),
            RegistryValue::Contract(ContractRef {
                admin_key: Some(admin_key),
                ..
            }) if admin_key != name => self.signing_key(admin_key),
            other => Err(RegistryError::WrongKind {
                name: name.to_string(),
                expected: "account or key",
                actual: other.kind(),
            }),
        }
    }

    /// Rebind an account's signing key after a successful key update
    pub fn rebind_account_key(&mut self, name: &str, key: KeyMaterial) -> Result<(), RegistryError> {
        match self.entries.get_mut(name) {
            Some(RegistryValue::Account(account)) => {
                log::debug!("rebind key of '{}'", name);
                account.key = key;
                Ok(())
            }
            Some(other) => Err(RegistryError::WrongKind {
                name: name.to_string(),
                expected: "account",
                actual: other.kind(),
            }),
            None => Err(RegistryError::UnknownName(name.to_string())),
        }
    }

    /// One line per binding, in the order they were made
    pub fn dump(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(name, value)| format!("{} ({}): {}", name, value.kind(), value.describe()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn account(num: u64) -> AccountRef {
        AccountRef::new(
            AccountId::from_num(num),
            KeyMaterial::generate(&mut StdRng::seed_from_u64(num)),
        )
    }

    #[test]
    fn test_put_then_get_is_stable() {
        let mut registry = Registry::new();
        registry.put("alice", RegistryValue::Account(account(1001))).unwrap();
        assert_eq!(registry.account("alice").unwrap().id, AccountId::from_num(1001));
        assert_eq!(registry.account("alice").unwrap().id, AccountId::from_num(1001));
    }

    #[test]
    fn test_duplicate_across_kinds_rejected() {
        let mut registry = Registry::new();
        registry.put("x", RegistryValue::Account(account(1))).unwrap();
        assert_eq!(
            registry.put("x", RegistryValue::Address(EvmAddress::ZERO)),
            Err(RegistryError::DuplicateName("x".into()))
        );
    }

    #[test]
    fn test_unknown_and_wrong_kind() {
        let mut registry = Registry::new();
        registry.put("addr", RegistryValue::Address(EvmAddress::ZERO)).unwrap();
        assert_eq!(
            registry.account("nobody").unwrap_err(),
            RegistryError::UnknownName("nobody".into())
        );
        assert!(matches!(
            registry.token("addr"),
            Err(RegistryError::WrongKind { expected: "token", actual: "address", .. })
        ));
    }

    #[test]
    fn test_address_resolution() {
        let mut registry = Registry::with_genesis(account(2));
        let key = KeyMaterial::generate(&mut StdRng::seed_from_u64(9));
        let alias = key.evm_address().unwrap();
        registry.put("ecdsa", RegistryValue::Key(key)).unwrap();
        registry
            .put(
                "token",
                RegistryValue::Token(TokenRef {
                    id: TokenId::from_num(1002),
                    token_type: TokenType::FungibleCommon,
                    treasury: AccountId::from_num(2),
                    admin_key: None,
                    supply_key: None,
                    kyc_key: None,
                }),
            )
            .unwrap();

        assert_eq!(registry.address_of("ecdsa").unwrap(), alias);
        assert_eq!(
            registry.address_of("token").unwrap(),
            TokenId::from_num(1002).to_mirror_address()
        );
        assert_eq!(
            registry.address_of(GENESIS).unwrap(),
            AccountId::from_num(2).to_mirror_address()
        );
    }

    #[test]
    fn test_rebind_key_only_for_accounts() {
        let mut registry = Registry::with_genesis(account(2));
        let new_key = KeyMaterial::generate(&mut StdRng::seed_from_u64(77));
        registry.rebind_account_key(GENESIS, new_key.clone()).unwrap();
        assert_eq!(registry.account(GENESIS).unwrap().key, new_key);

        registry.put("k", RegistryValue::Key(new_key.clone())).unwrap();
        assert!(registry.rebind_account_key("k", new_key).is_err());
    }

    #[test]
    fn test_dump_keeps_insertion_order() {
        let mut registry = Registry::new();
        registry.put("b", RegistryValue::Address(EvmAddress::ZERO)).unwrap();
        registry.put("a", RegistryValue::Account(account(5))).unwrap();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(registry.dump()[1].starts_with("a (account)"));
    }
}

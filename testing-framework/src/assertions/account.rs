// Expectations over query answers: balances, account, token and contract info.

use crate::error::{HarnessResult, Mismatch};
use crate::registry::Registry;
use hts_common::crypto::Key;
use hts_common::query::{AccountBalance, AccountInfo, ContractInfo, KycStatus, TokenInfo};
use std::fmt::Debug;

/// Expected key of an account, token or contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyExpectation {
    Empty,
    /// The key bound to this registry name (or held by this account)
    Named(String),
}

impl KeyExpectation {
    fn resolve(&self, registry: &Registry) -> HarnessResult<Key> {
        Ok(match self {
            KeyExpectation::Empty => Key::Empty,
            KeyExpectation::Named(name) => registry.signing_key(name)?.key().clone(),
        })
    }
}

fn compare<T: PartialEq + Debug>(mismatches: &mut Vec<Mismatch>, field: &str, expected: &Option<T>, observed: &T) {
    if let Some(expected) = expected {
        if expected != observed {
            mismatches.push(Mismatch::new(field, format!("{:?}", expected), format!("{:?}", observed)));
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BalanceExpectation {
    pub hbars: Option<u64>,
    pub tokens: Vec<(String, u64)>,
    /// Hbar change relative to a balance snapshot bound earlier
    pub change_from_snapshot: Option<(String, i64)>,
    /// (snapshot, token, delta)
    pub token_changes_from_snapshot: Vec<(String, String, i64)>,
}

impl BalanceExpectation {
    pub fn tiny_bars(hbars: u64) -> Self {
        Self {
            hbars: Some(hbars),
            ..Default::default()
        }
    }

    pub fn token(token: &str, amount: u64) -> Self {
        Self::default().and_token(token, amount)
    }

    pub fn and_token(mut self, token: &str, amount: u64) -> Self {
        self.tokens.push((token.to_string(), amount));
        self
    }

    pub fn changed_from_snapshot(snapshot: &str, delta: i64) -> Self {
        Self {
            change_from_snapshot: Some((snapshot.to_string(), delta)),
            ..Default::default()
        }
    }

    /// Fungible balance of `token` changed by `delta` since `snapshot`
    pub fn token_changed_from_snapshot(snapshot: &str, token: &str, delta: i64) -> Self {
        Self::default().and_token_change(snapshot, token, delta)
    }

    pub fn and_token_change(mut self, snapshot: &str, token: &str, delta: i64) -> Self {
        self.token_changes_from_snapshot
            .push((snapshot.to_string(), token.to_string(), delta));
        self
    }

    pub fn check(&self, balance: &AccountBalance, registry: &Registry) -> HarnessResult<Vec<Mismatch>> {
        let mut mismatches = Vec::new();
        compare(&mut mismatches, "hbars", &self.hbars, &balance.hbars);
        for (token, expected) in &self.tokens {
            let id = registry.token_id(token)?;
            let observed = balance.token(&id);
            if observed != *expected {
                mismatches.push(Mismatch::new(format!("tokens[{}]", token), expected, observed));
            }
        }
        if let Some((snapshot, delta)) = &self.change_from_snapshot {
            let before = registry.snapshot(snapshot)?;
            let observed = balance.hbars as i64 - before.hbars as i64;
            if observed != *delta {
                mismatches.push(Mismatch::new(format!("hbars since '{}'", snapshot), delta, observed));
            }
        }
        for (snapshot, token, delta) in &self.token_changes_from_snapshot {
            let before = registry.snapshot(snapshot)?;
            let id = registry.token_id(token)?;
            let observed = balance.token(&id) as i128 - before.token(&id) as i128;
            if observed != *delta as i128 {
                mismatches.push(Mismatch::new(
                    format!("tokens[{}] since '{}'", token, snapshot),
                    delta,
                    observed,
                ));
            }
        }
        Ok(mismatches)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRelationshipExpectation {
    pub token: String,
    pub balance: Option<u64>,
    pub kyc: Option<KycStatus>,
}

impl TokenRelationshipExpectation {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            balance: None,
            kyc: None,
        }
    }

    pub fn balance(mut self, balance: u64) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn kyc(mut self, kyc: KycStatus) -> Self {
        self.kyc = Some(kyc);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountInfoExpectation {
    pub key: Option<KeyExpectation>,
    pub alias: Option<String>,
    pub memo: Option<String>,
    pub receiver_sig_required: Option<bool>,
    pub balance: Option<u64>,
    pub max_automatic_token_associations: Option<i32>,
    /// (spender, amount) pairs that must be present
    pub crypto_allowances: Vec<(String, u64)>,
    /// (token, spender, amount) triples that must be present
    pub token_allowances: Vec<(String, String, u64)>,
    pub no_allowances: bool,
    pub token_relationships: Vec<TokenRelationshipExpectation>,
}

impl AccountInfoExpectation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: KeyExpectation) -> Self {
        self.key = Some(key);
        self
    }

    pub fn no_key(self) -> Self {
        self.key(KeyExpectation::Empty)
    }

    pub fn alias(mut self, name: &str) -> Self {
        self.alias = Some(name.to_string());
        self
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn receiver_sig_required(mut self, required: bool) -> Self {
        self.receiver_sig_required = Some(required);
        self
    }

    pub fn balance(mut self, balance: u64) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn max_automatic_token_associations(mut self, max: i32) -> Self {
        self.max_automatic_token_associations = Some(max);
        self
    }

    pub fn crypto_allowance(mut self, spender: &str, amount: u64) -> Self {
        self.crypto_allowances.push((spender.to_string(), amount));
        self
    }

    pub fn token_allowance(mut self, token: &str, spender: &str, amount: u64) -> Self {
        self.token_allowances
            .push((token.to_string(), spender.to_string(), amount));
        self
    }

    pub fn no_allowances(mut self) -> Self {
        self.no_allowances = true;
        self
    }

    pub fn relationship(mut self, rel: TokenRelationshipExpectation) -> Self {
        self.token_relationships.push(rel);
        self
    }

    pub fn check(&self, info: &AccountInfo, registry: &Registry) -> HarnessResult<Vec<Mismatch>> {
        let mut mismatches = Vec::new();
        if let Some(key) = &self.key {
            let expected = key.resolve(registry)?;
            compare(&mut mismatches, "key", &Some(expected), &info.key);
        }
        if let Some(name) = &self.alias {
            let expected = registry.address_of(name)?;
            compare(&mut mismatches, "alias", &Some(Some(expected)), &info.alias);
        }
        compare(&mut mismatches, "memo", &self.memo, &info.memo);
        compare(
            &mut mismatches,
            "receiver_sig_required",
            &self.receiver_sig_required,
            &info.receiver_sig_required,
        );
        compare(&mut mismatches, "balance", &self.balance, &info.balance);
        compare(
            &mut mismatches,
            "max_automatic_token_associations",
            &self.max_automatic_token_associations,
            &info.max_automatic_token_associations,
        );

        for (spender, amount) in &self.crypto_allowances {
            let spender_id = registry.account_id(spender)?;
            let present = info
                .crypto_allowances
                .iter()
                .any(|a| a.spender == spender_id && a.amount == *amount);
            if !present {
                mismatches.push(Mismatch::new(
                    format!("crypto_allowances[{}]", spender),
                    amount,
                    format!("{:?}", info.crypto_allowances),
                ));
            }
        }
        for (token, spender, amount) in &self.token_allowances {
            let token_id = registry.token_id(token)?;
            let spender_id = registry.account_id(spender)?;
            let present = info
                .token_allowances
                .iter()
                .any(|a| a.token == token_id && a.spender == spender_id && a.amount == *amount);
            if !present {
                mismatches.push(Mismatch::new(
                    format!("token_allowances[{}/{}]", token, spender),
                    amount,
                    format!("{:?}", info.token_allowances),
                ));
            }
        }
        if self.no_allowances {
            let total = info.crypto_allowances.len() + info.token_allowances.len();
            if total > 0 {
                mismatches.push(Mismatch::new("allowances", "none", format!("{} present", total)));
            }
        }

        for rel in &self.token_relationships {
            let token_id = registry.token_id(&rel.token)?;
            match info.relationship(&token_id) {
                Some(observed) => {
                    let field = |name: &str| format!("token_relationships[{}].{}", rel.token, name);
                    compare(&mut mismatches, &field("balance"), &rel.balance, &observed.balance);
                    compare(&mut mismatches, &field("kyc_status"), &rel.kyc, &observed.kyc_status);
                }
                None => mismatches.push(Mismatch::new(
                    format!("token_relationships[{}]", rel.token),
                    "associated",
                    "absent",
                )),
            }
        }
        Ok(mismatches)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenInfoExpectation {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub total_supply: Option<u64>,
    pub treasury: Option<String>,
    pub supply_key: Option<KeyExpectation>,
    pub kyc_key: Option<KeyExpectation>,
    pub admin_key: Option<KeyExpectation>,
}

impl TokenInfoExpectation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_supply(mut self, supply: u64) -> Self {
        self.total_supply = Some(supply);
        self
    }

    pub fn treasury(mut self, name: &str) -> Self {
        self.treasury = Some(name.to_string());
        self
    }

    pub fn supply_key(mut self, key: KeyExpectation) -> Self {
        self.supply_key = Some(key);
        self
    }

    pub fn kyc_key(mut self, key: KeyExpectation) -> Self {
        self.kyc_key = Some(key);
        self
    }

    pub fn check(&self, info: &TokenInfo, registry: &Registry) -> HarnessResult<Vec<Mismatch>> {
        let mut mismatches = Vec::new();
        compare(&mut mismatches, "name", &self.name, &info.name);
        compare(&mut mismatches, "symbol", &self.symbol, &info.symbol);
        compare(&mut mismatches, "total_supply", &self.total_supply, &info.total_supply);
        if let Some(treasury) = &self.treasury {
            compare(&mut mismatches, "treasury", &Some(registry.account_id(treasury)?), &info.treasury);
        }
        for (field, expected, observed) in [
            ("supply_key", &self.supply_key, &info.supply_key),
            ("kyc_key", &self.kyc_key, &info.kyc_key),
            ("admin_key", &self.admin_key, &info.admin_key),
        ] {
            if let Some(expected) = expected {
                // An absent key reads as Empty
                let expected = Some(expected.resolve(registry)?);
                let observed = observed.clone().unwrap_or(Key::Empty);
                compare(&mut mismatches, field, &expected, &observed);
            }
        }
        Ok(mismatches)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContractInfoExpectation {
    pub max_automatic_token_associations: Option<i32>,
    pub balance: Option<u64>,
    pub memo: Option<String>,
    pub admin_key: Option<KeyExpectation>,
}

impl ContractInfoExpectation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_automatic_token_associations(mut self, max: i32) -> Self {
        self.max_automatic_token_associations = Some(max);
        self
    }

    pub fn balance(mut self, balance: u64) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn check(&self, info: &ContractInfo, registry: &Registry) -> HarnessResult<Vec<Mismatch>> {
        let mut mismatches = Vec::new();
        compare(
            &mut mismatches,
            "max_automatic_token_associations",
            &self.max_automatic_token_associations,
            &info.max_automatic_token_associations,
        );
        compare(&mut mismatches, "balance", &self.balance, &info.balance);
        compare(&mut mismatches, "memo", &self.memo, &info.memo);
        if let Some(key) = &self.admin_key {
            let expected = Some(key.resolve(registry)?);
            compare(&mut mismatches, "admin_key", &expected, &info.admin_key.clone().unwrap_or(Key::Empty));
        }
        Ok(mismatches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AccountRef, RegistryValue, TokenRef};
    use hts_common::crypto::{EvmAddress, KeyMaterial};
    use hts_common::query::TokenRelationship;
    use hts_common::transaction::{CryptoAllowance, TokenType};
    use hts_common::{AccountId, TokenId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn registry() -> Registry {
        let mut rng = StdRng::seed_from_u64(9);
        let mut registry = Registry::new();
        registry
            .put(
                "owner",
                RegistryValue::Account(AccountRef::new(AccountId::from_num(1001), KeyMaterial::generate(&mut rng))),
            )
            .unwrap();
        registry
            .put(
                "spender",
                RegistryValue::Account(AccountRef::new(AccountId::from_num(1002), KeyMaterial::generate(&mut rng))),
            )
            .unwrap();
        registry
            .put(
                "token",
                RegistryValue::Token(TokenRef {
                    id: TokenId::from_num(1003),
                    token_type: TokenType::FungibleCommon,
                    treasury: AccountId::from_num(1001),
                    admin_key: None,
                    supply_key: None,
                    kyc_key: None,
                }),
            )
            .unwrap();
        registry
    }

    fn info() -> AccountInfo {
        AccountInfo {
            account: AccountId::from_num(1001),
            evm_address: EvmAddress::ZERO,
            alias: None,
            key: Key::Empty,
            balance: 10,
            receiver_sig_required: false,
            memo: "lazy-created account".to_string(),
            max_automatic_token_associations: 5,
            crypto_allowances: vec![CryptoAllowance {
                owner: AccountId::from_num(1001),
                spender: AccountId::from_num(1002),
                amount: 10,
            }],
            token_allowances: Vec::new(),
            token_relationships: vec![TokenRelationship {
                token: TokenId::from_num(1003),
                balance: 2,
                kyc_status: KycStatus::Granted,
                automatic_association: false,
            }],
        }
    }

    #[test]
    fn test_account_info_matches() {
        let registry = registry();
        let expectation = AccountInfoExpectation::new()
            .no_key()
            .memo("lazy-created account")
            .receiver_sig_required(false)
            .crypto_allowance("spender", 10)
            .relationship(TokenRelationshipExpectation::new("token").balance(2).kyc(KycStatus::Granted));
        assert!(expectation.check(&info(), &registry).unwrap().is_empty());
    }

    #[test]
    fn test_no_allowances_fails_when_present() {
        let registry = registry();
        let mismatches = AccountInfoExpectation::new()
            .no_allowances()
            .check(&info(), &registry)
            .unwrap();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].field, "allowances");
    }

    #[test]
    fn test_balance_change_from_snapshot() {
        let mut registry = registry();
        let before = AccountBalance {
            account: AccountId::from_num(1001),
            hbars: 1000,
            tokens: Default::default(),
        };
        registry.put("before", RegistryValue::Snapshot(before.clone())).unwrap();
        let after = AccountBalance { hbars: 900, ..before };
        let expectation = BalanceExpectation::changed_from_snapshot("before", -100);
        assert!(expectation.check(&after, &registry).unwrap().is_empty());
    }

    #[test]
    fn test_token_change_from_snapshot() {
        let mut registry = registry();
        let token = TokenId::from_num(1003);
        let before = AccountBalance {
            account: AccountId::from_num(1001),
            hbars: 1000,
            tokens: [(token, 5)].into_iter().collect(),
        };
        registry.put("before", RegistryValue::Snapshot(before.clone())).unwrap();
        let after = AccountBalance {
            tokens: [(token, 3)].into_iter().collect(),
            ..before
        };

        let unchanged = BalanceExpectation::token_changed_from_snapshot("before", "token", 0);
        let mismatches = unchanged.check(&after, &registry).unwrap();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].field, "tokens[token] since 'before'");
        assert_eq!(mismatches[0].observed, "-2");

        let debited = BalanceExpectation::token_changed_from_snapshot("before", "token", -2);
        assert!(debited.check(&after, &registry).unwrap().is_empty());
    }
}

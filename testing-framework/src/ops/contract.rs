//! Contract creation and calls.
//!
//! Arguments are declared as [`Arg`] trees. Registry names inside them are
//! resolved to EVM addresses at dispatch time and the resulting tokens are
//! encoded through the function's declared schema.

use super::{CreateOp, NewEntity, RecordExposure, TxnOptions};
use crate::error::HarnessResult;
use crate::registry::Registry;
use hts_common::abi::Token;
use hts_common::crypto::EvmAddress;
use hts_common::record::TransactionRecord;
use primitive_types::U256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// EVM address of a registry name
    Address(String),
    Value(Token),
    Array(Vec<Arg>),
    Tuple(Vec<Arg>),
}

impl Arg {
    pub fn resolve(&self, registry: &Registry) -> HarnessResult<Token> {
        Ok(match self {
            Arg::Address(name) => Token::Address(registry.address_of(name)?),
            Arg::Value(token) => token.clone(),
            Arg::Array(items) => Token::Array(resolve_all(items, registry)?),
            Arg::Tuple(items) => Token::Tuple(resolve_all(items, registry)?),
        })
    }
}

pub fn resolve_all(args: &[Arg], registry: &Registry) -> HarnessResult<Vec<Token>> {
    args.iter().map(|arg| arg.resolve(registry)).collect()
}

impl From<Token> for Arg {
    fn from(token: Token) -> Self {
        Arg::Value(token)
    }
}

pub fn address(name: &str) -> Arg {
    Arg::Address(name.to_string())
}

pub fn address_literal(address: EvmAddress) -> Arg {
    Arg::Value(Token::Address(address))
}

pub fn int(value: i64) -> Arg {
    Arg::Value(Token::int(value))
}

pub fn uint(value: u64) -> Arg {
    Arg::Value(Token::uint(value))
}

pub fn uint256(value: U256) -> Arg {
    Arg::Value(Token::Uint(value))
}

pub fn boolean(value: bool) -> Arg {
    Arg::Value(Token::Bool(value))
}

pub fn addresses(names: &[&str]) -> Arg {
    Arg::Array(names.iter().map(|n| address(n)).collect())
}

pub fn ints(values: &[i64]) -> Arg {
    Arg::Array(values.iter().map(|v| int(*v)).collect())
}

/// `(address,int64,bool)` account amount
pub fn account_amount(account: &str, amount: i64, is_approval: bool) -> Arg {
    Arg::Tuple(vec![address(account), int(amount), boolean(is_approval)])
}

/// `((address,int64,bool)[])` hbar transfer list
pub fn transfer_list(amounts: Vec<Arg>) -> Arg {
    Arg::Tuple(vec![Arg::Array(amounts)])
}

/// `(address,address,int64,bool)` NFT movement
pub fn nft_transfer(sender: &str, receiver: &str, serial: i64, is_approval: bool) -> Arg {
    Arg::Tuple(vec![address(sender), address(receiver), int(serial), boolean(is_approval)])
}

/// One entry of the token transfer lists argument
pub fn token_transfer_list(token: &str, amounts: Vec<Arg>, nfts: Vec<Arg>) -> Arg {
    Arg::Tuple(vec![address(token), Arg::Array(amounts), Arg::Array(nfts)])
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractCreateOptions {
    pub program: String,
    /// Harness default gas when unset
    pub gas: Option<u64>,
    pub admin_key: Option<String>,
    pub max_automatic_token_associations: i32,
    pub constructor_args: Vec<Arg>,
    pub balance: u64,
    pub memo: String,
    pub expose_address: Option<String>,
}

impl ContractCreateOptions {
    pub fn program(program: &str) -> Self {
        Self {
            program: program.to_string(),
            ..Default::default()
        }
    }

    pub fn constructor_args(mut self, args: Vec<Arg>) -> Self {
        self.constructor_args = args;
        self
    }

    pub fn max_automatic_token_associations(mut self, max: i32) -> Self {
        self.max_automatic_token_associations = max;
        self
    }

    pub fn gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn admin_key(mut self, key: &str) -> Self {
        self.admin_key = Some(key.to_string());
        self
    }

    pub fn balance(mut self, tinybars: u64) -> Self {
        self.balance = tinybars;
        self
    }

    pub fn expose_address(mut self, name: &str) -> Self {
        self.expose_address = Some(name.to_string());
        self
    }
}

/// Deploy `program` as a contract bound under `name`
pub fn contract_create(name: &str, options: ContractCreateOptions) -> CreateOp {
    CreateOp::new(name, NewEntity::Contract(options))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContractCallOptions {
    /// Harness default gas when unset
    pub gas: Option<u64>,
    /// Tinybars sent with the call
    pub value: u64,
}

pub struct ContractCallOp {
    pub contract: String,
    pub function: String,
    pub args: Vec<Arg>,
    pub call: ContractCallOptions,
    pub options: TxnOptions,
    pub exposures: Vec<RecordExposure>,
}

impl ContractCallOp {
    pub fn with(mut self, options: TxnOptions) -> Self {
        self.options = options;
        self
    }

    pub fn gas(mut self, gas: u64) -> Self {
        self.call.gas = Some(gas);
        self
    }

    pub fn sending(mut self, value: u64) -> Self {
        self.call.value = value;
        self
    }

    pub fn exposing<F>(mut self, exposure: F) -> Self
    where
        F: FnOnce(&TransactionRecord, &mut Registry) -> HarnessResult<()> + Send + 'static,
    {
        self.exposures.push(Box::new(exposure));
        self
    }

    pub(super) fn describe(&self) -> String {
        let mut description = format!("call {}.{}", self.contract, self.function);
        if let Some(via) = &self.options.via {
            description.push_str(&format!(" via '{}'", via));
        }
        description
    }
}

pub fn contract_call(contract: &str, function: &str, args: Vec<Arg>) -> ContractCallOp {
    ContractCallOp {
        contract: contract.to_string(),
        function: function.to_string(),
        args,
        call: ContractCallOptions::default(),
        options: TxnOptions::default(),
        exposures: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AccountRef, RegistryValue};
    use hts_common::abi::{parse_type_list, encode};
    use hts_common::crypto::KeyMaterial;
    use hts_common::AccountId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_transfer_list_resolves_to_schema() {
        let mut registry = Registry::new();
        let mut rng = StdRng::seed_from_u64(1);
        for (name, num) in [("sender", 1001), ("receiver", 1002)] {
            registry
                .put(
                    name,
                    RegistryValue::Account(AccountRef::new(AccountId::from_num(num), KeyMaterial::generate(&mut rng))),
                )
                .unwrap();
        }
        let arg = transfer_list(vec![
            account_amount("sender", -50, false),
            account_amount("receiver", 50, false),
        ]);
        let token = arg.resolve(&registry).unwrap();
        let types = parse_type_list("((address,int64,bool)[])").unwrap();
        assert!(token.matches(&types[0]));
        assert!(encode(&types, &[token]).is_ok());
    }

    #[test]
    fn test_unknown_name_fails_resolution() {
        let registry = Registry::new();
        assert!(address("ghost").resolve(&registry).is_err());
    }
}

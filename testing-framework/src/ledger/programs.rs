//! Contract programs deployable on the test ledger.
//!
//! Programs are native handlers addressed by function selector. Each one
//! mirrors a small Solidity contract that forwards to the token service and
//! reverts when the service answers with anything other than SUCCESS.

use super::precompile::{topic_u64, CallFrame, Revert};
use crate::contracts::{
    AbiCatalog, ASSOCIATE_DISSOCIATE, ATOMIC_CRYPTO_TRANSFER, GRANT_REVOKE_KYC, HTS_APPROVE_ALLOWANCE, MINT_CONTRACT,
    PRECOMPILE_ALIAS_XFER,
};
use hts_common::abi::{ContractAbi, Function, PrecompileResult, Token};
use hts_common::{AbiError, ResponseCode};
use indexmap::IndexMap;
use std::sync::Arc;

pub trait ContractProgram: Send + Sync {
    /// Execute `function`; returned tokens are encoded as the call result
    fn call(&self, frame: &mut CallFrame<'_>, function: &Function, args: &[Token]) -> Result<Vec<Token>, Revert>;
}

/// Deployable programs with their ABIs
#[derive(Clone, Default)]
pub struct ProgramRegistry {
    programs: IndexMap<String, (Arc<ContractAbi>, Arc<dyn ContractProgram>)>,
}

impl ProgramRegistry {
    pub fn builtin() -> Result<Self, AbiError> {
        let abis = AbiCatalog::builtin()?;
        let mut registry = Self::default();
        let programs: [(&str, Arc<dyn ContractProgram>); 6] = [
            (HTS_APPROVE_ALLOWANCE, Arc::new(HtsApproveAllowance)),
            (ATOMIC_CRYPTO_TRANSFER, Arc::new(AtomicCryptoTransfer)),
            (PRECOMPILE_ALIAS_XFER, Arc::new(PrecompileAliasXfer)),
            (ASSOCIATE_DISSOCIATE, Arc::new(AssociateDissociate)),
            (MINT_CONTRACT, Arc::new(MintContract)),
            (GRANT_REVOKE_KYC, Arc::new(GrantRevokeKyc)),
        ];
        for (name, program) in programs {
            if let Ok(abi) = abis.get(name) {
                registry.programs.insert(name.to_string(), (abi, program));
            }
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: &str, abi: ContractAbi, program: Arc<dyn ContractProgram>) {
        self.programs.insert(name.to_string(), (Arc::new(abi), program));
    }

    pub fn get(&self, name: &str) -> Option<(&ContractAbi, &dyn ContractProgram)> {
        self.programs
            .get(name)
            .map(|(abi, program)| (abi.as_ref(), program.as_ref()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }
}

/// Forward to the token service, reverting with the status name on failure
fn hts_or_revert(frame: &mut CallFrame<'_>, function: &str, args: Vec<Token>) -> Result<PrecompileResult, Revert> {
    let result = frame.hts(function, args)?;
    if result.status != ResponseCode::Success {
        return Err(Revert::Reason(result.status.to_string()));
    }
    Ok(result)
}

fn unknown(function: &Function) -> Revert {
    Revert::reason(format!("no handler for {}", function.name))
}

struct HtsApproveAllowance;

impl ContractProgram for HtsApproveAllowance {
    fn call(&self, frame: &mut CallFrame<'_>, function: &Function, args: &[Token]) -> Result<Vec<Token>, Revert> {
        match function.name.as_str() {
            "htsAllowance" => {
                let result = hts_or_revert(frame, "allowance", args.to_vec())?;
                Ok(vec![Token::Uint(result.allowance.unwrap_or_default())])
            }
            "htsApprove" => {
                let result = hts_or_revert(frame, "approve", args.to_vec())?;
                Ok(vec![Token::Bool(result.flag.unwrap_or_default())])
            }
            _ => Err(unknown(function)),
        }
    }
}

struct AtomicCryptoTransfer;

impl ContractProgram for AtomicCryptoTransfer {
    fn call(&self, frame: &mut CallFrame<'_>, function: &Function, args: &[Token]) -> Result<Vec<Token>, Revert> {
        match function.name.as_str() {
            "transferMultipleTokens" => {
                hts_or_revert(frame, "cryptoTransfer", args.to_vec())?;
                Ok(Vec::new())
            }
            _ => Err(unknown(function)),
        }
    }
}

struct PrecompileAliasXfer;

impl ContractProgram for PrecompileAliasXfer {
    fn call(&self, frame: &mut CallFrame<'_>, function: &Function, args: &[Token]) -> Result<Vec<Token>, Revert> {
        match function.name.as_str() {
            "transferTokenCall" => {
                hts_or_revert(frame, "transferToken", args.to_vec())?;
                Ok(Vec::new())
            }
            "transferTokenThanRevertCall" => {
                hts_or_revert(frame, "transferToken", args.to_vec())?;
                Err(Revert::reason("reverted after transfer"))
            }
            "transferTokensCall" => {
                hts_or_revert(frame, "transferTokens", args.to_vec())?;
                Ok(Vec::new())
            }
            "transferTokensCallNestedThenAgain" => {
                let [token, accounts, first, again] = args else {
                    return Err(Revert::reason("expected token, accounts and two amount lists"));
                };
                for amounts in [first, again] {
                    hts_or_revert(
                        frame,
                        "transferTokens",
                        vec![token.clone(), accounts.clone(), amounts.clone()],
                    )?;
                }
                Ok(Vec::new())
            }
            _ => Err(unknown(function)),
        }
    }
}

struct AssociateDissociate;

impl ContractProgram for AssociateDissociate {
    fn call(&self, frame: &mut CallFrame<'_>, function: &Function, args: &[Token]) -> Result<Vec<Token>, Revert> {
        let target = match function.name.as_str() {
            "tokenAssociate" => "associateToken",
            "tokenDissociate" => "dissociateToken",
            _ => return Err(unknown(function)),
        };
        hts_or_revert(frame, target, args.to_vec())?;
        Ok(Vec::new())
    }
}

/// Mints and burns the token it was deployed with
struct MintContract;

impl MintContract {
    fn token(frame: &CallFrame<'_>) -> Result<Token, Revert> {
        frame
            .storage()
            .first()
            .cloned()
            .ok_or_else(|| Revert::reason("token address not set"))
    }
}

impl ContractProgram for MintContract {
    fn call(&self, frame: &mut CallFrame<'_>, function: &Function, args: &[Token]) -> Result<Vec<Token>, Revert> {
        let token = Self::token(frame)?;
        match function.name.as_str() {
            "mintFungibleToken" | "mintFungibleTokenWithEvent" => {
                let amount = args
                    .first()
                    .and_then(Token::as_u64)
                    .and_then(|a| i64::try_from(a).ok())
                    .ok_or_else(|| Revert::reason("amount out of range"))?;
                let result = hts_or_revert(frame, "mintToken", vec![token, Token::int(amount), Token::Array(Vec::new())])?;
                if function.name == "mintFungibleTokenWithEvent" {
                    let topics = vec![
                        topic_u64(result.total_supply.unwrap_or_default()),
                        topic_u64(result.serial_numbers.len() as u64),
                    ];
                    frame.emit(topics, Vec::new());
                }
                Ok(Vec::new())
            }
            "burnToken" => {
                let amount = args
                    .first()
                    .and_then(Token::as_u64)
                    .and_then(|a| i64::try_from(a).ok())
                    .ok_or_else(|| Revert::reason("amount out of range"))?;
                let serials = args.get(1).cloned().unwrap_or(Token::Array(Vec::new()));
                hts_or_revert(frame, "burnToken", vec![token, Token::int(amount), serials])?;
                Ok(Vec::new())
            }
            _ => Err(unknown(function)),
        }
    }
}

struct GrantRevokeKyc;

impl ContractProgram for GrantRevokeKyc {
    fn call(&self, frame: &mut CallFrame<'_>, function: &Function, args: &[Token]) -> Result<Vec<Token>, Revert> {
        match function.name.as_str() {
            "tokenGrantKyc" => hts_or_revert(frame, "grantTokenKyc", args.to_vec()).map(|_| Vec::new()),
            "tokenRevokeKyc" => hts_or_revert(frame, "revokeTokenKyc", args.to_vec()).map(|_| Vec::new()),
            "isKycGranted" => {
                let result = hts_or_revert(frame, "isKyc", args.to_vec())?;
                Ok(vec![Token::Bool(result.flag.unwrap_or_default())])
            }
            _ => Err(unknown(function)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::BUILTIN_PROGRAMS;

    #[test]
    fn test_every_builtin_abi_has_a_program() {
        let registry = ProgramRegistry::builtin().unwrap();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names.len(), BUILTIN_PROGRAMS.len());
        for (program, _) in BUILTIN_PROGRAMS {
            assert!(registry.get(program).is_some(), "{} has no handler", program);
        }
    }
}

//! Contract programs known to the harness.
//!
//! A contract is deployed by program name. The harness needs each program's
//! ABI to encode constructor parameters and calls and to decode return data;
//! the test ledger dispatches calls against the same declarations.

use crate::error::{HarnessError, HarnessResult};
use hts_common::abi::ContractAbi;
use hts_common::AbiError;
use indexmap::IndexMap;
use std::sync::Arc;

pub const HTS_APPROVE_ALLOWANCE: &str = "HtsApproveAllowance";
pub const ATOMIC_CRYPTO_TRANSFER: &str = "AtomicCryptoTransfer";
pub const PRECOMPILE_ALIAS_XFER: &str = "PrecompileAliasXfer";
pub const ASSOCIATE_DISSOCIATE: &str = "AssociateDissociate";
pub const MINT_CONTRACT: &str = "MintContract";
pub const GRANT_REVOKE_KYC: &str = "GrantRevokeKyc";

/// Name of the pseudo-function describing constructor parameters
pub const CONSTRUCTOR: &str = "constructor";

const HTS_APPROVE_ALLOWANCE_ABI: &[(&str, &str)] = &[
    ("htsAllowance(address,address,address)", "(uint256)"),
    ("htsApprove(address,address,uint256)", "(bool)"),
];

const ATOMIC_CRYPTO_TRANSFER_ABI: &[(&str, &str)] = &[(
    "transferMultipleTokens(((address,int64,bool)[]),(address,(address,int64,bool)[],(address,address,int64,bool)[])[])",
    "",
)];

const PRECOMPILE_ALIAS_XFER_ABI: &[(&str, &str)] = &[
    ("transferTokenCall(address,address,address,int64)", ""),
    ("transferTokenThanRevertCall(address,address,address,int64)", ""),
    ("transferTokensCall(address,address[],int64[])", ""),
    ("transferTokensCallNestedThenAgain(address,address[],int64[],int64[])", ""),
];

const ASSOCIATE_DISSOCIATE_ABI: &[(&str, &str)] = &[
    ("tokenAssociate(address,address)", ""),
    ("tokenDissociate(address,address)", ""),
];

const MINT_CONTRACT_ABI: &[(&str, &str)] = &[
    ("constructor(address)", ""),
    ("mintFungibleToken(uint64)", ""),
    ("mintFungibleTokenWithEvent(uint64)", ""),
    ("burnToken(uint64,int64[])", ""),
];

const GRANT_REVOKE_KYC_ABI: &[(&str, &str)] = &[
    ("tokenGrantKyc(address,address)", ""),
    ("tokenRevokeKyc(address,address)", ""),
    ("isKycGranted(address,address)", "(bool)"),
];

/// Every built-in program with its declared functions
pub const BUILTIN_PROGRAMS: &[(&str, &[(&str, &str)])] = &[
    (HTS_APPROVE_ALLOWANCE, HTS_APPROVE_ALLOWANCE_ABI),
    (ATOMIC_CRYPTO_TRANSFER, ATOMIC_CRYPTO_TRANSFER_ABI),
    (PRECOMPILE_ALIAS_XFER, PRECOMPILE_ALIAS_XFER_ABI),
    (ASSOCIATE_DISSOCIATE, ASSOCIATE_DISSOCIATE_ABI),
    (MINT_CONTRACT, MINT_CONTRACT_ABI),
    (GRANT_REVOKE_KYC, GRANT_REVOKE_KYC_ABI),
];

/// Program name to ABI
#[derive(Debug, Clone, Default)]
pub struct AbiCatalog {
    programs: IndexMap<String, Arc<ContractAbi>>,
}

impl AbiCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Result<Self, AbiError> {
        let mut catalog = Self::empty();
        for (program, functions) in BUILTIN_PROGRAMS {
            catalog.register(program, ContractAbi::from_signatures(functions)?);
        }
        Ok(catalog)
    }

    pub fn register(&mut self, program: &str, abi: ContractAbi) {
        self.programs.insert(program.to_string(), Arc::new(abi));
    }

    pub fn get(&self, program: &str) -> HarnessResult<Arc<ContractAbi>> {
        self.programs
            .get(program)
            .cloned()
            .ok_or_else(|| HarnessError::authoring(format!("unknown contract program '{}'", program)))
    }

    pub fn programs(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn test_builtin_programs_parse() {
        let catalog = AbiCatalog::builtin().unwrap();
        assert_eq!(catalog.programs().count(), BUILTIN_PROGRAMS.len());
        let mint = catalog.get(MINT_CONTRACT).unwrap();
        assert_eq!(mint.function(CONSTRUCTOR).unwrap().inputs.len(), 1);
        let transfer = catalog.get(ATOMIC_CRYPTO_TRANSFER).unwrap();
        assert_eq!(transfer.function("transferMultipleTokens").unwrap().inputs.len(), 2);
    }

    #[test]
    fn test_unknown_program_is_authoring_error() {
        let err = AbiCatalog::builtin().unwrap().get("Nope").unwrap_err();
        assert_eq!(err.kind(), FailureKind::Authoring);
    }
}

// HTS precompile interface
//
// Function schemas exposed at the token-service precompile address and the
// per-function result encoding found in child record call results.

use super::decode::decode;
use super::encode::encode;
use super::function::{ContractAbi, Function};
use super::types::{parse_type_list, ParamType, Token};
use crate::crypto::EvmAddress;
use crate::entity::ContractId;
use crate::error::AbiError;
use crate::response_code::ResponseCode;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Entity number of the token-service precompile (address 0x167)
pub const HTS_PRECOMPILE_NUM: u64 = 0x167;

pub fn hts_precompile_address() -> EvmAddress {
    ContractId::from_num(HTS_PRECOMPILE_NUM).to_mirror_address()
}

pub const TRANSFER_LIST_TYPE: &str = "((address,int64,bool)[])";
pub const TOKEN_TRANSFER_LIST_TYPE: &str =
    "(address,(address,int64,bool)[],(address,address,int64,bool)[])[]";

/// Canonical signatures of the supported token-service functions
pub const HTS_FUNCTIONS: &[(&str, &str)] = &[
    (
        "cryptoTransfer(((address,int64,bool)[]),(address,(address,int64,bool)[],(address,address,int64,bool)[])[])",
        "(int64)",
    ),
    ("transferToken(address,address,address,int64)", "(int64)"),
    ("transferTokens(address,address[],int64[])", "(int64)"),
    ("associateToken(address,address)", "(int64)"),
    ("dissociateToken(address,address)", "(int64)"),
    ("mintToken(address,int64,bytes[])", "(int64,int64,int64[])"),
    ("burnToken(address,int64,int64[])", "(int64,int64)"),
    ("approve(address,address,uint256)", "(int64,bool)"),
    ("allowance(address,address,address)", "(int64,uint256)"),
    ("grantTokenKyc(address,address)", "(int64)"),
    ("revokeTokenKyc(address,address)", "(int64)"),
    ("isKyc(address,address)", "(int64,bool)"),
];

pub fn hts_abi() -> Result<ContractAbi, AbiError> {
    ContractAbi::from_signatures(HTS_FUNCTIONS)
}

/// Which result layout a precompile call produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionType {
    HapiTransfer,
    HapiAssociate,
    HapiDissociate,
    HapiMint,
    HapiBurn,
    HapiApprove,
    HapiAllowance,
    HapiGrantKyc,
    HapiRevokeKyc,
    HapiIsKyc,
}

impl FunctionType {
    pub fn for_function(function: &Function) -> Option<Self> {
        let kind = match function.name.as_str() {
            "cryptoTransfer" | "transferToken" | "transferTokens" => FunctionType::HapiTransfer,
            "associateToken" => FunctionType::HapiAssociate,
            "dissociateToken" => FunctionType::HapiDissociate,
            "mintToken" => FunctionType::HapiMint,
            "burnToken" => FunctionType::HapiBurn,
            "approve" => FunctionType::HapiApprove,
            "allowance" => FunctionType::HapiAllowance,
            "grantTokenKyc" => FunctionType::HapiGrantKyc,
            "revokeTokenKyc" => FunctionType::HapiRevokeKyc,
            "isKyc" => FunctionType::HapiIsKyc,
            _ => return None,
        };
        Some(kind)
    }

    fn output_types(&self) -> &'static str {
        match self {
            FunctionType::HapiMint => "int64,int64,int64[]",
            FunctionType::HapiBurn => "int64,int64",
            FunctionType::HapiApprove | FunctionType::HapiIsKyc => "int64,bool",
            FunctionType::HapiAllowance => "int64,uint256",
            _ => "int64",
        }
    }

    pub fn outputs(&self) -> Result<Vec<ParamType>, AbiError> {
        parse_type_list(self.output_types())
    }
}

/// Decoded result of a single precompile dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecompileResult {
    pub function: FunctionType,
    pub status: ResponseCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowance: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub serial_numbers: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<bool>,
}

impl PrecompileResult {
    pub fn new(function: FunctionType, status: ResponseCode) -> Self {
        Self {
            function,
            status,
            allowance: None,
            total_supply: None,
            serial_numbers: Vec::new(),
            flag: None,
        }
    }

    pub fn with_allowance(mut self, allowance: U256) -> Self {
        self.allowance = Some(allowance);
        self
    }

    pub fn with_total_supply(mut self, total_supply: u64) -> Self {
        self.total_supply = Some(total_supply);
        self
    }

    pub fn with_serial_numbers(mut self, serial_numbers: Vec<i64>) -> Self {
        self.serial_numbers = serial_numbers;
        self
    }

    pub fn with_flag(mut self, flag: bool) -> Self {
        self.flag = Some(flag);
        self
    }

    pub fn encode(&self) -> Result<Vec<u8>, AbiError> {
        let status = Token::int(self.status.code() as i64);
        let supply = || Token::int(self.total_supply.unwrap_or_default() as i64);
        let tokens = match self.function {
            FunctionType::HapiMint => vec![
                status,
                supply(),
                Token::Array(self.serial_numbers.iter().map(|s| Token::int(*s)).collect()),
            ],
            FunctionType::HapiBurn => vec![status, supply()],
            FunctionType::HapiApprove | FunctionType::HapiIsKyc => {
                vec![status, Token::Bool(self.flag.unwrap_or_default())]
            }
            FunctionType::HapiAllowance => {
                vec![status, Token::Uint(self.allowance.unwrap_or_default())]
            }
            _ => vec![status],
        };
        encode(&self.function.outputs()?, &tokens)
    }

    pub fn decode(function: FunctionType, data: &[u8]) -> Result<Self, AbiError> {
        let tokens = decode(&function.outputs()?, data)?;
        let code = tokens
            .first()
            .and_then(Token::as_i64)
            .ok_or_else(|| AbiError::OutOfRange("response code".to_string()))?;
        let status = i32::try_from(code)
            .ok()
            .and_then(ResponseCode::from_code)
            .ok_or_else(|| AbiError::OutOfRange(format!("response code {}", code)))?;

        let mut result = Self::new(function, status);
        match function {
            FunctionType::HapiMint => {
                result.total_supply = tokens.get(1).and_then(Token::as_i64).map(|v| v as u64);
                result.serial_numbers = tokens
                    .get(2)
                    .and_then(Token::as_list)
                    .map(|list| list.iter().filter_map(Token::as_i64).collect())
                    .unwrap_or_default();
            }
            FunctionType::HapiBurn => {
                result.total_supply = tokens.get(1).and_then(Token::as_i64).map(|v| v as u64);
            }
            FunctionType::HapiApprove | FunctionType::HapiIsKyc => {
                result.flag = tokens.get(1).and_then(Token::as_bool);
            }
            FunctionType::HapiAllowance => {
                result.allowance = tokens.get(1).and_then(Token::as_uint);
            }
            _ => {}
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precompile_address() {
        assert_eq!(
            hts_precompile_address().to_string(),
            "0x0000000000000000000000000000000000000167"
        );
    }

    #[test]
    fn test_all_functions_parse() {
        let abi = hts_abi().unwrap();
        for function in abi.functions() {
            assert!(FunctionType::for_function(function).is_some(), "{}", function.name);
        }
    }

    #[test]
    fn test_allowance_result_layout() {
        let result = PrecompileResult::new(FunctionType::HapiAllowance, ResponseCode::Success)
            .with_allowance(U256::from(2));
        let encoded = result.encode().unwrap();
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded[31], 22);
        assert_eq!(encoded[63], 2);
        assert_eq!(PrecompileResult::decode(FunctionType::HapiAllowance, &encoded).unwrap(), result);
    }

    #[test]
    fn test_mint_result_carries_serials() {
        let result = PrecompileResult::new(FunctionType::HapiMint, ResponseCode::Success)
            .with_total_supply(3)
            .with_serial_numbers(vec![1, 2, 3]);
        let decoded = PrecompileResult::decode(FunctionType::HapiMint, &result.encode().unwrap()).unwrap();
        assert_eq!(decoded.serial_numbers, vec![1, 2, 3]);
        assert_eq!(decoded.total_supply, Some(3));
    }

    #[test]
    fn test_unknown_status_rejected() {
        let encoded = encode(&[ParamType::Int(64)], &[Token::int(-42)]).unwrap();
        assert!(PrecompileResult::decode(FunctionType::HapiTransfer, &encoded).is_err());
    }
}

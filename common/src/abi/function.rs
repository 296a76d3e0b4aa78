//! Schema-described contract functions
//!
//! A `Function` is declared once from its canonical signature and output
//! types; all call data for it is produced and parsed through that schema.

use super::decode::decode;
use super::encode::{encode, encode_function_call, function_selector};
use super::types::{parse_type_list, ParamType, Token};
use crate::error::AbiError;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub inputs: Vec<ParamType>,
    pub outputs: Vec<ParamType>,
}

impl Function {
    /// Parse `name(type,...)` with outputs given as `(type,...)`
    pub fn parse(signature: &str, outputs: &str) -> Result<Self, AbiError> {
        let signature = signature.trim();
        let open = signature
            .find('(')
            .ok_or_else(|| AbiError::InvalidSignature(signature.to_string()))?;
        let name = &signature[..open];
        let params = signature[open..]
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| AbiError::InvalidSignature(signature.to_string()))?;
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AbiError::InvalidSignature(signature.to_string()));
        }

        let outputs = outputs.trim();
        let outputs = if outputs.is_empty() {
            Vec::new()
        } else {
            let body = outputs
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(|| AbiError::InvalidSignature(outputs.to_string()))?;
            parse_type_list(body)?
        };

        Ok(Self {
            name: name.to_string(),
            inputs: parse_type_list(params)?,
            outputs,
        })
    }

    /// Canonical signature used for the selector
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.inputs.iter().map(ToString::to_string).collect();
        format!("{}({})", self.name, params.join(","))
    }

    pub fn selector(&self) -> [u8; 4] {
        function_selector(&self.signature())
    }

    pub fn encode_input(&self, args: &[Token]) -> Result<Vec<u8>, AbiError> {
        encode_function_call(self.selector(), &self.inputs, args).map_err(|e| self.named(e))
    }

    pub fn decode_input(&self, call_data: &[u8]) -> Result<Vec<Token>, AbiError> {
        if call_data.len() < 4 {
            return Err(AbiError::InsufficientData {
                need: 4,
                have: call_data.len(),
            });
        }
        let selector = self.selector();
        if call_data[..4] != selector {
            return Err(AbiError::SelectorMismatch {
                expected: hex::encode(selector),
                got: hex::encode(&call_data[..4]),
            });
        }
        decode(&self.inputs, &call_data[4..])
    }

    pub fn encode_output(&self, values: &[Token]) -> Result<Vec<u8>, AbiError> {
        encode(&self.outputs, values).map_err(|e| self.named(e))
    }

    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<Token>, AbiError> {
        decode(&self.outputs, data)
    }

    // Attach the function name to argument errors raised by the codec
    fn named(&self, err: AbiError) -> AbiError {
        match err {
            AbiError::ArgumentCount { expected, got, .. } => AbiError::ArgumentCount {
                function: self.signature(),
                expected,
                got,
            },
            AbiError::ArgumentType { index, expected, .. } => AbiError::ArgumentType {
                function: self.signature(),
                index,
                expected,
            },
            other => other,
        }
    }
}

/// The callable surface of one contract, by function name
#[derive(Debug, Clone, Default)]
pub struct ContractAbi {
    functions: IndexMap<String, Function>,
}

impl ContractAbi {
    /// Build from `(signature, outputs)` pairs
    pub fn from_signatures(entries: &[(&str, &str)]) -> Result<Self, AbiError> {
        let mut functions = IndexMap::new();
        for (signature, outputs) in entries {
            let function = Function::parse(signature, outputs)?;
            functions.insert(function.name.clone(), function);
        }
        Ok(Self { functions })
    }

    pub fn function(&self, name: &str) -> Result<&Function, AbiError> {
        self.functions
            .get(name)
            .ok_or_else(|| AbiError::UnknownFunction(name.to_string()))
    }

    /// Find the function a call is addressed to
    pub fn by_selector(&self, call_data: &[u8]) -> Option<&Function> {
        let selector = call_data.get(..4)?;
        self.functions.values().find(|f| f.selector() == selector)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EvmAddress;

    #[test]
    fn test_parse_and_signature() {
        let f = Function::parse(" transferToken(address, address,address,int64)", "(int64)").unwrap();
        assert_eq!(f.signature(), "transferToken(address,address,address,int64)");
        assert_eq!(f.outputs, vec![ParamType::Int(64)]);
    }

    #[test]
    fn test_call_data_round_trip() {
        let f = Function::parse("htsAllowance(address,address,address)", "(int64,uint256)").unwrap();
        let args = vec![
            Token::Address(EvmAddress::new([1; 20])),
            Token::Address(EvmAddress::new([2; 20])),
            Token::Address(EvmAddress::new([3; 20])),
        ];
        let data = f.encode_input(&args).unwrap();
        assert_eq!(&data[..4], &f.selector());
        assert_eq!(f.decode_input(&data).unwrap(), args);
    }

    #[test]
    fn test_wrong_selector_rejected() {
        let f = Function::parse("a(uint256)", "").unwrap();
        let g = Function::parse("b(uint256)", "").unwrap();
        let data = g.encode_input(&[Token::uint(1)]).unwrap();
        assert!(matches!(
            f.decode_input(&data),
            Err(AbiError::SelectorMismatch { .. })
        ));
    }

    #[test]
    fn test_argument_errors_name_the_function() {
        let f = Function::parse("mint(address,uint64)", "").unwrap();
        match f.encode_input(&[Token::uint(1)]) {
            Err(AbiError::ArgumentCount { function, expected, got }) => {
                assert_eq!(function, "mint(address,uint64)");
                assert_eq!((expected, got), (2, 1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_contract_abi_lookup() {
        let abi = ContractAbi::from_signatures(&[("a(uint256)", ""), ("b(address)", "(bool)")]).unwrap();
        let b = abi.function("b").unwrap();
        let data = b.encode_input(&[Token::Address(EvmAddress::ZERO)]).unwrap();
        assert_eq!(abi.by_selector(&data).map(|f| f.name.as_str()), Some("b"));
        assert!(matches!(abi.function("c"), Err(AbiError::UnknownFunction(_))));
    }
}

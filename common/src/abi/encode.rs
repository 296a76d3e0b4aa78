//! ABI encoding

use super::types::{ParamType, Token};
use crate::crypto::keccak256;
use crate::error::AbiError;
use primitive_types::U256;

/// Encode tokens against a declared schema
pub fn encode(types: &[ParamType], tokens: &[Token]) -> Result<Vec<u8>, AbiError> {
    if types.len() != tokens.len() {
        return Err(AbiError::ArgumentCount {
            function: "<params>".to_string(),
            expected: types.len(),
            got: tokens.len(),
        });
    }
    for (index, (param_type, token)) in types.iter().zip(tokens).enumerate() {
        if !token.matches(param_type) {
            return Err(AbiError::ArgumentType {
                function: "<params>".to_string(),
                index,
                expected: param_type.to_string(),
            });
        }
    }
    Ok(encode_params(types, tokens))
}

/// Encode function call (selector + params)
pub fn encode_function_call(
    selector: [u8; 4],
    types: &[ParamType],
    tokens: &[Token],
) -> Result<Vec<u8>, AbiError> {
    let mut result = selector.to_vec();
    result.extend(encode(types, tokens)?);
    Ok(result)
}

// Tokens are assumed to match their types
fn encode_params(types: &[ParamType], tokens: &[Token]) -> Vec<u8> {
    let head_size = types.iter().map(ParamType::head_length).sum::<usize>();

    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();

    for (param_type, token) in types.iter().zip(tokens.iter()) {
        if param_type.is_dynamic() {
            let offset = head_size + tail.len();
            head.extend(encode_u256(&U256::from(offset)));
            tail.extend(encode_token(param_type, token));
        } else {
            head.extend(encode_token(param_type, token));
        }
    }

    head.extend(tail);
    head
}

fn encode_token(param_type: &ParamType, token: &Token) -> Vec<u8> {
    match (param_type, token) {
        (ParamType::Address, Token::Address(addr)) => {
            let mut buf = [0u8; 32];
            buf[12..32].copy_from_slice(addr.as_bytes());
            buf.to_vec()
        }
        (ParamType::Uint(_), Token::Uint(value)) => encode_u256(value),
        (ParamType::Int(_), Token::Int(value)) => encode_u256(&value.to_twos_complement()),
        (ParamType::Bool, Token::Bool(b)) => {
            let mut buf = [0u8; 32];
            buf[31] = u8::from(*b);
            buf.to_vec()
        }
        (ParamType::FixedBytes(size), Token::FixedBytes(data)) => {
            let mut buf = [0u8; 32];
            let len = data.len().min(*size);
            buf[..len].copy_from_slice(&data[..len]);
            buf.to_vec()
        }
        (ParamType::Bytes, Token::Bytes(data)) => encode_bytes(data),
        (ParamType::String, Token::String(s)) => encode_bytes(s.as_bytes()),
        (ParamType::Array(inner), Token::Array(tokens)) => {
            let mut result = encode_u256(&U256::from(tokens.len()));
            let inner_types = vec![(**inner).clone(); tokens.len()];
            result.extend(encode_params(&inner_types, tokens));
            result
        }
        (ParamType::FixedArray(inner, _), Token::FixedArray(tokens)) => {
            let inner_types = vec![(**inner).clone(); tokens.len()];
            encode_params(&inner_types, tokens)
        }
        (ParamType::Tuple(types), Token::Tuple(tokens)) => encode_params(types, tokens),
        // Unreachable after schema validation
        _ => vec![0u8; 32],
    }
}

pub(crate) fn encode_u256(value: &U256) -> Vec<u8> {
    value.to_big_endian().to_vec()
}

fn encode_bytes(data: &[u8]) -> Vec<u8> {
    let mut result = encode_u256(&U256::from(data.len()));

    let padded_len = data.len().div_ceil(32) * 32;
    let mut padded = vec![0u8; padded_len];
    padded[..data.len()].copy_from_slice(data);
    result.extend(padded);

    result
}

/// Compute function selector (first 4 bytes of keccak256(signature))
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash.as_bytes()[..4]);
    selector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::types::parse_type;
    use crate::crypto::EvmAddress;

    #[test]
    fn test_encode_address() {
        let addr: EvmAddress = "0x742d35cc6634c0532925a3b844bc9e7595f0ab3d".parse().unwrap();
        let encoded = encode(&[ParamType::Address], &[Token::Address(addr)]).unwrap();

        assert_eq!(encoded.len(), 32);
        assert_eq!(&encoded[12..32], addr.as_bytes());
    }

    #[test]
    fn test_encode_negative_int64() {
        let encoded = encode(&[ParamType::Int(64)], &[Token::int(-2)]).unwrap();
        assert!(encoded[..31].iter().all(|b| *b == 0xff));
        assert_eq!(encoded[31], 0xfe);
    }

    #[test]
    fn test_encode_dynamic_bytes() {
        let data = vec![0x01, 0x02, 0x03];
        let encoded = encode(&[ParamType::Bytes], &[Token::Bytes(data.clone())]).unwrap();

        // offset + length + padded data
        assert_eq!(encoded.len(), 96);
        assert_eq!(encoded[31], 32);
        assert_eq!(encoded[63], 3);
        assert_eq!(&encoded[64..67], &data[..]);
    }

    #[test]
    fn test_encode_rejects_type_mismatch() {
        let err = encode(&[ParamType::Address], &[Token::uint(1)]).unwrap_err();
        assert!(matches!(err, AbiError::ArgumentType { index: 0, .. }));
        let err = encode(&[ParamType::Address], &[]).unwrap_err();
        assert!(matches!(err, AbiError::ArgumentCount { expected: 1, got: 0, .. }));
    }

    #[test]
    fn test_encode_static_tuple_inline() {
        let ty = parse_type("(address,int64,bool)").unwrap();
        let token = Token::Tuple(vec![
            Token::Address(EvmAddress::ZERO),
            Token::int(5),
            Token::Bool(true),
        ]);
        let encoded = encode(&[ty], &[token]).unwrap();
        // Static tuple: no offset word
        assert_eq!(encoded.len(), 96);
        assert_eq!(encoded[63], 5);
        assert_eq!(encoded[95], 1);
    }

    #[test]
    fn test_function_selector() {
        assert_eq!(
            function_selector("transfer(address,uint256)"),
            [0xa9, 0x05, 0x9c, 0xbb]
        );
        assert_eq!(
            function_selector("balanceOf(address)"),
            [0x70, 0xa0, 0x82, 0x31]
        );
    }
}

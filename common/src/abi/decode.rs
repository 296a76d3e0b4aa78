//! ABI decoding
//!
//! Dynamic offsets are relative to the start of the enclosing encoding, so
//! nested arrays and tuples are decoded with their own base.

use super::types::{ParamType, Token, I256};
use crate::crypto::EvmAddress;
use crate::error::AbiError;
use primitive_types::U256;

/// Decode tokens from ABI-encoded data
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    decode_params(types, data, 0)
}

fn decode_params(types: &[ParamType], data: &[u8], base: usize) -> Result<Vec<Token>, AbiError> {
    let mut head = base;
    let mut tokens = Vec::with_capacity(types.len());

    for param_type in types {
        if param_type.is_dynamic() {
            let offset = read_usize(data, head)?;
            let start = base
                .checked_add(offset)
                .ok_or_else(|| AbiError::OutOfRange("offset".to_string()))?;
            tokens.push(decode_at(param_type, data, start)?);
            head += 32;
        } else {
            tokens.push(decode_at(param_type, data, head)?);
            head += param_type.head_length();
        }
    }

    Ok(tokens)
}

// Decode the value whose encoding starts at `pos`
fn decode_at(param_type: &ParamType, data: &[u8], pos: usize) -> Result<Token, AbiError> {
    match param_type {
        ParamType::Address => {
            let word = read_word(data, pos)?;
            let address = EvmAddress::from_slice(&word[12..])
                .ok_or_else(|| AbiError::OutOfRange("address".to_string()))?;
            Ok(Token::Address(address))
        }
        ParamType::Uint(bits) => {
            let value = U256::from_big_endian(read_word(data, pos)?);
            if *bits < 256 && value.bits() > *bits {
                return Err(AbiError::OutOfRange(param_type.to_string()));
            }
            Ok(Token::Uint(value))
        }
        ParamType::Int(_) => {
            let word = U256::from_big_endian(read_word(data, pos)?);
            Ok(Token::Int(I256::from_twos_complement(word)))
        }
        ParamType::Bool => {
            let word = read_word(data, pos)?;
            Ok(Token::Bool(word[31] != 0))
        }
        ParamType::FixedBytes(size) => {
            let word = read_word(data, pos)?;
            Ok(Token::FixedBytes(word[..*size].to_vec()))
        }
        ParamType::Bytes => Ok(Token::Bytes(read_bytes(data, pos)?)),
        ParamType::String => {
            let bytes = read_bytes(data, pos)?;
            let s = String::from_utf8(bytes).map_err(|e| AbiError::InvalidUtf8(e.to_string()))?;
            Ok(Token::String(s))
        }
        ParamType::Array(inner) => {
            let len = read_usize(data, pos)?;
            // Every element needs at least one word; reject lengths the data can't hold
            check_length(data, pos + 32 + len.saturating_mul(32))?;
            let types = vec![(**inner).clone(); len];
            Ok(Token::Array(decode_params(&types, data, pos + 32)?))
        }
        ParamType::FixedArray(inner, size) => {
            let types = vec![(**inner).clone(); *size];
            Ok(Token::FixedArray(decode_params(&types, data, pos)?))
        }
        ParamType::Tuple(types) => Ok(Token::Tuple(decode_params(types, data, pos)?)),
    }
}

fn read_word(data: &[u8], pos: usize) -> Result<&[u8], AbiError> {
    check_length(data, pos + 32)?;
    Ok(&data[pos..pos + 32])
}

fn read_usize(data: &[u8], pos: usize) -> Result<usize, AbiError> {
    let value = U256::from_big_endian(read_word(data, pos)?);
    if value > U256::from(u32::MAX) {
        return Err(AbiError::OutOfRange("length or offset".to_string()));
    }
    Ok(value.low_u64() as usize)
}

fn read_bytes(data: &[u8], pos: usize) -> Result<Vec<u8>, AbiError> {
    let len = read_usize(data, pos)?;
    check_length(data, pos + 32 + len)?;
    Ok(data[pos + 32..pos + 32 + len].to_vec())
}

fn check_length(data: &[u8], required: usize) -> Result<(), AbiError> {
    if data.len() < required {
        return Err(AbiError::InsufficientData {
            need: required,
            have: data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::encode::encode;
    use crate::abi::types::parse_type;
    use proptest::prelude::*;

    #[test]
    fn test_decode_uint() {
        let mut encoded = [0u8; 32];
        encoded[31] = 100;

        let tokens = decode(&[ParamType::Uint(256)], &encoded).unwrap();
        assert_eq!(tokens, vec![Token::uint(100)]);
    }

    #[test]
    fn test_decode_uint8_out_of_range() {
        let mut encoded = [0u8; 32];
        encoded[30] = 1;
        assert!(matches!(
            decode(&[ParamType::Uint(8)], &encoded),
            Err(AbiError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_decode_string() {
        let mut encoded = vec![0u8; 96];
        encoded[31] = 32;
        encoded[63] = 5;
        encoded[64..69].copy_from_slice(b"hello");

        let tokens = decode(&[ParamType::String], &encoded).unwrap();
        assert_eq!(tokens[0], Token::string("hello"));
    }

    #[test]
    fn test_decode_truncated() {
        let err = decode(&[ParamType::Address, ParamType::Bool], &[0u8; 40]).unwrap_err();
        assert_eq!(err, AbiError::InsufficientData { need: 64, have: 40 });
    }

    #[test]
    fn test_nested_transfer_list_round_trip() {
        // The shape of an HTS token transfer list
        let ty = parse_type("(address,(address,int64,bool)[],(address,address,int64,bool)[])[]").unwrap();
        let a = EvmAddress::new([1u8; 20]);
        let b = EvmAddress::new([2u8; 20]);
        let token = Token::Array(vec![Token::Tuple(vec![
            Token::Address(a),
            Token::Array(vec![
                Token::Tuple(vec![Token::Address(a), Token::int(-5), Token::Bool(true)]),
                Token::Tuple(vec![Token::Address(b), Token::int(5), Token::Bool(false)]),
            ]),
            Token::Array(vec![]),
        ])]);
        let encoded = encode(&[ty.clone()], &[token.clone()]).unwrap();
        assert_eq!(decode(&[ty], &encoded).unwrap(), vec![token]);
    }

    #[test]
    fn test_array_of_strings_round_trip() {
        let ty = ParamType::Array(Box::new(ParamType::String));
        let token = Token::Array(vec![Token::string("a"), Token::string("bc")]);
        let encoded = encode(&[ty.clone(), ParamType::Bool], &[token.clone(), Token::Bool(true)]).unwrap();
        assert_eq!(
            decode(&[ty, ParamType::Bool], &encoded).unwrap(),
            vec![token, Token::Bool(true)]
        );
    }

    proptest! {
        #[test]
        fn prop_int64_and_bytes(value in any::<i64>(), bytes in proptest::collection::vec(any::<u8>(), 0..80)) {
            let types = [ParamType::Int(64), ParamType::Bytes];
            let tokens = vec![Token::int(value), Token::Bytes(bytes)];
            let encoded = encode(&types, &tokens).unwrap();
            prop_assert_eq!(encoded.len() % 32, 0);
            prop_assert_eq!(decode(&types, &encoded).unwrap(), tokens);
        }
    }
}

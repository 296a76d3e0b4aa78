//! ABI type definitions

use crate::crypto::EvmAddress;
use crate::error::AbiError;
use primitive_types::U256;
use std::fmt::{self, Display, Formatter};

/// Decoded ABI value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(EvmAddress),
    Uint(U256),
    Int(I256),
    Bool(bool),
    Bytes(Vec<u8>),
    FixedBytes(Vec<u8>),
    String(String),
    Array(Vec<Token>),
    FixedArray(Vec<Token>),
    Tuple(Vec<Token>),
}

/// Signed 256-bit integer as sign and magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct I256 {
    pub abs: U256,
    pub negative: bool,
}

impl I256 {
    pub fn new(abs: U256, negative: bool) -> Self {
        // Normalise -0 to 0
        Self {
            abs,
            negative: negative && !abs.is_zero(),
        }
    }

    pub fn from_i64(value: i64) -> Self {
        Self::new(U256::from(value.unsigned_abs()), value < 0)
    }

    pub fn to_i64(&self) -> Option<i64> {
        if self.abs > U256::from(i64::MAX as u64) + U256::one() {
            return None;
        }
        let magnitude = self.abs.low_u64();
        if self.negative {
            // i64::MIN has magnitude i64::MAX + 1
            Some(0i64.wrapping_sub(magnitude as i64))
        } else if magnitude > i64::MAX as u64 {
            None
        } else {
            Some(magnitude as i64)
        }
    }

    pub fn is_zero(&self) -> bool {
        self.abs.is_zero()
    }

    /// 256-bit two's complement word
    pub fn to_twos_complement(&self) -> U256 {
        if self.negative {
            (!self.abs).overflowing_add(U256::one()).0
        } else {
            self.abs
        }
    }

    pub fn from_twos_complement(word: U256) -> Self {
        if word.bit(255) {
            Self::new((!word).overflowing_add(U256::one()).0, true)
        } else {
            Self::new(word, false)
        }
    }
}

/// Solidity parameter types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Uint(usize),
    Int(usize),
    Bool,
    Bytes,
    FixedBytes(usize),
    String,
    Array(Box<ParamType>),
    FixedArray(Box<ParamType>, usize),
    Tuple(Vec<ParamType>),
}

impl ParamType {
    /// Check if this type is dynamic (variable length)
    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::Bytes | ParamType::String | ParamType::Array(_) => true,
            ParamType::FixedArray(inner, _) => inner.is_dynamic(),
            ParamType::Tuple(types) => types.iter().any(|t| t.is_dynamic()),
            _ => false,
        }
    }

    /// Bytes this type occupies in the head of an encoding
    pub fn head_length(&self) -> usize {
        match self {
            ParamType::FixedArray(inner, size) if !self.is_dynamic() => inner.head_length() * size,
            ParamType::Tuple(types) if !self.is_dynamic() => {
                types.iter().map(ParamType::head_length).sum()
            }
            _ => 32,
        }
    }
}

impl Display for ParamType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Address => write!(f, "address"),
            ParamType::Uint(bits) => write!(f, "uint{}", bits),
            ParamType::Int(bits) => write!(f, "int{}", bits),
            ParamType::Bool => write!(f, "bool"),
            ParamType::Bytes => write!(f, "bytes"),
            ParamType::FixedBytes(size) => write!(f, "bytes{}", size),
            ParamType::String => write!(f, "string"),
            ParamType::Array(inner) => write!(f, "{}[]", inner),
            ParamType::FixedArray(inner, size) => write!(f, "{}[{}]", inner, size),
            ParamType::Tuple(types) => {
                write!(f, "(")?;
                for (i, t) in types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Token {
    pub fn uint(value: u64) -> Self {
        Token::Uint(U256::from(value))
    }

    pub fn int(value: i64) -> Self {
        Token::Int(I256::from_i64(value))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Token::String(s.into())
    }

    /// Whether this token can be encoded as `param_type`
    pub fn matches(&self, param_type: &ParamType) -> bool {
        match (self, param_type) {
            (Token::Address(_), ParamType::Address)
            | (Token::Uint(_), ParamType::Uint(_))
            | (Token::Int(_), ParamType::Int(_))
            | (Token::Bool(_), ParamType::Bool)
            | (Token::Bytes(_), ParamType::Bytes)
            | (Token::String(_), ParamType::String) => true,
            (Token::FixedBytes(bytes), ParamType::FixedBytes(size)) => bytes.len() == *size,
            (Token::Array(tokens), ParamType::Array(inner)) => {
                tokens.iter().all(|t| t.matches(inner))
            }
            (Token::FixedArray(tokens), ParamType::FixedArray(inner, size)) => {
                tokens.len() == *size && tokens.iter().all(|t| t.matches(inner))
            }
            (Token::Tuple(tokens), ParamType::Tuple(types)) => {
                tokens.len() == types.len() && tokens.iter().zip(types).all(|(t, ty)| t.matches(ty))
            }
            _ => false,
        }
    }

    pub fn as_address(&self) -> Option<EvmAddress> {
        match self {
            Token::Address(address) => Some(*address),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Token::Uint(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Token::Uint(value) if *value <= U256::from(u64::MAX) => Some(value.low_u64()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Token::Int(value) => value.to_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Token::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Token::Bytes(bytes) | Token::FixedBytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Token]> {
        match self {
            Token::Array(tokens) | Token::FixedArray(tokens) | Token::Tuple(tokens) => Some(tokens),
            _ => None,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Token::Address(address) => write!(f, "{}", address),
            Token::Uint(value) => write!(f, "{}", value),
            Token::Int(value) if value.negative => write!(f, "-{}", value.abs),
            Token::Int(value) => write!(f, "{}", value.abs),
            Token::Bool(value) => write!(f, "{}", value),
            Token::Bytes(bytes) | Token::FixedBytes(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Array(tokens) | Token::FixedArray(tokens) => {
                write!(f, "[")?;
                for (i, t) in tokens.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, "]")
            }
            Token::Tuple(tokens) => {
                write!(f, "(")?;
                for (i, t) in tokens.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parse a canonical type string such as `uint256`, `(address,int64,bool)[]`
pub fn parse_type(s: &str) -> Result<ParamType, AbiError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AbiError::UnknownType(s.to_string()));
    }

    // Array suffixes bind last: T[] or T[N]
    if let Some(stripped) = s.strip_suffix(']') {
        let open = stripped
            .rfind('[')
            .ok_or_else(|| AbiError::UnknownType(s.to_string()))?;
        let inner = parse_type(&stripped[..open])?;
        let size = &stripped[open + 1..];
        if size.is_empty() {
            return Ok(ParamType::Array(Box::new(inner)));
        }
        let size: usize = size
            .parse()
            .map_err(|_| AbiError::UnknownType(s.to_string()))?;
        return Ok(ParamType::FixedArray(Box::new(inner), size));
    }

    if let Some(body) = s.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        return Ok(ParamType::Tuple(parse_type_list(body)?));
    }

    match s {
        "address" => return Ok(ParamType::Address),
        "bool" => return Ok(ParamType::Bool),
        "string" => return Ok(ParamType::String),
        "bytes" => return Ok(ParamType::Bytes),
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("uint") {
        return parse_bits(rest, s).map(ParamType::Uint);
    }
    if let Some(rest) = s.strip_prefix("int") {
        return parse_bits(rest, s).map(ParamType::Int);
    }
    if let Some(rest) = s.strip_prefix("bytes") {
        let size: usize = rest
            .parse()
            .map_err(|_| AbiError::UnknownType(s.to_string()))?;
        if size == 0 || size > 32 {
            return Err(AbiError::UnknownType(s.to_string()));
        }
        return Ok(ParamType::FixedBytes(size));
    }

    Err(AbiError::UnknownType(s.to_string()))
}

/// Parse a comma separated list of types, respecting nested tuples
pub fn parse_type_list(s: &str) -> Result<Vec<ParamType>, AbiError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Vec::new());
    }
    let mut types = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| AbiError::UnknownType(s.to_string()))?;
            }
            ',' if depth == 0 => {
                types.push(parse_type(&s[start..i])?);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(AbiError::UnknownType(s.to_string()));
    }
    types.push(parse_type(&s[start..])?);
    Ok(types)
}

fn parse_bits(rest: &str, whole: &str) -> Result<usize, AbiError> {
    if rest.is_empty() {
        return Ok(256);
    }
    let bits: usize = rest
        .parse()
        .map_err(|_| AbiError::UnknownType(whole.to_string()))?;
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(AbiError::UnknownType(whole.to_string()));
    }
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_type_is_dynamic() {
        assert!(!ParamType::Address.is_dynamic());
        assert!(!ParamType::Uint(256).is_dynamic());
        assert!(!ParamType::Tuple(vec![ParamType::Address, ParamType::Int(64)]).is_dynamic());
        assert!(ParamType::Bytes.is_dynamic());
        assert!(ParamType::Array(Box::new(ParamType::Uint(256))).is_dynamic());
        assert!(ParamType::Tuple(vec![ParamType::Address, ParamType::String]).is_dynamic());
    }

    #[test]
    fn test_parse_nested_types() {
        let parsed = parse_type("(address,(address,int64,bool)[],(address,address,int64,bool)[])[]").unwrap();
        assert_eq!(
            parsed.to_string(),
            "(address,(address,int64,bool)[],(address,address,int64,bool)[])[]"
        );
        assert_eq!(parse_type("uint").unwrap(), ParamType::Uint(256));
        assert_eq!(parse_type("bytes32").unwrap(), ParamType::FixedBytes(32));
        assert_eq!(
            parse_type("int64[3]").unwrap(),
            ParamType::FixedArray(Box::new(ParamType::Int(64)), 3)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_type("uint7").is_err());
        assert!(parse_type("bytes33").is_err());
        assert!(parse_type("(address").is_err());
        assert!(parse_type_list("address,,bool").is_err());
    }

    #[test]
    fn test_i256_twos_complement() {
        let minus_one = I256::from_i64(-1);
        assert_eq!(minus_one.to_twos_complement(), U256::MAX);
        assert_eq!(I256::from_twos_complement(U256::MAX), minus_one);
        assert_eq!(I256::from_i64(i64::MIN).to_i64(), Some(i64::MIN));
        assert_eq!(I256::new(U256::zero(), true), I256::from_i64(0));
    }

    #[test]
    fn test_token_matches() {
        let entry = Token::Tuple(vec![
            Token::Address(EvmAddress::ZERO),
            Token::int(-5),
            Token::Bool(false),
        ]);
        let ty = parse_type("(address,int64,bool)").unwrap();
        assert!(entry.matches(&ty));
        assert!(!Token::uint(1).matches(&ty));
        assert!(Token::Array(vec![entry]).matches(&ParamType::Array(Box::new(ty))));
    }
}

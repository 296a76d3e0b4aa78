use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityIdError {
    #[error("Invalid entity id '{0}': expected <shard>.<realm>.<num>")]
    Malformed(String),

    #[error("Invalid entity id component '{component}' in '{input}'")]
    InvalidComponent { input: String, component: String },

    #[error("Address {0} is not a mirror address")]
    NotMirrorAddress(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("Insufficient data: need {need} bytes, have {have}")]
    InsufficientData { need: usize, have: usize },

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Invalid signature '{0}'")]
    InvalidSignature(String),

    #[error("Argument count mismatch for {function}: expected {expected}, got {got}")]
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("Argument {index} of {function} does not match type {expected}")]
    ArgumentType {
        function: String,
        index: usize,
        expected: String,
    },

    #[error("Selector mismatch: expected 0x{expected}, got 0x{got}")]
    SelectorMismatch { expected: String, got: String },

    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("Value out of range for {0}")]
    OutOfRange(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Invalid secp256k1 private key")]
    InvalidPrivateKey,

    #[error("Invalid secp256k1 public key")]
    InvalidPublicKey,

    #[error("Invalid signature encoding")]
    InvalidSignature,

    #[error("Key material has no private keys")]
    NoPrivateKeys,
}

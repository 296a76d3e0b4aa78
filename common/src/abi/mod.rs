//! Solidity ABI codec driven by declared schemas

pub mod decode;
pub mod encode;
pub mod function;
pub mod precompile;
pub mod types;

pub use decode::decode;
pub use encode::{encode, encode_function_call, function_selector};
pub use function::{ContractAbi, Function};
pub use precompile::{hts_abi, hts_precompile_address, FunctionType, PrecompileResult};
pub use types::{parse_type, parse_type_list, ParamType, Token, I256};

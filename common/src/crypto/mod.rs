pub mod address;
pub mod hash;
pub mod key;

pub use address::EvmAddress;
pub use hash::{keccak256, Hash, HASH_SIZE};
pub use key::{Key, KeyMaterial, PrivateKey, SignaturePair};

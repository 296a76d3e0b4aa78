use crate::crypto::address::EvmAddress;
use crate::error::EntityIdError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// `<shard>.<realm>.<num>` identifier shared by accounts, tokens and contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntityId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl EntityId {
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }

    pub const fn from_num(num: u64) -> Self {
        Self::new(0, 0, num)
    }

    // Long-zero form: 4 bytes shard, 8 bytes realm, 8 bytes num
    pub fn to_mirror_address(&self) -> EvmAddress {
        let mut bytes = [0u8; 20];
        // shard is u32 on the wire
        bytes[..4].copy_from_slice(&(self.shard as u32).to_be_bytes());
        bytes[4..12].copy_from_slice(&self.realm.to_be_bytes());
        bytes[12..].copy_from_slice(&self.num.to_be_bytes());
        EvmAddress::new(bytes)
    }

    pub fn from_mirror_address(address: &EvmAddress) -> Result<Self, EntityIdError> {
        if !address.is_mirror() {
            return Err(EntityIdError::NotMirrorAddress(address.to_string()));
        }
        let bytes = address.as_bytes();
        let mut shard = [0u8; 4];
        let mut realm = [0u8; 8];
        let mut num = [0u8; 8];
        shard.copy_from_slice(&bytes[..4]);
        realm.copy_from_slice(&bytes[4..12]);
        num.copy_from_slice(&bytes[12..]);
        Ok(Self::new(
            u32::from_be_bytes(shard) as u64,
            u64::from_be_bytes(realm),
            u64::from_be_bytes(num),
        ))
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(EntityIdError::Malformed(s.to_string()));
        }
        let parse = |component: &str| {
            component
                .parse::<u64>()
                .map_err(|_| EntityIdError::InvalidComponent {
                    input: s.to_string(),
                    component: component.to_string(),
                })
        };
        Ok(Self::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// Typed wrappers so an account id can't be passed where a token id is expected
macro_rules! entity_kind {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub EntityId);

        impl $name {
            pub const fn from_num(num: u64) -> Self {
                Self(EntityId::from_num(num))
            }

            pub fn num(&self) -> u64 {
                self.0.num
            }

            pub fn entity(&self) -> EntityId {
                self.0
            }

            pub fn to_mirror_address(&self) -> EvmAddress {
                self.0.to_mirror_address()
            }

            pub fn from_mirror_address(address: &EvmAddress) -> Result<Self, EntityIdError> {
                EntityId::from_mirror_address(address).map(Self)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }

        impl From<EntityId> for $name {
            fn from(id: EntityId) -> Self {
                Self(id)
            }
        }
    };
}

entity_kind!(AccountId);
entity_kind!(TokenId);
entity_kind!(ContractId);

// A contract is also an account with the same number
impl From<ContractId> for AccountId {
    fn from(id: ContractId) -> Self {
        AccountId(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let id: AccountId = "0.0.1001".parse().unwrap();
        assert_eq!(id.num(), 1001);
        assert_eq!(id.to_string(), "0.0.1001");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            "0.1001".parse::<EntityId>(),
            Err(EntityIdError::Malformed(_))
        ));
        assert!(matches!(
            "0.0.x".parse::<EntityId>(),
            Err(EntityIdError::InvalidComponent { .. })
        ));
    }

    #[test]
    fn test_mirror_address_round_trip() {
        let id = TokenId::from_num(0x1234);
        let address = id.to_mirror_address();
        assert!(address.is_mirror());
        assert_eq!(&address.as_bytes()[18..], &[0x12, 0x34]);
        assert_eq!(TokenId::from_mirror_address(&address).unwrap(), id);
    }

    #[test]
    fn test_contract_and_account_share_number() {
        let contract = ContractId::from_num(1050);
        let account: AccountId = contract.into();
        assert_eq!(account.to_mirror_address(), contract.to_mirror_address());
    }

    #[test]
    fn test_serde_uses_dotted_form() {
        let json = serde_json::to_string(&AccountId::from_num(7)).unwrap();
        assert_eq!(json, "\"0.0.7\"");
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.num(), 7);
    }
}

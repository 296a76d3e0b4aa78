//! Contract log matching.
//!
//! Logs are compared by position with exact equality on every topic and on
//! the data, raw or decoded through a declared schema.

use crate::error::Mismatch;
use hts_common::abi::{decode, ParamType, Token};
use hts_common::crypto::{keccak256, EvmAddress, Hash};
use hts_common::record::ContractLog;
use primitive_types::U256;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogExpectation {
    pub topics: Option<Vec<Hash>>,
    pub data: Option<Vec<u8>>,
    /// Decode `data` with the given types and compare values
    pub values: Option<(Vec<ParamType>, Vec<Token>)>,
}

impl LogExpectation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topics(mut self, topics: Vec<Hash>) -> Self {
        self.topics = Some(topics);
        self
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn no_data(self) -> Self {
        self.with_data(Vec::new())
    }

    pub fn with_values(mut self, types: Vec<ParamType>, values: Vec<Token>) -> Self {
        self.values = Some((types, values));
        self
    }
}

pub fn topic_u64(value: u64) -> Hash {
    let word = U256::from(value).to_big_endian();
    Hash::new(word)
}

pub fn topic_address(address: &EvmAddress) -> Hash {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    Hash::new(word)
}

/// Topic 0 of a non-anonymous event
pub fn topic_event(signature: &str) -> Hash {
    keccak256(signature.as_bytes())
}

pub fn match_logs(observed: &[ContractLog], expected: &[LogExpectation]) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    if observed.len() != expected.len() {
        mismatches.push(Mismatch::new("logs.len", expected.len(), observed.len()));
    }
    for (i, (log, expectation)) in observed.iter().zip(expected).enumerate() {
        if let Some(topics) = &expectation.topics {
            if topics.len() != log.topics.len() {
                mismatches.push(Mismatch::new(
                    format!("logs[{}].topics.len", i),
                    topics.len(),
                    log.topics.len(),
                ));
            }
            for (j, (want, got)) in topics.iter().zip(&log.topics).enumerate() {
                if want != got {
                    mismatches.push(Mismatch::new(format!("logs[{}].topics[{}]", i, j), want, got));
                }
            }
        }
        if let Some(data) = &expectation.data {
            if *data != log.data {
                mismatches.push(Mismatch::new(
                    format!("logs[{}].data", i),
                    format!("0x{}", hex::encode(data)),
                    format!("0x{}", hex::encode(&log.data)),
                ));
            }
        }
        if let Some((types, values)) = &expectation.values {
            match decode(types, &log.data) {
                Ok(decoded) => {
                    for (j, (want, got)) in values.iter().zip(&decoded).enumerate() {
                        if want != got {
                            mismatches.push(Mismatch::new(format!("logs[{}].values[{}]", i, j), want, got));
                        }
                    }
                }
                Err(err) => mismatches.push(Mismatch::new(
                    format!("logs[{}].values", i),
                    "decodable data",
                    err,
                )),
            }
        }
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use hts_common::abi::encode;
    use hts_common::ContractId;

    fn log(topics: Vec<Hash>, data: Vec<u8>) -> ContractLog {
        ContractLog {
            contract: ContractId::from_num(1001),
            topics,
            data,
        }
    }

    #[test]
    fn test_topics_must_match_exactly() {
        let observed = vec![log(vec![topic_u64(10), topic_u64(0)], Vec::new())];
        let good = LogExpectation::new().with_topics(vec![topic_u64(10), topic_u64(0)]).no_data();
        assert!(match_logs(&observed, &[good]).is_empty());

        let bad = LogExpectation::new().with_topics(vec![topic_u64(11), topic_u64(0)]);
        let mismatches = match_logs(&observed, &[bad]);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].field, "logs[0].topics[0]");
    }

    #[test]
    fn test_missing_log_reported() {
        let mismatches = match_logs(&[], &[LogExpectation::new()]);
        assert_eq!(mismatches[0].field, "logs.len");
    }

    #[test]
    fn test_decoded_values() {
        let types = vec![ParamType::Uint(256), ParamType::Bool];
        let data = encode(&types, &[Token::uint(7), Token::Bool(true)]).unwrap();
        let observed = vec![log(vec![topic_event("Minted(uint256,bool)")], data)];

        let expectation = LogExpectation::new().with_values(types.clone(), vec![Token::uint(7), Token::Bool(true)]);
        assert!(match_logs(&observed, &[expectation]).is_empty());

        let wrong = LogExpectation::new().with_values(types, vec![Token::uint(8), Token::Bool(true)]);
        assert_eq!(match_logs(&observed, &[wrong])[0].field, "logs[0].values[0]");
    }

    #[test]
    fn test_address_topic_is_left_padded() {
        let address = EvmAddress::new([0xab; 20]);
        let topic = topic_address(&address);
        assert_eq!(&topic.as_bytes()[..12], &[0u8; 12]);
        assert_eq!(&topic.as_bytes()[12..], address.as_bytes());
    }
}

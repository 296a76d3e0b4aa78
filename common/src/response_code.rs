// Ledger response codes
//
// Closed set of statuses returned by precheck, receipts, records and the HTS
// precompile. The numeric value is what the precompile ABI-encodes as its
// int32 response code.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum ResponseCode {
    Ok = 0,
    InvalidTransaction = 1,
    PayerAccountNotFound = 2,
    InvalidSignature = 7,
    InsufficientTxFee = 9,
    InsufficientPayerBalance = 10,
    DuplicateTransaction = 11,
    Busy = 12,
    NotSupported = 13,
    InvalidAccountId = 15,
    InvalidContractId = 16,
    RecordNotFound = 19,
    Unknown = 21,
    #[default]
    Success = 22,
    FailInvalid = 23,
    InsufficientAccountBalance = 28,
    InvalidSolidityAddress = 29,
    InsufficientGas = 30,
    ContractRevertExecuted = 33,
    InvalidAccountAmounts = 48,
    AccountRepeatedInAccountAmounts = 74,
    InvalidTokenId = 167,
    TokenHasNoFreezeKey = 172,
    TransfersNotZeroSumForToken = 173,
    AccountKycNotGrantedForToken = 176,
    TokenHasNoKycKey = 177,
    InsufficientTokenBalance = 178,
    TokenHasNoSupplyKey = 180,
    InvalidTokenMintAmount = 182,
    InvalidTokenBurnAmount = 183,
    TokenNotAssociatedToAccount = 184,
    AccountIsTreasury = 193,
    InvalidTokenNftSerialNumber = 226,
    SenderDoesNotOwnNftSerialNo = 237,
    TokenAlreadyAssociatedToAccount = 194,
    InvalidNftId = 227,
    TransactionRequiresZeroTokenBalances = 247,
    NoRemainingAutomaticAssociations = 262,
    AmountExceedsAllowance = 292,
    SpenderDoesNotHaveAllowance = 293,
    InvalidAllowanceOwnerId = 296,
    InvalidAllowanceSpenderId = 297,
    InvalidFullPrefixSignatureForPrecompile = 301,
    RevertedSuccess = 309,
    MaxChildRecordsExceeded = 310,
    TokenIsImmutable = 314,
    NotSupportedForHollowAccount = 330,
}

impl ResponseCode {
    #[inline]
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::iter().find(|c| c.code() == code)
    }

    // Statuses that end a transaction's lifecycle; anything else is still in flight
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResponseCode::Unknown | ResponseCode::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::str::FromStr;

    #[test]
    fn test_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ResponseCode::iter() {
            assert!(seen.insert(code.code()), "duplicate code {}", code);
        }
    }

    #[test]
    fn test_from_code_round_trip() {
        for code in ResponseCode::iter() {
            assert_eq!(ResponseCode::from_code(code.code()), Some(code));
        }
        assert_eq!(ResponseCode::from_code(-1), None);
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(
            ResponseCode::ContractRevertExecuted.to_string(),
            "CONTRACT_REVERT_EXECUTED"
        );
        assert_eq!(
            ResponseCode::from_str("AMOUNT_EXCEEDS_ALLOWANCE").unwrap(),
            ResponseCode::AmountExceedsAllowance
        );
        let yaml: ResponseCode = serde_json::from_str("\"REVERTED_SUCCESS\"").unwrap();
        assert_eq!(yaml, ResponseCode::RevertedSuccess);
    }
}

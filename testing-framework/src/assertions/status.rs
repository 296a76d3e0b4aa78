use crate::error::Mismatch;
use hts_common::ResponseCode;

/// Exact equality on a response code
pub fn match_status(field: &str, expected: ResponseCode, observed: ResponseCode) -> Option<Mismatch> {
    (expected != observed).then(|| Mismatch::new(field, expected, observed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mismatch_reports_both_codes() {
        assert!(match_status("status", ResponseCode::Success, ResponseCode::Success).is_none());

        let mismatch = match_status(
            "status",
            ResponseCode::ContractRevertExecuted,
            ResponseCode::Success,
        )
        .unwrap();
        assert_eq!(mismatch.expected, "CONTRACT_REVERT_EXECUTED");
        assert_eq!(mismatch.observed, "SUCCESS");
    }
}

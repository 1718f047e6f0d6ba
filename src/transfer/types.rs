//! Transfer result types handed to the front-end

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::LedgerError;
use crate::ledger::Transaction;

/// Result of one transfer attempt
///
/// Declines and settlement failures are reported here with `success = false`;
/// only persistence faults surface as `Err` from the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub success: bool,
    /// Absent when the transfer was declined before a row was written
    pub transaction: Option<Transaction>,
    pub settlement_reference: Option<String>,
    pub explorer_url: Option<String>,
    pub error: Option<String>,
    pub error_code: Option<&'static str>,
    /// Quota left today, when known
    pub remaining_limit: Option<Decimal>,
    /// Balance reported by the network, on balance declines
    pub available_balance: Option<Decimal>,
}

impl TransferOutcome {
    pub fn confirmed(
        transaction: Transaction,
        reference: String,
        explorer_url: String,
        remaining_limit: Decimal,
    ) -> Self {
        Self {
            success: true,
            transaction: Some(transaction),
            settlement_reference: Some(reference),
            explorer_url: Some(explorer_url),
            error: None,
            error_code: None,
            remaining_limit: Some(remaining_limit),
            available_balance: None,
        }
    }

    /// Declined before anything was written
    pub fn declined(err: &LedgerError) -> Self {
        let (remaining_limit, available_balance) = match err {
            LedgerError::LimitExceeded { remaining, .. } => (Some(*remaining), None),
            LedgerError::InsufficientFunds { available, .. } => (None, Some(*available)),
            _ => (None, None),
        };
        Self {
            success: false,
            transaction: None,
            settlement_reference: None,
            explorer_url: None,
            error: Some(err.to_string()),
            error_code: Some(err.code()),
            remaining_limit,
            available_balance,
        }
    }

    /// Settlement failed; the row is already FAILED
    pub fn failed(transaction: Transaction, err: &LedgerError) -> Self {
        Self {
            success: false,
            transaction: Some(transaction),
            settlement_reference: None,
            explorer_url: None,
            error: Some(err.to_string()),
            error_code: Some(err.code()),
            remaining_limit: None,
            available_balance: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declined_carries_quota() {
        let err = LedgerError::LimitExceeded {
            requested: Decimal::from(25),
            remaining: Decimal::from(20),
        };
        let outcome = TransferOutcome::declined(&err);
        assert!(!outcome.success);
        assert!(outcome.transaction.is_none());
        assert_eq!(outcome.error_code, Some("LIMIT_EXCEEDED"));
        assert_eq!(outcome.remaining_limit, Some(Decimal::from(20)));
        assert_eq!(outcome.available_balance, None);
    }

    #[test]
    fn test_declined_carries_balance() {
        let err = LedgerError::InsufficientFunds {
            required: Decimal::from(50),
            available: Decimal::from(10),
        };
        let outcome = TransferOutcome::declined(&err);
        assert_eq!(outcome.error_code, Some("INSUFFICIENT_FUNDS"));
        assert_eq!(outcome.available_balance, Some(Decimal::from(10)));
        assert!(outcome.error.unwrap().contains("10 available"));
    }

    #[test]
    fn test_outcome_json_shape() {
        let err = LedgerError::Validation("amount must be greater than zero".into());
        let json = serde_json::to_value(TransferOutcome::declined(&err)).unwrap();
        assert_eq!(json["success"], serde_json::json!(false));
        assert_eq!(json["error_code"], serde_json::json!("VALIDATION_ERROR"));
        assert!(json["transaction"].is_null());
        assert!(json["settlement_reference"].is_null());
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::state::WithdrawalStatus;
use crate::error::LedgerError;

/// Fiat off-ramp request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalRequest {
    pub id: i64,
    pub user_id: i64,
    pub wallet_id: i64,
    /// Ledger-currency amount requested
    pub amount: Decimal,
    pub fee: Decimal,
    /// `(amount - fee) * rate`, in cents precision
    pub fiat_amount: Decimal,
    pub fiat_currency: String,
    pub payout_reference: Option<String>,
    pub status: WithdrawalStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub user_id: i64,
    pub wallet_id: i64,
    pub amount: Decimal,
    pub fee: Decimal,
    pub fiat_amount: Decimal,
    pub fiat_currency: String,
}

/// Result handed to the front-end
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalOutcome {
    pub success: bool,
    pub request: Option<WithdrawalRequest>,
    pub payout_reference: Option<String>,
    pub error: Option<String>,
    pub error_code: Option<&'static str>,
}

impl WithdrawalOutcome {
    pub fn accepted(request: WithdrawalRequest) -> Self {
        Self {
            success: true,
            payout_reference: request.payout_reference.clone(),
            request: Some(request),
            error: None,
            error_code: None,
        }
    }

    pub fn declined(err: &LedgerError) -> Self {
        Self {
            success: false,
            request: None,
            payout_reference: None,
            error: Some(err.to_string()),
            error_code: Some(err.code()),
        }
    }
}

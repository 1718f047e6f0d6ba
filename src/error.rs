//! Ledger Error Types
//!
//! One error enum for the whole engine. Business declines (validation, limit,
//! balance) are turned into structured outcomes by the coordinator; only
//! persistence problems are expected to travel up as faults.

use rust_decimal::Decimal;
use thiserror::Error;

/// Engine error types
///
/// Error codes are stable strings so callers can branch without matching on
/// the message text.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    // === Validation Errors ===
    #[error("Invalid request: {0}")]
    Validation(String),

    // === Business Declines ===
    #[error("Daily spending limit exceeded: requested {requested}, remaining {remaining}")]
    LimitExceeded {
        requested: Decimal,
        remaining: Decimal,
    },

    #[error("Insufficient balance: {required} required, {available} available")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    // === Settlement Errors ===
    #[error("Settlement failed: {0}")]
    Settlement(String),

    // === Lookup Errors ===
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(i64),

    #[error("Withdrawal request not found: {0}")]
    WithdrawalNotFound(i64),

    // === Lifecycle Errors ===
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // === System Errors ===
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl LedgerError {
    /// Get the error code for outcome payloads
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "VALIDATION_ERROR",
            LedgerError::LimitExceeded { .. } => "LIMIT_EXCEEDED",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::Settlement(_) => "SETTLEMENT_FAILURE",
            LedgerError::WalletNotFound(_) => "WALLET_NOT_FOUND",
            LedgerError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            LedgerError::WithdrawalNotFound(_) => "WITHDRAWAL_NOT_FOUND",
            LedgerError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            LedgerError::Persistence(_) => "PERSISTENCE_FAILURE",
            LedgerError::CorruptRow(_) => "CORRUPT_ROW",
        }
    }

    /// Declines are business outcomes and leave no state behind
    pub fn is_decline(&self) -> bool {
        matches!(
            self,
            LedgerError::Validation(_)
                | LedgerError::LimitExceeded { .. }
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::WalletNotFound(_)
        )
    }

    /// Faults that indicate an environment problem rather than a decision
    pub fn is_fault(&self) -> bool {
        matches!(self, LedgerError::Persistence(_) | LedgerError::CorruptRow(_))
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Persistence(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

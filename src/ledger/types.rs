//! Transaction Core Types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::state::{TxKind, TxStatus};
use crate::error::LedgerError;

/// Where value is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Another wallet tracked by this ledger
    Wallet(i64),
    /// Any address outside the ledger
    External(String),
}

/// Input for [`TransactionLedger::create`](super::db::TransactionLedger::create)
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub from_wallet_id: i64,
    pub amount: Decimal,
    pub kind: TxKind,
    pub to_wallet_id: Option<i64>,
    pub to_address: Option<String>,
    pub fee: Decimal,
    /// Recorded as-is; the row still starts PENDING
    pub settlement_ref: Option<String>,
}

impl NewTransaction {
    pub fn new(from_wallet_id: i64, amount: Decimal, kind: TxKind) -> Self {
        Self {
            from_wallet_id,
            amount,
            kind,
            to_wallet_id: None,
            to_address: None,
            fee: Decimal::ZERO,
            settlement_ref: None,
        }
    }

    pub fn to(mut self, destination: Destination) -> Self {
        match destination {
            Destination::Wallet(id) => self.to_wallet_id = Some(id),
            Destination::External(address) => self.to_address = Some(address),
        }
        self
    }

    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_settlement_ref(mut self, reference: impl Into<String>) -> Self {
        self.settlement_ref = Some(reference.into());
        self
    }

    /// Field rules that hold before anything is written
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount <= Decimal::ZERO {
            return Err(LedgerError::validation("amount must be greater than zero"));
        }
        if self.fee < Decimal::ZERO {
            return Err(LedgerError::validation("fee must not be negative"));
        }
        if self.to_wallet_id.is_some() && self.to_address.is_some() {
            return Err(LedgerError::validation(
                "destination wallet and external address are mutually exclusive",
            ));
        }
        let has_destination = self.to_wallet_id.is_some() || self.to_address.is_some();
        if self.kind.requires_destination() && !has_destination {
            return Err(LedgerError::validation(format!(
                "{} requires a destination",
                self.kind
            )));
        }
        if !self.kind.requires_destination() && has_destination {
            return Err(LedgerError::validation(format!(
                "{} rows carry no destination",
                self.kind
            )));
        }
        if let Some(address) = &self.to_address
            && address.trim().is_empty()
        {
            return Err(LedgerError::validation("destination address must not be empty"));
        }
        if self.to_wallet_id == Some(self.from_wallet_id) {
            return Err(LedgerError::validation(
                "source and destination wallet are the same",
            ));
        }
        Ok(())
    }
}

/// Optional fields written by a status transition
#[derive(Debug, Clone, Default)]
pub struct TransitionDetail {
    /// Written only if the row has no reference yet
    pub settlement_ref: Option<String>,
    pub error: Option<String>,
}

impl TransitionDetail {
    pub fn settled(reference: impl Into<String>) -> Self {
        Self {
            settlement_ref: Some(reference.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            settlement_ref: None,
            error: Some(error.into()),
        }
    }
}

/// Transaction row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub from_wallet_id: i64,
    pub to_wallet_id: Option<i64>,
    pub to_address: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub fee: Decimal,
    /// External settlement reference
    pub tx_signature: Option<String>,
    pub kind: TxKind,
    pub status: TxStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Amount plus fee
    pub fn total_debit(&self) -> Decimal {
        self.amount + self.fee
    }

    pub fn destination(&self) -> Option<Destination> {
        match (&self.to_wallet_id, &self.to_address) {
            (Some(id), _) => Some(Destination::Wallet(*id)),
            (None, Some(address)) => Some(Destination::External(address.clone())),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_transfer() {
        let ok = NewTransaction::new(1, Decimal::from(50), TxKind::Transfer)
            .to(Destination::Wallet(2))
            .with_fee(Decimal::new(5, 1));
        assert!(ok.validate().is_ok());

        let zero = NewTransaction::new(1, Decimal::ZERO, TxKind::Transfer).to(Destination::Wallet(2));
        assert!(zero.validate().is_err());

        let negative_fee = NewTransaction::new(1, Decimal::ONE, TxKind::Transfer)
            .to(Destination::Wallet(2))
            .with_fee(Decimal::from(-1));
        assert!(negative_fee.validate().is_err());

        let nowhere = NewTransaction::new(1, Decimal::ONE, TxKind::Transfer);
        assert!(nowhere.validate().is_err());

        let to_self = NewTransaction::new(1, Decimal::ONE, TxKind::Transfer).to(Destination::Wallet(1));
        assert!(to_self.validate().is_err());
    }

    #[test]
    fn test_destinations_are_exclusive() {
        let both = NewTransaction::new(1, Decimal::ONE, TxKind::Transfer)
            .to(Destination::Wallet(2))
            .to(Destination::External("Ext".into()));
        assert!(both.validate().is_err());
    }

    #[test]
    fn test_fee_row_has_no_destination() {
        let fee = NewTransaction::new(1, Decimal::ONE, TxKind::Fee);
        assert!(fee.validate().is_ok());

        let fee_with_dest = NewTransaction::new(1, Decimal::ONE, TxKind::Fee).to(Destination::Wallet(2));
        assert!(fee_with_dest.validate().is_err());
    }
}

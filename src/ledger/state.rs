//! Transaction status and kind
//!
//! Stored as lower-case TEXT. Terminal statuses: CONFIRMED, FAILED.
//!
//! ```text
//! PENDING ──▶ CONFIRMED
//!    │
//!    └──────▶ FAILED
//! ```

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::lifecycle::Lifecycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Recorded, settlement outcome not yet known
    Pending,
    /// Terminal: settled on the network and counted against the cap
    Confirmed,
    /// Terminal: settlement failed, cap untouched
    Failed,
}

impl Lifecycle for TxStatus {
    #[inline]
    fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed)
    }

    fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (TxStatus::Pending, TxStatus::Confirmed) | (TxStatus::Pending, TxStatus::Failed)
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TxStatus::Pending),
            "confirmed" => Ok(TxStatus::Confirmed),
            "failed" => Ok(TxStatus::Failed),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Transfer,
    Withdrawal,
    Deposit,
    Fee,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Transfer => "transfer",
            TxKind::Withdrawal => "withdrawal",
            TxKind::Deposit => "deposit",
            TxKind::Fee => "fee",
        }
    }

    /// Transfers and withdrawals go somewhere; fee and deposit rows do not
    pub fn requires_destination(&self) -> bool {
        matches!(self, TxKind::Transfer | TxKind::Withdrawal)
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(TxKind::Transfer),
            "withdrawal" => Ok(TxKind::Withdrawal),
            "deposit" => Ok(TxKind::Deposit),
            "fee" => Ok(TxKind::Fee),
            _ => Err(format!("Invalid transaction kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TxStatus::Confirmed.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
        assert!(!TxStatus::Pending.is_terminal());
    }

    #[test]
    fn test_only_forward_transitions() {
        assert!(TxStatus::Pending.can_transition_to(TxStatus::Confirmed));
        assert!(TxStatus::Pending.can_transition_to(TxStatus::Failed));

        assert!(!TxStatus::Pending.can_transition_to(TxStatus::Pending));
        assert!(!TxStatus::Confirmed.can_transition_to(TxStatus::Failed));
        assert!(!TxStatus::Confirmed.can_transition_to(TxStatus::Confirmed));
        assert!(!TxStatus::Failed.can_transition_to(TxStatus::Confirmed));
        assert!(!TxStatus::Failed.can_transition_to(TxStatus::Pending));
    }

    #[test]
    fn test_parse() {
        assert_eq!("confirmed".parse::<TxStatus>().unwrap(), TxStatus::Confirmed);
        assert!("COMMITTED".parse::<TxStatus>().is_err());
        assert_eq!("fee".parse::<TxKind>().unwrap(), TxKind::Fee);
        assert!("refund".parse::<TxKind>().is_err());
    }

    #[test]
    fn test_destination_rules() {
        assert!(TxKind::Transfer.requires_destination());
        assert!(TxKind::Withdrawal.requires_destination());
        assert!(!TxKind::Fee.requires_destination());
        assert!(!TxKind::Deposit.requires_destination());
    }
}

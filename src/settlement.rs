//! Settlement network collaborator
//!
//! The engine never talks to a network directly. It depends on this trait for
//! balances, transfer submission and (for reconciliation) status lookups.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;
use thiserror::Error;

use crate::wallet::SignerHandle;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Rejected by network: {0}")]
    Rejected(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Network view of a previously submitted transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementStatus {
    Confirmed,
    Failed(String),
    /// Not known (yet) or the client cannot tell
    Unknown,
}

#[async_trait]
pub trait SettlementClient: Send + Sync + Debug {
    /// Balance reported by the network for an address
    async fn balance(&self, address: &str) -> Result<Decimal, SettlementError>;

    async fn has_sufficient_balance(
        &self,
        address: &str,
        amount: Decimal,
    ) -> Result<bool, SettlementError> {
        Ok(self.balance(address).await? >= amount)
    }

    /// Submit a value transfer. Returns the settlement reference.
    async fn submit_transfer(
        &self,
        signer: &SignerHandle,
        destination: &str,
        amount: Decimal,
    ) -> Result<String, SettlementError>;

    /// Presentation only
    fn explorer_url(&self, reference: &str, network: &str) -> String;

    /// Validate an address format
    fn validate_address(&self, address: &str) -> bool;

    async fn settlement_status(&self, _reference: &str) -> Result<SettlementStatus, SettlementError> {
        Ok(SettlementStatus::Unknown)
    }
}

/// A transfer seen by [`MockSettlement`]
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub destination: String,
    pub amount: Decimal,
    pub reference: String,
}

#[derive(Debug, Default)]
struct MockState {
    balances: HashMap<String, Decimal>,
    statuses: HashMap<String, SettlementStatus>,
    fail_submit: Option<String>,
    submissions: Vec<Submission>,
}

/// In-process settlement network
///
/// Balances are set by the caller and never move; submissions are recorded so
/// callers can assert how often the network was hit.
#[derive(Debug, Default)]
pub struct MockSettlement {
    state: Mutex<MockState>,
}

impl MockSettlement {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_balance(&self, address: &str, amount: Decimal) {
        self.state().balances.insert(address.to_string(), amount);
    }

    /// Make every following submission fail with `reason`
    pub fn fail_submissions(&self, reason: &str) {
        self.state().fail_submit = Some(reason.to_string());
    }

    pub fn accept_submissions(&self) {
        self.state().fail_submit = None;
    }

    pub fn set_status(&self, reference: &str, status: SettlementStatus) {
        self.state().statuses.insert(reference.to_string(), status);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }
}

#[async_trait]
impl SettlementClient for MockSettlement {
    async fn balance(&self, address: &str) -> Result<Decimal, SettlementError> {
        Ok(self
            .state()
            .balances
            .get(address)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn submit_transfer(
        &self,
        _signer: &SignerHandle,
        destination: &str,
        amount: Decimal,
    ) -> Result<String, SettlementError> {
        if !self.validate_address(destination) {
            return Err(SettlementError::InvalidAddress(destination.to_string()));
        }

        let mut state = self.state();
        if let Some(reason) = &state.fail_submit {
            return Err(SettlementError::Rejected(reason.clone()));
        }

        let reference = format!("{:x}", uuid::Uuid::new_v4().simple());
        state.submissions.push(Submission {
            destination: destination.to_string(),
            amount,
            reference: reference.clone(),
        });
        state
            .statuses
            .insert(reference.clone(), SettlementStatus::Confirmed);
        Ok(reference)
    }

    fn explorer_url(&self, reference: &str, network: &str) -> String {
        format!("https://explorer.solana.com/tx/{}?cluster={}", reference, network)
    }

    fn validate_address(&self, address: &str) -> bool {
        let len = address.len();
        (3..=64).contains(&len) && address.chars().all(|c| c.is_ascii_alphanumeric())
    }

    async fn settlement_status(&self, reference: &str) -> Result<SettlementStatus, SettlementError> {
        Ok(self
            .state()
            .statuses
            .get(reference)
            .cloned()
            .unwrap_or(SettlementStatus::Unknown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_balance() {
        let mock = MockSettlement::new();
        mock.set_balance("Alice", Decimal::from(10));

        assert_eq!(mock.balance("Alice").await.unwrap(), Decimal::from(10));
        assert_eq!(mock.balance("Nobody").await.unwrap(), Decimal::ZERO);
        assert!(mock.has_sufficient_balance("Alice", Decimal::from(10)).await.unwrap());
        assert!(!mock.has_sufficient_balance("Alice", Decimal::from(11)).await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_submit() {
        let mock = MockSettlement::new();
        let signer = SignerHandle::new("enc:alice");

        let reference = mock
            .submit_transfer(&signer, "Bob", Decimal::ONE)
            .await
            .unwrap();
        assert_eq!(reference.len(), 32);
        assert_eq!(
            mock.settlement_status(&reference).await.unwrap(),
            SettlementStatus::Confirmed
        );

        mock.fail_submissions("blockhash expired");
        let err = mock
            .submit_transfer(&signer, "Bob", Decimal::ONE)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("blockhash expired"));
        assert_eq!(mock.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_rejects_bad_address() {
        let mock = MockSettlement::new();
        let signer = SignerHandle::new("enc:alice");
        assert!(!mock.validate_address("not an address"));
        assert!(matches!(
            mock.submit_transfer(&signer, "a b", Decimal::ONE).await,
            Err(SettlementError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_reference() {
        let mock = MockSettlement::new();
        assert_eq!(
            mock.settlement_status("missing").await.unwrap(),
            SettlementStatus::Unknown
        );
    }
}

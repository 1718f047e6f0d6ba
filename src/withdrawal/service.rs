//! Withdrawal Service
//!
//! Fiat off-ramp requests. There is no real payout network: a request is
//! created PENDING and advanced to PROCESSING with a generated payout
//! reference in the same unit of work. Completion is a separate call.
//! Withdrawals never touch the daily spending cap.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use super::db::WithdrawalRepository;
use super::state::WithdrawalStatus;
use super::types::{NewWithdrawal, WithdrawalOutcome, WithdrawalRequest};
use crate::clock::Clock;
use crate::config::WithdrawalConfig;
use crate::db::Database;
use crate::error::LedgerError;
use crate::fee::{percentage_fee, to_fiat};
use crate::lifecycle::Lifecycle;
use crate::wallet::WalletRepository;

pub struct WithdrawalService {
    db: Database,
    clock: Arc<dyn Clock>,
    config: WithdrawalConfig,
}

impl WithdrawalService {
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: WithdrawalConfig) -> Self {
        Self { db, clock, config }
    }

    /// Apply for a withdrawal
    /// 1. Validate amount, wallet ownership and currency
    /// 2. Create record (PENDING)
    /// 3. Assign payout reference -> PROCESSING
    pub async fn request(
        &self,
        user_id: i64,
        wallet_id: i64,
        amount: Decimal,
        fiat_currency: &str,
    ) -> Result<WithdrawalOutcome, LedgerError> {
        match self.try_request(user_id, wallet_id, amount, fiat_currency).await {
            Ok(request) => Ok(WithdrawalOutcome::accepted(request)),
            Err(e) if e.is_fault() => Err(e),
            Err(e) => {
                info!(user_id, wallet_id, %amount, code = e.code(), reason = %e, "Withdrawal declined");
                Ok(WithdrawalOutcome::declined(&e))
            }
        }
    }

    async fn try_request(
        &self,
        user_id: i64,
        wallet_id: i64,
        amount: Decimal,
        fiat_currency: &str,
    ) -> Result<WithdrawalRequest, LedgerError> {
        if amount <= Decimal::ZERO || amount < self.config.min_amount {
            return Err(LedgerError::validation(format!(
                "minimum withdrawal is {} (got {})",
                self.config.min_amount, amount
            )));
        }

        let currency = fiat_currency.trim().to_uppercase();
        let rate = *self.config.fiat_rates.get(&currency).ok_or_else(|| {
            LedgerError::validation(format!("unsupported fiat currency: {}", fiat_currency))
        })?;

        let fee = percentage_fee(amount, self.config.fee_percent);
        let fiat_amount = to_fiat(amount - fee, rate);
        let now = self.clock.now();

        let mut uow = self.db.begin().await?;

        let wallet = WalletRepository::get(&mut uow, wallet_id)
            .await?
            .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))?;
        if wallet.user_id != user_id {
            return Err(LedgerError::validation(format!(
                "wallet {} does not belong to user {}",
                wallet_id, user_id
            )));
        }
        if !wallet.is_active {
            return Err(LedgerError::validation(format!(
                "wallet {} is deactivated",
                wallet_id
            )));
        }

        let new = NewWithdrawal {
            user_id,
            wallet_id,
            amount,
            fee,
            fiat_amount,
            fiat_currency: currency,
        };
        let id = WithdrawalRepository::create(&mut uow, &new, now).await?;

        let payout_reference = format!("PAYOUT-{}", ulid::Ulid::new());
        let advanced = WithdrawalRepository::update_status_if(
            &mut uow,
            id,
            WithdrawalStatus::Pending,
            WithdrawalStatus::Processing,
            Some(&payout_reference),
            None,
            now,
        )
        .await?;
        if !advanced {
            return Err(LedgerError::Persistence(format!(
                "withdrawal {} changed while it was being created",
                id
            )));
        }

        let request = WithdrawalRepository::get(&mut uow, id)
            .await?
            .ok_or(LedgerError::WithdrawalNotFound(id))?;
        uow.commit().await?;

        info!(
            withdrawal_id = id,
            user_id,
            wallet_id,
            %amount,
            %fee,
            fiat_amount = %request.fiat_amount,
            fiat_currency = %request.fiat_currency,
            payout_reference = %payout_reference,
            "Withdrawal processing"
        );
        Ok(request)
    }

    /// PROCESSING -> COMPLETED
    pub async fn complete(&self, id: i64) -> Result<WithdrawalRequest, LedgerError> {
        self.advance(id, WithdrawalStatus::Completed, None).await
    }

    /// Any non-terminal status -> FAILED
    pub async fn fail(&self, id: i64, detail: &str) -> Result<WithdrawalRequest, LedgerError> {
        self.advance(id, WithdrawalStatus::Failed, Some(detail)).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<WithdrawalRequest>, LedgerError> {
        let mut conn = self.db.pool().acquire().await?;
        WithdrawalRepository::get(&mut conn, id).await
    }

    pub async fn list_for_user(
        &self,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<WithdrawalRequest>, LedgerError> {
        let mut conn = self.db.pool().acquire().await?;
        WithdrawalRepository::list_for_user(&mut conn, user_id, limit).await
    }

    async fn advance(
        &self,
        id: i64,
        to: WithdrawalStatus,
        error: Option<&str>,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let mut uow = self.db.begin().await?;

        let current = WithdrawalRepository::get(&mut uow, id)
            .await?
            .ok_or(LedgerError::WithdrawalNotFound(id))?;
        let rejected = || LedgerError::InvalidStateTransition {
            from: current.status.to_string(),
            to: to.to_string(),
        };

        if !current.status.can_transition_to(to) {
            warn!(withdrawal_id = id, from = %current.status, to = %to, "Rejected withdrawal transition");
            return Err(rejected());
        }

        let now = self.clock.now();
        if !WithdrawalRepository::update_status_if(&mut uow, id, current.status, to, None, error, now)
            .await?
        {
            return Err(rejected());
        }

        let updated = WithdrawalRepository::get(&mut uow, id)
            .await?
            .ok_or(LedgerError::WithdrawalNotFound(id))?;
        uow.commit().await?;

        info!(withdrawal_id = id, from = %current.status, to = %to, "Withdrawal status updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::wallet::{NewWallet, WalletKind};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    struct Fixture {
        service: WithdrawalService,
        db: Database,
        wallet_id: i64,
    }

    async fn fixture() -> Fixture {
        let db = Database::in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap(),
        ));

        let mut conn = db.pool().acquire().await.unwrap();
        let wallet = WalletRepository::create(
            &mut conn,
            &NewWallet {
                user_id: 7,
                address: "SevenAddr".to_string(),
                encrypted_signer: "enc:seven".to_string(),
                kind: WalletKind::Human,
                label: None,
            },
            clock.now(),
        )
        .await
        .unwrap();
        drop(conn);

        let mut fiat_rates = HashMap::new();
        fiat_rates.insert("USD".to_string(), Decimal::ONE);
        fiat_rates.insert("EUR".to_string(), Decimal::new(92, 2));
        let config = WithdrawalConfig {
            min_amount: Decimal::from(10),
            fee_percent: Decimal::ONE,
            fiat_rates,
        };

        Fixture {
            service: WithdrawalService::new(db.clone(), clock, config),
            db,
            wallet_id: wallet.id,
        }
    }

    #[tokio::test]
    async fn test_request_moves_to_processing() {
        let f = fixture().await;
        let outcome = f
            .service
            .request(7, f.wallet_id, Decimal::from(100), "usd")
            .await
            .unwrap();

        assert!(outcome.success);
        let request = outcome.request.unwrap();
        assert_eq!(request.status, WithdrawalStatus::Processing);
        assert_eq!(request.fee, Decimal::ONE);
        assert_eq!(request.fiat_amount, Decimal::from(99));
        assert_eq!(request.fiat_currency, "USD");

        let reference = outcome.payout_reference.unwrap();
        assert!(reference.starts_with("PAYOUT-"));
        assert_eq!(request.payout_reference.as_deref(), Some(reference.as_str()));
    }

    #[tokio::test]
    async fn test_fiat_conversion_rounds_to_cents() {
        let f = fixture().await;
        let outcome = f
            .service
            .request(7, f.wallet_id, Decimal::new(3333, 2), "EUR")
            .await
            .unwrap();

        // fee 0.3333, net 32.9967, * 0.92 = 30.356964
        let request = outcome.request.unwrap();
        assert_eq!(request.fee, Decimal::new(3333, 4));
        assert_eq!(request.fiat_amount, Decimal::new(3036, 2));
    }

    #[tokio::test]
    async fn test_declines_leave_no_row() {
        let f = fixture().await;

        let below_min = f.service.request(7, f.wallet_id, Decimal::from(5), "USD").await.unwrap();
        assert_eq!(below_min.error_code, Some("VALIDATION_ERROR"));

        let currency = f.service.request(7, f.wallet_id, Decimal::from(50), "JPY").await.unwrap();
        assert_eq!(currency.error_code, Some("VALIDATION_ERROR"));

        let not_owner = f.service.request(8, f.wallet_id, Decimal::from(50), "USD").await.unwrap();
        assert_eq!(not_owner.error_code, Some("VALIDATION_ERROR"));

        let missing = f.service.request(7, 999, Decimal::from(50), "USD").await.unwrap();
        assert_eq!(missing.error_code, Some("WALLET_NOT_FOUND"));

        assert!(f.service.list_for_user(7, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_is_forward_only() {
        let f = fixture().await;
        let request = f
            .service
            .request(7, f.wallet_id, Decimal::from(20), "USD")
            .await
            .unwrap()
            .request
            .unwrap();

        let completed = f.service.complete(request.id).await.unwrap();
        assert_eq!(completed.status, WithdrawalStatus::Completed);
        assert_eq!(completed.payout_reference, request.payout_reference);

        assert!(matches!(
            f.service.complete(request.id).await,
            Err(LedgerError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            f.service.fail(request.id, "late failure").await,
            Err(LedgerError::InvalidStateTransition { .. })
        ));

        let stored = f.service.get(request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, WithdrawalStatus::Completed);
        assert!(stored.error_message.is_none());
    }

    #[tokio::test]
    async fn test_fail_processing_request() {
        let f = fixture().await;
        let request = f
            .service
            .request(7, f.wallet_id, Decimal::from(20), "USD")
            .await
            .unwrap()
            .request
            .unwrap();

        let failed = f.service.fail(request.id, "bank rejected").await.unwrap();
        assert_eq!(failed.status, WithdrawalStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("bank rejected"));

        assert!(matches!(
            f.service.complete(request.id).await,
            Err(LedgerError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_request() {
        let f = fixture().await;
        assert!(f.service.get(404).await.unwrap().is_none());
        assert!(matches!(
            f.service.complete(404).await,
            Err(LedgerError::WithdrawalNotFound(404))
        ));
    }

    #[tokio::test]
    async fn test_list_for_user_and_cap_untouched() {
        let f = fixture().await;
        f.service.request(7, f.wallet_id, Decimal::from(20), "USD").await.unwrap();
        f.service.request(7, f.wallet_id, Decimal::from(30), "USD").await.unwrap();

        let listed = f.service.list_for_user(7, 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].amount, Decimal::from(30));
        assert!(f.service.list_for_user(8, 10).await.unwrap().is_empty());

        let limits: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM spending_limits")
            .fetch_one(f.db.pool())
            .await
            .unwrap();
        assert_eq!(limits, 0);
    }
}

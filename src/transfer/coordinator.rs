//! Transfer Coordinator
//!
//! Drives one transfer from quota check to a terminal ledger row.
//! This is the only place where local bookkeeping meets the settlement network.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::types::TransferOutcome;
use crate::clock::Clock;
use crate::config::{LedgerConfig, SpendBasis};
use crate::db::Database;
use crate::error::LedgerError;
use crate::fee::percentage_fee;
use crate::ledger::{
    Destination, NewTransaction, Transaction, TransactionLedger, TransitionDetail, TxKind,
    TxStatus,
};
use crate::settlement::SettlementClient;
use crate::spending_limit::{LimitCheck, SpendingLimit, SpendingLimitTracker};
use crate::wallet::{Wallet, WalletRepository};

/// Everything resolved before the pending row is written
struct PreparedTransfer {
    source: Wallet,
    destination: Destination,
    destination_address: String,
    amount: Decimal,
    fee: Decimal,
    /// What the daily cap is checked against and later charged
    spend: Decimal,
}

impl PreparedTransfer {
    /// What leaves the source wallet
    fn debit(&self) -> Decimal {
        self.amount + self.fee
    }
}

/// Transfer Coordinator
pub struct TransferCoordinator {
    db: Database,
    ledger: TransactionLedger,
    limits: SpendingLimitTracker,
    settlement: Arc<dyn SettlementClient>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl TransferCoordinator {
    pub fn new(
        db: Database,
        settlement: Arc<dyn SettlementClient>,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            ledger: TransactionLedger::new(config.currency.clone(), clock.clone()),
            limits: SpendingLimitTracker::new(config.default_daily_limit, clock.clone()),
            db,
            settlement,
            clock,
            config,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    pub fn limits(&self) -> &SpendingLimitTracker {
        &self.limits
    }

    pub fn settlement(&self) -> &Arc<dyn SettlementClient> {
        &self.settlement
    }

    /// Transfer between two wallets tracked by the ledger
    pub async fn transfer_to_wallet(
        &self,
        from_wallet_id: i64,
        to_wallet_id: i64,
        amount: Decimal,
    ) -> Result<TransferOutcome, LedgerError> {
        self.execute(from_wallet_id, Destination::Wallet(to_wallet_id), amount)
            .await
    }

    /// Transfer to an address outside the ledger
    pub async fn transfer_to_address(
        &self,
        from_wallet_id: i64,
        address: &str,
        amount: Decimal,
    ) -> Result<TransferOutcome, LedgerError> {
        self.execute(
            from_wallet_id,
            Destination::External(address.to_string()),
            amount,
        )
        .await
    }

    /// Quota check for the front-end, no state change
    pub async fn check_limit(
        &self,
        wallet_id: i64,
        amount: Decimal,
    ) -> Result<LimitCheck, LedgerError> {
        let mut conn = self.db.pool().acquire().await?;
        self.limits.check(&mut conn, wallet_id, amount).await
    }

    pub async fn set_daily_limit(
        &self,
        wallet_id: i64,
        cap: Decimal,
    ) -> Result<SpendingLimit, LedgerError> {
        let mut conn = self.db.pool().acquire().await?;
        self.limits.set_cap(&mut conn, wallet_id, cap).await
    }

    /// Most recent rows for a wallet, capped at `history_limit`
    pub async fn history(&self, wallet_id: i64) -> Result<Vec<Transaction>, LedgerError> {
        let mut conn = self.db.pool().acquire().await?;
        self.ledger
            .list_for_wallet(&mut conn, wallet_id, self.config.history_limit)
            .await
    }

    async fn execute(
        &self,
        from_wallet_id: i64,
        destination: Destination,
        amount: Decimal,
    ) -> Result<TransferOutcome, LedgerError> {
        // 1. Local checks, then network balance. Nothing is written on decline.
        let prepared = match self.prepare(from_wallet_id, destination, amount).await {
            Ok(prepared) => prepared,
            Err(e) if e.is_fault() => return Err(e),
            Err(e) => {
                info!(
                    from_wallet_id,
                    %amount,
                    code = e.code(),
                    reason = %e,
                    "Transfer declined"
                );
                return Ok(TransferOutcome::declined(&e));
            }
        };

        // 2. Persist PENDING before calling the network
        let pending = {
            let new = NewTransaction::new(prepared.source.id, prepared.amount, TxKind::Transfer)
                .to(prepared.destination.clone())
                .with_fee(prepared.fee);
            let mut conn = self.db.pool().acquire().await?;
            self.ledger.create(&mut conn, &new).await?
        };

        // 3. Settlement, outside any unit of work
        let submitted = self
            .settlement
            .submit_transfer(
                &prepared.source.signer(),
                &prepared.destination_address,
                prepared.amount,
            )
            .await;

        match submitted {
            Ok(reference) => {
                let (confirmed, limit) = self
                    .commit_settlement(pending.id, prepared.source.id, prepared.spend, &reference)
                    .await?;
                let explorer_url = self.settlement.explorer_url(&reference, &self.config.network);

                info!(
                    tx_id = confirmed.id,
                    from_wallet_id = prepared.source.id,
                    amount = %prepared.amount,
                    fee = %prepared.fee,
                    reference = %reference,
                    "Transfer confirmed"
                );

                Ok(TransferOutcome::confirmed(
                    confirmed,
                    reference,
                    explorer_url,
                    limit.remaining_on(self.clock.today()),
                ))
            }
            Err(e) => {
                let err = LedgerError::Settlement(e.to_string());
                let mut conn = self.db.pool().acquire().await?;
                let failed = self
                    .ledger
                    .transition(
                        &mut conn,
                        pending.id,
                        TxStatus::Failed,
                        TransitionDetail::failed(e.to_string()),
                    )
                    .await?;

                warn!(
                    tx_id = failed.id,
                    from_wallet_id = prepared.source.id,
                    error = %e,
                    "Settlement failed, spending cap untouched"
                );
                Ok(TransferOutcome::failed(failed, &err))
            }
        }
    }

    async fn prepare(
        &self,
        from_wallet_id: i64,
        destination: Destination,
        amount: Decimal,
    ) -> Result<PreparedTransfer, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "amount must be greater than zero (got {})",
                amount
            )));
        }

        let mut conn = self.db.pool().acquire().await?;

        let source = active_wallet(&mut conn, from_wallet_id).await?;
        let destination_address = match &destination {
            Destination::Wallet(to_wallet_id) => {
                if *to_wallet_id == source.id {
                    return Err(LedgerError::validation("cannot transfer to the same wallet"));
                }
                active_wallet(&mut conn, *to_wallet_id).await?.address
            }
            Destination::External(address) => {
                let address = address.trim();
                if address.is_empty() || !self.settlement.validate_address(address) {
                    return Err(LedgerError::validation(format!(
                        "invalid destination address: {:?}",
                        address
                    )));
                }
                address.to_string()
            }
        };
        let destination = match destination {
            Destination::External(_) => Destination::External(destination_address.clone()),
            wallet => wallet,
        };

        let fee = percentage_fee(amount, self.config.platform_fee_percent);
        let spend = self.spend_on(&destination, amount, fee);
        let prepared = PreparedTransfer {
            source,
            destination,
            destination_address,
            amount,
            fee,
            spend,
        };

        // Spending limit first: it is local and cheap
        let check = self
            .limits
            .check(&mut conn, prepared.source.id, prepared.spend)
            .await?;
        drop(conn);

        if !check.allowed {
            return Err(LedgerError::LimitExceeded {
                requested: prepared.spend,
                remaining: check.remaining,
            });
        }

        let address = &prepared.source.address;
        let sufficient = self
            .settlement
            .has_sufficient_balance(address, prepared.debit())
            .await
            .map_err(|e| LedgerError::Settlement(e.to_string()))?;
        if !sufficient {
            let available = self
                .settlement
                .balance(address)
                .await
                .map_err(|e| LedgerError::Settlement(e.to_string()))?;
            return Err(LedgerError::InsufficientFunds {
                required: prepared.debit(),
                available,
            });
        }

        debug!(
            from_wallet_id = prepared.source.id,
            amount = %prepared.amount,
            fee = %prepared.fee,
            remaining = %check.remaining,
            "Transfer passed limit and balance checks"
        );
        Ok(prepared)
    }

    /// Amount a settled row consumes from the daily cap
    pub(crate) fn spend_for(&self, tx: &Transaction) -> Decimal {
        match tx.destination() {
            Some(destination) => self.spend_on(&destination, tx.amount, tx.fee),
            None => tx.total_debit(),
        }
    }

    fn spend_on(&self, destination: &Destination, amount: Decimal, fee: Decimal) -> Decimal {
        match (destination, self.config.external_spend_basis) {
            (Destination::External(_), SpendBasis::Net) => amount,
            _ => amount + fee,
        }
    }

    /// Record the spend and confirm the row in one unit of work.
    ///
    /// The network call already happened, so a failed commit is retried here
    /// and never resubmitted. When every attempt fails the reference is kept
    /// on the PENDING row for the reconciliation worker.
    pub(crate) async fn commit_settlement(
        &self,
        tx_id: i64,
        wallet_id: i64,
        spend: Decimal,
        reference: &str,
    ) -> Result<(Transaction, SpendingLimit), LedgerError> {
        let attempts = self.config.commit_attempts.max(1);
        let delay = Duration::from_millis(self.config.commit_retry_delay_ms);
        let mut last_err = None;

        for attempt in 1..=attempts {
            match self.try_commit(tx_id, wallet_id, spend, reference).await {
                Ok(committed) => return Ok(committed),
                // Row is no longer PENDING, retrying cannot help
                Err(e @ LedgerError::InvalidStateTransition { .. }) => return Err(e),
                Err(e) => {
                    warn!(tx_id, attempt, attempts, error = %e, "Confirm commit failed");
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        match self.db.pool().acquire().await {
            Ok(mut conn) => {
                if let Err(e) = self.ledger.attach_reference(&mut conn, tx_id, reference).await {
                    error!(tx_id, reference, error = %e, "Failed to keep settlement reference");
                }
            }
            Err(e) => error!(tx_id, reference, error = %e, "Failed to keep settlement reference"),
        }

        error!(
            tx_id,
            reference,
            "CRITICAL: settled on the network but local confirm failed, left PENDING"
        );
        Err(last_err.unwrap_or_else(|| LedgerError::Persistence("confirm commit failed".into())))
    }

    async fn try_commit(
        &self,
        tx_id: i64,
        wallet_id: i64,
        spend: Decimal,
        reference: &str,
    ) -> Result<(Transaction, SpendingLimit), LedgerError> {
        let mut uow = self.db.begin().await?;
        let limit = self.limits.record(&mut uow, wallet_id, spend).await?;
        let confirmed = self
            .ledger
            .transition(
                &mut uow,
                tx_id,
                TxStatus::Confirmed,
                TransitionDetail::settled(reference),
            )
            .await?;
        uow.commit().await?;
        Ok((confirmed, limit))
    }
}

async fn active_wallet(
    conn: &mut sqlx::SqliteConnection,
    wallet_id: i64,
) -> Result<Wallet, LedgerError> {
    let wallet = WalletRepository::get(conn, wallet_id)
        .await?
        .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))?;
    if !wallet.is_active {
        return Err(LedgerError::validation(format!(
            "wallet {} is deactivated",
            wallet_id
        )));
    }
    Ok(wallet)
}

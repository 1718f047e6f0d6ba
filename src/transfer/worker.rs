//! Reconciliation Worker
//!
//! Background worker that resolves transfers left PENDING after the process
//! lost track of them (crash mid-flight, or a confirm commit that kept failing).
//!
//! Only rows carrying a settlement reference can be resolved: their status is
//! asked from the settlement network. Rows without one never reached the
//! network as far as the ledger knows; they are reported and left alone.
//!
//! A spend is charged to the counter of the day it is reconciled on. A row
//! created before today's rollover therefore lands on today's quota; the day
//! it was submitted on has already been reset and cannot be charged anymore.

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::coordinator::TransferCoordinator;
use crate::clock::Clock;
use crate::config::ReconciliationConfig;
use crate::error::LedgerError;
use crate::ledger::{Transaction, TransitionDetail, TxStatus};
use crate::settlement::SettlementStatus;

/// Counts from one scan
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub confirmed: usize,
    pub failed: usize,
    /// Still PENDING after this scan
    pub unresolved: usize,
}

pub struct ReconciliationWorker {
    coordinator: Arc<TransferCoordinator>,
    clock: Arc<dyn Clock>,
    config: ReconciliationConfig,
}

impl ReconciliationWorker {
    pub fn new(
        coordinator: Arc<TransferCoordinator>,
        clock: Arc<dyn Clock>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            coordinator,
            clock,
            config,
        }
    }

    /// Run the worker loop
    ///
    /// This method runs forever, periodically scanning for stale PENDING rows.
    pub async fn run(&self) -> ! {
        info!(
            scan_interval_secs = self.config.scan_interval_secs,
            stale_threshold_secs = self.config.stale_threshold_secs,
            "Starting reconciliation worker"
        );

        let interval = Duration::from_secs(self.config.scan_interval_secs.max(1));
        loop {
            if let Err(e) = self.scan_once().await {
                error!(error = %e, "Reconciliation scan failed");
            }

            tokio::time::sleep(interval).await;
        }
    }

    /// Run a single scan
    pub async fn scan_once(&self) -> Result<ScanReport, LedgerError> {
        let threshold = i64::try_from(self.config.stale_threshold_secs).unwrap_or(i64::MAX);
        let cutoff = self.clock.now() - ChronoDuration::seconds(threshold);

        let stale = {
            let mut conn = self.coordinator.db().pool().acquire().await?;
            self.coordinator
                .ledger()
                .find_stale_pending(&mut conn, cutoff, self.config.batch_size)
                .await?
        };

        let mut report = ScanReport {
            scanned: stale.len(),
            ..Default::default()
        };
        if stale.is_empty() {
            debug!("No stale pending transactions");
            return Ok(report);
        }

        info!(count = stale.len(), "Found stale pending transactions");

        for tx in &stale {
            match self.reconcile(tx).await {
                Ok(TxStatus::Confirmed) => report.confirmed += 1,
                Ok(TxStatus::Failed) => report.failed += 1,
                Ok(TxStatus::Pending) => report.unresolved += 1,
                Err(e) => {
                    error!(tx_id = tx.id, error = %e, "Failed to reconcile transaction");
                    report.unresolved += 1;
                }
            }
        }

        if report.confirmed + report.failed > 0 {
            info!(
                confirmed = report.confirmed,
                failed = report.failed,
                unresolved = report.unresolved,
                "Reconciled stale transactions"
            );
        }
        Ok(report)
    }

    async fn reconcile(&self, tx: &Transaction) -> Result<TxStatus, LedgerError> {
        let Some(reference) = tx.tx_signature.as_deref() else {
            warn!(
                tx_id = tx.id,
                from_wallet_id = tx.from_wallet_id,
                created_at = %tx.created_at,
                "Stale pending transaction has no settlement reference, needs manual review"
            );
            return Ok(TxStatus::Pending);
        };

        let status = self
            .coordinator
            .settlement()
            .settlement_status(reference)
            .await
            .map_err(|e| LedgerError::Settlement(e.to_string()))?;

        match status {
            SettlementStatus::Confirmed => {
                let spend = self.coordinator.spend_for(tx);
                let created_on = tx.created_at.with_timezone(&self.clock.offset()).date_naive();
                let today = self.clock.today();
                if created_on < today {
                    info!(
                        tx_id = tx.id,
                        %created_on,
                        %today,
                        %spend,
                        "Late settlement charged to today's spending counter"
                    );
                }
                self.coordinator
                    .commit_settlement(tx.id, tx.from_wallet_id, spend, reference)
                    .await?;
                info!(tx_id = tx.id, reference, "Stale transaction confirmed");
                Ok(TxStatus::Confirmed)
            }
            SettlementStatus::Failed(reason) => {
                let mut conn = self.coordinator.db().pool().acquire().await?;
                self.coordinator
                    .ledger()
                    .transition(
                        &mut conn,
                        tx.id,
                        TxStatus::Failed,
                        TransitionDetail::failed(reason.clone()),
                    )
                    .await?;
                info!(tx_id = tx.id, reference, reason = %reason, "Stale transaction failed");
                Ok(TxStatus::Failed)
            }
            SettlementStatus::Unknown => {
                debug!(tx_id = tx.id, reference, "Settlement status still unknown");
                Ok(TxStatus::Pending)
            }
        }
    }
}

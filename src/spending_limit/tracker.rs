//! Spending-Limit Tracker
//!
//! Owns the `spending_limits` rows. The daily reset is lazy: the first access
//! on a new reference-calendar day rewrites the counter to zero, so a wallet
//! idle for any number of days rolls over exactly once.
//!
//! Every method takes the connection of the caller's unit of work so that a
//! spend can be recorded atomically with the ledger transition it belongs to.

use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::models::{LimitCheck, SpendingLimit};
use crate::clock::Clock;
use crate::db::{decimal_to_sql, get_decimal};
use crate::error::LedgerError;
use crate::wallet::WalletRepository;

pub struct SpendingLimitTracker {
    default_cap: Decimal,
    clock: Arc<dyn Clock>,
}

impl SpendingLimitTracker {
    pub fn new(default_cap: Decimal, clock: Arc<dyn Clock>) -> Self {
        Self { default_cap, clock }
    }

    pub fn default_cap(&self) -> Decimal {
        self.default_cap
    }

    /// Return the wallet's limit row, creating it with the default cap if
    /// absent and rolling a stale counter over to zero.
    pub async fn get_or_create(
        &self,
        conn: &mut SqliteConnection,
        wallet_id: i64,
    ) -> Result<SpendingLimit, LedgerError> {
        let now = self.clock.now();
        let today = self.clock.today();

        let existing = Self::fetch(conn, wallet_id).await?;
        let limit = match existing {
            Some(limit) => limit,
            None => {
                ensure_wallet(conn, wallet_id).await?;
                sqlx::query(
                    r#"INSERT INTO spending_limits (wallet_id, daily_limit, used_today, reset_date, created_at, updated_at)
                       VALUES (?, ?, '0', ?, ?, ?)
                       ON CONFLICT (wallet_id) DO NOTHING"#,
                )
                .bind(wallet_id)
                .bind(decimal_to_sql(self.default_cap))
                .bind(today)
                .bind(now)
                .bind(now)
                .execute(&mut *conn)
                .await?;

                debug!(wallet_id, cap = %self.default_cap, "Spending limit created");
                return Self::fetch(conn, wallet_id)
                    .await?
                    .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()));
            }
        };

        if limit.reset_date < today {
            sqlx::query(
                "UPDATE spending_limits SET used_today = '0', reset_date = ?, updated_at = ? WHERE wallet_id = ?",
            )
            .bind(today)
            .bind(now)
            .bind(wallet_id)
            .execute(&mut *conn)
            .await?;

            info!(
                wallet_id,
                previous_date = %limit.reset_date,
                previous_used = %limit.used_today,
                %today,
                "Daily spending counter rolled over"
            );

            return Ok(SpendingLimit {
                used_today: Decimal::ZERO,
                reset_date: today,
                updated_at: now,
                ..limit
            });
        }

        if limit.reset_date > today {
            // Clock moved backwards; keep counting against the later day
            warn!(
                wallet_id,
                reset_date = %limit.reset_date,
                %today,
                "Spending counter dated after today, not resetting"
            );
        }

        Ok(limit)
    }

    /// Read-only quota check. Missing rows and stale counters are evaluated
    /// as they would look after rollover, without writing anything.
    pub async fn check(
        &self,
        conn: &mut SqliteConnection,
        wallet_id: i64,
        amount: Decimal,
    ) -> Result<LimitCheck, LedgerError> {
        ensure_positive(amount)?;
        let today = self.clock.today();

        let (daily_limit, used_today) = match Self::fetch(conn, wallet_id).await? {
            Some(limit) => (limit.daily_limit, limit.used_on(today)),
            None => {
                ensure_wallet(conn, wallet_id).await?;
                (self.default_cap, Decimal::ZERO)
            }
        };
        let remaining = (daily_limit - used_today).max(Decimal::ZERO);

        Ok(LimitCheck {
            allowed: amount <= remaining,
            remaining,
            daily_limit,
            used_today,
        })
    }

    /// Add `amount` to today's counter.
    ///
    /// Only call this once the amount is final in the ledger; there is no undo.
    pub async fn record(
        &self,
        conn: &mut SqliteConnection,
        wallet_id: i64,
        amount: Decimal,
    ) -> Result<SpendingLimit, LedgerError> {
        ensure_positive(amount)?;
        let limit = self.get_or_create(conn, wallet_id).await?;
        let now = self.clock.now();
        let used_today = limit.used_today + amount;

        sqlx::query("UPDATE spending_limits SET used_today = ?, updated_at = ? WHERE wallet_id = ?")
            .bind(decimal_to_sql(used_today))
            .bind(now)
            .bind(wallet_id)
            .execute(&mut *conn)
            .await?;

        debug!(wallet_id, %amount, %used_today, cap = %limit.daily_limit, "Spend recorded");

        Ok(SpendingLimit {
            used_today,
            updated_at: now,
            ..limit
        })
    }

    /// Overwrite the wallet's daily cap; today's usage is kept.
    pub async fn set_cap(
        &self,
        conn: &mut SqliteConnection,
        wallet_id: i64,
        new_cap: Decimal,
    ) -> Result<SpendingLimit, LedgerError> {
        if new_cap < Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "daily limit must not be negative (got {})",
                new_cap
            )));
        }

        let limit = self.get_or_create(conn, wallet_id).await?;
        let now = self.clock.now();

        sqlx::query("UPDATE spending_limits SET daily_limit = ?, updated_at = ? WHERE wallet_id = ?")
            .bind(decimal_to_sql(new_cap))
            .bind(now)
            .bind(wallet_id)
            .execute(&mut *conn)
            .await?;

        info!(wallet_id, old_cap = %limit.daily_limit, new_cap = %new_cap, "Daily limit updated");

        Ok(SpendingLimit {
            daily_limit: new_cap,
            updated_at: now,
            ..limit
        })
    }

    /// Raw row, no rollover
    pub async fn fetch(
        conn: &mut SqliteConnection,
        wallet_id: i64,
    ) -> Result<Option<SpendingLimit>, LedgerError> {
        let row = sqlx::query(
            r#"SELECT wallet_id, daily_limit, used_today, reset_date, created_at, updated_at
               FROM spending_limits WHERE wallet_id = ?"#,
        )
        .bind(wallet_id)
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(row_to_limit).transpose()
    }
}

fn ensure_positive(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "amount must be greater than zero (got {})",
            amount
        )));
    }
    Ok(())
}

/// A missing limit row is only created for a wallet the directory knows
async fn ensure_wallet(conn: &mut SqliteConnection, wallet_id: i64) -> Result<(), LedgerError> {
    match WalletRepository::get(conn, wallet_id).await? {
        Some(_) => Ok(()),
        None => Err(LedgerError::WalletNotFound(wallet_id.to_string())),
    }
}

fn row_to_limit(row: &SqliteRow) -> Result<SpendingLimit, LedgerError> {
    Ok(SpendingLimit {
        wallet_id: row.try_get("wallet_id")?,
        daily_limit: get_decimal(row, "daily_limit")?,
        used_today: get_decimal(row, "used_today")?,
        reset_date: row.try_get("reset_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

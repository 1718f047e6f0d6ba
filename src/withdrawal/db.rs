use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::state::WithdrawalStatus;
use super::types::{NewWithdrawal, WithdrawalRequest};
use crate::db::{decimal_to_sql, get_decimal};
use crate::error::LedgerError;
use crate::lifecycle::Lifecycle;

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, wallet_id, amount, fee, fiat_amount, fiat_currency,
           payout_reference, status, error_message, created_at, updated_at
    FROM withdrawal_requests
"#;

/// Withdrawal request persistence
pub struct WithdrawalRepository;

impl WithdrawalRepository {
    pub async fn create(
        conn: &mut SqliteConnection,
        new: &NewWithdrawal,
        now: DateTime<Utc>,
    ) -> Result<i64, LedgerError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO withdrawal_requests
                (user_id, wallet_id, amount, fee, fiat_amount, fiat_currency, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(new.user_id)
        .bind(new.wallet_id)
        .bind(decimal_to_sql(new.amount))
        .bind(decimal_to_sql(new.fee))
        .bind(decimal_to_sql(new.fiat_amount))
        .bind(&new.fiat_currency)
        .bind(WithdrawalStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }

    /// CAS status update. Returns false when the row was not in `from`.
    ///
    /// `payout_reference` only fills a NULL column.
    pub async fn update_status_if(
        conn: &mut SqliteConnection,
        id: i64,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
        payout_reference: Option<&str>,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = ?,
                payout_reference = COALESCE(payout_reference, ?),
                error_message = COALESCE(?, error_message),
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to.as_str())
        .bind(payout_reference)
        .bind(error)
        .bind(now)
        .bind(id)
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<WithdrawalRequest>, LedgerError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        row.as_ref().map(row_to_request).transpose()
    }

    /// Newest first
    pub async fn list_for_user(
        conn: &mut SqliteConnection,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<WithdrawalRequest>, LedgerError> {
        let rows = sqlx::query(&format!(
            "{} WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_request).collect()
    }
}

fn row_to_request(row: &SqliteRow) -> Result<WithdrawalRequest, LedgerError> {
    let status: String = row.try_get("status")?;
    Ok(WithdrawalRequest {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        wallet_id: row.try_get("wallet_id")?,
        amount: get_decimal(row, "amount")?,
        fee: get_decimal(row, "fee")?,
        fiat_amount: get_decimal(row, "fiat_amount")?,
        fiat_currency: row.try_get("fiat_currency")?,
        payout_reference: row.try_get("payout_reference")?,
        status: status.parse().map_err(LedgerError::CorruptRow)?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

//! Wallet repository
//!
//! Provisioning lives outside the ledger; `create` and `deactivate` are here
//! for the account service and for test fixtures. The engine itself only reads.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::models::{NewWallet, Wallet, WalletKind};
use crate::error::LedgerError;

pub struct WalletRepository;

impl WalletRepository {
    /// Insert a new wallet and return it
    pub async fn create(
        conn: &mut SqliteConnection,
        wallet: &NewWallet,
        now: DateTime<Utc>,
    ) -> Result<Wallet, LedgerError> {
        if wallet.address.trim().is_empty() {
            return Err(LedgerError::validation("wallet address must not be empty"));
        }

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO wallets (user_id, address, encrypted_signer, kind, label, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, 1, ?) RETURNING id"#,
        )
        .bind(wallet.user_id)
        .bind(&wallet.address)
        .bind(&wallet.encrypted_signer)
        .bind(wallet.kind.as_str())
        .bind(&wallet.label)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(wallet_id = id, user_id = wallet.user_id, kind = %wallet.kind, "Wallet provisioned");

        Self::get(conn, id)
            .await?
            .ok_or_else(|| LedgerError::WalletNotFound(id.to_string()))
    }

    /// Get wallet by ID
    pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<Wallet>, LedgerError> {
        let row = sqlx::query(
            r#"SELECT id, user_id, address, encrypted_signer, kind, label, is_active, created_at
               FROM wallets WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(row_to_wallet).transpose()
    }

    /// Get wallet by public address
    pub async fn get_by_address(
        conn: &mut SqliteConnection,
        address: &str,
    ) -> Result<Option<Wallet>, LedgerError> {
        let row = sqlx::query(
            r#"SELECT id, user_id, address, encrypted_signer, kind, label, is_active, created_at
               FROM wallets WHERE address = ?"#,
        )
        .bind(address)
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(row_to_wallet).transpose()
    }

    /// All wallets of a user, oldest first
    pub async fn list_for_user(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Vec<Wallet>, LedgerError> {
        let rows = sqlx::query(
            r#"SELECT id, user_id, address, encrypted_signer, kind, label, is_active, created_at
               FROM wallets WHERE user_id = ? ORDER BY id ASC"#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_wallet).collect()
    }

    /// Deactivate a wallet. Returns false if it was already inactive or missing.
    pub async fn deactivate(conn: &mut SqliteConnection, id: i64) -> Result<bool, LedgerError> {
        let result = sqlx::query("UPDATE wallets SET is_active = 0 WHERE id = ? AND is_active = 1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() > 0 {
            tracing::info!(wallet_id = id, "Wallet deactivated");
        }
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_wallet(row: &SqliteRow) -> Result<Wallet, LedgerError> {
    let kind: String = row.try_get("kind")?;
    let kind = kind.parse::<WalletKind>().map_err(LedgerError::CorruptRow)?;

    Ok(Wallet {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        address: row.try_get("address")?,
        encrypted_signer: row.try_get("encrypted_signer")?,
        kind,
        label: row.try_get("label")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

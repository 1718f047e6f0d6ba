//! Transaction Ledger
//!
//! SQLite persistence for transaction rows. Rows are append-only; the only
//! mutable columns are `status` (forward-only CAS from PENDING),
//! `tx_signature` (first writer wins), `error_message` and `confirmed_at`.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::state::{TxKind, TxStatus};
use super::types::{NewTransaction, Transaction, TransitionDetail};
use crate::clock::Clock;
use crate::db::{decimal_to_sql, get_decimal};
use crate::error::LedgerError;
use crate::lifecycle::Lifecycle;

const SELECT_COLUMNS: &str = r#"
    SELECT id, from_wallet_id, to_wallet_id, to_address, amount, currency, fee,
           tx_signature, kind, status, error_message, created_at, confirmed_at
    FROM transactions
"#;

pub struct TransactionLedger {
    currency: String,
    clock: Arc<dyn Clock>,
}

impl TransactionLedger {
    pub fn new(currency: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            currency: currency.into(),
            clock,
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Insert a PENDING row and return it.
    ///
    /// The id comes straight from `RETURNING`, so the row is resolved without
    /// a natural-key lookup even if other rows share wallet, amount and kind.
    pub async fn create(
        &self,
        conn: &mut SqliteConnection,
        new: &NewTransaction,
    ) -> Result<Transaction, LedgerError> {
        new.validate()?;
        let now = self.clock.now();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO transactions
                (from_wallet_id, to_wallet_id, to_address, amount, currency, fee,
                 tx_signature, kind, status, created_at)
            VALUES
                (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(new.from_wallet_id)
        .bind(new.to_wallet_id)
        .bind(&new.to_address)
        .bind(decimal_to_sql(new.amount))
        .bind(&self.currency)
        .bind(decimal_to_sql(new.fee))
        .bind(&new.settlement_ref)
        .bind(new.kind.as_str())
        .bind(TxStatus::Pending.as_str())
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        info!(
            tx_id = id,
            from_wallet_id = new.from_wallet_id,
            amount = %new.amount,
            fee = %new.fee,
            kind = %new.kind,
            "Transaction recorded as pending"
        );

        self.get(conn, id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    /// Move a PENDING row to a terminal status.
    ///
    /// Terminal rows are never rewritten: any second transition is rejected
    /// with `InvalidStateTransition`, even to the same status.
    pub async fn transition(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        new_status: TxStatus,
        detail: TransitionDetail,
    ) -> Result<Transaction, LedgerError> {
        let current = self
            .get(conn, id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))?;

        if !current.status.can_transition_to(new_status) {
            warn!(
                tx_id = id,
                from = %current.status,
                to = %new_status,
                "Rejected transaction status transition"
            );
            return Err(LedgerError::InvalidStateTransition {
                from: current.status.to_string(),
                to: new_status.to_string(),
            });
        }

        let confirmed_at = (new_status == TxStatus::Confirmed).then(|| self.clock.now());

        // CAS on the status column, settlement reference only fills a NULL
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = ?,
                tx_signature = COALESCE(tx_signature, ?),
                error_message = COALESCE(?, error_message),
                confirmed_at = COALESCE(?, confirmed_at)
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(new_status.as_str())
        .bind(&detail.settlement_ref)
        .bind(&detail.error)
        .bind(confirmed_at)
        .bind(id)
        .bind(current.status.as_str())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let now = self
                .get(conn, id)
                .await?
                .ok_or(LedgerError::TransactionNotFound(id))?;
            return Err(LedgerError::InvalidStateTransition {
                from: now.status.to_string(),
                to: new_status.to_string(),
            });
        }

        info!(
            tx_id = id,
            from = %current.status,
            to = %new_status,
            settlement_ref = detail.settlement_ref.as_deref().unwrap_or("-"),
            "Transaction status updated"
        );

        self.get(conn, id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    /// Store a settlement reference on a row that has none yet.
    ///
    /// Returns false when the row already carries a reference.
    pub async fn attach_reference(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        reference: &str,
    ) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "UPDATE transactions SET tx_signature = ? WHERE id = ? AND tx_signature IS NULL",
        )
        .bind(reference)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        debug!(tx_id = id, reference, attached = result.rows_affected() > 0, "Attach settlement reference");
        Ok(result.rows_affected() > 0)
    }

    /// Get a transaction by id
    pub async fn get(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<Transaction>, LedgerError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        row.as_ref().map(row_to_transaction).transpose()
    }

    /// Rows where the wallet is source or destination, newest first
    pub async fn list_for_wallet(
        &self,
        conn: &mut SqliteConnection,
        wallet_id: i64,
        limit: u32,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let rows = sqlx::query(&format!(
            "{} WHERE from_wallet_id = ? OR to_wallet_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(wallet_id)
        .bind(wallet_id)
        .bind(i64::from(limit))
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// PENDING rows created before `older_than`, oldest first
    pub async fn find_stale_pending(
        &self,
        conn: &mut SqliteConnection,
        older_than: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let rows = sqlx::query(&format!(
            "{} WHERE status = ? AND created_at < ? ORDER BY created_at ASC, id ASC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(TxStatus::Pending.as_str())
        .bind(older_than)
        .bind(i64::from(limit))
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }
}

fn row_to_transaction(row: &SqliteRow) -> Result<Transaction, LedgerError> {
    let kind: String = row.try_get("kind")?;
    let kind = kind.parse::<TxKind>().map_err(LedgerError::CorruptRow)?;

    let status: String = row.try_get("status")?;
    let status = status.parse::<TxStatus>().map_err(LedgerError::CorruptRow)?;

    Ok(Transaction {
        id: row.try_get("id")?,
        from_wallet_id: row.try_get("from_wallet_id")?,
        to_wallet_id: row.try_get("to_wallet_id")?,
        to_address: row.try_get("to_address")?,
        amount: get_decimal(row, "amount")?,
        currency: row.try_get("currency")?,
        fee: get_decimal(row, "fee")?,
        tx_signature: row.try_get("tx_signature")?,
        kind,
        status,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        confirmed_at: row.try_get("confirmed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::Database;
    use crate::ledger::types::Destination;
    use crate::wallet::{NewWallet, WalletKind, WalletRepository};
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    struct Fixture {
        db: Database,
        clock: Arc<ManualClock>,
        ledger: TransactionLedger,
        alice: i64,
        bob: i64,
        carol: i64,
    }

    async fn fixture() -> Fixture {
        let db = Database::in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap(),
        ));
        let ledger = TransactionLedger::new("USDC", clock.clone());

        let mut conn = db.pool().acquire().await.unwrap();
        let mut ids = Vec::new();
        for (user, address) in [(1, "AliceAddr"), (2, "BobAddr"), (3, "CarolAddr")] {
            let wallet = WalletRepository::create(
                &mut conn,
                &NewWallet {
                    user_id: user,
                    address: address.to_string(),
                    encrypted_signer: format!("enc:{}", address),
                    kind: WalletKind::Human,
                    label: None,
                },
                clock.now(),
            )
            .await
            .unwrap();
            ids.push(wallet.id);
        }
        drop(conn);

        Fixture {
            db,
            clock,
            ledger,
            alice: ids[0],
            bob: ids[1],
            carol: ids[2],
        }
    }

    fn transfer(from: i64, to: i64, amount: i64) -> NewTransaction {
        NewTransaction::new(from, Decimal::from(amount), TxKind::Transfer).to(Destination::Wallet(to))
    }

    #[tokio::test]
    async fn test_create_then_confirm_roundtrip() {
        let f = fixture().await;
        let mut conn = f.db.pool().acquire().await.unwrap();

        let new = transfer(f.alice, f.bob, 50).with_fee(Decimal::new(5, 1));
        let created = f.ledger.create(&mut conn, &new).await.unwrap();
        assert_eq!(created.status, TxStatus::Pending);
        assert_eq!(created.currency, "USDC");
        assert!(created.confirmed_at.is_none());

        let confirmed = f
            .ledger
            .transition(
                &mut conn,
                created.id,
                TxStatus::Confirmed,
                TransitionDetail::settled("sig123"),
            )
            .await
            .unwrap();

        assert_eq!(confirmed.status, TxStatus::Confirmed);
        assert_eq!(confirmed.tx_signature.as_deref(), Some("sig123"));
        assert!(confirmed.confirmed_at.is_some());
        assert_eq!(confirmed.amount, Decimal::from(50));
        assert_eq!(confirmed.fee, Decimal::new(5, 1));
        assert_eq!(confirmed.total_debit(), Decimal::new(505, 1));
    }

    #[tokio::test]
    async fn test_known_reference_still_starts_pending() {
        let f = fixture().await;
        let mut conn = f.db.pool().acquire().await.unwrap();

        let new = transfer(f.alice, f.bob, 10).with_settlement_ref("early");
        let created = f.ledger.create(&mut conn, &new).await.unwrap();
        assert_eq!(created.status, TxStatus::Pending);
        assert_eq!(created.tx_signature.as_deref(), Some("early"));

        // first writer wins
        let confirmed = f
            .ledger
            .transition(
                &mut conn,
                created.id,
                TxStatus::Confirmed,
                TransitionDetail::settled("late"),
            )
            .await
            .unwrap();
        assert_eq!(confirmed.tx_signature.as_deref(), Some("early"));
    }

    #[tokio::test]
    async fn test_terminal_status_is_immutable() {
        let f = fixture().await;
        let mut conn = f.db.pool().acquire().await.unwrap();

        let created = f.ledger.create(&mut conn, &transfer(f.alice, f.bob, 5)).await.unwrap();
        let failed = f
            .ledger
            .transition(
                &mut conn,
                created.id,
                TxStatus::Failed,
                TransitionDetail::failed("rpc timeout"),
            )
            .await
            .unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("rpc timeout"));

        for target in [TxStatus::Confirmed, TxStatus::Failed, TxStatus::Pending] {
            let result = f
                .ledger
                .transition(&mut conn, created.id, target, TransitionDetail::settled("sig"))
                .await;
            assert!(matches!(
                result,
                Err(LedgerError::InvalidStateTransition { .. })
            ));
        }

        let after = f.ledger.get(&mut conn, created.id).await.unwrap().unwrap();
        assert_eq!(after, failed);
    }

    #[tokio::test]
    async fn test_transition_unknown_id() {
        let f = fixture().await;
        let mut conn = f.db.pool().acquire().await.unwrap();
        let result = f
            .ledger
            .transition(&mut conn, 42, TxStatus::Confirmed, TransitionDetail::default())
            .await;
        assert!(matches!(result, Err(LedgerError::TransactionNotFound(42))));
    }

    #[tokio::test]
    async fn test_identical_rows_get_distinct_ids() {
        let f = fixture().await;
        let mut conn = f.db.pool().acquire().await.unwrap();

        let a = f.ledger.create(&mut conn, &transfer(f.alice, f.bob, 7)).await.unwrap();
        let b = f.ledger.create(&mut conn, &transfer(f.alice, f.bob, 7)).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_list_for_wallet_newest_first() {
        let f = fixture().await;
        let mut conn = f.db.pool().acquire().await.unwrap();

        let first = f.ledger.create(&mut conn, &transfer(f.alice, f.bob, 1)).await.unwrap();
        f.clock.advance(Duration::seconds(1));
        let second = f.ledger.create(&mut conn, &transfer(f.bob, f.alice, 2)).await.unwrap();
        f.clock.advance(Duration::seconds(1));
        let external = NewTransaction::new(f.alice, Decimal::from(3), TxKind::Transfer)
            .to(Destination::External("ExtAddr".into()));
        let third = f.ledger.create(&mut conn, &external).await.unwrap();
        f.clock.advance(Duration::seconds(1));
        // unrelated to alice
        f.ledger.create(&mut conn, &transfer(f.bob, f.carol, 4)).await.unwrap();

        let history = f.ledger.list_for_wallet(&mut conn, f.alice, 10).await.unwrap();
        let ids: Vec<i64> = history.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let capped = f.ledger.list_for_wallet(&mut conn, f.alice, 2).await.unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].id, third.id);
    }

    #[tokio::test]
    async fn test_find_stale_pending() {
        let f = fixture().await;
        let mut conn = f.db.pool().acquire().await.unwrap();

        let old = f.ledger.create(&mut conn, &transfer(f.alice, f.bob, 1)).await.unwrap();
        let settled = f.ledger.create(&mut conn, &transfer(f.alice, f.bob, 2)).await.unwrap();
        f.ledger
            .transition(&mut conn, settled.id, TxStatus::Confirmed, TransitionDetail::settled("s"))
            .await
            .unwrap();
        f.clock.advance(Duration::minutes(10));
        f.ledger.create(&mut conn, &transfer(f.alice, f.bob, 3)).await.unwrap();

        let cutoff = f.clock.now() - Duration::minutes(5);
        let stale = f.ledger.find_stale_pending(&mut conn, cutoff, 10).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old.id);
    }

    #[tokio::test]
    async fn test_attach_reference_first_writer_wins() {
        let f = fixture().await;
        let mut conn = f.db.pool().acquire().await.unwrap();

        let tx = f.ledger.create(&mut conn, &transfer(f.alice, f.bob, 1)).await.unwrap();
        assert!(f.ledger.attach_reference(&mut conn, tx.id, "first").await.unwrap());
        assert!(!f.ledger.attach_reference(&mut conn, tx.id, "second").await.unwrap());

        let row = f.ledger.get(&mut conn, tx.id).await.unwrap().unwrap();
        assert_eq!(row.tx_signature.as_deref(), Some("first"));
        assert_eq!(row.status, TxStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_rows() {
        let f = fixture().await;
        let mut conn = f.db.pool().acquire().await.unwrap();

        let invalid = NewTransaction::new(f.alice, Decimal::from(-3), TxKind::Transfer)
            .to(Destination::Wallet(f.bob));
        assert!(matches!(
            f.ledger.create(&mut conn, &invalid).await,
            Err(LedgerError::Validation(_))
        ));

        let history = f.ledger.list_for_wallet(&mut conn, f.alice, 10).await.unwrap();
        assert!(history.is_empty());
    }
}

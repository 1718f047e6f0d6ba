//! Ledger schema
//!
//! Applied on every open with `IF NOT EXISTS`, so it doubles as the migration
//! for a fresh file. Monetary columns are TEXT holding canonical decimals.

pub const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS wallets (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id           INTEGER NOT NULL,
        address           TEXT    NOT NULL UNIQUE,
        encrypted_signer  TEXT    NOT NULL,
        kind              TEXT    NOT NULL CHECK (kind IN ('human', 'agent')),
        label             TEXT,
        is_active         INTEGER NOT NULL DEFAULT 1,
        created_at        TEXT    NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_wallets_user ON wallets (user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        from_wallet_id    INTEGER NOT NULL REFERENCES wallets (id),
        to_wallet_id      INTEGER REFERENCES wallets (id),
        to_address        TEXT,
        amount            TEXT    NOT NULL,
        currency          TEXT    NOT NULL,
        fee               TEXT    NOT NULL DEFAULT '0',
        tx_signature      TEXT,
        kind              TEXT    NOT NULL CHECK (kind IN ('transfer', 'withdrawal', 'deposit', 'fee')),
        status            TEXT    NOT NULL CHECK (status IN ('pending', 'confirmed', 'failed')),
        error_message     TEXT,
        created_at        TEXT    NOT NULL,
        confirmed_at      TEXT,
        CHECK (to_wallet_id IS NULL OR to_address IS NULL)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_from ON transactions (from_wallet_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_to ON transactions (to_wallet_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions (status, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS spending_limits (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        wallet_id         INTEGER NOT NULL UNIQUE REFERENCES wallets (id),
        daily_limit       TEXT    NOT NULL,
        used_today        TEXT    NOT NULL DEFAULT '0',
        reset_date        TEXT    NOT NULL,
        created_at        TEXT    NOT NULL,
        updated_at        TEXT    NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS withdrawal_requests (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id           INTEGER NOT NULL,
        wallet_id         INTEGER NOT NULL REFERENCES wallets (id),
        amount            TEXT    NOT NULL,
        fee               TEXT    NOT NULL,
        fiat_amount       TEXT    NOT NULL,
        fiat_currency     TEXT    NOT NULL,
        payout_reference  TEXT,
        status            TEXT    NOT NULL CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
        error_message     TEXT,
        created_at        TEXT    NOT NULL,
        updated_at        TEXT    NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_withdrawals_user ON withdrawal_requests (user_id, created_at)",
];

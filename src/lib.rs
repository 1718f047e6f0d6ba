//! Custody Ledger - Ledger & Spending-Limit Engine
//!
//! Records value movements between custodial wallets, enforces a per-wallet
//! daily spending cap and keeps the two consistent with an external
//! settlement network that can fail independently.
//!
//! # Modules
//!
//! - [`spending_limit`] - Daily cap per wallet with lazy day rollover
//! - [`ledger`] - Transaction rows and their forward-only status
//! - [`transfer`] - Orchestrator: limit → balance → pending → settle → confirm
//! - [`withdrawal`] - Fiat off-ramp request lifecycle
//! - [`wallet`] - Wallet directory (read-mostly)
//! - [`settlement`] - Settlement network collaborator trait and mock
//! - [`db`] - SQLite store and schema bootstrap
//! - [`clock`] - Injectable time source and reference calendar

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod fee;
pub mod ledger;
pub mod lifecycle;
pub mod logging;
pub mod settlement;
pub mod spending_limit;
pub mod transfer;
pub mod wallet;
pub mod withdrawal;

// Convenient re-exports at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use db::Database;
pub use error::LedgerError;
pub use ledger::{Transaction, TransactionLedger, TxKind, TxStatus};
pub use settlement::{SettlementClient, SettlementError, SettlementStatus};
pub use spending_limit::{LimitCheck, SpendingLimit, SpendingLimitTracker};
pub use transfer::{ReconciliationWorker, TransferCoordinator, TransferOutcome};
pub use withdrawal::{WithdrawalOutcome, WithdrawalService, WithdrawalStatus};

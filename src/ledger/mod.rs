//! Transaction Ledger
//!
//! Append-mostly record of value movements and their settlement status.
//!
//! # State Machine
//!
//! ```text
//! PENDING → CONFIRMED
//!    ↓
//!  FAILED
//! ```
//!
//! # Invariants
//!
//! 1. **Pending first**: every row is inserted PENDING, before any network call
//! 2. **Forward only**: terminal rows are never rewritten
//! 3. **Fixed amounts**: amount and fee never change after insert
//! 4. **First reference wins**: a settlement reference, once set, is kept

pub mod db;
pub mod state;
pub mod types;

pub use db::TransactionLedger;
pub use state::{TxKind, TxStatus};
pub use types::{Destination, NewTransaction, Transaction, TransitionDetail};

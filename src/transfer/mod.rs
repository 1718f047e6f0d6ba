//! Transfer Orchestrator
//!
//! Composes the spending-limit tracker, the transaction ledger and the
//! settlement network into one transfer operation.
//!
//! # Flow
//!
//! ```text
//! limit check → balance check → PENDING row → settlement call
//!                                                 ├─ ok:  record spend + CONFIRMED (one unit of work)
//!                                                 └─ err: FAILED (cap untouched)
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Persist-Before-Call**: the PENDING row exists before the network is hit
//! 2. **No Resubmit**: a failed local commit is retried locally, never sent again
//! 3. **Failed Costs Nothing**: a failed settlement never consumes quota

pub mod coordinator;
pub mod types;
pub mod worker;


pub use coordinator::TransferCoordinator;
pub use types::TransferOutcome;
pub use worker::{ReconciliationWorker, ScanReport};

//! Withdrawal Sub-ledger
//!
//! Fiat off-ramp requests with the same forward-only discipline as the
//! transaction ledger, and no spending-limit interaction.

pub mod db;
pub mod service;
pub mod state;
pub mod types;

pub use db::WithdrawalRepository;
pub use service::WithdrawalService;
pub use state::WithdrawalStatus;
pub use types::{NewWithdrawal, WithdrawalOutcome, WithdrawalRequest};

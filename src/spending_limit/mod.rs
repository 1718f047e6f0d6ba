//! Daily spending caps per wallet

pub mod models;
pub mod tracker;

pub use models::{LimitCheck, SpendingLimit};
pub use tracker::SpendingLimitTracker;

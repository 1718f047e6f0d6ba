//! Wallet directory
//!
//! Read access to custodial wallets for the ledger engine.

pub mod models;
pub mod repository;

pub use models::{NewWallet, SignerHandle, Wallet, WalletKind};
pub use repository::WalletRepository;

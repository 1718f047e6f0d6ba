//! Wallet data models

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Who operates the wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    Human,
    Agent,
}

impl WalletKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletKind::Human => "human",
            WalletKind::Agent => "agent",
        }
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WalletKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(WalletKind::Human),
            "agent" => Ok(WalletKind::Agent),
            _ => Err(format!("Invalid wallet kind: {}", s)),
        }
    }
}

/// Custodial wallet
///
/// `encrypted_signer` is an opaque blob owned by key management; the ledger
/// only forwards it to the settlement client as a [`SignerHandle`].
#[derive(Debug, Clone)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub address: String,
    pub encrypted_signer: String,
    pub kind: WalletKind,
    pub label: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn signer(&self) -> SignerHandle {
        SignerHandle(self.encrypted_signer.clone())
    }
}

/// Opaque reference to signing material
#[derive(Clone, PartialEq, Eq)]
pub struct SignerHandle(String);

impl SignerHandle {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Raw reference, for the settlement client only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SignerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignerHandle(***)")
    }
}

/// Input for wallet provisioning
#[derive(Debug, Clone)]
pub struct NewWallet {
    pub user_id: i64,
    pub address: String,
    pub encrypted_signer: String,
    pub kind: WalletKind,
    pub label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_kind_roundtrip() {
        assert_eq!("human".parse::<WalletKind>().unwrap(), WalletKind::Human);
        assert_eq!("agent".parse::<WalletKind>().unwrap(), WalletKind::Agent);
        assert!("robot".parse::<WalletKind>().is_err());
    }

    #[test]
    fn test_signer_handle_is_redacted() {
        let handle = SignerHandle::new("enc:secret");
        assert_eq!(format!("{:?}", handle), "SignerHandle(***)");
        assert_eq!(handle.expose(), "enc:secret");
    }
}

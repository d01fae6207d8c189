//! Balance Provider
//!
//! Contract for the external service that actually holds user balances, plus
//! the HTTP client implementation. The core treats every call as an
//! at-most-once side effect: completion is tracked in the transfer record,
//! never assumed from the provider.

pub mod http;

pub use http::HttpBalanceProvider;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use crate::core_types::{EconomyId, UserId};

/// Named sub-balance within a user's holdings in one economy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Wallet {
    Cash,
    Bank,
}

impl Wallet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Wallet::Cash => "cash",
            Wallet::Bank => "bank",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(Wallet::Cash),
            "bank" => Some(Wallet::Bank),
            _ => None,
        }
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure modes of the balance service
///
/// `is_transient` drives retry decisions: transient failures may be retried
/// under the caller's pacing, permanent ones never are.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// Debit only: the wallet holds less than the requested amount
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        balance: Decimal,
        requested: Decimal,
    },

    #[error("No balance for user {user} in economy {economy}")]
    NotFound { economy: EconomyId, user: UserId },

    /// The shared rate limit tripped; surfaced, never silently absorbed
    #[error("Rate limited by balance service (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// Transport failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    #[error("Permanent service error (status {status}): {detail}")]
    Permanent { status: u16, detail: String },
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. } | ProviderError::Network(_)
        )
    }
}

/// External balance service operations
///
/// Each call is a network request. None of them is assumed idempotent.
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Read one wallet's balance
    async fn get_balance(
        &self,
        economy: EconomyId,
        user: UserId,
        wallet: Wallet,
    ) -> Result<Decimal, ProviderError>;

    /// Remove `amount` from the wallet; returns the new balance
    async fn debit(
        &self,
        economy: EconomyId,
        user: UserId,
        wallet: Wallet,
        amount: Decimal,
    ) -> Result<Decimal, ProviderError>;

    /// Add `amount` to the wallet; returns the new balance
    async fn credit(
        &self,
        economy: EconomyId,
        user: UserId,
        wallet: Wallet,
        amount: Decimal,
    ) -> Result<Decimal, ProviderError>;
}


#[cfg(test)]
pub use mock::MockProvider;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_str_roundtrip() {
        assert_eq!(Wallet::from_str_opt("cash"), Some(Wallet::Cash));
        assert_eq!(Wallet::from_str_opt("bank"), Some(Wallet::Bank));
        assert!(Wallet::from_str_opt("vault").is_none());
        assert_eq!(Wallet::Cash.as_str(), "cash");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Network("timeout".into()).is_transient());
        assert!(ProviderError::RateLimited { retry_after_secs: 5 }.is_transient());

        assert!(
            !ProviderError::Permanent {
                status: 403,
                detail: "forbidden".into()
            }
            .is_transient()
        );
        assert!(
            !ProviderError::InsufficientFunds {
                balance: Decimal::ZERO,
                requested: Decimal::ONE,
            }
            .is_transient()
        );
        assert!(!ProviderError::NotFound { economy: 1, user: 2 }.is_transient());
    }
}

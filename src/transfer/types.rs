//! Transfer Types
//!
//! Request, record, and outcome types shared across the transfer module.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use super::status::TransferStatus;
use crate::core_types::{EconomyId, UserId};
use crate::provider::Wallet;
use crate::registry::Economy;

/// Unique transfer identifier.
///
/// ULIDs sort lexicographically by creation time, which keeps the
/// transfer table naturally ordered and the ids log-friendly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(Ulid);

impl TransferId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

/// A transfer as requested by the caller, before any resolution
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Source economy name (resolved against the registry)
    pub source_economy: String,
    /// Target economy name
    pub target_economy: String,
    pub user: UserId,
    pub wallet: Wallet,
    /// Amount in the source economy's currency
    pub amount: Decimal,
}

impl TransferRequest {
    pub fn new(
        source_economy: impl Into<String>,
        target_economy: impl Into<String>,
        user: UserId,
        wallet: Wallet,
        amount: Decimal,
    ) -> Self {
        Self {
            source_economy: source_economy.into(),
            target_economy: target_economy.into(),
            user,
            wallet,
            amount,
        }
    }
}

/// Persisted transfer record.
///
/// The rate pair is frozen at creation, so a later rate change never
/// alters what this transfer meant.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub transfer_id: TransferId,
    pub source_economy_id: EconomyId,
    pub target_economy_id: EconomyId,
    pub user_id: UserId,
    pub wallet: Wallet,
    /// Amount debited, in source currency
    pub source_amount: Decimal,
    /// Amount credited, in target currency
    pub target_amount: Decimal,
    pub source_rate: Decimal,
    pub target_rate: Decimal,
    pub status: TransferStatus,
    /// Failure reason for failed statuses
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransferRecord {
    /// Build a fresh PENDING record with the rate pair frozen from the
    /// resolved economies.
    pub fn new(
        source: &Economy,
        target: &Economy,
        user: UserId,
        wallet: Wallet,
        source_amount: Decimal,
        target_amount: Decimal,
    ) -> Self {
        Self {
            transfer_id: TransferId::generate(),
            source_economy_id: source.economy_id,
            target_economy_id: target.economy_id,
            user_id: user,
            wallet,
            source_amount,
            target_amount,
            source_rate: source.exchange_rate,
            target_rate: target.exchange_rate,
            status: TransferStatus::Pending,
            detail: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Terminal result of one transfer, as reported to the caller
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub transfer_id: TransferId,
    pub status: TransferStatus,
    pub source_amount: Decimal,
    pub target_amount: Decimal,
    pub detail: Option<String>,
}

impl TransferOutcome {
    pub fn from_record(record: &TransferRecord) -> Self {
        Self {
            transfer_id: record.transfer_id,
            status: record.status,
            source_amount: record.source_amount,
            target_amount: record.target_amount,
            detail: record.detail.clone(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransferStatus::Completed
    }
}

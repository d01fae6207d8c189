//! Transfer Error Types
//!
//! Errors reported to the caller of the transfer module. Provider failures
//! during an in-flight transfer are not errors at this level; they end up in
//! the transfer record's status and detail instead.

use thiserror::Error;

use crate::money::MoneyError;
use crate::registry::RegistryError;

/// Transfer error types
///
/// Error codes give presentation collaborators a stable key per failure.
#[derive(Error, Debug, Clone)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Source and target economy cannot be the same")]
    SameEconomy,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Economy '{0}' not found")]
    EconomyNotFound(String),

    #[error("Economy '{name}' is not approved (status: {status})")]
    NotEligible { name: String, status: String },

    // === Lookup Errors ===
    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    // === System Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal system error: {0}")]
    Internal(String),
}

impl TransferError {
    /// Stable error code for presentation-layer responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::SameEconomy => "SAME_ECONOMY",
            TransferError::InvalidAmount(_) => "INVALID_AMOUNT",
            TransferError::EconomyNotFound(_) => "ECONOMY_NOT_FOUND",
            TransferError::NotEligible { .. } => "NOT_ELIGIBLE",
            TransferError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            TransferError::DatabaseError(_) => "DATABASE_ERROR",
            TransferError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<sqlx::Error> for TransferError {
    fn from(e: sqlx::Error) -> Self {
        TransferError::DatabaseError(e.to_string())
    }
}

impl From<MoneyError> for TransferError {
    fn from(e: MoneyError) -> Self {
        TransferError::InvalidAmount(e.to_string())
    }
}

impl From<RegistryError> for TransferError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(name) => TransferError::EconomyNotFound(name),
            RegistryError::NotEligible { name, status } => TransferError::NotEligible {
                name,
                status: status.to_string(),
            },
            RegistryError::Database(e) => TransferError::DatabaseError(e.to_string()),
            RegistryError::Money(e) => TransferError::InvalidAmount(e.to_string()),
            other => TransferError::Internal(other.to_string()),
        }
    }
}

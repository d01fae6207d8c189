//! Clearinghouse - Cross-Economy Transfer Engine
//!
//! Moves user balances between independent server economies through one
//! shared external balance service, converting amounts through per-economy
//! exchange rates.
//!
//! # Modules
//!
//! - [`core_types`] - Core type aliases (EconomyId, UserId, OfficerId)
//! - [`money`] - Exact decimal arithmetic and rate conversion
//! - [`registry`] - Economy records, approval lifecycle, officer roster
//! - [`provider`] - External balance service contract and HTTP client
//! - [`serializer`] - Per-resource exclusive locks and API pacing
//! - [`transfer`] - Transfer coordinator (debit, credit, rollback)
//! - [`ledger`] - Durable transfer records and the audit log
//! - [`config`] - YAML configuration per environment
//! - [`db`] - SQLite pool and schema
//! - [`logging`] - tracing setup with file rotation

// Core types - must be first!
pub mod core_types;

// Infrastructure
pub mod config;
pub mod db;
pub mod logging;

// Domain components
pub mod ledger;
pub mod money;
pub mod provider;
pub mod registry;
pub mod serializer;
pub mod transfer;

// Convenient re-exports at crate root
pub use core_types::{EconomyId, OfficerId, UserId};
pub use ledger::{AuditAction, AuditEntry, AuditLog, LedgerFilter, RetentionSweeper, TransactionLedger};
pub use provider::{BalanceProvider, HttpBalanceProvider, ProviderError, Wallet};
pub use registry::{Economy, EconomyStatus, EconomyStore, OfficerStore, RegistryError};
pub use serializer::{ResourceKey, ResourceSerializer};
pub use transfer::{
    TransferCoordinator, TransferError, TransferId, TransferOutcome, TransferRecord,
    TransferRequest, TransferStatus,
};

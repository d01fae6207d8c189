//! Transaction ledger and audit trail
//!
//! Two append-oriented stores share this module: the transfer ledger, whose
//! rows move PENDING to exactly one terminal status, and the audit log,
//! which records administrative actions and is exempt from retention.

pub mod audit;
pub mod store;
pub mod sweeper;

pub use audit::{AuditAction, AuditEntry, AuditLog, SYSTEM_ACTOR, export_line};
pub use store::{LedgerFilter, TransactionLedger};
pub use sweeper::{RetentionSweeper, SweeperConfig};

//! Cross-Economy Transfer Engine
//!
//! Moves value between two approved economies through the external balance
//! service, converting at the frozen rate pair and rolling back on partial
//! failure.
//!
//! # Lifecycle
//!
//! ```text
//! PENDING ──▶ COMPLETED
//!        ├──▶ FAILED_VALIDATION
//!        ├──▶ FAILED_ROLLED_BACK
//!        └──▶ FAILED_INCONSISTENT
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Record-Before-Call**: the PENDING row is durable before the first
//!    provider call
//! 2. **Guarded Finalize**: terminal statuses are set with a compare-and-set
//!    on PENDING and never overwritten
//! 3. **Serialized Balances**: provider mutations run under the resource
//!    serializer's per-key exclusivity
//! 4. **Bounded Refund**: a failed credit triggers at most three refund
//!    attempts before escalating to FAILED_INCONSISTENT

pub mod coordinator;
pub mod error;
pub mod status;
pub mod types;

#[cfg(test)]
mod integration_tests;

// Re-exports for convenience
pub use coordinator::TransferCoordinator;
pub use error::TransferError;
pub use status::TransferStatus;
pub use types::{TransferId, TransferOutcome, TransferRecord, TransferRequest};

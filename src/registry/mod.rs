//! Economy Registry
//!
//! Authoritative store of economy records, their approval lifecycle, and the
//! officer roster that decides it.
//!
//! # State Machine
//!
//! ```text
//! PENDING → APPROVED → WITHDRAWN
//!    ↓          ↓
//! REJECTED   KICKED
//! ```
//!
//! REJECTED, WITHDRAWN and KICKED are terminal; a server holding a terminal
//! record may file a fresh application, which supersedes the old row. Only
//! APPROVED economies participate as transfer endpoints.

pub mod models;
pub mod officers;
pub mod store;

// Re-exports for convenience
pub use models::{Economy, EconomyStatus, Officer, StatusFilter};
pub use officers::{OfficerError, OfficerStore};
pub use store::{EconomyStore, RegistryError};

//! Transfer Status
//!
//! Lifecycle of one cross-economy transfer. The flow is straight-line:
//! a transfer starts PENDING and ends in exactly one terminal status.
//!
//! ```text
//! PENDING ──▶ COMPLETED              debit and credit both applied
//!        ├──▶ FAILED_VALIDATION      rejected before any funds moved
//!        ├──▶ FAILED_ROLLED_BACK     net balance change is zero
//!        └──▶ FAILED_INCONSISTENT    debit applied, refund failed; manual reconciliation
//! ```

use std::fmt;

/// Transfer lifecycle status, stored as lowercase TEXT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStatus {
    /// Record created, external calls not yet finished
    Pending,
    /// Source debited and target credited
    Completed,
    /// Rejected before any balance changed
    FailedValidation,
    /// Failed after debit; compensating refund restored the source
    FailedRolledBack,
    /// Debit applied but the refund failed; funds are in limbo
    FailedInconsistent,
}

impl TransferStatus {
    /// True once the transfer can never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }

    /// True for any failed terminal status
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TransferStatus::FailedValidation
                | TransferStatus::FailedRolledBack
                | TransferStatus::FailedInconsistent
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Completed => "completed",
            TransferStatus::FailedValidation => "failed_validation",
            TransferStatus::FailedRolledBack => "failed_rolled_back",
            TransferStatus::FailedInconsistent => "failed_inconsistent",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransferStatus::Pending),
            "completed" => Some(TransferStatus::Completed),
            "failed_validation" => Some(TransferStatus::FailedValidation),
            "failed_rolled_back" => Some(TransferStatus::FailedRolledBack),
            "failed_inconsistent" => Some(TransferStatus::FailedInconsistent),
            _ => None,
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

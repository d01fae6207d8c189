//! Economy records and the approval state machine.
//!
//! Statuses are stored as lowercase TEXT; the transition table is closed and
//! anything not listed in it is rejected.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

use crate::core_types::{EconomyId, OfficerId};

/// Economy lifecycle states
///
/// Terminal states: REJECTED, WITHDRAWN, KICKED. A terminal record stays on
/// file but no longer blocks the name or the server from re-applying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EconomyStatus {
    /// Initial state - application filed, awaiting an officer decision
    Pending,

    /// Officer accepted the application - eligible as a transfer endpoint
    Approved,

    /// Terminal: officer declined the application
    Rejected,

    /// Terminal: the economy's own administrator pulled out
    Withdrawn,

    /// Terminal: an officer removed the economy
    Kicked,
}

impl EconomyStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EconomyStatus::Rejected | EconomyStatus::Withdrawn | EconomyStatus::Kicked
        )
    }

    /// The closed transition table. Everything not listed here is illegal.
    pub fn can_transition(&self, next: EconomyStatus) -> bool {
        matches!(
            (self, next),
            (EconomyStatus::Pending, EconomyStatus::Approved)
                | (EconomyStatus::Pending, EconomyStatus::Rejected)
                | (EconomyStatus::Approved, EconomyStatus::Withdrawn)
                | (EconomyStatus::Approved, EconomyStatus::Kicked)
        )
    }

    /// Storage form (lowercase TEXT)
    pub fn as_str(&self) -> &'static str {
        match self {
            EconomyStatus::Pending => "pending",
            EconomyStatus::Approved => "approved",
            EconomyStatus::Rejected => "rejected",
            EconomyStatus::Withdrawn => "withdrawn",
            EconomyStatus::Kicked => "kicked",
        }
    }

    /// Convert from the storage form
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EconomyStatus::Pending),
            "approved" => Some(EconomyStatus::Approved),
            "rejected" => Some(EconomyStatus::Rejected),
            "withdrawn" => Some(EconomyStatus::Withdrawn),
            "kicked" => Some(EconomyStatus::Kicked),
            _ => None,
        }
    }
}

impl fmt::Display for EconomyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Listing filter for economy queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Pending,
    Approved,
    All,
}

/// A registered economy
#[derive(Debug, Clone, PartialEq)]
pub struct Economy {
    pub economy_id: EconomyId,
    /// Display name, unique case-insensitively among live records
    pub name: String,
    pub currency_name: String,
    pub currency_symbol: String,
    /// Rate against the common reference unit, frozen into each transfer
    pub exchange_rate: Decimal,
    pub status: EconomyStatus,
    pub applied_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub officer_id: Option<OfficerId>,
    pub note: Option<String>,
}

impl Economy {
    /// Fresh application in PENDING
    pub fn new_application(
        economy_id: EconomyId,
        name: &str,
        currency_name: &str,
        currency_symbol: &str,
        exchange_rate: Decimal,
    ) -> Self {
        Self {
            economy_id,
            name: name.to_string(),
            currency_name: currency_name.to_string(),
            currency_symbol: currency_symbol.to_string(),
            exchange_rate,
            status: EconomyStatus::Pending,
            applied_at: Utc::now(),
            decided_at: None,
            officer_id: None,
            note: None,
        }
    }
}

/// Roster entry for a decision-making officer
#[derive(Debug, Clone, PartialEq)]
pub struct Officer {
    pub user_id: OfficerId,
    pub granted_by: OfficerId,
    pub granted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [EconomyStatus; 5] = [
        EconomyStatus::Pending,
        EconomyStatus::Approved,
        EconomyStatus::Rejected,
        EconomyStatus::Withdrawn,
        EconomyStatus::Kicked,
    ];

    #[test]
    fn test_terminal_states() {
        assert!(EconomyStatus::Rejected.is_terminal());
        assert!(EconomyStatus::Withdrawn.is_terminal());
        assert!(EconomyStatus::Kicked.is_terminal());

        assert!(!EconomyStatus::Pending.is_terminal());
        assert!(!EconomyStatus::Approved.is_terminal());
    }

    #[test]
    fn test_transition_table_is_closed() {
        let allowed = [
            (EconomyStatus::Pending, EconomyStatus::Approved),
            (EconomyStatus::Pending, EconomyStatus::Rejected),
            (EconomyStatus::Approved, EconomyStatus::Withdrawn),
            (EconomyStatus::Approved, EconomyStatus::Kicked),
        ];

        for from in ALL {
            for to in ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition(to),
                    expected,
                    "transition {} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_no_exit_from_terminal() {
        for from in [
            EconomyStatus::Rejected,
            EconomyStatus::Withdrawn,
            EconomyStatus::Kicked,
        ] {
            for to in ALL {
                assert!(!from.can_transition(to));
            }
        }
    }

    #[test]
    fn test_status_str_roundtrip() {
        for status in ALL {
            let recovered = EconomyStatus::from_str_opt(status.as_str()).unwrap();
            assert_eq!(status, recovered);
        }
        assert!(EconomyStatus::from_str_opt("unknown").is_none());
        assert!(EconomyStatus::from_str_opt("APPROVED").is_none());
    }

    #[test]
    fn test_new_application_defaults() {
        let economy = Economy::new_application(42, "Northlands", "Krona", "kr", Decimal::from(50));
        assert_eq!(economy.status, EconomyStatus::Pending);
        assert!(economy.decided_at.is_none());
        assert!(economy.officer_id.is_none());
        assert!(economy.note.is_none());
    }
}

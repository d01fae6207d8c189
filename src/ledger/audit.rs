//! Audit Log
//!
//! Append-only record of administrative actions and transfer outcomes.
//! Entries are never mutated, and never deleted - retention cleanup applies
//! only to transfer rows.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};
use std::fmt;

use crate::core_types::UserId;

/// Actor id for actions the service performs on its own behalf
pub const SYSTEM_ACTOR: UserId = 0;

/// Everything that lands in the audit log, as a closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    EconomyApplied,
    EconomyApproved,
    EconomyRejected,
    EconomyWithdrawn,
    EconomyKicked,
    OfficerAdded,
    OfficerRemoved,
    RateChanged,
    Transfer,
    /// High severity: a refund could not be completed, manual reconciliation
    TransferInconsistent,
    CleanupTransfers,
}

impl AuditAction {
    /// Storage form (lowercase TEXT)
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::EconomyApplied => "economy_applied",
            AuditAction::EconomyApproved => "economy_approved",
            AuditAction::EconomyRejected => "economy_rejected",
            AuditAction::EconomyWithdrawn => "economy_withdrawn",
            AuditAction::EconomyKicked => "economy_kicked",
            AuditAction::OfficerAdded => "officer_added",
            AuditAction::OfficerRemoved => "officer_removed",
            AuditAction::RateChanged => "rate_changed",
            AuditAction::Transfer => "transfer",
            AuditAction::TransferInconsistent => "transfer_inconsistent",
            AuditAction::CleanupTransfers => "cleanup_transfers",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "economy_applied" => Some(AuditAction::EconomyApplied),
            "economy_approved" => Some(AuditAction::EconomyApproved),
            "economy_rejected" => Some(AuditAction::EconomyRejected),
            "economy_withdrawn" => Some(AuditAction::EconomyWithdrawn),
            "economy_kicked" => Some(AuditAction::EconomyKicked),
            "officer_added" => Some(AuditAction::OfficerAdded),
            "officer_removed" => Some(AuditAction::OfficerRemoved),
            "rate_changed" => Some(AuditAction::RateChanged),
            "transfer" => Some(AuditAction::Transfer),
            "transfer_inconsistent" => Some(AuditAction::TransferInconsistent),
            "cleanup_transfers" => Some(AuditAction::CleanupTransfers),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audit row
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    /// Database rowid, None until appended
    pub id: Option<i64>,
    pub actor_id: UserId,
    pub action: AuditAction,
    /// What the action touched: an economy id, a user id, a transfer id
    pub target: String,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor_id: UserId,
        action: AuditAction,
        target: impl Into<String>,
        detail: Option<String>,
    ) -> Self {
        Self {
            id: None,
            actor_id,
            action,
            target: target.into(),
            detail,
            created_at: Utc::now(),
        }
    }
}

/// Max characters of detail carried into an export line
const EXPORT_PREVIEW_CHARS: usize = 100;

/// Render one entry as the line-oriented export format consumed by the
/// logging collaborator: UTC timestamp at microsecond precision, actor,
/// action, target, and a bounded detail preview.
pub fn export_line(entry: &AuditEntry) -> String {
    let ts = entry.created_at.to_rfc3339_opts(SecondsFormat::Micros, true);
    let detail = match &entry.detail {
        Some(d) => {
            let preview: String = d.chars().take(EXPORT_PREVIEW_CHARS).collect();
            if d.chars().count() > EXPORT_PREVIEW_CHARS {
                format!("{}...", preview)
            } else {
                preview
            }
        }
        None => "-".to_string(),
    };
    format!(
        "[{}] Actor: {} | Action: {} | Target: {} | Detail: {}",
        ts, entry.actor_id, entry.action, entry.target, detail
    )
}

/// Append-only audit store
#[derive(Clone)]
pub struct AuditLog {
    pool: SqlitePool,
}

impl AuditLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an entry; returns its rowid. Durable before return.
    pub async fn append(&self, entry: &AuditEntry) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_log (actor_id, action, target, detail, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.actor_id as i64)
        .bind(entry.action.as_str())
        .bind(&entry.target)
        .bind(&entry.detail)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent entries, newest first
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, actor_id, action, target, detail, created_at
            FROM audit_log
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let action_str: String = row.get("action");
            let action = AuditAction::from_str_opt(&action_str).ok_or_else(|| {
                sqlx::Error::ColumnDecode {
                    index: "action".into(),
                    source: format!("unknown audit action: {}", action_str).into(),
                }
            })?;
            entries.push(AuditEntry {
                id: Some(row.get("id")),
                actor_id: row.get::<i64, _>("actor_id") as UserId,
                action,
                target: row.get("target"),
                detail: row.get("detail"),
                created_at: row.get("created_at"),
            });
        }
        Ok(entries)
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&self.pool)
            .await
    }
}

//! Officer roster
//!
//! Officers decide economy applications, kick economies, and change rates.
//! Membership checks belong to the presentation layer; this store only keeps
//! the roster and its audit trail.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::info;

use super::models::Officer;
use crate::core_types::OfficerId;
use crate::ledger::audit::{AuditAction, AuditEntry, AuditLog};

#[derive(Debug, Error)]
pub enum OfficerError {
    #[error("User {0} is already an officer")]
    AlreadyOfficer(OfficerId),

    #[error("User {0} is not an officer")]
    NotAnOfficer(OfficerId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct OfficerStore {
    pool: SqlitePool,
    audit: AuditLog,
}

impl OfficerStore {
    pub fn new(pool: SqlitePool, audit: AuditLog) -> Self {
        Self { pool, audit }
    }

    pub async fn add(&self, user: OfficerId, granted_by: OfficerId) -> Result<(), OfficerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO officers (user_id, granted_by, granted_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user as i64)
        .bind(granted_by as i64)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OfficerError::AlreadyOfficer(user));
        }

        self.audit
            .append(&AuditEntry::new(
                granted_by,
                AuditAction::OfficerAdded,
                user.to_string(),
                None,
            ))
            .await?;

        info!(user, granted_by, "Officer added");
        Ok(())
    }

    pub async fn remove(&self, user: OfficerId, removed_by: OfficerId) -> Result<(), OfficerError> {
        let result = sqlx::query("DELETE FROM officers WHERE user_id = $1")
            .bind(user as i64)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(OfficerError::NotAnOfficer(user));
        }

        self.audit
            .append(&AuditEntry::new(
                removed_by,
                AuditAction::OfficerRemoved,
                user.to_string(),
                None,
            ))
            .await?;

        info!(user, removed_by, "Officer removed");
        Ok(())
    }

    pub async fn is_officer(&self, user: OfficerId) -> Result<bool, OfficerError> {
        let row = sqlx::query_scalar::<_, i64>("SELECT 1 FROM officers WHERE user_id = $1")
            .bind(user as i64)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Roster in grant order
    pub async fn list(&self) -> Result<Vec<Officer>, OfficerError> {
        let rows = sqlx::query(
            "SELECT user_id, granted_by, granted_at FROM officers ORDER BY granted_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Officer {
                user_id: row.get::<i64, _>("user_id") as OfficerId,
                granted_by: row.get::<i64, _>("granted_by") as OfficerId,
                granted_at: row.get("granted_at"),
            })
            .collect())
    }
}

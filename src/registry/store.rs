//! Economy Registry Store
//!
//! SQLite-backed persistence for economy applications and their lifecycle.
//! Status changes are guarded updates: the WHERE clause re-checks the expected
//! current status, so a raced decision loses cleanly instead of clobbering.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::info;

use super::models::{Economy, EconomyStatus, StatusFilter};
use crate::config::EngineConfig;
use crate::core_types::{EconomyId, OfficerId, UserId};
use crate::ledger::audit::{AuditAction, AuditEntry, AuditLog};
use crate::money::{self, MoneyError};

/// Registry operation errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Economy name '{0}' is already taken")]
    DuplicateName(String),

    #[error("Economy '{0}' not found")]
    NotFound(String),

    #[error("Economy '{name}' is not approved (status: {status})")]
    NotEligible { name: String, status: EconomyStatus },

    #[error("Invalid status transition {from} -> {to}")]
    InvalidTransition {
        from: EconomyStatus,
        to: EconomyStatus,
    },

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt economy record: {0}")]
    Corrupt(String),
}

const ECONOMY_COLUMNS: &str = "economy_id, name, currency_name, currency_symbol, \
     exchange_rate, status, applied_at, decided_at, officer_id, note";

/// Authoritative store of economy records
#[derive(Clone)]
pub struct EconomyStore {
    pool: SqlitePool,
    engine: EngineConfig,
    audit: AuditLog,
}

impl EconomyStore {
    pub fn new(pool: SqlitePool, engine: EngineConfig, audit: AuditLog) -> Self {
        Self {
            pool,
            engine,
            audit,
        }
    }

    /// File an application for an economy.
    ///
    /// The rate must pass the configured bounds and the name must be free
    /// (case-insensitive) among PENDING/APPROVED records of other economies.
    /// A server whose previous record is terminal may re-apply; the fresh
    /// PENDING application supersedes the old row. A PENDING application can
    /// be re-filed (amended); an APPROVED economy cannot apply again.
    pub async fn register(
        &self,
        economy_id: EconomyId,
        name: &str,
        currency_name: &str,
        currency_symbol: &str,
        exchange_rate: Decimal,
        applicant: UserId,
    ) -> Result<Economy, RegistryError> {
        money::validate_rate(
            exchange_rate,
            self.engine.min_exchange_rate,
            self.engine.max_exchange_rate,
        )?;

        let taken = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT economy_id FROM economies
            WHERE LOWER(name) = LOWER($1)
              AND status IN ('pending', 'approved')
              AND economy_id != $2
            "#,
        )
        .bind(name)
        .bind(economy_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        if taken.is_some() {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }

        if let Some(existing) = self.get(economy_id).await? {
            if existing.status == EconomyStatus::Approved {
                return Err(RegistryError::InvalidTransition {
                    from: EconomyStatus::Approved,
                    to: EconomyStatus::Pending,
                });
            }
        }

        let economy =
            Economy::new_application(economy_id, name, currency_name, currency_symbol, exchange_rate);

        // Supersedes any prior PENDING or terminal row for this server
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO economies
                (economy_id, name, currency_name, currency_symbol, exchange_rate,
                 status, applied_at, decided_at, officer_id, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, NULL, NULL)
            "#,
        )
        .bind(economy.economy_id as i64)
        .bind(&economy.name)
        .bind(&economy.currency_name)
        .bind(&economy.currency_symbol)
        .bind(economy.exchange_rate.to_string())
        .bind(economy.status.as_str())
        .bind(economy.applied_at)
        .execute(&self.pool)
        .await?;

        self.audit
            .append(&AuditEntry::new(
                applicant,
                AuditAction::EconomyApplied,
                economy_id.to_string(),
                Some(format!("{} (rate {})", name, exchange_rate)),
            ))
            .await?;

        info!(economy_id, name, rate = %exchange_rate, "Economy application filed");
        Ok(economy)
    }

    /// Officer accepts a PENDING application
    pub async fn approve(
        &self,
        economy_id: EconomyId,
        officer: OfficerId,
        note: Option<&str>,
    ) -> Result<(), RegistryError> {
        self.decide(economy_id, EconomyStatus::Approved, Some(officer), note)
            .await?;
        self.audit
            .append(&AuditEntry::new(
                officer,
                AuditAction::EconomyApproved,
                economy_id.to_string(),
                note.map(str::to_string),
            ))
            .await?;
        Ok(())
    }

    /// Officer declines a PENDING application (terminal)
    pub async fn reject(
        &self,
        economy_id: EconomyId,
        officer: OfficerId,
        note: Option<&str>,
    ) -> Result<(), RegistryError> {
        self.decide(economy_id, EconomyStatus::Rejected, Some(officer), note)
            .await?;
        self.audit
            .append(&AuditEntry::new(
                officer,
                AuditAction::EconomyRejected,
                economy_id.to_string(),
                note.map(str::to_string),
            ))
            .await?;
        Ok(())
    }

    /// The economy's own administrator pulls out of the program (terminal)
    pub async fn withdraw(&self, economy_id: EconomyId, actor: UserId) -> Result<(), RegistryError> {
        self.decide(economy_id, EconomyStatus::Withdrawn, None, None)
            .await?;
        self.audit
            .append(&AuditEntry::new(
                actor,
                AuditAction::EconomyWithdrawn,
                economy_id.to_string(),
                None,
            ))
            .await?;
        Ok(())
    }

    /// Officer removes an APPROVED economy (terminal)
    pub async fn kick(
        &self,
        economy_id: EconomyId,
        officer: OfficerId,
        note: Option<&str>,
    ) -> Result<(), RegistryError> {
        self.decide(economy_id, EconomyStatus::Kicked, Some(officer), note)
            .await?;
        self.audit
            .append(&AuditEntry::new(
                officer,
                AuditAction::EconomyKicked,
                economy_id.to_string(),
                note.map(str::to_string),
            ))
            .await?;
        Ok(())
    }

    /// Officer changes an APPROVED economy's exchange rate.
    ///
    /// Bounds-validated. Transfers already recorded keep their frozen rate
    /// pair; only future transfers see the new rate.
    pub async fn update_rate(
        &self,
        economy_id: EconomyId,
        new_rate: Decimal,
        officer: OfficerId,
    ) -> Result<(), RegistryError> {
        money::validate_rate(
            new_rate,
            self.engine.min_exchange_rate,
            self.engine.max_exchange_rate,
        )?;

        let current = self
            .get(economy_id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(economy_id.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE economies SET exchange_rate = $1
            WHERE economy_id = $2 AND status = 'approved'
            "#,
        )
        .bind(new_rate.to_string())
        .bind(economy_id as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::NotEligible {
                name: current.name,
                status: current.status,
            });
        }

        self.audit
            .append(&AuditEntry::new(
                officer,
                AuditAction::RateChanged,
                economy_id.to_string(),
                Some(format!("{} -> {}", current.exchange_rate, new_rate)),
            ))
            .await?;

        info!(economy_id, old = %current.exchange_rate, new = %new_rate, "Exchange rate changed");
        Ok(())
    }

    /// Resolve an economy by display name, eligible transfer endpoints only.
    ///
    /// Anything other than an APPROVED match fails: PENDING and terminal
    /// records report their status, unknown names report NotFound.
    pub async fn lookup_approved(&self, name: &str) -> Result<Economy, RegistryError> {
        let live = sqlx::query(&format!(
            "SELECT {ECONOMY_COLUMNS} FROM economies \
             WHERE LOWER(name) = LOWER($1) AND status IN ('pending', 'approved')"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = live {
            let economy = row_to_economy(&row)?;
            if economy.status == EconomyStatus::Approved {
                return Ok(economy);
            }
            return Err(RegistryError::NotEligible {
                name: economy.name,
                status: economy.status,
            });
        }

        let latest = sqlx::query(&format!(
            "SELECT {ECONOMY_COLUMNS} FROM economies \
             WHERE LOWER(name) = LOWER($1) ORDER BY applied_at DESC LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match latest {
            Some(row) => {
                let economy = row_to_economy(&row)?;
                Err(RegistryError::NotEligible {
                    name: economy.name,
                    status: economy.status,
                })
            }
            None => Err(RegistryError::NotFound(name.to_string())),
        }
    }

    /// Fetch by server id
    pub async fn get(&self, economy_id: EconomyId) -> Result<Option<Economy>, RegistryError> {
        let row = sqlx::query(&format!(
            "SELECT {ECONOMY_COLUMNS} FROM economies WHERE economy_id = $1"
        ))
        .bind(economy_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_economy(&r)).transpose()
    }

    /// List economies, oldest application first
    pub async fn list(&self, filter: StatusFilter) -> Result<Vec<Economy>, RegistryError> {
        let sql = match filter {
            StatusFilter::Pending => format!(
                "SELECT {ECONOMY_COLUMNS} FROM economies \
                 WHERE status = 'pending' ORDER BY applied_at ASC"
            ),
            StatusFilter::Approved => format!(
                "SELECT {ECONOMY_COLUMNS} FROM economies \
                 WHERE status = 'approved' ORDER BY applied_at ASC"
            ),
            StatusFilter::All => {
                format!("SELECT {ECONOMY_COLUMNS} FROM economies ORDER BY applied_at ASC")
            }
        };

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_economy).collect()
    }

    /// Guarded status transition: checked against the transition table, then
    /// applied only if the row still holds the expected status.
    async fn decide(
        &self,
        economy_id: EconomyId,
        next: EconomyStatus,
        officer: Option<OfficerId>,
        note: Option<&str>,
    ) -> Result<(), RegistryError> {
        let current = self
            .get(economy_id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(economy_id.to_string()))?;

        if !current.status.can_transition(next) {
            return Err(RegistryError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        let result = sqlx::query(
            r#"
            UPDATE economies
            SET status = $1, decided_at = $2, officer_id = $3, note = $4
            WHERE economy_id = $5 AND status = $6
            "#,
        )
        .bind(next.as_str())
        .bind(Utc::now())
        .bind(officer.map(|o| o as i64))
        .bind(note)
        .bind(economy_id as i64)
        .bind(current.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Raced with another decision; report whatever holds now
            let now_status = self
                .get(economy_id)
                .await?
                .map(|e| e.status)
                .unwrap_or(current.status);
            return Err(RegistryError::InvalidTransition {
                from: now_status,
                to: next,
            });
        }

        info!(economy_id, from = %current.status, to = %next, "Economy status changed");
        Ok(())
    }
}

fn row_to_economy(row: &sqlx::sqlite::SqliteRow) -> Result<Economy, RegistryError> {
    let rate_str: String = row.get("exchange_rate");
    let exchange_rate = rate_str
        .parse::<Decimal>()
        .map_err(|_| RegistryError::Corrupt(format!("bad exchange_rate: {}", rate_str)))?;

    let status_str: String = row.get("status");
    let status = EconomyStatus::from_str_opt(&status_str)
        .ok_or_else(|| RegistryError::Corrupt(format!("bad status: {}", status_str)))?;

    Ok(Economy {
        economy_id: row.get::<i64, _>("economy_id") as EconomyId,
        name: row.get("name"),
        currency_name: row.get("currency_name"),
        currency_symbol: row.get("currency_symbol"),
        exchange_rate,
        status,
        applied_at: row.get("applied_at"),
        decided_at: row.get("decided_at"),
        officer_id: row.get::<Option<i64>, _>("officer_id").map(|o| o as OfficerId),
        note: row.get("note"),
    })
}

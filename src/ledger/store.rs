//! Transaction Ledger
//!
//! Append-only record of every transfer. A transfer row is inserted PENDING
//! before any external call and finalized with a guarded update; a terminal
//! status is never overwritten. Retention cleanup removes old terminal rows
//! only — the audit log is out of its reach.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

use super::audit::{AuditAction, AuditEntry, AuditLog, SYSTEM_ACTOR};
use crate::core_types::EconomyId;
use crate::provider::Wallet;
use crate::transfer::{TransferError, TransferId, TransferRecord, TransferStatus};

const TRANSFER_COLUMNS: &str = "transfer_id, source_economy_id, target_economy_id, user_id, \
     wallet, source_amount, target_amount, source_rate, target_rate, status, detail, \
     created_at, completed_at";

/// Filters for ledger queries. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    /// Matches transfers with this economy on either side
    pub economy: Option<EconomyId>,
    pub status: Option<TransferStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// Durable store of transfer records
#[derive(Clone)]
pub struct TransactionLedger {
    pool: SqlitePool,
    audit: AuditLog,
}

impl TransactionLedger {
    pub fn new(pool: SqlitePool, audit: AuditLog) -> Self {
        Self { pool, audit }
    }

    /// Append a fresh PENDING record. Must happen before the first
    /// external call of the transfer.
    pub async fn record(&self, record: &TransferRecord) -> Result<(), TransferError> {
        sqlx::query(
            r#"
            INSERT INTO transfers (transfer_id, source_economy_id, target_economy_id,
                user_id, wallet, source_amount, target_amount, source_rate, target_rate,
                status, detail, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(record.transfer_id.to_string())
        .bind(record.source_economy_id as i64)
        .bind(record.target_economy_id as i64)
        .bind(record.user_id as i64)
        .bind(record.wallet.as_str())
        .bind(record.source_amount.to_string())
        .bind(record.target_amount.to_string())
        .bind(record.source_rate.to_string())
        .bind(record.target_rate.to_string())
        .bind(record.status.as_str())
        .bind(record.detail.clone())
        .bind(record.created_at)
        .bind(record.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Finalize a PENDING transfer with a guarded update.
    ///
    /// Returns false if the row was not PENDING anymore; a terminal status
    /// is never clobbered.
    pub async fn mark_terminal(
        &self,
        transfer_id: TransferId,
        status: TransferStatus,
        detail: Option<&str>,
    ) -> Result<bool, TransferError> {
        if !status.is_terminal() {
            return Err(TransferError::Internal(format!(
                "mark_terminal called with non-terminal status {}",
                status
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE transfers
            SET status = $1, detail = $2, completed_at = $3
            WHERE transfer_id = $4 AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(detail)
        .bind(Utc::now())
        .bind(transfer_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get(&self, transfer_id: TransferId) -> Result<Option<TransferRecord>, TransferError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transfers WHERE transfer_id = $1",
            TRANSFER_COLUMNS
        ))
        .bind(transfer_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_record(&r)).transpose()
    }

    /// Query transfers for reporting, newest first
    pub async fn query(&self, filter: &LedgerFilter) -> Result<Vec<TransferRecord>, TransferError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM transfers
            WHERE ($1 IS NULL OR source_economy_id = $1 OR target_economy_id = $1)
              AND ($2 IS NULL OR status = $2)
              AND ($3 IS NULL OR created_at >= $3)
              AND ($4 IS NULL OR created_at <= $4)
            ORDER BY created_at DESC
            LIMIT $5
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(filter.economy.map(|e| e as i64))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.since)
        .bind(filter.until)
        .bind(filter.limit.map(|l| l as i64).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// Delete terminal transfers older than the retention window.
    ///
    /// PENDING rows and audit entries are never touched. Returns the number
    /// of rows removed.
    pub async fn cleanup(&self, older_than: Duration) -> Result<u64, TransferError> {
        let cutoff = Utc::now() - older_than;

        let result = sqlx::query(
            "DELETE FROM transfers WHERE created_at < $1 AND status != 'pending'",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!(removed, %cutoff, "Cleaned up transfer records past retention");
            self.audit
                .append(&AuditEntry::new(
                    SYSTEM_ACTOR,
                    AuditAction::CleanupTransfers,
                    "transfers",
                    Some(format!("removed {} records created before {}", removed, cutoff)),
                ))
                .await
                .map_err(TransferError::from)?;
        }

        Ok(removed)
    }

    pub async fn count(&self) -> Result<i64, TransferError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transfers")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<TransferRecord, TransferError> {
    let corrupt = |what: &str, value: &str| {
        TransferError::Internal(format!("corrupt transfer record: bad {} '{}'", what, value))
    };

    let id_text: String = row.get("transfer_id");
    let transfer_id =
        TransferId::from_str(&id_text).map_err(|_| corrupt("transfer_id", &id_text))?;

    let wallet_text: String = row.get("wallet");
    let wallet = Wallet::from_str_opt(&wallet_text).ok_or_else(|| corrupt("wallet", &wallet_text))?;

    let status_text: String = row.get("status");
    let status =
        TransferStatus::from_str_opt(&status_text).ok_or_else(|| corrupt("status", &status_text))?;

    let parse_decimal = |column: &str| -> Result<Decimal, TransferError> {
        let text: String = row.get(column);
        Decimal::from_str(&text).map_err(|_| corrupt(column, &text))
    };

    Ok(TransferRecord {
        transfer_id,
        source_economy_id: row.get::<i64, _>("source_economy_id") as EconomyId,
        target_economy_id: row.get::<i64, _>("target_economy_id") as EconomyId,
        user_id: row.get::<i64, _>("user_id") as u64,
        wallet,
        source_amount: parse_decimal("source_amount")?,
        target_amount: parse_decimal("target_amount")?,
        source_rate: parse_decimal("source_rate")?,
        target_rate: parse_decimal("target_rate")?,
        status,
        detail: row.get("detail"),
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
    })
}

//! Transfer Coordinator
//!
//! Orchestrates one cross-economy transfer end to end: resolve and validate,
//! freeze the rate pair, debit the source, credit the target, and on a
//! partial failure refund the source. The PENDING ledger row is written
//! before the first external call, and every path ends in exactly one
//! guarded terminal update.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::status::TransferStatus;
use super::types::{TransferId, TransferOutcome, TransferRecord, TransferRequest};
use crate::config::EngineConfig;
use crate::ledger::audit::{AuditAction, AuditEntry, AuditLog, SYSTEM_ACTOR};
use crate::ledger::store::TransactionLedger;
use crate::money;
use crate::provider::{BalanceProvider, ProviderError};
use crate::registry::{Economy, EconomyStore};
use crate::serializer::{ResourceKey, ResourceSerializer};

/// Bounded refund retries before escalating to FAILED_INCONSISTENT
const REFUND_ATTEMPTS: u32 = 3;
/// Base delay between refund attempts, doubled each retry
const REFUND_BACKOFF: Duration = Duration::from_millis(200);

/// Transfer Coordinator - drives each transfer to a terminal status
#[derive(Clone)]
pub struct TransferCoordinator {
    registry: EconomyStore,
    ledger: TransactionLedger,
    audit: AuditLog,
    provider: Arc<dyn BalanceProvider>,
    serializer: Arc<ResourceSerializer>,
    engine: EngineConfig,
}

impl TransferCoordinator {
    pub fn new(
        registry: EconomyStore,
        ledger: TransactionLedger,
        audit: AuditLog,
        provider: Arc<dyn BalanceProvider>,
        serializer: Arc<ResourceSerializer>,
        engine: EngineConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            audit,
            provider,
            serializer,
            engine,
        }
    }

    /// Execute a transfer to its terminal status.
    ///
    /// Validation failures are returned as errors before any record exists.
    /// Once the PENDING row is written, the result is always an outcome:
    /// provider failures land in the record's status and detail, not in Err.
    pub async fn execute(&self, req: TransferRequest) -> Result<TransferOutcome, TransferError> {
        // 1. Resolve both endpoints; each must be APPROVED
        let source = self.registry.lookup_approved(&req.source_economy).await?;
        let target = self.registry.lookup_approved(&req.target_economy).await?;
        if source.economy_id == target.economy_id {
            return Err(TransferError::SameEconomy);
        }

        // 2. Amount bounds and precision
        money::check_scale(req.amount, self.engine.amount_scale)?;
        money::validate_amount(
            req.amount,
            self.engine.min_transfer_amount,
            self.engine.max_transfer_amount,
        )?;

        // 3. Convert under the current (about to be frozen) rate pair
        let target_amount = money::convert(
            req.amount,
            source.exchange_rate,
            target.exchange_rate,
            self.engine.amount_scale,
        )?;

        // 4. Durable PENDING record before any external call
        let record = TransferRecord::new(
            &source,
            &target,
            req.user,
            req.wallet,
            req.amount,
            target_amount,
        );
        self.ledger.record(&record).await?;
        info!(
            transfer_id = %record.transfer_id,
            source = %source.name,
            target = %target.name,
            user = record.user_id,
            amount = %record.source_amount,
            converted = %record.target_amount,
            "Transfer created"
        );

        // 5-9. Run on a detached task: once funds may be in flight the
        // transfer must reach a terminal status even if the caller's
        // future is dropped.
        let coordinator = self.clone();
        let task =
            tokio::spawn(async move { coordinator.run_to_terminal(record, source, target).await });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(TransferError::Internal(format!(
                "transfer task aborted: {}",
                e
            ))),
        }
    }

    /// Steps 5-9: locks, debit, credit, and the rollback path.
    async fn run_to_terminal(
        &self,
        record: TransferRecord,
        source: Economy,
        target: Economy,
    ) -> Result<TransferOutcome, TransferError> {
        let source_key = ResourceKey::new(record.source_economy_id, record.user_id, record.wallet);
        let target_key = ResourceKey::new(record.target_economy_id, record.user_id, record.wallet);

        // 5. Hold both balances, acquired in canonical key order
        let _guards = self.serializer.acquire_pair(source_key, target_key).await;

        // 6. Debit the source
        self.serializer.pace().await;
        if let Err(e) = self
            .provider
            .debit(
                record.source_economy_id,
                record.user_id,
                record.wallet,
                record.source_amount,
            )
            .await
        {
            return match e {
                ProviderError::InsufficientFunds { .. } | ProviderError::NotFound { .. } => {
                    warn!(transfer_id = %record.transfer_id, error = %e, "Transfer rejected before debit");
                    self.finalize(
                        record,
                        TransferStatus::FailedValidation,
                        Some(format!("debit rejected: {}", e)),
                    )
                    .await
                }
                other => {
                    warn!(transfer_id = %record.transfer_id, error = %other, "Debit failed; no funds moved");
                    self.finalize(
                        record,
                        TransferStatus::FailedRolledBack,
                        Some(format!("debit failed: {}; no funds moved", other)),
                    )
                    .await
                }
            };
        }
        debug!(transfer_id = %record.transfer_id, "Source debited");

        // 7. Credit the target
        self.serializer.pace().await;
        let credit_err = match self
            .provider
            .credit(
                record.target_economy_id,
                record.user_id,
                record.wallet,
                record.target_amount,
            )
            .await
        {
            Ok(_) => {
                let user = record.user_id;
                let outcome = self.finalize(record, TransferStatus::Completed, None).await?;
                info!(transfer_id = %outcome.transfer_id, "Transfer completed");

                self.append_audit(AuditEntry::new(
                    user,
                    AuditAction::Transfer,
                    outcome.transfer_id.to_string(),
                    Some(format!(
                        "{} {} -> {} {}",
                        money::format_amount(outcome.source_amount, self.engine.amount_scale),
                        source.name,
                        money::format_amount(outcome.target_amount, self.engine.amount_scale),
                        target.name
                    )),
                ))
                .await;
                return Ok(outcome);
            }
            Err(e) => e,
        };

        // 8. Credit failed with the debit already applied: refund the source
        warn!(
            transfer_id = %record.transfer_id,
            error = %credit_err,
            "Credit failed after debit; attempting refund"
        );
        match self.refund_source(&record).await {
            Ok(_) => {
                info!(transfer_id = %record.transfer_id, "Source refunded; net change is zero");
                self.finalize(
                    record,
                    TransferStatus::FailedRolledBack,
                    Some(format!("credit failed: {}; source refunded", credit_err)),
                )
                .await
            }
            Err(refund_err) => {
                error!(
                    transfer_id = %record.transfer_id,
                    source = %source.name,
                    target = %target.name,
                    user = record.user_id,
                    amount = %record.source_amount,
                    credit_error = %credit_err,
                    refund_error = %refund_err,
                    "TRANSFER INCONSISTENT: debit applied, refund failed; manual reconciliation required"
                );

                let outcome = self
                    .finalize(
                        record,
                        TransferStatus::FailedInconsistent,
                        Some(format!(
                            "credit failed: {}; refund failed: {}",
                            credit_err, refund_err
                        )),
                    )
                    .await?;

                self.append_audit(AuditEntry::new(
                    SYSTEM_ACTOR,
                    AuditAction::TransferInconsistent,
                    outcome.transfer_id.to_string(),
                    Some(format!(
                        "{} {} debited from {}; credit of {} {} to {} failed: {}; refund failed: {}",
                        money::format_amount(outcome.source_amount, self.engine.amount_scale),
                        source.currency_name,
                        source.name,
                        money::format_amount(outcome.target_amount, self.engine.amount_scale),
                        target.currency_name,
                        target.name,
                        credit_err,
                        refund_err
                    )),
                ))
                .await;

                Ok(outcome)
            }
        }
    }

    /// Compensating credit with bounded backoff.
    ///
    /// Only transient failures are retried; a permanent failure escalates
    /// immediately.
    async fn refund_source(&self, record: &TransferRecord) -> Result<(), ProviderError> {
        let mut attempt: u32 = 1;
        loop {
            self.serializer.pace().await;
            match self
                .provider
                .credit(
                    record.source_economy_id,
                    record.user_id,
                    record.wallet,
                    record.source_amount,
                )
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) if e.is_transient() && attempt < REFUND_ATTEMPTS => {
                    warn!(
                        transfer_id = %record.transfer_id,
                        attempt,
                        error = %e,
                        "Refund attempt failed; backing off"
                    );
                    tokio::time::sleep(REFUND_BACKOFF * 2u32.pow(attempt - 1)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Guarded terminal update; the outcome reflects what is on disk.
    async fn finalize(
        &self,
        mut record: TransferRecord,
        status: TransferStatus,
        detail: Option<String>,
    ) -> Result<TransferOutcome, TransferError> {
        let updated = self
            .ledger
            .mark_terminal(record.transfer_id, status, detail.as_deref())
            .await?;

        if !updated {
            // Each transfer id has exactly one driving task, so a lost
            // guard means something external touched the row.
            error!(
                transfer_id = %record.transfer_id,
                attempted = %status,
                "Transfer was already finalized; keeping the stored status"
            );
            return match self.ledger.get(record.transfer_id).await? {
                Some(actual) => Ok(TransferOutcome::from_record(&actual)),
                None => Err(TransferError::TransferNotFound(
                    record.transfer_id.to_string(),
                )),
            };
        }

        record.status = status;
        record.detail = detail;
        record.completed_at = Some(chrono::Utc::now());
        Ok(TransferOutcome::from_record(&record))
    }

    /// Best-effort audit append; the transfer row itself is already durable.
    async fn append_audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.append(&entry).await {
            error!(error = %e, action = %entry.action, "Failed to append audit entry");
        }
    }

    pub async fn get(
        &self,
        transfer_id: TransferId,
    ) -> Result<Option<TransferRecord>, TransferError> {
        self.ledger.get(transfer_id).await
    }
}

//! Retention Sweeper
//!
//! Background worker that periodically removes terminal transfer records
//! older than the retention window.

use std::time::Duration;
use tracing::{debug, error, info};

use super::store::TransactionLedger;
use crate::transfer::TransferError;

/// Configuration for the retention sweeper
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How often to run a sweep
    pub sweep_interval: Duration,
    /// Age past which terminal transfers are removed
    pub retention_days: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(86_400),
            retention_days: 180,
        }
    }
}

/// Retention Sweeper
///
/// Runs forever, deleting transfer records past retention on each pass.
/// Audit entries and PENDING transfers are never removed.
pub struct RetentionSweeper {
    ledger: TransactionLedger,
    config: SweeperConfig,
}

impl RetentionSweeper {
    pub fn new(ledger: TransactionLedger, config: SweeperConfig) -> Self {
        Self { ledger, config }
    }

    pub fn with_defaults(ledger: TransactionLedger) -> Self {
        Self::new(ledger, SweeperConfig::default())
    }

    /// Run the sweeper loop. Never returns.
    pub async fn run(&self) {
        info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            retention_days = self.config.retention_days,
            "Starting retention sweeper"
        );

        loop {
            match self.sweep_once().await {
                Ok(0) => debug!("Retention sweep found nothing to remove"),
                Ok(removed) => info!(removed, "Retention sweep finished"),
                Err(e) => error!(error = %e, "Retention sweep failed"),
            }

            tokio::time::sleep(self.config.sweep_interval).await;
        }
    }

    /// Run a single sweep cycle
    pub async fn sweep_once(&self) -> Result<u64, TransferError> {
        self.ledger
            .cleanup(chrono::Duration::days(self.config.retention_days))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::ledger::audit::AuditLog;
    use crate::provider::Wallet;
    use crate::registry::{Economy, EconomyStatus};
    use crate::transfer::{TransferRecord, TransferStatus};
    use chrono::Utc;
    use rust_decimal::Decimal;

    #[test]
    fn test_sweeper_config_default() {
        let config = SweeperConfig::default();
        assert_eq!(config.sweep_interval, Duration::from_secs(86_400));
        assert_eq!(config.retention_days, 180);
    }

    #[tokio::test]
    async fn test_sweep_once_applies_retention() {
        let db = Database::connect_memory().await.unwrap();
        db.init_schema().await.unwrap();
        let audit = AuditLog::new(db.pool().clone());
        let ledger = TransactionLedger::new(db.pool().clone(), audit);

        let dec = |s: &str| s.parse::<Decimal>().unwrap();
        let mut source = Economy::new_application(1, "Northlands", "Krona", "kr", dec("50"));
        source.status = EconomyStatus::Approved;
        let mut target = Economy::new_application(2, "Southmark", "Mark", "m", dec("20"));
        target.status = EconomyStatus::Approved;

        let mut old = TransferRecord::new(&source, &target, 7, Wallet::Cash, dec("500"), dec("200"));
        old.created_at = Utc::now() - chrono::Duration::days(213);
        ledger.record(&old).await.unwrap();
        ledger
            .mark_terminal(old.transfer_id, TransferStatus::Completed, None)
            .await
            .unwrap();

        let mut kept = TransferRecord::new(&source, &target, 7, Wallet::Cash, dec("10"), dec("4"));
        kept.created_at = Utc::now() - chrono::Duration::days(152);
        ledger.record(&kept).await.unwrap();
        ledger
            .mark_terminal(kept.transfer_id, TransferStatus::Completed, None)
            .await
            .unwrap();

        let sweeper = RetentionSweeper::with_defaults(ledger.clone());
        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
        assert!(ledger.get(old.transfer_id).await.unwrap().is_none());
        assert!(ledger.get(kept.transfer_id).await.unwrap().is_some());
    }
}

//! Clearinghouse - Cross-Economy Transfer Engine
//!
//! Service entry point. Architecture:
//!
//! ```text
//! ┌──────────┐    ┌─────────────┐    ┌─────────────┐    ┌──────────┐
//! │ Registry │───▶│ Coordinator │───▶│ Serializer  │───▶│ Provider │
//! │ (SQLite) │    │  (9 steps)  │    │ (locks+pace)│    │  (HTTP)  │
//! └──────────┘    └─────────────┘    └─────────────┘    └──────────┘
//!                        │
//!                        ▼
//!                  ┌──────────┐
//!                  │  Ledger  │  transfers + audit_log (SQLite)
//!                  └──────────┘
//!
//! Coordinator responsibilities:
//! - PENDING record before the first provider call
//! - Debit, credit, compensating refund on partial failure
//! - Escalation to FAILED_INCONSISTENT when the refund is exhausted
//! ```

use std::sync::Arc;

use clearinghouse::config::AppConfig;
use clearinghouse::db::Database;
use clearinghouse::ledger::{AuditLog, RetentionSweeper, SweeperConfig, TransactionLedger};
use clearinghouse::logging::init_logging;
use clearinghouse::provider::HttpBalanceProvider;
use clearinghouse::registry::{EconomyStore, OfficerStore, StatusFilter};
use clearinghouse::serializer::ResourceSerializer;
use clearinghouse::transfer::TransferCoordinator;

// ============================================================
// ARGUMENTS
// ============================================================

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _log_guard = init_logging(&config);

    tracing::info!(
        "Starting clearinghouse in {} mode (build {})",
        env,
        env!("GIT_HASH")
    );

    // Storage
    let db = Database::connect(&config.database.url).await?;
    db.init_schema().await?;

    // Shared services
    let audit = AuditLog::new(db.pool().clone());
    let registry = EconomyStore::new(db.pool().clone(), config.engine.clone(), audit.clone());
    let officers = OfficerStore::new(db.pool().clone(), audit.clone());
    let ledger = TransactionLedger::new(db.pool().clone(), audit.clone());

    // External balance service access, paced and serialized
    let provider = Arc::new(HttpBalanceProvider::new(&config.provider)?);
    let serializer = Arc::new(ResourceSerializer::from_delay_secs(
        config.engine.api_delay_secs,
    ));

    // Held for the lifetime of the service; transfer entry points borrow it
    let _coordinator = TransferCoordinator::new(
        registry.clone(),
        ledger.clone(),
        audit,
        provider,
        serializer,
        config.engine.clone(),
    );

    let approved = registry.list(StatusFilter::Approved).await?.len();
    let recorded = ledger.count().await?;
    let roster = officers.list().await?.len();
    tracing::info!(
        "Registry ready: {} approved economies, {} officers, {} transfers on record",
        approved,
        roster,
        recorded
    );

    // Background retention sweep
    let sweeper = RetentionSweeper::new(
        ledger,
        SweeperConfig {
            sweep_interval: std::time::Duration::from_secs(config.retention.sweep_interval_secs),
            retention_days: config.retention.days,
        },
    );
    tokio::spawn(async move {
        sweeper.run().await;
    });

    tracing::info!(
        "Clearinghouse ready against {} (api_delay {}s)",
        config.provider.base_url,
        config.engine.api_delay_secs
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping");
    Ok(())
}

//! Integration tests for the transfer flow
//!
//! These run the full coordinator path against an in-memory database and a
//! mock balance provider, covering the happy path, both failure-and-refund
//! branches, and serialization under concurrency.

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::db::Database;
use crate::ledger::audit::{AuditAction, AuditLog, SYSTEM_ACTOR};
use crate::ledger::store::{LedgerFilter, TransactionLedger};
use crate::provider::{MockProvider, ProviderError, Wallet};
use crate::registry::EconomyStore;
use crate::serializer::ResourceSerializer;
use crate::transfer::coordinator::TransferCoordinator;
use crate::transfer::status::TransferStatus;
use crate::transfer::types::TransferRequest;

const OFFICER: u64 = 900;
const USER: u64 = 7;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Coordinator wired to a mock provider and an in-memory database
struct TestHarness {
    _db: Database,
    registry: EconomyStore,
    ledger: TransactionLedger,
    audit: AuditLog,
    provider: Arc<MockProvider>,
    coordinator: TransferCoordinator,
}

impl TestHarness {
    async fn new() -> Self {
        let db = Database::connect_memory().await.unwrap();
        db.init_schema().await.unwrap();

        let engine = EngineConfig {
            api_delay_secs: 0.0,
            ..EngineConfig::default()
        };
        let audit = AuditLog::new(db.pool().clone());
        let registry = EconomyStore::new(db.pool().clone(), engine.clone(), audit.clone());
        let ledger = TransactionLedger::new(db.pool().clone(), audit.clone());
        let provider = Arc::new(MockProvider::new());
        let serializer = Arc::new(ResourceSerializer::from_delay_secs(engine.api_delay_secs));

        let coordinator = TransferCoordinator::new(
            registry.clone(),
            ledger.clone(),
            audit.clone(),
            provider.clone(),
            serializer,
            engine,
        );

        Self {
            _db: db,
            registry,
            ledger,
            audit,
            provider,
            coordinator,
        }
    }

    /// Northlands (id 1, rate 50) and Southmark (id 2, rate 20), approved
    async fn with_two_economies() -> Self {
        let harness = Self::new().await;
        harness.add_approved(1, "Northlands", "50").await;
        harness.add_approved(2, "Southmark", "20").await;
        harness
    }

    async fn add_approved(&self, id: u64, name: &str, rate: &str) {
        self.registry
            .register(id, name, &format!("{} coin", name), "c", dec(rate), 100)
            .await
            .unwrap();
        self.registry.approve(id, OFFICER, None).await.unwrap();
    }

    fn request(&self, amount: &str) -> TransferRequest {
        TransferRequest::new("Northlands", "Southmark", USER, Wallet::Cash, dec(amount))
    }
}

// ========================================================================
// Happy Path
// ========================================================================

/// 500 at rate 50 into rate 20 converts to 200; both balances move and
/// the row completes with the rate pair frozen.
#[tokio::test]
async fn test_transfer_happy_path() {
    let harness = TestHarness::with_two_economies().await;
    harness.provider.set_balance(1, USER, Wallet::Cash, dec("1000"));
    harness.provider.set_balance(2, USER, Wallet::Cash, dec("50"));

    let outcome = harness
        .coordinator
        .execute(harness.request("500"))
        .await
        .unwrap();

    assert_eq!(outcome.status, TransferStatus::Completed);
    assert!(outcome.is_completed());
    assert_eq!(outcome.source_amount, dec("500"));
    assert_eq!(outcome.target_amount, dec("200"));

    assert_eq!(harness.provider.balance_of(1, USER, Wallet::Cash), dec("500"));
    assert_eq!(harness.provider.balance_of(2, USER, Wallet::Cash), dec("250"));
    assert_eq!(harness.provider.debit_count(), 1);
    assert_eq!(harness.provider.credit_count(), 1);

    let record = harness
        .coordinator
        .get(outcome.transfer_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TransferStatus::Completed);
    assert_eq!(record.source_rate, dec("50"));
    assert_eq!(record.target_rate, dec("20"));
    assert!(record.completed_at.is_some());
    assert!(record.detail.is_none());
}

/// A later rate change must not rewrite what an executed transfer meant.
#[tokio::test]
async fn test_completed_transfer_keeps_frozen_rates() {
    let harness = TestHarness::with_two_economies().await;
    harness.provider.set_balance(1, USER, Wallet::Cash, dec("1000"));
    harness.provider.set_balance(2, USER, Wallet::Cash, dec("0"));

    let outcome = harness
        .coordinator
        .execute(harness.request("500"))
        .await
        .unwrap();

    harness
        .registry
        .update_rate(1, dec("75"), OFFICER)
        .await
        .unwrap();

    let record = harness
        .coordinator
        .get(outcome.transfer_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.source_rate, dec("50"));
    assert_eq!(record.target_amount, dec("200"));
}

/// The completed transfer shows up in the audit trail with the converted
/// amounts and both economy names.
#[tokio::test]
async fn test_completed_transfer_is_audited() {
    let harness = TestHarness::with_two_economies().await;
    harness.provider.set_balance(1, USER, Wallet::Cash, dec("1000"));
    harness.provider.set_balance(2, USER, Wallet::Cash, dec("0"));

    let outcome = harness
        .coordinator
        .execute(harness.request("500"))
        .await
        .unwrap();

    let entries = harness.audit.recent(1).await.unwrap();
    assert_eq!(entries[0].action, AuditAction::Transfer);
    assert_eq!(entries[0].actor_id, USER);
    assert_eq!(entries[0].target, outcome.transfer_id.to_string());
    assert_eq!(
        entries[0].detail.as_deref(),
        Some("500.00 Northlands -> 200.00 Southmark")
    );
}

// ========================================================================
// Failures Before Any Mutation
// ========================================================================

/// Balance 100, attempted 500: rejected before the debit lands, nothing
/// mutated anywhere.
#[tokio::test]
async fn test_insufficient_funds_rejected_pre_debit() {
    let harness = TestHarness::with_two_economies().await;
    harness.provider.set_balance(1, USER, Wallet::Cash, dec("100"));
    harness.provider.set_balance(2, USER, Wallet::Cash, dec("50"));

    let outcome = harness
        .coordinator
        .execute(harness.request("500"))
        .await
        .unwrap();

    assert_eq!(outcome.status, TransferStatus::FailedValidation);
    assert!(outcome.detail.as_deref().unwrap().contains("Insufficient funds"));

    assert_eq!(harness.provider.balance_of(1, USER, Wallet::Cash), dec("100"));
    assert_eq!(harness.provider.balance_of(2, USER, Wallet::Cash), dec("50"));
    assert_eq!(harness.provider.credit_count(), 0);
}

/// A transient debit failure moves no funds; the transfer still reaches a
/// terminal status with a net change of zero.
#[tokio::test]
async fn test_debit_network_failure_is_net_zero() {
    let harness = TestHarness::with_two_economies().await;
    harness.provider.set_balance(1, USER, Wallet::Cash, dec("1000"));
    harness.provider.set_balance(2, USER, Wallet::Cash, dec("0"));
    harness
        .provider
        .set_fail_debit(1, ProviderError::Network("connection reset".into()), 1);

    let outcome = harness
        .coordinator
        .execute(harness.request("500"))
        .await
        .unwrap();

    assert_eq!(outcome.status, TransferStatus::FailedRolledBack);
    assert!(outcome.detail.as_deref().unwrap().contains("no funds moved"));
    assert_eq!(harness.provider.balance_of(1, USER, Wallet::Cash), dec("1000"));
    assert_eq!(harness.provider.credit_count(), 0);
}

// ========================================================================
// Rollback Path
// ========================================================================

/// Debit lands, credit fails with a network error, the compensating refund
/// succeeds: net balance change is zero and the status says rolled back.
#[tokio::test]
async fn test_credit_failure_rolls_back() {
    let harness = TestHarness::with_two_economies().await;
    harness.provider.set_balance(1, USER, Wallet::Cash, dec("1000"));
    harness.provider.set_balance(2, USER, Wallet::Cash, dec("50"));
    harness
        .provider
        .set_fail_credit(2, ProviderError::Network("timeout".into()), 1);

    let outcome = harness
        .coordinator
        .execute(harness.request("500"))
        .await
        .unwrap();

    assert_eq!(outcome.status, TransferStatus::FailedRolledBack);
    assert!(outcome.detail.as_deref().unwrap().contains("source refunded"));

    // Source restored, target untouched
    assert_eq!(harness.provider.balance_of(1, USER, Wallet::Cash), dec("1000"));
    assert_eq!(harness.provider.balance_of(2, USER, Wallet::Cash), dec("50"));
    assert_eq!(harness.provider.debit_count(), 1);
    // One failed target credit plus one successful refund
    assert_eq!(harness.provider.credit_count(), 2);
}

/// Transient refund failures are retried; the third attempt lands.
#[tokio::test]
async fn test_refund_retries_through_transient_failures() {
    let harness = TestHarness::with_two_economies().await;
    harness.provider.set_balance(1, USER, Wallet::Cash, dec("1000"));
    harness.provider.set_balance(2, USER, Wallet::Cash, dec("0"));
    harness
        .provider
        .set_fail_credit(2, ProviderError::Network("timeout".into()), 1);
    harness
        .provider
        .set_fail_credit(1, ProviderError::RateLimited { retry_after_secs: 1 }, 2);

    let outcome = harness
        .coordinator
        .execute(harness.request("500"))
        .await
        .unwrap();

    assert_eq!(outcome.status, TransferStatus::FailedRolledBack);
    assert_eq!(harness.provider.balance_of(1, USER, Wallet::Cash), dec("1000"));
    // Failed target credit + two failed refunds + the one that landed
    assert_eq!(harness.provider.credit_count(), 4);
}

// ========================================================================
// Escalation
// ========================================================================

/// All refund attempts fail: the transfer is flagged inconsistent, the
/// missing funds stay visible, and a high-severity audit entry is written.
#[tokio::test]
async fn test_refund_exhaustion_escalates_to_inconsistent() {
    let harness = TestHarness::with_two_economies().await;
    harness.provider.set_balance(1, USER, Wallet::Cash, dec("1000"));
    harness.provider.set_balance(2, USER, Wallet::Cash, dec("0"));
    harness
        .provider
        .set_fail_credit(2, ProviderError::Network("timeout".into()), 1);
    harness
        .provider
        .set_fail_credit(1, ProviderError::Network("still down".into()), 3);

    let outcome = harness
        .coordinator
        .execute(harness.request("500"))
        .await
        .unwrap();

    assert_eq!(outcome.status, TransferStatus::FailedInconsistent);
    let detail = outcome.detail.as_deref().unwrap();
    assert!(detail.contains("credit failed"));
    assert!(detail.contains("refund failed"));

    // The debit stands; reconciliation is on the operator now
    assert_eq!(harness.provider.balance_of(1, USER, Wallet::Cash), dec("500"));
    assert_eq!(harness.provider.balance_of(2, USER, Wallet::Cash), dec("0"));
    assert_eq!(harness.provider.credit_count(), 4);

    let entries = harness.audit.recent(1).await.unwrap();
    assert_eq!(entries[0].action, AuditAction::TransferInconsistent);
    assert_eq!(entries[0].actor_id, SYSTEM_ACTOR);
    assert_eq!(entries[0].target, outcome.transfer_id.to_string());
}

/// A permanent refund failure escalates without burning further attempts.
#[tokio::test]
async fn test_permanent_refund_failure_escalates_immediately() {
    let harness = TestHarness::with_two_economies().await;
    harness.provider.set_balance(1, USER, Wallet::Cash, dec("1000"));
    harness.provider.set_balance(2, USER, Wallet::Cash, dec("0"));
    harness
        .provider
        .set_fail_credit(2, ProviderError::Network("timeout".into()), 1);
    harness.provider.set_fail_credit(
        1,
        ProviderError::Permanent {
            status: 403,
            detail: "token revoked".into(),
        },
        1,
    );

    let outcome = harness
        .coordinator
        .execute(harness.request("500"))
        .await
        .unwrap();

    assert_eq!(outcome.status, TransferStatus::FailedInconsistent);
    // One failed target credit plus exactly one refund attempt
    assert_eq!(harness.provider.credit_count(), 2);
}

// ========================================================================
// Concurrency
// ========================================================================

/// Concurrent transfers over the same source wallet serialize: the total
/// balance change equals the sum of the individual effects.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_lose_no_updates() {
    let harness = Arc::new(TestHarness::with_two_economies().await);
    harness.provider.set_balance(1, USER, Wallet::Cash, dec("1000"));
    harness.provider.set_balance(2, USER, Wallet::Cash, dec("0"));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let harness = harness.clone();
        handles.push(tokio::spawn(async move {
            harness.coordinator.execute(harness.request("100")).await
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.status, TransferStatus::Completed);
        assert_eq!(outcome.target_amount, dec("40"));
    }

    assert_eq!(harness.provider.balance_of(1, USER, Wallet::Cash), dec("600"));
    assert_eq!(harness.provider.balance_of(2, USER, Wallet::Cash), dec("160"));

    // Nothing left pending in the ledger
    let pending = harness
        .ledger
        .query(&LedgerFilter {
            status: Some(TransferStatus::Pending),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(pending.is_empty());
}

/// Opposite-direction transfers between the same two economies finish
/// without deadlocking on the pair of resource keys.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_direction_transfers_complete() {
    let harness = Arc::new(TestHarness::with_two_economies().await);
    harness.provider.set_balance(1, USER, Wallet::Cash, dec("1000"));
    harness.provider.set_balance(2, USER, Wallet::Cash, dec("1000"));

    let forward = {
        let harness = harness.clone();
        tokio::spawn(async move {
            harness
                .coordinator
                .execute(TransferRequest::new(
                    "Northlands",
                    "Southmark",
                    USER,
                    Wallet::Cash,
                    dec("100"),
                ))
                .await
        })
    };
    let backward = {
        let harness = harness.clone();
        tokio::spawn(async move {
            harness
                .coordinator
                .execute(TransferRequest::new(
                    "Southmark",
                    "Northlands",
                    USER,
                    Wallet::Cash,
                    dec("100"),
                ))
                .await
        })
    };

    let all = async {
        let a = forward.await.unwrap().unwrap();
        let b = backward.await.unwrap().unwrap();
        (a, b)
    };
    let (a, b) = tokio::time::timeout(std::time::Duration::from_secs(10), all)
        .await
        .expect("transfers must not deadlock");

    assert_eq!(a.status, TransferStatus::Completed);
    assert_eq!(b.status, TransferStatus::Completed);

    // 100 at 50->20 converts to 40; 100 at 20->50 converts to 250
    assert_eq!(harness.provider.balance_of(1, USER, Wallet::Cash), dec("1150"));
    assert_eq!(harness.provider.balance_of(2, USER, Wallet::Cash), dec("940"));
}

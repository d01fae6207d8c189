//! Resource serializer for balance mutations.
//!
//! The balance service updates are read-then-patch, so two concurrent
//! mutations of the same wallet can lose one of the updates. This module
//! grants at most one in-flight operation per (economy, user, wallet) key,
//! with per-key locks stored in a thread-safe DashMap. Distinct keys never
//! block each other.
//!
//! A separate global pacer enforces a minimum gap between outbound service
//! calls regardless of key, mirroring the service's shared rate limit.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use crate::core_types::{EconomyId, UserId};
use crate::provider::Wallet;

/// Identity of one lockable balance.
///
/// Derived ordering (economy, then user, then wallet) is the canonical
/// acquisition order for multi-key operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub economy: EconomyId,
    pub user: UserId,
    pub wallet: Wallet,
}

impl ResourceKey {
    pub fn new(economy: EconomyId, user: UserId, wallet: Wallet) -> Self {
        Self {
            economy,
            user,
            wallet,
        }
    }
}

/// Serializes balance mutations per key and paces outbound calls globally.
///
/// Waiters on the same key are granted in arrival order (tokio's Mutex
/// queues fairly). The lock map grows with distinct keys touched; keys are
/// bounded by participating (economy, user, wallet) triples.
pub struct ResourceSerializer {
    locks: DashMap<ResourceKey, Arc<Mutex<()>>>,
    /// Earliest instant the next outbound call may start
    next_call: Mutex<Instant>,
    api_delay: Duration,
}

impl ResourceSerializer {
    pub fn new(api_delay: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            next_call: Mutex::new(Instant::now()),
            api_delay,
        }
    }

    /// From engine config, with the delay given in (fractional) seconds
    pub fn from_delay_secs(api_delay_secs: f64) -> Self {
        Self::new(Duration::from_secs_f64(api_delay_secs))
    }

    /// Exclusive hold on one key. Released when the guard drops.
    pub async fn acquire(&self, key: ResourceKey) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Exclusive hold on two keys, taken in canonical key order.
    ///
    /// Taking both sides of a transfer through here makes lock-order
    /// cycles impossible. The two keys must differ.
    pub async fn acquire_pair(
        &self,
        a: ResourceKey,
        b: ResourceKey,
    ) -> (OwnedMutexGuard<()>, OwnedMutexGuard<()>) {
        debug_assert_ne!(a, b, "acquire_pair on one key would self-deadlock");
        if a <= b {
            let first = self.acquire(a).await;
            let second = self.acquire(b).await;
            (first, second)
        } else {
            let first = self.acquire(b).await;
            let second = self.acquire(a).await;
            (first, second)
        }
    }

    /// Run `fut` while holding `key` exclusively
    pub async fn with_exclusive<F, T>(&self, key: ResourceKey, fut: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let _guard = self.acquire(key).await;
        fut.await
    }

    /// Wait for the global outbound-call slot.
    ///
    /// Callers queue on the pacer in arrival order; each departure pushes
    /// the next slot `api_delay` further out.
    pub async fn pace(&self) {
        let mut next = self.next_call.lock().await;
        let now = Instant::now();
        if *next > now {
            tokio::time::sleep_until(*next).await;
        }
        *next = Instant::now() + self.api_delay;
    }

    /// Number of distinct keys ever locked
    pub fn tracked_keys(&self) -> usize {
        self.locks.len()
    }
}

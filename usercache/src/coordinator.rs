//! Generation coordination for cache misses.
//!
//! When several callers miss on the same key at once, only one generation
//! runs; every caller receives the same result.
//!
//! ```text
//! get(K) miss ─┐
//!              │                                  spawned
//! get(K) miss ─┼──► GenerationCoordinator ──────► producer (render + insert)
//!              │          │                          │
//! get(K) miss ─┘          ▼                          ▼
//!                   [all three receive ◄─────── one result]
//! ```
//!
//! # Implementation
//!
//! The pending registry is a `parking_lot::Mutex<HashMap>`: checking for an
//! in-flight generation and registering a new one happen in one critical
//! section, and the lock is never held across an `.await`. The producer runs
//! in its own task, so the caller that started it may walk away without
//! affecting the others. When the last waiter for a key walks away, the
//! generation's `CancellationToken` fires and the registry entry is removed,
//! so a later request starts afresh.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CacheError;
use crate::key::CacheKey;

type GenerationResult<T> = Result<T, CacheError>;
type Registry<T> = Arc<Mutex<HashMap<CacheKey, PendingGeneration<T>>>>;

/// An in-flight generation.
struct PendingGeneration<T> {
    /// Distinguishes this generation from a later one under the same key.
    id: u64,
    sender: broadcast::Sender<GenerationResult<T>>,
    waiters: usize,
    cancel: CancellationToken,
}

/// Value handed back by [`GenerationCoordinator::obtain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obtained<T> {
    pub value: T,
    /// The caller joined a generation started by someone else.
    pub coalesced: bool,
}

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub total_requests: u64,
    /// Requests that waited on an existing generation.
    pub coalesced_requests: u64,
    /// Requests that started a generation.
    pub new_generations: u64,
    pub failed_generations: u64,
    /// Generations abandoned by every waiter.
    pub cancelled_generations: u64,
}

impl CoordinatorStats {
    /// Returns the coalescing ratio (0.0 to 1.0).
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_generations: AtomicU64,
    failed_generations: AtomicU64,
    cancelled_generations: AtomicU64,
}

/// Deduplicates concurrent generations per key.
pub struct GenerationCoordinator<T> {
    pending: Registry<T>,
    next_id: AtomicU64,
    counters: Arc<Counters>,
}

impl<T> GenerationCoordinator<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Obtain the value for `key`, running `producer` only if no generation
    /// for `key` is already in flight.
    ///
    /// `producer` receives the generation's cancellation token, which fires
    /// once every waiter has abandoned the request. A failed generation is
    /// delivered to all current waiters and then forgotten; the next call
    /// starts a new one.
    pub async fn obtain<F, Fut>(
        &self,
        key: &CacheKey,
        producer: F,
    ) -> Result<Obtained<T>, CacheError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = GenerationResult<T>> + Send + 'static,
    {
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);

        let (mut receiver, id, start) = {
            let mut pending = self.pending.lock();
            match pending.entry(key.clone()) {
                Entry::Occupied(mut occupied) => {
                    let generation = occupied.get_mut();
                    generation.waiters += 1;
                    self.counters
                        .coalesced_requests
                        .fetch_add(1, Ordering::Relaxed);
                    debug!(
                        key = %key,
                        waiters = generation.waiters,
                        "Coalescing request - waiting for in-flight generation"
                    );
                    (generation.sender.subscribe(), generation.id, None)
                }
                Entry::Vacant(vacant) => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let (sender, receiver) = broadcast::channel(1);
                    let cancel = CancellationToken::new();
                    vacant.insert(PendingGeneration {
                        id,
                        sender: sender.clone(),
                        waiters: 1,
                        cancel: cancel.clone(),
                    });
                    self.counters
                        .new_generations
                        .fetch_add(1, Ordering::Relaxed);
                    (receiver, id, Some((sender, cancel)))
                }
            }
        };

        let coalesced = start.is_none();
        let _waiter = WaiterGuard {
            pending: Arc::clone(&self.pending),
            counters: Arc::clone(&self.counters),
            key: key.clone(),
            id,
        };

        if let Some((sender, cancel)) = start {
            debug!(key = %key, "New generation - starting producer");
            let work = producer(cancel);
            let slot = CompletionSlot {
                pending: Arc::clone(&self.pending),
                key: key.clone(),
                id,
                sender: Some(sender),
            };
            tokio::spawn(run_generation(work, slot, Arc::clone(&self.counters)));
        }

        match receiver.recv().await {
            Ok(result) => result.map(|value| Obtained { value, coalesced }),
            Err(_) => Err(CacheError::RenderFailure(
                "generation task ended without a result".to_string(),
            )),
        }
    }

    /// Returns the number of keys with a generation in flight.
    pub fn in_flight_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns true if a generation for `key` is in flight.
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.pending.lock().contains_key(key)
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            total_requests: self.counters.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.counters.coalesced_requests.load(Ordering::Relaxed),
            new_generations: self.counters.new_generations.load(Ordering::Relaxed),
            failed_generations: self.counters.failed_generations.load(Ordering::Relaxed),
            cancelled_generations: self.counters.cancelled_generations.load(Ordering::Relaxed),
        }
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            total_requests = stats.total_requests,
            coalesced = stats.coalesced_requests,
            new_generations = stats.new_generations,
            failed = stats.failed_generations,
            cancelled = stats.cancelled_generations,
            in_flight = self.in_flight_count(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Generation coordinator statistics"
        );
    }
}

impl<T> Default for GenerationCoordinator<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

async fn run_generation<T, Fut>(work: Fut, slot: CompletionSlot<T>, counters: Arc<Counters>)
where
    T: Clone + Send + 'static,
    Fut: Future<Output = GenerationResult<T>>,
{
    let result = work.await;
    match &result {
        Ok(_) => {}
        Err(CacheError::Cancelled) => {}
        Err(e) => {
            counters.failed_generations.fetch_add(1, Ordering::Relaxed);
            debug!(key = %slot.key, error = %e, "Generation failed");
        }
    }
    slot.complete(result);
}

/// Publishes a generation's result and retires its registry entry.
///
/// If dropped without completing (the producer panicked), the entry is still
/// retired; waiters then see a closed channel.
struct CompletionSlot<T> {
    pending: Registry<T>,
    key: CacheKey,
    id: u64,
    sender: Option<broadcast::Sender<GenerationResult<T>>>,
}

impl<T> CompletionSlot<T> {
    fn complete(mut self, result: GenerationResult<T>) {
        let mut pending = self.pending.lock();
        retire(&mut pending, &self.key, self.id);
        if let Some(sender) = self.sender.take() {
            let waiters = sender.receiver_count();
            // Sent under the lock: a newcomer either subscribed already or
            // finds no entry and starts afresh.
            let _ = sender.send(result);
            if waiters > 1 {
                debug!(key = %self.key, waiters, "Broadcast result to coalesced waiters");
            }
        }
    }
}

impl<T> Drop for CompletionSlot<T> {
    fn drop(&mut self) {
        if self.sender.is_some() {
            retire(&mut self.pending.lock(), &self.key, self.id);
        }
    }
}

/// Held by each caller while it waits.
struct WaiterGuard<T> {
    pending: Registry<T>,
    counters: Arc<Counters>,
    key: CacheKey,
    id: u64,
}

impl<T> Drop for WaiterGuard<T> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        let Entry::Occupied(mut occupied) = pending.entry(self.key.clone()) else {
            return;
        };
        // Already completed and replaced by a newer generation.
        if occupied.get().id != self.id {
            return;
        }
        let generation = occupied.get_mut();
        generation.waiters = generation.waiters.saturating_sub(1);
        if generation.waiters == 0 {
            let generation = occupied.remove();
            generation.cancel.cancel();
            self.counters
                .cancelled_generations
                .fetch_add(1, Ordering::Relaxed);
            debug!(key = %self.key, "Last waiter left - generation cancelled");
        }
    }
}

fn retire<T>(pending: &mut HashMap<CacheKey, PendingGeneration<T>>, key: &CacheKey, id: u64) {
    if let Entry::Occupied(occupied) = pending.entry(key.clone()) {
        if occupied.get().id == id {
            occupied.remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn key(n: u8) -> CacheKey {
        CacheKey::from_hex(&format!("{:02x}", n).repeat(32)).unwrap()
    }

    #[tokio::test]
    async fn test_single_request_runs_producer() {
        let coordinator = GenerationCoordinator::<u32>::new();

        let obtained = coordinator
            .obtain(&key(1), |_| async { Ok(7) })
            .await
            .unwrap();

        assert_eq!(
            obtained,
            Obtained {
                value: 7,
                coalesced: false
            }
        );
        assert_eq!(coordinator.in_flight_count(), 0);
        assert_eq!(coordinator.stats().new_generations, 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_generation() {
        let coordinator = Arc::new(GenerationCoordinator::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let coordinator = Arc::clone(&coordinator);
            let calls = Arc::clone(&calls);
            let release = Arc::clone(&release);
            handles.push(tokio::spawn(async move {
                coordinator
                    .obtain(&key(1), move |_| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        release.notified().await;
                        Ok(42)
                    })
                    .await
            }));
        }

        while coordinator.stats().total_requests < 10 {
            tokio::task::yield_now().await;
        }
        release.notify_one();

        let mut coalesced = 0;
        for handle in handles {
            let obtained = handle.await.unwrap().unwrap();
            assert_eq!(obtained.value, 42);
            coalesced += obtained.coalesced as usize;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coalesced, 9);
        assert_eq!(coordinator.stats().coalesced_requests, 9);
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_reaches_all_waiters_and_is_not_remembered() {
        let coordinator = Arc::new(GenerationCoordinator::<u32>::new());
        let release = Arc::new(Notify::new());

        let leader = {
            let coordinator = Arc::clone(&coordinator);
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                coordinator
                    .obtain(&key(1), move |_| async move {
                        release.notified().await;
                        Err(CacheError::RenderFailure("boom".to_string()))
                    })
                    .await
            })
        };
        while !coordinator.is_in_flight(&key(1)) {
            tokio::task::yield_now().await;
        }
        let follower = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.obtain(&key(1), |_| async { Ok(0) }).await })
        };
        while coordinator.stats().total_requests < 2 {
            tokio::task::yield_now().await;
        }
        release.notify_one();

        let expected = CacheError::RenderFailure("boom".to_string());
        assert_eq!(leader.await.unwrap().unwrap_err(), expected);
        assert_eq!(follower.await.unwrap().unwrap_err(), expected);
        assert_eq!(coordinator.stats().failed_generations, 1);

        // A later request starts a fresh generation.
        let retry = coordinator
            .obtain(&key(1), |_| async { Ok(5) })
            .await
            .unwrap();
        assert_eq!(retry.value, 5);
        assert!(!retry.coalesced);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_wait_on_each_other() {
        let coordinator = Arc::new(GenerationCoordinator::<u32>::new());
        let never = Arc::new(Notify::new());

        let blocked = {
            let coordinator = Arc::clone(&coordinator);
            let never = Arc::clone(&never);
            tokio::spawn(async move {
                coordinator
                    .obtain(&key(1), move |_| async move {
                        never.notified().await;
                        Ok(1)
                    })
                    .await
            })
        };
        while !coordinator.is_in_flight(&key(1)) {
            tokio::task::yield_now().await;
        }

        let other = tokio::time::timeout(
            Duration::from_secs(5),
            coordinator.obtain(&key(2), |_| async { Ok(2) }),
        )
        .await
        .expect("independent key must not block")
        .unwrap();
        assert_eq!(other.value, 2);

        blocked.abort();
    }

    #[tokio::test]
    async fn test_last_waiter_leaving_cancels_generation() {
        let coordinator = Arc::new(GenerationCoordinator::<u32>::new());
        let observed_cancel = Arc::new(Notify::new());

        let handle = {
            let coordinator = Arc::clone(&coordinator);
            let observed_cancel = Arc::clone(&observed_cancel);
            tokio::spawn(async move {
                coordinator
                    .obtain(&key(1), move |cancel| async move {
                        cancel.cancelled().await;
                        observed_cancel.notify_one();
                        Err(CacheError::Cancelled)
                    })
                    .await
            })
        };
        while !coordinator.is_in_flight(&key(1)) {
            tokio::task::yield_now().await;
        }

        handle.abort();
        let _ = handle.await;

        tokio::time::timeout(Duration::from_secs(5), observed_cancel.notified())
            .await
            .expect("producer should observe cancellation");
        assert_eq!(coordinator.in_flight_count(), 0);
        assert_eq!(coordinator.stats().cancelled_generations, 1);
        assert_eq!(coordinator.stats().failed_generations, 0);
    }

    #[tokio::test]
    async fn test_leader_leaving_does_not_stop_generation_for_others() {
        let coordinator = Arc::new(GenerationCoordinator::<u32>::new());
        let release = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let coordinator = Arc::clone(&coordinator);
            let release = Arc::clone(&release);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                coordinator
                    .obtain(&key(1), move |cancel| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::select! {
                            _ = cancel.cancelled() => Err(CacheError::Cancelled),
                            _ = release.notified() => Ok(9),
                        }
                    })
                    .await
            })
        };
        while !coordinator.is_in_flight(&key(1)) {
            tokio::task::yield_now().await;
        }

        let follower = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.obtain(&key(1), |_| async { Ok(0) }).await })
        };
        while coordinator.stats().total_requests < 2 {
            tokio::task::yield_now().await;
        }

        leader.abort();
        let _ = leader.await;
        release.notify_one();

        let obtained = follower.await.unwrap().unwrap();
        assert_eq!(
            obtained,
            Obtained {
                value: 9,
                coalesced: true
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.stats().cancelled_generations, 0);
    }

    #[tokio::test]
    async fn test_panicking_producer_releases_key() {
        let coordinator = GenerationCoordinator::<u32>::new();

        let err = coordinator
            .obtain(&key(1), |_| async {
                let explode = true;
                if explode {
                    panic!("producer exploded");
                }
                Ok(0)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::RenderFailure(_)));
        assert_eq!(coordinator.in_flight_count(), 0);

        let retry = coordinator
            .obtain(&key(1), |_| async { Ok(3) })
            .await
            .unwrap();
        assert_eq!(retry.value, 3);
    }

    #[test]
    fn test_coalescing_ratio() {
        let stats = CoordinatorStats {
            total_requests: 10,
            coalesced_requests: 4,
            ..Default::default()
        };
        assert!((stats.coalescing_ratio() - 0.4).abs() < f64::EPSILON);
        assert_eq!(CoordinatorStats::default().coalescing_ratio(), 0.0);
    }
}

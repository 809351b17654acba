//! In-process idempotency-key store for the programmatic write endpoint.
//!
//! Reservation is a single check-and-insert under one lock, so two concurrent
//! requests carrying the same key can never both proceed. A reservation that is
//! dropped without [`Reservation::commit`] frees the key again: only requests
//! that completed successfully keep their key.
//!
//! Eviction (size ceiling and TTL) only ever removes committed keys. A key whose
//! request is still in flight stays held until that request commits or drops
//! its reservation.
//!
//! Keys live only in this process's memory. Several replicas behind a load
//! balancer do not share keys.

use crate::services::error::LedgerError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 5000;

#[derive(Debug, Clone, Copy)]
struct Slot {
    stamp: Instant,
    /// Distinguishes successive reservations of the same key.
    generation: u64,
    committed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<String>,
    next_generation: u64,
}

impl Inner {
    fn holds(&self, key: &str, generation: u64) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| slot.generation == generation)
    }

    /// Remove `key` only if it still belongs to the reservation `generation`.
    fn remove_generation(&mut self, key: &str, generation: u64) {
        if self.holds(key, generation) {
            self.slots.remove(key);
            self.order.retain(|k| k != key);
        }
    }

    fn evict_oldest_committed(&mut self, target: usize) -> usize {
        let mut evicted = 0;
        let mut kept = VecDeque::with_capacity(self.order.len());
        while let Some(key) = self.order.pop_front() {
            let in_flight = self.slots.get(&key).is_some_and(|slot| !slot.committed);
            if evicted < target && !in_flight {
                self.slots.remove(&key);
                evicted += 1;
            } else {
                kept.push_back(key);
            }
        }
        self.order = kept;
        evicted
    }
}

#[derive(Debug)]
pub struct IdempotencyCache {
    inner: Mutex<Inner>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }
}

impl IdempotencyCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
            max_entries,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The map holds no invariants a panicking holder could break halfway.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserve `key`, or fail with [`LedgerError::Duplicate`] if it is already held.
    pub fn reserve(self: &Arc<Self>, key: &str) -> Result<Reservation, LedgerError> {
        self.reserve_at(key, Instant::now())
    }

    pub(crate) fn reserve_at(
        self: &Arc<Self>,
        key: &str,
        now: Instant,
    ) -> Result<Reservation, LedgerError> {
        let mut inner = self.lock();
        self.cleanup_locked(&mut inner, now);

        if inner.slots.contains_key(key) {
            debug!(idempotency_key = %key, "Duplicate idempotency key");
            return Err(LedgerError::Duplicate);
        }

        let generation = inner.next_generation;
        inner.next_generation += 1;
        inner.slots.insert(
            key.to_string(),
            Slot {
                stamp: now,
                generation,
                committed: false,
            },
        );
        inner.order.push_back(key.to_string());

        Ok(Reservation {
            cache: Arc::clone(self),
            key: key.to_string(),
            generation,
            committed: false,
        })
    }

    /// Run the eviction pass without reserving anything.
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    pub(crate) fn cleanup_at(&self, now: Instant) {
        let mut inner = self.lock();
        self.cleanup_locked(&mut inner, now);
    }

    fn cleanup_locked(&self, inner: &mut Inner, now: Instant) {
        if inner.slots.len() > self.max_entries {
            let evicted = inner.evict_oldest_committed(inner.slots.len() / 2);
            debug!(evicted, "Idempotency store over capacity, evicted oldest half");
        }

        let ttl = self.ttl;
        let before = inner.slots.len();
        inner.slots.retain(|_, slot| {
            !slot.committed || now.saturating_duration_since(slot.stamp) <= ttl
        });
        if inner.slots.len() != before {
            let Inner { slots, order, .. } = inner;
            order.retain(|k| slots.contains_key(k));
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn commit(&self, key: &str, generation: u64) {
        let mut inner = self.lock();
        if let Some(slot) = inner.slots.get_mut(key) {
            if slot.generation == generation {
                slot.committed = true;
            }
        }
    }

    fn release(&self, key: &str, generation: u64) {
        self.lock().remove_generation(key, generation);
    }
}

/// A held idempotency key. Released on drop unless committed.
#[derive(Debug)]
pub struct Reservation {
    cache: Arc<IdempotencyCache>,
    key: String,
    generation: u64,
    committed: bool,
}

impl Reservation {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Keep the key for the rest of its TTL.
    pub fn commit(mut self) {
        self.cache.commit(&self.key, self.generation);
        self.committed = true;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.committed {
            self.cache.release(&self.key, self.generation);
        }
    }
}

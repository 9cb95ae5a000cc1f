//! Bounded recently-seen-keys cache. A repeat delivery of an already-seen
//! idempotency key is acked without side effects, tolerating redeliveries
//! and handler restarts within the cache's retention window.

use dashmap::DashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use traceledger_core::ids::IdempotencyKey;
use uuid::Uuid;

pub struct IdempotencyCache {
    seen: DashSet<Uuid>,
    order: Mutex<std::collections::VecDeque<Uuid>>,
    capacity: usize,
    len: AtomicUsize,
}

impl IdempotencyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: DashSet::new(),
            order: Mutex::new(std::collections::VecDeque::new()),
            capacity: capacity.max(1),
            len: AtomicUsize::new(0),
        }
    }

    /// Returns `true` if this key has already been seen (a no-op repeat).
    /// Records the key as seen either way.
    pub fn check_and_record(&self, key: IdempotencyKey) -> bool {
        if self.seen.contains(&key.0) {
            return true;
        }
        self.seen.insert(key.0);
        let mut order = self.order.lock().expect("idempotency cache lock poisoned");
        order.push_back(key.0);
        if self.len.fetch_add(1, Ordering::Relaxed) + 1 > self.capacity {
            if let Some(oldest) = order.pop_front() {
                self.seen.remove(&oldest);
                self.len.fetch_sub(1, Ordering::Relaxed);
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_not_a_repeat() {
        let cache = IdempotencyCache::new(10);
        let key = IdempotencyKey::new();
        assert!(!cache.check_and_record(key));
        assert!(cache.check_and_record(key));
    }

    #[test]
    fn capacity_evicts_oldest_entries() {
        let cache = IdempotencyCache::new(2);
        let a = IdempotencyKey::new();
        let b = IdempotencyKey::new();
        let c = IdempotencyKey::new();
        assert!(!cache.check_and_record(a));
        assert!(!cache.check_and_record(b));
        assert!(!cache.check_and_record(c));
        // `a` has been evicted, so it is seen as new again.
        assert!(!cache.check_and_record(a));
    }
}

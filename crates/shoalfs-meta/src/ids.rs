//! Monotonic identifier allocation.
//!
//! Node and chunk ids are process-local counters: they are never persisted
//! on allocation. Every key carrying a fresh id is written synchronously
//! before the id is handed out, so the highest id on disk can never exceed
//! the highest id ever allocated, and recovery re-derives the counters by
//! scanning the tail of each key range at load time.

use crate::error::MetaError;

#[cfg(target_has_atomic = "64")]
mod imp {
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Lock-free counter on targets with 64-bit atomics.
    #[derive(Debug)]
    pub(super) struct Counter(AtomicU64);

    impl Counter {
        pub(super) fn new(value: u64) -> Self {
            Self(AtomicU64::new(value))
        }

        pub(super) fn fetch_inc(&self) -> u64 {
            self.0.fetch_add(1, Ordering::SeqCst)
        }

        pub(super) fn load(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }

        pub(super) fn store(&self, value: u64) {
            self.0.store(value, Ordering::SeqCst);
        }
    }
}

#[cfg(not(target_has_atomic = "64"))]
mod imp {
    use parking_lot::Mutex;

    /// Mutex-guarded fallback for targets without 64-bit atomics.
    #[derive(Debug)]
    pub(super) struct Counter(Mutex<u64>);

    impl Counter {
        pub(super) fn new(value: u64) -> Self {
            Self(Mutex::new(value))
        }

        pub(super) fn fetch_inc(&self) -> u64 {
            let mut guard = self.0.lock();
            let value = *guard;
            *guard += 1;
            value
        }

        pub(super) fn load(&self) -> u64 {
            *self.0.lock()
        }

        pub(super) fn store(&self, value: u64) {
            *self.0.lock() = value;
        }
    }
}

/// A monotonically increasing id allocator with a hard ceiling.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    next: imp::Counter,
    max: u64,
}

impl IdAllocator {
    /// Creates an allocator with the given ceiling. The starting value is
    /// published later, once bootstrap or recovery has determined it.
    pub(crate) fn new(max: u64) -> Self {
        Self {
            next: imp::Counter::new(0),
            max,
        }
    }

    /// Publishes the next id to hand out.
    pub(crate) fn reset(&self, next: u64) {
        self.next.store(next);
    }

    /// Allocates the next id. Ids only grow; crossing the ceiling is an
    /// [`MetaError::IdExhausted`] error.
    pub(crate) fn next(&self) -> Result<u64, MetaError> {
        let id = self.next.fetch_inc();
        if id >= self.max {
            return Err(MetaError::IdExhausted);
        }
        Ok(id)
    }

    /// Returns the next id without allocating it.
    pub(crate) fn current(&self) -> u64 {
        self.next.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_allocation() {
        let alloc = IdAllocator::new(100);
        alloc.reset(1);
        assert_eq!(alloc.next().unwrap(), 1);
        assert_eq!(alloc.next().unwrap(), 2);
        assert_eq!(alloc.next().unwrap(), 3);
        assert_eq!(alloc.current(), 4);
    }

    #[test]
    fn test_exhaustion() {
        let alloc = IdAllocator::new(3);
        alloc.reset(2);
        assert_eq!(alloc.next().unwrap(), 2);
        assert!(matches!(alloc.next(), Err(MetaError::IdExhausted)));
        // once exhausted, stays exhausted
        assert!(matches!(alloc.next(), Err(MetaError::IdExhausted)));
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let alloc = Arc::new(IdAllocator::new(u64::MAX));
        alloc.reset(1);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let alloc = alloc.clone();
            handles.push(std::thread::spawn(move || {
                (0..1000).map(|_| alloc.next().unwrap()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 8000);
    }
}

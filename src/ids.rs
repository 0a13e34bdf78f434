use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide monotonic id sources for one exchange instance.
///
/// Order ids and execution ids are independent 64-bit sequences starting at
/// zero, never reused within a process lifetime. The allocator is shared
/// across every book of the exchange via `Arc`; atomics keep it monotonic
/// even when books are sharded across dispatcher threads.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_order_id: AtomicU64,
    next_execution_id: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next_order_id: AtomicU64::new(0),
            next_execution_id: AtomicU64::new(0),
        }
    }

    pub fn next_order_id(&self) -> u64 {
        self.next_order_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_execution_id(&self) -> u64 {
        self.next_execution_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_sequences_are_independent_and_monotonic() {
        let ids = IdAllocator::new();

        assert_eq!(ids.next_order_id(), 0);
        assert_eq!(ids.next_order_id(), 1);
        assert_eq!(ids.next_execution_id(), 0);
        assert_eq!(ids.next_order_id(), 2);
        assert_eq!(ids.next_execution_id(), 1);
    }

    #[test]
    fn test_shared_allocator_never_duplicates() {
        let ids = Arc::new(IdAllocator::new());
        let mut handles = Vec::new();

        for _ in 0..4 {
            let ids = Arc::clone(&ids);
            handles.push(std::thread::spawn(move || {
                (0..1000).map(|_| ids.next_order_id()).collect::<Vec<_>>()
            }));
        }

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 4000);
    }
}

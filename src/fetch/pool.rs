//! Bounded pool of API position slots.
//!
//! The remote quote service demultiplexes requests over a fixed number of
//! backend execution contexts, addressed by an integer position id. The pool
//! caps concurrent outbound requests at its capacity and hands out the ids as
//! RAII tokens, so a slot always returns to the pool when its request
//! finishes, whatever the completion path.

use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// Pool of `1..=capacity` position slots backed by a bounded channel.
///
/// `acquire` suspends the calling task until a slot frees; waiting tasks are
/// served as slots come back and none waits indefinitely while slots cycle.
#[derive(Debug)]
pub struct PositionPool {
    slots: mpsc::Sender<u32>,
    free: Mutex<mpsc::Receiver<u32>>,
    capacity: usize,
}

/// One borrowed position slot. The slot id goes out on the wire as the
/// `apiPosition` query parameter; the slot returns to the pool exactly once,
/// when the token drops. Double release is unrepresentable.
#[derive(Debug)]
pub struct PositionToken {
    id: u32,
    slots: mpsc::Sender<u32>,
}

impl PositionToken {
    /// Numeric id of the borrowed slot, in `1..=capacity`.
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Drop for PositionToken {
    fn drop(&mut self) {
        // The channel always has room for a token that is currently out.
        let _ = self.slots.try_send(self.id);
    }
}

impl PositionPool {
    /// Create a pool with `capacity` slots, all initially free.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (slots, free) = mpsc::channel(capacity);

        for id in 1..=capacity as u32 {
            slots
                .try_send(id)
                .expect("fresh pool channel has room for every slot");
        }

        Self {
            slots,
            free: Mutex::new(free),
            capacity,
        }
    }

    /// Borrow a slot, waiting until one is free.
    pub async fn acquire(&self) -> PositionToken {
        let mut free = self.free.lock().await;
        let id = free
            .recv()
            .await
            .expect("pool holds a sender, channel never closes");

        PositionToken {
            id,
            slots: self.slots.clone(),
        }
    }

    /// Configured number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free. Borrowed + free always equals capacity.
    pub fn available(&self) -> usize {
        self.slots.max_capacity() - self.slots.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_all_slots_distinct_and_in_range() {
        let pool = PositionPool::new(4);
        let mut held = Vec::new();
        let mut ids = HashSet::new();

        for _ in 0..4 {
            let token = pool.acquire().await;
            assert!((1..=4).contains(&token.id()));
            ids.insert(token.id());
            held.push(token);
        }

        assert_eq!(ids.len(), 4, "every borrowed slot id is distinct");
        assert_eq!(pool.available(), 0);
    }

    #[tokio::test]
    async fn test_acquire_blocks_at_capacity() {
        let pool = Arc::new(PositionPool::new(2));

        let first = pool.acquire().await;
        let _second = pool.acquire().await;

        // Third borrower must wait until a slot frees.
        let blocked = timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(blocked.is_err(), "acquire beyond capacity must suspend");

        drop(first);
        let third = timeout(Duration::from_millis(200), pool.acquire())
            .await
            .expect("acquire resumes once a slot is released");
        assert_eq!(third.id(), 1, "freed slot is handed to the waiter");
    }

    #[tokio::test]
    async fn test_drop_returns_slot() {
        let pool = PositionPool::new(3);
        assert_eq!(pool.available(), 3);

        let token = pool.acquire().await;
        assert_eq!(pool.available(), 2);

        drop(token);
        assert_eq!(pool.available(), 3);
    }

    #[tokio::test]
    async fn test_accounting_over_many_cycles() {
        let pool = Arc::new(PositionPool::new(3));
        let mut handles = Vec::new();

        for _ in 0..30 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                let token = pool.acquire().await;
                tokio::time::sleep(Duration::from_millis(1)).await;
                drop(token);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(pool.available(), pool.capacity());
    }

    #[tokio::test]
    async fn test_zero_capacity_clamped_to_one() {
        let pool = PositionPool::new(0);
        assert_eq!(pool.capacity(), 1);
        let token = pool.acquire().await;
        assert_eq!(token.id(), 1);
    }
}

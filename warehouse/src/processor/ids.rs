use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out fact identifiers. Implementations must stay collision-free when
/// claimed from concurrent tasks; values are opaque beyond uniqueness and
/// monotonic non-decrease per claimer.
pub trait IdGenerator: Send + Sync {
    /// Reserves ids for `len` consecutive rows.
    fn next_block(&self, len: usize) -> Vec<i64>;
}

const BLOCK_CAPACITY: u64 = 1 << 33;

/// Block-and-offset generator: each claim takes the next block index from an
/// atomic counter and ids are `(block << 33) + offset`. Later claims always
/// produce larger ids than earlier ones; ranges are not contiguous.
pub struct PartitionedIdGenerator {
    counter: AtomicU64,
}

impl PartitionedIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for PartitionedIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for PartitionedIdGenerator {
    fn next_block(&self, len: usize) -> Vec<i64> {
        let mut ids = Vec::with_capacity(len);
        let mut remaining = len as u64;
        while remaining > 0 {
            let block = self.counter.fetch_add(1, Ordering::SeqCst);
            let base = (block * BLOCK_CAPACITY) as i64;
            let take = remaining.min(BLOCK_CAPACITY);
            ids.extend((0..take).map(|offset| base + offset as i64));
            remaining -= take;
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_blocks_are_unique_and_monotonic() {
        let generator = PartitionedIdGenerator::new();

        let first = generator.next_block(3);
        let second = generator.next_block(2);

        assert_eq!(first, vec![0, 1, 2]);
        assert_eq!(second, vec![8589934592, 8589934593]);
        assert!(second[0] > *first.last().unwrap());
    }

    #[test]
    fn test_ids_within_a_block_ascend() {
        let generator = PartitionedIdGenerator::new();
        let ids = generator.next_block(100);

        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_empty_claim_is_empty() {
        let generator = PartitionedIdGenerator::new();
        assert!(generator.next_block(0).is_empty());
    }

    #[test]
    fn test_concurrent_claims_never_collide() {
        let generator = Arc::new(PartitionedIdGenerator::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || {
                    let mut claimed = Vec::new();
                    for _ in 0..50 {
                        claimed.extend(generator.next_block(10));
                    }
                    claimed
                })
            })
            .collect();

        let mut all = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for id in handle.join().unwrap() {
                all.insert(id);
                total += 1;
            }
        }

        assert_eq!(total, 8 * 50 * 10);
        assert_eq!(all.len(), total);
    }
}

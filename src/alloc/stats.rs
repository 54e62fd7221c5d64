use crate::heap::HeapPoolKey;

/// Occupancy of one heap pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub key: HeapPoolKey,
    pub heap_count: usize,
    pub heap_bytes: u64,
    pub free_bytes: u64,
    pub free_blocks: usize,
    pub largest_free_block: u64,
}

impl PoolStats {
    #[must_use]
    pub const fn used_bytes(&self) -> u64 {
        self.heap_bytes - self.free_bytes
    }
}

/// Snapshot of an allocator's bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    pub pools: Vec<PoolStats>,
    /// Live placed resources, including the native buffers behind arenas.
    pub placed: usize,
    pub committed: usize,
    pub committed_bytes: u64,
    pub aliases: usize,
    pub sub_buffers: usize,
    pub arenas: usize,
    /// Committed resources evicted on release and not yet destroyed.
    pub evicted: usize,
}

impl AllocatorStats {
    #[must_use]
    pub fn heap_count(&self) -> usize {
        self.pools.iter().map(|p| p.heap_count).sum()
    }

    #[must_use]
    pub fn heap_bytes(&self) -> u64 {
        self.pools.iter().map(|p| p.heap_bytes).sum()
    }

    #[must_use]
    pub fn free_bytes(&self) -> u64 {
        self.pools.iter().map(|p| p.free_bytes).sum()
    }

    #[must_use]
    pub fn largest_free_block(&self) -> u64 {
        self.pools
            .iter()
            .map(|p| p.largest_free_block)
            .max()
            .unwrap_or(0)
    }
}

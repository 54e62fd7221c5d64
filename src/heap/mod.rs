pub mod free_list;
pub mod pool;

use std::cmp::Ordering;

/// A contiguous byte range inside one heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapBlock {
    pub offset: u64,
    pub size: u64,
}

impl HeapBlock {
    #[must_use]
    pub const fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// One past the last byte of the block.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset + self.size
    }

    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }

    /// Size-only ordering for reports. Blocks of equal size compare equal here
    /// even when their offsets differ, so this is not `Ord`.
    #[must_use]
    pub fn by_size(a: &Self, b: &Self) -> Ordering {
        a.size.cmp(&b.size)
    }
}

/// Strategy for carving sub-ranges out of a fixed-size range.
pub trait Suballocator {
    /// Reserve `size` bytes whose offset is a multiple of `align`.
    fn allocate(&mut self, size: u64, align: u64) -> Option<HeapBlock>;

    /// Give a previously reserved block back.
    fn free(&mut self, block: HeapBlock);

    /// Total size of the managed range.
    fn capacity(&self) -> u64;

    /// Bytes currently available.
    fn free_bytes(&self) -> u64;
}

pub use free_list::FreeList;
pub use pool::{AllocatorHeap, HeapPoolKey, HeapPoolRegistry, HeapSizes};

//! Packing of small buffers into shared native buffers.

use crate::heap::{FreeList, HeapBlock, Suballocator};
use crate::native::desc::{CONSTANT_BUFFER_ALIGNMENT, ResourceHandle};
use crate::utils::align_up;

/// One native buffer handing out sub-ranges to small buffers.
#[derive(Debug)]
pub(crate) struct BufferArena {
    pub(crate) resource: ResourceHandle,
    free: FreeList,
}

impl BufferArena {
    pub(crate) fn new(resource: ResourceHandle, size: u64, coalesce: bool) -> Self {
        Self {
            resource,
            free: FreeList::new(size).with_coalescing(coalesce),
        }
    }

    /// Sub-range size used for a buffer of `length` bytes.
    pub(crate) const fn slot_size(length: u64) -> u64 {
        align_up(length, CONSTANT_BUFFER_ALIGNMENT)
    }

    pub(crate) fn allocate(&mut self, length: u64, verify: bool) -> Option<HeapBlock> {
        let block = self
            .free
            .allocate(Self::slot_size(length), CONSTANT_BUFFER_ALIGNMENT)?;
        if verify {
            self.free.assert_consistent("buffer arena");
        }
        Some(block)
    }

    pub(crate) fn free(&mut self, block: HeapBlock, verify: bool) {
        self.free.free(block);
        if verify {
            self.free.assert_consistent("buffer arena");
        }
    }

    pub(crate) const fn free_list(&self) -> &FreeList {
        &self.free
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::KIB;

    fn arena(size: u64) -> BufferArena {
        BufferArena::new(ResourceHandle(7), size, false)
    }

    #[test]
    fn sub_buffers_are_constant_buffer_aligned() {
        let mut arena = arena(4 * KIB);
        let a = arena.allocate(100, true).unwrap();
        let b = arena.allocate(300, true).unwrap();

        assert_eq!(a, HeapBlock::new(0, 256));
        assert_eq!(b, HeapBlock::new(256, 512));
        assert_eq!(arena.free_list().free_bytes(), 4 * KIB - 768);
    }

    #[test]
    fn full_arena_refuses_and_recovers() {
        let mut arena = arena(KIB);
        let blocks: Vec<_> = (0..4).map(|_| arena.allocate(256, true).unwrap()).collect();
        assert!(arena.allocate(1, true).is_none());

        arena.free(blocks[2], true);
        assert_eq!(arena.allocate(200, true), Some(blocks[2]));
    }
}

use super::{HeapBlock, Suballocator};
use crate::utils::{checked_align_up, is_aligned};

/// Free ranges of one heap, kept in insertion order.
///
/// Blocks are carved first-fit: a newest-first pass looks for a block that is
/// already aligned, then an oldest-first pass aligns candidates by hand. Split
/// leftovers are appended, so they are the first candidates of the next
/// newest-first pass.
#[derive(Debug, Clone)]
pub struct FreeList {
    capacity: u64,
    blocks: Vec<HeapBlock>,
    coalesce: bool,
}

impl FreeList {
    /// A free list covering `[0, capacity)` as a single block.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        let blocks = if capacity == 0 {
            Vec::new()
        } else {
            vec![HeapBlock::new(0, capacity)]
        };
        Self {
            capacity,
            blocks,
            coalesce: false,
        }
    }

    /// Merge returned blocks with adjacent free neighbours.
    #[must_use]
    pub const fn with_coalescing(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    #[must_use]
    pub fn blocks(&self) -> &[HeapBlock] {
        &self.blocks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn largest_block(&self) -> u64 {
        self.blocks.iter().map(|b| b.size).max().unwrap_or(0)
    }

    /// Locate a block able to hold `size` bytes at `align`.
    ///
    /// Returns the block's index and the aligned offset inside it.
    #[must_use]
    pub fn find(&self, size: u64, align: u64) -> Option<(usize, u64)> {
        let aligned_fit = self
            .blocks
            .iter()
            .enumerate()
            .rev()
            .find(|(_, b)| is_aligned(b.offset, align) && b.size >= size);
        if let Some((index, block)) = aligned_fit {
            return Some((index, block.offset));
        }

        self.blocks.iter().enumerate().find_map(|(index, b)| {
            let aligned_offset = checked_align_up(b.offset, align)?;
            let padding = aligned_offset - b.offset;
            (padding <= b.size && b.size - padding >= size).then_some((index, aligned_offset))
        })
    }

    /// Split the block at `index`, handing out `[aligned_offset, aligned_offset + size)`.
    fn carve(&mut self, index: usize, aligned_offset: u64, size: u64) -> HeapBlock {
        let block = self.blocks.remove(index);
        let padding = aligned_offset - block.offset;
        let trailing = block.size - padding - size;

        if padding > 0 {
            self.blocks.push(HeapBlock::new(block.offset, padding));
        }
        if trailing > 0 {
            self.blocks.push(HeapBlock::new(aligned_offset + size, trailing));
        }

        HeapBlock::new(aligned_offset, size)
    }

    /// Check that blocks are non-empty, in bounds, unique and disjoint.
    ///
    /// # Errors
    /// Returns a description of the first violation found.
    pub fn verify(&self) -> Result<(), String> {
        let mut sorted = self.blocks.clone();
        sorted.sort_by_key(|b| (b.offset, b.size));

        for block in &sorted {
            if block.size == 0 {
                return Err(format!("empty block at offset {}", block.offset));
            }
            if block.end() > self.capacity {
                return Err(format!(
                    "block {block:?} exceeds heap size {}",
                    self.capacity
                ));
            }
        }

        for pair in sorted.windows(2) {
            if pair[0] == pair[1] {
                return Err(format!("duplicate block {:?}", pair[0]));
            }
            if pair[0].overlaps(&pair[1]) {
                return Err(format!("blocks {:?} and {:?} overlap", pair[0], pair[1]));
            }
        }
        Ok(())
    }

    /// Like [`FreeList::verify`] but aborts on corruption.
    ///
    /// # Panics
    /// Panics when the free list is inconsistent.
    pub fn assert_consistent(&self, context: &str) {
        if let Err(e) = self.verify() {
            log::error!("{context}: free list corrupted: {e}");
            panic!("{context}: free list corrupted: {e}");
        }
    }
}

impl Suballocator for FreeList {
    fn allocate(&mut self, size: u64, align: u64) -> Option<HeapBlock> {
        if size == 0 || !align.is_power_of_two() {
            return None;
        }
        let (index, aligned_offset) = self.find(size, align)?;
        Some(self.carve(index, aligned_offset, size))
    }

    fn free(&mut self, block: HeapBlock) {
        if block.size == 0 {
            return;
        }
        if !self.coalesce {
            // TODO: defragment long-lived heaps instead of relying on opt-in coalescing.
            self.blocks.push(block);
            return;
        }

        let mut merged = block;
        if let Some(pos) = self.blocks.iter().position(|b| b.end() == merged.offset) {
            let prev = self.blocks.remove(pos);
            merged = HeapBlock::new(prev.offset, prev.size + merged.size);
        }
        if let Some(pos) = self.blocks.iter().position(|b| b.offset == merged.end()) {
            let next = self.blocks.remove(pos);
            merged = HeapBlock::new(merged.offset, merged.size + next.size);
        }
        self.blocks.push(merged);
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn free_bytes(&self) -> u64 {
        self.blocks.iter().map(|b| b.size).sum()
    }
}

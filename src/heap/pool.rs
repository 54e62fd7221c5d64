use super::{FreeList, HeapBlock, Suballocator};
use crate::error::AllocResult;
use crate::native::desc::{AccessClass, AlignmentClass, HeapDesc, HeapHandle, ResourceCategory};
use crate::native::device::NativeDevice;
use crate::utils::{DEFAULT_ALIGNMENT, MIB, MSAA_ALIGNMENT, align_up, format_bytes};

/// One native heap paired with the bookkeeping of its free space.
#[derive(Debug)]
pub struct AllocatorHeap {
    heap: HeapHandle,
    alignment: u64,
    free: FreeList,
}

impl AllocatorHeap {
    #[must_use]
    pub fn new(heap: HeapHandle, size: u64, alignment: u64, coalesce: bool) -> Self {
        Self {
            heap,
            alignment,
            free: FreeList::new(size).with_coalescing(coalesce),
        }
    }

    #[must_use]
    pub const fn handle(&self) -> HeapHandle {
        self.heap
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.free.capacity()
    }

    #[must_use]
    pub const fn alignment(&self) -> u64 {
        self.alignment
    }

    #[must_use]
    pub const fn free_list(&self) -> &FreeList {
        &self.free
    }
}

/// Identifies a pool of interchangeable heaps.
///
/// `alignment` is only set on devices without merged heap support, where heaps
/// are additionally partitioned by alignment tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapPoolKey {
    pub access: AccessClass,
    pub category: ResourceCategory,
    pub alignment: Option<AlignmentClass>,
}

impl HeapPoolKey {
    const ALIGNMENT_SLOTS: usize = AlignmentClass::ALL.len() + 1;
    const SLOTS: usize =
        AccessClass::ALL.len() * ResourceCategory::ALL.len() * Self::ALIGNMENT_SLOTS;

    const fn slot(self) -> usize {
        let alignment = match self.alignment {
            Some(class) => class.index() + 1,
            None => 0,
        };
        (self.access.index() * ResourceCategory::ALL.len() + self.category.index())
            * Self::ALIGNMENT_SLOTS
            + alignment
    }

    /// Alignment of heaps created for this pool.
    #[must_use]
    pub const fn heap_alignment(self) -> u64 {
        match self.alignment {
            Some(AlignmentClass::Large) => MSAA_ALIGNMENT,
            Some(_) => DEFAULT_ALIGNMENT,
            None => match self.category {
                ResourceCategory::TargetTexture => MSAA_ALIGNMENT,
                _ => DEFAULT_ALIGNMENT,
            },
        }
    }
}

/// Default size of a freshly grown heap, per pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapSizes {
    pub upload_readback: u64,
    pub buffers: u64,
    pub target_textures: u64,
    pub textures: u64,
    pub acceleration_structures: u64,
}

impl Default for HeapSizes {
    fn default() -> Self {
        Self {
            upload_readback: 32 * MIB,
            buffers: 64 * MIB,
            target_textures: 128 * MIB,
            textures: 256 * MIB,
            acceleration_structures: 64 * MIB,
        }
    }
}

impl HeapSizes {
    #[must_use]
    pub const fn for_key(&self, key: HeapPoolKey) -> u64 {
        match (key.access, key.category) {
            (AccessClass::Upload | AccessClass::Readback, _) => self.upload_readback,
            (_, ResourceCategory::Buffer) => self.buffers,
            (_, ResourceCategory::TargetTexture) => self.target_textures,
            (_, ResourceCategory::Texture) => self.textures,
            (_, ResourceCategory::AccelerationStructure) => self.acceleration_structures,
        }
    }
}

#[derive(Debug)]
struct HeapPool {
    key: HeapPoolKey,
    heaps: Vec<AllocatorHeap>,
}

/// All heap pools of one allocator, stored as a flat table indexed by key.
#[derive(Debug)]
pub struct HeapPoolRegistry {
    pools: Vec<HeapPool>,
    merged_heaps: bool,
    coalesce: bool,
    verify: bool,
}

impl HeapPoolRegistry {
    #[must_use]
    pub fn new(merged_heaps: bool, coalesce: bool, verify: bool) -> Self {
        let mut pools = Vec::with_capacity(HeapPoolKey::SLOTS);
        for access in AccessClass::ALL {
            for category in ResourceCategory::ALL {
                let alignments =
                    std::iter::once(None).chain(AlignmentClass::ALL.into_iter().map(Some));
                for alignment in alignments {
                    pools.push(HeapPool {
                        key: HeapPoolKey {
                            access,
                            category,
                            alignment,
                        },
                        heaps: Vec::new(),
                    });
                }
            }
        }
        debug_assert!(pools.iter().enumerate().all(|(i, p)| p.key.slot() == i));

        Self {
            pools,
            merged_heaps,
            coalesce,
            verify,
        }
    }

    /// Pool key for a request, dropping the alignment tier on merged-heap devices.
    #[must_use]
    pub const fn key_for(
        &self,
        access: AccessClass,
        category: ResourceCategory,
        alignment: u64,
    ) -> HeapPoolKey {
        HeapPoolKey {
            access,
            category,
            alignment: if self.merged_heaps {
                None
            } else {
                Some(AlignmentClass::for_alignment(alignment))
            },
        }
    }

    #[must_use]
    pub fn heaps(&self, key: HeapPoolKey) -> &[AllocatorHeap] {
        &self.pools[key.slot()].heaps
    }

    #[must_use]
    pub fn heap(&self, key: HeapPoolKey, index: u32) -> Option<&AllocatorHeap> {
        self.heaps(key).get(index as usize)
    }

    /// Non-empty pools.
    pub fn iter(&self) -> impl Iterator<Item = (HeapPoolKey, &[AllocatorHeap])> {
        self.pools
            .iter()
            .filter(|p| !p.heaps.is_empty())
            .map(|p| (p.key, p.heaps.as_slice()))
    }

    /// Carve a block from the first heap of the pool that can hold it.
    pub fn allocate(&mut self, key: HeapPoolKey, size: u64, align: u64) -> Option<(u32, HeapBlock)> {
        let verify = self.verify;
        let pool = &mut self.pools[key.slot()];
        pool.heaps.iter_mut().enumerate().find_map(|(index, heap)| {
            let block = heap.free.allocate(size, align)?;
            if verify {
                heap.free.assert_consistent(&format!("{key:?} heap {index}"));
            }
            Some((index as u32, block))
        })
    }

    /// Carve a block from one specific heap.
    pub fn allocate_in(
        &mut self,
        key: HeapPoolKey,
        index: u32,
        size: u64,
        align: u64,
    ) -> Option<HeapBlock> {
        let verify = self.verify;
        let heap = self.pools[key.slot()].heaps.get_mut(index as usize)?;
        let block = heap.free.allocate(size, align)?;
        if verify {
            heap.free.assert_consistent(&format!("{key:?} heap {index}"));
        }
        Some(block)
    }

    /// Return a block to the heap it was carved from.
    ///
    /// # Panics
    /// Panics if `index` does not name a heap of the pool.
    pub fn free(&mut self, key: HeapPoolKey, index: u32, block: HeapBlock) {
        let verify = self.verify;
        let heap = &mut self.pools[key.slot()].heaps[index as usize];
        heap.free.free(block);
        if verify {
            heap.free.assert_consistent(&format!("{key:?} heap {index}"));
        }
    }

    /// Size of the heap that growing the pool for a `required`-byte request creates.
    #[must_use]
    pub fn growth_size(key: HeapPoolKey, required: u64, sizes: &HeapSizes) -> u64 {
        sizes
            .for_key(key)
            .max(align_up(required, key.heap_alignment()))
    }

    /// Create one more heap for `key`, large enough for `required` bytes.
    ///
    /// Existing heaps of the pool are left untouched.
    ///
    /// # Errors
    /// Propagates the native heap creation failure.
    pub fn grow(
        &mut self,
        device: &dyn NativeDevice,
        key: HeapPoolKey,
        required: u64,
        sizes: &HeapSizes,
    ) -> AllocResult<u32> {
        let size = Self::growth_size(key, required, sizes);
        let alignment = key.heap_alignment();
        let handle = device.create_heap(&HeapDesc {
            size,
            alignment,
            access: key.access,
            category: if self.merged_heaps {
                None
            } else {
                Some(key.category)
            },
        })?;

        let pool = &mut self.pools[key.slot()];
        pool.heaps
            .push(AllocatorHeap::new(handle, size, alignment, self.coalesce));
        let index = (pool.heaps.len() - 1) as u32;

        log::debug!(
            "Created heap {handle:?} for {key:?}: {} aligned to {} (pool now has {} heaps)",
            format_bytes(size),
            format_bytes(alignment),
            pool.heaps.len()
        );
        Ok(index)
    }

    /// Destroy the newest heap of `key`, undoing a growth whose heap cannot be used.
    pub fn discard_newest(&mut self, device: &dyn NativeDevice, key: HeapPoolKey) {
        if let Some(heap) = self.pools[key.slot()].heaps.pop() {
            log::debug!("Discarding heap {:?} of {key:?}", heap.heap);
            device.destroy_heap(heap.heap);
        }
    }

    /// Check every free list.
    ///
    /// # Errors
    /// Returns the first inconsistency found, naming its pool and heap.
    pub fn verify_all(&self) -> Result<(), String> {
        for (key, heaps) in self.iter() {
            for (index, heap) in heaps.iter().enumerate() {
                heap.free
                    .verify()
                    .map_err(|e| format!("{key:?} heap {index}: {e}"))?;
            }
        }
        Ok(())
    }

    /// Destroy every native heap. Used on allocator teardown.
    pub fn destroy_all(&mut self, device: &dyn NativeDevice) {
        for pool in &mut self.pools {
            for heap in pool.heaps.drain(..) {
                device.destroy_heap(heap.heap);
            }
        }
    }
}

#![allow(clippy::cast_possible_truncation)]

use crate::alloc::arena::BufferArena;
use crate::alloc::config::AllocatorConfig;
use crate::alloc::descriptor::InternalAllocDescriptor;
use crate::alloc::flags::AllocFlags;
use crate::alloc::resource::{
    AllocationId, Buffer, Lease, RaytracingAccelerationStructure, Releasable, Texture,
};
use crate::alloc::stats::{AllocatorStats, PoolStats};
use crate::alloc::strategy::{DefaultPlacementPolicy, PlacementPolicy};
use crate::error::{AllocError, AllocResult};
use crate::heap::{AllocatorHeap, HeapBlock, HeapPoolKey, HeapPoolRegistry, Suballocator};
use crate::native::desc::{
    AccessClass, RAYTRACING_ACCELERATION_STRUCTURE_ALIGNMENT, RaytracingPrebuildInfo,
    ResourceCategory, ResourceDesc, ResourceFlags, ResourceHandle, ResourceState,
};
use crate::native::device::NativeDevice;
use crate::utils::{checked_align_up, format_bytes, is_aligned};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ALLOCATOR_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Where the memory of a live allocation comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    /// A block carved from one heap of a pool.
    Placed {
        key: HeapPoolKey,
        heap_index: u32,
        block: HeapBlock,
    },
    /// A dedicated implicit heap.
    Committed,
    /// A range inside a shared arena buffer.
    SubBuffer {
        access: AccessClass,
        arena: u32,
        block: HeapBlock,
    },
    /// A second resource over the block of allocation `of`.
    Alias {
        of: AllocationId,
        key: HeapPoolKey,
        heap_index: u32,
        offset: u64,
    },
}

/// Per-resource bookkeeping, keyed by [`AllocationId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationInfo {
    pub backing: Backing,
    pub resource: ResourceHandle,
    pub access: AccessClass,
    pub size: u64,
    pub alignment: u64,
    pub flags: AllocFlags,
    /// Owned by the allocator itself (arena buffers).
    pub(crate) internal: bool,
}

impl AllocationInfo {
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self.backing, Backing::Committed)
    }

    /// Heap index for placed and aliased resources.
    #[must_use]
    pub const fn heap_index(&self) -> Option<u32> {
        match self.backing {
            Backing::Placed { heap_index, .. } | Backing::Alias { heap_index, .. } => {
                Some(heap_index)
            }
            Backing::Committed | Backing::SubBuffer { .. } => None,
        }
    }

    /// Byte offset inside the heap (or arena buffer).
    #[must_use]
    pub const fn offset(&self) -> Option<u64> {
        match self.backing {
            Backing::Placed { block, .. } | Backing::SubBuffer { block, .. } => Some(block.offset),
            Backing::Alias { offset, .. } => Some(offset),
            Backing::Committed => None,
        }
    }
}

#[derive(Debug)]
struct AllocatorState {
    token: u64,
    pools: HeapPoolRegistry,
    arenas: [Vec<BufferArena>; 3],
    allocations: HashMap<AllocationId, AllocationInfo>,
    next_id: u64,
    committed_bytes: u64,
    evicted: Vec<ResourceHandle>,
}

impl AllocatorState {
    fn insert(&mut self, info: AllocationInfo) -> AllocationId {
        self.next_id += 1;
        let id = AllocationId {
            allocator: self.token,
            serial: self.next_id,
        };
        self.allocations.insert(id, info);
        id
    }

    /// Follow alias links down to the allocation that owns the memory.
    fn owner_of(&self, mut id: AllocationId) -> AllocResult<(AllocationId, AllocationInfo)> {
        loop {
            let info = self
                .allocations
                .get(&id)
                .ok_or_else(|| AllocError::invalid("aliased resource has already been released"))?;
            match info.backing {
                Backing::Alias { of, .. } => id = of,
                _ => return Ok((id, *info)),
            }
        }
    }
}

/// Result of the placement machinery for one request.
struct Placement {
    id: AllocationId,
    resource: ResourceHandle,
    /// Offset inside `resource` (non-zero only for sub-buffers).
    offset: u64,
}

pub(crate) struct AllocatorShared {
    token: u64,
    device: Arc<dyn NativeDevice>,
    policy: Box<dyn PlacementPolicy>,
    config: AllocatorConfig,
    state: Mutex<AllocatorState>,
}

impl AllocatorShared {
    /// Id of a live handle, refusing handles issued by another allocator.
    fn resolve(&self, resource: &dyn Releasable) -> AllocResult<AllocationId> {
        let id = resource
            .allocation_id()
            .ok_or_else(|| AllocError::invalid("resource has already been released"))?;
        if id.allocator != self.token {
            return Err(AllocError::invalid(
                "resource belongs to a different allocator",
            ));
        }
        Ok(id)
    }

    // ===========================================================================================
    // Allocation
    // ===========================================================================================

    fn allocate(&self, request: &InternalAllocDescriptor) -> AllocResult<Placement> {
        let placement = if self.wants_sub_buffer(request) {
            self.allocate_sub_buffer(request)?
        } else {
            self.allocate_resource(request, false)?
        };

        if self.config.debug.log_allocations {
            log::trace!(
                "Allocated {:?}: {} ({:?}, {:?}) as {:?}",
                placement.id,
                format_bytes(request.required_size),
                request.access,
                request.category(),
                placement.resource
            );
        }
        Ok(placement)
    }

    fn arena_state(access: AccessClass) -> ResourceState {
        access.forced_state().unwrap_or(ResourceState::Common)
    }

    fn wants_sub_buffer(&self, request: &InternalAllocDescriptor) -> bool {
        request.desc.is_buffer()
            && request.suballocation_candidate
            && !request.flags.no_buffer_suballocation
            && !request.flags.force_committed
            && request.required_size < self.config.small_buffer_threshold
            && BufferArena::slot_size(request.required_size) <= self.config.arena_size
            && request.initial_state == Self::arena_state(request.access)
    }

    /// Committed-or-placed decision for a whole native resource.
    fn allocate_resource(
        &self,
        request: &InternalAllocDescriptor,
        internal: bool,
    ) -> AllocResult<Placement> {
        let caps = self.device.capabilities();
        let committed = request.flags.force_committed
            || (!request.flags.force_not_committed && self.policy.prefer_committed(request, caps));
        if committed {
            return self.allocate_committed(request, internal);
        }

        let key = self.state.lock().pools.key_for(
            request.access,
            request.category(),
            request.required_alignment,
        );

        if request.required_alignment > key.heap_alignment() {
            if request.flags.force_not_committed {
                return Err(AllocError::invalid(format!(
                    "alignment {} exceeds heap alignment {}",
                    request.required_alignment,
                    key.heap_alignment()
                )));
            }
            return self.allocate_committed(request, internal);
        }

        let fits_a_heap = checked_align_up(request.required_size, key.heap_alignment())
            .is_some_and(|size| size <= self.config.max_heap_size);
        if !fits_a_heap {
            if request.flags.force_not_committed {
                return Err(AllocError::InsufficientMemory {
                    requested: request.required_size,
                    max_heap_size: self.config.max_heap_size,
                });
            }
            log::debug!(
                "{} exceeds the maximum heap size of {}, falling back to a committed resource",
                format_bytes(request.required_size),
                format_bytes(self.config.max_heap_size)
            );
            return self.allocate_committed(request, internal);
        }

        self.allocate_placed(key, request, internal)
    }

    fn allocate_placed(
        &self,
        key: HeapPoolKey,
        request: &InternalAllocDescriptor,
        internal: bool,
    ) -> AllocResult<Placement> {
        let size = request.required_size;
        let align = request.required_alignment;

        let (heap_index, heap, block) = {
            let mut state = self.state.lock();
            let (index, block) = match state.pools.allocate(key, size, align) {
                Some(hit) => hit,
                None => {
                    let index = state.pools.grow(
                        self.device.as_ref(),
                        key,
                        size,
                        &self.config.heap_sizes,
                    )?;
                    let Some(block) = state.pools.allocate_in(key, index, size, align) else {
                        state.pools.discard_newest(self.device.as_ref(), key);
                        return Err(AllocError::InternalConsistency(format!(
                            "fresh {key:?} heap cannot hold {} aligned to {align}",
                            format_bytes(size)
                        )));
                    };
                    (index, block)
                }
            };
            let heap = state
                .pools
                .heap(key, index)
                .map(AllocatorHeap::handle)
                .ok_or_else(|| AllocError::InternalConsistency(format!("{key:?} lost heap {index}")))?;
            (index, heap, block)
        };

        let resource = match self.device.create_placed_resource(
            heap,
            block.offset,
            &request.desc,
            request.initial_state,
        ) {
            Ok(resource) => resource,
            Err(e) => {
                self.state.lock().pools.free(key, heap_index, block);
                return Err(e);
            }
        };

        let id = self.state.lock().insert(AllocationInfo {
            backing: Backing::Placed {
                key,
                heap_index,
                block,
            },
            resource,
            access: request.access,
            size: block.size,
            alignment: align,
            flags: request.flags,
            internal,
        });
        Ok(Placement {
            id,
            resource,
            offset: 0,
        })
    }

    fn allocate_committed(
        &self,
        request: &InternalAllocDescriptor,
        internal: bool,
    ) -> AllocResult<Placement> {
        let resource = self.device.create_committed_resource(
            request.access,
            &request.desc,
            request.initial_state,
        )?;

        let mut state = self.state.lock();
        state.committed_bytes += request.required_size;
        let id = state.insert(AllocationInfo {
            backing: Backing::Committed,
            resource,
            access: request.access,
            size: request.required_size,
            alignment: request.required_alignment,
            flags: request.flags,
            internal,
        });
        Ok(Placement {
            id,
            resource,
            offset: 0,
        })
    }

    fn allocate_sub_buffer(&self, request: &InternalAllocDescriptor) -> AllocResult<Placement> {
        let slot = request.access.index();
        let verify = self.config.verify_heaps;
        let length = request.required_size;

        let record = |state: &mut AllocatorState, arena: usize, block: HeapBlock| {
            let resource = state.arenas[slot][arena].resource;
            let id = state.insert(AllocationInfo {
                backing: Backing::SubBuffer {
                    access: request.access,
                    arena: arena as u32,
                    block,
                },
                resource,
                access: request.access,
                size: block.size,
                alignment: request.required_alignment,
                flags: request.flags,
                internal: false,
            });
            Placement {
                id,
                resource,
                offset: block.offset,
            }
        };

        {
            let mut state = self.state.lock();
            let hit = state.arenas[slot]
                .iter_mut()
                .enumerate()
                .find_map(|(i, arena)| arena.allocate(length, verify).map(|b| (i, b)));
            if let Some((arena, block)) = hit {
                return Ok(record(&mut *state, arena, block));
            }
        }

        let arena_size = self.config.arena_size;
        let arena_request = InternalAllocDescriptor {
            desc: ResourceDesc::buffer(arena_size, ResourceFlags::NONE),
            access: request.access,
            initial_state: Self::arena_state(request.access),
            flags: AllocFlags::NONE.no_buffer_suballocation(),
            required_size: arena_size,
            required_alignment: self.device.capabilities().buffer_placement_alignment,
            suballocation_candidate: false,
        };
        let backing = self.allocate_resource(&arena_request, true)?;

        let mut state = self.state.lock();
        let mut arena =
            BufferArena::new(backing.resource, arena_size, self.config.coalesce_on_return);
        let block = arena.allocate(length, verify).ok_or_else(|| {
            AllocError::InternalConsistency(format!("fresh arena cannot hold {length} bytes"))
        })?;
        state.arenas[slot].push(arena);
        let index = state.arenas[slot].len() - 1;
        log::debug!(
            "Created {} buffer arena {index} for {:?}",
            format_bytes(arena_size),
            request.access
        );
        Ok(record(&mut *state, index, block))
    }

    // ===========================================================================================
    // Aliasing
    // ===========================================================================================

    fn allocate_alias(
        &self,
        existing: &dyn Releasable,
        build: impl FnOnce(AccessClass) -> AllocResult<InternalAllocDescriptor>,
    ) -> AllocResult<Placement> {
        let existing = self.resolve(existing)?;

        let (owner, key, heap_index, block, heap) = {
            let state = self.state.lock();
            let (owner, info) = state.owner_of(existing)?;
            let (key, heap_index, block) = match info.backing {
                Backing::Placed {
                    key,
                    heap_index,
                    block,
                } => (key, heap_index, block),
                Backing::Committed => {
                    return Err(AllocError::invalid("cannot alias a committed resource"));
                }
                Backing::SubBuffer { .. } | Backing::Alias { .. } => {
                    return Err(AllocError::invalid("cannot alias a suballocated buffer"));
                }
            };
            let heap = state
                .pools
                .heap(key, heap_index)
                .map(AllocatorHeap::handle)
                .ok_or_else(|| {
                    AllocError::InternalConsistency(format!("{key:?} lost heap {heap_index}"))
                })?;
            (owner, key, heap_index, block, heap)
        };

        let request = build(key.access)?;
        if request.flags.force_committed {
            return Err(AllocError::invalid("an alias cannot be committed"));
        }
        if request.access != key.access {
            return Err(AllocError::invalid(format!(
                "cannot alias {:?} memory as {:?}",
                key.access, request.access
            )));
        }
        if request.required_size > block.size {
            return Err(AllocError::AliasExceedsBlock {
                required: request.required_size,
                available: block.size,
            });
        }
        if request.required_alignment > key.heap_alignment()
            || !is_aligned(block.offset, request.required_alignment)
        {
            return Err(AllocError::invalid(format!(
                "block at offset {} is not aligned to {}",
                block.offset, request.required_alignment
            )));
        }
        if !self.device.capabilities().merged_heaps && !key.category.shares_heap_with(request.category())
        {
            return Err(AllocError::invalid(format!(
                "{:?} cannot alias a {:?} heap on this device",
                request.category(),
                key.category
            )));
        }

        let resource = self.device.create_placed_resource(
            heap,
            block.offset,
            &request.desc,
            request.initial_state,
        )?;

        let id = self.state.lock().insert(AllocationInfo {
            backing: Backing::Alias {
                of: owner,
                key,
                heap_index,
                offset: block.offset,
            },
            resource,
            access: key.access,
            size: request.required_size,
            alignment: request.required_alignment,
            flags: request.flags,
            internal: false,
        });
        Ok(Placement {
            id,
            resource,
            offset: 0,
        })
    }

    // ===========================================================================================
    // Release
    // ===========================================================================================

    /// Return the memory of `id`. Unknown ids are ignored.
    pub(crate) fn release(&self, id: AllocationId) -> AllocResult<()> {
        let Some(info) = self.state.lock().allocations.remove(&id) else {
            return Ok(());
        };
        if self.config.debug.log_releases {
            log::trace!("Releasing {id:?}: {:?}", info.backing);
        }

        match info.backing {
            Backing::Placed {
                key,
                heap_index,
                block,
            } => {
                self.device.release(info.resource);
                self.state.lock().pools.free(key, heap_index, block);
                Ok(())
            }
            Backing::Committed => self.release_committed(&info),
            Backing::SubBuffer {
                access,
                arena,
                block,
            } => {
                let verify = self.config.verify_heaps;
                let mut state = self.state.lock();
                state.arenas[access.index()][arena as usize].free(block, verify);
                Ok(())
            }
            Backing::Alias { .. } => {
                self.device.release(info.resource);
                Ok(())
            }
        }
    }

    fn release_committed(&self, info: &AllocationInfo) -> AllocResult<()> {
        let working_set = {
            let mut state = self.state.lock();
            let before = state.committed_bytes;
            state.committed_bytes -= info.size;
            before
        };

        let evict = info.flags.fast_release
            || self
                .policy
                .prefer_evict(working_set, self.device.capabilities());
        if !evict {
            self.device.release(info.resource);
            return Ok(());
        }

        match self.device.evict(info.resource) {
            Ok(()) => {
                self.state.lock().evicted.push(info.resource);
                Ok(())
            }
            Err(e) => {
                self.device.release(info.resource);
                Err(e)
            }
        }
    }

    fn purge_evicted(&self) -> usize {
        let evicted = std::mem::take(&mut self.state.lock().evicted);
        for resource in &evicted {
            self.device.release(*resource);
        }
        evicted.len()
    }
}

impl Drop for AllocatorShared {
    fn drop(&mut self) {
        let device = Arc::clone(&self.device);
        let log_leaks = self.config.debug.log_leaks_on_shutdown;
        let state = self.state.get_mut();

        for (id, info) in &state.allocations {
            if log_leaks && !info.internal {
                log::warn!("Leaked allocation {id:?} at teardown: {info:?}");
            }
            // Sub-buffers share their arena's resource, released through the arena owner.
            if !matches!(info.backing, Backing::SubBuffer { .. }) {
                device.release(info.resource);
            }
        }
        state.allocations.clear();
        for arenas in &mut state.arenas {
            arenas.clear();
        }
        for resource in state.evicted.drain(..) {
            device.release(resource);
        }
        state.pools.destroy_all(device.as_ref());
    }
}

/// Carves buffers and textures out of native heaps.
///
/// Cheap to clone; all clones share one set of heaps. Every returned handle keeps the
/// allocator alive until it is released.
#[derive(Clone)]
pub struct GpuAllocator {
    shared: Arc<AllocatorShared>,
}

impl std::fmt::Debug for GpuAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuAllocator")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl GpuAllocator {
    /// Create an allocator with the default placement policy.
    #[must_use]
    pub fn new(device: Arc<dyn NativeDevice>, config: AllocatorConfig) -> Self {
        Self::with_policy(device, config, DefaultPlacementPolicy::default())
    }

    #[must_use]
    pub fn with_policy(
        device: Arc<dyn NativeDevice>,
        config: AllocatorConfig,
        policy: impl PlacementPolicy + 'static,
    ) -> Self {
        let merged = device.capabilities().merged_heaps;
        let token = NEXT_ALLOCATOR_TOKEN.fetch_add(1, Ordering::Relaxed);
        let state = AllocatorState {
            token,
            pools: HeapPoolRegistry::new(merged, config.coalesce_on_return, config.verify_heaps),
            arenas: [Vec::new(), Vec::new(), Vec::new()],
            allocations: HashMap::new(),
            next_id: 0,
            committed_bytes: 0,
            evicted: Vec::new(),
        };
        Self {
            shared: Arc::new(AllocatorShared {
                token,
                device,
                policy: Box::new(policy),
                config,
                state: Mutex::new(state),
            }),
        }
    }

    #[must_use]
    pub fn device(&self) -> &Arc<dyn NativeDevice> {
        &self.shared.device
    }

    #[must_use]
    pub fn config(&self) -> &AllocatorConfig {
        &self.shared.config
    }

    fn lease(&self, id: AllocationId) -> Option<Lease> {
        Some(Lease {
            id,
            allocator: Arc::clone(&self.shared),
        })
    }

    // ===========================================================================================
    // Buffers
    // ===========================================================================================

    /// Allocate a plain buffer of `length` bytes.
    ///
    /// # Errors
    /// See [`GpuAllocator::allocate_buffer_desc`].
    pub fn allocate_buffer(
        &self,
        length: u64,
        access: AccessClass,
        flags: AllocFlags,
    ) -> AllocResult<Buffer> {
        self.allocate_buffer_desc(
            ResourceDesc::buffer(length, ResourceFlags::NONE),
            access,
            ResourceState::Common,
            flags,
        )
    }

    /// Allocate a buffer from a full description.
    ///
    /// # Errors
    /// `InvalidArgument` for bad descriptions or flags, `InsufficientMemory` when a
    /// `force_not_committed` request cannot fit a heap, `Native` when the device fails.
    pub fn allocate_buffer_desc(
        &self,
        desc: ResourceDesc,
        access: AccessClass,
        state: ResourceState,
        flags: AllocFlags,
    ) -> AllocResult<Buffer> {
        let request =
            InternalAllocDescriptor::for_buffer(self.shared.device.as_ref(), desc, access, state, flags)?;
        let placement = self.shared.allocate(&request)?;
        Ok(Buffer {
            lease: self.lease(placement.id),
            resource: placement.resource,
            offset: placement.offset,
            length: desc.width,
            access,
            state: request.initial_state,
        })
    }

    // ===========================================================================================
    // Textures
    // ===========================================================================================

    /// Allocate a device-local texture.
    ///
    /// # Errors
    /// Same classes as [`GpuAllocator::allocate_buffer_desc`].
    pub fn allocate_texture(
        &self,
        desc: ResourceDesc,
        state: ResourceState,
        flags: AllocFlags,
    ) -> AllocResult<Texture> {
        let request =
            InternalAllocDescriptor::for_texture(self.shared.device.as_ref(), desc, state, flags)?;
        let placement = self.shared.allocate(&request)?;
        Ok(Texture {
            lease: self.lease(placement.id),
            resource: placement.resource,
            desc,
            state: request.initial_state,
        })
    }

    // ===========================================================================================
    // Raytracing
    // ===========================================================================================

    /// Allocate result storage and build scratch for an acceleration structure.
    ///
    /// # Errors
    /// `Unsupported` without device raytracing support, `InvalidArgument` for empty
    /// prebuild sizes, otherwise as [`GpuAllocator::allocate_buffer_desc`].
    pub fn allocate_raytracing_acceleration_buffer(
        &self,
        info: RaytracingPrebuildInfo,
        flags: AllocFlags,
    ) -> AllocResult<(RaytracingAccelerationStructure, Buffer)> {
        flags.validate()?;
        if !self.shared.device.capabilities().raytracing {
            return Err(AllocError::Unsupported(
                "raytracing acceleration structures".into(),
            ));
        }
        let scratch_size = info.scratch_data_size.max(info.update_scratch_data_size);
        if info.result_data_max_size == 0 || scratch_size == 0 {
            return Err(AllocError::invalid("acceleration structure sizes must be non-zero"));
        }

        let oversized = || AllocError::invalid("acceleration structure sizes overflow");
        let length = checked_align_up(
            info.result_data_max_size,
            RAYTRACING_ACCELERATION_STRUCTURE_ALIGNMENT,
        )
        .ok_or_else(oversized)?;
        let scratch_length =
            checked_align_up(scratch_size, RAYTRACING_ACCELERATION_STRUCTURE_ALIGNMENT)
                .ok_or_else(oversized)?;
        let request = InternalAllocDescriptor::for_buffer(
            self.shared.device.as_ref(),
            ResourceDesc::buffer(length, ResourceFlags::NONE.unordered_access()),
            AccessClass::DeviceLocal,
            ResourceState::RaytracingAccelerationStructure,
            flags,
        )?;
        let placement = self.shared.allocate(&request)?;
        let structure = RaytracingAccelerationStructure {
            lease: self.lease(placement.id),
            resource: placement.resource,
            length,
        };

        let scratch = self.allocate_buffer_desc(
            ResourceDesc::buffer(scratch_length, ResourceFlags::NONE.unordered_access()),
            AccessClass::DeviceLocal,
            ResourceState::UnorderedAccess,
            flags,
        )?;
        Ok((structure, scratch))
    }

    // ===========================================================================================
    // Aliasing
    // ===========================================================================================

    /// Create a buffer over the memory block of `existing`.
    ///
    /// The alias takes no new heap space; the block stays owned by `existing`.
    ///
    /// # Errors
    /// `InvalidArgument` when `existing` is committed, suballocated or released, or
    /// when alignment or heap category do not allow the alias; `AliasExceedsBlock`
    /// when the new buffer is larger than the block.
    pub fn allocate_buffer_aliasing(
        &self,
        existing: &dyn Releasable,
        desc: ResourceDesc,
        flags: AllocFlags,
    ) -> AllocResult<Buffer> {
        let device = self.shared.device.as_ref();
        let mut access_out = AccessClass::DeviceLocal;
        let mut state_out = ResourceState::Common;
        let placement = self.shared.allocate_alias(existing, |access| {
            let request = InternalAllocDescriptor::for_buffer(
                device,
                desc,
                access,
                ResourceState::Common,
                flags,
            )?;
            access_out = access;
            state_out = request.initial_state;
            Ok(request)
        })?;
        Ok(Buffer {
            lease: self.lease(placement.id),
            resource: placement.resource,
            offset: 0,
            length: desc.width,
            access: access_out,
            state: state_out,
        })
    }

    /// Create a texture over the memory block of `existing`.
    ///
    /// # Errors
    /// As [`GpuAllocator::allocate_buffer_aliasing`].
    pub fn allocate_texture_aliasing(
        &self,
        existing: &dyn Releasable,
        desc: ResourceDesc,
        state: ResourceState,
        flags: AllocFlags,
    ) -> AllocResult<Texture> {
        let device = self.shared.device.as_ref();
        let mut state_out = state;
        let placement = self.shared.allocate_alias(existing, |_| {
            let request = InternalAllocDescriptor::for_texture(device, desc, state, flags)?;
            state_out = request.initial_state;
            Ok(request)
        })?;
        Ok(Texture {
            lease: self.lease(placement.id),
            resource: placement.resource,
            desc,
            state: state_out,
        })
    }

    // ===========================================================================================
    // Introspection
    // ===========================================================================================

    /// Bookkeeping of a live handle issued by this allocator.
    #[must_use]
    pub fn allocation_info(&self, resource: &dyn Releasable) -> Option<AllocationInfo> {
        let id = self.shared.resolve(resource).ok()?;
        self.shared.state.lock().allocations.get(&id).copied()
    }

    /// Pool key the allocator uses for a request.
    #[must_use]
    pub fn pool_key(
        &self,
        access: AccessClass,
        category: ResourceCategory,
        alignment: u64,
    ) -> HeapPoolKey {
        self.shared
            .state
            .lock()
            .pools
            .key_for(access, category, alignment)
    }

    #[must_use]
    pub fn heap_count(&self, key: HeapPoolKey) -> usize {
        self.shared.state.lock().pools.heaps(key).len()
    }

    /// Free blocks of one heap, in free-list order.
    #[must_use]
    pub fn free_blocks(&self, key: HeapPoolKey, heap_index: u32) -> Option<Vec<HeapBlock>> {
        self.shared
            .state
            .lock()
            .pools
            .heap(key, heap_index)
            .map(|h| h.free_list().blocks().to_vec())
    }

    /// Size of one heap.
    #[must_use]
    pub fn heap_size(&self, key: HeapPoolKey, heap_index: u32) -> Option<u64> {
        self.shared
            .state
            .lock()
            .pools
            .heap(key, heap_index)
            .map(AllocatorHeap::size)
    }

    /// Scan every free list for overlap, duplicates and out-of-bounds blocks.
    ///
    /// # Errors
    /// `InternalConsistency` describing the first problem found.
    pub fn verify_heaps(&self) -> AllocResult<()> {
        let state = self.shared.state.lock();
        state
            .pools
            .verify_all()
            .map_err(AllocError::InternalConsistency)?;
        for (access, arenas) in AccessClass::ALL.iter().zip(&state.arenas) {
            for (index, arena) in arenas.iter().enumerate() {
                arena.free_list().verify().map_err(|e| {
                    AllocError::InternalConsistency(format!("{access:?} arena {index}: {e}"))
                })?;
            }
        }
        Ok(())
    }

    /// Destroy committed resources that were evicted on release.
    ///
    /// Returns how many were destroyed.
    pub fn purge_evicted(&self) -> usize {
        self.shared.purge_evicted()
    }

    #[must_use]
    pub fn stats(&self) -> AllocatorStats {
        let state = self.shared.state.lock();

        let pools = state
            .pools
            .iter()
            .map(|(key, heaps)| PoolStats {
                key,
                heap_count: heaps.len(),
                heap_bytes: heaps.iter().map(AllocatorHeap::size).sum(),
                free_bytes: heaps.iter().map(|h| h.free_list().free_bytes()).sum(),
                free_blocks: heaps.iter().map(|h| h.free_list().len()).sum(),
                largest_free_block: heaps
                    .iter()
                    .map(|h| h.free_list().largest_block())
                    .max()
                    .unwrap_or(0),
            })
            .collect();

        let mut stats = AllocatorStats {
            pools,
            committed_bytes: state.committed_bytes,
            arenas: state.arenas.iter().map(Vec::len).sum(),
            evicted: state.evicted.len(),
            ..AllocatorStats::default()
        };
        for info in state.allocations.values() {
            match info.backing {
                Backing::Placed { .. } => stats.placed += 1,
                Backing::Committed => stats.committed += 1,
                Backing::SubBuffer { .. } => stats.sub_buffers += 1,
                Backing::Alias { .. } => stats.aliases += 1,
            }
        }
        stats
    }
}

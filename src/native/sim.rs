#![allow(clippy::cast_possible_truncation)]

//! An in-process device that validates every call the allocator makes.
//!
//! `SimDevice` keeps its own record of heaps and resources, checks placements
//! against heap bounds and alignment, and derives texture sizes from format and
//! dimensions the way a driver would. It backs the crate's tests and demos and can
//! serve as a headless backend.

use crate::error::{AllocError, AllocResult};
use crate::native::desc::{
    AccessClass, HeapDesc, HeapHandle, ResourceAllocationInfo, ResourceCategory, ResourceDesc,
    ResourceDimension, ResourceHandle, ResourceState,
};
use crate::native::device::{DeviceCapabilities, NativeDevice};
use crate::utils::{DEFAULT_ALIGNMENT, MSAA_ALIGNMENT, SMALL_ALIGNMENT, checked_align_up, is_aligned};
use parking_lot::Mutex;
use std::collections::HashMap;

pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
pub const E_OUTOFMEMORY: i32 = 0x8007_000E_u32 as i32;

/// Entry points of [`NativeDevice`], for call counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimCall {
    CreateHeap,
    DestroyHeap,
    CreatePlacedResource,
    CreateCommittedResource,
    GetAllocationInfo,
    Evict,
    Release,
}

impl SimCall {
    const fn name(self) -> &'static str {
        match self {
            Self::CreateHeap => "CreateHeap",
            Self::DestroyHeap => "DestroyHeap",
            Self::CreatePlacedResource => "CreatePlacedResource",
            Self::CreateCommittedResource => "CreateCommittedResource",
            Self::GetAllocationInfo => "GetResourceAllocationInfo",
            Self::Evict => "Evict",
            Self::Release => "Release",
        }
    }
}

/// Where a simulated resource lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPlacement {
    Placed { heap: HeapHandle, offset: u64 },
    Committed { access: AccessClass },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimResource {
    pub placement: SimPlacement,
    pub size: u64,
    pub desc: ResourceDesc,
    pub state: ResourceState,
    pub resident: bool,
}

#[derive(Debug, Default)]
struct SimState {
    next_id: u64,
    heaps: HashMap<HeapHandle, HeapDesc>,
    resources: HashMap<ResourceHandle, SimResource>,
    calls: HashMap<SimCall, u64>,
    pending_faults: Vec<(SimCall, i32)>,
    resident_bytes: u64,
}

impl SimState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, call: SimCall) -> AllocResult<()> {
        *self.calls.entry(call).or_insert(0) += 1;

        if let Some(pos) = self.pending_faults.iter().position(|(c, _)| *c == call) {
            let (_, code) = self.pending_faults.remove(pos);
            return Err(AllocError::Native {
                call: call.name(),
                code,
            });
        }
        Ok(())
    }

    fn reserve(&mut self, call: SimCall, bytes: u64, budget: u64) -> AllocResult<()> {
        if self.resident_bytes.checked_add(bytes).is_none_or(|total| total > budget) {
            return Err(AllocError::Native {
                call: call.name(),
                code: E_OUTOFMEMORY,
            });
        }
        self.resident_bytes += bytes;
        Ok(())
    }
}

/// Reference implementation of [`NativeDevice`].
#[derive(Debug)]
pub struct SimDevice {
    caps: DeviceCapabilities,
    state: Mutex<SimState>,
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new(DeviceCapabilities::default())
    }
}

impl SimDevice {
    #[must_use]
    pub fn new(caps: DeviceCapabilities) -> Self {
        Self {
            caps,
            state: Mutex::new(SimState::default()),
        }
    }

    /// Makes the next call to `call` fail with `code`.
    pub fn fail_next(&self, call: SimCall, code: i32) {
        self.state.lock().pending_faults.push((call, code));
    }

    #[must_use]
    pub fn call_count(&self, call: SimCall) -> u64 {
        self.state.lock().calls.get(&call).copied().unwrap_or(0)
    }

    /// Total number of native calls made so far.
    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.state.lock().calls.values().sum()
    }

    #[must_use]
    pub fn heap_count(&self) -> usize {
        self.state.lock().heaps.len()
    }

    #[must_use]
    pub fn heap_desc(&self, heap: HeapHandle) -> Option<HeapDesc> {
        self.state.lock().heaps.get(&heap).copied()
    }

    #[must_use]
    pub fn live_resource_count(&self) -> usize {
        self.state.lock().resources.len()
    }

    #[must_use]
    pub fn resource(&self, resource: ResourceHandle) -> Option<SimResource> {
        self.state.lock().resources.get(&resource).copied()
    }

    /// Bytes of heaps and committed resources currently alive.
    #[must_use]
    pub fn resident_bytes(&self) -> u64 {
        self.state.lock().resident_bytes
    }

    fn texture_allocation_info(desc: &ResourceDesc) -> ResourceAllocationInfo {
        let block = u64::from(desc.format.block_dim());
        let bytes_per_block = desc.format.bytes_per_block();
        let (layers, mut depth) = match desc.dimension {
            ResourceDimension::Texture3D => (1, u64::from(desc.depth_or_array_size.max(1))),
            _ => (u64::from(desc.depth_or_array_size.max(1)), 1),
        };

        let mut width = desc.width.max(1);
        let mut height = u64::from(desc.height.max(1));
        let mut total = 0;
        for _ in 0..desc.mip_levels.max(1) {
            let blocks_w = width.div_ceil(block);
            let blocks_h = height.div_ceil(block);
            let mip = blocks_w
                .saturating_mul(blocks_h)
                .saturating_mul(depth)
                .saturating_mul(bytes_per_block);
            total = mip.saturating_add(total);
            width = (width / 2).max(1);
            height = (height / 2).max(1);
            depth = (depth / 2).max(1);
        }
        total = total
            .saturating_mul(layers)
            .saturating_mul(u64::from(desc.sample.count.max(1)));

        let alignment = if desc.is_multisampled() {
            MSAA_ALIGNMENT
        } else if !desc.flags.is_target() && total <= DEFAULT_ALIGNMENT {
            SMALL_ALIGNMENT
        } else {
            DEFAULT_ALIGNMENT
        };
        let alignment = alignment.max(desc.alignment);

        ResourceAllocationInfo {
            size: Self::placed_size(total.max(1), alignment),
            alignment,
        }
    }

    fn placed_size(bytes: u64, alignment: u64) -> u64 {
        if !alignment.is_power_of_two() || bytes == u64::MAX {
            return ResourceAllocationInfo::UNPLACEABLE_SIZE;
        }
        checked_align_up(bytes, alignment).unwrap_or(ResourceAllocationInfo::UNPLACEABLE_SIZE)
    }

    fn allocation_info(&self, desc: &ResourceDesc) -> ResourceAllocationInfo {
        if desc.is_buffer() {
            let alignment = self.caps.buffer_placement_alignment.max(desc.alignment);
            ResourceAllocationInfo {
                size: Self::placed_size(desc.width.max(1), alignment),
                alignment,
            }
        } else {
            Self::texture_allocation_info(desc)
        }
    }
}

impl NativeDevice for SimDevice {
    fn capabilities(&self) -> &DeviceCapabilities {
        &self.caps
    }

    fn create_heap(&self, desc: &HeapDesc) -> AllocResult<HeapHandle> {
        let mut state = self.state.lock();
        state.record(SimCall::CreateHeap)?;

        if desc.size == 0 || !desc.alignment.is_power_of_two() || !is_aligned(desc.size, desc.alignment)
        {
            return Err(AllocError::Native {
                call: SimCall::CreateHeap.name(),
                code: E_INVALIDARG,
            });
        }
        if desc.category.is_none() && !self.caps.merged_heaps {
            return Err(AllocError::Native {
                call: SimCall::CreateHeap.name(),
                code: E_INVALIDARG,
            });
        }

        state.reserve(SimCall::CreateHeap, desc.size, self.caps.memory_budget)?;
        let handle = HeapHandle(state.next_id());
        state.heaps.insert(handle, *desc);
        Ok(handle)
    }

    fn destroy_heap(&self, heap: HeapHandle) {
        let mut state = self.state.lock();
        state.record(SimCall::DestroyHeap).ok();

        let still_placed = state.resources.values().any(
            |r| matches!(r.placement, SimPlacement::Placed { heap: h, .. } if h == heap),
        );
        if still_placed {
            log::warn!("SimDevice: heap {heap:?} destroyed while resources are still placed in it");
        }
        if let Some(desc) = state.heaps.remove(&heap) {
            state.resident_bytes -= desc.size;
        }
    }

    fn create_placed_resource(
        &self,
        heap: HeapHandle,
        offset: u64,
        desc: &ResourceDesc,
        state_in: ResourceState,
    ) -> AllocResult<ResourceHandle> {
        let info = self.allocation_info(desc);
        let mut state = self.state.lock();
        state.record(SimCall::CreatePlacedResource)?;

        let invalid = AllocError::Native {
            call: SimCall::CreatePlacedResource.name(),
            code: E_INVALIDARG,
        };
        let Some(heap_desc) = state.heaps.get(&heap).copied() else {
            return Err(invalid);
        };
        if !info.is_placeable()
            || !is_aligned(offset, info.alignment)
            || offset.checked_add(info.size).is_none_or(|end| end > heap_desc.size)
        {
            return Err(invalid);
        }
        if let Some(category) = heap_desc.category {
            if !category.shares_heap_with(ResourceCategory::classify(desc, state_in)) {
                return Err(invalid);
            }
        }

        let handle = ResourceHandle(state.next_id());
        state.resources.insert(
            handle,
            SimResource {
                placement: SimPlacement::Placed { heap, offset },
                size: info.size,
                desc: *desc,
                state: state_in,
                resident: true,
            },
        );
        Ok(handle)
    }

    fn create_committed_resource(
        &self,
        access: AccessClass,
        desc: &ResourceDesc,
        state_in: ResourceState,
    ) -> AllocResult<ResourceHandle> {
        let info = self.allocation_info(desc);
        let mut state = self.state.lock();
        state.record(SimCall::CreateCommittedResource)?;
        if !info.is_placeable() {
            return Err(AllocError::Native {
                call: SimCall::CreateCommittedResource.name(),
                code: E_INVALIDARG,
            });
        }
        state.reserve(
            SimCall::CreateCommittedResource,
            info.size,
            self.caps.memory_budget,
        )?;

        let handle = ResourceHandle(state.next_id());
        state.resources.insert(
            handle,
            SimResource {
                placement: SimPlacement::Committed { access },
                size: info.size,
                desc: *desc,
                state: state_in,
                resident: true,
            },
        );
        Ok(handle)
    }

    fn get_allocation_info(&self, desc: &ResourceDesc) -> ResourceAllocationInfo {
        self.state.lock().record(SimCall::GetAllocationInfo).ok();
        self.allocation_info(desc)
    }

    fn evict(&self, resource: ResourceHandle) -> AllocResult<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.record(SimCall::Evict)?;

        match state.resources.get_mut(&resource) {
            Some(res) => {
                let freed = match res.placement {
                    SimPlacement::Committed { .. } if res.resident => res.size,
                    _ => 0,
                };
                res.resident = false;
                state.resident_bytes -= freed;
                Ok(())
            }
            None => Err(AllocError::Native {
                call: SimCall::Evict.name(),
                code: E_INVALIDARG,
            }),
        }
    }

    fn release(&self, resource: ResourceHandle) {
        let mut state = self.state.lock();
        state.record(SimCall::Release).ok();

        match state.resources.remove(&resource) {
            Some(res) => {
                if res.resident && matches!(res.placement, SimPlacement::Committed { .. }) {
                    state.resident_bytes -= res.size;
                }
            }
            None => log::warn!("SimDevice: release of unknown resource {resource:?}"),
        }
    }
}

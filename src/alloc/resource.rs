use crate::alloc::manager::AllocatorShared;
use crate::error::AllocResult;
use crate::native::desc::{AccessClass, ResourceDesc, ResourceHandle, ResourceState};
use std::fmt;
use std::sync::Arc;

/// Key of the allocator's per-resource bookkeeping.
///
/// Ids carry the token of the allocator that issued them, so a handle is never
/// mistaken for one of another allocator's allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationId {
    pub(crate) allocator: u64,
    pub(crate) serial: u64,
}

/// The link from a live handle back to the allocator that owns its memory.
pub(crate) struct Lease {
    pub(crate) id: AllocationId,
    pub(crate) allocator: Arc<AllocatorShared>,
}

impl Lease {
    fn release(self) -> AllocResult<()> {
        self.allocator.release(self.id)
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Lease").field(&self.id).finish()
    }
}

/// Anything whose memory goes back to a [`GpuAllocator`](crate::alloc::GpuAllocator).
///
/// The first `release` returns the memory; later calls do nothing and succeed.
/// Dropping a handle that was never released releases it.
pub trait Releasable {
    /// Return the backing memory to the allocator.
    ///
    /// # Errors
    /// Propagates a failed native eviction.
    fn release(&mut self) -> AllocResult<()>;

    /// `None` once released.
    fn allocation_id(&self) -> Option<AllocationId>;

    fn is_released(&self) -> bool {
        self.allocation_id().is_none()
    }
}

macro_rules! releasable_handle {
    ($ty:ident) => {
        impl Releasable for $ty {
            fn release(&mut self) -> AllocResult<()> {
                match self.lease.take() {
                    Some(lease) => lease.release(),
                    None => Ok(()),
                }
            }

            fn allocation_id(&self) -> Option<AllocationId> {
                self.lease.as_ref().map(|l| l.id)
            }
        }

        impl Drop for $ty {
            fn drop(&mut self) {
                if let Err(e) = Releasable::release(self) {
                    log::warn!(
                        "[{}] Failed to release {:?}: {}",
                        stringify!($ty),
                        self.resource,
                        e
                    );
                }
            }
        }
    };
}

/// A linear GPU buffer.
///
/// Small buffers may share a native resource with others; `offset` is where
/// this buffer starts inside [`Buffer::resource`].
#[derive(Debug)]
pub struct Buffer {
    pub(crate) lease: Option<Lease>,
    pub(crate) resource: ResourceHandle,
    pub(crate) offset: u64,
    pub(crate) length: u64,
    pub(crate) access: AccessClass,
    pub(crate) state: ResourceState,
}

impl Buffer {
    #[must_use]
    pub const fn resource(&self) -> ResourceHandle {
        self.resource
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub const fn length(&self) -> u64 {
        self.length
    }

    #[must_use]
    pub const fn access(&self) -> AccessClass {
        self.access
    }

    #[must_use]
    pub const fn initial_state(&self) -> ResourceState {
        self.state
    }
}

releasable_handle!(Buffer);

/// A texture of any dimension.
#[derive(Debug)]
pub struct Texture {
    pub(crate) lease: Option<Lease>,
    pub(crate) resource: ResourceHandle,
    pub(crate) desc: ResourceDesc,
    pub(crate) state: ResourceState,
}

impl Texture {
    #[must_use]
    pub const fn resource(&self) -> ResourceHandle {
        self.resource
    }

    #[must_use]
    pub const fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    #[must_use]
    pub const fn initial_state(&self) -> ResourceState {
        self.state
    }
}

releasable_handle!(Texture);

/// Storage for a built raytracing acceleration structure.
#[derive(Debug)]
pub struct RaytracingAccelerationStructure {
    pub(crate) lease: Option<Lease>,
    pub(crate) resource: ResourceHandle,
    pub(crate) length: u64,
}

impl RaytracingAccelerationStructure {
    #[must_use]
    pub const fn resource(&self) -> ResourceHandle {
        self.resource
    }

    #[must_use]
    pub const fn length(&self) -> u64 {
        self.length
    }
}

releasable_handle!(RaytracingAccelerationStructure);

/// Any handle produced by the allocator.
#[derive(Debug)]
pub enum GpuResource {
    Buffer(Buffer),
    Texture(Texture),
    AccelerationStructure(RaytracingAccelerationStructure),
}

impl Releasable for GpuResource {
    fn release(&mut self) -> AllocResult<()> {
        match self {
            Self::Buffer(b) => b.release(),
            Self::Texture(t) => t.release(),
            Self::AccelerationStructure(a) => a.release(),
        }
    }

    fn allocation_id(&self) -> Option<AllocationId> {
        match self {
            Self::Buffer(b) => b.allocation_id(),
            Self::Texture(t) => t.allocation_id(),
            Self::AccelerationStructure(a) => a.allocation_id(),
        }
    }
}

impl From<Buffer> for GpuResource {
    fn from(buffer: Buffer) -> Self {
        Self::Buffer(buffer)
    }
}

impl From<Texture> for GpuResource {
    fn from(texture: Texture) -> Self {
        Self::Texture(texture)
    }
}

impl From<RaytracingAccelerationStructure> for GpuResource {
    fn from(structure: RaytracingAccelerationStructure) -> Self {
        Self::AccelerationStructure(structure)
    }
}

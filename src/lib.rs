//! Placed-resource memory allocator for explicit GPU APIs.
//!
//! Resources are carved out of large native heaps through per-heap free lists,
//! with committed (dedicated) resources as the fallback for requests a heap
//! cannot serve. Small buffers share arena buffers, placed blocks can be
//! aliased by transient resources, and committed memory may be evicted on
//! release instead of destroyed.

pub mod alloc;
pub mod error;
pub mod heap;
pub mod native;
pub mod utils;

pub use alloc::{
    AllocFlags, AllocatorConfig, Buffer, DeferredReleases, GpuAllocator, GpuResource,
    RaytracingAccelerationStructure, Releasable, Texture,
};
pub use error::{AllocError, AllocResult, ErrorKind};
pub use native::{AccessClass, DeviceCapabilities, NativeDevice, ResourceDesc, ResourceState};

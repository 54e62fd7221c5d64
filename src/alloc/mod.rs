pub(crate) mod arena;
pub mod config;
pub mod deferred;
pub mod descriptor;
pub mod flags;
pub mod manager;
pub mod resource;
pub mod stats;
pub mod strategy;

pub use config::{AllocatorConfig, DebugSettings};
pub use deferred::DeferredReleases;
pub use descriptor::InternalAllocDescriptor;
pub use flags::AllocFlags;
pub use manager::{AllocationInfo, Backing, GpuAllocator};
pub use resource::{
    AllocationId, Buffer, GpuResource, RaytracingAccelerationStructure, Releasable, Texture,
};
pub use stats::{AllocatorStats, PoolStats};
pub use strategy::{DefaultPlacementPolicy, PlacementPolicy, PreferPlacedPolicy};

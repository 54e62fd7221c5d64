use crate::error::AllocResult;
use crate::native::desc::{
    AccessClass, HeapDesc, HeapHandle, ResourceAllocationInfo, ResourceDesc, ResourceHandle,
    ResourceState,
};
use crate::utils::{DEFAULT_ALIGNMENT, MIB};

/// PCI vendor of the adapter behind a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Amd,
    Nvidia,
    Intel,
    Other(u32),
}

impl GpuVendor {
    #[must_use]
    pub const fn from_pci_id(vendor_id: u32) -> Self {
        match vendor_id {
            0x1002 => Self::Amd,
            0x10DE => Self::Nvidia,
            0x8086 => Self::Intel,
            other => Self::Other(other),
        }
    }
}

/// Static properties of a device that influence allocation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Heaps may hold buffers, textures and render targets together.
    pub merged_heaps: bool,
    /// Raytracing acceleration structures are supported.
    pub raytracing: bool,
    pub vendor: GpuVendor,
    /// The OS predates good placed-resource support.
    pub legacy_os: bool,
    /// Placement alignment for buffers.
    pub buffer_placement_alignment: u64,
    /// Total memory the process may keep resident.
    pub memory_budget: u64,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            merged_heaps: true,
            raytracing: true,
            vendor: GpuVendor::Other(0),
            legacy_os: false,
            buffer_placement_alignment: DEFAULT_ALIGNMENT,
            memory_budget: 4096 * MIB,
        }
    }
}

/// The native graphics device the allocator carves memory from.
///
/// Implementations wrap the real API; every call is synchronous. Failures are
/// reported as [`AllocError::Native`](crate::error::AllocError::Native) carrying the
/// driver's error code.
pub trait NativeDevice: Send + Sync {
    fn capabilities(&self) -> &DeviceCapabilities;

    // ===========================================================================================
    // Heaps
    // ===========================================================================================

    /// Create a heap of `desc.size` bytes.
    fn create_heap(&self, desc: &HeapDesc) -> AllocResult<HeapHandle>;

    /// Destroy a heap. All resources placed in it must already be released.
    fn destroy_heap(&self, heap: HeapHandle);

    // ===========================================================================================
    // Resources
    // ===========================================================================================

    /// Create a resource at byte `offset` inside `heap`.
    fn create_placed_resource(
        &self,
        heap: HeapHandle,
        offset: u64,
        desc: &ResourceDesc,
        state: ResourceState,
    ) -> AllocResult<ResourceHandle>;

    /// Create a resource with its own implicit heap.
    fn create_committed_resource(
        &self,
        access: AccessClass,
        desc: &ResourceDesc,
        state: ResourceState,
    ) -> AllocResult<ResourceHandle>;

    /// Size and alignment needed to place `desc`.
    ///
    /// Descriptions that cannot be placed report
    /// [`ResourceAllocationInfo::UNPLACEABLE_SIZE`].
    fn get_allocation_info(&self, desc: &ResourceDesc) -> ResourceAllocationInfo;

    /// Make a resource non-resident without destroying it.
    fn evict(&self, resource: ResourceHandle) -> AllocResult<()>;

    fn release(&self, resource: ResourceHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_ids_map_to_known_vendors() {
        assert_eq!(GpuVendor::from_pci_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_pci_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_pci_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_pci_id(0x5143), GpuVendor::Other(0x5143));
    }
}

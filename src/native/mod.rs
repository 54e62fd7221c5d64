pub mod desc;
pub mod device;
pub mod sim;

pub use desc::{
    AccessClass, AlignmentClass, Format, HeapDesc, HeapHandle, RaytracingPrebuildInfo,
    ResourceAllocationInfo, ResourceCategory, ResourceDesc, ResourceDimension, ResourceFlags,
    ResourceHandle, ResourceState, SampleDesc,
};
pub use device::{DeviceCapabilities, GpuVendor, NativeDevice};
pub use sim::{SimCall, SimDevice};

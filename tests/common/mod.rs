#![allow(dead_code)]

use gpuheap_rs::alloc::{AllocatorConfig, GpuAllocator, PreferPlacedPolicy};
use gpuheap_rs::native::{DeviceCapabilities, SimDevice};
use std::sync::Arc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Allocator that always places and always destroys on release.
pub fn placed_allocator(config: AllocatorConfig) -> (Arc<SimDevice>, GpuAllocator) {
    placed_allocator_on(DeviceCapabilities::default(), config)
}

pub fn placed_allocator_on(
    caps: DeviceCapabilities,
    config: AllocatorConfig,
) -> (Arc<SimDevice>, GpuAllocator) {
    init_logging();
    let device = Arc::new(SimDevice::new(caps));
    let allocator = GpuAllocator::with_policy(device.clone(), config, PreferPlacedPolicy);
    (device, allocator)
}

/// Allocator with the default platform policy.
pub fn default_allocator_on(caps: DeviceCapabilities) -> (Arc<SimDevice>, GpuAllocator) {
    init_logging();
    let device = Arc::new(SimDevice::new(caps));
    let allocator = GpuAllocator::new(device.clone(), AllocatorConfig::new());
    (device, allocator)
}

/// Small deterministic generator for allocation workloads.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    pub fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

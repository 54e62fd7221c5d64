//! Committed-versus-placed policy.
//!
//! The rules here are performance preferences, never correctness requirements.
//! Explicit `force_committed` / `force_not_committed` flags are applied by the
//! allocator before a policy is consulted.

use crate::alloc::descriptor::InternalAllocDescriptor;
use crate::native::desc::ResourceCategory;
use crate::native::device::{DeviceCapabilities, GpuVendor};

/// Platform heuristics that steer allocation and release.
pub trait PlacementPolicy: Send + Sync {
    /// Whether a request without forcing flags should get its own committed resource.
    fn prefer_committed(&self, request: &InternalAllocDescriptor, caps: &DeviceCapabilities)
    -> bool;

    /// Whether releasing a committed resource should evict it instead of destroying it.
    fn prefer_evict(&self, committed_working_set: u64, caps: &DeviceCapabilities) -> bool;
}

/// Committed render targets on AMD adapters, and eviction while the budget is roomy.
#[derive(Debug, Clone, Copy)]
pub struct DefaultPlacementPolicy {
    /// The budget must exceed the committed working set by this factor before
    /// eviction is preferred over release.
    pub evict_headroom: u64,
}

impl Default for DefaultPlacementPolicy {
    fn default() -> Self {
        Self { evict_headroom: 2 }
    }
}

impl PlacementPolicy for DefaultPlacementPolicy {
    fn prefer_committed(
        &self,
        request: &InternalAllocDescriptor,
        caps: &DeviceCapabilities,
    ) -> bool {
        request.category() == ResourceCategory::TargetTexture
            && !caps.legacy_os
            && caps.vendor == GpuVendor::Amd
    }

    fn prefer_evict(&self, committed_working_set: u64, caps: &DeviceCapabilities) -> bool {
        caps.memory_budget >= committed_working_set.saturating_mul(self.evict_headroom)
    }
}

/// Always place, always release.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferPlacedPolicy;

impl PlacementPolicy for PreferPlacedPolicy {
    fn prefer_committed(&self, _: &InternalAllocDescriptor, _: &DeviceCapabilities) -> bool {
        false
    }

    fn prefer_evict(&self, _: u64, _: &DeviceCapabilities) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::flags::AllocFlags;
    use crate::native::desc::{Format, ResourceDesc, ResourceFlags, ResourceState};
    use crate::native::sim::SimDevice;
    use crate::utils::MIB;

    fn target(device: &SimDevice) -> InternalAllocDescriptor {
        InternalAllocDescriptor::for_texture(
            device,
            ResourceDesc::texture_2d(Format::R8G8B8A8Unorm, 1024, 1024)
                .with_flags(ResourceFlags::NONE.render_target()),
            ResourceState::RenderTarget,
            AllocFlags::NONE,
        )
        .unwrap()
    }

    fn caps(vendor: GpuVendor, legacy_os: bool) -> DeviceCapabilities {
        DeviceCapabilities {
            vendor,
            legacy_os,
            ..DeviceCapabilities::default()
        }
    }

    #[test]
    fn amd_render_targets_prefer_committed() {
        let device = SimDevice::default();
        let policy = DefaultPlacementPolicy::default();
        let request = target(&device);

        assert!(policy.prefer_committed(&request, &caps(GpuVendor::Amd, false)));
        assert!(!policy.prefer_committed(&request, &caps(GpuVendor::Amd, true)));
        assert!(!policy.prefer_committed(&request, &caps(GpuVendor::Nvidia, false)));
    }

    #[test]
    fn plain_textures_stay_placed() {
        let device = SimDevice::default();
        let request = InternalAllocDescriptor::for_texture(
            &device,
            ResourceDesc::texture_2d(Format::Bc7Unorm, 1024, 1024),
            ResourceState::ShaderResource,
            AllocFlags::NONE,
        )
        .unwrap();
        assert!(
            !DefaultPlacementPolicy::default()
                .prefer_committed(&request, &caps(GpuVendor::Amd, false))
        );
    }

    #[test]
    fn eviction_depends_on_headroom() {
        let policy = DefaultPlacementPolicy::default();
        let caps = DeviceCapabilities {
            memory_budget: 100 * MIB,
            ..DeviceCapabilities::default()
        };
        assert!(policy.prefer_evict(50 * MIB, &caps));
        assert!(!policy.prefer_evict(51 * MIB, &caps));
    }

    #[test]
    fn prefer_placed_never_commits() {
        let device = SimDevice::default();
        let request = target(&device);
        let policy = PreferPlacedPolicy;
        assert!(!policy.prefer_committed(&request, &caps(GpuVendor::Amd, false)));
        assert!(!policy.prefer_evict(0, &DeviceCapabilities::default()));
    }
}

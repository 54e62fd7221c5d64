use crate::alloc::flags::AllocFlags;
use crate::error::{AllocError, AllocResult};
use crate::native::desc::{
    AccessClass, RAYTRACING_ACCELERATION_STRUCTURE_ALIGNMENT, ResourceCategory, ResourceDesc,
    ResourceState,
};
use crate::native::device::NativeDevice;

/// A request normalised for the placement machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalAllocDescriptor {
    pub desc: ResourceDesc,
    pub access: AccessClass,
    pub initial_state: ResourceState,
    pub flags: AllocFlags,
    pub required_size: u64,
    pub required_alignment: u64,
    /// May share one native buffer with other small buffers.
    pub suballocation_candidate: bool,
}

impl InternalAllocDescriptor {
    /// Describe a buffer of `length` bytes.
    ///
    /// # Errors
    /// `InvalidArgument` for a zero length, a non-buffer description or
    /// contradictory flags; `Unsupported` for acceleration-structure state on a
    /// device without raytracing.
    pub fn for_buffer(
        device: &dyn NativeDevice,
        desc: ResourceDesc,
        access: AccessClass,
        state: ResourceState,
        flags: AllocFlags,
    ) -> AllocResult<Self> {
        flags.validate()?;
        if !desc.is_buffer() {
            return Err(AllocError::invalid("buffer allocation needs a buffer description"));
        }
        if desc.width == 0 {
            return Err(AllocError::invalid("buffer length must be non-zero"));
        }
        Self::check_requested_alignment(&desc)?;
        let initial_state = Self::initial_state(device, access, state)?;

        let caps = device.capabilities();
        let mut required_alignment = caps.buffer_placement_alignment.max(desc.alignment);
        if initial_state == ResourceState::RaytracingAccelerationStructure {
            required_alignment = required_alignment.max(RAYTRACING_ACCELERATION_STRUCTURE_ALIGNMENT);
        }

        // Buffers that need their own barriers cannot live inside a shared one.
        let flags_allow_sharing = !(desc.flags.render_target
            || desc.flags.unordered_access
            || desc.flags.stream_output);

        Ok(Self {
            desc,
            access,
            initial_state,
            flags,
            required_size: desc.width,
            required_alignment,
            suballocation_candidate: flags_allow_sharing
                && initial_state != ResourceState::RaytracingAccelerationStructure,
        })
    }

    /// Describe a texture; size and alignment come from the device.
    ///
    /// # Errors
    /// `InvalidArgument` for buffer descriptions, empty extents or contradictory
    /// flags; `Unsupported` for acceleration-structure state without raytracing.
    pub fn for_texture(
        device: &dyn NativeDevice,
        desc: ResourceDesc,
        state: ResourceState,
        flags: AllocFlags,
    ) -> AllocResult<Self> {
        flags.validate()?;
        if desc.is_buffer() {
            return Err(AllocError::invalid("texture allocation needs a texture description"));
        }
        if desc.width == 0 || desc.height == 0 || desc.depth_or_array_size == 0 {
            return Err(AllocError::invalid("texture extents must be non-zero"));
        }
        Self::check_requested_alignment(&desc)?;
        let access = AccessClass::DeviceLocal;
        let initial_state = Self::initial_state(device, access, state)?;
        let info = device.get_allocation_info(&desc);
        if !info.is_placeable() {
            return Err(AllocError::invalid(format!(
                "device cannot place texture ({info:?})"
            )));
        }

        Ok(Self {
            desc,
            access,
            initial_state,
            flags,
            required_size: info.size,
            required_alignment: info.alignment,
            suballocation_candidate: false,
        })
    }

    /// Zero lets the device choose; anything else must be a power of two.
    fn check_requested_alignment(desc: &ResourceDesc) -> AllocResult<()> {
        if desc.alignment != 0 && !desc.alignment.is_power_of_two() {
            return Err(AllocError::invalid(format!(
                "alignment {} is not a power of two",
                desc.alignment
            )));
        }
        Ok(())
    }

    fn initial_state(
        device: &dyn NativeDevice,
        access: AccessClass,
        requested: ResourceState,
    ) -> AllocResult<ResourceState> {
        if requested == ResourceState::RaytracingAccelerationStructure
            && !device.capabilities().raytracing
        {
            return Err(AllocError::Unsupported(
                "raytracing acceleration structure state".into(),
            ));
        }
        Ok(access.forced_state().unwrap_or(requested))
    }

    #[must_use]
    pub const fn category(&self) -> ResourceCategory {
        ResourceCategory::classify(&self.desc, self.initial_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::native::desc::{Format, ResourceFlags};
    use crate::native::device::DeviceCapabilities;
    use crate::native::sim::{SimCall, SimDevice};
    use crate::utils::{DEFAULT_ALIGNMENT, MIB, SMALL_ALIGNMENT};

    #[test]
    fn buffers_use_length_and_placement_alignment() {
        let device = SimDevice::default();
        let d = InternalAllocDescriptor::for_buffer(
            &device,
            ResourceDesc::buffer(1000, ResourceFlags::NONE),
            AccessClass::DeviceLocal,
            ResourceState::Common,
            AllocFlags::NONE,
        )
        .unwrap();

        assert_eq!(d.required_size, 1000);
        assert_eq!(d.required_alignment, DEFAULT_ALIGNMENT);
        assert!(d.suballocation_candidate);
        assert_eq!(d.category(), ResourceCategory::Buffer);
        assert_eq!(device.call_count(SimCall::GetAllocationInfo), 0);
    }

    #[test]
    fn device_reported_buffer_alignment_wins() {
        let device = SimDevice::new(DeviceCapabilities {
            buffer_placement_alignment: SMALL_ALIGNMENT,
            ..DeviceCapabilities::default()
        });
        let d = InternalAllocDescriptor::for_buffer(
            &device,
            ResourceDesc::buffer(MIB, ResourceFlags::NONE),
            AccessClass::DeviceLocal,
            ResourceState::Common,
            AllocFlags::NONE,
        )
        .unwrap();
        assert_eq!(d.required_alignment, SMALL_ALIGNMENT);
    }

    #[test]
    fn access_class_forces_initial_state() {
        let device = SimDevice::default();
        let desc = ResourceDesc::buffer(256, ResourceFlags::NONE);

        let upload = InternalAllocDescriptor::for_buffer(
            &device,
            desc,
            AccessClass::Upload,
            ResourceState::CopyDestination,
            AllocFlags::NONE,
        )
        .unwrap();
        let readback = InternalAllocDescriptor::for_buffer(
            &device,
            desc,
            AccessClass::Readback,
            ResourceState::Common,
            AllocFlags::NONE,
        )
        .unwrap();
        let local = InternalAllocDescriptor::for_buffer(
            &device,
            desc,
            AccessClass::DeviceLocal,
            ResourceState::CopyDestination,
            AllocFlags::NONE,
        )
        .unwrap();

        assert_eq!(upload.initial_state, ResourceState::GenericRead);
        assert_eq!(readback.initial_state, ResourceState::CopyDestination);
        assert_eq!(local.initial_state, ResourceState::CopyDestination);
    }

    #[test]
    fn barrier_flags_disqualify_suballocation() {
        let device = SimDevice::default();
        for flags in [
            ResourceFlags::NONE.unordered_access(),
            ResourceFlags::NONE.render_target(),
            ResourceFlags::NONE.stream_output(),
        ] {
            let d = InternalAllocDescriptor::for_buffer(
                &device,
                ResourceDesc::buffer(256, flags),
                AccessClass::DeviceLocal,
                ResourceState::Common,
                AllocFlags::NONE,
            )
            .unwrap();
            assert!(!d.suballocation_candidate, "{flags:?}");
        }
    }

    #[test]
    fn textures_query_the_device() {
        let device = SimDevice::default();
        let desc = ResourceDesc::texture_2d(Format::R8G8B8A8Unorm, 32, 32);
        let d = InternalAllocDescriptor::for_texture(
            &device,
            desc,
            ResourceState::ShaderResource,
            AllocFlags::NONE,
        )
        .unwrap();

        assert_eq!(device.call_count(SimCall::GetAllocationInfo), 1);
        assert_eq!(d.required_alignment, SMALL_ALIGNMENT);
        assert_eq!(d.required_size, 4096);
        assert_eq!(d.access, AccessClass::DeviceLocal);
        assert!(!d.suballocation_candidate);
    }

    #[test]
    fn raytracing_state_needs_device_support() {
        let device = SimDevice::new(DeviceCapabilities {
            raytracing: false,
            ..DeviceCapabilities::default()
        });
        let err = InternalAllocDescriptor::for_buffer(
            &device,
            ResourceDesc::buffer(MIB, ResourceFlags::NONE.unordered_access()),
            AccessClass::DeviceLocal,
            ResourceState::RaytracingAccelerationStructure,
            AllocFlags::NONE,
        )
        .unwrap_err();

        assert!(matches!(err, AllocError::Unsupported(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn rejects_empty_and_mismatched_requests() {
        let device = SimDevice::default();
        let empty = InternalAllocDescriptor::for_buffer(
            &device,
            ResourceDesc::buffer(0, ResourceFlags::NONE),
            AccessClass::Upload,
            ResourceState::Common,
            AllocFlags::NONE,
        );
        assert!(matches!(empty, Err(AllocError::InvalidArgument(_))));

        let texture_as_buffer = InternalAllocDescriptor::for_texture(
            &device,
            ResourceDesc::buffer(64, ResourceFlags::NONE),
            ResourceState::Common,
            AllocFlags::NONE,
        );
        assert!(matches!(texture_as_buffer, Err(AllocError::InvalidArgument(_))));
    }

    #[test]
    fn alignment_must_be_a_power_of_two() {
        let device = SimDevice::default();
        let mut desc = ResourceDesc::buffer(MIB, ResourceFlags::NONE);
        desc.alignment = 100_000;
        let err = InternalAllocDescriptor::for_buffer(
            &device,
            desc,
            AccessClass::DeviceLocal,
            ResourceState::Common,
            AllocFlags::NONE,
        )
        .unwrap_err();
        assert!(err.to_string().contains("power of two"));

        desc.alignment = 128 * 1024;
        let d = InternalAllocDescriptor::for_buffer(
            &device,
            desc,
            AccessClass::DeviceLocal,
            ResourceState::Common,
            AllocFlags::NONE,
        )
        .unwrap();
        assert_eq!(d.required_alignment, 128 * 1024);
    }
}

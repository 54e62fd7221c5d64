use crate::utils::{DEFAULT_ALIGNMENT, MSAA_ALIGNMENT, SMALL_ALIGNMENT};

// ===============================================================================================
// Constants
// ===============================================================================================

/// Required byte alignment for raytracing acceleration structure storage.
pub const RAYTRACING_ACCELERATION_STRUCTURE_ALIGNMENT: u64 = 256;
/// Required byte alignment for constant-buffer views, used for sub-buffer offsets.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Opaque identifier of a native heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapHandle(pub u64);

/// Opaque identifier of a native resource object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(pub u64);

// ===============================================================================================
// Memory Access
// ===============================================================================================

/// Which side of the bus reads and writes the memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessClass {
    /// GPU-only memory.
    DeviceLocal,
    /// CPU writes, GPU reads.
    Upload,
    /// GPU writes, CPU reads.
    Readback,
}

impl AccessClass {
    pub const ALL: [Self; 3] = [Self::DeviceLocal, Self::Upload, Self::Readback];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Initial state a resource in this memory is forced into, if any.
    #[must_use]
    pub const fn forced_state(self) -> Option<ResourceState> {
        match self {
            Self::DeviceLocal => None,
            Self::Upload => Some(ResourceState::GenericRead),
            Self::Readback => Some(ResourceState::CopyDestination),
        }
    }
}

// ===============================================================================================
// Resource States
// ===============================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    #[default]
    Common,
    GenericRead,
    CopySource,
    CopyDestination,
    VertexAndConstantBuffer,
    IndexBuffer,
    ShaderResource,
    RenderTarget,
    UnorderedAccess,
    DepthWrite,
    DepthRead,
    StreamOut,
    RaytracingAccelerationStructure,
}

// ===============================================================================================
// Resource Flags
// ===============================================================================================

/// Usage flags carried by a [`ResourceDesc`].
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceFlags {
    pub render_target: bool,
    pub depth_stencil: bool,
    pub unordered_access: bool,
    pub stream_output: bool,
    pub deny_shader_resource: bool,
    pub simultaneous_access: bool,
}

impl ResourceFlags {
    pub const NONE: Self = Self {
        render_target: false,
        depth_stencil: false,
        unordered_access: false,
        stream_output: false,
        deny_shader_resource: false,
        simultaneous_access: false,
    };

    #[must_use]
    pub const fn render_target(mut self) -> Self {
        self.render_target = true;
        self
    }

    #[must_use]
    pub const fn depth_stencil(mut self) -> Self {
        self.depth_stencil = true;
        self
    }

    #[must_use]
    pub const fn unordered_access(mut self) -> Self {
        self.unordered_access = true;
        self
    }

    #[must_use]
    pub const fn stream_output(mut self) -> Self {
        self.stream_output = true;
        self
    }

    #[must_use]
    pub const fn deny_shader_resource(mut self) -> Self {
        self.deny_shader_resource = true;
        self
    }

    #[must_use]
    pub const fn simultaneous_access(mut self) -> Self {
        self.simultaneous_access = true;
        self
    }

    /// True for render-target or depth-stencil usage.
    #[must_use]
    pub const fn is_target(self) -> bool {
        self.render_target || self.depth_stencil
    }
}

// ===============================================================================================
// Formats
// ===============================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Unknown,
    R8Unorm,
    R8G8B8A8Unorm,
    B8G8R8A8Unorm,
    R16G16B16A16Float,
    R32Float,
    R32G32B32A32Float,
    D32Float,
    D24UnormS8Uint,
    Bc1Unorm,
    Bc7Unorm,
}

impl Format {
    /// Bytes occupied by one block (one texel for uncompressed formats).
    #[must_use]
    pub const fn bytes_per_block(self) -> u64 {
        match self {
            Self::Unknown | Self::R8Unorm => 1,
            Self::R8G8B8A8Unorm
            | Self::B8G8R8A8Unorm
            | Self::R32Float
            | Self::D32Float
            | Self::D24UnormS8Uint => 4,
            Self::R16G16B16A16Float | Self::Bc1Unorm => 8,
            Self::R32G32B32A32Float | Self::Bc7Unorm => 16,
        }
    }

    /// Edge length in texels of one block.
    #[must_use]
    pub const fn block_dim(self) -> u32 {
        match self {
            Self::Bc1Unorm | Self::Bc7Unorm => 4,
            _ => 1,
        }
    }

    #[must_use]
    pub const fn is_depth_stencil(self) -> bool {
        matches!(self, Self::D32Float | Self::D24UnormS8Uint)
    }
}

// ===============================================================================================
// Resource Descriptions
// ===============================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceDimension {
    Buffer,
    Texture1D,
    Texture2D,
    Texture3D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleDesc {
    pub count: u32,
    pub quality: u32,
}

impl Default for SampleDesc {
    fn default() -> Self {
        Self {
            count: 1,
            quality: 0,
        }
    }
}

/// Native description of a buffer or texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceDesc {
    pub dimension: ResourceDimension,
    /// Requested placement alignment, 0 lets the device choose.
    pub alignment: u64,
    /// Byte length for buffers, texel width for textures.
    pub width: u64,
    pub height: u32,
    pub depth_or_array_size: u16,
    pub mip_levels: u16,
    pub format: Format,
    pub sample: SampleDesc,
    pub flags: ResourceFlags,
}

impl ResourceDesc {
    #[must_use]
    pub fn buffer(length: u64, flags: ResourceFlags) -> Self {
        Self {
            dimension: ResourceDimension::Buffer,
            alignment: 0,
            width: length,
            height: 1,
            depth_or_array_size: 1,
            mip_levels: 1,
            format: Format::Unknown,
            sample: SampleDesc::default(),
            flags,
        }
    }

    #[must_use]
    pub fn texture_2d(format: Format, width: u64, height: u32) -> Self {
        Self {
            dimension: ResourceDimension::Texture2D,
            alignment: 0,
            width,
            height,
            depth_or_array_size: 1,
            mip_levels: 1,
            format,
            sample: SampleDesc::default(),
            flags: ResourceFlags::NONE,
        }
    }

    #[must_use]
    pub fn texture_3d(format: Format, width: u64, height: u32, depth: u16) -> Self {
        Self {
            dimension: ResourceDimension::Texture3D,
            depth_or_array_size: depth,
            ..Self::texture_2d(format, width, height)
        }
    }

    #[must_use]
    pub const fn with_mips(mut self, mip_levels: u16) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    #[must_use]
    pub const fn with_array_size(mut self, array_size: u16) -> Self {
        self.depth_or_array_size = array_size;
        self
    }

    #[must_use]
    pub const fn with_samples(mut self, count: u32, quality: u32) -> Self {
        self.sample = SampleDesc { count, quality };
        self
    }

    #[must_use]
    pub const fn with_flags(mut self, flags: ResourceFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub const fn is_buffer(&self) -> bool {
        matches!(self.dimension, ResourceDimension::Buffer)
    }

    #[must_use]
    pub const fn is_multisampled(&self) -> bool {
        self.sample.count > 1
    }
}

/// Size and alignment a device requires to place a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceAllocationInfo {
    pub size: u64,
    pub alignment: u64,
}

impl ResourceAllocationInfo {
    /// Size reported for a description the device cannot place.
    pub const UNPLACEABLE_SIZE: u64 = u64::MAX;

    #[must_use]
    pub const fn is_placeable(&self) -> bool {
        self.size != Self::UNPLACEABLE_SIZE && self.alignment.is_power_of_two()
    }
}

/// Output of a raytracing acceleration structure prebuild query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RaytracingPrebuildInfo {
    pub result_data_max_size: u64,
    pub scratch_data_size: u64,
    pub update_scratch_data_size: u64,
}

// ===============================================================================================
// Heap Categories
// ===============================================================================================

/// What kind of resource a heap may hold on devices that cannot mix them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    Buffer,
    Texture,
    TargetTexture,
    AccelerationStructure,
}

impl ResourceCategory {
    pub const ALL: [Self; 4] = [
        Self::Buffer,
        Self::Texture,
        Self::TargetTexture,
        Self::AccelerationStructure,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn classify(desc: &ResourceDesc, state: ResourceState) -> Self {
        if matches!(state, ResourceState::RaytracingAccelerationStructure) {
            Self::AccelerationStructure
        } else if desc.is_buffer() {
            Self::Buffer
        } else if desc.flags.is_target() {
            Self::TargetTexture
        } else {
            Self::Texture
        }
    }

    /// Whether the native heap for this category must hold buffers.
    #[must_use]
    pub const fn holds_buffers(self) -> bool {
        matches!(self, Self::Buffer | Self::AccelerationStructure)
    }

    /// Whether resources of both categories may live in one heap on a device
    /// without merged heap support.
    #[must_use]
    pub fn shares_heap_with(self, other: Self) -> bool {
        self.holds_buffers() == other.holds_buffers() && (self.holds_buffers() || self == other)
    }
}

/// Coarse alignment tier of a request, used to partition pools on devices
/// without merged heap support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlignmentClass {
    Small,
    Medium,
    Large,
}

impl AlignmentClass {
    pub const ALL: [Self; 3] = [Self::Small, Self::Medium, Self::Large];

    #[must_use]
    pub const fn for_alignment(alignment: u64) -> Self {
        if alignment <= SMALL_ALIGNMENT {
            Self::Small
        } else if alignment <= DEFAULT_ALIGNMENT {
            Self::Medium
        } else {
            Self::Large
        }
    }

    #[must_use]
    pub const fn bytes(self) -> u64 {
        match self {
            Self::Small => SMALL_ALIGNMENT,
            Self::Medium => DEFAULT_ALIGNMENT,
            Self::Large => MSAA_ALIGNMENT,
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Parameters for a native heap creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapDesc {
    pub size: u64,
    pub alignment: u64,
    pub access: AccessClass,
    /// `None` when the heap may hold any resource kind.
    pub category: Option<ResourceCategory>,
}

mod common;

use common::{placed_allocator, placed_allocator_on};
use gpuheap_rs::alloc::{AllocFlags, AllocatorConfig, Backing, Releasable};
use gpuheap_rs::error::ErrorKind;
use gpuheap_rs::native::{
    AccessClass, DeviceCapabilities, Format, ResourceDesc, ResourceFlags, ResourceState, SimCall,
};
use gpuheap_rs::utils::{KIB, MIB};

fn target_desc() -> ResourceDesc {
    ResourceDesc::texture_2d(Format::R8G8B8A8Unorm, 512, 512)
        .with_flags(ResourceFlags::NONE.render_target())
}

#[test]
fn texture_alias_shares_the_buffer_block() {
    let (device, allocator) = placed_allocator(AllocatorConfig::new());
    let buffer = allocator
        .allocate_buffer(2 * MIB, AccessClass::DeviceLocal, AllocFlags::NONE)
        .unwrap();
    let free_before = allocator.stats().free_bytes();

    let texture = allocator
        .allocate_texture_aliasing(
            &buffer,
            target_desc(),
            ResourceState::RenderTarget,
            AllocFlags::NONE,
        )
        .unwrap();

    let owner = allocator.allocation_info(&buffer).unwrap();
    let alias = allocator.allocation_info(&texture).unwrap();
    assert_eq!(alias.offset(), owner.offset());
    assert_eq!(alias.heap_index(), owner.heap_index());
    assert_eq!(
        alias.backing,
        Backing::Alias {
            of: buffer.allocation_id().unwrap(),
            key: match owner.backing {
                Backing::Placed { key, .. } => key,
                other => panic!("unexpected {other:?}"),
            },
            heap_index: 0,
            offset: 0,
        }
    );
    assert_ne!(texture.resource(), buffer.resource());
    assert_eq!(texture.initial_state(), ResourceState::RenderTarget);

    let stats = allocator.stats();
    assert_eq!(stats.aliases, 1);
    assert_eq!(stats.free_bytes(), free_before);
    assert_eq!(device.call_count(SimCall::CreateHeap), 1);
}

#[test]
fn releasing_an_alias_keeps_the_block_owned() {
    let (device, allocator) = placed_allocator(AllocatorConfig::new());
    let mut buffer = allocator
        .allocate_buffer(2 * MIB, AccessClass::DeviceLocal, AllocFlags::NONE)
        .unwrap();
    let mut alias = allocator
        .allocate_buffer_aliasing(&buffer, ResourceDesc::buffer(MIB, ResourceFlags::NONE), AllocFlags::NONE)
        .unwrap();
    let free_before = allocator.stats().free_bytes();

    alias.release().unwrap();
    assert_eq!(allocator.stats().free_bytes(), free_before);
    assert_eq!(device.live_resource_count(), 1);

    buffer.release().unwrap();
    assert_eq!(allocator.stats().free_bytes(), free_before + 2 * MIB);
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn alias_of_an_alias_points_at_the_owner() {
    let (_device, allocator) = placed_allocator(AllocatorConfig::new());
    let buffer = allocator
        .allocate_buffer(2 * MIB, AccessClass::DeviceLocal, AllocFlags::NONE)
        .unwrap();
    let first = allocator
        .allocate_texture_aliasing(
            &buffer,
            target_desc(),
            ResourceState::RenderTarget,
            AllocFlags::NONE,
        )
        .unwrap();
    let second = allocator
        .allocate_buffer_aliasing(&first, ResourceDesc::buffer(64 * KIB, ResourceFlags::NONE), AllocFlags::NONE)
        .unwrap();

    let info = allocator.allocation_info(&second).unwrap();
    let Backing::Alias { of, .. } = info.backing else {
        panic!("expected an alias, got {:?}", info.backing);
    };
    assert_eq!(Some(of), buffer.allocation_id());
    assert_eq!(second.length(), 64 * KIB);
}

#[test]
fn committed_resources_cannot_be_aliased() {
    let (_device, allocator) = placed_allocator(AllocatorConfig::new());
    let committed = allocator
        .allocate_buffer(
            MIB,
            AccessClass::DeviceLocal,
            AllocFlags::NONE.force_committed(),
        )
        .unwrap();

    let err = allocator
        .allocate_buffer_aliasing(&committed, ResourceDesc::buffer(KIB, ResourceFlags::NONE), AllocFlags::NONE)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("committed"));
}

#[test]
fn sub_buffers_cannot_be_aliased() {
    let (_device, allocator) = placed_allocator(AllocatorConfig::new());
    let small = allocator
        .allocate_buffer(512, AccessClass::DeviceLocal, AllocFlags::NONE)
        .unwrap();
    assert!(matches!(
        allocator.allocation_info(&small).unwrap().backing,
        Backing::SubBuffer { .. }
    ));

    let err = allocator
        .allocate_buffer_aliasing(&small, ResourceDesc::buffer(256, ResourceFlags::NONE), AllocFlags::NONE)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn released_resources_cannot_be_aliased() {
    let (_device, allocator) = placed_allocator(AllocatorConfig::new());
    let mut buffer = allocator
        .allocate_buffer(MIB, AccessClass::DeviceLocal, AllocFlags::NONE)
        .unwrap();
    buffer.release().unwrap();

    let err = allocator
        .allocate_buffer_aliasing(&buffer, ResourceDesc::buffer(KIB, ResourceFlags::NONE), AllocFlags::NONE)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn alias_cannot_be_forced_committed() {
    let (_device, allocator) = placed_allocator(AllocatorConfig::new());
    let buffer = allocator
        .allocate_buffer(MIB, AccessClass::DeviceLocal, AllocFlags::NONE)
        .unwrap();
    let err = allocator
        .allocate_buffer_aliasing(
            &buffer,
            ResourceDesc::buffer(KIB, ResourceFlags::NONE),
            AllocFlags::NONE.force_committed(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn upload_memory_cannot_back_a_texture() {
    let (_device, allocator) = placed_allocator(AllocatorConfig::new());
    let upload = allocator
        .allocate_buffer(4 * MIB, AccessClass::Upload, AllocFlags::NONE)
        .unwrap();

    let err = allocator
        .allocate_texture_aliasing(
            &upload,
            ResourceDesc::texture_2d(Format::R8Unorm, 256, 256),
            ResourceState::Common,
            AllocFlags::NONE,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn upload_alias_inherits_the_forced_state() {
    let (_device, allocator) = placed_allocator(AllocatorConfig::new());
    let upload = allocator
        .allocate_buffer(MIB, AccessClass::Upload, AllocFlags::NONE)
        .unwrap();
    let alias = allocator
        .allocate_buffer_aliasing(&upload, ResourceDesc::buffer(MIB, ResourceFlags::NONE), AllocFlags::NONE)
        .unwrap();
    assert_eq!(alias.access(), AccessClass::Upload);
    assert_eq!(alias.initial_state(), ResourceState::GenericRead);
}

#[test]
fn split_heaps_refuse_cross_category_aliases() {
    let caps = DeviceCapabilities {
        merged_heaps: false,
        ..DeviceCapabilities::default()
    };
    let (_device, allocator) = placed_allocator_on(caps, AllocatorConfig::new());
    let buffer = allocator
        .allocate_buffer(4 * MIB, AccessClass::DeviceLocal, AllocFlags::NONE)
        .unwrap();

    let err = allocator
        .allocate_texture_aliasing(
            &buffer,
            ResourceDesc::texture_2d(Format::R8G8B8A8Unorm, 256, 256),
            ResourceState::Common,
            AllocFlags::NONE,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Buffer over buffer is still fine.
    allocator
        .allocate_buffer_aliasing(&buffer, ResourceDesc::buffer(MIB, ResourceFlags::NONE), AllocFlags::NONE)
        .unwrap();
}

#[test]
fn alias_needs_a_suitably_aligned_block() {
    let (_device, allocator) = placed_allocator(AllocatorConfig::new());
    // Two small textures: the second lands at 4 KiB, not on a 64 KiB boundary.
    let desc = ResourceDesc::texture_2d(Format::R8G8B8A8Unorm, 32, 32);
    let _first = allocator
        .allocate_texture(desc, ResourceState::Common, AllocFlags::NONE)
        .unwrap();
    let second = allocator
        .allocate_texture(desc, ResourceState::Common, AllocFlags::NONE)
        .unwrap();
    assert_eq!(allocator.allocation_info(&second).unwrap().offset(), Some(4 * KIB));

    let err = allocator
        .allocate_buffer_aliasing(&second, ResourceDesc::buffer(KIB, ResourceFlags::NONE), AllocFlags::NONE)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn handles_of_another_allocator_are_refused() {
    let (device_a, alloc_a) = placed_allocator(AllocatorConfig::new());
    let (_device_b, alloc_b) = placed_allocator(AllocatorConfig::new());
    let _a = alloc_a
        .allocate_buffer(MIB, AccessClass::DeviceLocal, AllocFlags::NONE)
        .unwrap();
    let b = alloc_b
        .allocate_buffer(MIB, AccessClass::DeviceLocal, AllocFlags::NONE)
        .unwrap();
    let placed_before = device_a.call_count(SimCall::CreatePlacedResource);

    let err = alloc_a
        .allocate_buffer_aliasing(&b, ResourceDesc::buffer(KIB, ResourceFlags::NONE), AllocFlags::NONE)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(alloc_a.allocation_info(&b).is_none());
    assert!(alloc_b.allocation_info(&b).is_some());
    assert_eq!(device_a.call_count(SimCall::CreatePlacedResource), placed_before);
    assert_eq!(alloc_a.stats().aliases, 0);
}

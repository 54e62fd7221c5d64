use gpuheap_rs::alloc::{AllocFlags, AllocatorConfig, GpuAllocator, GpuResource, Releasable};
use gpuheap_rs::error::AllocResult;
use gpuheap_rs::native::{
    AccessClass, DeviceCapabilities, Format, GpuVendor, ResourceDesc, ResourceFlags,
    ResourceState, SimCall, SimDevice,
};
use gpuheap_rs::utils::{MIB, format_bytes};
use std::sync::Arc;

fn print_report(allocator: &GpuAllocator) {
    let stats = allocator.stats();
    println!("------------------------------------------------------------");
    println!(
        " Heaps: {}   Total: {}   Free: {}   Largest free: {}",
        stats.heap_count(),
        format_bytes(stats.heap_bytes()),
        format_bytes(stats.free_bytes()),
        format_bytes(stats.largest_free_block())
    );
    println!(
        " Placed: {}   Committed: {} ({})   Sub-buffers: {} in {} arenas   Evicted: {}",
        stats.placed,
        stats.committed,
        format_bytes(stats.committed_bytes),
        stats.sub_buffers,
        stats.arenas,
        stats.evicted
    );
    println!("------------------------------------------------------------");
    for pool in &stats.pools {
        println!(
            "    {:<12} {:<22} {:>2} heap(s)  used {:>10}  free {:>10} in {} block(s)",
            format!("{:?}", pool.key.access),
            format!("{:?}/{:?}", pool.key.category, pool.key.alignment),
            pool.heap_count,
            format_bytes(pool.used_bytes()),
            format_bytes(pool.free_bytes),
            pool.free_blocks
        );
    }
}

fn main() -> AllocResult<()> {
    env_logger::init();

    println!("============================================================");
    println!("                  GPU Heap Allocator Report                 ");
    println!("============================================================");

    let device = Arc::new(SimDevice::new(DeviceCapabilities {
        vendor: GpuVendor::from_pci_id(0x1002),
        memory_budget: 2048 * MIB,
        ..DeviceCapabilities::default()
    }));
    let allocator = GpuAllocator::new(device.clone(), AllocatorConfig::new());
    let mut live: Vec<GpuResource> = Vec::new();

    println!("[+] Streaming vertex and constant data...");
    for i in 0..32u64 {
        let buffer = allocator.allocate_buffer(256 + i * 512, AccessClass::Upload, AllocFlags::NONE)?;
        live.push(buffer.into());
    }
    for i in 1..=8u64 {
        let buffer = allocator.allocate_buffer(i * MIB, AccessClass::DeviceLocal, AllocFlags::NONE)?;
        live.push(buffer.into());
    }

    println!("[+] Creating material textures...");
    for edge in [256u64, 512, 1024, 2048] {
        let desc = ResourceDesc::texture_2d(Format::Bc7Unorm, edge, edge as u32).with_mips(8);
        live.push(allocator.allocate_texture(desc, ResourceState::ShaderResource, AllocFlags::NONE)?.into());
    }

    println!("[+] Creating render targets...");
    let color = ResourceDesc::texture_2d(Format::R16G16B16A16Float, 1920, 1080)
        .with_flags(ResourceFlags::NONE.render_target());
    let depth = ResourceDesc::texture_2d(Format::D32Float, 1920, 1080)
        .with_flags(ResourceFlags::NONE.depth_stencil().deny_shader_resource());
    live.push(allocator.allocate_texture(color, ResourceState::RenderTarget, AllocFlags::NONE)?.into());
    live.push(allocator.allocate_texture(depth, ResourceState::DepthWrite, AllocFlags::NONE)?.into());

    print_report(&allocator);

    println!("\n[+] Releasing every other resource...");
    for (i, resource) in live.iter_mut().enumerate() {
        if i % 2 == 0 {
            resource.release()?;
        }
    }
    allocator.verify_heaps()?;
    print_report(&allocator);

    println!("\n[+] Purged {} evicted resource(s)", allocator.purge_evicted());
    drop(live);
    drop(allocator);

    println!(
        "[+] Native calls: {} heaps created, {} placed, {} committed",
        device.call_count(SimCall::CreateHeap),
        device.call_count(SimCall::CreatePlacedResource),
        device.call_count(SimCall::CreateCommittedResource)
    );
    println!("[+] Heaps left after teardown: {}", device.heap_count());
    Ok(())
}

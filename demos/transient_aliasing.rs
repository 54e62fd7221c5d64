use gpuheap_rs::alloc::{
    AllocFlags, AllocatorConfig, DeferredReleases, GpuAllocator, PreferPlacedPolicy, Releasable,
};
use gpuheap_rs::error::AllocResult;
use gpuheap_rs::native::{AccessClass, Format, ResourceDesc, ResourceFlags, ResourceState, SimDevice};
use gpuheap_rs::utils::{MIB, format_bytes};
use std::sync::Arc;

const FRAMES: u64 = 4;

fn main() -> AllocResult<()> {
    env_logger::init();

    println!("============================================================");
    println!("              Transient Render Target Aliasing              ");
    println!("============================================================");

    let device = Arc::new(SimDevice::default());
    let allocator = GpuAllocator::with_policy(device.clone(), AllocatorConfig::new(), PreferPlacedPolicy);
    let mut retired = DeferredReleases::new();

    // One block backs every transient pass of a frame.
    let scratch = allocator.allocate_buffer(
        32 * MIB,
        AccessClass::DeviceLocal,
        AllocFlags::NONE.force_not_committed(),
    )?;
    let info = allocator.allocation_info(&scratch);
    println!(
        "[+] Transient block: {} at {:?}",
        format_bytes(32 * MIB),
        info.and_then(|i| i.offset())
    );

    let passes = [
        ("bloom", ResourceDesc::texture_2d(Format::R16G16B16A16Float, 960, 540)),
        ("ssao", ResourceDesc::texture_2d(Format::R8Unorm, 1920, 1080)),
        ("blur", ResourceDesc::texture_2d(Format::R8G8B8A8Unorm, 1920, 1080)),
    ];

    for frame in 1..=FRAMES {
        println!("\n[+] Frame {frame}");
        for (name, desc) in passes {
            let desc = desc.with_flags(ResourceFlags::NONE.render_target());
            let target = allocator.allocate_texture_aliasing(
                &scratch,
                desc,
                ResourceState::RenderTarget,
                AllocFlags::NONE,
            )?;
            println!("    {name:<6} -> {:?}", target.resource());
            retired.defer(target, frame);
        }

        // The GPU trails the CPU by one frame.
        let released = retired.retire(frame.saturating_sub(1))?;
        println!("    retired {released} alias(es), {} in flight", retired.len());
    }

    retired.flush()?;
    let stats = allocator.stats();
    println!(
        "\n[+] {} heap(s), {} used, {} alias(es) alive",
        stats.heap_count(),
        format_bytes(stats.heap_bytes() - stats.free_bytes()),
        stats.aliases
    );

    let mut scratch = scratch;
    scratch.release()?;
    println!("[+] Live native resources: {}", device.live_resource_count());
    Ok(())
}

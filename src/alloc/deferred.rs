use crate::alloc::resource::{GpuResource, Releasable};
use crate::error::AllocResult;
use std::collections::VecDeque;

/// Handles waiting for the GPU to pass a completion point before release.
///
/// The allocator itself never waits on GPU work; callers queue handles here
/// with the fence value of the last submission using them and call
/// [`DeferredReleases::retire`] with the value the GPU has reached.
#[derive(Debug, Default)]
pub struct DeferredReleases {
    pending: VecDeque<(u64, GpuResource)>,
}

impl DeferredReleases {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&mut self, resource: impl Into<GpuResource>, completion_point: u64) {
        self.pending.push_back((completion_point, resource.into()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Release every handle whose completion point is at most `completed`,
    /// in the order they were deferred. Returns how many were released.
    ///
    /// # Errors
    /// The first release failure. Remaining eligible handles are still released.
    pub fn retire(&mut self, completed: u64) -> AllocResult<usize> {
        let mut first_error = None;
        let mut released = 0;
        let mut kept = VecDeque::with_capacity(self.pending.len());

        for (point, mut resource) in self.pending.drain(..) {
            if point > completed {
                kept.push_back((point, resource));
                continue;
            }
            if let Err(e) = resource.release() {
                log::warn!("Deferred release at point {point} failed: {e}");
                first_error.get_or_insert(e);
            }
            released += 1;
        }
        self.pending = kept;

        match first_error {
            Some(e) => Err(e),
            None => Ok(released),
        }
    }

    /// Release everything regardless of completion point.
    ///
    /// # Errors
    /// As [`DeferredReleases::retire`].
    pub fn flush(&mut self) -> AllocResult<usize> {
        self.retire(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::config::AllocatorConfig;
    use crate::alloc::flags::AllocFlags;
    use crate::alloc::manager::GpuAllocator;
    use crate::alloc::strategy::PreferPlacedPolicy;
    use crate::native::desc::AccessClass;
    use crate::native::sim::SimDevice;
    use std::sync::Arc;

    fn allocator() -> (Arc<SimDevice>, GpuAllocator) {
        let device = Arc::new(SimDevice::default());
        let allocator = GpuAllocator::with_policy(
            device.clone(),
            AllocatorConfig::new(),
            PreferPlacedPolicy,
        );
        (device, allocator)
    }

    #[test]
    fn retires_only_completed_points() {
        let (device, allocator) = allocator();
        let flags = AllocFlags::NONE.no_buffer_suballocation();
        let mut queue = DeferredReleases::new();

        queue.defer(allocator.allocate_buffer(1024, AccessClass::DeviceLocal, flags).unwrap(), 5);
        queue.defer(allocator.allocate_buffer(1024, AccessClass::DeviceLocal, flags).unwrap(), 9);
        assert_eq!(device.live_resource_count(), 2);

        assert_eq!(queue.retire(4).unwrap(), 0);
        assert_eq!(queue.retire(5).unwrap(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(device.live_resource_count(), 1);

        assert_eq!(queue.flush().unwrap(), 1);
        assert!(queue.is_empty());
        assert_eq!(device.live_resource_count(), 0);
    }

    #[test]
    fn keeps_submission_order_for_equal_points() {
        let (_device, allocator) = allocator();
        let mut queue = DeferredReleases::new();
        let a = allocator
            .allocate_buffer(256, AccessClass::Upload, AllocFlags::NONE)
            .unwrap();
        let b = allocator
            .allocate_buffer(256, AccessClass::Upload, AllocFlags::NONE)
            .unwrap();
        let (a_off, b_off) = (a.offset(), b.offset());
        queue.defer(a, 1);
        queue.defer(b, 1);
        queue.retire(1).unwrap();

        // LIFO reuse in the arena: the last block returned comes back first.
        let c = allocator
            .allocate_buffer(256, AccessClass::Upload, AllocFlags::NONE)
            .unwrap();
        assert_eq!(c.offset(), b_off);
        assert_ne!(c.offset(), a_off);
    }
}

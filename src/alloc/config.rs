use crate::heap::HeapSizes;
use crate::utils::{KIB, MIB};

/// Logging switches, all off except leak reporting.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DebugSettings {
    /// Log every allocation with level Trace.
    pub log_allocations: bool,
    /// Log every release with level Trace.
    pub log_releases: bool,
    /// Log allocations still alive when the allocator is torn down, with level Warn.
    pub log_leaks_on_shutdown: bool,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            log_allocations: false,
            log_releases: false,
            log_leaks_on_shutdown: true,
        }
    }
}

/// Tunables of a [`GpuAllocator`](crate::alloc::GpuAllocator).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AllocatorConfig {
    pub heap_sizes: HeapSizes,
    /// Requests larger than this are never placed.
    pub max_heap_size: u64,
    /// Merge returned blocks with adjacent free blocks.
    pub coalesce_on_return: bool,
    /// Scan free lists after every mutation and abort on corruption.
    pub verify_heaps: bool,
    /// Buffers below this size may share a native buffer.
    pub small_buffer_threshold: u64,
    /// Size of each shared native buffer.
    pub arena_size: u64,
    pub debug: DebugSettings,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            heap_sizes: HeapSizes::default(),
            max_heap_size: 256 * MIB,
            coalesce_on_return: false,
            verify_heaps: cfg!(debug_assertions),
            small_buffer_threshold: 64 * KIB,
            arena_size: 4 * MIB,
            debug: DebugSettings::default(),
        }
    }
}

impl AllocatorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn heap_sizes(mut self, heap_sizes: HeapSizes) -> Self {
        self.heap_sizes = heap_sizes;
        self
    }

    #[must_use]
    pub const fn max_heap_size(mut self, max_heap_size: u64) -> Self {
        self.max_heap_size = max_heap_size;
        self
    }

    #[must_use]
    pub const fn coalesce_on_return(mut self, coalesce: bool) -> Self {
        self.coalesce_on_return = coalesce;
        self
    }

    #[must_use]
    pub const fn verify_heaps(mut self, verify: bool) -> Self {
        self.verify_heaps = verify;
        self
    }

    /// Disable buffer suballocation by setting the threshold to zero.
    #[must_use]
    pub const fn small_buffer_threshold(mut self, threshold: u64) -> Self {
        self.small_buffer_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn arena_size(mut self, arena_size: u64) -> Self {
        self.arena_size = arena_size;
        self
    }

    #[must_use]
    pub const fn debug(mut self, debug: DebugSettings) -> Self {
        self.debug = debug;
        self
    }
}

//! Heap configuration. Every tunable named in the runtime's configuration
//! surface is a field here, set once at [`crate::heap::Heap::new`] and
//! never read back out of ambient global state — except the watch
//! address, which genuinely needs to be visible to code with no config
//! handle in scope (see [`crate::heap::Heap::watch`]).

#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Total size in bytes of each young semispace half.
    pub young_size: usize,
    /// Per-thread bump-allocation slab carved out of the young to-space.
    pub slab_size: usize,
    /// Age (number of young survivals) at which an object is promoted to
    /// the Immix mature space instead of copied again.
    pub promotion_age: u8,
    /// Requests at or above this size go straight to the large/overflow
    /// pool, bypassing young and Immix entirely.
    pub large_object_threshold: usize,
    /// Total bytes reserved for the Immix chunk arena.
    pub immix_heap_size: usize,
    /// Whether Immix marking may run on a dedicated thread overlapped
    /// with mutation (insertion write barrier) instead of stop-the-world.
    pub immix_concurrent: bool,
    /// Foreign (non-managed) allocation budget per thread before a
    /// mature collection is requested; see the allocator facade's
    /// raw-allocation counter.
    pub malloc_threshold: isize,
    /// Emit structured pause reports to stderr.
    pub verbose: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            young_size: 4 * 1024 * 1024,
            slab_size: 4 * 1024,
            promotion_age: 3,
            large_object_threshold: 64 * 1024,
            immix_heap_size: 64 * 1024 * 1024,
            immix_concurrent: false,
            malloc_threshold: 8 * 1024 * 1024,
            verbose: false,
        }
    }
}

impl GcConfig {
    pub fn with_young_size(mut self, bytes: usize) -> Self {
        self.young_size = bytes;
        self
    }

    pub fn with_immix_heap_size(mut self, bytes: usize) -> Self {
        self.immix_heap_size = bytes;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

//! C6/C7: the allocator facade and world coordinator that tie every pool
//! together. Adapted from the teacher's `Heap`/`GlobalAllocator`
//! (size-routed allocation, `collect_garbage`, `DeferPoint`-style
//! scoping) and its `LocalHeap`/`Mutator` thread bookkeeping, with the
//! single mark-sweep block arena replaced by this crate's young → immix
//! → large pipeline.

use crate::api::{Gc, Weak};
use crate::config::GcConfig;
use crate::error::{GcError, GcResult};
use crate::header::HeapObjectHeader;
use crate::immix::ImmixHeap;
use crate::large::LargeSpace;
use crate::mutator::ThreadRecord;
use crate::safepoint::GlobalSafepoint;
use crate::statistics::Statistics;
use crate::tlab::TLAB_INLINE_LIMIT;
use crate::trace::{Trace, Visitor};
use crate::util::align_up;
use crate::young::YoungGeneration;
use parking_lot::Mutex;
use std::mem::size_of;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Process-wide watch address (§6, §9). Kept outside `Heap` because the
/// diagnostic must be reachable from code with no config handle in
/// scope; behavior depends only on the value, not on where it lives.
static WATCH_ADDRESS: AtomicUsize = AtomicUsize::new(0);

pub fn set_watch_address(addr: usize) {
    WATCH_ADDRESS.store(addr, Ordering::Relaxed);
}

fn check_watch(raw: *const u8, event: &str) {
    let watch = WATCH_ADDRESS.load(Ordering::Relaxed);
    if watch != 0 && watch == raw as usize {
        eprintln!("ossuary: watch {:p}: {}", raw, event);
    }
}

/// Owns every pool, the thread registry, and the safepoint protocol. One
/// per independent managed universe — the inflation spinlock (§4.1) and
/// the foreign-allocation counter (§9) are both scoped to one `Heap`
/// rather than truly process-global, so multiple heaps never contend
/// with each other.
pub struct Heap {
    config: Arc<GcConfig>,
    young: Mutex<YoungGeneration>,
    immix: Mutex<ImmixHeap>,
    large: LargeSpace,
    safepoint: GlobalSafepoint,
    statistics: Mutex<Statistics>,
    collect_young: AtomicBool,
    collect_mature: AtomicBool,
    /// Aggregated foreign-allocation budget (§9 Open Question): summed
    /// from every thread record's own counter at each safepoint, never
    /// written to directly by a mutator thread.
    foreign_budget: AtomicI64,
    /// Mature→young (or mature→mature) edges logged by the write barrier
    /// since the last young collection drained every thread's write log
    /// into this one, deduplicated (§4.3's remembered set).
    remembered: Mutex<Vec<*mut HeapObjectHeader>>,
    /// Objects kept alive regardless of reachability because a foreign
    /// handle currently references them (§6's Mutator API).
    pinned: Mutex<Vec<*mut HeapObjectHeader>>,
}

unsafe impl Send for Heap {}
unsafe impl Sync for Heap {}

impl Heap {
    pub fn new(config: GcConfig) -> Self {
        let config = Arc::new(config);
        Self {
            young: Mutex::new(YoungGeneration::new(config.young_size, config.promotion_age)),
            immix: Mutex::new(ImmixHeap::new(&config)),
            large: LargeSpace::new(),
            safepoint: GlobalSafepoint::new(),
            statistics: Mutex::new(Statistics::default()),
            collect_young: AtomicBool::new(false),
            collect_mature: AtomicBool::new(false),
            foreign_budget: AtomicI64::new(config.malloc_threshold as i64),
            remembered: Mutex::new(Vec::new()),
            pinned: Mutex::new(Vec::new()),
            config,
        }
    }

    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    pub fn live_bytes(&self) -> usize {
        self.statistics.lock().live_bytes()
    }

    pub fn total_allocated(&self) -> u64 {
        self.statistics.lock().total_allocated()
    }

    pub fn print_statistics(&self) {
        eprint!("{}", self.statistics.lock());
    }

    /// Register a new mutator thread. The returned handle unregisters and
    /// releases the thread record when dropped (mirrors the teacher's
    /// `DeferPoint` scoping idiom).
    pub fn register_thread(&self) -> MutatorHandle<'_> {
        let record = Box::into_raw(Box::new(ThreadRecord::new(self.config.clone())));
        self.safepoint.register(record);
        crate::mutator::set_current(record);
        MutatorHandle { heap: self, record }
    }

    // --- C6: allocator facade --------------------------------------

    /// `new_object`: try the young generation first, escalating to
    /// Immix then the large pool on exhaustion (§4.6).
    pub fn allocate<T: Trace + 'static>(&self, thread: &MutatorHandle, value: T) -> GcResult<Gc<T>> {
        let total = align_up(size_of::<HeapObjectHeader>() + size_of::<T>(), 8);
        if total >= self.config.large_object_threshold {
            return self.allocate_enduring(value);
        }
        if total <= TLAB_INLINE_LIMIT {
            match unsafe { thread.record().tlab().try_allocate(value) } {
                Ok(gc) => return Ok(self.finish_tlab(gc, total, "allocated (tlab)")),
                Err(value) => return self.allocate_young_slow(thread, value, total),
            }
        }
        self.allocate_young_slow(thread, value, total)
    }

    fn allocate_young_slow<T: Trace + 'static>(
        &self,
        thread: &MutatorHandle,
        value: T,
        total: usize,
    ) -> GcResult<Gc<T>> {
        let raw = {
            let mut young = self.young.lock();
            young.try_allocate_raw(total)
        };
        if let Some(raw) = raw {
            return Ok(self.finish(raw, total, total, value, "allocated (young)"));
        }
        if total <= TLAB_INLINE_LIMIT && self.refill_tlab(thread) {
            if let Ok(gc) = unsafe { thread.record().tlab().try_allocate(value) } {
                return Ok(self.finish_tlab(gc, total, "allocated (tlab, refilled)"));
            }
            // Refilled slab was smaller than `total` (shouldn't happen
            // since slab_size >= TLAB_INLINE_LIMIT by convention, but
            // fall through to mature rather than assume it).
            unreachable!("refilled tlab rejected a request under the inline limit");
        }
        self.collect_young.store(true, Ordering::Relaxed);
        self.allocate_mature(value)
    }

    fn refill_tlab(&self, thread: &MutatorHandle) -> bool {
        let mut young = self.young.lock();
        match young.try_allocate_raw(self.config.slab_size) {
            Some(raw) => {
                unsafe { thread.record().tlab().install(raw, self.config.slab_size) };
                true
            }
            None => false,
        }
    }

    /// `new_mature_object`: skip young, allocate directly into Immix
    /// (escalating to the large pool on exhaustion).
    pub fn allocate_mature<T: Trace + 'static>(&self, value: T) -> GcResult<Gc<T>> {
        let total = align_up(size_of::<HeapObjectHeader>() + size_of::<T>(), 8);
        if total >= self.config.large_object_threshold {
            return self.allocate_enduring(value);
        }
        let raw = {
            let mut immix = self.immix.lock();
            immix.allocate_raw(total)
        };
        match raw {
            Some(raw) => Ok(self.finish(raw, total, total, value, "allocated (immix)")),
            None => {
                self.collect_mature.store(true, Ordering::Relaxed);
                self.allocate_enduring(value)
            }
        }
    }

    /// `new_enduring_object`: force the large/overflow pool regardless of
    /// size (class metaobjects, system constants, and the fallback for
    /// every escalation above).
    pub fn allocate_enduring<T: Trace + 'static>(&self, value: T) -> GcResult<Gc<T>> {
        let total = align_up(size_of::<HeapObjectHeader>() + size_of::<T>(), 8);
        match self.large.allocate(total) {
            // The header's own `SizeUnits` field tops out at 65528 bytes
            // (§ header.rs), well under any real large-object request, so
            // it is left at 0 here; `LargeAllocation::cell_size` is the
            // real size of record for this pool.
            Some(raw) => Ok(self.finish(raw.cast(), total, 0, value, "allocated (large)")),
            None => Err(GcError::OutOfMemory),
        }
    }

    fn finish<T: Trace + 'static>(
        &self,
        raw: *mut u8,
        total: usize,
        header_size_field: usize,
        value: T,
        event: &str,
    ) -> Gc<T> {
        unsafe {
            let type_index = crate::api::register::<T>().0;
            let header = raw.cast::<HeapObjectHeader>();
            header.write(HeapObjectHeader::new(type_index, header_size_field));
            let payload = raw.add(size_of::<HeapObjectHeader>());
            payload.cast::<T>().write(value);
            if std::mem::needs_drop::<T>() {
                self.record_finalizable(header);
            }
            self.statistics.lock().note_allocation(total);
            let gc = Gc::<T>::from_header(NonNull::new_unchecked(header));
            check_watch(gc.as_raw(), event);
            gc
        }
    }

    /// `Tlab::try_allocate` writes the header and payload itself (it has
    /// no access to `Heap`), so this finishes what [`Self::finish`] does
    /// for the other two paths: stats, finalizer registration, watch.
    fn finish_tlab<T: Trace + 'static>(&self, gc: Gc<T>, total: usize, event: &str) -> Gc<T> {
        if std::mem::needs_drop::<T>() {
            self.record_finalizable(gc.as_raw().cast());
        }
        self.statistics.lock().note_allocation(total);
        check_watch(gc.as_raw(), event);
        gc
    }

    /// Called from [`Self::finish`] and [`Self::finish_tlab`], both of
    /// which always run with no pool lock held by the caller —
    /// `parking_lot::Mutex` is not reentrant, so every allocation path
    /// drops its pool lock before reaching here.
    fn record_finalizable(&self, header: *mut HeapObjectHeader) {
        let in_young = self.young.lock().has_from_address(header as *mut u8);
        if in_young {
            self.young.lock().record_finalizable(header);
            return;
        }
        let in_immix = self.immix.lock().has_address(header as *const u8);
        if in_immix {
            self.immix.lock().record_finalizable(header);
        }
        // Large objects are swept unconditionally by `LargeSpace::sweep`,
        // which already consults the type info table's finalizer itself.
    }

    /// Charge a raw (non-managed) allocation against `thread`'s foreign
    /// budget (§4.6, "raw byte allocations made outside the managed
    /// heap"). Aggregation into the heap-wide counter happens lazily at
    /// the next safepoint rather than here, per §9's Open Question
    /// resolution.
    pub fn charge_foreign_allocation(&self, thread: &MutatorHandle, bytes: usize) {
        thread.record().charge_foreign_allocation(bytes);
    }

    /// Inflate `gc`'s header if needed and hand back a [`Weak<T>`] backed
    /// by that record (§3, §4.7 step 4). Registers the new index with
    /// whichever pool currently owns the object, so that pool's own
    /// collection passes keep the record's address current and null it
    /// once the object dies.
    pub fn downgrade<T: Trace + 'static>(&self, gc: Gc<T>) -> Weak<T> {
        let header = gc.header() as *const HeapObjectHeader as *mut HeapObjectHeader;
        let index = crate::inflate::ensure_inflated(unsafe { &*header });
        crate::inflate::table().get(index).set_object(header);
        if self.young.lock().has_from_address(header as *mut u8) {
            self.young.lock().record_weak(index);
        } else if self.immix.lock().has_address(header as *const u8) {
            self.immix.lock().record_weak(index);
        } else {
            self.large.record_weak(index);
        }
        Weak::new(index)
    }

    /// Install a foreign handle on `gc` and pin its object so it survives
    /// regardless of reachability for as long as the handle is registered
    /// (§6's Mutator API). Returns the inflated index the handle now lives
    /// at, mirroring [`Self::downgrade`].
    pub fn register_foreign_handle<T: Trace + 'static>(&self, gc: Gc<T>, handle: u64) -> u32 {
        let header_ptr = gc.header() as *const HeapObjectHeader as *mut HeapObjectHeader;
        let index = crate::inflate::ensure_inflated(gc.header());
        crate::inflate::table().get(index).set_foreign_handle(handle);
        gc.header().set_pinned();
        self.pinned.lock().push(header_ptr);
        index
    }

    /// Drop the pin installed by [`Self::register_foreign_handle`]. The
    /// inflated record itself is left alone — other purposes (identity,
    /// a thin lock that later contended, a weak reference) may still be
    /// sharing the same index.
    pub fn unregister_foreign_handle<T: Trace + 'static>(&self, gc: Gc<T>) {
        let header_ptr = gc.header() as *const HeapObjectHeader as *mut HeapObjectHeader;
        gc.header().clear_pinned();
        self.pinned.lock().retain(|&p| p != header_ptr);
        if let Some(index) = gc.header().inflated_index_if_any() {
            crate::inflate::table().get(index).clear_foreign_handle();
        }
    }

    // --- C7: world coordinator ---------------------------------------

    fn aggregate_foreign_budgets(&self) {
        let threshold = self.config.malloc_threshold as i64;
        let mut consumed_total = 0i64;
        self.safepoint.for_each(|record| {
            let remaining = record.reset_foreign_budget();
            consumed_total += threshold - remaining;
        });
        if consumed_total == 0 {
            return;
        }
        let after = self.foreign_budget.fetch_sub(consumed_total, Ordering::Relaxed) - consumed_total;
        if after <= 0 {
            self.foreign_budget.store(threshold, Ordering::Relaxed);
            self.collect_mature.store(true, Ordering::Relaxed);
        }
    }

    /// Cooperative poll point: method entry, backward branch, allocation
    /// (§5). Blocks if a collection is in progress; otherwise a no-op.
    pub fn checkpoint(&self, thread: &MutatorHandle) {
        self.safepoint.checkpoint(thread.record());
    }

    pub fn enter_independent(&self, thread: &MutatorHandle) {
        self.safepoint.enter_independent(thread.record());
    }

    pub fn enter_dependent(&self, thread: &MutatorHandle) {
        self.safepoint.enter_dependent(thread.record());
    }

    /// Request a collection at the next safepoint without forcing one
    /// synchronously.
    pub fn request_collection(&self, young: bool, mature: bool) {
        if young {
            self.collect_young.store(true, Ordering::Relaxed);
        }
        if mature {
            self.collect_mature.store(true, Ordering::Relaxed);
        }
    }

    /// Drive a full stop-the-world collection cycle now, running
    /// whichever of young/mature are flagged (or forced via `force_*`).
    /// Pseudocode per §4.7's collection driver.
    pub fn collect_garbage(&self, force_young: bool, force_mature: bool) {
        self.aggregate_foreign_budgets();
        let run_young = force_young || self.collect_young.swap(false, Ordering::Relaxed);
        let run_mature = force_mature || self.collect_mature.swap(false, Ordering::Relaxed);
        if !run_young && !run_mature {
            return;
        }

        self.safepoint.enter_safepoint_scope();

        if run_young {
            self.run_young_collection();
        }
        if run_mature {
            self.run_mature_collection();
        }

        self.safepoint.leave_safepoint_scope();
    }

    /// Roots every pool's mark phase needs regardless of generation: the
    /// cooperative shadow stacks, plus every object a foreign handle pins
    /// alive (§6). Pinned addresses are rewritten in place with whatever
    /// the trace returns, since a pinned young object is still free to be
    /// copied by a young collection even though it can't be evacuated by
    /// Immix (`MarkPhase::mark` already refuses to evacuate a pinned
    /// object).
    fn trace_all_roots(&self, visitor: &mut Visitor) {
        self.safepoint.for_each(|record| {
            record.shadow_stack().trace(visitor);
        });
        let mut pinned = self.pinned.lock();
        for slot in pinned.iter_mut() {
            *slot = visitor.mark_raw(*slot as *mut u8) as *mut HeapObjectHeader;
        }
    }

    /// Extra roots a young collection alone needs: every mature→young edge
    /// the write barrier has logged since the last drain (§4.3).
    fn trace_remembered_set(&self, visitor: &mut Visitor) {
        let mut remembered = self.remembered.lock();
        for slot in remembered.iter_mut() {
            *slot = visitor.mark_raw(*slot as *mut u8) as *mut HeapObjectHeader;
        }
    }

    /// Drain every registered thread's write-barrier log into the shared
    /// remembered set, keeping only entries that still name a mature (or
    /// large) object — a young-on-young write needs no remembered-set
    /// entry, since normal reachability already covers it next collection.
    /// Deduplicated the same way the drain itself is idempotent: a few
    /// stale/duplicate entries are harmless, just wasted re-tracing.
    fn drain_write_logs(&self) {
        let mut remembered = self.remembered.lock();
        self.safepoint.for_each(|record| unsafe {
            for header in record.write_log_mut().drain(..) {
                if !self.young.lock().has_from_address(header as *mut u8) {
                    remembered.push(header);
                }
            }
        });
        remembered.sort_unstable();
        remembered.dedup();
    }

    fn run_young_collection(&self) {
        self.drain_write_logs();
        self.safepoint.for_each(|record| unsafe { record.tlab().reset() });
        let start = Instant::now();
        let mut young = self.young.lock();
        let mut immix = self.immix.lock();
        let report = young.collect(
            |visitor| {
                self.trace_all_roots(visitor);
                self.trace_remembered_set(visitor);
            },
            |src, size| unsafe {
                match immix.allocate_raw(size) {
                    Some(dest) => {
                        std::ptr::copy_nonoverlapping(src, dest, size);
                        dest.cast::<HeapObjectHeader>()
                    }
                    None => crate::error::fatal("immix promotion failed during young collection"),
                }
            },
        );
        for index in &report.promoted_weak_refs {
            immix.record_weak(*index);
        }
        drop(immix);
        drop(young);
        if self.config.verbose {
            eprintln!(
                "ossuary: young collection: {} promoted, {} finalized, {} live",
                report.bytes_promoted, report.objects_finalized, report.live_bytes
            );
        }
        let mut stats = self.statistics.lock();
        stats.record_young_pause(start.elapsed(), report.bytes_promoted);
        stats.objects_finalized += report.objects_finalized;
        stats.set_young_live_bytes(report.live_bytes);
    }

    fn run_mature_collection(&self) {
        let start = Instant::now();
        let mut immix = self.immix.lock();
        let report = immix.collect(&self.large, |visitor| self.trace_all_roots(visitor));
        let epoch = immix.mark_epoch();
        drop(immix);
        // Large objects are marked in place by the same mark phase (see
        // `MarkPhase::mark`'s large-space branch), so this check covers
        // both pools uniformly. Must run before `LargeSpace::sweep` below,
        // which frees dead large allocations outright.
        self.remembered.lock().retain(|&header| unsafe {
            (*header).is_forwarded() || (*header).is_marked(epoch)
        });
        let large_report = self.large.sweep(epoch);
        if self.config.verbose {
            eprintln!(
                "ossuary: mature collection: {} evacuated, {} finalized, {} live (immix) + {} live (large)",
                report.bytes_evacuated, report.objects_finalized, report.live_bytes, large_report.live_bytes
            );
        }
        let mut stats = self.statistics.lock();
        stats.record_immix_pause(start.elapsed(), report.bytes_evacuated);
        stats.objects_finalized += report.objects_finalized + large_report.objects_finalized;
        stats.set_immix_live_bytes(report.live_bytes);
        stats.set_large_live_bytes(large_report.live_bytes);
    }

    /// Every lock is re-initialized, non-surviving thread records
    /// dropped, run state reset to dependent (§4.7, "After-fork").
    pub fn after_fork(&self, survivor: &MutatorHandle) {
        self.safepoint.reset_after_fork(survivor.record);
    }
}

/// Scoped registration of a mutator thread (§4.7, "Thread record").
/// Unregisters and frees the backing `ThreadRecord` on drop.
pub struct MutatorHandle<'a> {
    heap: &'a Heap,
    record: *mut ThreadRecord,
}

impl<'a> MutatorHandle<'a> {
    pub fn record(&self) -> &ThreadRecord {
        unsafe { &*self.record }
    }
}

impl<'a> Drop for MutatorHandle<'a> {
    fn drop(&mut self) {
        self.heap.safepoint.unregister(self.record);
        crate::mutator::clear_current();
        unsafe {
            drop(Box::from_raw(self.record));
        }
    }
}

unsafe impl<'a> Send for MutatorHandle<'a> {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf(u64);
    impl Trace for Leaf {
        fn trace(&mut self, _v: &mut Visitor) {}
    }

    #[test]
    fn allocate_roundtrips_through_tlab() {
        let heap = Heap::new(GcConfig::default());
        let thread = heap.register_thread();
        let gc = heap.allocate(&thread, Leaf(11)).unwrap();
        assert_eq!(gc.0, 11);
    }

    #[test]
    fn large_request_routes_to_enduring_pool() {
        let heap = Heap::new(GcConfig::default().with_young_size(4096));
        let thread = heap.register_thread();
        struct Big([u8; 128 * 1024]);
        impl Trace for Big {
            fn trace(&mut self, _v: &mut Visitor) {}
        }
        let gc = heap.allocate(&thread, Big([0u8; 128 * 1024])).unwrap();
        assert!(heap.config().large_object_threshold <= 128 * 1024);
        let _ = gc;
    }

    #[test]
    fn young_collection_reclaims_unrooted_objects() {
        let heap = Heap::new(GcConfig::default().with_young_size(4096));
        let thread = heap.register_thread();
        let _garbage = heap.allocate(&thread, Leaf(1)).unwrap();
        heap.collect_garbage(true, false);
        assert_eq!(heap.live_bytes(), 0);
    }

    #[test]
    fn rooted_object_survives_young_collection() {
        let heap = Heap::new(GcConfig::default().with_young_size(4096));
        let thread = heap.register_thread();
        let gc = heap.allocate(&thread, Leaf(42)).unwrap();
        crate::letroot!(root: Gc<Leaf> = thread.record().shadow_stack(), gc);
        heap.collect_garbage(true, false);
        assert_eq!(root.0, 42);
    }

    #[test]
    fn foreign_allocation_sets_collect_mature_after_safepoint() {
        let config = GcConfig::default();
        let threshold = config.malloc_threshold as usize;
        let heap = Heap::new(config);
        let thread = heap.register_thread();
        heap.charge_foreign_allocation(&thread, threshold + 1);
        heap.aggregate_foreign_budgets();
        assert!(heap.collect_mature.load(Ordering::Relaxed));
    }

    /// S4: an unrooted mature object's weak reference reads `None` once a
    /// mature collection reclaims it, and by the time its finalizer runs
    /// the weak ref has already gone stale — §4.7 step 4's ordering, not
    /// just "eventually consistent". `FINALIZED` records whether the
    /// finalizer ran at all and what it observed, since the struct itself
    /// is gone by the time the test could otherwise ask.
    static FINALIZED: std::sync::atomic::AtomicU8 = std::sync::atomic::AtomicU8::new(0);
    const NOT_RUN: u8 = 0;
    const RAN_WITH_WEAK_ALREADY_CLEAR: u8 = 1;
    const RAN_WITH_WEAK_STILL_LIVE: u8 = 2;

    struct Witness {
        own_weak: std::cell::RefCell<Option<crate::api::Weak<Witness>>>,
    }
    impl Trace for Witness {
        fn trace(&mut self, _v: &mut Visitor) {}
    }
    impl Drop for Witness {
        fn drop(&mut self) {
            let still_live = self
                .own_weak
                .borrow()
                .as_ref()
                .map(|w| w.upgrade().is_some())
                .unwrap_or(false);
            FINALIZED.store(
                if still_live { RAN_WITH_WEAK_STILL_LIVE } else { RAN_WITH_WEAK_ALREADY_CLEAR },
                Ordering::Relaxed,
            );
        }
    }

    #[test]
    fn unrooted_mature_object_weak_ref_clears_before_finalizer_runs() {
        FINALIZED.store(NOT_RUN, Ordering::Relaxed);
        let heap = Heap::new(GcConfig::default());
        let gc = heap
            .allocate_mature(Witness {
                own_weak: std::cell::RefCell::new(None),
            })
            .unwrap();
        let self_weak = heap.downgrade(gc);
        // A second `Weak` built from the same inflated index rather than a
        // second `downgrade` call, so the object's weak-ref list carries
        // exactly one entry for it, same as real single-downgrade usage.
        let outer_weak = crate::api::Weak::<Witness>::new(self_weak.inflated_index());
        *gc.own_weak.borrow_mut() = Some(self_weak);
        assert!(outer_weak.upgrade().is_some());

        // `gc` is never rooted via `letroot!`, so nothing keeps it alive
        // across the collection below.
        heap.collect_garbage(false, true);

        assert!(outer_weak.upgrade().is_none(), "weak ref must read None once the object is reclaimed");
        assert_eq!(FINALIZED.load(Ordering::Relaxed), RAN_WITH_WEAK_ALREADY_CLEAR);
    }
}

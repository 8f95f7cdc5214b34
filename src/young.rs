//! C3: the young (nursery) collector. A Baker-style two-semispace copying
//! collector, adapted from the teacher's `SemiSpace`. The teacher's version
//! never promotes — it just flips from/to space forever and leaves large
//! objects to its own large-object space. This one adds age-tracked
//! promotion into the Immix mature space, since a nursery that never
//! empties into a mature generation isn't bounded. Promotion itself is a
//! callback supplied by the allocator facade, so this module stays
//! ignorant of Immix's internals.

use crate::header::HeapObjectHeader;
use crate::mmap::Mmap;
use crate::trace::{MarkSink, Visitor};
use crate::type_info::{self, TypeInfoIndex};
use crate::util::align_up;
use std::collections::HashMap;

pub struct YoungCollectionReport {
    pub bytes_promoted: u64,
    pub objects_finalized: u64,
    pub live_bytes: usize,
    /// Inflated-table indices whose owning object survived this collection
    /// by being promoted into the mature generation — the caller must hand
    /// each one to `ImmixHeap::record_weak` since this generation no
    /// longer tracks it (§4.7 step 4).
    pub promoted_weak_refs: Vec<u32>,
}

pub struct YoungGeneration {
    from_space: Mmap,
    to_space: Mmap,
    from_cursor: *mut u8,
    from_limit: *mut u8,
    to_start: *mut u8,
    to_cursor: *mut u8,
    to_limit: *mut u8,
    // Survival count per object, keyed by its current address. Rebuilt
    // from scratch every collection rather than patched in place, since a
    // stale entry keyed by a from-space address that a garbage object
    // never vacates would otherwise alias whatever gets allocated there
    // once that half becomes the to-space two cycles from now.
    ages: HashMap<usize, u8>,
    promotion_age: u8,
    objects_with_finalizers: Vec<*mut HeapObjectHeader>,
    mark_stack: Vec<*mut HeapObjectHeader>,
    /// Inflated-table indices currently anchored to an object living in
    /// this generation (§4.7 step 4).
    weak_refs: Vec<u32>,
}

unsafe impl Send for YoungGeneration {}

impl YoungGeneration {
    pub fn new(half_size: usize, promotion_age: u8) -> Self {
        let from_space = Mmap::new(half_size, 8);
        let to_space = Mmap::new(half_size, 8);
        let from_start = from_space.aligned_start(8);
        let to_start = to_space.aligned_start(8);
        let from_limit = unsafe { from_start.add(from_space.size()) };
        let to_limit = unsafe { to_start.add(to_space.size()) };
        Self {
            from_space,
            to_space,
            from_cursor: from_start,
            from_limit,
            to_start,
            to_cursor: to_start,
            to_limit,
            ages: HashMap::new(),
            promotion_age: promotion_age.max(1),
            objects_with_finalizers: Vec::new(),
            mark_stack: Vec::new(),
            weak_refs: Vec::new(),
        }
    }

    pub fn has_from_address(&self, ptr: *mut u8) -> bool {
        let start = self.from_space.aligned_start(8);
        (ptr as usize) >= start as usize && (ptr as usize) < self.from_limit as usize
    }

    /// True if `ptr` falls in this cycle's to-space, i.e. it is a survivor
    /// copied (not promoted) during the collection currently in progress.
    fn has_to_address(&self, ptr: *mut u8) -> bool {
        (ptr as usize) >= self.to_start as usize && (ptr as usize) < self.to_limit as usize
    }

    /// Bump-allocate `total` bytes out of from-space. Used both to refill a
    /// mutator's TLAB and for mid-size allocations too large to inline.
    pub fn try_allocate_raw(&mut self, total: usize) -> Option<*mut u8> {
        let total = align_up(total, 8);
        let new_cursor = unsafe { self.from_cursor.add(total) };
        if new_cursor > self.from_limit {
            return None;
        }
        let result = self.from_cursor;
        self.from_cursor = new_cursor;
        Some(result)
    }

    pub fn remaining(&self) -> usize {
        self.from_limit as usize - self.from_cursor as usize
    }

    pub fn used(&self) -> usize {
        self.from_cursor as usize - self.from_space.aligned_start(8) as usize
    }

    pub fn record_finalizable(&mut self, header: *mut HeapObjectHeader) {
        self.objects_with_finalizers.push(header);
    }

    pub fn record_weak(&mut self, index: u32) {
        self.weak_refs.push(index);
    }

    fn bump_to_space(&mut self, size: usize) -> Option<*mut u8> {
        let size = align_up(size, 8);
        let new_cursor = unsafe { self.to_cursor.add(size) };
        if new_cursor > self.to_limit {
            return None;
        }
        let result = self.to_cursor;
        self.to_cursor = new_cursor;
        Some(result)
    }

    /// Run one young collection. `trace_roots` drives a `Visitor` over
    /// every shadow-stack entry and explicit root; `promote` hands an
    /// object that has reached the promotion age to the mature pool and
    /// returns its new header there.
    pub fn collect<R, P>(&mut self, mut trace_roots: R, mut promote: P) -> YoungCollectionReport
    where
        R: FnMut(&mut Visitor),
        P: FnMut(*const u8, usize) -> *mut HeapObjectHeader,
    {
        self.to_space.commit(self.to_start, self.to_space.size());
        let mut bytes_promoted = 0u64;
        let mut new_ages = HashMap::new();

        {
            let mut sink = EvacuateSink {
                young: self,
                new_ages: &mut new_ages,
                promote: &mut promote,
                bytes_promoted: &mut bytes_promoted,
            };
            let mut visitor = unsafe { Visitor::new(&mut sink) };
            trace_roots(&mut visitor);
        }

        while let Some(header) = self.mark_stack.pop() {
            unsafe {
                let info = type_info::lookup(TypeInfoIndex((*header).type_index()));
                let payload = (header as *mut u8).add(std::mem::size_of::<HeapObjectHeader>());
                let mut sink = EvacuateSink {
                    young: self,
                    new_ages: &mut new_ages,
                    promote: &mut promote,
                    bytes_promoted: &mut bytes_promoted,
                };
                let mut visitor = Visitor::new(&mut sink);
                (info.trace)(&mut visitor, payload);
            }
        }

        let promoted_weak_refs = self.sweep_weak_refs();
        let objects_finalized = self.sweep_finalizers();
        self.ages = new_ages;

        let live_bytes = self.to_cursor as usize - self.to_start as usize;

        let old_from_start = self.from_space.aligned_start(8);
        self.from_space.dontneed(old_from_start, self.from_space.size());
        let new_from_cursor = self.to_cursor;
        std::mem::swap(&mut self.from_space, &mut self.to_space);

        let from_start = self.from_space.aligned_start(8);
        self.from_cursor = new_from_cursor;
        self.from_limit = unsafe { from_start.add(self.from_space.size()) };

        let to_start = self.to_space.aligned_start(8);
        self.to_start = to_start;
        self.to_cursor = to_start;
        self.to_limit = unsafe { to_start.add(self.to_space.size()) };

        YoungCollectionReport {
            bytes_promoted,
            objects_finalized,
            live_bytes,
            promoted_weak_refs,
        }
    }

    /// Null and reclaim every weak record whose owning object this
    /// collection never reached, before finalizers run. A record whose
    /// object was promoted out of this generation is handed back to the
    /// caller instead of kept here or freed — `has_from_address` on its
    /// new (post-swap) address is false precisely when that happened.
    fn sweep_weak_refs(&mut self) -> Vec<u32> {
        let mut survivors = Vec::with_capacity(self.weak_refs.len());
        let mut promoted = Vec::new();
        let drained: Vec<u32> = self.weak_refs.drain(..).collect();
        for index in drained {
            let record = crate::inflate::table().get(index);
            let header = record.object();
            if header.is_null() {
                continue;
            }
            unsafe {
                if (*header).is_forwarded() {
                    let new_header = (*header).forward_address();
                    record.set_object(new_header);
                    if self.has_to_address(new_header as *mut u8) {
                        survivors.push(index);
                    } else {
                        promoted.push(index);
                    }
                } else if !self.has_from_address(header as *mut u8) {
                    survivors.push(index);
                } else {
                    record.set_object(std::ptr::null_mut());
                    crate::inflate::table().free(index);
                }
            }
        }
        self.weak_refs = survivors;
        promoted
    }

    /// Finalizable objects are not roots. An unreached one simply runs its
    /// finalizer in place before the space it lives in is reused.
    fn sweep_finalizers(&mut self) -> u64 {
        let mut finalized = 0u64;
        let mut survivors = Vec::with_capacity(self.objects_with_finalizers.len());
        let drained: Vec<*mut HeapObjectHeader> = self.objects_with_finalizers.drain(..).collect();
        for header in drained {
            unsafe {
                if (*header).is_forwarded() {
                    survivors.push((*header).forward_address());
                } else if !self.has_from_address(header as *mut u8) {
                    survivors.push(header);
                } else {
                    let info = type_info::lookup(TypeInfoIndex((*header).type_index()));
                    if let Some(finalize) = info.finalize {
                        let payload = (header as *mut u8).add(std::mem::size_of::<HeapObjectHeader>());
                        finalize(payload);
                        finalized += 1;
                    }
                }
            }
        }
        self.objects_with_finalizers = survivors;
        finalized
    }
}

struct EvacuateSink<'a, P: FnMut(*const u8, usize) -> *mut HeapObjectHeader> {
    young: &'a mut YoungGeneration,
    new_ages: &'a mut HashMap<usize, u8>,
    promote: &'a mut P,
    bytes_promoted: &'a mut u64,
}

impl<'a, P: FnMut(*const u8, usize) -> *mut HeapObjectHeader> MarkSink for EvacuateSink<'a, P> {
    fn mark(&mut self, slot: &mut *mut u8) {
        let obj = *slot as *mut HeapObjectHeader;
        if obj.is_null() {
            return;
        }
        unsafe {
            if (*obj).is_forwarded() {
                *slot = (*obj).forward_address() as *mut u8;
                return;
            }
            if !self.young.has_from_address(obj as *mut u8) {
                // Already mature, already large, or pinned in place: not
                // this collector's object to move.
                return;
            }
            let age = self.young.ages.remove(&(obj as usize)).unwrap_or(0);
            let size = (*obj).size();
            if age + 1 >= self.young.promotion_age {
                let new_header = (self.promote)(obj as *const u8, size);
                (*obj).set_forwarded(new_header);
                *self.bytes_promoted += size as u64;
                *slot = new_header as *mut u8;
            } else {
                let dest = self
                    .young
                    .bump_to_space(size)
                    .unwrap_or_else(|| crate::error::fatal("young to-space exhausted mid-collection"));
                std::ptr::copy_nonoverlapping(obj as *const u8, dest, size);
                let new_header = dest as *mut HeapObjectHeader;
                self.new_ages.insert(dest as usize, age + 1);
                self.young.mark_stack.push(new_header);
                (*obj).set_forwarded(new_header);
                *slot = dest;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Gc;
    use crate::trace::Trace;
    use std::ptr::NonNull;

    fn alloc_in<T: Trace + 'static>(young: &mut YoungGeneration, value: T) -> Gc<T> {
        let total = align_up(
            std::mem::size_of::<HeapObjectHeader>() + std::mem::size_of::<T>(),
            8,
        );
        let raw = young.try_allocate_raw(total).expect("from-space has room");
        unsafe {
            let type_index = crate::api::register::<T>().0;
            let header = raw.cast::<HeapObjectHeader>();
            header.write(HeapObjectHeader::new(type_index, total));
            let payload = raw.add(std::mem::size_of::<HeapObjectHeader>());
            payload.cast::<T>().write(value);
            Gc::from_header(NonNull::new_unchecked(header))
        }
    }

    struct Leaf(u64);
    impl Trace for Leaf {
        fn trace(&mut self, _v: &mut Visitor) {}
    }

    struct Holder(Gc<Leaf>);
    impl Trace for Holder {
        fn trace(&mut self, visitor: &mut Visitor) {
            visitor.edge(&mut self.0);
        }
    }

    fn no_promotion(_src: *const u8, _size: usize) -> *mut HeapObjectHeader {
        panic!("promotion should not happen in this test")
    }

    /// A leaked, 8-byte-aligned buffer standing in for a mature-pool slot,
    /// since `HeapObjectHeader`'s atomics need proper alignment and a
    /// `Vec<u8>` only guarantees byte alignment.
    fn leak_aligned(size: usize) -> *mut u8 {
        let words = (size + 7) / 8;
        let buf: &'static mut [u64] = vec![0u64; words].leak();
        buf.as_mut_ptr().cast::<u8>()
    }

    #[test]
    fn unreached_objects_are_not_preserved() {
        let mut young = YoungGeneration::new(4096, 3);
        let _garbage = alloc_in(&mut young, Leaf(1));
        let report = young.collect(|_v| {}, no_promotion);
        assert_eq!(report.live_bytes, 0);
        assert_eq!(report.bytes_promoted, 0);
    }

    #[test]
    fn rooted_object_survives_and_pointer_is_updated() {
        let mut young = YoungGeneration::new(4096, 3);
        let mut root = alloc_in(&mut young, Leaf(42));
        let before = root.as_raw();
        let report = young.collect(
            |visitor| {
                visitor.edge(&mut root);
            },
            no_promotion,
        );
        assert!(report.live_bytes > 0);
        assert_ne!(root.as_raw(), before);
        assert_eq!(root.0, 42);
    }

    #[test]
    fn nested_edge_through_holder_is_traced() {
        let mut young = YoungGeneration::new(8192, 3);
        let leaf = alloc_in(&mut young, Leaf(7));
        let mut holder = alloc_in(&mut young, Holder(leaf));
        young.collect(
            |visitor| {
                visitor.edge(&mut holder);
            },
            no_promotion,
        );
        assert_eq!(holder.0 .0, 7);
    }

    #[test]
    fn promotion_triggers_once_age_threshold_reached() {
        let mut young = YoungGeneration::new(4096, 2);
        let mut root = alloc_in(&mut young, Leaf(9));
        let mut promoted_to = Vec::new();
        let report1 = young.collect(
            |visitor| visitor.edge(&mut root),
            |src, size| unsafe {
                let dest = leak_aligned(size);
                std::ptr::copy_nonoverlapping(src, dest, size);
                promoted_to.push(dest);
                dest.cast::<HeapObjectHeader>()
            },
        );
        assert_eq!(report1.bytes_promoted, 0);

        let report2 = young.collect(
            |visitor| visitor.edge(&mut root),
            |src, size| unsafe {
                let dest = leak_aligned(size);
                std::ptr::copy_nonoverlapping(src, dest, size);
                promoted_to.push(dest);
                dest.cast::<HeapObjectHeader>()
            },
        );
        assert!(report2.bytes_promoted > 0);
        assert_eq!(root.0, 9);
    }
}

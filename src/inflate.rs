//! C2: the inflated header table.
//!
//! When a header (C1) needs more state than its packed word can carry —
//! a recursive mutex with a wait queue, a foreign handle, or simply an
//! identity that survived past a contended thin lock — it is promoted to
//! point at one of these side records instead. Once installed, an
//! object's inflated index never changes; collectors only ever move the
//! *object*, never the index.
//!
//! The table is a single process-wide slab (mirroring the teacher's own
//! `GCInfoTable`), guarded by one spinlock for the rare inflate-and-install
//! path; lookups by index are lock-free.

use crate::header::HeapObjectHeader;
use crate::mmap::Mmap;
use parking_lot::{Condvar, Mutex, Once};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Per-object side record. Lives at a stable address for as long as its
/// index is considered allocated.
pub struct InflatedHeader {
    identity: AtomicU64,
    foreign_handle: AtomicU64,
    /// Current header address of the live object this record is attached
    /// to, kept current by each collector as the object moves (young
    /// promotion, Immix evacuation). Zero once a weak-processing pass has
    /// determined the object is dead — a [`crate::api::Weak`] reads this
    /// directly rather than chasing a possibly-stale address itself.
    object: AtomicUsize,
    state: Mutex<MonitorState>,
    condvar: Condvar,
}

struct MonitorState {
    owner: Option<u32>,
    recursion: u32,
    waiters: u32,
}

impl InflatedHeader {
    fn reset(&self) {
        self.identity.store(0, Ordering::Relaxed);
        self.foreign_handle.store(0, Ordering::Relaxed);
        self.object.store(0, Ordering::Relaxed);
        let mut state = self.state.lock();
        state.owner = None;
        state.recursion = 0;
        state.waiters = 0;
    }

    /// Equivalent of [`HeapObjectHeader::assign_identity`] once a header
    /// is already inflated.
    pub fn identity(&self, next_id: &mut dyn FnMut() -> u64) -> u64 {
        let existing = self.identity.load(Ordering::Acquire);
        if existing != 0 {
            return existing;
        }
        let id = next_id();
        match self
            .identity
            .compare_exchange(0, id, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => id,
            Err(actual) => actual,
        }
    }

    pub fn foreign_handle(&self) -> Option<u64> {
        match self.foreign_handle.load(Ordering::Acquire) {
            0 => None,
            h => Some(h),
        }
    }

    pub fn set_foreign_handle(&self, handle: u64) {
        self.foreign_handle.store(handle, Ordering::Release);
    }

    pub fn clear_foreign_handle(&self) {
        self.foreign_handle.store(0, Ordering::Release);
    }

    /// Current header address of the live object, or null once cleared by
    /// a weak-processing pass.
    pub fn object(&self) -> *mut HeapObjectHeader {
        self.object.load(Ordering::Acquire) as *mut HeapObjectHeader
    }

    pub fn set_object(&self, header: *mut HeapObjectHeader) {
        self.object.store(header as usize, Ordering::Release);
    }

    /// Seed owner/recursion absorbed from a thin lock being inflated
    /// (invariant 5: lock ownership survives inflation).
    fn seed_owner(&self, owner: u32, recursion: u8) {
        let mut state = self.state.lock();
        state.owner = Some(owner);
        state.recursion = recursion as u32;
    }

    pub fn lock(&self, owner: u32) {
        let mut state = self.state.lock();
        if state.owner == Some(owner) {
            state.recursion += 1;
            return;
        }
        while state.owner.is_some() {
            state.waiters += 1;
            self.condvar.wait(&mut state);
            state.waiters -= 1;
        }
        state.owner = Some(owner);
        state.recursion = 1;
    }

    pub fn unlock(&self, owner: u32) {
        let mut state = self.state.lock();
        crate::invariant!(state.owner == Some(owner), "unlock of monitor not owned by caller");
        state.recursion -= 1;
        if state.recursion == 0 {
            state.owner = None;
            if state.waiters > 0 {
                self.condvar.notify_one();
            }
        }
    }

    /// Blocking acquire with an optional timeout and an interruption
    /// flag, per §4.7's `contend_for_lock`. On either exit path the
    /// header is left in a safe state: still held by someone else, or
    /// acquired by us.
    pub fn contend(
        &self,
        owner: u32,
        timeout: Option<Duration>,
        interrupt: &AtomicBool,
    ) -> Result<(), crate::error::GcError> {
        let mut state = self.state.lock();
        if state.owner == Some(owner) {
            state.recursion += 1;
            return Ok(());
        }
        let deadline = timeout.map(|d| Instant::now() + d);
        while state.owner.is_some() {
            if interrupt.load(Ordering::Relaxed) {
                return Err(crate::error::GcError::LockInterrupted);
            }
            state.waiters += 1;
            let timed_out = match deadline {
                Some(dl) => {
                    let now = Instant::now();
                    if now >= dl {
                        true
                    } else {
                        self.condvar.wait_for(&mut state, dl - now).timed_out()
                    }
                }
                None => {
                    self.condvar.wait(&mut state);
                    false
                }
            };
            state.waiters -= 1;
            if timed_out && state.owner.is_some() {
                return Err(crate::error::GcError::LockTimeout);
            }
        }
        state.owner = Some(owner);
        state.recursion = 1;
        Ok(())
    }
}

pub struct InflateTable {
    map: Mmap,
    table: *mut InflatedHeader,
    next_index: AtomicU32,
    free_list: Mutex<Vec<u32>>,
    install_lock: Mutex<()>,
}

unsafe impl Send for InflateTable {}
unsafe impl Sync for InflateTable {}

impl InflateTable {
    /// Upper bound on simultaneously inflated headers. Exhausting this
    /// (fetch_add past it) is treated the same as any other allocator
    /// exhaustion: fatal abort, per §4.2.
    const MAX_INDEX: u32 = 1 << 20;

    fn new() -> Self {
        let bytes = Self::MAX_INDEX as usize * std::mem::size_of::<InflatedHeader>();
        let map = Mmap::new(bytes, 8);
        let table = map.aligned_start(8).cast::<InflatedHeader>();
        Self {
            map,
            table,
            next_index: AtomicU32::new(1), // 0 is never a valid index
            free_list: Mutex::new(Vec::new()),
            install_lock: Mutex::new(()),
        }
    }

    fn slot(&self, index: u32) -> *mut InflatedHeader {
        unsafe { self.table.add(index as usize) }
    }

    pub fn get(&self, index: u32) -> &InflatedHeader {
        unsafe { &*self.slot(index) }
    }

    pub fn allocate(&self) -> u32 {
        if let Some(index) = self.free_list.lock().pop() {
            unsafe {
                self.slot(index).write(InflatedHeader {
                    identity: AtomicU64::new(0),
                    foreign_handle: AtomicU64::new(0),
                    object: AtomicUsize::new(0),
                    state: Mutex::new(MonitorState {
                        owner: None,
                        recursion: 0,
                        waiters: 0,
                    }),
                    condvar: Condvar::new(),
                });
            }
            return index;
        }
        let index = self.next_index.fetch_add(1, Ordering::AcqRel);
        if index >= Self::MAX_INDEX {
            crate::error::fatal("inflated header table exhausted");
        }
        unsafe {
            self.slot(index).write(InflatedHeader {
                identity: AtomicU64::new(0),
                foreign_handle: AtomicU64::new(0),
                object: AtomicUsize::new(0),
                state: Mutex::new(MonitorState {
                    owner: None,
                    recursion: 0,
                    waiters: 0,
                }),
                condvar: Condvar::new(),
            });
        }
        index
    }

    /// Return `index` to the free list for reuse. A record is only safe to
    /// free once every generation's own weak/finalizer sweep has confirmed
    /// its owning object is dead — there is no process-wide epoch that can
    /// decide this on its own, since an inflated index can anchor an
    /// object still living in the young generation, which a mature
    /// collection's mark never visits. Callers are each collector's own
    /// sweep pass, never a generic periodic background pass.
    pub fn free(&self, index: u32) {
        self.get(index).reset();
        self.free_list.lock().push(index);
    }
}

static INFLATE_ONCE: Once = Once::new();
static mut INFLATE_TABLE: Option<InflateTable> = None;

pub fn table() -> &'static InflateTable {
    unsafe {
        INFLATE_ONCE.call_once(|| {
            INFLATE_TABLE = Some(InflateTable::new());
        });
        INFLATE_TABLE.as_ref().unwrap()
    }
}

/// Promote `header` to `Inflated`, absorbing whatever identity or
/// thin-lock state it already carried. Performed under a single
/// process-wide spinlock (§4.1) so only one candidate record is ever
/// installed for a given header.
pub fn ensure_inflated(header: &HeapObjectHeader) -> u32 {
    if let Some(existing) = header.inflated_index_if_any() {
        return existing;
    }
    let _guard = table().install_lock.lock();
    if let Some(existing) = header.inflated_index_if_any() {
        return existing;
    }
    let index = table().allocate();
    let record = table().get(index);
    if let Some(id) = header.read_identity() {
        let _ = record.identity.compare_exchange(
            0,
            id,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
    if let Some((owner, recursion)) = header.read_thin() {
        record.seed_owner(owner, recursion);
    }
    record.set_object(header as *const HeapObjectHeader as *mut HeapObjectHeader);
    header.install_inflated(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeapObjectHeader;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn inflation_preserves_identity() {
        let h = HeapObjectHeader::new(0, 16);
        let mut counter = 100u64;
        let id = h.assign_identity(|| {
            counter += 1;
            counter
        });
        let idx = ensure_inflated(&h);
        assert_eq!(table().get(idx).identity(&mut || unreachable!()), id);
    }

    #[test]
    fn inflation_preserves_lock_ownership() {
        let h = HeapObjectHeader::new(0, 16);
        assert!(matches!(h.try_lock_thin(7), crate::header::LockOutcome::Acquired));
        let idx = ensure_inflated(&h);
        let record = table().get(idx);
        // Owner already holds it; lock() should just re-enter.
        record.lock(7);
        record.unlock(7);
    }

    #[test]
    fn contend_times_out() {
        let record = InflatedHeader {
            identity: AtomicU64::new(0),
            foreign_handle: AtomicU64::new(0),
            object: AtomicUsize::new(0),
            state: Mutex::new(MonitorState {
                owner: Some(1),
                recursion: 1,
                waiters: 0,
            }),
            condvar: Condvar::new(),
        };
        let interrupt = AtomicBool::new(false);
        let result = record.contend(2, Some(Duration::from_millis(10)), &interrupt);
        assert_eq!(result, Err(crate::error::GcError::LockTimeout));
    }
}

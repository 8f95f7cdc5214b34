//! Thread record: everything the world coordinator needs to know about
//! one mutator (§4.7, "Thread record"). Adapted from the teacher's
//! `Mutator<H>`/`local_heap::LocalHeap`, narrowed to the three run
//! states the distilled spec names directly instead of the teacher's
//! five-state `ThreadState`, and to a concrete `Heap` instead of a
//! generic `GcBase`.

use crate::config::GcConfig;
use crate::header::HeapObjectHeader;
use crate::shadow_stack::ShadowStack;
use crate::tlab::Tlab;
use std::cell::Cell;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum RunState {
    /// Participates in safepoints; the collector waits for it.
    Dependent = 0,
    /// Executing blocking I/O or foreign code; ignored by the collector.
    Independent = 1,
    /// Independent and parked on the safepoint condition variable.
    Sleeping = 2,
}

impl RunState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RunState::Dependent,
            1 => RunState::Independent,
            2 => RunState::Sleeping,
            _ => unreachable!(),
        }
    }
}

/// One per mutator thread. Holds the thread's young-space TLAB, its
/// cooperative root set, its run state, and its share of the
/// foreign-allocation budget (§9 Open Question resolution: a per-thread
/// signed counter aggregated into the facade's global one at
/// safepoints, rather than one racy shared counter).
pub struct ThreadRecord {
    pub(crate) tlab: std::cell::UnsafeCell<Tlab>,
    shadow_stack: ShadowStack,
    run_state: AtomicU8,
    foreign_budget: AtomicI64,
    config: Arc<GcConfig>,
    /// Write-barrier log (§4.3's remembered set, mutator side): every
    /// header a `Gc<T>::deref_mut` on this thread has touched since the
    /// last young collection drained it. Conservative by construction —
    /// logs the parent object on any mutable access, not just ones that
    /// actually store a young pointer — mirroring the teacher's own
    /// object-granular `write_barrier` rather than a field-precise one.
    write_log: std::cell::UnsafeCell<Vec<*mut HeapObjectHeader>>,
}

impl ThreadRecord {
    pub fn new(config: Arc<GcConfig>) -> Self {
        let budget = config.malloc_threshold as i64;
        Self {
            tlab: std::cell::UnsafeCell::new(Tlab::empty()),
            shadow_stack: ShadowStack::new(),
            run_state: AtomicU8::new(RunState::Dependent as u8),
            foreign_budget: AtomicI64::new(budget),
            config,
            write_log: std::cell::UnsafeCell::new(Vec::new()),
        }
    }

    pub fn shadow_stack(&self) -> &ShadowStack {
        &self.shadow_stack
    }

    pub fn run_state(&self) -> RunState {
        RunState::from_u8(self.run_state.load(Ordering::Acquire))
    }

    pub(crate) fn set_run_state(&self, state: RunState) {
        self.run_state.store(state as u8, Ordering::Release);
    }

    /// # Safety
    /// Exclusive access to the TLAB requires that no other thread is
    /// concurrently allocating through this record, which holds because
    /// a `ThreadRecord` is only ever driven by its owning mutator thread
    /// or (while the world is stopped) the collector.
    pub unsafe fn tlab(&self) -> &mut Tlab {
        &mut *self.tlab.get()
    }

    /// # Safety
    /// Same invariant as [`Self::tlab`]: exclusive to the owning mutator
    /// thread, or to the collector once the world is stopped.
    pub unsafe fn write_log_mut(&self) -> &mut Vec<*mut HeapObjectHeader> {
        &mut *self.write_log.get()
    }

    /// Charge `bytes` of foreign (non-managed) allocation against this
    /// thread's budget. Returns `true` once the running total for this
    /// thread has gone non-positive, a signal the facade folds into
    /// `collect_mature` at the next safepoint.
    pub fn charge_foreign_allocation(&self, bytes: usize) -> bool {
        let remaining = self.foreign_budget.fetch_sub(bytes as i64, Ordering::Relaxed) - bytes as i64;
        remaining <= 0
    }

    /// Reset the budget after it has been folded into the facade's
    /// global counter at a safepoint.
    pub fn reset_foreign_budget(&self) -> i64 {
        self.foreign_budget.swap(self.config.malloc_threshold as i64, Ordering::Relaxed)
    }
}

unsafe impl Send for ThreadRecord {}
unsafe impl Sync for ThreadRecord {}

thread_local! {
    /// The calling thread's own `ThreadRecord`, set for the lifetime of its
    /// `MutatorHandle`. `Gc<T>::deref_mut` has no heap/handle in scope to
    /// thread through, so the write barrier looks itself up here instead —
    /// the same reason the teacher keeps a thread-local `current_thread`
    /// pointer for its own barrier entry point.
    static CURRENT: Cell<*mut ThreadRecord> = Cell::new(std::ptr::null_mut());
}

pub(crate) fn set_current(record: *mut ThreadRecord) {
    CURRENT.with(|cell| cell.set(record));
}

pub(crate) fn clear_current() {
    CURRENT.with(|cell| cell.set(std::ptr::null_mut()));
}

/// The write-barrier entry point proper: log `header` against whichever
/// `ThreadRecord` is current on this thread. A no-op if called from a
/// thread with no registered mutator (e.g. a unit test driving `Gc<T>`
/// directly against a bare header) — there is nothing to remember a write
/// on behalf of.
pub(crate) fn record_write_on_current(header: *mut HeapObjectHeader) {
    let record = CURRENT.with(|cell| cell.get());
    if record.is_null() {
        return;
    }
    unsafe {
        (*record).write_log_mut().push(header);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_budget_trips_once_exhausted() {
        let record = ThreadRecord::new(Arc::new(GcConfig::default().with_young_size(1024)));
        let threshold = GcConfig::default().malloc_threshold as usize;
        assert!(!record.charge_foreign_allocation(threshold - 1));
        assert!(record.charge_foreign_allocation(2));
    }

    #[test]
    fn run_state_round_trips() {
        let record = ThreadRecord::new(Arc::new(GcConfig::default()));
        assert_eq!(record.run_state(), RunState::Dependent);
        record.set_run_state(RunState::Independent);
        assert_eq!(record.run_state(), RunState::Independent);
    }
}

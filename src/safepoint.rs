//! World coordinator's safepoint protocol (§4.7): bring every dependent
//! thread to a checkpoint before a collection runs. Adapted from the
//! teacher's `GlobalSafepoint`/`Barrier`, narrowed to the three run
//! states the distilled spec actually names (dependent / independent /
//! sleeping) instead of the teacher's five-state `ThreadState`.

use crate::mutator::{RunState, ThreadRecord};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

struct Barrier {
    armed: AtomicBool,
    mutex: Mutex<i32>,
    cv_resume: Condvar,
    cv_stopped: Condvar,
}

impl Barrier {
    fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
            mutex: Mutex::new(0),
            cv_resume: Condvar::new(),
            cv_stopped: Condvar::new(),
        }
    }

    fn arm(&self) {
        let mut stopped = self.mutex.lock();
        *stopped = 0;
        self.armed.store(true, Ordering::SeqCst);
    }

    fn disarm(&self) {
        let mut stopped = self.mutex.lock();
        *stopped = 0;
        self.armed.store(false, Ordering::SeqCst);
        self.cv_resume.notify_all();
    }

    fn wait_until(&self, target: i32) {
        let mut stopped = self.mutex.lock();
        while *stopped < target {
            self.cv_stopped.wait(&mut stopped);
        }
    }

    fn notify_stopped(&self) {
        let mut stopped = self.mutex.lock();
        *stopped += 1;
        self.cv_stopped.notify_one();
    }

    fn wait_while_armed(&self) {
        let mut stopped = self.mutex.lock();
        while self.armed.load(Ordering::SeqCst) {
            self.cv_resume.wait(&mut stopped);
        }
    }
}

/// Registry of live thread records plus the stop-the-world barrier.
/// One per [`crate::heap::Heap`].
pub struct GlobalSafepoint {
    records: Mutex<Vec<*mut ThreadRecord>>,
    barrier: Barrier,
    active_scopes: AtomicI32,
}

unsafe impl Send for GlobalSafepoint {}
unsafe impl Sync for GlobalSafepoint {}

impl GlobalSafepoint {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            barrier: Barrier::new(),
            active_scopes: AtomicI32::new(0),
        }
    }

    pub fn register(&self, record: *mut ThreadRecord) {
        self.records.lock().push(record);
    }

    pub fn unregister(&self, record: *mut ThreadRecord) {
        self.records.lock().retain(|r| *r != record);
    }

    pub fn for_each(&self, mut f: impl FnMut(&ThreadRecord)) {
        let records = self.records.lock();
        for r in records.iter() {
            f(unsafe { &**r });
        }
    }

    /// Called by a dependent thread at every cooperative poll point
    /// (method entry, backward branch, allocation). If a collection is
    /// in progress, blocks until it finishes.
    pub fn checkpoint(&self, record: &ThreadRecord) {
        if self.barrier.armed.load(Ordering::SeqCst) {
            record.set_run_state(RunState::Sleeping);
            self.barrier.notify_stopped();
            self.barrier.wait_while_armed();
            record.set_run_state(RunState::Dependent);
        }
    }

    /// Transition a thread out of dependent tracking (blocking I/O,
    /// foreign code). The collector no longer waits for it.
    pub fn enter_independent(&self, record: &ThreadRecord) {
        record.set_run_state(RunState::Independent);
        if self.barrier.armed.load(Ordering::SeqCst) {
            self.barrier.notify_stopped();
        }
    }

    /// Transition back to dependent. Blocks if a collection is
    /// currently running (invariant: no thread touches managed memory
    /// while the world is stopped).
    pub fn enter_dependent(&self, record: &ThreadRecord) {
        self.barrier.wait_while_armed();
        record.set_run_state(RunState::Dependent);
    }

    /// Stop the world: arm the barrier and wait for every dependent
    /// thread to either reach a checkpoint or already be independent.
    /// Re-entrant across nested scopes on the same (driver) thread.
    pub fn enter_safepoint_scope(&self) {
        if self.active_scopes.fetch_add(1, Ordering::AcqRel) + 1 > 1 {
            return;
        }
        self.barrier.arm();
        let mut waiting_for = 0;
        self.for_each(|record| {
            if record.run_state() == RunState::Dependent {
                waiting_for += 1;
            }
        });
        self.barrier.wait_until(waiting_for);
    }

    pub fn leave_safepoint_scope(&self) {
        if self.active_scopes.fetch_sub(1, Ordering::AcqRel) - 1 > 0 {
            return;
        }
        self.barrier.disarm();
    }

    /// Release everything after a fork: surviving thread records are
    /// reset to dependent, the barrier disarmed regardless of its prior
    /// state (§9 "After-fork").
    pub fn reset_after_fork(&self, survivor: *mut ThreadRecord) {
        let mut records = self.records.lock();
        records.retain(|r| *r == survivor);
        self.barrier.armed.store(false, Ordering::SeqCst);
        self.active_scopes.store(0, Ordering::SeqCst);
        if let Some(r) = records.first() {
            unsafe { (**r).set_run_state(RunState::Independent) };
            unsafe { (**r).set_run_state(RunState::Dependent) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;
    use std::sync::Arc;

    #[test]
    fn scope_with_no_dependents_does_not_block() {
        let sp = GlobalSafepoint::new();
        sp.enter_safepoint_scope();
        sp.leave_safepoint_scope();
    }

    #[test]
    fn independent_thread_is_not_waited_on() {
        let sp = GlobalSafepoint::new();
        let mut record = ThreadRecord::new(Arc::new(GcConfig::default()));
        let ptr = &mut record as *mut ThreadRecord;
        sp.register(ptr);
        sp.enter_independent(&record);
        sp.enter_safepoint_scope();
        sp.leave_safepoint_scope();
        sp.unregister(ptr);
    }
}

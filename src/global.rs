//! Global, per-process GC instance (§2B convenience surface). Adapted from
//! the teacher's `global`/`MUTATOR` thread-local, narrowed to this crate's
//! single concrete [`Heap`] instead of a generic `MutatorRef<H>`: one
//! process-wide heap behind a `OnceLock`, with each thread lazily
//! registering its own [`MutatorHandle`] the first time it touches the
//! global heap.

use crate::api::Gc;
use crate::config::GcConfig;
use crate::error::GcResult;
use crate::heap::{Heap, MutatorHandle};
use crate::trace::Trace;
use std::sync::OnceLock;

static GLOBAL_HEAP: OnceLock<Heap> = OnceLock::new();

thread_local! {
    static MUTATOR: MutatorHandle<'static> = global_heap().register_thread();
}

/// Initialize the process-wide heap.
///
/// # Panics
///
/// Panics if called more than once.
pub fn global_initialize(config: GcConfig) {
    GLOBAL_HEAP
        .set(Heap::new(config))
        .unwrap_or_else(|_| panic!("global GC heap already initialized"));
}

fn global_heap() -> &'static Heap {
    GLOBAL_HEAP
        .get()
        .expect("global::global_initialize was not called before touching the global heap")
}

/// Allocate on the process-wide heap from the calling thread. Registers
/// the calling thread with the collector on first use.
pub fn allocate<T: Trace + 'static>(value: T) -> GcResult<Gc<T>> {
    MUTATOR.with(|thread| global_heap().allocate(thread, value))
}

/// Allocate directly into the mature generation, bypassing the young
/// generation (see [`Heap::allocate_mature`]).
pub fn allocate_mature<T: Trace + 'static>(value: T) -> GcResult<Gc<T>> {
    global_heap().allocate_mature(value)
}

/// Poll the cooperative safepoint for the calling thread.
pub fn checkpoint() {
    MUTATOR.with(|thread| global_heap().checkpoint(thread));
}

/// Request (without forcing) a collection at the next safepoint.
pub fn request_collection(young: bool, mature: bool) {
    global_heap().request_collection(young, mature);
}

/// Drive a collection cycle now on the process-wide heap.
pub fn collect_garbage(young: bool, mature: bool) {
    global_heap().collect_garbage(young, mature);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Visitor;

    struct Leaf(u64);
    impl Trace for Leaf {
        fn trace(&mut self, _v: &mut Visitor) {}
    }

    // `GLOBAL_HEAP` is process-wide, so only one test in this binary may
    // call `global_initialize`; the rest of the suite exercises `Heap`
    // directly. Run with `--test-threads=1` if this ever grows a sibling.
    #[test]
    fn allocate_through_global_heap() {
        global_initialize(GcConfig::default());
        let gc = allocate(Leaf(9)).unwrap();
        assert_eq!(gc.0, 9);
        checkpoint();
        collect_garbage(true, true);
    }
}

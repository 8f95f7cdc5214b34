//! Multi-threaded scenario tests (§2A: S2, S5, S6 need real `std::thread`
//! execution, not a single-threaded simulation of interleavings).

use ossuary::config::GcConfig;
use ossuary::error::GcError;
use ossuary::header::{HeapObjectHeader, LockOutcome};
use ossuary::heap::Heap;
use ossuary::trace::{Trace, Visitor};
use ossuary::{letroot, Gc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

/// Compose the documented primitives (`try_lock_thin` / `unlock_thin` /
/// `contend`) into the blocking acquire §4.7 calls `contend_for_lock` — no
/// single function in the crate does this, any more than a caller's own
/// lock statement would; this mirrors how one is actually meant to be used.
fn contend_for_lock(
    header: &HeapObjectHeader,
    owner: u32,
    timeout: Option<Duration>,
    interrupt: &AtomicBool,
) -> Result<(), GcError> {
    match header.try_lock_thin(owner) {
        LockOutcome::Acquired => Ok(()),
        LockOutcome::Inflated(index) => {
            ossuary::inflate::table().get(index).contend(owner, timeout, interrupt)
        }
        LockOutcome::Contended => {
            let deadline = timeout.map(|d| Instant::now() + d);
            loop {
                if let Some(index) = header.inflated_index_if_any() {
                    return ossuary::inflate::table().get(index).contend(owner, timeout, interrupt);
                }
                if interrupt.load(Ordering::Relaxed) {
                    return Err(GcError::LockInterrupted);
                }
                if let Some(dl) = deadline {
                    if Instant::now() >= dl {
                        return Err(GcError::LockTimeout);
                    }
                }
                std::thread::yield_now();
            }
        }
    }
}

fn leaked_header() -> &'static HeapObjectHeader {
    Box::leak(Box::new(HeapObjectHeader::new(0, 16)))
}

/// S2 — thin lock contended by a second thread inflates on unlock, and the
/// contender then acquires the inflated mutex cleanly.
#[test]
fn s2_thin_lock_contention_inflates_and_hands_off() {
    let header = leaked_header();
    assert!(matches!(header.try_lock_thin(1), LockOutcome::Acquired));

    let ready = Arc::new(Barrier::new(2));
    let ready_b = ready.clone();
    let interrupt = Arc::new(AtomicBool::new(false));
    let interrupt_b = interrupt.clone();

    let b = std::thread::spawn(move || {
        ready_b.wait();
        // Owner (thread A) is still holding the thin lock at this point;
        // this blocks until A unlocks and inflates, then hands off.
        contend_for_lock(header, 2, Some(Duration::from_secs(5)), &interrupt_b)
    });

    ready.wait();
    // Give B a chance to observe the thin lock and mark it contended
    // before A unlocks, matching the scenario's ordering.
    std::thread::sleep(Duration::from_millis(20));
    let inflated = header.unlock_thin(1);
    let index = inflated.expect("contended unlock must inflate rather than drop to Empty");
    // `unlock_thin` on the contended path installs the inflated monitor
    // with A's ownership carried over (invariant 5) rather than releasing
    // outright; the actual release now goes through the monitor itself.
    ossuary::inflate::table().get(index).unlock(1);

    let result = b.join().expect("contender thread panicked");
    assert!(result.is_ok(), "contender should acquire the inflated mutex: {:?}", result);
    // B now owns the inflated monitor; release it so the test doesn't leak
    // a permanently-held lock into process-global state.
    let index = header.inflated_index_if_any().expect("header is inflated");
    ossuary::inflate::table().get(index).unlock(2);
}

/// S6 — a thread blocked on a still-held thin lock times out within the
/// requested window instead of hanging, and the lock is left exactly as it
/// was (still thin-locked by the original owner).
#[test]
fn s6_contend_for_lock_times_out_while_still_thin_locked() {
    let header = leaked_header();
    assert!(matches!(header.try_lock_thin(1), LockOutcome::Acquired));

    let interrupt = AtomicBool::new(false);
    let start = Instant::now();
    let result = contend_for_lock(header, 2, Some(Duration::from_millis(10)), &interrupt);
    let elapsed = start.elapsed();

    assert_eq!(result, Err(GcError::LockTimeout));
    assert!(elapsed < Duration::from_millis(200), "timeout took {:?}, expected well under 200ms", elapsed);
    // A contended-timeout path still marks the header contended (the
    // `Contended` branch above observed it), so by the time B gives up the
    // header may already be inflated; either way it must not read as
    // unlocked, and no other thread may have acquired it.
    match header.inflated_index_if_any() {
        Some(index) => {
            let record = ossuary::inflate::table().get(index);
            // Owner 1 never called `unlock`, so the inflated monitor (if
            // installed) has no owner yet; confirm owner 1 can still
            // re-enter without contention from anyone else.
            record.lock(1);
            record.unlock(1);
        }
        None => {
            assert!(matches!(header.try_lock_thin(1), LockOutcome::Acquired));
            header.unlock_thin(1);
        }
    }
}

struct Node {
    value: u64,
    next: Option<Gc<Node>>,
}

impl Trace for Node {
    fn trace(&mut self, visitor: &mut Visitor) {
        if let Some(next) = &mut self.next {
            visitor.edge(next);
        }
    }
}

/// S5 — mutator threads allocating, rooting, and mutating their own chains
/// must all observe their roots survive collections a separate thread is
/// concurrently driving to completion (this crate's C4/C7 run fully
/// stop-the-world, so there is no in-flight concurrent mark to race — see
/// the Open Question resolution in DESIGN.md — but the safepoint protocol
/// stopping and resuming several live mutators, each cooperating via
/// `checkpoint`, is exactly the concurrency this scenario needs covered).
#[test]
fn s5_rooted_objects_survive_collections_racing_live_mutators() {
    let config = GcConfig::default().with_young_size(16 * 1024).with_immix_heap_size(1024 * 1024);
    let heap = Arc::new(Heap::new(config));
    let stop = Arc::new(AtomicBool::new(false));
    let failures = Arc::new(AtomicUsize::new(0));
    const WORKERS: usize = 4;
    const ITERS: usize = 200;

    let mut workers = Vec::new();
    for id in 0..WORKERS {
        let heap = heap.clone();
        let stop = stop.clone();
        let failures = failures.clone();
        workers.push(std::thread::spawn(move || {
            let thread = heap.register_thread();
            for i in 0..ITERS {
                let tag = (id as u64) * 1_000_000 + i as u64;
                let mut head: Option<Gc<Node>> = None;
                for depth in 0..5u64 {
                    let node = heap
                        .allocate(&thread, Node { value: tag + depth, next: head })
                        .expect("allocation should succeed under this heap's budget");
                    head = Some(node);
                }
                letroot!(root: Gc<Node> = thread.record().shadow_stack(), head.unwrap());
                heap.checkpoint(&thread);
                let mut cursor = Some(*root);
                let mut depth = 0u64;
                while let Some(node) = cursor {
                    if node.value != tag + (4 - depth) {
                        failures.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    cursor = node.next;
                    depth += 1;
                }
                heap.checkpoint(&thread);
            }
        }));
    }

    let collector_heap = heap.clone();
    let collector_stop = stop.clone();
    let collector = std::thread::spawn(move || {
        while !collector_stop.load(Ordering::Relaxed) {
            collector_heap.collect_garbage(true, false);
            std::thread::sleep(Duration::from_millis(1));
        }
    });

    for w in workers {
        w.join().expect("worker thread panicked");
    }
    stop.store(true, Ordering::Relaxed);
    collector.join().expect("collector thread panicked");

    assert_eq!(failures.load(Ordering::Relaxed), 0, "a rooted chain was corrupted by a racing collection");
}

//! C1: the packed per-object header word.
//!
//! Every heap object begins with a [`HeapObjectHeader`]. Two `u64` words
//! live side by side:
//!
//! - `lock`: the four-meaning word (`Empty` / `Identity` / `ThinLock` /
//!   `Inflated`) described by the transition diagram below. All
//!   transitions are single-word CAS; meanings are only ever promoted,
//!   never demoted.
//! - `control`: ambient per-object bookkeeping that every object needs
//!   regardless of its lock meaning — the type index, the current mark
//!   bit, the allocation size, and the forwarding slot used transiently
//!   during copying collection.
//!
//! ```text
//! Empty ──set-id──► Identity ──inflate──► Inflated
//! Empty ──lock────► ThinLock ──reenter(same thread)──► ThinLock(++rec)
//! ThinLock ──contends(other thread)──► ThinLock(contended=1) ──unlock──► Inflated
//! Any ──need-foreign-handle──► Inflated
//! Inflated (terminal)
//! ```

use crate::util::BitField64;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Meaning {
    Empty = 0,
    Identity = 1,
    ThinLock = 2,
    Inflated = 3,
}

impl Meaning {
    fn from_bits(bits: u64) -> Meaning {
        match bits {
            0 => Meaning::Empty,
            1 => Meaning::Identity,
            2 => Meaning::ThinLock,
            3 => Meaning::Inflated,
            _ => unreachable!("meaning is a 2-bit field"),
        }
    }
}

struct MeaningField;
impl BitField64 for MeaningField {
    const SHIFT: u32 = 0;
    const BITS: u32 = 2;
}
struct AuxField;
impl BitField64 for AuxField {
    const SHIFT: u32 = 2;
    const BITS: u32 = 62;
}

// Sub-fields of `aux` when meaning == ThinLock, re-based to start at bit 0
// of the 62-bit aux value (shifted left by 2 relative to the full word).
struct ThinOwner;
impl BitField64 for ThinOwner {
    const SHIFT: u32 = 0;
    const BITS: u32 = 32;
}
struct ThinRecursion;
impl BitField64 for ThinRecursion {
    const SHIFT: u32 = 32;
    const BITS: u32 = 8;
}
struct ThinContended;
impl BitField64 for ThinContended {
    const SHIFT: u32 = 40;
    const BITS: u32 = 1;
}

/// Sub-fields of the `control` word.
struct Slot; // TypeInfoIndex, or a forwarding destination once `Forwarded` is set.
impl BitField64 for Slot {
    const SHIFT: u32 = 0;
    const BITS: u32 = 48;
}
struct MarkBit;
impl BitField64 for MarkBit {
    const SHIFT: u32 = 48;
    const BITS: u32 = 1;
}
struct SizeUnits; // size in 8-byte units; covers up to 65528 bytes.
impl BitField64 for SizeUnits {
    const SHIFT: u32 = 49;
    const BITS: u32 = 13;
}
struct ForwardedBit;
impl BitField64 for ForwardedBit {
    const SHIFT: u32 = 62;
    const BITS: u32 = 1;
}
struct PinnedBit;
impl BitField64 for PinnedBit {
    const SHIFT: u32 = 63;
    const BITS: u32 = 1;
}

#[repr(C)]
pub struct HeapObjectHeader {
    lock: AtomicU64,
    control: AtomicU64,
}

/// Outcome of a thin-lock acquisition attempt.
pub enum LockOutcome {
    Acquired,
    /// The lock is already inflated; caller must fall through to the
    /// inflated mutex (see [`crate::inflate`]).
    Inflated(u32),
    /// Another thread owns the thin lock; caller marked it contended and
    /// must inflate to actually block.
    Contended,
}

impl HeapObjectHeader {
    pub fn new(type_index: u16, size: usize) -> Self {
        let control = SizeUnits::update(0, (size / 8) as u64);
        let control = Slot::update(control, type_index as u64);
        Self {
            lock: AtomicU64::new(0),
            control: AtomicU64::new(control),
        }
    }

    #[inline]
    pub fn type_index(&self) -> u16 {
        if self.is_forwarded() {
            unsafe { (*self.forward_address()).type_index() }
        } else {
            Slot::decode(self.control.load(Ordering::Relaxed)) as u16
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        SizeUnits::decode(self.control.load(Ordering::Relaxed)) as usize * 8
    }

    pub fn set_size(&self, bytes: usize) {
        let _ = self
            .control
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |w| {
                Some(SizeUnits::update(w, (bytes / 8) as u64))
            });
    }

    #[inline]
    pub fn is_marked(&self, current_mark: bool) -> bool {
        (MarkBit::decode(self.control.load(Ordering::Relaxed)) != 0) == current_mark
    }

    /// Try to set the mark bit to `current_mark`. Returns `true` if this
    /// call transitioned it (i.e. the object was previously unmarked this
    /// epoch) — idempotent within an epoch per invariant 7.
    #[inline]
    pub fn try_mark(&self, current_mark: bool) -> bool {
        let bit = current_mark as u64;
        loop {
            let word = self.control.load(Ordering::Relaxed);
            if MarkBit::decode(word) == bit {
                return false;
            }
            let new_word = MarkBit::update(word, bit);
            if self
                .control
                .compare_exchange_weak(word, new_word, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    #[inline]
    pub fn is_forwarded(&self) -> bool {
        ForwardedBit::decode(self.control.load(Ordering::Acquire)) != 0
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        PinnedBit::decode(self.control.load(Ordering::Relaxed)) != 0
    }

    pub fn set_pinned(&self) {
        let _ = self
            .control
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |w| {
                Some(PinnedBit::update(w, 1))
            });
    }

    pub fn clear_pinned(&self) {
        let _ = self
            .control
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |w| {
                Some(PinnedBit::update(w, 0))
            });
    }

    /// Install a forwarding pointer. Invariant 3: after this call every
    /// subsequent read of this header resolves to `dest` until the
    /// source storage itself is reclaimed.
    pub fn set_forwarded(&self, dest: *mut HeapObjectHeader) {
        let mut word = self.control.load(Ordering::Relaxed);
        loop {
            let mut new_word = Slot::update(word, dest as u64);
            new_word = ForwardedBit::update(new_word, 1);
            match self.control.compare_exchange_weak(
                word,
                new_word,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(v) => word = v,
            }
        }
    }

    pub fn forward_address(&self) -> *mut HeapObjectHeader {
        debug_assert!(self.is_forwarded());
        Slot::decode(self.control.load(Ordering::Acquire)) as *mut HeapObjectHeader
    }

    // --- C1 lock-word state machine -------------------------------------

    #[inline]
    pub fn meaning(&self) -> Meaning {
        Meaning::from_bits(MeaningField::decode(self.lock.load(Ordering::Acquire)))
    }

    /// Assign an identity hash/id if none is present yet. Returns the
    /// resulting id either way (invariant 4: identity is stable once
    /// assigned, so a racing assigner converges on the value whoever won
    /// the CAS installed).
    pub fn assign_identity(&self, mut next_id: impl FnMut() -> u64) -> u64 {
        loop {
            let word = self.lock.load(Ordering::Acquire);
            match Meaning::from_bits(MeaningField::decode(word)) {
                Meaning::Empty => {
                    let id = next_id();
                    let mut new_word = MeaningField::update(word, Meaning::Identity as u64);
                    new_word = AuxField::update(new_word, id);
                    if self
                        .lock
                        .compare_exchange(word, new_word, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return id;
                    }
                }
                Meaning::Identity => return AuxField::decode(word),
                Meaning::Inflated => {
                    return crate::inflate::table()
                        .get(Self::inflated_index(word))
                        .identity(&mut next_id)
                }
                Meaning::ThinLock => {
                    crate::inflate::ensure_inflated(self);
                }
            }
        }
    }

    fn inflated_index(word: u64) -> u32 {
        AuxField::decode(word) as u32
    }

    #[inline]
    pub fn inflated_index_if_any(&self) -> Option<u32> {
        let word = self.lock.load(Ordering::Acquire);
        if Meaning::from_bits(MeaningField::decode(word)) == Meaning::Inflated {
            Some(Self::inflated_index(word))
        } else {
            None
        }
    }

    /// Attempt the lightweight (thin) lock fast path for `owner`.
    pub fn try_lock_thin(&self, owner: u32) -> LockOutcome {
        loop {
            let word = self.lock.load(Ordering::Acquire);
            match Meaning::from_bits(MeaningField::decode(word)) {
                Meaning::Empty | Meaning::Identity => {
                    let aux = ThinOwner::update(0, owner as u64);
                    let aux = ThinRecursion::update(aux, 1);
                    let mut new_word = MeaningField::update(word, Meaning::ThinLock as u64);
                    new_word = AuxField::update(new_word, aux);
                    if self
                        .lock
                        .compare_exchange_weak(word, new_word, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return LockOutcome::Acquired;
                    }
                }
                Meaning::ThinLock => {
                    let aux = AuxField::decode(word);
                    let cur_owner = ThinOwner::decode(aux) as u32;
                    if cur_owner == owner {
                        let rec = ThinRecursion::decode(aux) + 1;
                        if rec >= 1 << ThinRecursion::BITS {
                            return LockOutcome::Contended;
                        }
                        let new_aux = ThinRecursion::update(aux, rec);
                        let new_word = AuxField::update(word, new_aux);
                        if self
                            .lock
                            .compare_exchange_weak(
                                word,
                                new_word,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            )
                            .is_ok()
                        {
                            return LockOutcome::Acquired;
                        }
                    } else {
                        let new_aux = ThinContended::update(aux, 1);
                        let new_word = AuxField::update(word, new_aux);
                        let _ = self.lock.compare_exchange_weak(
                            word,
                            new_word,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        );
                        return LockOutcome::Contended;
                    }
                }
                Meaning::Inflated => return LockOutcome::Inflated(Self::inflated_index(word)),
            }
        }
    }

    /// Unlock a thin lock held by `owner`. If a contender marked the lock
    /// contended while we held it, inflate instead of dropping to
    /// `Empty` so the contender can find a monitor to wait on.
    pub fn unlock_thin(&self, owner: u32) -> Option<u32> {
        loop {
            let word = self.lock.load(Ordering::Acquire);
            match Meaning::from_bits(MeaningField::decode(word)) {
                Meaning::ThinLock => {
                    let aux = AuxField::decode(word);
                    let cur_owner = ThinOwner::decode(aux) as u32;
                    crate::invariant!(cur_owner == owner, "unlock_thin by non-owner");
                    let rec = ThinRecursion::decode(aux);
                    let contended = ThinContended::decode(aux) != 0;
                    if rec > 1 {
                        let new_aux = ThinRecursion::update(aux, rec - 1);
                        let new_word = AuxField::update(word, new_aux);
                        if self
                            .lock
                            .compare_exchange_weak(
                                word,
                                new_word,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            )
                            .is_ok()
                        {
                            return None;
                        }
                    } else if contended {
                        return Some(crate::inflate::ensure_inflated(self));
                    } else {
                        let new_word = MeaningField::update(word, Meaning::Empty as u64);
                        let new_word = AuxField::update(new_word, 0);
                        if self
                            .lock
                            .compare_exchange_weak(
                                word,
                                new_word,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            )
                            .is_ok()
                        {
                            return None;
                        }
                    }
                }
                Meaning::Inflated => return Some(Self::inflated_index(word)),
                Meaning::Empty | Meaning::Identity => {
                    crate::error::fatal("unlock of an object with no lock held")
                }
            }
        }
    }

    /// Install an `Inflated` meaning pointing at `index`. Never demotes:
    /// if already inflated, returns the existing index instead.
    pub fn install_inflated(&self, index: u32) -> u32 {
        loop {
            let word = self.lock.load(Ordering::Acquire);
            if let Meaning::Inflated = Meaning::from_bits(MeaningField::decode(word)) {
                return Self::inflated_index(word);
            }
            let mut new_word = MeaningField::update(word, Meaning::Inflated as u64);
            new_word = AuxField::update(new_word, index as u64);
            if self
                .lock
                .compare_exchange_weak(word, new_word, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return index;
            }
        }
    }

    /// Read out whatever a thin lock currently holds, to seed a new
    /// monitor's owner/recursion during inflation (invariant 5).
    pub fn read_thin(&self) -> Option<(u32, u8)> {
        let word = self.lock.load(Ordering::Acquire);
        match Meaning::from_bits(MeaningField::decode(word)) {
            Meaning::ThinLock => {
                let aux = AuxField::decode(word);
                Some((ThinOwner::decode(aux) as u32, ThinRecursion::decode(aux) as u8))
            }
            _ => None,
        }
    }

    /// Read out whatever identity was assigned before inflation, so the
    /// new inflated record can absorb it (invariant 4).
    pub fn read_identity(&self) -> Option<u64> {
        let word = self.lock.load(Ordering::Acquire);
        match Meaning::from_bits(MeaningField::decode(word)) {
            Meaning::Identity => Some(AuxField::decode(word)),
            _ => None,
        }
    }
}

unsafe impl Send for HeapObjectHeader {}
unsafe impl Sync for HeapObjectHeader {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_header_is_empty() {
        let h = HeapObjectHeader::new(3, 32);
        assert_eq!(h.meaning(), Meaning::Empty);
        assert_eq!(h.size(), 32);
        assert_eq!(h.type_index(), 3);
    }

    #[test]
    fn identity_is_stable() {
        let h = HeapObjectHeader::new(0, 16);
        let mut counter = 0u64;
        let id = h.assign_identity(|| {
            counter += 1;
            counter
        });
        assert_eq!(h.assign_identity(|| panic!("should not be called again")), id);
    }

    #[test]
    fn thin_lock_reenters_same_thread() {
        let h = HeapObjectHeader::new(0, 16);
        assert!(matches!(h.try_lock_thin(1), LockOutcome::Acquired));
        assert!(matches!(h.try_lock_thin(1), LockOutcome::Acquired));
        assert!(h.unlock_thin(1).is_none());
        assert!(h.unlock_thin(1).is_none());
        assert_eq!(h.meaning(), Meaning::Empty);
    }

    #[test]
    fn thin_lock_marks_contended_for_other_thread() {
        let h = HeapObjectHeader::new(0, 16);
        assert!(matches!(h.try_lock_thin(1), LockOutcome::Acquired));
        assert!(matches!(h.try_lock_thin(2), LockOutcome::Contended));
    }

    #[test]
    fn mark_bit_idempotent_within_epoch() {
        let h = HeapObjectHeader::new(0, 16);
        assert!(h.try_mark(true));
        assert!(!h.try_mark(true));
        assert!(h.try_mark(false));
    }

    #[test]
    fn forwarding_overrides_type_lookup() {
        let src = HeapObjectHeader::new(5, 16);
        let dst = Box::new(HeapObjectHeader::new(5, 16));
        let dst_ptr = Box::into_raw(dst);
        src.set_forwarded(dst_ptr);
        assert!(src.is_forwarded());
        assert_eq!(src.forward_address(), dst_ptr);
        unsafe {
            drop(Box::from_raw(dst_ptr));
        }
    }
}

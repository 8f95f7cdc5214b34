//! Per-mutator thread-local allocation buffer (part of C3's fast path,
//! per §4.3/§4.6). A bump-pointer slab carved out of the young to-space;
//! refilled from [`crate::heap::Heap`] under the allocator's spinlock
//! when exhausted. Adapted from the teacher's `SimpleTLAB`, generalized
//! away from its `GcBase`/`Gc<T>` indirection since there is one
//! concrete `Heap` here.

use crate::api::Gc;
use crate::header::HeapObjectHeader;
use crate::trace::Trace;
use crate::util::align_up;
use std::ptr::{null_mut, NonNull};

/// Largest request this buffer will ever satisfy; bigger objects always
/// go through the slow path (C4 or C5 directly).
pub const TLAB_INLINE_LIMIT: usize = 8 * 1024;

pub struct Tlab {
    start: *mut u8,
    cursor: *mut u8,
    end: *mut u8,
}

impl Tlab {
    pub fn empty() -> Self {
        Self {
            start: null_mut(),
            cursor: null_mut(),
            end: null_mut(),
        }
    }

    pub fn install(&mut self, start: *mut u8, size: usize) {
        self.start = start;
        self.cursor = start;
        self.end = unsafe { start.add(size) };
    }

    pub fn reset(&mut self) {
        self.start = null_mut();
        self.cursor = null_mut();
        self.end = null_mut();
    }

    pub fn remaining(&self) -> usize {
        if self.cursor.is_null() {
            0
        } else {
            self.end as usize - self.cursor as usize
        }
    }

    /// Bump-allocate `T` inline. Returns `Err(value)` (giving the value
    /// back, since it was never placed) if the buffer cannot satisfy it;
    /// the caller falls through to `Heap::allocate_slow`.
    pub fn try_allocate<T: Trace + 'static>(&mut self, value: T) -> Result<Gc<T>, T> {
        if self.cursor.is_null() {
            return Err(value);
        }
        let total = align_up(
            std::mem::size_of::<HeapObjectHeader>() + std::mem::size_of::<T>(),
            8,
        );
        if total > TLAB_INLINE_LIMIT {
            return Err(value);
        }
        unsafe {
            let result = self.cursor;
            let new_cursor = result.add(total);
            if new_cursor > self.end {
                return Err(value);
            }
            self.cursor = new_cursor;
            let type_index = crate::api::register::<T>().0;
            let header = result.cast::<HeapObjectHeader>();
            header.write(HeapObjectHeader::new(type_index, total));
            let payload = result.add(std::mem::size_of::<HeapObjectHeader>());
            payload.cast::<T>().write(value);
            Ok(Gc::<T>::from_header(NonNull::new_unchecked(header)))
        }
    }
}

unsafe impl Send for Tlab {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf(u64);
    impl Trace for Leaf {
        fn trace(&mut self, _v: &mut crate::trace::Visitor) {}
    }

    #[test]
    fn allocates_until_exhausted() {
        let mut backing = vec![0u8; 256];
        let mut tlab = Tlab::empty();
        tlab.install(backing.as_mut_ptr(), backing.len());
        let mut count = 0;
        loop {
            match tlab.try_allocate(Leaf(count as u64)) {
                Ok(_) => count += 1,
                Err(_) => break,
            }
        }
        assert!(count > 0);
        assert!(tlab.remaining() < std::mem::size_of::<HeapObjectHeader>() + std::mem::size_of::<Leaf>());
    }

    #[test]
    fn empty_tlab_always_misses() {
        let mut tlab = Tlab::empty();
        assert!(tlab.try_allocate(Leaf(0)).is_err());
    }
}


//! The public handle types: [`Gc<T>`] and [`Weak<T>`]. Adapted from the
//! teacher's `api::Gc`/`Field`, collapsed to a single concrete header
//! layout (`crate::header::HeapObjectHeader`) instead of the teacher's
//! `mopa`-backed `dyn Collectable` vtable, since every allocation here
//! goes through one fixed `Heap` rather than a pluggable backend.

use crate::header::HeapObjectHeader;
use crate::trace::{Trace, Visitor};
use crate::type_info::{self, TypeInfoIndex};
use std::marker::PhantomData;
use std::ptr::NonNull;

/// A managed pointer to a `T` living in the young, Immix, or large pool.
/// Copyable and `'static`-shaped: the pointee may move underneath it
/// (young promotion, Immix evacuation), which is exactly what `trace`
/// exists to repair.
#[repr(transparent)]
pub struct Gc<T: Trace> {
    header: NonNull<HeapObjectHeader>,
    marker: PhantomData<T>,
}

impl<T: Trace> Gc<T> {
    /// # Safety
    /// `header` must point at a live object whose payload is a `T`.
    pub unsafe fn from_header(header: NonNull<HeapObjectHeader>) -> Self {
        Self {
            header,
            marker: PhantomData,
        }
    }

    #[inline]
    fn payload(&self) -> *mut u8 {
        let header = self.resolved_header();
        unsafe { (header.as_ptr() as *mut u8).add(std::mem::size_of::<HeapObjectHeader>()) }
    }

    /// Follow any forwarding pointer installed by an in-progress or
    /// completed copy (invariant 3).
    #[inline]
    fn resolved_header(&self) -> NonNull<HeapObjectHeader> {
        let mut header = self.header;
        unsafe {
            while header.as_ref().is_forwarded() {
                header = NonNull::new_unchecked(header.as_ref().forward_address());
            }
        }
        header
    }

    pub fn header(&self) -> &HeapObjectHeader {
        unsafe { self.resolved_header().as_ref() }
    }

    pub fn ptr_eq(a: &Gc<T>, b: &Gc<T>) -> bool {
        a.resolved_header() == b.resolved_header()
    }

    /// Identity value stable across moves (§3, invariant 4).
    pub fn identity_hash(&self, next_id: impl Fn() -> u64) -> u64 {
        self.header().assign_identity(next_id)
    }

    pub(crate) fn as_raw(&self) -> *mut u8 {
        self.header.as_ptr().cast()
    }

    pub(crate) fn set_raw(&mut self, raw: *mut u8) {
        self.header = unsafe { NonNull::new_unchecked(raw.cast()) };
    }
}

impl<T: Trace> Clone for Gc<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: Trace> Copy for Gc<T> {}

impl<T: Trace> std::ops::Deref for Gc<T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.payload().cast::<T>() }
    }
}

impl<T: Trace> std::ops::DerefMut for Gc<T> {
    fn deref_mut(&mut self) -> &mut T {
        let header = self.resolved_header().as_ptr();
        crate::mutator::record_write_on_current(header);
        unsafe { &mut *self.payload().cast::<T>() }
    }
}

impl<T: Trace> Trace for Gc<T> {
    fn trace(&mut self, visitor: &mut Visitor) {
        visitor.edge(self);
    }
}

impl<T: Trace + 'static> Gc<T> {
    pub fn type_info_index(&self) -> TypeInfoIndex {
        TypeInfoIndex(self.header().type_index())
    }
}

impl<T: Trace> std::fmt::Pointer for Gc<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:p}", self.header.as_ptr())
    }
}

/// A non-owning reference that reads as `None` once its referent is
/// unreachable. Backed by the inflated-header table (§4.7 step 4): each
/// collector keeps the table's record of the object's current address up
/// to date as it moves, and nulls it once its own sweep determines the
/// object is dead, strictly before that collection's finalizer pass runs.
/// `upgrade` just reads the table, so it never chases a stale address.
pub struct Weak<T: Trace> {
    inflated: u32,
    marker: PhantomData<T>,
}

impl<T: Trace> Weak<T> {
    pub(crate) fn new(inflated: u32) -> Self {
        Self {
            inflated,
            marker: PhantomData,
        }
    }

    /// Resolve to a strong [`Gc<T>`] if the referent is still alive.
    pub fn upgrade(&self) -> Option<Gc<T>> {
        let header = crate::inflate::table().get(self.inflated).object();
        NonNull::new(header).map(|header| unsafe { Gc::from_header(header) })
    }

    pub fn inflated_index(&self) -> u32 {
        self.inflated
    }
}

unsafe impl<T: Trace> Send for Gc<T> {}
unsafe impl<T: Trace> Sync for Gc<T> {}
unsafe impl<T: Trace> Send for Weak<T> {}
unsafe impl<T: Trace> Sync for Weak<T> {}

pub(crate) fn register<T: Trace + 'static>() -> TypeInfoIndex {
    type_info::register_for::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf(u32);
    impl Trace for Leaf {
        fn trace(&mut self, _v: &mut Visitor) {}
    }

    #[test]
    fn gc_derefs_to_payload() {
        let header = HeapObjectHeader::new(register::<Leaf>().0, std::mem::size_of::<Leaf>());
        let mut storage: Vec<u8> =
            vec![0; std::mem::size_of::<HeapObjectHeader>() + std::mem::size_of::<Leaf>()];
        unsafe {
            (storage.as_mut_ptr() as *mut HeapObjectHeader).write(header);
            let payload = storage.as_mut_ptr().add(std::mem::size_of::<HeapObjectHeader>());
            payload.cast::<Leaf>().write(Leaf(42));
            let gc = Gc::<Leaf>::from_header(NonNull::new_unchecked(storage.as_mut_ptr().cast()));
            assert_eq!(gc.0, 42);
        }
    }
}

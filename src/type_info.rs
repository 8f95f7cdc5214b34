//! Type info table: maps a Rust `TypeId` to the stable 16-bit index stored
//! in a header's `Slot` field (§4.1), and to the trace/finalize callbacks
//! the collectors dispatch through that index.
//!
//! Mirrors the teacher's `GCInfoTable`, but keyed the same way the teacher
//! keys it (a hashed `TypeId` slot with first-writer-wins CAS) and sized
//! for the 48-bit `Slot` field's practical range rather than its own
//! 14-bit one, since here `Slot` doubles as a forwarding destination.

use crate::mmap::Mmap;
use crate::trace::{TraceCallback, Visitor};
use parking_lot::Once;
use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::mem::size_of;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};

pub type FinalizeCallback = extern "C" fn(*mut u8);

#[derive(Clone, Copy)]
pub struct TypeInfo {
    pub trace: TraceCallback,
    pub finalize: Option<FinalizeCallback>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct TypeInfoIndex(pub u16);

struct TypeInfoTable {
    map: Mmap,
    table: *mut TypeInfo,
    type_id_slots: Vec<AtomicU32>,
    current_index: AtomicU16,
}

unsafe impl Send for TypeInfoTable {}
unsafe impl Sync for TypeInfoTable {}

impl TypeInfoTable {
    const MAX_INDEX: u16 = 1 << 14;
    const HASH_SLOTS: usize = 1 << 15;

    fn new() -> Self {
        let map = Mmap::new(Self::MAX_INDEX as usize * size_of::<TypeInfo>(), 8);
        let table = map.aligned_start(8).cast::<TypeInfo>();
        let mut slots = Vec::with_capacity(Self::HASH_SLOTS);
        slots.resize_with(Self::HASH_SLOTS, || AtomicU32::new(0));
        Self {
            map,
            table,
            type_id_slots: slots,
            current_index: AtomicU16::new(1),
        }
    }

    fn register(&self, type_id: TypeId, info: TypeInfo) -> TypeInfoIndex {
        let mut hasher = DefaultHasher::new();
        type_id.hash(&mut hasher);
        let slot = &self.type_id_slots[hasher.finish() as usize % Self::HASH_SLOTS];
        let existing = slot.load(Ordering::Acquire);
        if existing != 0 {
            return TypeInfoIndex(existing as u16);
        }
        let index = self.current_index.fetch_add(1, Ordering::AcqRel);
        if index >= Self::MAX_INDEX {
            crate::error::fatal("type info table exhausted");
        }
        unsafe {
            self.table.add(index as usize).write(info);
        }
        match slot.compare_exchange(0, index as u32, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => TypeInfoIndex(index),
            // Lost the race; the winner's registration is equivalent since
            // both came from the same monomorphized `register_for::<T>`.
            Err(winner) => TypeInfoIndex(winner as u16),
        }
    }

    fn get(&self, index: TypeInfoIndex) -> TypeInfo {
        unsafe { *self.table.add(index.0 as usize) }
    }
}

static TABLE_ONCE: Once = Once::new();
static mut TABLE: Option<TypeInfoTable> = None;

fn table() -> &'static TypeInfoTable {
    unsafe {
        TABLE_ONCE.call_once(|| TABLE = Some(TypeInfoTable::new()));
        TABLE.as_ref().unwrap()
    }
}

pub fn lookup(index: TypeInfoIndex) -> TypeInfo {
    table().get(index)
}

/// Registers `T`'s trace/finalize callbacks the first time it is asked
/// for, returning the same index on every later call for the same `T`.
pub fn register_for<T: crate::trace::Trace + 'static>() -> TypeInfoIndex {
    extern "C" fn trace_shim<T: crate::trace::Trace>(visitor: *mut Visitor, this: *mut u8) {
        unsafe {
            (*this.cast::<T>()).trace(&mut *visitor);
        }
    }
    extern "C" fn finalize_shim<T>(this: *mut u8) {
        unsafe {
            std::ptr::drop_in_place(this.cast::<T>());
        }
    }
    let finalize = if std::mem::needs_drop::<T>() {
        Some(finalize_shim::<T> as FinalizeCallback)
    } else {
        None
    };
    table().register(
        TypeId::of::<T>(),
        TypeInfo {
            trace: trace_shim::<T>,
            finalize,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf(u32);
    impl crate::trace::Trace for Leaf {
        fn trace(&mut self, _v: &mut Visitor) {}
    }

    #[test]
    fn registration_is_idempotent() {
        let a = register_for::<Leaf>();
        let b = register_for::<Leaf>();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_types_get_distinct_indices() {
        struct Other(u64);
        impl crate::trace::Trace for Other {
            fn trace(&mut self, _v: &mut Visitor) {}
        }
        let a = register_for::<Leaf>();
        let b = register_for::<Other>();
        assert_ne!(a, b);
    }
}

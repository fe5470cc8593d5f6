//! The native object model: heap objects with an intrinsic atomic count.
//!
//! Every native object starts with a [`HeapObject`] header holding its strong
//! count and the hook that frees it. [`native_retain`] and [`native_release`]
//! are the model's primitives; [`NATIVE_OBJECT`] is the witness table for a
//! strong reference to such an object. [`HeapBox`] allocates a Rust value
//! behind a header.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicUsize, Ordering};

use crate::refcount::{RefCountDomain, RefCounted};
use crate::table::WitnessTable;

/// Frees a native object whose count has reached zero.
pub type DestroyObjectFn = unsafe extern "C" fn(object: *mut HeapObject);

/// Counts above this abort the process rather than risk wrapping.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Header at the start of every native object.
#[repr(C)]
pub struct HeapObject {
    destroy: DestroyObjectFn,
    strong: AtomicUsize,
}

impl HeapObject {
    /// A header with a strong count of one.
    pub const fn new(destroy: DestroyObjectFn) -> Self {
        Self {
            destroy,
            strong: AtomicUsize::new(1),
        }
    }

    /// Current strong count of `object`.
    ///
    /// Only a snapshot: other threads may change it immediately.
    ///
    /// # Safety
    ///
    /// `object` points at a live native object.
    pub unsafe fn strong_count(object: *const HeapObject) -> usize {
        // SAFETY: caller guarantees the object is live.
        unsafe { (*object).strong.load(Ordering::Acquire) }
    }
}

impl fmt::Debug for HeapObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapObject")
            .field("strong", &self.strong.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Increment the strong count of a native object. Null is ignored.
///
/// # Safety
///
/// `object` is null or a live native object.
pub unsafe extern "C" fn native_retain(object: *mut HeapObject) -> *mut HeapObject {
    if object.is_null() {
        return object;
    }
    // A new reference can only be made from an existing one, so no
    // synchronization is needed for the increment itself.
    // SAFETY: caller guarantees the object is live.
    let old = unsafe { (*object).strong.fetch_add(1, Ordering::Relaxed) };
    if old > MAX_REFCOUNT {
        std::process::abort();
    }
    object
}

/// Decrement the strong count of a native object, freeing it at zero. Null is
/// ignored.
///
/// # Safety
///
/// `object` is null or a live native object, and the caller owns one share.
pub unsafe extern "C" fn native_release(object: *mut HeapObject) {
    if object.is_null() {
        return;
    }
    // SAFETY: caller owns a share, so the object is live until this decrement.
    if unsafe { (*object).strong.fetch_sub(1, Ordering::Release) } != 1 {
        return;
    }
    // Synchronize with every earlier release before tearing down.
    fence(Ordering::Acquire);
    // SAFETY: the count reached zero; this is the last reference.
    unsafe { ((*object).destroy)(object) }
}

/// The native reference-counting domain.
#[derive(Debug)]
pub enum NativeDomain {}

// SAFETY: `native_retain`/`native_release` are atomic, null-tolerant, and free at zero.
unsafe impl RefCountDomain for NativeDomain {
    type Object = HeapObject;

    #[inline]
    unsafe fn retain(object: *mut HeapObject) -> *mut HeapObject {
        // SAFETY: forwarded contract.
        unsafe { native_retain(object) }
    }

    #[inline]
    unsafe fn release(object: *mut HeapObject) {
        // SAFETY: forwarded contract.
        unsafe { native_release(object) }
    }
}

/// Witness table for a strong reference to a native object.
pub static NATIVE_OBJECT: WitnessTable = WitnessTable::of::<RefCounted<NativeDomain>>();

/// A Rust value stored behind a native object header.
#[repr(C)]
pub struct HeapBox<T> {
    // Only ever read through `*mut HeapObject` casts.
    #[allow(dead_code)]
    header: HeapObject,
    value: T,
}

impl<T: Send + Sync + 'static> HeapBox<T> {
    /// Allocate `value` as a native object with a strong count of one.
    ///
    /// The caller owns that one share and must eventually release it.
    pub fn allocate(value: T) -> NonNull<HeapObject> {
        let boxed = Box::new(Self {
            header: HeapObject::new(Self::destroy),
            value,
        });
        NonNull::from(Box::leak(boxed)).cast()
    }

    unsafe extern "C" fn destroy(object: *mut HeapObject) {
        // SAFETY: `object` came from `allocate` for this `T` and the count is zero.
        drop(unsafe { Box::from_raw(object.cast::<Self>()) });
    }

    /// Borrow the value inside a native object made by [`HeapBox::allocate`].
    ///
    /// # Safety
    ///
    /// `object` was allocated as a `HeapBox<T>` for this `T` and stays alive
    /// for `'a`.
    pub unsafe fn value<'a>(object: NonNull<HeapObject>) -> &'a T {
        // SAFETY: caller guarantees type and liveness.
        unsafe { &(*object.cast::<Self>().as_ptr()).value }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use super::*;
    use crate::buffer::ValueBuffer;
    use crate::value::OpaqueValue;

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn flagged() -> (NonNull<HeapObject>, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        (HeapBox::allocate(DropFlag(dropped.clone())), dropped)
    }

    fn slot(object: &mut *mut HeapObject) -> *mut OpaqueValue {
        OpaqueValue::erase(object as *mut *mut HeapObject)
    }

    #[test]
    fn copy_then_destroy_both_frees_once() {
        let (object, dropped) = flagged();
        let mut original = object.as_ptr();
        let mut copy: *mut HeapObject = std::ptr::null_mut();

        unsafe {
            NATIVE_OBJECT.initialize_with_copy(slot(&mut copy), slot(&mut original));
            assert_eq!(HeapObject::strong_count(object.as_ptr()), 2);

            NATIVE_OBJECT.destroy(slot(&mut original));
            assert_eq!(HeapObject::strong_count(object.as_ptr()), 1);
            assert!(!dropped.load(Ordering::SeqCst));

            NATIVE_OBJECT.destroy(slot(&mut copy));
        }
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn retain_and_release_ignore_null() {
        unsafe {
            assert!(native_retain(std::ptr::null_mut()).is_null());
            native_release(std::ptr::null_mut());
        }
    }

    #[test]
    fn deallocate_buffer_leaves_count_alone() {
        let (object, dropped) = flagged();
        let mut reference = object.as_ptr();
        let mut buffer = ValueBuffer::new();
        unsafe {
            NATIVE_OBJECT.initialize_buffer_with_take(buffer.as_mut_ptr(), slot(&mut reference));
            NATIVE_OBJECT.deallocate_buffer(buffer.as_mut_ptr());
            assert_eq!(HeapObject::strong_count(object.as_ptr()), 1);
            native_release(object.as_ptr());
        }
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn heap_box_exposes_its_value() {
        let object = HeapBox::allocate(0xC0FFEE_u32);
        unsafe {
            assert_eq!(*HeapBox::<u32>::value(object), 0xC0FFEE);
            native_release(object.as_ptr());
        }
    }

    #[test]
    fn concurrent_copies_balance() {
        struct Shared(*mut HeapObject);
        // SAFETY: the object's count is atomic and it outlives the scope.
        unsafe impl Sync for Shared {}

        impl Shared {
            fn get(&self) -> *mut HeapObject {
                self.0
            }
        }

        let (object, dropped) = flagged();
        let shared = Shared(object.as_ptr());
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let shared = &shared;
                scope.spawn(move || {
                    let mut src = shared.get();
                    for _ in 0..1_000 {
                        let mut copy: *mut HeapObject = std::ptr::null_mut();
                        unsafe {
                            NATIVE_OBJECT.initialize_with_copy(slot(&mut copy), slot(&mut src));
                            NATIVE_OBJECT.destroy(slot(&mut copy));
                        }
                    }
                });
            }
        });
        unsafe {
            assert_eq!(HeapObject::strong_count(object.as_ptr()), 1);
            native_release(object.as_ptr());
        }
        assert!(dropped.load(Ordering::SeqCst));
    }
}

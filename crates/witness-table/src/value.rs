//! The untyped view of one value's storage.

use std::marker::{PhantomData, PhantomPinned};

/// An opaque value of statically-unknown type.
///
/// Never constructed; only ever used behind a raw pointer. Which bytes belong
/// to the value, and what it means to copy or destroy them, is known only to
/// the witness table that manages it.
#[repr(C)]
pub struct OpaqueValue {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

impl OpaqueValue {
    /// Erase a typed pointer.
    pub fn erase<T>(ptr: *mut T) -> *mut OpaqueValue {
        ptr.cast()
    }

    /// Erase a typed const pointer.
    pub fn erase_const<T>(ptr: *const T) -> *const OpaqueValue {
        ptr.cast()
    }
}

impl std::fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OpaqueValue")
    }
}

//! Witnesses for single-pointer, reference-counted object references.
//!
//! A [`RefCountDomain`] is one object model's retain/release pair. The
//! generic [`RefCounted`] witness implements the value operations on top of
//! it; the native and foreign tables are just two instantiations. Keeping the
//! pointer type tied to the domain (`*mut D::Object`) stops a native object
//! from being released through the foreign domain in typed code.
//!
//! Ordering rules:
//! - copies retain the source, then store it;
//! - `assign_with_copy` retains the new value before releasing the old one,
//!   so self-assignment never lets the count touch zero;
//! - takes move the pointer without touching the count.

#![allow(unsafe_code)]

use std::marker::PhantomData;

use witness_core::ValueLayout;

use crate::buffer::ValueBuffer;
use crate::table::{FixedLayout, ValueWitness, WitnessTable};
use crate::value::OpaqueValue;

/// The retain/release primitives of one object model.
///
/// # Safety
///
/// `retain` must increment the object's count and return the same pointer;
/// `release` must decrement it and free the object when the count reaches
/// zero. Both must be safe to call concurrently from any thread. Null must
/// be accepted by both and ignored.
pub unsafe trait RefCountDomain: 'static {
    /// The object type this domain counts.
    type Object;

    /// Increment the count of `object` and return it.
    ///
    /// # Safety
    ///
    /// `object` is null or a live object of this domain.
    unsafe fn retain(object: *mut Self::Object) -> *mut Self::Object;

    /// Decrement the count of `object`, freeing it at zero.
    ///
    /// # Safety
    ///
    /// `object` is null or a live object of this domain whose count the
    /// caller owns one share of.
    unsafe fn release(object: *mut Self::Object);
}

/// Witness for a strong reference into domain `D`.
pub struct RefCounted<D>(PhantomData<fn() -> D>);

impl<D: RefCountDomain> FixedLayout for RefCounted<D> {
    const LAYOUT: ValueLayout = ValueLayout::pointer();
}

#[inline]
unsafe fn load<D: RefCountDomain>(slot: *const OpaqueValue) -> *mut D::Object {
    // SAFETY: caller guarantees `slot` holds one initialized object pointer.
    unsafe { slot.cast::<*mut D::Object>().read() }
}

#[inline]
unsafe fn store<D: RefCountDomain>(slot: *mut OpaqueValue, object: *mut D::Object) {
    // SAFETY: caller guarantees `slot` is valid for one pointer write.
    unsafe { slot.cast::<*mut D::Object>().write(object) }
}

#[inline]
unsafe fn init_with_retain<D: RefCountDomain>(
    dest: *mut OpaqueValue,
    src: *const OpaqueValue,
) -> *mut OpaqueValue {
    // SAFETY: caller guarantees `src` is a live reference and `dest` is writable.
    unsafe { store::<D>(dest, D::retain(load::<D>(src))) };
    dest
}

#[inline]
unsafe fn init_without_retain<D: RefCountDomain>(
    dest: *mut OpaqueValue,
    src: *mut OpaqueValue,
) -> *mut OpaqueValue {
    // SAFETY: ownership of `src`'s share moves to `dest`.
    unsafe { store::<D>(dest, load::<D>(src)) };
    dest
}

#[inline]
unsafe fn destroy_with_release<D: RefCountDomain>(value: *mut OpaqueValue) {
    // SAFETY: `value` owns one share.
    unsafe { D::release(load::<D>(value)) }
}

// SAFETY: every operation follows the ordering rules in the module docs, and
// one pointer always fits inline so buffers never indirect.
unsafe impl<D: RefCountDomain> ValueWitness for RefCounted<D> {
    unsafe extern "C" fn destroy_buffer(buffer: *mut ValueBuffer, _this: &WitnessTable) {
        // SAFETY: the buffer holds one owned reference inline.
        unsafe { destroy_with_release::<D>(ValueBuffer::inline_value(buffer)) }
    }

    unsafe extern "C" fn initialize_buffer_with_copy_of_buffer(
        dest: *mut ValueBuffer,
        src: *const ValueBuffer,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: both buffers hold their reference inline.
        unsafe { init_with_retain::<D>(ValueBuffer::inline_value(dest), src.cast()) }
    }

    unsafe extern "C" fn project_buffer(
        buffer: *mut ValueBuffer,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        ValueBuffer::inline_value(buffer)
    }

    unsafe extern "C" fn deallocate_buffer(_buffer: *mut ValueBuffer, _this: &WitnessTable) {}

    unsafe extern "C" fn destroy(value: *mut OpaqueValue, _this: &WitnessTable) {
        // SAFETY: forwarded contract.
        unsafe { destroy_with_release::<D>(value) }
    }

    unsafe extern "C" fn initialize_buffer_with_copy(
        dest: *mut ValueBuffer,
        src: *const OpaqueValue,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract; the buffer holds the reference inline.
        unsafe { init_with_retain::<D>(ValueBuffer::inline_value(dest), src) }
    }

    unsafe extern "C" fn initialize_with_copy(
        dest: *mut OpaqueValue,
        src: *const OpaqueValue,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { init_with_retain::<D>(dest, src) }
    }

    unsafe extern "C" fn assign_with_copy(
        dest: *mut OpaqueValue,
        src: *const OpaqueValue,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: both slots hold live references; retain precedes release.
        unsafe {
            let new_value = D::retain(load::<D>(src));
            D::release(load::<D>(dest));
            store::<D>(dest, new_value);
        }
        dest
    }

    unsafe extern "C" fn initialize_buffer_with_take(
        dest: *mut ValueBuffer,
        src: *mut OpaqueValue,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract; the buffer holds the reference inline.
        unsafe { init_without_retain::<D>(ValueBuffer::inline_value(dest), src) }
    }

    unsafe extern "C" fn initialize_with_take(
        dest: *mut OpaqueValue,
        src: *mut OpaqueValue,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { init_without_retain::<D>(dest, src) }
    }

    unsafe extern "C" fn assign_with_take(
        dest: *mut OpaqueValue,
        src: *mut OpaqueValue,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: `dest` owns a share to drop; `src`'s share moves into it.
        unsafe {
            let new_value = load::<D>(src);
            D::release(load::<D>(dest));
            store::<D>(dest, new_value);
        }
        dest
    }

    unsafe extern "C" fn allocate_buffer(
        buffer: *mut ValueBuffer,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        ValueBuffer::inline_value(buffer)
    }
}

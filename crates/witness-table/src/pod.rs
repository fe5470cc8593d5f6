//! Witness tables for fixed-width plain-old-data.
//!
//! POD values own nothing, so destruction and deallocation are no-ops and a
//! take is indistinguishable from a copy. Every copy, take, and assign slot
//! therefore routes to the same byte copy.

#![allow(unsafe_code)]

use std::marker::PhantomData;
use std::mem::size_of;
use std::ptr;

use witness_core::{PodWidth, ValueLayout};

use crate::buffer::ValueBuffer;
use crate::table::{FixedLayout, ValueWitness, WitnessTable};
use crate::value::OpaqueValue;

mod sealed {
    pub trait Sealed {}
}

/// An unsigned integer type with a builtin POD table.
pub trait PodScalar: Copy + Send + Sync + 'static + sealed::Sealed {
    /// The builtin width this type occupies.
    const WIDTH: PodWidth;
}

macro_rules! pod_scalar {
    ($($ty:ty => $width:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}
            impl PodScalar for $ty {
                const WIDTH: PodWidth = PodWidth::$width;
            }
        )*
    };
}

pod_scalar! {
    u8 => Int8,
    u16 => Int16,
    u32 => Int32,
    u64 => Int64,
    usize => Word,
}

/// Witness for a POD value the size of `T`.
pub struct Pod<T>(PhantomData<fn() -> T>);

impl<T: PodScalar> FixedLayout for Pod<T> {
    const LAYOUT: ValueLayout = ValueLayout::for_width(T::WIDTH);
}

/// Replicate one `T`'s bytes from `src` to `dest`.
///
/// Overlap-tolerant, so `assign_with_copy(x, x)` is a harmless no-op.
#[inline]
unsafe fn copy<T: PodScalar>(dest: *mut OpaqueValue, src: *const OpaqueValue) -> *mut OpaqueValue {
    // SAFETY: caller guarantees both point at `size_of::<T>()` valid bytes.
    unsafe { ptr::copy(src.cast::<u8>(), dest.cast::<u8>(), size_of::<T>()) };
    dest
}

// SAFETY: POD values own no resources; byte copies satisfy both copy and take.
unsafe impl<T: PodScalar> ValueWitness for Pod<T> {
    unsafe extern "C" fn destroy_buffer(_buffer: *mut ValueBuffer, _this: &WitnessTable) {}

    unsafe extern "C" fn initialize_buffer_with_copy_of_buffer(
        dest: *mut ValueBuffer,
        src: *const ValueBuffer,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: POD values are always stored inline.
        unsafe { copy::<T>(dest.cast(), src.cast()) }
    }

    unsafe extern "C" fn project_buffer(
        buffer: *mut ValueBuffer,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        ValueBuffer::inline_value(buffer)
    }

    unsafe extern "C" fn deallocate_buffer(_buffer: *mut ValueBuffer, _this: &WitnessTable) {}

    unsafe extern "C" fn destroy(_value: *mut OpaqueValue, _this: &WitnessTable) {}

    unsafe extern "C" fn initialize_buffer_with_copy(
        dest: *mut ValueBuffer,
        src: *const OpaqueValue,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract; the buffer holds the value inline.
        unsafe { copy::<T>(dest.cast(), src) }
    }

    unsafe extern "C" fn initialize_with_copy(
        dest: *mut OpaqueValue,
        src: *const OpaqueValue,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { copy::<T>(dest, src) }
    }

    unsafe extern "C" fn assign_with_copy(
        dest: *mut OpaqueValue,
        src: *const OpaqueValue,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { copy::<T>(dest, src) }
    }

    unsafe extern "C" fn initialize_buffer_with_take(
        dest: *mut ValueBuffer,
        src: *mut OpaqueValue,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract; the buffer holds the value inline.
        unsafe { copy::<T>(dest.cast(), src) }
    }

    unsafe extern "C" fn initialize_with_take(
        dest: *mut OpaqueValue,
        src: *mut OpaqueValue,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { copy::<T>(dest, src) }
    }

    unsafe extern "C" fn assign_with_take(
        dest: *mut OpaqueValue,
        src: *mut OpaqueValue,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { copy::<T>(dest, src) }
    }

    unsafe extern "C" fn allocate_buffer(
        buffer: *mut ValueBuffer,
        _this: &WitnessTable,
    ) -> *mut OpaqueValue {
        ValueBuffer::inline_value(buffer)
    }
}

/// One-byte POD.
pub static POD_INT8: WitnessTable = WitnessTable::of::<Pod<u8>>();
/// Two-byte POD.
pub static POD_INT16: WitnessTable = WitnessTable::of::<Pod<u16>>();
/// Four-byte POD.
pub static POD_INT32: WitnessTable = WitnessTable::of::<Pod<u32>>();
/// Eight-byte POD.
pub static POD_INT64: WitnessTable = WitnessTable::of::<Pod<u64>>();
/// Pointer-width POD.
pub static POD_WORD: WitnessTable = WitnessTable::of::<Pod<usize>>();

/// The builtin POD table for a width.
pub fn pod_table(width: PodWidth) -> &'static WitnessTable {
    match width {
        PodWidth::Int8 => &POD_INT8,
        PodWidth::Int16 => &POD_INT16,
        PodWidth::Int32 => &POD_INT32,
        PodWidth::Int64 => &POD_INT64,
        PodWidth::Word => &POD_WORD,
    }
}

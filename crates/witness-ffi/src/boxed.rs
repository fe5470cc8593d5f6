//! Raw-bytes boxes behind opaque `u64` handles.
//!
//! C callers hand over a byte string and an alignment and get back a handle
//! to an owned value managed by the interned raw-bytes descriptor for that
//! layout. Copies, assignment, and reads go through the descriptor's witness
//! table; `witness_box_destroy` runs `destroy_buffer`.

use std::sync::{Mutex, PoisonError};

use witness_table::{OpaqueBox, TypeDescriptor};

use crate::handle::HandleTable;
use crate::status::WitnessStatus;

/// A box whose descriptor is a raw-bytes descriptor.
struct BytesBox(OpaqueBox);

// SAFETY: every `BytesBox` is built by `witness_box_from_bytes` or cloned
// from one, so it owns plain bytes (inline or in its own heap block) and no
// shared references.
#[allow(unsafe_code)]
unsafe impl Send for BytesBox {}

static BOXES: Mutex<HandleTable<BytesBox>> = Mutex::new(HandleTable::new());

macro_rules! ffi_lock {
    ($mutex:expr) => {
        $mutex.lock().unwrap_or_else(PoisonError::into_inner)
    };
}

/// Box a copy of `len` bytes at `data`, aligned to `alignment`.
///
/// Writes the new handle to `*out`. Returns `InvalidLayout` for a bad
/// alignment and `AllocationFailed` if out-of-line storage cannot be
/// obtained. `data` may be null only when `len` is zero.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn witness_box_from_bytes(
    data: *const u8,
    len: usize,
    alignment: usize,
    out: *mut u64,
) -> i32 {
    ffi_guard!({
        if out.is_null() || (data.is_null() && len != 0) {
            return WitnessStatus::InvalidArgument as i32;
        }
        let bytes: &[u8] = if len == 0 {
            &[]
        } else {
            // SAFETY: caller guarantees `data` is readable for `len` bytes.
            unsafe { std::slice::from_raw_parts(data, len) }
        };
        match OpaqueBox::from_bytes(bytes, alignment) {
            Ok(boxed) => {
                let handle = ffi_lock!(BOXES).insert(BytesBox(boxed));
                // SAFETY: `out` is non-null; caller guarantees it is writable.
                unsafe { *out = handle };
                WitnessStatus::Ok as i32
            }
            Err(e) => WitnessStatus::from(&e) as i32,
        }
    })
}

/// Box a copy of the value behind `handle`, writing the new handle to `*out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn witness_box_clone(handle: u64, out: *mut u64) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return WitnessStatus::InvalidArgument as i32;
        }
        let mut boxes = ffi_lock!(BOXES);
        let Some(BytesBox(source)) = boxes.get(handle) else {
            return WitnessStatus::InvalidHandle as i32;
        };
        let copy = BytesBox(source.clone());
        let copied = boxes.insert(copy);
        // SAFETY: `out` is non-null; caller guarantees it is writable.
        unsafe { *out = copied };
        WitnessStatus::Ok as i32
    })
}

/// Replace the value behind `dest` with a copy of the value behind `src`.
///
/// Returns `TypeMismatch` if the two boxes have different layouts. `dest`
/// and `src` may be the same handle.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn witness_box_assign(dest: u64, src: u64) -> i32 {
    ffi_guard!({
        let mut boxes = ffi_lock!(BOXES);
        let Some(BytesBox(source)) = boxes.get(src) else {
            return WitnessStatus::InvalidHandle as i32;
        };
        let source = source.clone();
        let Some(BytesBox(target)) = boxes.get_mut(dest) else {
            return WitnessStatus::InvalidHandle as i32;
        };
        match target.assign_from(&source) {
            Ok(()) => WitnessStatus::Ok as i32,
            Err(e) => WitnessStatus::from(&e) as i32,
        }
    })
}

/// Copy the bytes of the value behind `handle` into `out`.
///
/// `len` must equal the value's size.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn witness_box_read(handle: u64, out: *mut u8, len: usize) -> i32 {
    ffi_guard!({
        let boxes = ffi_lock!(BOXES);
        let Some(BytesBox(boxed)) = boxes.get(handle) else {
            return WitnessStatus::InvalidHandle as i32;
        };
        let bytes = boxed.as_bytes();
        if bytes.len() != len || (out.is_null() && len != 0) {
            return WitnessStatus::InvalidArgument as i32;
        }
        if len != 0 {
            // SAFETY: caller guarantees `out` is writable for `len` bytes.
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), out, len) };
        }
        WitnessStatus::Ok as i32
    })
}

/// Write the descriptor managing the value behind `handle` to `*out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn witness_box_descriptor(handle: u64, out: *mut *const TypeDescriptor) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return WitnessStatus::InvalidArgument as i32;
        }
        match ffi_lock!(BOXES).get(handle) {
            Some(BytesBox(boxed)) => {
                // SAFETY: `out` is non-null; caller guarantees it is writable.
                unsafe { *out = boxed.descriptor() };
                WitnessStatus::Ok as i32
            }
            None => WitnessStatus::InvalidHandle as i32,
        }
    })
}

/// Destroy the value behind `handle` and invalidate the handle.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn witness_box_destroy(handle: u64) -> i32 {
    ffi_guard!({
        match ffi_lock!(BOXES).remove(handle) {
            Some(_) => WitnessStatus::Ok as i32,
            None => WitnessStatus::InvalidHandle as i32,
        }
    })
}

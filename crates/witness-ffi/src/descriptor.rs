//! Descriptor lookup and resolution.

use std::ffi::{c_char, CStr};

use witness_core::{ValueLayout, WitnessError};
use witness_table::{builtin_descriptors, bytes_descriptor, lookup_builtin, TypeDescriptor, WitnessTable};

use crate::status::WitnessStatus;

/// The witness table behind `descriptor`, or null if `descriptor` is null.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn witness_descriptor_resolve(descriptor: *const TypeDescriptor) -> *const WitnessTable {
    ffi_guard_or!(std::ptr::null(), {
        // SAFETY: caller passes null or a descriptor obtained from this library.
        match unsafe { descriptor.as_ref() } {
            Some(descriptor) => descriptor.resolve(),
            None => std::ptr::null(),
        }
    })
}

/// Raw kind tag of `descriptor`, or `usize::MAX` if it is null.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn witness_descriptor_kind(descriptor: *const TypeDescriptor) -> usize {
    ffi_guard_or!(usize::MAX, {
        // SAFETY: caller passes null or a descriptor obtained from this library.
        match unsafe { descriptor.as_ref() } {
            Some(descriptor) => descriptor.kind().raw(),
            None => usize::MAX,
        }
    })
}

/// Number of builtin descriptors.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn witness_builtin_count() -> usize {
    ffi_guard_or!(0, { builtin_descriptors().len() })
}

/// Look up a builtin descriptor by its NUL-terminated mangled name.
///
/// Writes the descriptor to `*out` and returns `Ok`, or returns
/// `UnknownBuiltin` without writing.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn witness_lookup_builtin(name: *const c_char, out: *mut *const TypeDescriptor) -> i32 {
    ffi_guard!({
        if name.is_null() || out.is_null() {
            return WitnessStatus::InvalidArgument as i32;
        }
        // SAFETY: caller passes a valid NUL-terminated string.
        let name = match unsafe { CStr::from_ptr(name) }.to_str() {
            Ok(name) => name,
            Err(_) => return WitnessStatus::InvalidArgument as i32,
        };
        match lookup_builtin(name) {
            Ok(descriptor) => {
                // SAFETY: `out` is non-null; caller guarantees it is writable.
                unsafe { *out = descriptor };
                WitnessStatus::Ok as i32
            }
            Err(e) => WitnessStatus::from(&e) as i32,
        }
    })
}

/// The interned raw-bytes descriptor for `size` and `alignment`.
///
/// Stride is `size` rounded up to `alignment`. Returns `InvalidLayout`
/// without writing if the pair is not a valid layout.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn witness_bytes_descriptor(
    size: usize,
    alignment: usize,
    out: *mut *const TypeDescriptor,
) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return WitnessStatus::InvalidArgument as i32;
        }
        match ValueLayout::new(size, alignment) {
            Ok(layout) => {
                // SAFETY: `out` is non-null; caller guarantees it is writable.
                unsafe { *out = bytes_descriptor(layout) };
                WitnessStatus::Ok as i32
            }
            Err(e) => WitnessStatus::from(&WitnessError::from(e)) as i32,
        }
    })
}

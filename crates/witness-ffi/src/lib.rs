//! C FFI bindings for Witness value witness tables.
//!
//! Exposes descriptor lookup, raw-bytes descriptors and boxes, foreign hook
//! installation, and the native reference-counting primitives to C. Tables
//! are `#[repr(C)]`, so C callers invoke operations through the returned
//! table pointer directly. This crate is one of two that may contain
//! `unsafe` code (along with `witness-table`).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

/// Run an FFI body, converting a panic into [`WitnessStatus::Panicked`].
macro_rules! ffi_guard {
    ($body:block) => {
        ffi_guard_or!($crate::status::WitnessStatus::Panicked as i32, $body)
    };
}

/// Run an FFI body, returning `$fallback` if it panics.
macro_rules! ffi_guard_or {
    ($fallback:expr, $body:block) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $body)) {
            Ok(value) => value,
            Err(_) => $fallback,
        }
    };
}

pub mod boxed;
pub mod descriptor;
mod handle;
pub mod object;
pub mod status;

pub use boxed::{
    witness_box_assign, witness_box_clone, witness_box_descriptor, witness_box_destroy,
    witness_box_from_bytes, witness_box_read,
};

pub use descriptor::{
    witness_builtin_count, witness_bytes_descriptor, witness_descriptor_kind,
    witness_descriptor_resolve, witness_lookup_builtin,
};
pub use object::{
    witness_install_foreign_hooks, witness_native_release, witness_native_retain,
    witness_native_strong_count,
};
pub use status::WitnessStatus;

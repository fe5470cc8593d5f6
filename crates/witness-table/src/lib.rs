//! Value witness tables for managing values of statically-unknown type.
//!
//! Generic code that only holds a [`TypeDescriptor`] can still copy, move,
//! and destroy values through the descriptor's [`WitnessTable`]. This crate
//! holds all of the workspace's `unsafe` table code (along with `witness-ffi`).
//!
//! # Architecture
//!
//! ```text
//! TypeDescriptor (kind tag, static)
//! └── &'static WitnessTable (12 extern "C" operations + ValueLayout + BufferStrategy)
//!     ├── Pod<T>            POD_INT8 .. POD_WORD     byte copies, no-op destroy
//!     ├── RefCounted<D>     NATIVE_OBJECT            native_retain / native_release
//!     │                     FOREIGN_OBJECT           installed ForeignHooks
//!     └── RawBytes          WitnessTable::for_bytes  runtime layouts, maybe out of line
//! ```
//!
//! # Buffers
//!
//! A [`ValueBuffer`] is three words of caller storage. Values whose layout
//! fits are stored in place; others live on the heap with the pointer in the
//! buffer's first word. The choice is fixed per table ([`BufferStrategy`]).
//!
//! # Ownership
//!
//! Copies leave the source intact, takes consume it, and `assign_with_copy`
//! retains the new value before releasing the old one, so `assign(x, x)` is
//! safe for reference-counted values. [`OpaqueBox`] wraps all of this behind
//! `Clone` and `Drop`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod boxed;
pub mod buffer;
pub mod bytes;
pub mod foreign;
pub mod metadata;
pub mod native;
pub mod pod;
pub mod refcount;
pub mod table;
pub mod value;

// Public re-exports for the primary API surface.
pub use boxed::OpaqueBox;
pub use buffer::{BufferStrategy, ValueBuffer};
pub use bytes::RawBytes;
pub use foreign::{
    foreign_hooks, install_foreign_hooks, ForeignDomain, ForeignHooks, ForeignObject,
    ForeignReleaseFn, ForeignRetainFn, FOREIGN_OBJECT,
};
pub use metadata::{
    builtin_descriptors, bytes_descriptor, lookup_builtin, pod_metadata, TypeDescriptor,
    FOREIGN_OBJECT_METADATA, INT16_METADATA, INT32_METADATA, INT64_METADATA, INT8_METADATA,
    NATIVE_OBJECT_METADATA, WORD_METADATA,
};
pub use native::{
    native_release, native_retain, DestroyObjectFn, HeapBox, HeapObject, NativeDomain, NATIVE_OBJECT,
};
pub use pod::{pod_table, Pod, PodScalar, POD_INT16, POD_INT32, POD_INT64, POD_INT8, POD_WORD};
pub use refcount::{RefCountDomain, RefCounted};
pub use table::{FixedLayout, ValueWitness, WitnessTable};
pub use value::OpaqueValue;

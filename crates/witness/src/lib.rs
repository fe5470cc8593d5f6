//! Witness: value witness tables for managing values of statically-unknown type.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Witness sub-crates. For most users, adding `witness` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use witness::prelude::*;
//!
//! // Builtin descriptors are found by their runtime symbol names.
//! let descriptor = lookup_builtin("Bi64_").unwrap();
//! assert_eq!(descriptor.resolve().size(), 8);
//!
//! // Boxes drive the witness operations through Clone and Drop.
//! let value = OpaqueBox::new_pod(0x1122_3344_5566_7788_u64);
//! let copy = value.clone();
//! assert_eq!(copy.read_pod::<u64>(), Ok(0x1122_3344_5566_7788));
//!
//! // Native objects are shared, not duplicated.
//! let shared = OpaqueBox::native(String::from("payload"));
//! let alias = shared.clone();
//! assert_eq!(shared.native_object(), alias.native_object());
//!
//! // Layouts only known at runtime get an interned raw-bytes descriptor.
//! let layout = ValueLayout::new(100, 16).unwrap();
//! assert!(std::ptr::eq(bytes_descriptor(layout), bytes_descriptor(layout)));
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `witness-core` | `ValueLayout`, metadata kinds, error types |
//! | [`table`] | `witness-table` | Witness tables, builtin instances, descriptors, `OpaqueBox` |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Layouts, kind tags, and errors (`witness-core`).
///
/// Contains [`types::ValueLayout`], the inline buffer constants, and the
/// [`types::WitnessError`] / [`types::LayoutError`] enums.
pub use witness_core as types;

/// Witness tables and everything built on them (`witness-table`).
///
/// The [`table::WitnessTable`] operation record, the builtin POD, native,
/// and foreign tables, [`table::TypeDescriptor`], and [`table::OpaqueBox`].
pub use witness_table as table;

/// Common imports for typical Witness usage.
///
/// ```rust
/// use witness::prelude::*;
/// ```
///
/// This imports descriptors and their lookup, the table and buffer types,
/// the owning box, layouts, and errors.
pub mod prelude {
    // Layouts and errors
    pub use witness_core::{LayoutError, MetadataKind, PodWidth, ValueLayout, WitnessError};

    // Tables and buffers
    pub use witness_table::{BufferStrategy, OpaqueValue, ValueBuffer, WitnessTable};

    // Descriptors
    pub use witness_table::{bytes_descriptor, lookup_builtin, pod_metadata, TypeDescriptor};

    // Owning container
    pub use witness_table::OpaqueBox;

    // Object models
    pub use witness_table::{install_foreign_hooks, ForeignHooks, HeapBox, HeapObject};
}

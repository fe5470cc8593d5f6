//! Core types for the Witness value-management runtime.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by every witness table: value layouts and inline-buffer
//! geometry, metadata kind tags, builtin POD widths, and the error types
//! raised around table construction and configuration.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod kind;
pub mod layout;

pub use error::{LayoutError, WitnessError};
pub use kind::{MetadataKind, PodWidth};
pub use layout::{ValueLayout, INLINE_BUFFER_ALIGN, INLINE_BUFFER_BYTES, INLINE_BUFFER_WORDS};

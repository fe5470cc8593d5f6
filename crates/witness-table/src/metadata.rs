//! Type descriptors: the handle generic code holds for a type it can manage
//! but not otherwise inspect.
//!
//! A [`TypeDescriptor`] pairs a [`MetadataKind`] tag with a witness table.
//! Builtin descriptors are `static`s registered under their runtime symbol
//! names. Descriptors for raw byte layouts are minted on demand and interned,
//! so one layout always resolves to one descriptor address.

use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

use indexmap::IndexMap;
use witness_core::{MetadataKind, PodWidth, ValueLayout, WitnessError};

use crate::foreign::FOREIGN_OBJECT;
use crate::native::NATIVE_OBJECT;
use crate::pod::{POD_INT16, POD_INT32, POD_INT64, POD_INT8, POD_WORD};
use crate::table::WitnessTable;

/// An immutable kind tag plus witness table.
///
/// Descriptors live for the whole process and are compared by address.
/// The C layout is the kind word followed by the table pointer.
#[repr(C)]
pub struct TypeDescriptor {
    kind: MetadataKind,
    witnesses: &'static WitnessTable,
}

impl TypeDescriptor {
    /// An opaque descriptor for `witnesses`.
    pub const fn opaque(witnesses: &'static WitnessTable) -> Self {
        Self {
            kind: MetadataKind::Opaque,
            witnesses,
        }
    }

    /// The descriptor's kind tag.
    pub const fn kind(&self) -> MetadataKind {
        self.kind
    }

    /// The witness table that manages values of this type.
    pub const fn resolve(&self) -> &'static WitnessTable {
        self.witnesses
    }

    /// Alias for [`TypeDescriptor::resolve`].
    pub const fn witness_table(&self) -> &'static WitnessTable {
        self.witnesses
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("kind", &self.kind)
            .field("layout", &self.witnesses.layout())
            .finish()
    }
}

/// `Builtin.Int8`.
pub static INT8_METADATA: TypeDescriptor = TypeDescriptor::opaque(&POD_INT8);
/// `Builtin.Int16`.
pub static INT16_METADATA: TypeDescriptor = TypeDescriptor::opaque(&POD_INT16);
/// `Builtin.Int32`.
pub static INT32_METADATA: TypeDescriptor = TypeDescriptor::opaque(&POD_INT32);
/// `Builtin.Int64`.
pub static INT64_METADATA: TypeDescriptor = TypeDescriptor::opaque(&POD_INT64);
/// `Builtin.Word`, pointer-sized.
pub static WORD_METADATA: TypeDescriptor = TypeDescriptor::opaque(&POD_WORD);
/// `Builtin.NativeObject`.
pub static NATIVE_OBJECT_METADATA: TypeDescriptor = TypeDescriptor::opaque(&NATIVE_OBJECT);
/// `Builtin.ForeignObject`.
pub static FOREIGN_OBJECT_METADATA: TypeDescriptor = TypeDescriptor::opaque(&FOREIGN_OBJECT);

/// The builtin descriptor for a POD width.
pub fn pod_metadata(width: PodWidth) -> &'static TypeDescriptor {
    match width {
        PodWidth::Int8 => &INT8_METADATA,
        PodWidth::Int16 => &INT16_METADATA,
        PodWidth::Int32 => &INT32_METADATA,
        PodWidth::Int64 => &INT64_METADATA,
        PodWidth::Word => &WORD_METADATA,
    }
}

/// Builtin descriptors by mangled name, in registration order.
pub fn builtin_descriptors() -> &'static IndexMap<&'static str, &'static TypeDescriptor> {
    static BUILTINS: OnceLock<IndexMap<&'static str, &'static TypeDescriptor>> = OnceLock::new();
    BUILTINS.get_or_init(|| {
        IndexMap::from([
            ("Bi8_", &INT8_METADATA),
            ("Bi16_", &INT16_METADATA),
            ("Bi32_", &INT32_METADATA),
            ("Bi64_", &INT64_METADATA),
            ("Bw", &WORD_METADATA),
            ("Bo", &NATIVE_OBJECT_METADATA),
            ("BO", &FOREIGN_OBJECT_METADATA),
        ])
    })
}

/// Resolve a builtin descriptor by mangled name.
pub fn lookup_builtin(mangled: &str) -> Result<&'static TypeDescriptor, WitnessError> {
    builtin_descriptors()
        .get(mangled)
        .copied()
        .ok_or_else(|| WitnessError::UnknownBuiltin {
            name: mangled.to_owned(),
        })
}

type InternTable = Mutex<IndexMap<ValueLayout, &'static TypeDescriptor>>;

fn interned() -> &'static InternTable {
    static INTERNED: OnceLock<InternTable> = OnceLock::new();
    INTERNED.get_or_init(|| Mutex::new(IndexMap::new()))
}

/// The descriptor for raw bytes of `layout`, created on first request.
///
/// Repeated calls with an equal layout return the same address. Descriptors
/// and their tables are never freed.
pub fn bytes_descriptor(layout: ValueLayout) -> &'static TypeDescriptor {
    // Entries are only ever inserted whole, so a poisoned map is still sound.
    let mut interned = interned().lock().unwrap_or_else(PoisonError::into_inner);
    *interned.entry(layout).or_insert_with(|| {
        let witnesses: &'static WitnessTable = Box::leak(Box::new(WitnessTable::for_bytes(layout)));
        let descriptor: &'static TypeDescriptor = Box::leak(Box::new(TypeDescriptor::opaque(witnesses)));
        descriptor
    })
}

/// Number of distinct byte layouts interned so far.
pub fn interned_layout_count() -> usize {
    interned().lock().unwrap_or_else(PoisonError::into_inner).len()
}

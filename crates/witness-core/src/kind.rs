//! Metadata kind tags and builtin POD widths.

use std::fmt;

/// Discriminates the shape of a type descriptor.
///
/// Only [`MetadataKind::Opaque`] descriptors are built by this workspace: they
/// carry a witness table and nothing else. The remaining tags are reserved so
/// that descriptors produced elsewhere in a runtime keep stable raw values.
#[repr(usize)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetadataKind {
    /// A class with a heap-allocated instance layout.
    Class = 0,
    /// A struct with stored fields.
    Struct = 1,
    /// An enum with cases.
    Enum = 2,
    /// A type managed purely through its witness table.
    Opaque = 8,
    /// A tuple of element types.
    Tuple = 9,
    /// A function type.
    Function = 10,
    /// A protocol-constrained existential container.
    Existential = 12,
    /// The metatype of another type.
    Metatype = 13,
    /// A wrapper around a class from a foreign object model.
    ForeignClassWrapper = 14,
}

impl MetadataKind {
    /// Decode a raw tag, or `None` if it names no known kind.
    pub const fn from_raw(raw: usize) -> Option<Self> {
        Some(match raw {
            0 => Self::Class,
            1 => Self::Struct,
            2 => Self::Enum,
            8 => Self::Opaque,
            9 => Self::Tuple,
            10 => Self::Function,
            12 => Self::Existential,
            13 => Self::Metatype,
            14 => Self::ForeignClassWrapper,
            _ => return None,
        })
    }

    /// The raw tag value.
    pub const fn raw(self) -> usize {
        self as usize
    }

    /// Whether this descriptor carries nothing beyond a witness table.
    pub const fn is_opaque(self) -> bool {
        matches!(self, Self::Opaque)
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Opaque => "opaque",
            Self::Tuple => "tuple",
            Self::Function => "function",
            Self::Existential => "existential",
            Self::Metatype => "metatype",
            Self::ForeignClassWrapper => "foreign class wrapper",
        };
        f.write_str(name)
    }
}

/// Width of a builtin plain-old-data integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PodWidth {
    /// One byte.
    Int8,
    /// Two bytes.
    Int16,
    /// Four bytes.
    Int32,
    /// Eight bytes.
    Int64,
    /// One machine word.
    Word,
}

impl PodWidth {
    /// Every width, narrowest first.
    pub const ALL: [Self; 5] = [
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Word,
    ];

    /// Width in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int32 => 4,
            Self::Int64 => 8,
            Self::Word => std::mem::size_of::<usize>(),
        }
    }

    /// Width in bits.
    pub const fn bits(self) -> usize {
        self.bytes() * 8
    }
}

impl fmt::Display for PodWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word => write!(f, "word"),
            other => write!(f, "i{}", other.bits()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_tags_round_trip() {
        for raw in 0..32 {
            if let Some(kind) = MetadataKind::from_raw(raw) {
                assert_eq!(kind.raw(), raw);
            }
        }
        assert_eq!(MetadataKind::from_raw(8), Some(MetadataKind::Opaque));
        assert_eq!(MetadataKind::from_raw(3), None);
    }

    #[test]
    fn only_opaque_is_opaque() {
        assert!(MetadataKind::Opaque.is_opaque());
        assert!(!MetadataKind::Struct.is_opaque());
        assert_eq!(MetadataKind::Opaque.to_string(), "opaque");
    }

    #[test]
    fn widths() {
        assert_eq!(PodWidth::Int16.bytes(), 2);
        assert_eq!(PodWidth::Int64.bits(), 64);
        assert_eq!(PodWidth::Word.bytes(), std::mem::size_of::<usize>());
        assert_eq!(PodWidth::Int32.to_string(), "i32");
        assert_eq!(PodWidth::Word.to_string(), "word");
    }
}

//! Value layouts and inline-buffer geometry.
//!
//! A [`ValueLayout`] is the size/alignment/stride triple every witness table
//! carries. The inline buffer constants decide, once per table, whether a
//! value of that layout lives directly inside a caller's value buffer or
//! behind a heap pointer stored in the buffer's first word.

use std::fmt;
use std::mem::{align_of, size_of};

use crate::error::LayoutError;
use crate::kind::PodWidth;

/// Number of machine words in a value buffer.
pub const INLINE_BUFFER_WORDS: usize = 3;

/// Capacity of a value buffer in bytes.
pub const INLINE_BUFFER_BYTES: usize = INLINE_BUFFER_WORDS * size_of::<usize>();

/// Alignment guaranteed for the start of a value buffer.
///
/// At least eight bytes, so every builtin POD width is stored inline even on
/// targets whose machine word is narrower than a 64-bit integer.
pub const INLINE_BUFFER_ALIGN: usize = if align_of::<usize>() > 8 {
    align_of::<usize>()
} else {
    8
};

/// Size, alignment, and stride of one value.
///
/// Invariants, checked by every constructor:
/// - `alignment` is a non-zero power of two;
/// - `stride >= size`;
/// - `stride` is a multiple of `alignment`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueLayout {
    size: usize,
    alignment: usize,
    stride: usize,
}

impl ValueLayout {
    /// Layout of a value with the given size and alignment.
    ///
    /// Stride is `size` rounded up to the next multiple of `alignment`.
    pub fn new(size: usize, alignment: usize) -> Result<Self, LayoutError> {
        check_alignment(alignment)?;
        let mask = alignment - 1;
        if size > isize::MAX as usize - mask {
            return Err(LayoutError::SizeOverflow { size, alignment });
        }
        let stride = (size + mask) & !mask;
        Ok(Self {
            size,
            alignment,
            stride,
        })
    }

    /// Layout from an explicit triple, rejecting any that breaks the invariants.
    pub fn from_parts(size: usize, alignment: usize, stride: usize) -> Result<Self, LayoutError> {
        check_alignment(alignment)?;
        if stride < size {
            return Err(LayoutError::StrideTooSmall { size, stride });
        }
        if stride % alignment != 0 {
            return Err(LayoutError::StrideMisaligned { stride, alignment });
        }
        if stride > isize::MAX as usize {
            return Err(LayoutError::SizeOverflow { size, alignment });
        }
        Ok(Self {
            size,
            alignment,
            stride,
        })
    }

    /// Layout of a naturally aligned scalar: `size = alignment = stride = bytes`.
    ///
    /// # Panics
    ///
    /// Panics (at compile time when used in a constant) if `bytes` is not a
    /// power of two.
    pub const fn scalar(bytes: usize) -> Self {
        assert!(
            bytes.is_power_of_two(),
            "scalar width must be a power of two"
        );
        Self {
            size: bytes,
            alignment: bytes,
            stride: bytes,
        }
    }

    /// Layout of one machine pointer.
    pub const fn pointer() -> Self {
        Self::scalar(size_of::<usize>())
    }

    /// Layout of a POD value of the given width.
    pub const fn for_width(width: PodWidth) -> Self {
        Self::scalar(width.bytes())
    }

    /// Size of one value in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Required alignment in bytes.
    pub const fn alignment(&self) -> usize {
        self.alignment
    }

    /// Distance in bytes between consecutive elements of an array.
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Whether a value of this layout can be stored directly in a value buffer.
    ///
    /// Zero-sized values are always inline: they occupy no storage.
    pub const fn fits_inline(&self) -> bool {
        self.size == 0 || (self.size <= INLINE_BUFFER_BYTES && self.alignment <= INLINE_BUFFER_ALIGN)
    }

    /// Bytes spanned by `count` contiguous elements, or `None` on overflow.
    pub fn array_bytes(&self, count: usize) -> Option<usize> {
        self.stride
            .checked_mul(count)
            .filter(|&bytes| bytes <= isize::MAX as usize)
    }

    /// The equivalent allocator layout for out-of-line storage.
    pub fn alloc_layout(&self) -> std::alloc::Layout {
        // Alignment is a validated power of two and size + padding fits in
        // isize, which is everything `Layout` checks.
        match std::alloc::Layout::from_size_align(self.size, self.alignment) {
            Ok(layout) => layout,
            Err(_) => unreachable!("ValueLayout invariants imply a valid allocator layout"),
        }
    }
}

impl fmt::Display for ValueLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size {}, align {}, stride {}",
            self.size, self.alignment, self.stride
        )
    }
}

fn check_alignment(alignment: usize) -> Result<(), LayoutError> {
    if alignment == 0 {
        return Err(LayoutError::ZeroAlignment);
    }
    if !alignment.is_power_of_two() {
        return Err(LayoutError::AlignmentNotPowerOfTwo { alignment });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_is_three_words() {
        assert_eq!(INLINE_BUFFER_BYTES, 3 * size_of::<*const u8>());
        assert!(INLINE_BUFFER_ALIGN >= align_of::<*const u8>());
        assert!(INLINE_BUFFER_ALIGN >= 8);
    }

    #[test]
    fn scalar_layouts_are_square() {
        for width in PodWidth::ALL {
            let layout = ValueLayout::for_width(width);
            assert_eq!(layout.size(), width.bytes());
            assert_eq!(layout.alignment(), width.bytes());
            assert_eq!(layout.stride(), width.bytes());
            assert!(layout.fits_inline());
        }
        assert_eq!(ValueLayout::pointer().size(), size_of::<usize>());
    }

    #[test]
    fn new_rounds_stride_up() {
        let layout = ValueLayout::new(13, 4).unwrap();
        assert_eq!(layout.stride(), 16);
        let layout = ValueLayout::new(0, 8).unwrap();
        assert_eq!(layout.stride(), 0);
    }

    #[test]
    fn rejects_bad_alignment() {
        assert_eq!(ValueLayout::new(4, 0), Err(LayoutError::ZeroAlignment));
        assert_eq!(
            ValueLayout::new(4, 3),
            Err(LayoutError::AlignmentNotPowerOfTwo { alignment: 3 })
        );
    }

    #[test]
    fn from_parts_checks_stride() {
        assert_eq!(
            ValueLayout::from_parts(8, 4, 4),
            Err(LayoutError::StrideTooSmall { size: 8, stride: 4 })
        );
        assert_eq!(
            ValueLayout::from_parts(6, 4, 6),
            Err(LayoutError::StrideMisaligned {
                stride: 6,
                alignment: 4
            })
        );
        let padded = ValueLayout::from_parts(6, 2, 16).unwrap();
        assert_eq!(padded.stride(), 16);
    }

    #[test]
    fn size_overflow_is_reported() {
        let err = ValueLayout::new(isize::MAX as usize, 8).unwrap_err();
        assert!(matches!(err, LayoutError::SizeOverflow { .. }));
    }

    #[test]
    fn inline_capacity_boundary() {
        assert!(ValueLayout::new(INLINE_BUFFER_BYTES, 1).unwrap().fits_inline());
        assert!(!ValueLayout::new(INLINE_BUFFER_BYTES + 1, 1)
            .unwrap()
            .fits_inline());
        // Fits by size, but the buffer cannot promise the alignment.
        assert!(!ValueLayout::new(16, 32).unwrap().fits_inline());
        assert!(ValueLayout::new(0, 4096).unwrap().fits_inline());
    }

    #[test]
    fn array_bytes_uses_stride() {
        let layout = ValueLayout::from_parts(3, 1, 4).unwrap();
        assert_eq!(layout.array_bytes(5), Some(20));
        assert_eq!(layout.array_bytes(usize::MAX), None);
    }

    #[test]
    fn alloc_layout_matches() {
        let layout = ValueLayout::new(40, 16).unwrap();
        let alloc = layout.alloc_layout();
        assert_eq!(alloc.size(), 40);
        assert_eq!(alloc.align(), 16);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn new_upholds_invariants(size in 0usize..1 << 20, align_pow in 0u32..12) {
                let alignment = 1usize << align_pow;
                let layout = ValueLayout::new(size, alignment).unwrap();
                prop_assert!(layout.stride() >= layout.size());
                prop_assert_eq!(layout.stride() % layout.alignment(), 0);
                prop_assert!(layout.stride() - layout.size() < alignment);
                prop_assert_eq!(
                    ValueLayout::from_parts(size, alignment, layout.stride()),
                    Ok(layout)
                );
            }

            #[test]
            fn non_power_of_two_alignment_always_rejected(size in 0usize..4096, alignment in 1usize..4096) {
                prop_assume!(!alignment.is_power_of_two());
                prop_assert_eq!(
                    ValueLayout::new(size, alignment),
                    Err(LayoutError::AlignmentNotPowerOfTwo { alignment })
                );
            }
        }
    }
}

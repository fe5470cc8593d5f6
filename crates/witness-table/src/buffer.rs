//! Fixed-capacity value buffers and the inline-vs-indirect storage decision.
//!
//! A [`ValueBuffer`] is three machine words of caller-owned storage. A value
//! whose layout fits is stored in place; anything larger is stored on the heap
//! and the buffer's first word holds the pointer. Which of the two applies is
//! a property of the type, not of the buffer, so it is computed once when a
//! witness table is built and recorded as its [`BufferStrategy`].

#![allow(unsafe_code)]

use std::fmt;
use std::mem::{align_of, size_of, MaybeUninit};

use witness_core::{ValueLayout, INLINE_BUFFER_ALIGN, INLINE_BUFFER_BYTES, INLINE_BUFFER_WORDS};

use crate::value::OpaqueValue;

/// Caller-owned storage for one value of statically-unknown type.
///
/// The buffer never knows what it holds. Whoever last ran an initializing
/// witness on it owns the contents and is responsible for destroying or
/// deallocating them; dropping the buffer itself does nothing.
#[repr(C, align(8))]
pub struct ValueBuffer {
    words: [MaybeUninit<*mut u8>; INLINE_BUFFER_WORDS],
}

const _: () = assert!(size_of::<ValueBuffer>() >= INLINE_BUFFER_BYTES);
const _: () = assert!(align_of::<ValueBuffer>() >= INLINE_BUFFER_ALIGN);

impl ValueBuffer {
    /// An uninitialized buffer.
    pub const fn new() -> Self {
        Self {
            words: [MaybeUninit::uninit(); INLINE_BUFFER_WORDS],
        }
    }

    /// Raw pointer to this buffer, for passing to witness operations.
    pub fn as_mut_ptr(&mut self) -> *mut ValueBuffer {
        self
    }

    /// Raw const pointer to this buffer.
    pub fn as_ptr(&self) -> *const ValueBuffer {
        self
    }

    /// The buffer's own bytes viewed as an inline value.
    pub(crate) fn inline_value(buffer: *mut ValueBuffer) -> *mut OpaqueValue {
        buffer.cast()
    }

    /// Whether `value` points into the bytes of `buffer`.
    pub fn contains(buffer: *const ValueBuffer, value: *const OpaqueValue) -> bool {
        let start = buffer.addr();
        let addr = value.addr();
        addr >= start && addr < start + size_of::<ValueBuffer>()
    }

    /// The heap pointer stored in the first word of an out-of-line buffer.
    ///
    /// # Safety
    ///
    /// `buffer` must be valid for reads and hold a pointer written by
    /// [`ValueBuffer::set_out_of_line`].
    pub(crate) unsafe fn out_of_line(buffer: *const ValueBuffer) -> *mut OpaqueValue {
        // SAFETY: caller guarantees word 0 was initialized with a pointer.
        unsafe { buffer.cast::<*mut OpaqueValue>().read() }
    }

    /// Store a heap pointer in the first word.
    ///
    /// # Safety
    ///
    /// `buffer` must be valid for writes.
    pub(crate) unsafe fn set_out_of_line(buffer: *mut ValueBuffer, value: *mut OpaqueValue) {
        // SAFETY: word 0 is pointer-sized and pointer-aligned.
        unsafe { buffer.cast::<*mut OpaqueValue>().write(value) }
    }
}

impl Default for ValueBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ValueBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueBuffer")
            .field("address", &self.as_ptr())
            .finish_non_exhaustive()
    }
}

/// Where values of one type live when placed in a [`ValueBuffer`].
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferStrategy {
    /// The value occupies the buffer's own bytes.
    Inline,
    /// The value lives on the heap; the buffer holds the pointer.
    Indirect,
}

impl BufferStrategy {
    /// The strategy for values of the given layout.
    pub const fn for_layout(layout: ValueLayout) -> Self {
        if layout.fits_inline() {
            Self::Inline
        } else {
            Self::Indirect
        }
    }

    /// Whether values are stored in place.
    pub const fn is_inline(self) -> bool {
        matches!(self, Self::Inline)
    }
}

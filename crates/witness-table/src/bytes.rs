//! Witness tables for plain bytes whose layout is only known at runtime.
//!
//! [`RawBytes`] is a single witness shared by every such table. It reads the
//! size and storage strategy from the table it is called through, so
//! [`WitnessTable::for_bytes`] can mint a table for any validated
//! [`ValueLayout`]. Small values sit inline in the buffer. Large or
//! over-aligned ones are heap-allocated with the table's layout and the
//! buffer's first word holds the pointer.

#![allow(unsafe_code)]

use std::alloc::{alloc, dealloc, handle_alloc_error};
use std::ptr;

use witness_core::{ValueLayout, WitnessError};

use crate::buffer::{BufferStrategy, ValueBuffer};
use crate::table::{ValueWitness, WitnessTable};
use crate::value::OpaqueValue;

/// Witness for `this.size()` bytes of plain data.
pub struct RawBytes;

#[inline]
unsafe fn copy_bytes(
    dest: *mut OpaqueValue,
    src: *const OpaqueValue,
    this: &WitnessTable,
) -> *mut OpaqueValue {
    // SAFETY: caller guarantees both span `this.size()` valid bytes.
    unsafe { ptr::copy(src.cast::<u8>(), dest.cast::<u8>(), this.size()) };
    dest
}

#[inline]
unsafe fn project(buffer: *mut ValueBuffer, this: &WitnessTable) -> *mut OpaqueValue {
    match this.strategy() {
        BufferStrategy::Inline => ValueBuffer::inline_value(buffer),
        // SAFETY: an indirect buffer was set up by `allocate`.
        BufferStrategy::Indirect => unsafe { ValueBuffer::out_of_line(buffer) },
    }
}

/// Reserve storage for one value of a bytes table in `buffer`.
///
/// Returns [`WitnessError::AllocationFailure`] instead of aborting when the
/// allocator refuses.
///
/// # Safety
///
/// `this` was built by [`WitnessTable::for_bytes`] and `buffer` is valid for
/// writes and holds no value.
pub(crate) unsafe fn try_allocate(
    buffer: *mut ValueBuffer,
    this: &WitnessTable,
) -> Result<*mut OpaqueValue, WitnessError> {
    match this.strategy() {
        BufferStrategy::Inline => Ok(ValueBuffer::inline_value(buffer)),
        BufferStrategy::Indirect => {
            // Indirect layouts are never zero-sized.
            let layout = this.layout().alloc_layout();
            // SAFETY: `layout` has a non-zero size.
            let storage = unsafe { alloc(layout) };
            if storage.is_null() {
                return Err(WitnessError::AllocationFailure {
                    size: layout.size(),
                    alignment: layout.align(),
                });
            }
            let value = storage.cast::<OpaqueValue>();
            // SAFETY: caller guarantees the buffer is writable.
            unsafe { ValueBuffer::set_out_of_line(buffer, value) };
            Ok(value)
        }
    }
}

#[inline]
unsafe fn allocate(buffer: *mut ValueBuffer, this: &WitnessTable) -> *mut OpaqueValue {
    // SAFETY: forwarded contract.
    match unsafe { try_allocate(buffer, this) } {
        Ok(value) => value,
        Err(_) => handle_alloc_error(this.layout().alloc_layout()),
    }
}

#[inline]
unsafe fn deallocate(buffer: *mut ValueBuffer, this: &WitnessTable) {
    if let BufferStrategy::Indirect = this.strategy() {
        // SAFETY: the pointer came from `allocate` with this same layout.
        unsafe {
            dealloc(
                ValueBuffer::out_of_line(buffer).cast::<u8>(),
                this.layout().alloc_layout(),
            )
        }
    }
}

// SAFETY: bytes own nothing beyond their out-of-line storage, which is freed
// exactly by `destroy_buffer`/`deallocate_buffer`.
unsafe impl ValueWitness for RawBytes {
    unsafe extern "C" fn destroy_buffer(buffer: *mut ValueBuffer, this: &WitnessTable) {
        // SAFETY: forwarded contract.
        unsafe { deallocate(buffer, this) }
    }

    unsafe extern "C" fn initialize_buffer_with_copy_of_buffer(
        dest: *mut ValueBuffer,
        src: *const ValueBuffer,
        this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: `src` holds a value; `dest` is fresh storage of the same table.
        unsafe {
            let from = project(src.cast_mut(), this);
            copy_bytes(allocate(dest, this), from, this)
        }
    }

    unsafe extern "C" fn project_buffer(
        buffer: *mut ValueBuffer,
        this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { project(buffer, this) }
    }

    unsafe extern "C" fn deallocate_buffer(buffer: *mut ValueBuffer, this: &WitnessTable) {
        // SAFETY: forwarded contract.
        unsafe { deallocate(buffer, this) }
    }

    unsafe extern "C" fn destroy(_value: *mut OpaqueValue, _this: &WitnessTable) {}

    unsafe extern "C" fn initialize_buffer_with_copy(
        dest: *mut ValueBuffer,
        src: *const OpaqueValue,
        this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { copy_bytes(allocate(dest, this), src, this) }
    }

    unsafe extern "C" fn initialize_with_copy(
        dest: *mut OpaqueValue,
        src: *const OpaqueValue,
        this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { copy_bytes(dest, src, this) }
    }

    unsafe extern "C" fn assign_with_copy(
        dest: *mut OpaqueValue,
        src: *const OpaqueValue,
        this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { copy_bytes(dest, src, this) }
    }

    unsafe extern "C" fn initialize_buffer_with_take(
        dest: *mut ValueBuffer,
        src: *mut OpaqueValue,
        this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { copy_bytes(allocate(dest, this), src, this) }
    }

    unsafe extern "C" fn initialize_with_take(
        dest: *mut OpaqueValue,
        src: *mut OpaqueValue,
        this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { copy_bytes(dest, src, this) }
    }

    unsafe extern "C" fn assign_with_take(
        dest: *mut OpaqueValue,
        src: *mut OpaqueValue,
        this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { copy_bytes(dest, src, this) }
    }

    unsafe extern "C" fn allocate_buffer(
        buffer: *mut ValueBuffer,
        this: &WitnessTable,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { allocate(buffer, this) }
    }
}

impl WitnessTable {
    /// A table for plain bytes of the given layout.
    ///
    /// Storage is inline when the layout fits a [`ValueBuffer`] and
    /// heap-allocated otherwise; see [`BufferStrategy::for_layout`].
    pub const fn for_bytes(layout: ValueLayout) -> Self {
        Self::with_layout::<RawBytes>(layout)
    }
}

#[cfg(test)]
mod tests {
    use witness_core::INLINE_BUFFER_BYTES;

    use super::*;

    fn fill(table: &WitnessTable, buffer: &mut ValueBuffer, seed: u8) -> *mut OpaqueValue {
        unsafe {
            let value = table.allocate_buffer(buffer.as_mut_ptr());
            for offset in 0..table.size() {
                value.cast::<u8>().add(offset).write(seed.wrapping_add(offset as u8));
            }
            value
        }
    }

    fn bytes_of(table: &WitnessTable, value: *const OpaqueValue) -> Vec<u8> {
        unsafe { std::slice::from_raw_parts(value.cast::<u8>(), table.size()).to_vec() }
    }

    #[test]
    fn small_layouts_stay_inline() {
        let table = WitnessTable::for_bytes(ValueLayout::new(INLINE_BUFFER_BYTES, 8).unwrap());
        assert_eq!(table.strategy(), BufferStrategy::Inline);

        let mut buffer = ValueBuffer::new();
        let value = fill(&table, &mut buffer, 1);
        assert!(ValueBuffer::contains(buffer.as_ptr(), value));
        unsafe { table.destroy_buffer(buffer.as_mut_ptr()) };
    }

    #[test]
    fn zero_sized_is_inline_even_when_over_aligned() {
        let table = WitnessTable::for_bytes(ValueLayout::new(0, 64).unwrap());
        assert!(table.fits_inline());
    }

    #[test]
    fn large_layouts_go_out_of_line() {
        let table = WitnessTable::for_bytes(ValueLayout::new(64, 8).unwrap());
        assert_eq!(table.strategy(), BufferStrategy::Indirect);

        let mut src = ValueBuffer::new();
        let mut dest = ValueBuffer::new();
        let original = fill(&table, &mut src, 10);
        assert!(!ValueBuffer::contains(src.as_ptr(), original));

        unsafe {
            let copied = table.initialize_buffer_with_copy_of_buffer(dest.as_mut_ptr(), src.as_ptr());
            assert_ne!(copied, original);
            assert_eq!(copied, table.project_buffer(dest.as_mut_ptr()));
            assert_eq!(bytes_of(&table, copied), bytes_of(&table, original));

            table.destroy_buffer(src.as_mut_ptr());
            table.destroy_buffer(dest.as_mut_ptr());
        }
    }

    #[test]
    fn over_aligned_layouts_go_out_of_line() {
        let table = WitnessTable::for_bytes(ValueLayout::new(16, 64).unwrap());
        assert_eq!(table.strategy(), BufferStrategy::Indirect);

        let mut buffer = ValueBuffer::new();
        let value = fill(&table, &mut buffer, 0);
        assert_eq!(value.addr() % 64, 0);
        unsafe { table.deallocate_buffer(buffer.as_mut_ptr()) };
    }

    #[test]
    fn take_into_buffer_then_out_again() {
        let table = WitnessTable::for_bytes(ValueLayout::new(40, 8).unwrap());
        let mut src = [7u64; 5];
        let mut out = [0u64; 5];
        let mut buffer = ValueBuffer::new();
        unsafe {
            let inside = table.initialize_buffer_with_take(
                buffer.as_mut_ptr(),
                OpaqueValue::erase(src.as_mut_ptr()),
            );
            table.initialize_with_take(OpaqueValue::erase(out.as_mut_ptr()), inside);
            table.deallocate_buffer(buffer.as_mut_ptr());
        }
        assert_eq!(out, [7; 5]);
    }

    #[test]
    fn assign_copies_only_size_bytes() {
        let table = WitnessTable::for_bytes(ValueLayout::from_parts(3, 1, 4).unwrap());
        let src = [1u8, 2, 3, 4];
        let mut dest = [0u8, 0, 0, 9];
        unsafe {
            table.assign_with_copy(
                OpaqueValue::erase(dest.as_mut_ptr()),
                OpaqueValue::erase_const(src.as_ptr()),
            );
        }
        assert_eq!(dest, [1, 2, 3, 9]);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn buffer_copy_preserves_bytes(size in 0usize..256, align_shift in 0u32..7) {
                let layout = ValueLayout::new(size, 1 << align_shift).unwrap();
                let table = WitnessTable::for_bytes(layout);
                prop_assert_eq!(table.fits_inline(), layout.fits_inline());

                let mut src = ValueBuffer::new();
                let mut dest = ValueBuffer::new();
                let original = fill(&table, &mut src, size as u8);
                unsafe {
                    let copied = table.initialize_buffer_with_copy_of_buffer(dest.as_mut_ptr(), src.as_ptr());
                    prop_assert_eq!(bytes_of(&table, copied), bytes_of(&table, original));
                    table.destroy_buffer(src.as_mut_ptr());
                    table.destroy_buffer(dest.as_mut_ptr());
                }
            }
        }
    }
}

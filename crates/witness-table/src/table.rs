//! The value witness table: how to manage one value of an unknown type.
//!
//! A [`WitnessTable`] is a `#[repr(C)]` record of twelve operation pointers
//! plus the type's [`ValueLayout`]. Generic code holds `&'static WitnessTable`
//! and drives copies, moves, and destruction through it without knowing what
//! the bytes are.
//!
//! The operations come from a [`ValueWitness`] implementation. Code that knows
//! the witness statically can call `W::initialize_with_copy(..)` directly;
//! [`WitnessTable::of`] erases it into function pointers for everything else.
//! Every operation receives the table itself as its final argument, so one
//! implementation can serve many tables (see [`crate::bytes`], where the
//! layout is only known at runtime).
//!
//! # Operation matrix
//!
//! | | copy | take |
//! |---|---|---|
//! | value → uninitialized value | `initialize_with_copy` | `initialize_with_take` |
//! | value → initialized value | `assign_with_copy` | `assign_with_take` |
//! | value → buffer | `initialize_buffer_with_copy` | `initialize_buffer_with_take` |
//! | buffer → buffer | `initialize_buffer_with_copy_of_buffer` | |
//!
//! plus `destroy`, `destroy_buffer`, `allocate_buffer`, `project_buffer`, and
//! `deallocate_buffer` for storage management.

#![allow(unsafe_code)]

use std::fmt;

use witness_core::ValueLayout;

use crate::buffer::{BufferStrategy, ValueBuffer};
use crate::value::OpaqueValue;

/// Destroy the value held in a buffer and free any out-of-line storage.
pub type DestroyBufferFn = unsafe extern "C" fn(buffer: *mut ValueBuffer, this: &WitnessTable);

/// Initialize `dest` as a copy of the value held in `src`.
pub type InitializeBufferWithCopyOfBufferFn = unsafe extern "C" fn(
    dest: *mut ValueBuffer,
    src: *const ValueBuffer,
    this: &WitnessTable,
) -> *mut OpaqueValue;

/// Address of the value held in a buffer.
pub type ProjectBufferFn =
    unsafe extern "C" fn(buffer: *mut ValueBuffer, this: &WitnessTable) -> *mut OpaqueValue;

/// Free out-of-line storage without destroying the value.
pub type DeallocateBufferFn = unsafe extern "C" fn(buffer: *mut ValueBuffer, this: &WitnessTable);

/// Destroy a directly addressed value.
pub type DestroyFn = unsafe extern "C" fn(value: *mut OpaqueValue, this: &WitnessTable);

/// Initialize a buffer with a copy of a directly addressed value.
pub type InitializeBufferWithCopyFn = unsafe extern "C" fn(
    dest: *mut ValueBuffer,
    src: *const OpaqueValue,
    this: &WitnessTable,
) -> *mut OpaqueValue;

/// Initialize uninitialized storage with a copy.
pub type InitializeWithCopyFn = unsafe extern "C" fn(
    dest: *mut OpaqueValue,
    src: *const OpaqueValue,
    this: &WitnessTable,
) -> *mut OpaqueValue;

/// Replace an initialized value with a copy.
pub type AssignWithCopyFn = unsafe extern "C" fn(
    dest: *mut OpaqueValue,
    src: *const OpaqueValue,
    this: &WitnessTable,
) -> *mut OpaqueValue;

/// Initialize a buffer by taking ownership of a value.
pub type InitializeBufferWithTakeFn = unsafe extern "C" fn(
    dest: *mut ValueBuffer,
    src: *mut OpaqueValue,
    this: &WitnessTable,
) -> *mut OpaqueValue;

/// Initialize uninitialized storage by taking ownership of a value.
pub type InitializeWithTakeFn = unsafe extern "C" fn(
    dest: *mut OpaqueValue,
    src: *mut OpaqueValue,
    this: &WitnessTable,
) -> *mut OpaqueValue;

/// Replace an initialized value by taking ownership of another.
pub type AssignWithTakeFn = unsafe extern "C" fn(
    dest: *mut OpaqueValue,
    src: *mut OpaqueValue,
    this: &WitnessTable,
) -> *mut OpaqueValue;

/// Reserve storage for one value in a buffer and return it, uninitialized.
pub type AllocateBufferFn =
    unsafe extern "C" fn(buffer: *mut ValueBuffer, this: &WitnessTable) -> *mut OpaqueValue;

/// The operations that manage values of one type.
///
/// # Safety
///
/// Implementors promise that each operation honours the ownership contract
/// documented on it for every table built from the implementation:
/// copies leave the source valid and independently owned, takes leave the
/// source logically uninitialized, assigns release the destination's old
/// value exactly once, and buffer operations agree with the table's
/// [`BufferStrategy`].
///
/// Callers of every operation must pass pointers that are valid, aligned to
/// the table's alignment, and initialized (or not) as each operation states.
/// The source and destination of a take must not overlap.
pub unsafe trait ValueWitness {
    /// Destroy the value in `buffer`, freeing out-of-line storage.
    ///
    /// # Safety
    ///
    /// `buffer` holds an initialized value of this type.
    unsafe extern "C" fn destroy_buffer(buffer: *mut ValueBuffer, this: &WitnessTable);

    /// Initialize `dest` as a copy of the value in `src`. Returns the value in `dest`.
    ///
    /// # Safety
    ///
    /// `dest` is uninitialized; `src` holds an initialized value.
    unsafe extern "C" fn initialize_buffer_with_copy_of_buffer(
        dest: *mut ValueBuffer,
        src: *const ValueBuffer,
        this: &WitnessTable,
    ) -> *mut OpaqueValue;

    /// Address of the value in `buffer`. Never allocates.
    ///
    /// # Safety
    ///
    /// `buffer` has been allocated or initialized for this type.
    unsafe extern "C" fn project_buffer(
        buffer: *mut ValueBuffer,
        this: &WitnessTable,
    ) -> *mut OpaqueValue;

    /// Free out-of-line storage of `buffer` without destroying its value.
    ///
    /// # Safety
    ///
    /// `buffer` was allocated for this type and its value has been taken or
    /// was never initialized.
    unsafe extern "C" fn deallocate_buffer(buffer: *mut ValueBuffer, this: &WitnessTable);

    /// Destroy the value at `value`.
    ///
    /// # Safety
    ///
    /// `value` is initialized; afterwards it is uninitialized.
    unsafe extern "C" fn destroy(value: *mut OpaqueValue, this: &WitnessTable);

    /// Initialize `dest` with a copy of `src`. Returns the value in `dest`.
    ///
    /// # Safety
    ///
    /// `dest` is uninitialized; `src` is initialized.
    unsafe extern "C" fn initialize_buffer_with_copy(
        dest: *mut ValueBuffer,
        src: *const OpaqueValue,
        this: &WitnessTable,
    ) -> *mut OpaqueValue;

    /// Initialize `dest` with a copy of `src`. Returns `dest`.
    ///
    /// # Safety
    ///
    /// `dest` is uninitialized; `src` is initialized.
    unsafe extern "C" fn initialize_with_copy(
        dest: *mut OpaqueValue,
        src: *const OpaqueValue,
        this: &WitnessTable,
    ) -> *mut OpaqueValue;

    /// Destroy `dest`'s value and replace it with a copy of `src`. Returns `dest`.
    ///
    /// # Safety
    ///
    /// Both are initialized. They may be the same value.
    unsafe extern "C" fn assign_with_copy(
        dest: *mut OpaqueValue,
        src: *const OpaqueValue,
        this: &WitnessTable,
    ) -> *mut OpaqueValue;

    /// Initialize `dest` by taking `src`. Returns the value in `dest`.
    ///
    /// # Safety
    ///
    /// `dest` is uninitialized; `src` is initialized and is uninitialized afterwards.
    unsafe extern "C" fn initialize_buffer_with_take(
        dest: *mut ValueBuffer,
        src: *mut OpaqueValue,
        this: &WitnessTable,
    ) -> *mut OpaqueValue;

    /// Initialize `dest` by taking `src`. Returns `dest`.
    ///
    /// # Safety
    ///
    /// `dest` is uninitialized; `src` is initialized and is uninitialized
    /// afterwards. They do not overlap.
    unsafe extern "C" fn initialize_with_take(
        dest: *mut OpaqueValue,
        src: *mut OpaqueValue,
        this: &WitnessTable,
    ) -> *mut OpaqueValue;

    /// Destroy `dest`'s value and move `src` into it. Returns `dest`.
    ///
    /// # Safety
    ///
    /// Both are initialized and do not overlap; `src` is uninitialized afterwards.
    unsafe extern "C" fn assign_with_take(
        dest: *mut OpaqueValue,
        src: *mut OpaqueValue,
        this: &WitnessTable,
    ) -> *mut OpaqueValue;

    /// Reserve storage for one value in `buffer` and return it uninitialized.
    ///
    /// # Safety
    ///
    /// `buffer` holds no value of this type.
    unsafe extern "C" fn allocate_buffer(
        buffer: *mut ValueBuffer,
        this: &WitnessTable,
    ) -> *mut OpaqueValue;
}

/// A witness whose layout is known at compile time.
pub trait FixedLayout {
    /// Layout of every value the witness manages.
    const LAYOUT: ValueLayout;
}

/// Operation pointers and layout for one type.
///
/// Tables are built once, usually as `static`s, and only ever shared by
/// reference afterwards. Every method is a thin call through the matching
/// pointer with `self` appended; see [`ValueWitness`] for each contract.
#[repr(C)]
pub struct WitnessTable {
    destroy_buffer: DestroyBufferFn,
    initialize_buffer_with_copy_of_buffer: InitializeBufferWithCopyOfBufferFn,
    project_buffer: ProjectBufferFn,
    deallocate_buffer: DeallocateBufferFn,
    destroy: DestroyFn,
    initialize_buffer_with_copy: InitializeBufferWithCopyFn,
    initialize_with_copy: InitializeWithCopyFn,
    assign_with_copy: AssignWithCopyFn,
    initialize_buffer_with_take: InitializeBufferWithTakeFn,
    initialize_with_take: InitializeWithTakeFn,
    assign_with_take: AssignWithTakeFn,
    allocate_buffer: AllocateBufferFn,
    layout: ValueLayout,
    strategy: BufferStrategy,
}

impl WitnessTable {
    /// Erase a statically-laid-out witness into a table.
    pub const fn of<W: ValueWitness + FixedLayout>() -> Self {
        Self::with_layout::<W>(W::LAYOUT)
    }

    /// Erase a witness that reads its layout from the table at runtime.
    pub(crate) const fn with_layout<W: ValueWitness>(layout: ValueLayout) -> Self {
        Self {
            destroy_buffer: W::destroy_buffer,
            initialize_buffer_with_copy_of_buffer: W::initialize_buffer_with_copy_of_buffer,
            project_buffer: W::project_buffer,
            deallocate_buffer: W::deallocate_buffer,
            destroy: W::destroy,
            initialize_buffer_with_copy: W::initialize_buffer_with_copy,
            initialize_with_copy: W::initialize_with_copy,
            assign_with_copy: W::assign_with_copy,
            initialize_buffer_with_take: W::initialize_buffer_with_take,
            initialize_with_take: W::initialize_with_take,
            assign_with_take: W::assign_with_take,
            allocate_buffer: W::allocate_buffer,
            layout,
            strategy: BufferStrategy::for_layout(layout),
        }
    }

    /// Size, alignment, and stride of the managed type.
    pub const fn layout(&self) -> ValueLayout {
        self.layout
    }

    /// Size of one value in bytes.
    pub const fn size(&self) -> usize {
        self.layout.size()
    }

    /// Required alignment in bytes.
    pub const fn alignment(&self) -> usize {
        self.layout.alignment()
    }

    /// Distance between consecutive array elements in bytes.
    pub const fn stride(&self) -> usize {
        self.layout.stride()
    }

    /// Whether values are stored inline or out of line in a [`ValueBuffer`].
    pub const fn strategy(&self) -> BufferStrategy {
        self.strategy
    }

    /// Shorthand for `self.strategy().is_inline()`.
    pub const fn fits_inline(&self) -> bool {
        self.strategy.is_inline()
    }

    fn debug_check_aligned(&self, value: *const OpaqueValue) {
        debug_assert!(
            self.size() == 0 || value.addr() % self.alignment() == 0,
            "value at {value:p} is not aligned to {}",
            self.alignment()
        );
    }

    /// See [`ValueWitness::destroy_buffer`].
    ///
    /// # Safety
    ///
    /// As for [`ValueWitness::destroy_buffer`].
    #[inline]
    pub unsafe fn destroy_buffer(&self, buffer: *mut ValueBuffer) {
        // SAFETY: forwarded contract.
        unsafe { (self.destroy_buffer)(buffer, self) }
    }

    /// See [`ValueWitness::initialize_buffer_with_copy_of_buffer`].
    ///
    /// # Safety
    ///
    /// As for [`ValueWitness::initialize_buffer_with_copy_of_buffer`].
    #[inline]
    pub unsafe fn initialize_buffer_with_copy_of_buffer(
        &self,
        dest: *mut ValueBuffer,
        src: *const ValueBuffer,
    ) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { (self.initialize_buffer_with_copy_of_buffer)(dest, src, self) }
    }

    /// See [`ValueWitness::project_buffer`].
    ///
    /// # Safety
    ///
    /// As for [`ValueWitness::project_buffer`].
    #[inline]
    pub unsafe fn project_buffer(&self, buffer: *mut ValueBuffer) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { (self.project_buffer)(buffer, self) }
    }

    /// See [`ValueWitness::deallocate_buffer`].
    ///
    /// # Safety
    ///
    /// As for [`ValueWitness::deallocate_buffer`].
    #[inline]
    pub unsafe fn deallocate_buffer(&self, buffer: *mut ValueBuffer) {
        // SAFETY: forwarded contract.
        unsafe { (self.deallocate_buffer)(buffer, self) }
    }

    /// See [`ValueWitness::destroy`].
    ///
    /// # Safety
    ///
    /// As for [`ValueWitness::destroy`].
    #[inline]
    pub unsafe fn destroy(&self, value: *mut OpaqueValue) {
        self.debug_check_aligned(value);
        // SAFETY: forwarded contract.
        unsafe { (self.destroy)(value, self) }
    }

    /// See [`ValueWitness::initialize_buffer_with_copy`].
    ///
    /// # Safety
    ///
    /// As for [`ValueWitness::initialize_buffer_with_copy`].
    #[inline]
    pub unsafe fn initialize_buffer_with_copy(
        &self,
        dest: *mut ValueBuffer,
        src: *const OpaqueValue,
    ) -> *mut OpaqueValue {
        self.debug_check_aligned(src);
        // SAFETY: forwarded contract.
        unsafe { (self.initialize_buffer_with_copy)(dest, src, self) }
    }

    /// See [`ValueWitness::initialize_with_copy`].
    ///
    /// # Safety
    ///
    /// As for [`ValueWitness::initialize_with_copy`].
    #[inline]
    pub unsafe fn initialize_with_copy(
        &self,
        dest: *mut OpaqueValue,
        src: *const OpaqueValue,
    ) -> *mut OpaqueValue {
        self.debug_check_aligned(dest);
        self.debug_check_aligned(src);
        // SAFETY: forwarded contract.
        unsafe { (self.initialize_with_copy)(dest, src, self) }
    }

    /// See [`ValueWitness::assign_with_copy`].
    ///
    /// # Safety
    ///
    /// As for [`ValueWitness::assign_with_copy`].
    #[inline]
    pub unsafe fn assign_with_copy(
        &self,
        dest: *mut OpaqueValue,
        src: *const OpaqueValue,
    ) -> *mut OpaqueValue {
        self.debug_check_aligned(dest);
        self.debug_check_aligned(src);
        // SAFETY: forwarded contract.
        unsafe { (self.assign_with_copy)(dest, src, self) }
    }

    /// See [`ValueWitness::initialize_buffer_with_take`].
    ///
    /// # Safety
    ///
    /// As for [`ValueWitness::initialize_buffer_with_take`].
    #[inline]
    pub unsafe fn initialize_buffer_with_take(
        &self,
        dest: *mut ValueBuffer,
        src: *mut OpaqueValue,
    ) -> *mut OpaqueValue {
        self.debug_check_aligned(src);
        // SAFETY: forwarded contract.
        unsafe { (self.initialize_buffer_with_take)(dest, src, self) }
    }

    /// See [`ValueWitness::initialize_with_take`].
    ///
    /// # Safety
    ///
    /// As for [`ValueWitness::initialize_with_take`].
    #[inline]
    pub unsafe fn initialize_with_take(
        &self,
        dest: *mut OpaqueValue,
        src: *mut OpaqueValue,
    ) -> *mut OpaqueValue {
        self.debug_check_aligned(dest);
        self.debug_check_aligned(src);
        debug_assert!(
            self.size() == 0 || dest != src,
            "take from a value into itself"
        );
        // SAFETY: forwarded contract.
        unsafe { (self.initialize_with_take)(dest, src, self) }
    }

    /// See [`ValueWitness::assign_with_take`].
    ///
    /// # Safety
    ///
    /// As for [`ValueWitness::assign_with_take`].
    #[inline]
    pub unsafe fn assign_with_take(
        &self,
        dest: *mut OpaqueValue,
        src: *mut OpaqueValue,
    ) -> *mut OpaqueValue {
        self.debug_check_aligned(dest);
        self.debug_check_aligned(src);
        debug_assert!(
            self.size() == 0 || dest != src,
            "take from a value into itself"
        );
        // SAFETY: forwarded contract.
        unsafe { (self.assign_with_take)(dest, src, self) }
    }

    /// See [`ValueWitness::allocate_buffer`].
    ///
    /// # Safety
    ///
    /// As for [`ValueWitness::allocate_buffer`].
    #[inline]
    pub unsafe fn allocate_buffer(&self, buffer: *mut ValueBuffer) -> *mut OpaqueValue {
        // SAFETY: forwarded contract.
        unsafe { (self.allocate_buffer)(buffer, self) }
    }

    /// Address of element `index` in a contiguous array starting at `base`.
    ///
    /// # Safety
    ///
    /// The resulting address must lie within (or one past) the same allocation
    /// as `base`.
    #[inline]
    pub unsafe fn element_at(&self, base: *mut OpaqueValue, index: usize) -> *mut OpaqueValue {
        debug_assert!(
            self.layout.array_bytes(index).is_some(),
            "element {index} lies beyond the addressable range"
        );
        // SAFETY: caller keeps the offset in bounds.
        unsafe { base.byte_add(index * self.stride()) }
    }

    /// Copy-initialize `count` elements from `src` into uninitialized `dest`.
    ///
    /// # Safety
    ///
    /// Both arrays hold `count` elements at this table's stride; `dest` is
    /// uninitialized and does not overlap `src`.
    pub unsafe fn initialize_array_with_copy(
        &self,
        dest: *mut OpaqueValue,
        src: *const OpaqueValue,
        count: usize,
    ) {
        for index in 0..count {
            // SAFETY: both arrays span `count` elements.
            unsafe {
                let to = self.element_at(dest, index);
                let from = self.element_at(src.cast_mut(), index);
                self.initialize_with_copy(to, from);
            }
        }
    }

    /// Take-initialize `count` elements from `src` into uninitialized `dest`.
    ///
    /// # Safety
    ///
    /// As for [`WitnessTable::initialize_array_with_copy`]; every element of
    /// `src` is uninitialized afterwards.
    pub unsafe fn initialize_array_with_take(
        &self,
        dest: *mut OpaqueValue,
        src: *mut OpaqueValue,
        count: usize,
    ) {
        for index in 0..count {
            // SAFETY: both arrays span `count` elements.
            unsafe {
                let to = self.element_at(dest, index);
                let from = self.element_at(src, index);
                self.initialize_with_take(to, from);
            }
        }
    }

    /// Destroy `count` contiguous elements starting at `base`.
    ///
    /// # Safety
    ///
    /// All `count` elements are initialized; afterwards none are.
    pub unsafe fn destroy_array(&self, base: *mut OpaqueValue, count: usize) {
        for index in 0..count {
            // SAFETY: the array spans `count` elements.
            unsafe { self.destroy(self.element_at(base, index)) }
        }
    }
}

impl fmt::Debug for WitnessTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WitnessTable")
            .field("layout", &self.layout)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

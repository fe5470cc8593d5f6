//! An owning container for one value of descriptor-known type.
//!
//! [`OpaqueBox`] pairs a [`ValueBuffer`] with the [`TypeDescriptor`] that
//! manages its contents, so ordinary Rust ownership (`Clone`, `Drop`, moves)
//! drives the witness operations. It is the safe face of the tables for
//! code that does not want to juggle buffers by hand.

#![allow(unsafe_code)]

use std::fmt;
use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};

use witness_core::{ValueLayout, WitnessError};

use crate::buffer::ValueBuffer;
use crate::bytes::try_allocate;
use crate::metadata::{bytes_descriptor, pod_metadata, TypeDescriptor, NATIVE_OBJECT_METADATA};
use crate::native::{HeapBox, HeapObject};
use crate::pod::PodScalar;
use crate::table::WitnessTable;
use crate::value::OpaqueValue;

/// One owned value plus the descriptor that manages it.
///
/// Values are moved bitwise when the box moves, which every table in this
/// crate permits.
pub struct OpaqueBox {
    buffer: ValueBuffer,
    descriptor: &'static TypeDescriptor,
}

impl OpaqueBox {
    /// Box a copy of the value at `src`.
    ///
    /// # Safety
    ///
    /// `src` points at an initialized value of `descriptor`'s type, aligned
    /// for it, and that type may be moved bitwise.
    pub unsafe fn copy_from(descriptor: &'static TypeDescriptor, src: *const OpaqueValue) -> Self {
        let mut boxed = Self {
            buffer: ValueBuffer::new(),
            descriptor,
        };
        // SAFETY: the buffer is fresh; caller vouches for `src`.
        unsafe {
            descriptor
                .resolve()
                .initialize_buffer_with_copy(boxed.buffer.as_mut_ptr(), src)
        };
        boxed
    }

    /// Box the value at `src`, leaving `src` uninitialized.
    ///
    /// # Safety
    ///
    /// As for [`OpaqueBox::copy_from`]; the caller must not use or destroy
    /// `src` afterwards.
    pub unsafe fn take_from(descriptor: &'static TypeDescriptor, src: *mut OpaqueValue) -> Self {
        let mut boxed = Self {
            buffer: ValueBuffer::new(),
            descriptor,
        };
        // SAFETY: the buffer is fresh; caller vouches for `src`.
        unsafe {
            descriptor
                .resolve()
                .initialize_buffer_with_take(boxed.buffer.as_mut_ptr(), src)
        };
        boxed
    }

    /// Box a builtin POD value.
    pub fn new_pod<T: PodScalar>(value: T) -> Self {
        // SAFETY: `T`'s width selects the matching POD table, and the local
        // copy is valid for reads.
        unsafe { Self::copy_from(pod_metadata(T::WIDTH), OpaqueValue::erase_const(&value)) }
    }

    /// Allocate `value` as a native object and box the only reference to it.
    pub fn native<T: Send + Sync + 'static>(value: T) -> Self {
        let mut object: *mut HeapObject = HeapBox::allocate(value).as_ptr();
        // SAFETY: `object` is one owned native reference, moved into the box.
        unsafe { Self::take_from(&NATIVE_OBJECT_METADATA, OpaqueValue::erase(&mut object)) }
    }

    /// Box a copy of `bytes` as a raw value with the given alignment.
    ///
    /// The descriptor is the interned one for `bytes.len()` and `alignment`.
    /// Unlike the table operation, allocation failure is reported rather
    /// than aborting.
    pub fn from_bytes(bytes: &[u8], alignment: usize) -> Result<Self, WitnessError> {
        let layout = ValueLayout::new(bytes.len(), alignment)?;
        let descriptor = bytes_descriptor(layout);
        let mut buffer = ValueBuffer::new();
        // SAFETY: the descriptor's table is a bytes table and the buffer is fresh.
        let value = unsafe { try_allocate(buffer.as_mut_ptr(), descriptor.resolve())? };
        // SAFETY: `value` has room for `bytes.len()` bytes.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), value.cast::<u8>(), bytes.len()) };
        Ok(Self { buffer, descriptor })
    }

    /// The descriptor managing the boxed value.
    pub fn descriptor(&self) -> &'static TypeDescriptor {
        self.descriptor
    }

    fn table(&self) -> &'static WitnessTable {
        self.descriptor.resolve()
    }

    /// Address of the boxed value.
    pub fn as_ptr(&self) -> *const OpaqueValue {
        let buffer = ptr::addr_of!(self.buffer).cast_mut();
        // SAFETY: the buffer holds an initialized value; projection only reads.
        unsafe { self.table().project_buffer(buffer) }
    }

    /// Mutable address of the boxed value.
    pub fn as_mut_ptr(&mut self) -> *mut OpaqueValue {
        // SAFETY: the buffer holds an initialized value.
        unsafe { self.table().project_buffer(self.buffer.as_mut_ptr()) }
    }

    /// The boxed value as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        let size = self.table().size();
        if size == 0 {
            return &[];
        }
        // SAFETY: the value spans `size` initialized bytes owned by `self`.
        unsafe { std::slice::from_raw_parts(self.as_ptr().cast::<u8>(), size) }
    }

    /// Read a builtin POD value back out.
    pub fn read_pod<T: PodScalar>(&self) -> Result<T, WitnessError> {
        if !ptr::eq(self.descriptor, pod_metadata(T::WIDTH)) {
            return Err(WitnessError::TypeMismatch {
                operation: "read_pod",
            });
        }
        // SAFETY: the descriptor guarantees a `T`-sized POD value.
        Ok(unsafe { self.as_ptr().cast::<T>().read_unaligned() })
    }

    /// The native object behind a box made by [`OpaqueBox::native`], still
    /// owned by the box.
    pub fn native_object(&self) -> Option<NonNull<HeapObject>> {
        if !ptr::eq(self.descriptor, &NATIVE_OBJECT_METADATA) {
            return None;
        }
        // SAFETY: native boxes hold exactly one object pointer.
        NonNull::new(unsafe { self.as_ptr().cast::<*mut HeapObject>().read() })
    }

    /// Replace the boxed value with a copy of `other`'s.
    ///
    /// Both boxes must share a descriptor.
    pub fn assign_from(&mut self, other: &OpaqueBox) -> Result<(), WitnessError> {
        if !ptr::eq(self.descriptor, other.descriptor) {
            return Err(WitnessError::TypeMismatch {
                operation: "assign_from",
            });
        }
        let dest = self.as_mut_ptr();
        // SAFETY: both values are initialized and share one table.
        unsafe { self.table().assign_with_copy(dest, other.as_ptr()) };
        Ok(())
    }

    /// Move the boxed value into `dest` and free the box's storage.
    ///
    /// # Safety
    ///
    /// `dest` is uninitialized storage for one value of this descriptor's
    /// type, suitably aligned, and does not overlap the box.
    pub unsafe fn move_into(self, dest: *mut OpaqueValue) {
        let mut this = ManuallyDrop::new(self);
        let table = this.table();
        let buffer = this.buffer.as_mut_ptr();
        // SAFETY: the value moves out exactly once, then only storage remains.
        unsafe {
            table.initialize_with_take(dest, table.project_buffer(buffer));
            table.deallocate_buffer(buffer);
        }
    }
}

impl Clone for OpaqueBox {
    fn clone(&self) -> Self {
        let mut cloned = Self {
            buffer: ValueBuffer::new(),
            descriptor: self.descriptor,
        };
        // SAFETY: `self` holds an initialized value; the new buffer is fresh.
        unsafe {
            self.table()
                .initialize_buffer_with_copy_of_buffer(cloned.buffer.as_mut_ptr(), self.buffer.as_ptr())
        };
        cloned
    }
}

impl Drop for OpaqueBox {
    fn drop(&mut self) {
        // SAFETY: the buffer holds an initialized value owned by `self`.
        unsafe { self.table().destroy_buffer(self.buffer.as_mut_ptr()) }
    }
}

impl fmt::Debug for OpaqueBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueBox")
            .field("descriptor", &self.descriptor)
            .field("value", &self.as_ptr())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::metadata::{INT16_METADATA, INT32_METADATA};

    struct CountDrops(Arc<AtomicUsize>);

    impl Drop for CountDrops {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn pod_round_trip() {
        let boxed = OpaqueBox::new_pod(0x1122_3344_5566_7788_u64);
        assert_eq!(boxed.read_pod::<u64>(), Ok(0x1122_3344_5566_7788));
        assert_eq!(
            boxed.read_pod::<u32>(),
            Err(WitnessError::TypeMismatch {
                operation: "read_pod"
            })
        );
    }

    #[test]
    fn clone_and_assign_keep_values_independent() {
        let first = OpaqueBox::new_pod(7_u32);
        let mut second = first.clone();
        assert!(ptr::eq(second.descriptor(), &INT32_METADATA));
        assert_ne!(first.as_ptr(), second.as_ptr());

        let other = OpaqueBox::new_pod(9_u32);
        second.assign_from(&other).unwrap();
        assert_eq!(second.read_pod::<u32>(), Ok(9));
        assert_eq!(first.read_pod::<u32>(), Ok(7));
    }

    #[test]
    fn assign_rejects_other_descriptors() {
        let mut narrow = OpaqueBox::new_pod(1_u16);
        let wide = OpaqueBox::new_pod(1_u32);
        assert!(narrow.assign_from(&wide).is_err());
        assert!(ptr::eq(narrow.descriptor(), &INT16_METADATA));
    }

    #[test]
    fn native_boxes_share_one_object() {
        let drops = Arc::new(AtomicUsize::new(0));
        let boxed = OpaqueBox::native(CountDrops(drops.clone()));
        let object = boxed.native_object().unwrap();

        let copy = boxed.clone();
        assert_eq!(unsafe { HeapObject::strong_count(object.as_ptr()) }, 2);
        assert_eq!(copy.native_object(), Some(object));

        drop(boxed);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(copy);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn move_into_transfers_ownership() {
        let drops = Arc::new(AtomicUsize::new(0));
        let boxed = OpaqueBox::native(CountDrops(drops.clone()));
        let mut out: *mut HeapObject = ptr::null_mut();
        unsafe {
            boxed.move_into(OpaqueValue::erase(&mut out));
            assert_eq!(HeapObject::strong_count(out), 1);
            assert_eq!(drops.load(Ordering::SeqCst), 0);
            crate::native::native_release(out);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bytes_boxes_round_trip_inline_and_out_of_line() {
        let small = OpaqueBox::from_bytes(&[1, 2, 3], 1).unwrap();
        assert_eq!(small.as_bytes(), &[1, 2, 3]);

        let payload: Vec<u8> = (0..100).collect();
        let large = OpaqueBox::from_bytes(&payload, 16).unwrap();
        assert!(!large.descriptor().resolve().fits_inline());
        assert_eq!(large.as_ptr().addr() % 16, 0);
        let copy = large.clone();
        assert_eq!(copy.as_bytes(), payload.as_slice());
        assert_ne!(copy.as_ptr(), large.as_ptr());
    }

    #[test]
    fn from_bytes_validates_alignment() {
        assert!(matches!(
            OpaqueBox::from_bytes(&[0; 4], 3),
            Err(WitnessError::InvalidLayout(_))
        ));
    }

    #[test]
    fn empty_bytes_box() {
        let empty = OpaqueBox::from_bytes(&[], 8).unwrap();
        assert!(empty.as_bytes().is_empty());
        assert!(empty.clone().descriptor().resolve().fits_inline());
    }
}

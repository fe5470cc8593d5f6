//! Native reference counting and foreign hook installation.
//!
//! A C object joins the native model by starting with a `HeapObject` header
//! (destroy hook, then atomic strong count) and a count of one.

use witness_table::{
    install_foreign_hooks, native_release, native_retain, ForeignHooks, ForeignReleaseFn,
    ForeignRetainFn, HeapObject,
};

use crate::status::WitnessStatus;

/// Install the foreign runtime's retain/release pair. Write-once.
///
/// Returns `ForeignHooksInstalled` if hooks are already present and
/// `InvalidArgument` if either function is null.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn witness_install_foreign_hooks(
    retain: Option<ForeignRetainFn>,
    release: Option<ForeignReleaseFn>,
) -> i32 {
    ffi_guard!({
        let (Some(retain), Some(release)) = (retain, release) else {
            return WitnessStatus::InvalidArgument as i32;
        };
        match install_foreign_hooks(ForeignHooks { retain, release }) {
            Ok(()) => WitnessStatus::Ok as i32,
            Err(e) => WitnessStatus::from(&e) as i32,
        }
    })
}

/// Increment a native object's strong count. Null is ignored.
///
/// # Safety
///
/// `object` is null or a live native object.
#[no_mangle]
#[allow(unsafe_code)]
pub unsafe extern "C" fn witness_native_retain(object: *mut HeapObject) -> *mut HeapObject {
    // SAFETY: forwarded contract.
    unsafe { native_retain(object) }
}

/// Decrement a native object's strong count, destroying it at zero. Null is
/// ignored.
///
/// # Safety
///
/// `object` is null or a live native object whose share the caller owns.
#[no_mangle]
#[allow(unsafe_code)]
pub unsafe extern "C" fn witness_native_release(object: *mut HeapObject) {
    // SAFETY: forwarded contract.
    unsafe { native_release(object) }
}

/// Current strong count of a native object, or 0 for null.
///
/// # Safety
///
/// `object` is null or a live native object.
#[no_mangle]
#[allow(unsafe_code)]
pub unsafe extern "C" fn witness_native_strong_count(object: *const HeapObject) -> usize {
    if object.is_null() {
        return 0;
    }
    // SAFETY: forwarded contract.
    unsafe { HeapObject::strong_count(object) }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use std::ptr;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use witness_table::{ForeignObject, HeapBox};

    #[test]
    fn native_round_trip_through_c_entry_points() {
        static DESTROYED: AtomicBool = AtomicBool::new(false);

        unsafe extern "C" fn destroy(object: *mut HeapObject) {
            DESTROYED.store(true, Ordering::SeqCst);
            drop(unsafe { Box::from_raw(object) });
        }

        let object = Box::into_raw(Box::new(HeapObject::new(destroy)));
        unsafe {
            assert_eq!(witness_native_retain(object), object);
            assert_eq!(witness_native_strong_count(object), 2);
            witness_native_release(object);
            assert_eq!(witness_native_strong_count(object), 1);
            assert!(!DESTROYED.load(Ordering::SeqCst));
            witness_native_release(object);
        }
        assert!(DESTROYED.load(Ordering::SeqCst));
    }

    #[test]
    fn heap_box_objects_are_native_objects() {
        let object = HeapBox::allocate(5_u64).as_ptr();
        unsafe {
            assert_eq!(witness_native_strong_count(object), 1);
            witness_native_release(object);
        }
    }

    #[test]
    fn null_objects_are_ignored() {
        unsafe {
            assert!(witness_native_retain(ptr::null_mut()).is_null());
            witness_native_release(ptr::null_mut());
            assert_eq!(witness_native_strong_count(ptr::null()), 0);
        }
    }

    #[test]
    fn foreign_hooks_install_once() {
        unsafe extern "C" fn retain(object: *mut ForeignObject) -> *mut ForeignObject {
            object
        }
        unsafe extern "C" fn release(_object: *mut ForeignObject) {}

        assert_eq!(
            witness_install_foreign_hooks(None, Some(release)),
            WitnessStatus::InvalidArgument as i32
        );
        assert_eq!(
            witness_install_foreign_hooks(Some(retain), Some(release)),
            WitnessStatus::Ok as i32
        );
        assert_eq!(
            witness_install_foreign_hooks(Some(retain), Some(release)),
            WitnessStatus::ForeignHooksInstalled as i32
        );
    }
}

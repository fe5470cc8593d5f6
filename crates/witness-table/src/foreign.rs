//! The foreign object model: references counted by an external runtime.
//!
//! Foreign objects are never inspected here. Their retain/release primitives
//! are supplied once per process through [`install_foreign_hooks`]; the
//! [`FOREIGN_OBJECT`] table calls only those hooks and never the native ones.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::{PhantomData, PhantomPinned};
use std::sync::OnceLock;

use witness_core::WitnessError;

use crate::refcount::{RefCountDomain, RefCounted};
use crate::table::WitnessTable;

/// An object owned by the foreign runtime. Only used behind pointers.
#[repr(C)]
pub struct ForeignObject {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// Foreign retain: increments the count and returns the same pointer.
pub type ForeignRetainFn = unsafe extern "C" fn(object: *mut ForeignObject) -> *mut ForeignObject;

/// Foreign release: decrements the count, freeing the object at zero.
pub type ForeignReleaseFn = unsafe extern "C" fn(object: *mut ForeignObject);

/// The foreign runtime's reference-counting entry points.
///
/// Both must be thread-safe and must accept null.
#[derive(Clone, Copy)]
pub struct ForeignHooks {
    /// Increment.
    pub retain: ForeignRetainFn,
    /// Decrement and free at zero.
    pub release: ForeignReleaseFn,
}

impl fmt::Debug for ForeignHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignHooks")
            .field("retain", &(self.retain as *const ()))
            .field("release", &(self.release as *const ()))
            .finish()
    }
}

static FOREIGN_HOOKS: OnceLock<ForeignHooks> = OnceLock::new();

/// Install the foreign runtime's hooks. Write-once per process.
pub fn install_foreign_hooks(hooks: ForeignHooks) -> Result<(), WitnessError> {
    FOREIGN_HOOKS
        .set(hooks)
        .map_err(|_| WitnessError::ForeignHooksInstalled)
}

/// The installed hooks, if any.
pub fn foreign_hooks() -> Option<&'static ForeignHooks> {
    FOREIGN_HOOKS.get()
}

fn installed_hooks() -> &'static ForeignHooks {
    match FOREIGN_HOOKS.get() {
        Some(hooks) => hooks,
        None => panic!("foreign object used before install_foreign_hooks"),
    }
}

/// The foreign reference-counting domain.
#[derive(Debug)]
pub enum ForeignDomain {}

// SAFETY: the installed hooks carry the domain contract.
unsafe impl RefCountDomain for ForeignDomain {
    type Object = ForeignObject;

    #[inline]
    unsafe fn retain(object: *mut ForeignObject) -> *mut ForeignObject {
        // SAFETY: forwarded contract.
        unsafe { (installed_hooks().retain)(object) }
    }

    #[inline]
    unsafe fn release(object: *mut ForeignObject) {
        // SAFETY: forwarded contract.
        unsafe { (installed_hooks().release)(object) }
    }
}

/// Witness table for a strong reference to a foreign object.
pub static FOREIGN_OBJECT: WitnessTable = WitnessTable::of::<RefCounted<ForeignDomain>>();

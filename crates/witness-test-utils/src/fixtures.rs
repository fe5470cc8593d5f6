//! Counting foreign-object fixtures.
//!
//! Foreign hooks are write-once per process, so every test binary that
//! touches the foreign table should go through
//! [`install_counting_foreign_hooks`], which installs [`counting_retain`] and
//! [`counting_release`] on first use and is a no-op afterwards.
//!
//! [`CountedForeign`] records its own retains and releases. Instead of being
//! freed at zero it is only marked, so tests can inspect it afterwards.

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use witness_table::{foreign_hooks, install_foreign_hooks, ForeignHooks, ForeignObject};

/// A foreign object that counts the hook calls made on it.
#[repr(C)]
#[derive(Debug)]
pub struct CountedForeign {
    strong: AtomicUsize,
    retains: AtomicUsize,
    releases: AtomicUsize,
    freed: AtomicBool,
}

impl CountedForeign {
    /// An object with a strong count of one.
    pub fn new() -> Self {
        Self {
            strong: AtomicUsize::new(1),
            retains: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            freed: AtomicBool::new(false),
        }
    }

    /// The object as the foreign runtime would hand it out.
    pub fn as_foreign(&self) -> *mut ForeignObject {
        (self as *const Self).cast_mut().cast()
    }

    pub fn strong(&self) -> usize {
        self.strong.load(Ordering::SeqCst)
    }

    pub fn retains(&self) -> usize {
        self.retains.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Whether the count has reached zero.
    pub fn freed(&self) -> bool {
        self.freed.load(Ordering::SeqCst)
    }
}

impl Default for CountedForeign {
    fn default() -> Self {
        Self::new()
    }
}

/// Foreign retain over [`CountedForeign`].
///
/// # Safety
///
/// `object` is null or points at a live [`CountedForeign`].
#[allow(unsafe_code)]
pub unsafe extern "C" fn counting_retain(object: *mut ForeignObject) -> *mut ForeignObject {
    // SAFETY: caller passes null or a live `CountedForeign`.
    if let Some(counted) = unsafe { object.cast::<CountedForeign>().as_ref() } {
        counted.retains.fetch_add(1, Ordering::SeqCst);
        counted.strong.fetch_add(1, Ordering::SeqCst);
    }
    object
}

/// Foreign release over [`CountedForeign`].
///
/// # Safety
///
/// `object` is null or points at a live [`CountedForeign`].
#[allow(unsafe_code)]
pub unsafe extern "C" fn counting_release(object: *mut ForeignObject) {
    // SAFETY: caller passes null or a live `CountedForeign`.
    if let Some(counted) = unsafe { object.cast::<CountedForeign>().as_ref() } {
        counted.releases.fetch_add(1, Ordering::SeqCst);
        if counted.strong.fetch_sub(1, Ordering::SeqCst) == 1 {
            counted.freed.store(true, Ordering::SeqCst);
        }
    }
}

/// The counting hook pair.
pub fn counting_hooks() -> ForeignHooks {
    ForeignHooks {
        retain: counting_retain,
        release: counting_release,
    }
}

/// Whether the process-wide foreign hooks are the counting pair.
pub fn counting_hooks_installed() -> bool {
    let expected = counting_hooks();
    foreign_hooks().is_some_and(|hooks| {
        ptr::fn_addr_eq(hooks.retain, expected.retain)
            && ptr::fn_addr_eq(hooks.release, expected.release)
    })
}

/// Install the counting hooks unless they already are.
///
/// # Panics
///
/// If different hooks were installed first.
pub fn install_counting_foreign_hooks() {
    // A lost race still leaves our hooks installed, which the check below accepts.
    let _ = install_foreign_hooks(counting_hooks());
    assert!(
        counting_hooks_installed(),
        "foreign hooks were installed by someone else"
    );
}

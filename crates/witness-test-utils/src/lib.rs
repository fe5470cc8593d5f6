//! Test utilities and mock types for Witness development.
//!
//! Provides [`MockDomain`], a reference-counting domain that journals every
//! retain and release on the current thread, plus counting foreign hooks in
//! [`fixtures`] for exercising the foreign object table.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::RefCell;
use std::sync::atomic::{AtomicIsize, Ordering};

use smallvec::SmallVec;
use witness_table::{RefCountDomain, RefCounted, TypeDescriptor, WitnessTable};

/// One journaled call into [`MockDomain`], with the count it left behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefEvent {
    Retain { id: u32, count: isize },
    Release { id: u32, count: isize },
}

thread_local! {
    static EVENTS: RefCell<SmallVec<[RefEvent; 8]>> = RefCell::new(SmallVec::new());
}

fn record(event: RefEvent) {
    EVENTS.with(|events| events.borrow_mut().push(event));
}

/// Drain the current thread's journal.
pub fn take_events() -> SmallVec<[RefEvent; 8]> {
    EVENTS.with(|events| std::mem::take(&mut *events.borrow_mut()))
}

/// A counted object for [`MockDomain`].
///
/// Never freed by the domain; the count is allowed to go to zero (and below)
/// so tests can assert on it afterwards.
#[derive(Debug)]
pub struct MockObject {
    id: u32,
    count: AtomicIsize,
}

impl MockObject {
    /// An object with a count of one.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            count: AtomicIsize::new(1),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn count(&self) -> isize {
        self.count.load(Ordering::SeqCst)
    }

    /// The object as a domain pointer, for storing in a value slot.
    pub fn as_ptr(&self) -> *mut MockObject {
        (self as *const MockObject).cast_mut()
    }
}

/// Journaling reference-counting domain over [`MockObject`].
#[derive(Debug)]
pub enum MockDomain {}

// SAFETY: counts are atomic, null is ignored, and objects are never freed.
#[allow(unsafe_code)]
unsafe impl RefCountDomain for MockDomain {
    type Object = MockObject;

    unsafe fn retain(object: *mut MockObject) -> *mut MockObject {
        // SAFETY: caller passes null or a live object.
        if let Some(object) = unsafe { object.as_ref() } {
            let count = object.count.fetch_add(1, Ordering::SeqCst) + 1;
            record(RefEvent::Retain { id: object.id, count });
        }
        object
    }

    unsafe fn release(object: *mut MockObject) {
        // SAFETY: caller passes null or a live object.
        if let Some(object) = unsafe { object.as_ref() } {
            let count = object.count.fetch_sub(1, Ordering::SeqCst) - 1;
            record(RefEvent::Release { id: object.id, count });
        }
    }
}

/// Witness table for a reference into [`MockDomain`].
pub static MOCK_TABLE: WitnessTable = WitnessTable::of::<RefCounted<MockDomain>>();

/// Descriptor for [`MOCK_TABLE`].
pub static MOCK_DESCRIPTOR: TypeDescriptor = TypeDescriptor::opaque(&MOCK_TABLE);

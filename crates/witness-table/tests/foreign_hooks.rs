//! Integration test: the foreign object table calls only the installed hooks.
//!
//! Hooks are process-wide, so every test installs the counting pair through
//! the idempotent fixture and asserts on per-object counters only.

use std::ptr;

use witness_core::WitnessError;
use witness_table::{
    foreign_hooks, install_foreign_hooks, lookup_builtin, ForeignObject, OpaqueBox, OpaqueValue,
    ValueBuffer, FOREIGN_OBJECT, FOREIGN_OBJECT_METADATA,
};
use witness_test_utils::fixtures::{
    counting_hooks, counting_hooks_installed, install_counting_foreign_hooks, CountedForeign,
};

fn slot(reference: &mut *mut ForeignObject) -> *mut OpaqueValue {
    OpaqueValue::erase(reference as *mut *mut ForeignObject)
}

#[test]
fn second_install_is_rejected() {
    install_counting_foreign_hooks();
    assert_eq!(
        install_foreign_hooks(counting_hooks()),
        Err(WitnessError::ForeignHooksInstalled)
    );
    assert!(counting_hooks_installed());
    assert!(foreign_hooks().is_some());
}

#[test]
fn copy_and_destroy_go_through_hooks() {
    install_counting_foreign_hooks();
    let object = CountedForeign::new();
    let mut original = object.as_foreign();
    let mut copy: *mut ForeignObject = ptr::null_mut();

    unsafe {
        FOREIGN_OBJECT.initialize_with_copy(slot(&mut copy), slot(&mut original));
        assert_eq!(object.strong(), 2);
        FOREIGN_OBJECT.destroy(slot(&mut copy));
    }

    assert_eq!(object.retains(), 1);
    assert_eq!(object.releases(), 1);
    assert_eq!(object.strong(), 1);
    assert!(!object.freed());
}

#[test]
fn self_assignment_keeps_object_alive() {
    install_counting_foreign_hooks();
    let object = CountedForeign::new();
    let mut reference = object.as_foreign();

    unsafe {
        let value = slot(&mut reference);
        FOREIGN_OBJECT.assign_with_copy(value, value);
    }

    assert_eq!(object.strong(), 1);
    assert!(!object.freed());
}

#[test]
fn last_release_frees() {
    install_counting_foreign_hooks();
    let object = CountedForeign::new();
    let mut reference = object.as_foreign();
    let mut buffer = ValueBuffer::new();

    unsafe {
        FOREIGN_OBJECT.initialize_buffer_with_take(buffer.as_mut_ptr(), slot(&mut reference));
        FOREIGN_OBJECT.destroy_buffer(buffer.as_mut_ptr());
    }

    assert_eq!(object.retains(), 0);
    assert_eq!(object.releases(), 1);
    assert!(object.freed());
}

#[test]
fn boxed_foreign_reference_balances() {
    install_counting_foreign_hooks();
    let descriptor = lookup_builtin("BO").unwrap();
    assert!(ptr::eq(descriptor, &FOREIGN_OBJECT_METADATA));

    let object = CountedForeign::new();
    let reference = object.as_foreign();
    {
        let boxed = unsafe { OpaqueBox::copy_from(descriptor, OpaqueValue::erase_const(&reference)) };
        let _clone = boxed.clone();
        assert_eq!(object.strong(), 3);
    }
    assert_eq!(object.strong(), 1);
    assert_eq!(object.retains(), object.releases());
}

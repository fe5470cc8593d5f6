//! Integration test: drive the foreign table entirely through the C API.
//!
//! Installs the counting hooks with `witness_install_foreign_hooks`, finds
//! the foreign descriptor by name, and runs copy/destroy through the
//! resolved table the way a C caller would.

use std::ptr;

use witness_ffi::{
    witness_descriptor_resolve, witness_install_foreign_hooks, witness_lookup_builtin,
    WitnessStatus,
};
use witness_table::{ForeignObject, OpaqueValue, TypeDescriptor, ValueBuffer};
use witness_test_utils::fixtures::{counting_release, counting_retain, CountedForeign};

#[test]
fn foreign_copy_and_destroy_through_resolved_table() {
    assert_eq!(
        witness_install_foreign_hooks(Some(counting_retain), Some(counting_release)),
        WitnessStatus::Ok as i32
    );

    let mut descriptor: *const TypeDescriptor = ptr::null();
    assert_eq!(
        witness_lookup_builtin(c"BO".as_ptr(), &mut descriptor),
        WitnessStatus::Ok as i32
    );
    let table = unsafe { &*witness_descriptor_resolve(descriptor) };

    let object = CountedForeign::new();
    let reference: *mut ForeignObject = object.as_foreign();
    let mut buffer = ValueBuffer::new();
    unsafe {
        table.initialize_buffer_with_copy(buffer.as_mut_ptr(), OpaqueValue::erase_const(&reference));
        assert_eq!(object.strong(), 2);
        table.destroy_buffer(buffer.as_mut_ptr());
    }

    assert_eq!(object.retains(), 1);
    assert_eq!(object.releases(), 1);
    assert_eq!(object.strong(), 1);
    assert!(!object.freed());
}

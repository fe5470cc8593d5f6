//! C-compatible status codes.
//!
//! [`WitnessStatus`] is a `repr(i32)` enum covering every error the C API
//! can report. Conversion from [`WitnessError`] is provided.

use witness_core::WitnessError;

/// C-compatible status code returned by fallible FFI functions.
///
/// `Ok` = 0, all errors are negative. Values are ABI-stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WitnessStatus {
    /// Success.
    Ok = 0,
    /// An argument is null, not UTF-8, or otherwise invalid.
    InvalidArgument = -1,
    /// Size and alignment do not form a valid layout.
    InvalidLayout = -2,
    /// Out-of-line storage could not be allocated.
    AllocationFailed = -3,
    /// Foreign hooks were already installed.
    ForeignHooksInstalled = -4,
    /// Values managed by different descriptors were combined.
    TypeMismatch = -5,
    /// No builtin type has the given name.
    UnknownBuiltin = -6,
    /// The handle is unknown or its object was already destroyed.
    InvalidHandle = -7,
    /// A Rust panic was caught at the FFI boundary.
    Panicked = -128,
}

impl From<&WitnessError> for WitnessStatus {
    fn from(e: &WitnessError) -> Self {
        match e {
            WitnessError::InvalidLayout(_) => WitnessStatus::InvalidLayout,
            WitnessError::AllocationFailure { .. } => WitnessStatus::AllocationFailed,
            WitnessError::ForeignHooksInstalled => WitnessStatus::ForeignHooksInstalled,
            WitnessError::TypeMismatch { .. } => WitnessStatus::TypeMismatch,
            WitnessError::UnknownBuiltin { .. } => WitnessStatus::UnknownBuiltin,
        }
    }
}

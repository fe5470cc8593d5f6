//! Error types for witness-table construction and configuration.
//!
//! Witness operations themselves are total over well-formed input and never
//! return errors. The enums here cover the fallible edges around them:
//! validating a layout before a table is built, installing foreign hooks,
//! and the checked paths of the opaque box and the C ABI.

use std::error::Error;
use std::fmt;

/// A size/alignment/stride triple that cannot describe a value type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// Alignment was zero.
    ZeroAlignment,
    /// Alignment was not a power of two.
    AlignmentNotPowerOfTwo {
        /// The rejected alignment.
        alignment: usize,
    },
    /// Stride was smaller than size, so adjacent elements would overlap.
    StrideTooSmall {
        /// Size of one value in bytes.
        size: usize,
        /// The rejected stride.
        stride: usize,
    },
    /// Stride was not a multiple of alignment.
    StrideMisaligned {
        /// The rejected stride.
        stride: usize,
        /// Required alignment.
        alignment: usize,
    },
    /// Rounding size up to alignment overflowed `isize::MAX`.
    SizeOverflow {
        /// Size of one value in bytes.
        size: usize,
        /// Required alignment.
        alignment: usize,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroAlignment => write!(f, "alignment must be non-zero"),
            Self::AlignmentNotPowerOfTwo { alignment } => {
                write!(f, "alignment {alignment} is not a power of two")
            }
            Self::StrideTooSmall { size, stride } => {
                write!(f, "stride {stride} is smaller than size {size}")
            }
            Self::StrideMisaligned { stride, alignment } => {
                write!(f, "stride {stride} is not a multiple of alignment {alignment}")
            }
            Self::SizeOverflow { size, alignment } => {
                write!(
                    f,
                    "size {size} rounded up to alignment {alignment} overflows isize::MAX"
                )
            }
        }
    }
}

impl Error for LayoutError {}

/// Errors from the fallible edges of the witness runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WitnessError {
    /// A runtime layout failed validation.
    InvalidLayout(LayoutError),
    /// Out-of-line storage for a value could not be allocated.
    AllocationFailure {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment in bytes.
        alignment: usize,
    },
    /// Foreign reference-counting hooks were already installed.
    ///
    /// Hooks are write-once for the lifetime of the process.
    ForeignHooksInstalled,
    /// Two values managed by different descriptors were combined.
    TypeMismatch {
        /// The operation that rejected the pair.
        operation: &'static str,
    },
    /// No builtin descriptor is registered under the given symbol name.
    UnknownBuiltin {
        /// The name that was looked up.
        name: String,
    },
}

impl fmt::Display for WitnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLayout(err) => write!(f, "invalid layout: {err}"),
            Self::AllocationFailure { size, alignment } => {
                write!(
                    f,
                    "failed to allocate {size} bytes aligned to {alignment} for out-of-line value"
                )
            }
            Self::ForeignHooksInstalled => {
                write!(f, "foreign reference-counting hooks are already installed")
            }
            Self::TypeMismatch { operation } => {
                write!(f, "{operation}: values are managed by different descriptors")
            }
            Self::UnknownBuiltin { name } => write!(f, "no builtin type named '{name}'"),
        }
    }
}

impl Error for WitnessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidLayout(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LayoutError> for WitnessError {
    fn from(err: LayoutError) -> Self {
        Self::InvalidLayout(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_error_is_source_of_witness_error() {
        let err = WitnessError::from(LayoutError::ZeroAlignment);
        assert_eq!(err, WitnessError::InvalidLayout(LayoutError::ZeroAlignment));
        let source = err.source().expect("layout errors carry a source");
        assert_eq!(source.to_string(), "alignment must be non-zero");
    }

    #[test]
    fn display_names_the_offending_values() {
        let err = LayoutError::StrideTooSmall { size: 12, stride: 8 };
        assert_eq!(err.to_string(), "stride 8 is smaller than size 12");

        let err = WitnessError::AllocationFailure {
            size: 64,
            alignment: 16,
        };
        assert!(err.to_string().contains("64 bytes aligned to 16"));
    }

    #[test]
    fn unknown_builtin_has_no_source() {
        let err = WitnessError::UnknownBuiltin {
            name: "Bq".to_string(),
        };
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "no builtin type named 'Bq'");
    }
}

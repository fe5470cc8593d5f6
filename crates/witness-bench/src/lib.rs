//! Benchmark profiles for Witness value witness tables.
//!
//! Provides the value populations the criterion benches run over:
//!
//! - [`pod_boxes`]: one boxed value per builtin POD width
//! - [`native_boxes`]: boxes sharing a single native object
//! - [`bytes_profile`]: raw-bytes boxes straddling the inline capacity

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use witness_core::INLINE_BUFFER_BYTES;
use witness_table::OpaqueBox;

/// One box per builtin POD width, holding a recognisable bit pattern.
pub fn pod_boxes() -> Vec<OpaqueBox> {
    vec![
        OpaqueBox::new_pod(0x11_u8),
        OpaqueBox::new_pod(0x1122_u16),
        OpaqueBox::new_pod(0x1122_3344_u32),
        OpaqueBox::new_pod(0x1122_3344_5566_7788_u64),
        OpaqueBox::new_pod(usize::MAX),
    ]
}

/// `count` boxes all referencing the same native object. Empty for zero.
pub fn native_boxes(count: usize) -> Vec<OpaqueBox> {
    if count == 0 {
        return Vec::new();
    }
    let first = OpaqueBox::native([0_u64; 4]);
    let mut boxes = Vec::with_capacity(count);
    boxes.extend((1..count).map(|_| first.clone()));
    boxes.push(first);
    boxes
}

/// Raw-bytes boxes just under, at, and well over the inline capacity.
///
/// Returns `(label, box)` pairs so benches can name their groups.
pub fn bytes_profile() -> Vec<(&'static str, OpaqueBox)> {
    let sizes = [
        ("inline_half", INLINE_BUFFER_BYTES / 2),
        ("inline_full", INLINE_BUFFER_BYTES),
        ("indirect_64", 64),
        ("indirect_4k", 4096),
    ];
    sizes
        .into_iter()
        .map(|(label, size)| {
            let payload: Vec<u8> = (0..size).map(|i| i as u8).collect();
            match OpaqueBox::from_bytes(&payload, 8) {
                Ok(boxed) => (label, boxed),
                Err(e) => panic!("benchmark layout {label} rejected: {e}"),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_build() {
        assert_eq!(pod_boxes().len(), 5);
        let natives = native_boxes(3);
        assert_eq!(natives.len(), 3);
        assert_eq!(natives[0].native_object(), natives[2].native_object());
        assert!(native_boxes(0).is_empty());
        assert_eq!(native_boxes(1).len(), 1);

        let bytes = bytes_profile();
        assert!(bytes[1].1.descriptor().resolve().fits_inline());
        assert!(!bytes[2].1.descriptor().resolve().fits_inline());
    }
}

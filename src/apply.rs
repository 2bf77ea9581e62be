//! Patch application and read-back verification.
//!
//! The whole batch is validated before the first byte is written: a
//! rejected batch leaves the firmware untouched. The image is mutated in
//! place and never resized.

use crate::error::PatchError;
use crate::patch::Patch;

/// Validate the batch, then write every patch into the firmware.
///
/// Patches are processed in ascending target order; writes are
/// non-overlapping by construction, so the order only matters for
/// deterministic logging.
pub fn apply(firmware: &mut [u8], patches: &[Patch]) -> Result<(), PatchError> {
    let mut ordered: Vec<&Patch> = patches.iter().collect();
    ordered.sort_by_key(|patch| patch.target_address);

    for patch in &ordered {
        if patch.data.is_empty() {
            return Err(PatchError::EmptyPatch {
                name: patch.name().to_string(),
            });
        }
        if patch.declared_size() != patch.data.len() {
            return Err(PatchError::SizeMismatch {
                name: patch.name().to_string(),
                declared: patch.declared_size(),
                actual: patch.data.len(),
            });
        }
    }

    for pair in ordered.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        let current_end = current.target_address as u64 + current.data.len() as u64;
        if current_end > next.target_address as u64 {
            return Err(PatchError::OverlappingPatches {
                first: current.name().to_string(),
                second: next.name().to_string(),
                address: next.target_address,
            });
        }
    }

    for patch in &ordered {
        let end = patch.target_address as u64 + patch.data.len() as u64;
        if end > firmware.len() as u64 {
            return Err(PatchError::OutOfBounds {
                name: patch.name().to_string(),
                target: patch.target_address,
                size: patch.data.len(),
                len: firmware.len(),
            });
        }
    }

    for patch in &ordered {
        let start = patch.target_address as usize;
        firmware[start..start + patch.data.len()].copy_from_slice(&patch.data);
        tracing::info!(
            "patch {}: wrote {} byte(s) at {:#x}",
            patch.name(),
            patch.data.len(),
            patch.target_address
        );
    }
    Ok(())
}

/// Read every patch back and compare against its source bytes.
///
/// Runs after `apply` and assumes nothing about it. Each patch is checked
/// independently and reported; the overall result is the conjunction.
pub fn verify(firmware: &[u8], patches: &[Patch]) -> bool {
    let mut ok = true;
    for patch in patches {
        let start = patch.target_address as usize;
        let written = start
            .checked_add(patch.data.len())
            .and_then(|end| firmware.get(start..end));
        match written {
            None => {
                tracing::error!(
                    "patch {}: read back at {:#x} runs past the image",
                    patch.name(),
                    patch.target_address
                );
                ok = false;
            }
            Some(written) if written != patch.data.as_slice() => {
                tracing::error!(
                    "patch {}: firmware contents at {:#x} differ from the patch data",
                    patch.name(),
                    patch.target_address
                );
                ok = false;
            }
            Some(_) => {
                tracing::debug!(
                    "patch {}: verified {} byte(s) at {:#x}",
                    patch.name(),
                    patch.data.len(),
                    patch.target_address
                );
            }
        }
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PatchSection;

    fn patch(name: &str, target: u32, data: &[u8]) -> Patch {
        Patch {
            section: PatchSection {
                name: name.to_string(),
                start_label: format!("PATCH_{name}_START"),
                end_label: format!("PATCH_{name}_END"),
                start_address: target,
                end_address: target + data.len() as u32,
            },
            target_address: target,
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_apply_writes_patches_in_place() {
        let mut firmware = vec![0u8; 0x40];
        let patches = vec![
            patch("B", 0x20, &[0xde, 0xad]),
            patch("A", 0x10, &[0xbe, 0xef]),
        ];

        apply(&mut firmware, &patches).unwrap();

        assert_eq!(&firmware[0x10..0x12], &[0xbe, 0xef]);
        assert_eq!(&firmware[0x20..0x22], &[0xde, 0xad]);
        assert_eq!(firmware.len(), 0x40);
    }

    #[test]
    fn test_apply_rejects_empty_patch() {
        let mut firmware = vec![0u8; 0x40];
        let mut empty = patch("E", 0x10, &[0x01]);
        empty.data.clear();

        let err = apply(&mut firmware, &[empty]).unwrap_err();

        assert_eq!(err, PatchError::EmptyPatch { name: "E".to_string() });
    }

    #[test]
    fn test_apply_rejects_size_mismatch() {
        let mut firmware = vec![0u8; 0x40];
        let mut short = patch("S", 0x10, &[0x01, 0x02, 0x03, 0x04]);
        short.data.truncate(3);

        let err = apply(&mut firmware, &[short]).unwrap_err();

        assert_eq!(
            err,
            PatchError::SizeMismatch {
                name: "S".to_string(),
                declared: 4,
                actual: 3,
            }
        );
        assert!(firmware.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_apply_rejects_single_byte_overlap() {
        let mut firmware = vec![0u8; 0x40];
        let patches = vec![
            patch("A", 0x10, &[0x01, 0x02, 0x03, 0x04]),
            patch("B", 0x13, &[0x05, 0x06]),
        ];

        let err = apply(&mut firmware, &patches).unwrap_err();

        assert_eq!(
            err,
            PatchError::OverlappingPatches {
                first: "A".to_string(),
                second: "B".to_string(),
                address: 0x13,
            }
        );
        assert!(firmware.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_apply_accepts_adjacent_patches() {
        let mut firmware = vec![0u8; 0x40];
        let patches = vec![
            patch("A", 0x10, &[0x01, 0x02, 0x03, 0x04]),
            patch("B", 0x14, &[0x05, 0x06]),
        ];

        apply(&mut firmware, &patches).unwrap();

        assert_eq!(&firmware[0x10..0x16], &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
    }

    #[test]
    fn test_apply_rejects_out_of_bounds_patch() {
        let mut firmware = vec![0u8; 0x20];
        let patches = vec![patch("END", 0x1e, &[0x01, 0x02, 0x03, 0x04])];

        let err = apply(&mut firmware, &patches).unwrap_err();

        assert_eq!(
            err,
            PatchError::OutOfBounds {
                name: "END".to_string(),
                target: 0x1e,
                size: 4,
                len: 0x20,
            }
        );
        // The image is never grown to fit a patch.
        assert_eq!(firmware.len(), 0x20);
        assert!(firmware.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut firmware = vec![0u8; 0x40];
        let patches = vec![
            patch("GOOD", 0x00, &[0xff, 0xff]),
            patch("BAD", 0x3f, &[0x01, 0x02]),
        ];

        let err = apply(&mut firmware, &patches).unwrap_err();

        assert!(matches!(err, PatchError::OutOfBounds { .. }));
        assert!(firmware.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_verify_accepts_applied_patches() {
        let mut firmware = vec![0u8; 0x40];
        let patches = vec![patch("A", 0x10, &[0x0a, 0x0b, 0x0c])];
        apply(&mut firmware, &patches).unwrap();

        assert!(verify(&firmware, &patches));
    }

    #[test]
    fn test_verify_detects_corrupted_byte() {
        let mut firmware = vec![0u8; 0x40];
        let patches = vec![patch("A", 0x10, &[0x0a, 0x0b, 0x0c])];
        apply(&mut firmware, &patches).unwrap();
        firmware[0x11] ^= 0xff;

        assert!(!verify(&firmware, &patches));
    }

    #[test]
    fn test_verify_detects_out_of_range_read() {
        let firmware = vec![0u8; 0x10];
        let patches = vec![patch("A", 0x0e, &[0x0a, 0x0b, 0x0c])];

        assert!(!verify(&firmware, &patches));
    }
}

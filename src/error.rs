//! Typed failure taxonomy for the patch pipeline.
//!
//! Every variant carries the names, addresses, and byte counts needed to
//! diagnose the input without re-running the toolchain. All of these are
//! data-integrity errors: each one aborts the whole batch, there is no
//! partial-apply mode and no retry.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    /// A start marker with no matching end marker in the symbol table.
    #[error("patch {name}: found {start_label} but no matching {end_label}")]
    MissingEndLabel {
        name: String,
        start_label: String,
        end_label: String,
    },

    /// Zero-length or inverted marker pair.
    #[error("patch {name}: invalid range {start:#x}..{end:#x}, end must lie above start")]
    InvalidPatchRange { name: String, start: u32, end: u32 },

    /// The start label could not be resolved to a placement address.
    #[error("patch {name}: start label {label} not present in the symbol table")]
    UnresolvedTargetAddress { name: String, label: String },

    /// The section dumps do not cover the whole marker range.
    #[error(
        "patch {name}: section data for {start:#x}..{end:#x} is incomplete, {missing} byte(s) missing"
    )]
    IncompleteSectionData {
        name: String,
        start: u32,
        end: u32,
        missing: usize,
    },

    #[error("patch {name} carries no data")]
    EmptyPatch { name: String },

    /// Marker-declared size disagrees with the extracted data length.
    #[error("patch {name}: declared size {declared} disagrees with data length {actual}")]
    SizeMismatch {
        name: String,
        declared: usize,
        actual: usize,
    },

    #[error("patches {first} and {second} overlap at {address:#x}")]
    OverlappingPatches {
        first: String,
        second: String,
        address: u32,
    },

    /// The patch would end past the firmware image; the image is never grown.
    #[error("patch {name}: {target:#x}+{size} ends past the firmware image ({len} bytes)")]
    OutOfBounds {
        name: String,
        target: u32,
        size: usize,
        len: usize,
    },

    /// The firmware is too small for a segment declared in its table.
    #[error("checksum segment {index}: end {end:#x} lies past the firmware image ({len} bytes)")]
    SegmentTooSmall { index: usize, end: u32, len: usize },

    #[error("checksum segment {index}: invalid bounds {start:#x}..={end:#x}")]
    InvalidSegmentBounds { index: usize, start: u32, end: u32 },

    /// The segment still sums to a nonzero value after its correction word
    /// was rewritten. Happens only when the correction word cannot reach
    /// the sum, e.g. it lies inside the excluded dynamic-data hole.
    #[error("checksum segment {index}: residual sum {residual:#06x} after repair")]
    RepairFailed { index: usize, residual: u16 },
}

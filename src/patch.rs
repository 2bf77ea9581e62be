//! Patch section identification and extraction.
//!
//! Patch ranges are declared in the assembly source with paired marker
//! labels: `PATCH_<NAME>_START` opens a range and `PATCH_<NAME>_END`
//! closes it. The source must place an origin directive immediately at the
//! start marker, so the marker's own address is also the firmware address
//! the bytes are written to.

use crate::dump::MemoryImage;
use crate::error::PatchError;
use crate::symbol::SymbolTable;

const LABEL_PREFIX: &str = "PATCH_";
const START_SUFFIX: &str = "_START";
const END_SUFFIX: &str = "_END";

/// A named byte range placed by the assembler, before extraction.
///
/// `start_address`/`end_address` describe where the assembler put the
/// bytes; the firmware placement is resolved separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSection {
    pub name: String,
    pub start_label: String,
    pub end_label: String,
    pub start_address: u32,
    /// Exclusive end of the range.
    pub end_address: u32,
}

impl PatchSection {
    /// Number of bytes between the markers.
    pub fn size(&self) -> usize {
        (self.end_address - self.start_address) as usize
    }
}

/// A patch section enriched with its firmware placement and raw bytes.
/// Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub section: PatchSection,
    pub target_address: u32,
    pub data: Vec<u8>,
}

impl Patch {
    pub fn name(&self) -> &str {
        &self.section.name
    }

    /// Size declared by the marker pair, independent of the data length.
    pub fn declared_size(&self) -> usize {
        self.section.size()
    }
}

/// Pair up start/end markers from the symbol table into patch sections,
/// sorted by ascending start address.
///
/// Every start marker must have its end marker and span a non-empty,
/// forward range. A patch name declared twice keeps the later markers and
/// is logged.
pub fn identify(symbols: &SymbolTable) -> Result<Vec<PatchSection>, PatchError> {
    let mut sections: Vec<PatchSection> = Vec::new();
    for sym in symbols.iter() {
        let Some(name) = patch_name(&sym.name) else {
            continue;
        };
        let end_label = format!("{LABEL_PREFIX}{name}{END_SUFFIX}");
        let Some(end) = symbols.lookup(&end_label) else {
            return Err(PatchError::MissingEndLabel {
                name: name.to_string(),
                start_label: sym.name.clone(),
                end_label,
            });
        };
        if end.address <= sym.address {
            return Err(PatchError::InvalidPatchRange {
                name: name.to_string(),
                start: sym.address,
                end: end.address,
            });
        }
        if let Some(previous) = sections.iter().position(|s| s.name == name) {
            tracing::warn!("patch {} declared more than once, keeping the later markers", name);
            sections.remove(previous);
        }
        sections.push(PatchSection {
            name: name.to_string(),
            start_label: sym.name.clone(),
            end_label,
            start_address: sym.address,
            end_address: end.address,
        });
    }
    sections.sort_by_key(|s| s.start_address);
    Ok(sections)
}

fn patch_name(symbol: &str) -> Option<&str> {
    let name = symbol
        .strip_prefix(LABEL_PREFIX)?
        .strip_suffix(START_SUFFIX)?;
    (!name.is_empty()).then_some(name)
}

/// Resolve where a patch lands in the firmware.
///
/// The start marker doubles as the placement address; see the module
/// comment. The lookup can still fail when a caller resolves against a
/// different symbol table than the one the section came from.
pub fn resolve_target(section: &PatchSection, symbols: &SymbolTable) -> Result<u32, PatchError> {
    symbols
        .lookup(&section.start_label)
        .map(|sym| sym.address)
        .ok_or_else(|| PatchError::UnresolvedTargetAddress {
            name: section.name.clone(),
            label: section.start_label.clone(),
        })
}

/// Pull a section's bytes out of the sparse image.
///
/// The whole half-open range must be covered; a single missing address
/// fails the extraction. Partial or zero-filled results are never
/// returned.
pub fn extract(section: &PatchSection, image: &MemoryImage) -> Result<Vec<u8>, PatchError> {
    let mut data = Vec::with_capacity(section.size());
    let mut missing = 0usize;
    for address in section.start_address..section.end_address {
        match image.get(&address) {
            Some(byte) => data.push(*byte),
            None => missing += 1,
        }
    }
    if missing > 0 {
        return Err(PatchError::IncompleteSectionData {
            name: section.name.clone(),
            start: section.start_address,
            end: section.end_address,
            missing,
        });
    }
    Ok(data)
}

/// Run target resolution and extraction over every identified section.
pub fn build_patches(
    sections: Vec<PatchSection>,
    symbols: &SymbolTable,
    image: &MemoryImage,
) -> Result<Vec<Patch>, PatchError> {
    sections
        .into_iter()
        .map(|section| {
            let target_address = resolve_target(&section, symbols)?;
            let data = extract(&section, image)?;
            tracing::debug!(
                "patch {}: {} byte(s) destined for {:#x}",
                section.name,
                data.len(),
                target_address
            );
            Ok(Patch {
                section,
                target_address,
                data,
            })
        })
        .collect()
}

//! Core patch pipeline.
//!
//! This module contains the `Patcher` struct which orchestrates the entire
//! patching process:
//! 1. Assemble: runs the toolchain on the patch source.
//! 2. Dump: reads symbols and section contents from the object.
//! 3. Identify: pairs the patch markers and resolves placements.
//! 4. Extract: pulls the patch bytes out of the section dumps.
//! 5. Apply: writes the patches into the firmware and verifies by read back.
//! 6. Repair: restores the firmware checksum table.

use anyhow::{Context, Result};
use std::path::Path;

use crate::apply;
use crate::checksum::{self, ChecksumLayout, SegmentRepair};
use crate::dump;
use crate::patch::{self, Patch};
use crate::symbol::SymbolTable;
use crate::toolchain::Toolchain;

/// Outcome summary handed back to the caller for reporting.
#[derive(Debug)]
pub struct PatchReport {
    pub patches: Vec<Patch>,
    /// Result of the read-back pass; `true` when skipped.
    pub verified: bool,
    pub repairs: Vec<SegmentRepair>,
}

pub struct Patcher<T: Toolchain> {
    toolchain: T,
    layout: ChecksumLayout,
    verify: bool,
}

impl<T: Toolchain> Patcher<T> {
    pub fn new(toolchain: T, layout: ChecksumLayout, verify: bool) -> Self {
        Self {
            toolchain,
            layout,
            verify,
        }
    }

    /// Run the whole pipeline, mutating `firmware` in place.
    ///
    /// Any stage failure aborts the run; the batch is all-or-nothing and
    /// a failed run must not be written out by the caller.
    pub fn run(&self, source: &Path, firmware: &mut [u8]) -> Result<PatchReport> {
        let object_path = self
            .toolchain
            .assemble(source)
            .with_context(|| format!("failed to assemble {}", source.display()))?;
        let symbols = self
            .toolchain
            .dump_symbols(&object_path)
            .with_context(|| format!("failed to dump symbols of {}", object_path.display()))?;
        let dumps = self
            .toolchain
            .dump_sections(&object_path)
            .with_context(|| format!("failed to dump sections of {}", object_path.display()))?;
        tracing::debug!("{} symbol(s), {} section dump(s)", symbols.len(), dumps.len());

        let table = SymbolTable::new(symbols);
        let image = dump::parse_section_dumps(&dumps);

        let sections = patch::identify(&table)?;
        if sections.is_empty() {
            anyhow::bail!("no patch sections declared in {}", source.display());
        }
        tracing::info!("{} patch section(s) identified", sections.len());
        let patches = patch::build_patches(sections, &table, &image)?;

        apply::apply(firmware, &patches)?;
        let verified = if self.verify {
            apply::verify(firmware, &patches)
        } else {
            true
        };
        if !verified {
            anyhow::bail!("read-back verification failed");
        }

        let repairs = checksum::repair(firmware, &self.layout)?;

        Ok(PatchReport {
            patches,
            verified,
            repairs,
        })
    }
}

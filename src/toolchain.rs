//! External assembler toolchain.
//!
//! The core never talks to the toolchain directly; it consumes symbols and
//! section dumps through the `Toolchain` trait, so tests can substitute
//! in-memory fixtures without spawning processes. The production
//! implementation shells out to the configured assembler and objdump and
//! reads symbols straight from the assembled object with the `object`
//! crate.

use anyhow::{bail, Context, Result};
use memmap2::Mmap;
use object::read::{Object, ObjectSection, ObjectSymbol};
use object::SectionKind;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::symbol::{Symbol, SymbolKind};

/// Access to the assembler toolchain.
pub trait Toolchain {
    /// Assemble the patch source, returning the path of the object file.
    fn assemble(&self, source: &Path) -> Result<PathBuf>;

    /// Dump the symbol list of an assembled object.
    fn dump_symbols(&self, object_path: &Path) -> Result<Vec<Symbol>>;

    /// Dump every section's contents as hex text, keyed by section name.
    fn dump_sections(&self, object_path: &Path) -> Result<BTreeMap<String, String>>;
}

/// Toolchain that invokes the real assembler and section-dump binaries.
pub struct ExternalToolchain {
    assembler: String,
    objdump: String,
    work_dir: PathBuf,
}

impl ExternalToolchain {
    pub fn new(assembler: &str, objdump: &str, work_dir: PathBuf) -> Self {
        Self {
            assembler: assembler.to_string(),
            objdump: objdump.to_string(),
            work_dir,
        }
    }
}

impl Toolchain for ExternalToolchain {
    fn assemble(&self, source: &Path) -> Result<PathBuf> {
        let stem = source
            .file_stem()
            .with_context(|| format!("no file name in {}", source.display()))?;
        let object_path = self.work_dir.join(stem).with_extension("o");

        let output = Command::new(&self.assembler)
            .arg(source)
            .arg("-o")
            .arg(&object_path)
            .output()
            .with_context(|| format!("failed to run assembler {}", self.assembler))?;
        if !output.status.success() {
            bail!(
                "{} failed on {}:\n{}",
                self.assembler,
                source.display(),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        tracing::debug!("assembled {} -> {}", source.display(), object_path.display());
        Ok(object_path)
    }

    fn dump_symbols(&self, object_path: &Path) -> Result<Vec<Symbol>> {
        let file = File::open(object_path)
            .with_context(|| format!("failed to open {}", object_path.display()))?;
        let mmap = unsafe { Mmap::map(&file)? };
        let obj = object::File::parse(&*mmap).context("failed to parse object file")?;

        let mut symbols = Vec::new();
        for sym in obj.symbols() {
            let name = sym.name()?;
            if name.is_empty() {
                continue;
            }
            symbols.push(Symbol::new(name, sym.address() as u32, classify(&obj, &sym)));
        }
        Ok(symbols)
    }

    fn dump_sections(&self, object_path: &Path) -> Result<BTreeMap<String, String>> {
        let output = Command::new(&self.objdump)
            .arg("-s")
            .arg(object_path)
            .output()
            .with_context(|| format!("failed to run {}", self.objdump))?;
        if !output.status.success() {
            bail!(
                "{} -s failed on {}:\n{}",
                self.objdump,
                object_path.display(),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(split_section_dumps(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Map an object symbol onto the dump classification.
fn classify(obj: &object::File, sym: &object::Symbol) -> SymbolKind {
    if sym.is_undefined() {
        return SymbolKind::Undefined;
    }
    let Some(index) = sym.section_index() else {
        return SymbolKind::Absolute;
    };
    match obj.section_by_index(index).map(|section| section.kind()) {
        Ok(SectionKind::Text) => SymbolKind::Text,
        Ok(SectionKind::Data | SectionKind::ReadOnlyData | SectionKind::ReadOnlyString) => {
            SymbolKind::Data
        }
        Ok(SectionKind::UninitializedData) => SymbolKind::Bss,
        _ => SymbolKind::Unknown,
    }
}

/// Split `objdump -s` output into per-section dump text.
///
/// Content lines are indented by one space; they are left-trimmed so the
/// dump parser sees the address at column zero.
fn split_section_dumps(text: &str) -> BTreeMap<String, String> {
    let mut dumps: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<String> = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("Contents of section ") {
            current = Some(rest.trim_end_matches(':').to_string());
            continue;
        }
        if let Some(name) = &current {
            let dump = dumps.entry(name.clone()).or_default();
            dump.push_str(line.trim_start());
            dump.push('\n');
        }
    }
    dumps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_section_dumps() {
        let text = "\n\
                    patches.o:     file format elf32-m68k\n\
                    \n\
                    Contents of section .text:\n\
                    \x20a0000 1900028d 028d028d  ........\n\
                    Contents of section .data:\n\
                    \x20a0020 1234  .4\n";

        let dumps = split_section_dumps(text);

        assert_eq!(dumps.len(), 2);
        assert_eq!(
            dumps.get(".text").map(String::as_str),
            Some("a0000 1900028d 028d028d  ........\n")
        );
        assert_eq!(dumps.get(".data").map(String::as_str), Some("a0020 1234  .4\n"));
    }
}

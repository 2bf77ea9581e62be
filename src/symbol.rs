//! Symbol table management.
//!
//! Tracks the symbols dumped from the assembled patch object and resolves
//! label lookups for patch identification and target addressing.

use std::collections::HashMap;

/// Classification of a symbol, as reported by the toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Text,
    Data,
    Bss,
    Absolute,
    Undefined,
    Unknown,
}

/// A symbol from the assembled patch object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    /// Address the assembler placed the symbol at.
    pub address: u32,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn new(name: impl Into<String>, address: u32, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            address,
            kind,
        }
    }
}

/// Index over the dumped symbols.
///
/// Keeps the symbols sorted by ascending address for deterministic
/// iteration and a by-name map for label lookups, instead of scanning the
/// raw list for every query. Duplicate names keep the last definition in
/// address order.
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    by_name: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new(mut symbols: Vec<Symbol>) -> Self {
        symbols.sort_by_key(|sym| sym.address);
        let mut by_name = HashMap::with_capacity(symbols.len());
        for (index, sym) in symbols.iter().enumerate() {
            if by_name.insert(sym.name.clone(), index).is_some() {
                tracing::warn!(
                    "duplicate symbol {}, keeping the definition at {:#x}",
                    sym.name,
                    sym.address
                );
            }
        }
        Self { symbols, by_name }
    }

    /// Look up a symbol by its exact name.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).map(|&index| &self.symbols[index])
    }

    /// All symbols in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

//! Address-ordered symbol table
//!
//! Built either from `nm` output (`nm [-S] [-C] <binary>`) saved next to a
//! trace, or from the ELF symbol table of a binary. Lookup returns the
//! closest symbol starting at or before an address.

use object::{Object, ObjectSymbol, SymbolKind};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::resolver::{NameResolver, UNKNOWN};
use crate::domain::{Address, SymbolError};

#[derive(Debug, Clone)]
struct SymbolEntry {
    name: String,
    /// Byte length, when the source reported one
    size: Option<u64>,
}

/// Text symbols keyed by start address
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<u64, SymbolEntry>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `nm` output
    ///
    /// Accepts both `addr type name` and `addr size type name` (`nm -S`)
    /// lines. Only text symbols (`T`, `t`, `W`, `w`) are kept; undefined
    /// symbols and file headers are skipped.
    ///
    /// # Errors
    /// Returns an error if a symbol line carries an unparseable address
    pub fn from_nm_output(content: &str) -> Result<Self, SymbolError> {
        let mut table = Self::new();

        for (idx, line) in content.lines().enumerate() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                continue;
            }

            let malformed =
                || SymbolError::MalformedSymbol { line: idx + 1, content: line.to_string() };

            let start = u64::from_str_radix(parts[0], 16).map_err(|_| malformed())?;
            let (size, kind, name_at) = if parts[1].len() == 1 {
                (None, parts[1], 2)
            } else {
                let size = u64::from_str_radix(parts[1], 16).map_err(|_| malformed())?;
                (Some(size), parts.get(2).copied().unwrap_or_default(), 3)
            };

            if !matches!(kind, "T" | "t" | "W" | "w") || parts.len() <= name_at {
                continue;
            }

            // Demangled C++ names contain spaces
            let name = parts[name_at..].join(" ");
            table.insert(start, size, name);
        }

        Ok(table)
    }

    /// Read and parse an `nm` listing from disk
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn from_nm_file<P: AsRef<Path>>(path: P) -> Result<Self, SymbolError> {
        let content = fs::read_to_string(path)?;
        Self::from_nm_output(&content)
    }

    /// Collect the text symbols of a parsed object file
    #[must_use]
    pub fn from_object(obj: &object::File<'_>) -> Self {
        let mut table = Self::new();

        for symbol in obj.symbols().chain(obj.dynamic_symbols()) {
            if symbol.kind() != SymbolKind::Text || symbol.address() == 0 {
                continue;
            }
            if let Ok(name) = symbol.name() {
                if !name.is_empty() {
                    let size = Some(symbol.size()).filter(|&size| size > 0);
                    table.insert(symbol.address(), size, name.to_string());
                }
            }
        }

        table
    }

    /// Add a symbol; a later insert at the same address replaces the earlier one
    pub fn insert(&mut self, start: u64, size: Option<u64>, name: impl Into<String>) {
        self.symbols.insert(start, SymbolEntry { name: name.into(), size });
    }

    /// Name of the symbol covering `addr`
    #[must_use]
    pub fn lookup(&self, addr: u64) -> Option<&str> {
        let (&start, entry) = self.symbols.range(..=addr).next_back()?;
        match entry.size {
            Some(size) if addr - start >= size => None,
            _ => Some(entry.name.as_str()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl NameResolver for SymbolTable {
    fn routine_name(&self, target: Address) -> Cow<'_, str> {
        Cow::Borrowed(self.lookup(target.get()).unwrap_or(UNKNOWN))
    }

    fn library_name(&self, _target: Address) -> Cow<'_, str> {
        Cow::Borrowed(UNKNOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NM_OUTPUT: &str = "\
                 U puts@GLIBC_2.2.5
0000000000001040 T _start
0000000000001139 t helper
0000000000001150 T main
0000000000004010 B counter
0000000000001180 W operator new(unsigned long)
";

    #[test]
    fn test_parses_text_symbols_only() {
        let table = SymbolTable::from_nm_output(NM_OUTPUT).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.lookup(0x4010), Some("operator new(unsigned long)"));
    }

    #[test]
    fn test_lookup_picks_closest_preceding_symbol() {
        let table = SymbolTable::from_nm_output(NM_OUTPUT).unwrap();

        assert_eq!(table.lookup(0x1150), Some("main"));
        assert_eq!(table.lookup(0x1160), Some("main"));
        assert_eq!(table.lookup(0x1140), Some("helper"));
        assert_eq!(table.lookup(0x1000), None);
    }

    #[test]
    fn test_sized_symbols_bound_the_lookup() {
        let table = SymbolTable::from_nm_output(
            "0000000000001000 0000000000000010 T short_fn\n\
             0000000000002000 0000000000000100 t long_fn\n",
        )
        .unwrap();

        assert_eq!(table.lookup(0x100f), Some("short_fn"));
        assert_eq!(table.lookup(0x1010), None);
        assert_eq!(table.lookup(0x20ff), Some("long_fn"));
    }

    #[test]
    fn test_malformed_address_is_reported_with_line() {
        let err = SymbolTable::from_nm_output("0000000000001000 T ok\nzzzz T broken\n").unwrap_err();
        assert!(matches!(err, SymbolError::MalformedSymbol { line: 2, .. }));
    }

    #[test]
    fn test_resolver_falls_back_to_sentinel() {
        let table = SymbolTable::from_nm_output(NM_OUTPUT).unwrap();
        assert_eq!(table.routine_name(Address(0x10)), UNKNOWN);
        assert_eq!(table.routine_name(Address(0x1150)), "main");
        assert_eq!(table.library_name(Address(0x1150)), UNKNOWN);
    }
}

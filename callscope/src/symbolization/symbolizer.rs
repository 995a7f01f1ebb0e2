use addr2line::Context;
use anyhow::{Context as _, Result};
use gimli::{EndianRcSlice, RunTimeEndian};
use log::{debug, info};
use object::{Object, ObjectSection};
use rustc_demangle::demangle;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use super::symbol_table::SymbolTable;

/// DWARF-backed symbolizer for one executable
///
/// Falls back to the ELF symbol table for addresses DWARF does not cover
/// (stripped debug info, assembly stubs). Resolved addresses are cached,
/// since a dump resolves the same call targets over and over.
pub struct Symbolizer {
    ctx: Context<EndianRcSlice<RunTimeEndian>>,
    symbols: SymbolTable,
    /// Cache of resolved function names by file offset
    cache: RefCell<HashMap<u64, Option<String>>>,
}

impl Symbolizer {
    /// Create a new symbolizer for the given binary
    ///
    /// # Errors
    /// Returns an error if the binary file cannot be read or parsed
    pub fn new<P: AsRef<Path>>(binary_path: P) -> Result<Self> {
        let binary_data = fs::read(binary_path.as_ref()).context("Failed to read binary file")?;

        let obj_file = object::File::parse(&*binary_data).context("Failed to parse object file")?;

        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj_file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
                Ok(EndianRcSlice::new(Rc::from(&*data), endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section)?;
        let ctx = Context::from_dwarf(dwarf).context("Failed to load DWARF debug information")?;

        let symbols = SymbolTable::from_object(&obj_file);
        info!(
            "Loaded {} ({} ELF text symbols)",
            binary_path.as_ref().display(),
            symbols.len()
        );

        Ok(Self { ctx, symbols, cache: RefCell::new(HashMap::new()) })
    }

    /// Function name for a file offset
    ///
    /// Returns `None` when neither DWARF nor the ELF symbol table covers it.
    pub fn function_name(&self, addr: u64) -> Option<String> {
        if let Some(cached) = self.cache.borrow().get(&addr) {
            return cached.clone();
        }

        let resolved = self
            .resolve_dwarf(addr)
            .or_else(|| self.symbols.lookup(addr).map(Self::demangle_symbol));
        if resolved.is_none() {
            debug!("no symbol for offset 0x{addr:x}");
        }

        self.cache.borrow_mut().insert(addr, resolved.clone());
        resolved
    }

    /// Outermost (non-inlined) function DWARF reports for `addr`
    fn resolve_dwarf(&self, addr: u64) -> Option<String> {
        let mut frame_iter = self.ctx.find_frames(addr).skip_all_loads().ok()?;
        let mut outermost = None;

        while let Ok(Some(frame)) = frame_iter.next() {
            let Some(function) = frame.function.and_then(|f| f.demangle().ok().map(|s| s.to_string()))
            else {
                continue;
            };
            outermost = Some(function);
        }

        outermost
    }

    /// Demangle a Rust symbol name
    #[must_use]
    pub fn demangle_symbol(symbol: &str) -> String {
        format!("{:#}", demangle(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demangle_rust_symbol() {
        let name = Symbolizer::demangle_symbol("_ZN4core3fmt5write17h0123456789abcdefE");
        assert_eq!(name, "core::fmt::write");
    }

    #[test]
    fn test_demangle_leaves_plain_names_alone() {
        assert_eq!(Symbolizer::demangle_symbol("main"), "main");
    }

    #[test]
    fn test_missing_binary_is_an_error() {
        assert!(Symbolizer::new("/nonexistent/callscope-test-binary").is_err());
    }
}

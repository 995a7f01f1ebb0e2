//! Name resolution capability handed to call stack trackers
//!
//! A tracker only ever asks two questions about a call target: which
//! routine is it, and which library contains it. Unresolvable addresses
//! yield [`UNKNOWN`]; resolution never fails.

use log::info;
use std::borrow::Cow;

use super::memory_maps::{LibraryMap, MemoryRange};
use super::symbol_table::SymbolTable;
use super::symbolizer::Symbolizer;
use crate::domain::Address;

/// Sentinel returned for addresses no resolver can name
pub const UNKNOWN: &str = "<unknown>";

/// Resolves call targets to routine and library names
pub trait NameResolver {
    /// Name of the routine starting at or containing `target`
    fn routine_name(&self, target: Address) -> Cow<'_, str>;

    /// Short name of the library (or executable) containing `target`
    fn library_name(&self, target: Address) -> Cow<'_, str>;
}

impl<T: NameResolver + ?Sized> NameResolver for &T {
    fn routine_name(&self, target: Address) -> Cow<'_, str> {
        (**self).routine_name(target)
    }

    fn library_name(&self, target: Address) -> Cow<'_, str> {
        (**self).library_name(target)
    }
}

/// Resolver that knows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl NameResolver for NullResolver {
    fn routine_name(&self, _target: Address) -> Cow<'_, str> {
        Cow::Borrowed(UNKNOWN)
    }

    fn library_name(&self, _target: Address) -> Cow<'_, str> {
        Cow::Borrowed(UNKNOWN)
    }
}

/// Resolver built from two host-supplied lookup functions
pub struct FnResolver<F, G> {
    routine: F,
    library: G,
}

impl<F, G> FnResolver<F, G>
where
    F: Fn(Address) -> Option<String>,
    G: Fn(Address) -> Option<String>,
{
    pub fn new(routine: F, library: G) -> Self {
        Self { routine, library }
    }
}

impl<F, G> NameResolver for FnResolver<F, G>
where
    F: Fn(Address) -> Option<String>,
    G: Fn(Address) -> Option<String>,
{
    fn routine_name(&self, target: Address) -> Cow<'_, str> {
        (self.routine)(target).map_or(Cow::Borrowed(UNKNOWN), Cow::Owned)
    }

    fn library_name(&self, target: Address) -> Cow<'_, str> {
        (self.library)(target).map_or(Cow::Borrowed(UNKNOWN), Cow::Owned)
    }
}

/// Resolver for a real process: DWARF, then symbols, then the sentinel
///
/// Addresses inside the main executable's mapping are translated to file
/// offsets before DWARF lookup (PIE). Addresses in other libraries are only
/// looked up in the symbol table, by their raw value.
#[derive(Default)]
pub struct ProcessResolver {
    symbolizer: Option<Symbolizer>,
    symbols: Option<SymbolTable>,
    libraries: Option<LibraryMap>,
    executable: Option<MemoryRange>,
}

impl ProcessResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_symbolizer(mut self, symbolizer: Symbolizer) -> Self {
        self.symbolizer = Some(symbolizer);
        self
    }

    #[must_use]
    pub fn with_symbol_table(mut self, symbols: SymbolTable) -> Self {
        self.symbols = Some(symbols);
        self
    }

    /// Attach the process's mappings; `executable` locates the main binary in them
    ///
    /// Without `executable` the lowest file-backed mapping is taken as the
    /// main binary.
    #[must_use]
    pub fn with_libraries(mut self, libraries: LibraryMap, executable: Option<&str>) -> Self {
        let executable = executable.or_else(|| {
            let inferred = libraries.main_executable();
            if let Some(path) = inferred {
                info!("assuming {path} is the main executable");
            }
            inferred
        });
        self.executable = executable.and_then(|path| libraries.range_of(path));
        self.libraries = Some(libraries);
        self
    }

    /// Translate a runtime address for lookup in the main executable
    ///
    /// Returns (`adjusted_address`, `is_in_executable`)
    fn adjust_address(&self, addr: u64) -> (u64, bool) {
        match self.executable {
            Some(range) if range.contains(addr) => (addr - range.start, true),
            Some(_) => (addr, false),
            None => (addr, true),
        }
    }
}

impl NameResolver for ProcessResolver {
    fn routine_name(&self, target: Address) -> Cow<'_, str> {
        let (offset, in_executable) = self.adjust_address(target.get());

        if in_executable {
            if let Some(name) = self.symbolizer.as_ref().and_then(|s| s.function_name(offset)) {
                return Cow::Owned(name);
            }
        }

        let lookup = if in_executable { offset } else { target.get() };
        self.symbols
            .as_ref()
            .and_then(|table| table.lookup(lookup))
            .map_or(Cow::Borrowed(UNKNOWN), Cow::Borrowed)
    }

    fn library_name(&self, target: Address) -> Cow<'_, str> {
        self.libraries
            .as_ref()
            .and_then(|map| map.library_name(target.get()))
            .map_or(Cow::Borrowed(UNKNOWN), Cow::Borrowed)
    }
}

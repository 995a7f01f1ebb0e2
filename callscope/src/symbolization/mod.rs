//! # Name Resolution for Call Targets
//!
//! A shadow call stack records raw call targets like `0x55f3a2b4c780`. To
//! print a useful dump, each target is translated to:
//! - **Routine name**: `myapp::worker::compute`
//! - **Library name**: `myapp`, `libc.so.6`
//!
//! ## Sources
//!
//! - **DWARF** (`symbolizer`): function names for the main executable via
//!   `addr2line`/`gimli`/`object`, demangled with `rustc-demangle`, with the
//!   ELF symbol table as fallback.
//! - **Symbol listings** (`symbol_table`): `nm` output saved alongside a
//!   trace, for binaries that are not available at replay time.
//! - **Memory maps** (`memory_maps`): `/proc/<pid>/maps`, giving the library
//!   containing each address and the executable's load base.
//!
//! ## PIE Adjustment
//!
//! Runtime addresses of a position-independent executable are offset by its
//! randomized load base, while DWARF and symbol tables use file offsets:
//!
//! ```text
//! File Offset = Runtime Address - Base Address
//! ```
//!
//! [`ProcessResolver`] applies this for addresses inside the executable's
//! mapping and leaves addresses in shared libraries untouched.
//!
//! ## Contract
//!
//! Every [`NameResolver`] answers with [`UNKNOWN`] rather than failing, so a
//! dump always completes.

pub mod memory_maps;
pub mod resolver;
pub mod symbol_table;
pub mod symbolizer;

pub use memory_maps::{LibraryMap, Mapping, MemoryRange};
pub use resolver::{FnResolver, NameResolver, NullResolver, ProcessResolver, UNKNOWN};
pub use symbol_table::SymbolTable;
pub use symbolizer::Symbolizer;

//! Memory mapping utilities for process address space analysis
//!
//! This module parses `/proc/<pid>/maps` (live, or a snapshot saved next to
//! a trace) into the set of file-backed mappings. That answers two
//! questions for a call target: which library contains it, and, for the
//! main executable, what file offset it corresponds to (PIE adjustment).

use log::info;
use std::fs;
use std::path::Path;

use crate::domain::SymbolError;

/// Memory range of a loaded binary in a process's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// One file-backed (or named pseudo) mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub range: MemoryRange,
    pub path: String,
}

impl Mapping {
    /// Last path component (`libc.so.6` for `/usr/lib/libc.so.6`)
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// All named mappings of a process, sorted by start address
#[derive(Debug, Clone, Default)]
pub struct LibraryMap {
    mappings: Vec<Mapping>,
}

impl LibraryMap {
    /// Parse the contents of a `/proc/<pid>/maps` file
    ///
    /// Line format: `start-end perms offset dev inode [pathname]`.
    /// Anonymous mappings (no pathname) are skipped.
    ///
    /// # Errors
    /// Returns an error if a line's address range cannot be parsed
    pub fn parse(content: &str) -> Result<Self, SymbolError> {
        let mut mappings = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }

            let malformed =
                || SymbolError::MalformedMapping { line: idx + 1, content: line.to_string() };

            let (start, end) = parts[0].split_once('-').ok_or_else(malformed)?;
            let start = u64::from_str_radix(start, 16).map_err(|_| malformed())?;
            let end = u64::from_str_radix(end, 16).map_err(|_| malformed())?;

            if parts.len() < 6 {
                continue;
            }
            mappings.push(Mapping { range: MemoryRange { start, end }, path: parts[5..].join(" ") });
        }

        mappings.sort_by_key(|m| m.range.start);
        Ok(Self { mappings })
    }

    /// Read a saved maps snapshot
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SymbolError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Read the live maps of a running process
    ///
    /// # Errors
    /// Returns an error if `/proc/<pid>/maps` cannot be read or parsed
    pub fn for_pid(pid: i32) -> Result<Self, SymbolError> {
        let maps_path = format!("/proc/{pid}/maps");
        let content =
            fs::read_to_string(&maps_path).map_err(|_| SymbolError::MemoryMapsUnavailable(pid))?;
        Self::parse(&content)
    }

    /// Mapping containing `addr`
    #[must_use]
    pub fn find(&self, addr: u64) -> Option<&Mapping> {
        let after = self.mappings.partition_point(|m| m.range.start <= addr);
        self.mappings[..after].iter().rev().find(|m| m.range.contains(addr))
    }

    /// Short name of the library containing `addr`
    #[must_use]
    pub fn library_name(&self, addr: u64) -> Option<&str> {
        self.find(addr).map(Mapping::file_name)
    }

    /// Full extent of every mapping of `binary_path`
    ///
    /// Returns the range from the minimum start address to the maximum end
    /// address over all matching mappings.
    #[must_use]
    pub fn range_of(&self, binary_path: &str) -> Option<MemoryRange> {
        let range = self
            .mappings
            .iter()
            .filter(|m| m.path == binary_path || m.path.ends_with(&format!("/{binary_path}")))
            .map(|m| m.range)
            .reduce(|acc, r| MemoryRange { start: acc.start.min(r.start), end: acc.end.max(r.end) });

        if let Some(range) = range {
            info!("{binary_path} mapped at 0x{:x} - 0x{:x}", range.start, range.end);
        }
        range
    }

    /// Path of the lowest file-backed mapping, the main executable in a
    /// `/proc/<pid>/maps` listing
    #[must_use]
    pub fn main_executable(&self) -> Option<&str> {
        self.mappings.iter().map(|m| m.path.as_str()).find(|path| path.starts_with('/'))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPS: &str = "\
555555554000-555555555000 r--p 00000000 08:01 1234 /usr/bin/app
555555555000-555555556000 r-xp 00001000 08:01 1234 /usr/bin/app
555555559000-55555557a000 rw-p 00000000 00:00 0 [heap]
7ffff7dc3000-7ffff7de9000 r--p 00000000 08:01 5678 /usr/lib/x86_64-linux-gnu/libc.so.6
7ffff7de9000-7ffff7f3e000 r-xp 00026000 08:01 5678 /usr/lib/x86_64-linux-gnu/libc.so.6
7ffff7f90000-7ffff7f92000 rw-p 00000000 00:00 0
7ffffffde000-7ffffffff000 rw-p 00000000 00:00 0 [stack]
";

    #[test]
    fn test_memory_range_contains() {
        let range = MemoryRange { start: 0x1000, end: 0x2000 };

        assert!(range.contains(0x1000));
        assert!(range.contains(0x1FFF));
        assert!(!range.contains(0x0FFF));
        assert!(!range.contains(0x2000));
    }

    #[test]
    fn test_parse_skips_anonymous_mappings() {
        let map = LibraryMap::parse(MAPS).unwrap();
        assert_eq!(map.len(), 6);
    }

    #[test]
    fn test_library_name_is_file_name() {
        let map = LibraryMap::parse(MAPS).unwrap();

        assert_eq!(map.library_name(0x7fff_f7e0_0000), Some("libc.so.6"));
        assert_eq!(map.library_name(0x5555_5555_5100), Some("app"));
        assert_eq!(map.library_name(0x7fff_f7f9_1000), None);
        assert_eq!(map.library_name(0x10), None);
    }

    #[test]
    fn test_range_of_spans_all_segments() {
        let map = LibraryMap::parse(MAPS).unwrap();

        let range = map.range_of("/usr/bin/app").unwrap();
        assert_eq!(range, MemoryRange { start: 0x5555_5555_4000, end: 0x5555_5555_6000 });
        assert_eq!(map.range_of("app"), Some(range));
        assert_eq!(map.range_of("/usr/bin/other"), None);
    }

    #[test]
    fn test_main_executable_is_first_file_mapping() {
        // Named pseudo mappings below the executable are not file-backed
        let listing = format!("00400000-00401000 r--p 0 0:0 0 [vvar]\n{MAPS}");
        let map = LibraryMap::parse(&listing).unwrap();
        assert_eq!(map.main_executable(), Some("/usr/bin/app"));

        let anonymous =
            LibraryMap::parse("7fff00000000-7fff00001000 rw-p 0 0:0 0 [stack]\n").unwrap();
        assert_eq!(anonymous.main_executable(), None);
    }

    #[test]
    fn test_malformed_range_is_reported() {
        let err = LibraryMap::parse("not-a-range r--p 0 0:0 0 /x\n").unwrap_err();
        assert!(matches!(err, SymbolError::MalformedMapping { line: 1, .. }));
    }
}

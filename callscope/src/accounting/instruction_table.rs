//! # Instruction Execution Accounting
//!
//! Counts how often each instruction executed without paying per-instruction
//! cost on the hot path. Instrumentation registers every basic block once as
//! a group of instructions; at run time only the group counter is bumped.
//! [`InstructionTable::flush_groups`] then folds group counts into the
//! per-instruction totals.
//!
//! ```text
//! block @0x401000 (3 instrs) executed 10x ─┐
//!                                          ├─► 0x401004 executed 15x
//! block @0x401004 (2 instrs) executed 5x  ─┘
//! ```
//!
//! Counts persist across runs as text, one instruction per line:
//! `0x<address>:<size>:<count>`.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use log::info;

use crate::domain::{AccountingError, Address};

/// One distinct instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueInstr {
    pub address: Address,
    /// Encoded length in bytes
    pub size: u64,
    pub exec_count: u64,
}

/// Handle to a registered instruction group (basic block)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(usize);

#[derive(Debug, Default)]
struct InstrGroup {
    exec_count: u64,
    members: Vec<Address>,
}

/// Instruction counts keyed by address, plus the groups feeding them
#[derive(Debug, Default)]
pub struct InstructionTable {
    instructions: BTreeMap<Address, UniqueInstr>,
    groups: Vec<InstrGroup>,
}

impl InstructionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The instruction at `address`, created with a zero count if new
    ///
    /// # Errors
    /// Returns [`AccountingError::SizeMismatch`] if the instruction is already
    /// known with a different size
    pub fn fetch(&mut self, address: Address, size: u64) -> Result<&mut UniqueInstr, AccountingError> {
        let instr = self
            .instructions
            .entry(address)
            .or_insert(UniqueInstr { address, size, exec_count: 0 });
        if instr.size != size {
            return Err(AccountingError::SizeMismatch { address, existing: instr.size, requested: size });
        }
        Ok(instr)
    }

    /// Register a basic block made of `(address, size)` instructions
    ///
    /// Nothing is registered when a member conflicts.
    ///
    /// # Errors
    /// Returns an error if an instruction conflicts with a known size, or two
    /// members repeat an address with different sizes
    pub fn add_group(&mut self, members: &[(Address, u64)]) -> Result<GroupId, AccountingError> {
        for (i, &(address, size)) in members.iter().enumerate() {
            let known = self
                .instructions
                .get(&address)
                .map(|instr| instr.size)
                .or_else(|| members[..i].iter().find(|(a, _)| *a == address).map(|&(_, s)| s));
            if let Some(existing) = known.filter(|&existing| existing != size) {
                return Err(AccountingError::SizeMismatch { address, existing, requested: size });
            }
        }

        let id = GroupId(self.groups.len());
        self.groups.push(InstrGroup::default());
        for &(address, size) in members {
            self.add_to_group(id, address, size)?;
        }
        Ok(id)
    }

    /// Append one instruction to an existing group
    ///
    /// # Errors
    /// Returns an error if the group is unknown or the size conflicts
    pub fn add_to_group(
        &mut self,
        group: GroupId,
        address: Address,
        size: u64,
    ) -> Result<(), AccountingError> {
        if group.0 >= self.groups.len() {
            return Err(AccountingError::UnknownGroup(group.0));
        }
        self.fetch(address, size)?;
        self.groups[group.0].members.push(address);
        Ok(())
    }

    /// Record one execution of `group`
    ///
    /// # Errors
    /// Returns an error if the group is unknown
    pub fn count(&mut self, group: GroupId) -> Result<(), AccountingError> {
        let entry = self.groups.get_mut(group.0).ok_or(AccountingError::UnknownGroup(group.0))?;
        entry.exec_count += 1;
        Ok(())
    }

    /// Fold pending group counts into the instruction totals
    ///
    /// Group counters are zeroed, so flushing twice does not double count.
    /// Totals saturate at `u64::MAX`.
    pub fn flush_groups(&mut self) {
        for group in &mut self.groups {
            if group.exec_count == 0 {
                continue;
            }
            for address in &group.members {
                if let Some(instr) = self.instructions.get_mut(address) {
                    instr.exec_count = instr.exec_count.saturating_add(group.exec_count);
                }
            }
            group.exec_count = 0;
        }
    }

    /// Merge counts from a previous run
    ///
    /// Returns the number of lines merged.
    ///
    /// # Errors
    /// Returns an error on I/O failure, a malformed line, a size conflict or a
    /// total that no longer fits in a `u64`
    pub fn read_counts<R: BufRead>(&mut self, reader: R) -> Result<usize, AccountingError> {
        let mut merged = 0;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let malformed =
                || AccountingError::MalformedCountLine { line: idx + 1, content: line.clone() };

            let mut fields = trimmed.split(':');
            let (Some(address), Some(size), Some(count), None) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                return Err(malformed());
            };

            let address = address.trim_start_matches("0x");
            let address = u64::from_str_radix(address, 16).map_err(|_| malformed())?;
            let size = size.parse::<u64>().map_err(|_| malformed())?;
            let count = count.parse::<u64>().map_err(|_| malformed())?;

            let instr = self.fetch(Address(address), size)?;
            instr.exec_count = instr
                .exec_count
                .checked_add(count)
                .ok_or(AccountingError::CountOverflow { address: Address(address) })?;
            merged += 1;
        }

        info!("merged {merged} instruction counts");
        Ok(merged)
    }

    /// Write all instruction counts in address order
    ///
    /// Call [`InstructionTable::flush_groups`] first to include pending counts.
    ///
    /// # Errors
    /// Returns an error if writing fails
    pub fn write_counts<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for instr in self.instructions.values() {
            writeln!(writer, "0x{:x}:{}:{}", instr.address, instr.size, instr.exec_count)?;
        }
        writer.flush()
    }

    #[must_use]
    pub fn get(&self, address: Address) -> Option<&UniqueInstr> {
        self.instructions.get(&address)
    }

    /// Number of distinct instructions
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Sum of flushed execution counts over all instructions
    #[must_use]
    pub fn total_executed(&self) -> u64 {
        self.instructions.values().map(|instr| instr.exec_count).sum()
    }
}

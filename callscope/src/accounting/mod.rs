//! Basic-block driven instruction execution counts
//!
//! The table is owned by whoever drives instrumentation (the replayer here)
//! and passed by reference to the counting callback; there is no
//! process-wide state.

pub mod instruction_table;

pub use instruction_table::{GroupId, InstructionTable, UniqueInstr};

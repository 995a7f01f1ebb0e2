//! Structured error types for callscope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! The call stack tracker itself never fails; these cover the collaborators
//! around it.

use super::types::Address;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Truncated event record at byte offset {offset} ({len} of {expected} bytes)")]
    TruncatedRecord { offset: u64, len: usize, expected: usize },

    #[error(transparent)]
    Accounting(#[from] AccountingError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SymbolError {
    #[error("Malformed symbol line {line}: {content}")]
    MalformedSymbol { line: usize, content: String },

    #[error("Malformed memory map line {line}: {content}")]
    MalformedMapping { line: usize, content: String },

    #[error("Failed to read /proc/{0}/maps")]
    MemoryMapsUnavailable(i32),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AccountingError {
    #[error("Malformed count line {line}: {content}")]
    MalformedCountLine { line: usize, content: String },

    #[error("Instruction {address} seen with size {existing}, now {requested}")]
    SizeMismatch { address: Address, existing: u64, requested: u64 },

    #[error("Unknown instruction group {0}")]
    UnknownGroup(usize),

    #[error("Execution count for instruction {address} overflows")]
    CountOverflow { address: Address },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write report file: {0}")]
    WriteFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

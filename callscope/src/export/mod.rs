//! Report export functionality
//!
//! Writes the path profile of a replay as JSON for external tooling.

pub mod report;

pub use report::ReportExporter;

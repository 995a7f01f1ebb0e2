use serde::Serialize;
use std::io::Write;

use crate::analysis::{HotPath, PathProfile, RoutineHotspot};
use crate::domain::ExportError;
use crate::replay::ReplayStats;
use crate::symbolization::NameResolver;

/// JSON document written by [`ReportExporter::export`]
#[derive(Debug, Serialize)]
struct ProfileReport<'a> {
    /// Event log the profile was replayed from
    trace: &'a str,
    threads: usize,
    stats: &'a ReplayStats,
    total_samples: u64,
    unattributed_samples: u64,
    hot_paths: Vec<HotPath>,
    hot_routines: Vec<RoutineHotspot>,
}

/// Path profile exporter for offline analysis
pub struct ReportExporter {
    trace: String,
    threads: usize,
    stats: ReplayStats,
    total_samples: u64,
    unattributed_samples: u64,
    hot_paths: Vec<HotPath>,
    hot_routines: Vec<RoutineHotspot>,
}

impl ReportExporter {
    /// Snapshot a finished replay
    ///
    /// Names are resolved here, so the resolver is not needed at export time.
    pub fn new<R: NameResolver + ?Sized>(
        trace: impl Into<String>,
        threads: usize,
        profile: &PathProfile,
        stats: ReplayStats,
        resolver: &R,
    ) -> Self {
        Self {
            trace: trace.into(),
            threads,
            stats,
            total_samples: profile.total_samples(),
            unattributed_samples: profile.unattributed(),
            hot_paths: profile.hot_paths(resolver, None),
            hot_routines: profile.hot_routines(resolver),
        }
    }

    /// Write the report as pretty-printed JSON
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails
    pub fn export<W: Write>(&self, mut writer: W) -> Result<(), ExportError> {
        let report = ProfileReport {
            trace: &self.trace,
            threads: self.threads,
            stats: &self.stats,
            total_samples: self.total_samples,
            unattributed_samples: self.unattributed_samples,
            hot_paths: self.hot_paths.clone(),
            hot_routines: self.hot_routines.clone(),
        };

        serde_json::to_writer_pretty(&mut writer, &report)?;
        writeln!(writer)?;
        writer.flush().map_err(|e| ExportError::WriteFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Tid};
    use crate::symbolization::SymbolTable;

    #[test]
    fn test_export_creates_valid_json() {
        let mut symbols = SymbolTable::new();
        symbols.insert(0x1000, None, "main");
        symbols.insert(0x2000, None, "compute");

        let mut profile = PathProfile::new();
        profile.record(Tid(4), &[Address(0x1000), Address(0x2000)]);
        profile.record(Tid(4), &[]);

        let exporter =
            ReportExporter::new("run.events", 1, &profile, ReplayStats::default(), &symbols);
        let mut buffer = Vec::new();
        exporter.export(&mut buffer).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed["trace"], "run.events");
        assert_eq!(parsed["total_samples"], 1);
        assert_eq!(parsed["unattributed_samples"], 1);
        assert_eq!(parsed["hot_paths"][0]["frames"][1], "compute");
        assert_eq!(parsed["hot_paths"][0]["targets"][0], 0x1000);
        assert_eq!(parsed["hot_paths"][0]["threads"]["4"], 1);
        assert_eq!(parsed["hot_routines"][0]["name"], "compute");
        assert!(parsed["stats"].get("calls").is_some());
    }
}

//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::tracking::DumpOptions;

#[derive(Parser, Debug)]
#[command(
    name = "callscope",
    about = "Replay recorded call/return events through a shadow call stack",
    after_help = "\
EXAMPLES:
    callscope run.events --binary ./app --maps run.maps        Symbolize with DWARF
    callscope run.events --symbols app.nm --app-frames-only     Symbolize from nm output
    callscope run.events --counts-in old.cnt --counts-out new.cnt"
)]
pub struct Args {
    /// Recorded event log to replay
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,

    /// Main executable, for DWARF symbolization
    #[arg(short, long)]
    pub binary: Option<PathBuf>,

    /// `nm` listing of the executable (`<addr> <type> <name>` lines)
    #[arg(short, long, value_name = "FILE")]
    pub symbols: Option<PathBuf>,

    /// Saved /proc/<pid>/maps snapshot, for library names and PIE adjustment
    #[arg(short, long, value_name = "FILE", conflicts_with = "pid")]
    pub maps: Option<PathBuf>,

    /// Read memory maps from a running process instead of a snapshot
    #[arg(short, long)]
    pub pid: Option<i32>,

    /// Library whose entry starts an opaque region (repeatable)
    #[arg(long = "opaque-lib", value_name = "NAME")]
    pub opaque_libs: Vec<String>,

    /// Omit runtime startup frames below the main entry from dumps
    #[arg(long)]
    pub app_frames_only: bool,

    /// Collapse frames inside opaque regions in dumps
    #[arg(long)]
    pub collapse_opaque: bool,

    /// Dump every thread's stack once the log is exhausted
    #[arg(long)]
    pub dump_at_exit: bool,

    /// Instruction counts to merge before replay (`0x<addr>:<size>:<count>`)
    #[arg(long, value_name = "FILE")]
    pub counts_in: Option<PathBuf>,

    /// Write instruction counts after replay
    #[arg(long, value_name = "FILE")]
    pub counts_out: Option<PathBuf>,

    /// Export the path profile as JSON
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Number of hot paths shown in the summary
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    #[must_use]
    pub fn dump_options(&self) -> DumpOptions {
        DumpOptions { application_only: self.app_frames_only, collapse_opaque: self.collapse_opaque }
    }
}

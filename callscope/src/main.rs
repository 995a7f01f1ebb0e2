//! # callscope - Main Entry Point
//!
//! Replays a recorded event log through per-thread shadow call stacks:
//! - dumps requested by the log (or all stacks at exit) go to stdout
//! - a hot-path summary is printed at the end
//! - optional JSON export and instruction-count files

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};

use callscope::accounting::InstructionTable;
use callscope::cli::Args;
use callscope::export::ReportExporter;
use callscope::replay::{ReplayConfig, Replayer};
use callscope::symbolization::{LibraryMap, NameResolver, ProcessResolver, SymbolTable, Symbolizer};

// Exit codes (clap exits with 2 on usage errors itself)
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

/// Assemble the name resolver from whatever symbol sources were given
fn build_resolver(args: &Args) -> Result<ProcessResolver> {
    let mut resolver = ProcessResolver::new();

    if let Some(ref binary) = args.binary {
        match Symbolizer::new(binary) {
            Ok(symbolizer) => resolver = resolver.with_symbolizer(symbolizer),
            Err(e) => warn!("DWARF symbolization unavailable for {}: {e:#}", binary.display()),
        }
    }

    if let Some(ref path) = args.symbols {
        let table = SymbolTable::from_nm_file(path)
            .with_context(|| format!("Failed to load symbols from {}", path.display()))?;
        info!("Loaded {} symbols from {}", table.len(), path.display());
        resolver = resolver.with_symbol_table(table);
    }

    let libraries = match (&args.maps, args.pid) {
        (Some(path), _) => Some(
            LibraryMap::from_file(path)
                .with_context(|| format!("Failed to load memory maps from {}", path.display()))?,
        ),
        (None, Some(pid)) => Some(LibraryMap::for_pid(pid)?),
        (None, None) => None,
    };
    if let Some(libraries) = libraries {
        let executable = args
            .binary
            .as_ref()
            .map(|path| std::fs::canonicalize(path).unwrap_or_else(|_| path.clone()));
        let executable = executable.as_ref().map(|path| path.to_string_lossy().into_owned());
        resolver = resolver.with_libraries(libraries, executable.as_deref());
    }

    Ok(resolver)
}

fn load_counts(args: &Args) -> Result<InstructionTable> {
    let mut table = InstructionTable::new();
    if let Some(ref path) = args.counts_in {
        let file = File::open(path)
            .with_context(|| format!("Failed to open count file {}", path.display()))?;
        table.read_counts(BufReader::new(file)).context("Failed to merge instruction counts")?;
    }
    Ok(table)
}

fn print_summary<R: NameResolver + ?Sized>(
    profile: &callscope::analysis::PathProfile,
    resolver: &R,
    top: usize,
) {
    let hot = profile.hot_paths(resolver, Some(top));
    if hot.is_empty() {
        return;
    }

    println!("\nhot paths ({} samples):", profile.total_samples());
    for path in hot {
        println!("  {:>6.2}% {:>8}  {}", path.percentage, path.count, path.frames.join(" > "));
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    let resolver = build_resolver(&args)?;
    let instructions = load_counts(&args)?;

    if !quiet {
        println!("callscope v{}", env!("CARGO_PKG_VERSION"));
        println!("trace: {}", args.trace.display());
    }

    let config =
        ReplayConfig { dump_options: args.dump_options(), opaque_libraries: args.opaque_libs.clone() };
    let stdout = io::stdout();
    let mut replayer = Replayer::new(&resolver, config, instructions, stdout.lock());

    let trace = File::open(&args.trace)
        .with_context(|| format!("Failed to open trace {}", args.trace.display()))?;
    replayer.replay(BufReader::new(trace)).context("Replay failed")?;

    if args.dump_at_exit {
        replayer.dump_all().context("Failed to dump stacks")?;
    }

    let threads = replayer.threads_seen();
    let (profile, instructions, stats) = replayer.finish();

    if !quiet {
        eprintln!(
            "\n{} events, {} threads (calls: {}, returns: {}, samples: {}, dumps: {} / {} elided, resets: {}, exits: {}, unknown: {})",
            stats.events,
            threads,
            stats.calls,
            stats.returns,
            stats.samples,
            stats.dumps,
            stats.dumps_elided,
            stats.resets,
            stats.thread_exits,
            stats.unknown,
        );
        print_summary(&profile, &resolver, args.top);
    }

    if let Some(ref path) = args.counts_out {
        let file = File::create(path).context("Failed to create count output file")?;
        instructions.write_counts(BufWriter::new(file)).context("Failed to write instruction counts")?;
        if !quiet {
            println!("counts: {} instructions -> {}", instructions.len(), path.display());
        }
    }

    if let Some(ref path) = args.export {
        let exporter = ReportExporter::new(
            args.trace.to_string_lossy(),
            threads,
            &profile,
            stats,
            &resolver,
        );
        let file = File::create(path).context("Failed to create report file")?;
        exporter.export(BufWriter::new(file)).context("Failed to export report")?;
        if !quiet {
            println!("saved: {}", path.display());
        }
    }

    io::stdout().flush().ok();
    Ok(())
}

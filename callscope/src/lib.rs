//! # callscope - Shadow Call Stack Reconstruction
//!
//! callscope models a program's logical call chain from nothing but the
//! call and return events an instrumentation engine observes. It needs no
//! unwind tables and no frame pointers: the stack-pointer value carried by
//! each event is the single source of truth used to reconcile the model.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Instrumented Program + Engine                   │
//! │      call / return / main-entry hooks, block counters           │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ StackEvent records (callscope-common)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    callscope (This Crate)                       │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │    Replay    │──▶│   Tracking   │──▶│  Stack dump  │         │
//! │  │ (event log)  │   │ (CallStack)  │   │   (sink)     │         │
//! │  └──────────────┘   └──────────────┘   └──────────────┘         │
//! │         │                   │                  ▲                │
//! │         │                   ▼                  │                │
//! │         │           ┌──────────────┐   ┌──────────────┐         │
//! │         │           │   Analysis   │   │ Symbolization│         │
//! │         │           │ (path counts)│   │ (DWARF, nm,  │         │
//! │         │           └──────────────┘   │  /proc maps) │         │
//! │         ▼                   │          └──────────────┘         │
//! │  ┌──────────────┐   ┌──────────────┐                            │
//! │  │  Accounting  │   │    Export    │                            │
//! │  │ (instr cnt)  │   │ (report.json)│                            │
//! │  └──────────────┘   └──────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`tracking`]: the shadow call stack
//!   - `CallStack`: per-thread model, call/return/main-entry handlers,
//!     stack-pointer reconciliation, dumps
//!   - `ThreadStacks`: one `CallStack` per instrumented thread
//!
//! - [`symbolization`]: turns call targets into routine and library names
//!   for dumps; every resolver degrades to `<unknown>` instead of failing
//!
//! - [`analysis`]: samples charged to full call paths
//!
//! - [`accounting`]: basic-block driven instruction execution counts
//!
//! - [`replay`]: drives all of the above from a recorded event log
//!
//! - [`export`]: JSON report of the path profile
//!
//! - [`cli`], [`domain`]: argument definitions, newtypes and error enums
//!
//! ## Reconciliation
//!
//! The stack grows toward lower addresses, so a frame whose call-site stack
//! pointer is at or below the stack pointer observed after a return can no
//! longer be live. Every return pops all such frames, which absorbs:
//!
//! - tail calls that collapse several calls into one return
//! - `longjmp`, exceptions and other non-local exits
//! - calls the engine failed to observe
//!
//! A model that drifts is corrected by the next return.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Replay a recording, symbolizing with DWARF and the saved memory map
//! callscope run.events --binary ./app --maps run.maps --dump-at-exit
//!
//! # Export the path profile
//! callscope run.events --symbols app.nm --export profile.json
//! ```

pub mod accounting;
pub mod analysis;
pub mod cli;
pub mod domain;
pub mod export;
pub mod replay;
pub mod symbolization;
pub mod tracking;

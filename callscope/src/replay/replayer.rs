//! # Event Replay
//!
//! Drives shadow stacks, the path profile and instruction accounting from a
//! recorded event log, in the same order a live instrumentation engine would
//! have invoked the hooks.
//!
//! ## Event Routing
//!
//! - `CALL` / `MAIN_ENTRY` / `RETURN` → the thread's [`CallStack`]
//! - `SAMPLE` → [`PathProfile`], charged to the thread's application path
//! - `DUMP` → dump sink, elided when the thread's stack has not moved
//! - `RESET` → the thread's [`CallStack::reset`]
//! - `THREAD_EXIT` → the thread's stack is dropped
//! - `BLOCK_INSTR` / `BLOCK_EXEC` → [`InstructionTable`]

use callscope_common::{
    StackEvent, EVENT_BLOCK_EXEC, EVENT_BLOCK_INSTR, EVENT_CALL, EVENT_DUMP, EVENT_MAIN_ENTRY,
    EVENT_RESET, EVENT_RETURN, EVENT_SAMPLE, EVENT_THREAD_EXIT,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Read, Write};

use super::event_reader::EventReader;
use crate::accounting::{GroupId, InstructionTable};
use crate::analysis::PathProfile;
use crate::domain::{Address, ReplayError, Tid};
use crate::symbolization::NameResolver;
use crate::tracking::{CallStack, DumpOptions, ThreadStacks};

/// Replay behaviour
#[derive(Debug, Clone, Default)]
pub struct ReplayConfig {
    /// Filters for every dump written
    pub dump_options: DumpOptions,
    /// Library names whose entry starts an opaque region
    pub opaque_libraries: Vec<String>,
}

/// Per-kind event counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayStats {
    pub events: u64,
    pub calls: u64,
    pub main_entries: u64,
    pub returns: u64,
    pub samples: u64,
    pub dumps: u64,
    pub dumps_elided: u64,
    pub resets: u64,
    pub thread_exits: u64,
    pub block_instrs: u64,
    pub block_execs: u64,
    /// Block executions for blocks never declared
    pub undeclared_blocks: u64,
    /// Events with an unrecognized kind (skipped)
    pub unknown: u64,
}

/// Encapsulates replay state and its outputs
pub struct Replayer<'r, R: NameResolver + ?Sized, W: Write> {
    config: ReplayConfig,
    resolver: &'r R,
    stacks: ThreadStacks<'r, R>,
    profile: PathProfile,
    instructions: InstructionTable,
    /// Engine block id → registered group
    blocks: HashMap<u64, GroupId>,
    dump_sink: W,
    pub stats: ReplayStats,
}

impl<'r, R: NameResolver + ?Sized, W: Write> Replayer<'r, R, W> {
    /// Create a replayer writing dumps to `dump_sink`
    ///
    /// `instructions` may already hold counts from earlier runs.
    pub fn new(
        resolver: &'r R,
        config: ReplayConfig,
        instructions: InstructionTable,
        dump_sink: W,
    ) -> Self {
        Self {
            config,
            resolver,
            stacks: ThreadStacks::new(resolver),
            profile: PathProfile::new(),
            instructions,
            blocks: HashMap::new(),
            dump_sink,
            stats: ReplayStats::default(),
        }
    }

    /// Replay every event of a recorded log
    ///
    /// # Errors
    /// Returns an error on I/O failure, a truncated trailing record, or an
    /// accounting conflict. Events before the failure stay applied.
    pub fn replay<Rd: Read>(&mut self, reader: Rd) -> Result<(), ReplayError> {
        let mut events = EventReader::new(reader);
        for event in &mut events {
            self.process_event(&event?)?;
        }
        info!("replayed {} events ({} bytes)", self.stats.events, events.offset());
        Ok(())
    }

    /// Apply a single event
    ///
    /// # Errors
    /// Returns an error if writing a dump fails or accounting detects a conflict
    pub fn process_event(&mut self, event: &StackEvent) -> Result<(), ReplayError> {
        self.stats.events += 1;
        let tid = Tid(event.tid);
        let sp = Address(event.stack_pointer);

        match event.kind {
            EVENT_CALL => {
                self.stats.calls += 1;
                let target = Address(event.address);
                let opaque = self.is_opaque(target);
                let stack = self.stacks.stack_mut(tid);
                stack.process_call(sp, target);
                if opaque && stack.opaque_entry_depth().is_none() {
                    stack.enter_opaque_region();
                }
            }
            EVENT_MAIN_ENTRY => {
                self.stats.main_entries += 1;
                self.stacks.stack_mut(tid).process_main_entry(sp, Address(event.address));
            }
            EVENT_RETURN => {
                self.stats.returns += 1;
                self.stacks.stack_mut(tid).process_return(sp, event.prev_ip_does_push());
            }
            EVENT_SAMPLE => {
                self.stats.samples += 1;
                let path = self.stacks.stack_mut(tid).target_path();
                self.profile.record(tid, &path);
            }
            EVENT_DUMP => {
                let stack = self.stacks.stack_mut(tid);
                if stack.changed_since_dump() {
                    writeln!(self.dump_sink, "[{tid}]")?;
                    stack.dump_stack_with(&mut self.dump_sink, self.config.dump_options)?;
                    self.stats.dumps += 1;
                } else {
                    self.stats.dumps_elided += 1;
                }
            }
            EVENT_RESET => {
                self.stats.resets += 1;
                self.stacks.stack_mut(tid).reset();
            }
            EVENT_THREAD_EXIT => {
                self.stats.thread_exits += 1;
                match self.stacks.remove(tid) {
                    Some(stack) => debug!("{tid} exited at depth {}", stack.depth()),
                    None => debug!("{tid} exited without events"),
                }
            }
            EVENT_BLOCK_INSTR => {
                self.stats.block_instrs += 1;
                let group = match self.blocks.get(&event.arg) {
                    Some(&group) => group,
                    None => {
                        let group = self.instructions.add_group(&[])?;
                        self.blocks.insert(event.arg, group);
                        group
                    }
                };
                self.instructions.add_to_group(group, Address(event.address), event.stack_pointer)?;
            }
            EVENT_BLOCK_EXEC => {
                self.stats.block_execs += 1;
                if let Some(&group) = self.blocks.get(&event.arg) {
                    self.instructions.count(group)?;
                } else {
                    self.stats.undeclared_blocks += 1;
                    warn!("block {} executed before being declared", event.arg);
                }
            }
            kind => {
                self.stats.unknown += 1;
                warn!("skipping event with unknown kind {kind}");
            }
        }

        Ok(())
    }

    /// Dump every known thread's stack unconditionally
    ///
    /// # Errors
    /// Returns an error if writing to the dump sink fails
    pub fn dump_all(&mut self) -> Result<(), ReplayError> {
        for tid in self.stacks.threads() {
            writeln!(self.dump_sink, "[{tid}]")?;
            self.stacks
                .stack_mut(tid)
                .dump_stack_with(&mut self.dump_sink, self.config.dump_options)?;
        }
        Ok(())
    }

    fn is_opaque(&self, target: Address) -> bool {
        if self.config.opaque_libraries.is_empty() {
            return false;
        }
        let library = self.resolver.library_name(target);
        self.config.opaque_libraries.iter().any(|name| *name == library)
    }

    #[must_use]
    pub fn stack(&self, tid: Tid) -> Option<&CallStack<'r, R>> {
        self.stacks.get(tid)
    }

    /// Threads with a live stack
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.stacks.len()
    }

    /// Threads seen over the whole replay, exited ones included
    #[must_use]
    pub fn threads_seen(&self) -> usize {
        self.stacks.created()
    }

    #[must_use]
    pub fn profile(&self) -> &PathProfile {
        &self.profile
    }

    /// Flush pending block counts and hand back the outputs
    #[must_use]
    pub fn finish(mut self) -> (PathProfile, InstructionTable, ReplayStats) {
        self.instructions.flush_groups();
        (self.profile, self.instructions, self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolization::{FnResolver, NullResolver, SymbolTable};

    fn replayer<R: NameResolver + ?Sized>(resolver: &R) -> Replayer<'_, R, Vec<u8>> {
        Replayer::new(resolver, ReplayConfig::default(), InstructionTable::new(), Vec::new())
    }

    #[test]
    fn test_events_routed_per_thread() {
        let mut replay = replayer(&NullResolver);
        for event in [
            StackEvent::main_entry(1, 0x9000, 0x1000),
            StackEvent::call(1, 0x8000, 0x1100),
            StackEvent::call(2, 0x5000, 0x2000),
            StackEvent::ret(1, 0x8000, false),
        ] {
            replay.process_event(&event).unwrap();
        }

        assert_eq!(replay.stack(Tid(1)).map(CallStack::depth), Some(1));
        assert_eq!(replay.stack(Tid(2)).map(CallStack::depth), Some(1));
        assert_eq!(replay.stats.calls, 2);
        assert_eq!(replay.stats.main_entries, 1);
        assert_eq!(replay.stats.returns, 1);
    }

    #[test]
    fn test_samples_charge_application_path() {
        let mut replay = replayer(&NullResolver);
        for event in [
            StackEvent::call(1, 0xa000, 0x0500),
            StackEvent::main_entry(1, 0x9000, 0x1000),
            StackEvent::call(1, 0x8000, 0x1100),
            StackEvent::marker(EVENT_SAMPLE, 1),
            StackEvent::marker(EVENT_SAMPLE, 3),
        ] {
            replay.process_event(&event).unwrap();
        }

        let hot = replay.profile().hot_paths(&NullResolver, None);
        assert_eq!(hot.len(), 1);
        assert_eq!(hot[0].targets, vec![Address(0x1000), Address(0x1100)]);
        assert_eq!(replay.profile().unattributed(), 1);
    }

    #[test]
    fn test_repeat_dump_is_elided() {
        let mut replay = replayer(&NullResolver);
        replay.process_event(&StackEvent::call(1, 0x9000, 0x1000)).unwrap();
        replay.process_event(&StackEvent::marker(EVENT_DUMP, 1)).unwrap();
        replay.process_event(&StackEvent::marker(EVENT_DUMP, 1)).unwrap();

        assert_eq!(replay.stats.dumps, 1);
        assert_eq!(replay.stats.dumps_elided, 1);
        let output = String::from_utf8(replay.dump_sink.clone()).unwrap();
        assert!(output.starts_with("[TID:1]\ncall stack: depth=1"));
    }

    #[test]
    fn test_dump_after_sibling_call_is_written() {
        let mut replay = replayer(&NullResolver);
        for event in [
            StackEvent::call(1, 0x9000, 0x1000),
            StackEvent::call(1, 0x8000, 0x2000),
            StackEvent::marker(EVENT_DUMP, 1),
            StackEvent::ret(1, 0x8008, false),
            StackEvent::call(1, 0x8000, 0x3000),
            StackEvent::marker(EVENT_DUMP, 1),
        ] {
            replay.process_event(&event).unwrap();
        }

        assert_eq!(replay.stats.dumps, 2);
        assert_eq!(replay.stats.dumps_elided, 0);
    }

    #[test]
    fn test_thread_exit_drops_stack() {
        let mut replay = replayer(&NullResolver);
        for event in [
            StackEvent::call(1, 0x9000, 0x1000),
            StackEvent::call(2, 0x9000, 0x1000),
            StackEvent::marker(EVENT_THREAD_EXIT, 2),
            StackEvent::marker(EVENT_THREAD_EXIT, 5),
        ] {
            replay.process_event(&event).unwrap();
        }

        assert!(replay.stack(Tid(2)).is_none());
        assert_eq!(replay.thread_count(), 1);
        assert_eq!(replay.threads_seen(), 2);
        assert_eq!(replay.stats.thread_exits, 2);

        replay.dump_all().unwrap();
        let output = String::from_utf8(replay.dump_sink.clone()).unwrap();
        assert!(output.contains("[TID:1]"));
        assert!(!output.contains("[TID:2]"));
    }

    #[test]
    fn test_opaque_library_marks_first_entry_only() {
        let resolver = FnResolver::new(
            |_| None,
            |addr: Address| Some(if addr.get() >= 0x7000 { "libc.so.6" } else { "app" }.to_string()),
        );
        let config = ReplayConfig {
            opaque_libraries: vec!["libc.so.6".to_string()],
            ..ReplayConfig::default()
        };
        let mut replay = Replayer::new(&resolver, config, InstructionTable::new(), Vec::new());

        for event in [
            StackEvent::call(1, 0x9000, 0x1000),
            StackEvent::call(1, 0x8000, 0x7100),
            StackEvent::call(1, 0x7000, 0x7200),
        ] {
            replay.process_event(&event).unwrap();
        }

        assert_eq!(replay.stack(Tid(1)).and_then(CallStack::opaque_entry_depth), Some(2));
    }

    #[test]
    fn test_blocks_counted_and_flushed() {
        let mut replay = replayer(&NullResolver);
        for event in [
            StackEvent::block_instr(7, 0x1000, 4),
            StackEvent::block_instr(7, 0x1004, 2),
            StackEvent::block_exec(7),
            StackEvent::block_exec(7),
            StackEvent::block_exec(9),
        ] {
            replay.process_event(&event).unwrap();
        }

        let (_, instructions, stats) = replay.finish();
        assert_eq!(instructions.get(Address(0x1004)).unwrap().exec_count, 2);
        assert_eq!(stats.undeclared_blocks, 1);
    }

    #[test]
    fn test_unknown_kind_is_skipped() {
        let mut replay = replayer(&NullResolver);
        replay.process_event(&StackEvent::marker(99, 1)).unwrap();
        assert_eq!(replay.stats.unknown, 1);
        assert_eq!(replay.thread_count(), 0);
    }

    #[test]
    fn test_dump_all_writes_every_thread() {
        let mut symbols = SymbolTable::new();
        symbols.insert(0x1000, None, "main");
        let mut replay = replayer(&symbols);
        replay.process_event(&StackEvent::call(2, 0x9000, 0x1000)).unwrap();
        replay.process_event(&StackEvent::call(1, 0x9000, 0x1000)).unwrap();

        replay.dump_all().unwrap();

        let output = String::from_utf8(replay.dump_sink.clone()).unwrap();
        let t1 = output.find("[TID:1]").unwrap();
        let t2 = output.find("[TID:2]").unwrap();
        assert!(t1 < t2);
        assert_eq!(output.matches(" main ").count(), 2);
    }
}

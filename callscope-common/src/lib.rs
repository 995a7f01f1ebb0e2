//! # Shared Event Layout (Instrumentation Engine ↔ Replay)
//!
//! Defines the fixed-size record an instrumentation engine emits for every
//! observed call, return and accounting event, and that `callscope` reads back
//! when replaying a recorded run. The record uses `#[repr(C)]` and a
//! little-endian on-disk encoding so producers written in any language can
//! emit it.
//!
//! ## Key Types
//!
//! - [`StackEvent`] - One observed event (32 bytes on disk)
//! - `EVENT_*` constants - Event kinds stored in [`StackEvent::kind`]

#![no_std]

// ============================================================================
// Event Kind Constants
// ============================================================================

/// **Call**: a call instruction was taken
///
/// Fields: `stack_pointer` at the call, `address` = call target
pub const EVENT_CALL: u32 = 1;

/// **Main entry**: the program's designated entry routine began
///
/// Fields: same as [`EVENT_CALL`]. Fired once per process under normal operation.
pub const EVENT_MAIN_ENTRY: u32 = 2;

/// **Return**: a return instruction executed
///
/// Fields: `stack_pointer` observed after the return, `arg` = 1 when the
/// instruction preceding the return address behaves like a push
pub const EVENT_RETURN: u32 = 3;

/// **Sample**: attribute one sample to the thread's current call path
pub const EVENT_SAMPLE: u32 = 4;

/// **Dump**: render the thread's current call stack
pub const EVENT_DUMP: u32 = 5;

/// **Reset**: the thread's stack is known to be invalid (exec, thread reuse)
pub const EVENT_RESET: u32 = 6;

/// **Block layout**: one instruction belongs to a basic block
///
/// Fields: `address` = instruction address, `stack_pointer` = instruction
/// size in bytes, `arg` = block id chosen by the engine
pub const EVENT_BLOCK_INSTR: u32 = 7;

/// **Block execution**: a basic block executed once
///
/// Fields: `arg` = block id previously declared with [`EVENT_BLOCK_INSTR`]
pub const EVENT_BLOCK_EXEC: u32 = 8;

/// **Thread exit**: the thread finished; its stack is discarded
pub const EVENT_THREAD_EXIT: u32 = 9;

/// Size of one encoded [`StackEvent`] in bytes
pub const EVENT_SIZE: usize = 32;

// ============================================================================
// Shared Data Structures
// ============================================================================

/// Event recorded by the instrumentation engine
///
/// Field meaning depends on [`StackEvent::kind`], see the `EVENT_*` constants.
///
/// **Memory Layout**: `#[repr(C)]`, no padding (32 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StackEvent {
    /// Event kind (see constants: `EVENT_CALL`, `EVENT_RETURN`, etc.)
    pub kind: u32,

    /// Thread ID of the instrumented execution context
    ///
    /// Each thread's events are routed to its own tracker.
    pub tid: u32,

    /// Stack pointer value observed with the event
    pub stack_pointer: u64,

    /// Target address (calls) or instruction address (block layout)
    pub address: u64,

    /// Kind-specific argument
    pub arg: u64,
}

impl StackEvent {
    /// Build a call event
    #[must_use]
    pub const fn call(tid: u32, stack_pointer: u64, target: u64) -> Self {
        Self { kind: EVENT_CALL, tid, stack_pointer, address: target, arg: 0 }
    }

    /// Build a main-entry event
    #[must_use]
    pub const fn main_entry(tid: u32, stack_pointer: u64, target: u64) -> Self {
        Self { kind: EVENT_MAIN_ENTRY, tid, stack_pointer, address: target, arg: 0 }
    }

    /// Build a return event
    #[must_use]
    pub const fn ret(tid: u32, stack_pointer: u64, prev_ip_does_push: bool) -> Self {
        Self {
            kind: EVENT_RETURN,
            tid,
            stack_pointer,
            address: 0,
            arg: if prev_ip_does_push { 1 } else { 0 },
        }
    }

    /// Build an event that carries only a kind and a thread
    #[must_use]
    pub const fn marker(kind: u32, tid: u32) -> Self {
        Self { kind, tid, stack_pointer: 0, address: 0, arg: 0 }
    }

    /// Build a block-layout event
    #[must_use]
    pub const fn block_instr(block: u64, address: u64, size: u64) -> Self {
        Self { kind: EVENT_BLOCK_INSTR, tid: 0, stack_pointer: size, address, arg: block }
    }

    /// Build a block-execution event
    #[must_use]
    pub const fn block_exec(block: u64) -> Self {
        Self { kind: EVENT_BLOCK_EXEC, tid: 0, stack_pointer: 0, address: 0, arg: block }
    }

    /// Whether a return event carries the prev-ip-does-push hint
    #[must_use]
    pub const fn prev_ip_does_push(&self) -> bool {
        self.arg != 0
    }

    /// Encode as little-endian bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; EVENT_SIZE] {
        let mut out = [0u8; EVENT_SIZE];
        out[0..4].copy_from_slice(&self.kind.to_le_bytes());
        out[4..8].copy_from_slice(&self.tid.to_le_bytes());
        out[8..16].copy_from_slice(&self.stack_pointer.to_le_bytes());
        out[16..24].copy_from_slice(&self.address.to_le_bytes());
        out[24..32].copy_from_slice(&self.arg.to_le_bytes());
        out
    }

    /// Decode from little-endian bytes
    ///
    /// Returns `None` if fewer than [`EVENT_SIZE`] bytes are supplied.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < EVENT_SIZE {
            return None;
        }
        let u32_at = |at: usize| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[at..at + 4]);
            u32::from_le_bytes(buf)
        };
        let u64_at = |at: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(buf)
        };
        Some(Self {
            kind: u32_at(0),
            tid: u32_at(4),
            stack_pointer: u64_at(8),
            address: u64_at(16),
            arg: u64_at(24),
        })
    }
}

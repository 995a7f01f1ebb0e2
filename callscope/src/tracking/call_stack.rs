//! # Shadow Call Stack
//!
//! Models one thread's logical call chain from the call and return events an
//! instrumentation engine reports. The model never trusts that calls and
//! returns pair up: every return reconciles the modeled stack against the
//! observed stack pointer, so tail calls, `longjmp`, exceptions and missed
//! events are absorbed on the next return.
//!
//! ## Ordering
//!
//! The stack grows toward lower addresses. Activations are stored outermost
//! first, so call-site stack pointers strictly decrease along the vector:
//!
//! ```text
//! index:   0        1        2        3
//! sp:      0x1000   0x0f00   0x0e00   0x0d00   <- innermost (last)
//! ```
//!
//! A return observed at `sp = 0x0f50` leaves only the `0x1000` frame live:
//! every frame whose call-site stack pointer is at or below the post-return
//! stack pointer has been torn down, however many returns were missed.

use log::{debug, trace};

use super::activation::Activation;
use crate::domain::Address;
use crate::symbolization::NameResolver;

/// Shadow call stack for a single thread
///
/// Not `Sync`-safe to drive from several threads: the host owns one tracker
/// per thread (see [`super::ThreadStacks`]).
pub struct CallStack<'r, R: NameResolver + ?Sized> {
    /// Bumped on every [`CallStack::reset`]
    generation: u64,
    /// Depth right after the main-entry push, `None` until latched
    main_entry_depth: Option<usize>,
    /// Depth right after the most recent opaque-region entry
    opaque_entry_depth: Option<usize>,
    /// Outermost first, innermost last
    activations: Vec<Activation>,
    /// Innermost stack pointer and activation index at the last dump
    last_printed: Option<(Address, Option<u64>)>,
    next_index: u64,
    resolver: &'r R,
}

impl<'r, R: NameResolver + ?Sized> CallStack<'r, R> {
    /// Create an empty tracker resolving names through `resolver`
    pub fn new(resolver: &'r R) -> Self {
        Self {
            generation: 0,
            main_entry_depth: None,
            opaque_entry_depth: None,
            activations: Vec::new(),
            last_printed: None,
            next_index: 0,
            resolver,
        }
    }

    /// Record a call taken at `current_sp` to `target`
    ///
    /// The caller guarantees the stack grew: `current_sp` is below the
    /// innermost call-site stack pointer. This is not re-checked here; a
    /// violation is repaired by the next [`CallStack::process_return`].
    pub fn process_call(&mut self, current_sp: Address, target: Address) {
        trace!("call {target} at sp {current_sp}");
        self.create_activation(current_sp, target);
    }

    /// Record entry into the program's designated entry routine
    ///
    /// Pushes like [`CallStack::process_call`] and latches the entry anchor
    /// to the new depth. The first entry wins: a second main entry leaves the
    /// anchor alone unless reconciliation has cleared it in between.
    pub fn process_main_entry(&mut self, current_sp: Address, target: Address) {
        self.create_activation(current_sp, target);
        if self.main_entry_depth.is_none() {
            debug!("main entry {target} anchored at depth {}", self.depth());
            self.main_entry_depth = Some(self.depth());
        }
    }

    /// Reconcile the model after a return left the stack pointer at `current_sp`
    ///
    /// Pops every activation taken at or below `current_sp`. When
    /// `prev_ip_does_push` is set, the one activation whose call-site stack
    /// pointer equals `current_sp` survives: the return only undid the push
    /// fused into the preceding instruction, not that frame.
    ///
    /// More returns than calls is not an error; popping stops at the empty stack.
    pub fn process_return(&mut self, current_sp: Address, prev_ip_does_push: bool) {
        trace!("return to sp {current_sp} (prev ip pushes: {prev_ip_does_push})");
        self.adjust_stack(current_sp, prev_ip_does_push);
    }

    /// Mark the innermost frame as the entry into an opaque region
    ///
    /// Frames pushed after this are still modeled but can be collapsed in
    /// dumps. The most recent entry replaces any earlier one.
    pub fn enter_opaque_region(&mut self) {
        if self.activations.is_empty() {
            return;
        }
        self.opaque_entry_depth = Some(self.depth());
    }

    /// Drop the whole model, e.g. after `exec` or when a thread id is reused
    pub fn reset(&mut self) {
        debug!("stack reset at depth {} (generation {})", self.depth(), self.generation);
        self.activations.clear();
        self.main_entry_depth = None;
        self.opaque_entry_depth = None;
        self.last_printed = None;
        self.generation += 1;
    }

    /// Number of activations believed live
    #[must_use]
    pub fn depth(&self) -> usize {
        self.activations.len()
    }

    /// Number of resets this tracker has gone through
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn main_entry_depth(&self) -> Option<usize> {
        self.main_entry_depth
    }

    #[must_use]
    pub fn opaque_entry_depth(&self) -> Option<usize> {
        self.opaque_entry_depth
    }

    /// Live activations, outermost first
    #[must_use]
    pub fn activations(&self) -> &[Activation] {
        &self.activations
    }

    /// The current (innermost) activation
    #[must_use]
    pub fn innermost(&self) -> Option<&Activation> {
        self.activations.last()
    }

    /// Activations from the main-entry frame inward
    ///
    /// Without an entry anchor every frame counts as an application frame.
    #[must_use]
    pub fn application_frames(&self) -> &[Activation] {
        &self.activations[self.application_start()..]
    }

    /// Targets of the application frames, outermost first
    #[must_use]
    pub fn target_path(&self) -> Vec<Address> {
        self.application_frames().iter().map(Activation::target).collect()
    }

    /// Whether the innermost frame changed since the last dump
    ///
    /// A new call from the same call site reuses the stack pointer but gets a
    /// fresh index, so it counts as a change.
    #[must_use]
    pub fn changed_since_dump(&self) -> bool {
        self.last_printed != Some(self.watermark())
    }

    pub(super) fn resolver(&self) -> &'r R {
        self.resolver
    }

    /// Index of the first application frame
    pub(super) fn application_start(&self) -> usize {
        self.main_entry_depth.map_or(0, |depth| depth.saturating_sub(1))
    }

    pub(super) fn mark_printed(&mut self) {
        self.last_printed = Some(self.watermark());
    }

    /// Innermost stack pointer and index, `(0, None)` for an empty stack
    fn watermark(&self) -> (Address, Option<u64>) {
        self.innermost()
            .map_or((Address(0), None), |top| (top.stack_pointer(), Some(top.index())))
    }

    fn create_activation(&mut self, current_sp: Address, target: Address) {
        let index = self.next_index;
        self.next_index += 1;
        self.activations.push(Activation::new(index, current_sp, target));
    }

    fn adjust_stack(&mut self, current_sp: Address, prev_ip_does_push: bool) {
        let before = self.activations.len();

        while let Some(top) = self.activations.last() {
            let sp = top.stack_pointer();
            let torn_down = sp < current_sp || (sp == current_sp && !prev_ip_does_push);
            if !torn_down {
                break;
            }
            self.activations.pop();
        }

        let popped = before - self.activations.len();
        if popped > 1 {
            debug!("return to sp {current_sp} collapsed {popped} frames (depth now {})", self.depth());
        }

        let depth = self.depth();
        if self.main_entry_depth.is_some_and(|anchor| depth < anchor) {
            debug!("main entry frame popped, clearing anchor");
            self.main_entry_depth = None;
        }
        if self.opaque_entry_depth.is_some_and(|anchor| depth < anchor) {
            self.opaque_entry_depth = None;
        }
    }
}

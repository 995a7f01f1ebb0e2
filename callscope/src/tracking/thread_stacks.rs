//! Per-thread tracker ownership
//!
//! A [`CallStack`] models exactly one logical stack. Hosts instrumenting a
//! multi-threaded target route each thread's events to that thread's own
//! tracker; `ThreadStacks` owns the trackers and does the routing.

use std::collections::HashMap;

use log::debug;

use super::call_stack::CallStack;
use crate::domain::Tid;
use crate::symbolization::NameResolver;

/// One shadow stack per thread, created on first use
pub struct ThreadStacks<'r, R: NameResolver + ?Sized> {
    stacks: HashMap<Tid, CallStack<'r, R>>,
    resolver: &'r R,
    /// Stacks ever created, including those of exited threads
    created: usize,
}

impl<'r, R: NameResolver + ?Sized> ThreadStacks<'r, R> {
    pub fn new(resolver: &'r R) -> Self {
        Self { stacks: HashMap::new(), resolver, created: 0 }
    }

    /// The tracker for `tid`, creating an empty one if the thread is new
    pub fn stack_mut(&mut self, tid: Tid) -> &mut CallStack<'r, R> {
        let resolver = self.resolver;
        let created = &mut self.created;
        self.stacks.entry(tid).or_insert_with(|| {
            debug!("new shadow stack for {tid}");
            *created += 1;
            CallStack::new(resolver)
        })
    }

    #[must_use]
    pub fn get(&self, tid: Tid) -> Option<&CallStack<'r, R>> {
        self.stacks.get(&tid)
    }

    /// Forget a thread entirely (thread exit)
    pub fn remove(&mut self, tid: Tid) -> Option<CallStack<'r, R>> {
        self.stacks.remove(&tid)
    }

    /// Number of stacks created so far; a thread id reused after exit counts again
    #[must_use]
    pub fn created(&self) -> usize {
        self.created
    }

    /// Known thread ids in ascending order
    #[must_use]
    pub fn threads(&self) -> Vec<Tid> {
        let mut tids: Vec<Tid> = self.stacks.keys().copied().collect();
        tids.sort_unstable();
        tids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

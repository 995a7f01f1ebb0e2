//! Shadow call stack tracking
//!
//! - [`Activation`]: one modeled call frame (stack pointer, target, index)
//! - [`CallStack`]: the per-thread model and its reconciliation logic
//! - [`DumpOptions`]: filters for rendering a stack dump
//! - [`ThreadStacks`]: one `CallStack` per instrumented thread

pub mod activation;
pub mod call_stack;
pub mod dump;
pub mod thread_stacks;

pub use activation::Activation;
pub use call_stack::CallStack;
pub use dump::DumpOptions;
pub use thread_stacks::ThreadStacks;

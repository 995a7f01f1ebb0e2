//! Replay of recorded instrumentation events
//!
//! - `event_reader`: decode the fixed-size records of an event log
//! - `replayer`: route decoded events to trackers, profile and accounting

pub mod event_reader;
pub mod replayer;

pub use event_reader::EventReader;
pub use replayer::{ReplayConfig, ReplayStats, Replayer};

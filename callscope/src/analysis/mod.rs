//! Analysis logic for shadow stack samples
//!
//! This module contains pure aggregation logic, separated from the replay
//! driver and from report output.

pub mod path_profile;

pub use path_profile::{HotPath, PathProfile, RoutineHotspot};

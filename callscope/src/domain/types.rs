//! Newtype wrappers for raw machine values
//!
//! Stack pointers, call targets and instruction addresses are all plain
//! machine words; `Address` keeps them from being mixed up with depths,
//! indices and counts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A machine address (stack pointer value, call target or instruction)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub u64);

impl Address {
    /// Raw value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Thread ID of an instrumented execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tid(pub u32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_is_zero_padded() {
        assert_eq!(Address(0x401136).to_string(), "0x0000000000401136");
        assert_eq!(format!("{:x}", Address(0xbeef)), "beef");
    }

    #[test]
    fn test_address_orders_numerically() {
        assert!(Address(0x1000) > Address(0x0fff));
    }

    #[test]
    fn test_tid_display() {
        assert_eq!(Tid(1234).to_string(), "TID:1234");
    }
}

//! Monitor state passed through every command
//!
//! Handlers take the context by value and hand back the updated one; nothing
//! else in the monitor holds mutable state between commands.

use picomon_drivers::fattime::{DateTime, FatTime};

use crate::config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelContext {
    /// Last memory address touched by `peek`/`poke`/`dump`
    pub cursor: u32,
    /// The clock, as last set by `date`
    pub time: FatTime,
}

impl KernelContext {
    /// State right after reset
    pub const fn boot(time: FatTime) -> Self {
        Self {
            cursor: config::BOOT_CURSOR,
            time,
        }
    }

    /// Same state with the cursor moved
    pub const fn at(self, cursor: u32) -> Self {
        Self { cursor, ..self }
    }

    /// Same state with the cursor advanced by `step` bytes
    pub const fn advanced(self, step: u32) -> Self {
        self.at(self.cursor.wrapping_add(step))
    }
}

impl Default for KernelContext {
    fn default() -> Self {
        Self::boot(FatTime::pack(DateTime::DEFAULT))
    }
}

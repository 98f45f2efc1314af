//! Null console component (no output)
//!
//! Discards all output and never has input. For builds where the terminal
//! is not wired up.

use super::Console;

/// Null console configuration (empty - no configuration needed)
#[derive(Clone, Copy)]
pub struct NullConfig;

/// Null console component
pub struct NullConsole;

impl NullConsole {
    pub const fn new(_config: NullConfig) -> Self {
        Self
    }
}

impl Console for NullConsole {
    #[inline(always)]
    fn putc(&self, _c: u8) {}

    #[inline(always)]
    fn try_getc(&self) -> Option<u8> {
        None
    }

    #[inline(always)]
    fn puts(&self, _s: &str) {}
}

//! Console component trait
//!
//! Polled byte I/O for the monitor's terminal: no interrupts, no buffering.

use core::fmt;

/// Console trait for the monitor's terminal
///
/// Output is blocking. Input is polled through [`Console::try_getc`]; the
/// blocking [`Console::getc`] spins on it and is the one wait in the system
/// without a budget, since it waits for a person.
pub trait Console: Send + Sync {
    /// Write a single byte
    fn putc(&self, c: u8);

    /// Take one received byte if one is waiting
    fn try_getc(&self) -> Option<u8>;

    /// Wait for the next received byte
    fn getc(&self) -> u8 {
        loop {
            if let Some(c) = self.try_getc() {
                return c;
            }
            core::hint::spin_loop();
        }
    }

    /// Write a string, turning `\n` into CR LF
    fn puts(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.putc(b'\r'); // CRLF for terminals
            }
            self.putc(byte);
        }
    }

    /// Write bytes exactly as given
    fn write_bytes(&self, bytes: &[u8]) {
        for byte in bytes {
            self.putc(*byte);
        }
    }
}

/// Wrapper for using a Console with core::fmt::Write
pub struct ConsoleWriter<'a, C: Console + ?Sized> {
    console: &'a C,
}

impl<'a, C: Console + ?Sized> ConsoleWriter<'a, C> {
    pub const fn new(console: &'a C) -> Self {
        Self { console }
    }
}

impl<C: Console + ?Sized> fmt::Write for ConsoleWriter<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.console.puts(s);
        Ok(())
    }
}

// Component implementations
pub mod null;
pub mod uart;

//! Line editor with echo

use crate::components::console::Console;
use crate::config::LINE_MAX;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7F;

/// Fixed-size line buffer
///
/// Characters past [`LINE_MAX`] are dropped without echo. Only carriage
/// return ends a line.
pub struct LineEditor {
    buf: [u8; LINE_MAX],
    len: usize,
}

impl LineEditor {
    pub const fn new() -> Self {
        Self {
            buf: [0; LINE_MAX],
            len: 0,
        }
    }

    /// Handle one typed character; returns true once the line is complete
    pub fn feed<C: Console + ?Sized>(&mut self, c: u8, console: &C) -> bool {
        match c {
            b'\r' => {
                console.write_bytes(b"\r\n");
                return true;
            }
            BACKSPACE | DELETE => {
                if self.len > 0 {
                    self.len -= 1;
                    console.write_bytes(b"\x08 \x08");
                }
            }
            _ if self.len < LINE_MAX => {
                self.buf[self.len] = c;
                self.len += 1;
                console.putc(c);
            }
            _ => {}
        }
        false
    }

    /// Block until a full line has been typed
    pub fn read_line<C: Console + ?Sized>(&mut self, console: &C) -> &[u8] {
        self.clear();
        while !self.feed(console.getc(), console) {}
        self.line()
    }

    /// Contents so far
    pub fn line(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

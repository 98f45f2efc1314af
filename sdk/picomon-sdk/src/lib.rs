//! PicoMon SDK
//!
//! What a program loaded by the monitor links against.
//!
//! # Modules
//! - [`abi`]: the service table layout, fixed addresses and the
//!   [`Services`](abi::Services) trait
//!
//! # Example
//! ```ignore
//! use picomon_sdk::abi::ServiceTable;
//! use picomon_sdk::Kernel;
//!
//! #[no_mangle]
//! pub extern "C" fn _start(table: *const ServiceTable) {
//!     let Some(mut k) = (unsafe { Kernel::from_ptr(table) }).ok() else {
//!         return;
//!     };
//!     k.puts(c"=== WELCOME ===\r\n");
//!     while k.getc() != b'q' {}
//! }
//! ```

#![cfg_attr(not(test), no_std)]

pub mod abi;

use core::ffi::CStr;
use core::fmt;

use abi::{Services, ServiceTable, ABI_VERSION};

/// SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// SDK error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No table was passed in
    NullTable,
    /// The monitor speaks a different ABI revision
    VersionMismatch { found: u32 },
}

/// Handle on the running monitor
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    table: ServiceTable,
}

impl Kernel {
    /// Use the table the monitor injected
    pub fn from_table(table: &ServiceTable) -> Result<Self, Error> {
        if table.version != ABI_VERSION {
            return Err(Error::VersionMismatch {
                found: table.version,
            });
        }
        Ok(Self { table: *table })
    }

    /// # Safety
    /// `table` must be null or the pointer the monitor passed to the entry
    /// point.
    pub unsafe fn from_ptr(table: *const ServiceTable) -> Result<Self, Error> {
        match table.as_ref() {
            Some(table) => Self::from_table(table),
            None => Err(Error::NullTable),
        }
    }

    /// Call the services through the fixed jump vector instead
    ///
    /// # Safety
    /// Only meaningful on the target, where the vector is mapped at
    /// [`abi::ADDR_VECTOR`].
    pub unsafe fn fixed() -> Self {
        use core::mem::transmute;
        Self {
            table: ServiceTable {
                version: ABI_VERSION,
                putc: transmute::<usize, abi::PutcFn>(abi::ADDR_PUTC as usize),
                getc: transmute::<usize, abi::GetcFn>(abi::ADDR_GETC as usize),
                print: transmute::<usize, abi::StrFn>(abi::ADDR_PRINT as usize),
                exec: transmute::<usize, abi::StrFn>(abi::ADDR_EXEC as usize),
                ls: transmute::<usize, abi::StrFn>(abi::ADDR_LS as usize),
            },
        }
    }

    pub fn puts(&mut self, text: &CStr) {
        self.print(text);
    }
}

impl Services for Kernel {
    fn putc(&mut self, c: u8) {
        (self.table.putc)(c)
    }

    fn getc(&mut self) -> u8 {
        (self.table.getc)()
    }

    fn print(&mut self, text: &CStr) {
        (self.table.print)(text.as_ptr())
    }

    fn exec(&mut self, path: &CStr) {
        (self.table.exec)(path.as_ptr())
    }

    fn ls(&mut self, path: &CStr) {
        (self.table.ls)(path.as_ptr())
    }
}

impl fmt::Write for Kernel {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            self.putc(b);
        }
        Ok(())
    }
}

/// Read a line with echo and backspace handling
///
/// Stops at carriage return (echoed as CR LF) or when `buf` has one byte
/// left, which is set to NUL. Returns the number of bytes read.
pub fn readline<S: Services + ?Sized>(services: &mut S, buf: &mut [u8]) -> usize {
    if buf.is_empty() {
        return 0;
    }
    let mut len = 0;
    while len < buf.len() - 1 {
        let c = services.getc();
        match c {
            b'\r' => {
                services.putc(b'\r');
                services.putc(b'\n');
                break;
            }
            0x7F | 0x08 => {
                if len > 0 {
                    len -= 1;
                    services.putc(0x08);
                    services.putc(b' ');
                    services.putc(0x08);
                }
            }
            _ => {
                services.putc(c);
                buf[len] = c;
                len += 1;
            }
        }
    }
    buf[len] = 0;
    len
}

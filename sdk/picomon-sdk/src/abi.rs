//! Kernel/user binary interface
//!
//! A loaded program reaches the monitor only through a [`ServiceTable`]. The
//! monitor hands the table's address to the program in `a0` when it jumps to
//! the entry point. The same five services are also reachable through a
//! vector of jump instructions at fixed addresses (`ADDR_*`), for programs
//! built against the bare addresses.
//!
//! Strings cross the boundary NUL-terminated.

use core::ffi::{c_char, CStr};

/// Bumped whenever the table layout or a signature changes
pub const ABI_VERSION: u32 = 1;

/// Reset jump; the service vector follows it
pub const ADDR_VECTOR: u32 = 0x1000_0000;
pub const ADDR_PUTC: u32 = 0x1000_0004;
pub const ADDR_GETC: u32 = 0x1000_0008;
pub const ADDR_PRINT: u32 = 0x1000_000C;
pub const ADDR_EXEC: u32 = 0x1000_0010;
pub const ADDR_LS: u32 = 0x1000_0014;

/// Where programs are loaded and entered
pub const USER_PROG_ADDR: u32 = 0x1000_8000;

pub type PutcFn = extern "C" fn(u8);
pub type GetcFn = extern "C" fn() -> u8;
pub type StrFn = extern "C" fn(*const c_char);

/// Signature of a loaded program's entry point
pub type ProgramEntry = extern "C" fn(*const ServiceTable);

/// The published service table
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ServiceTable {
    pub version: u32,
    /// Write one byte to the console
    pub putc: PutcFn,
    /// Block until a byte arrives on the console
    pub getc: GetcFn,
    /// Write a NUL-terminated string
    pub print: StrFn,
    /// Load and run another program by file name
    pub exec: StrFn,
    /// List a directory (empty string for the root)
    pub ls: StrFn,
}

/// The five monitor primitives, as the kernel implements them and as a
/// program sees them
pub trait Services {
    fn putc(&mut self, c: u8);
    fn getc(&mut self) -> u8;
    fn print(&mut self, text: &CStr);
    fn exec(&mut self, path: &CStr);
    fn ls(&mut self, path: &CStr);
}

/// Offset of each service's jump slot in the vector
pub const fn vector_slot(addr: u32) -> u32 {
    (addr - ADDR_VECTOR) / 4
}

//! PicoMon monitor kernel
//!
//! A single-threaded ROM-monitor for an RV32 board: a serial command shell
//! with memory tools, an SD card self-test, FAT directory listing and file
//! deletion, and a loader that runs programs from the card and gives them
//! the monitor's services through a fixed table.
//!
//! # Architecture
//!
//! - `shell`: line editing, the command table and every command
//! - `loader`: `exec`, copying an image into the load area and running it
//! - `abi`: the service table handed to programs, and its shims
//! - `platform`: the device bundle the shell is generic over
//! - `components`: the console
//! - `arch`: RV32 reset vector and the register-saving trampoline
//! - `config`: memory map and compile-time choices
//!
//! # Control Flow
//!
//! ```text
//!   boot -> Monitor::start -> loop { read line -> dispatch -> handler }
//!                                                      |
//!                                     exec -> trampoline -> program
//!                                                      ^        |
//!                                                      +- SERVICE_TABLE
//! ```

#![cfg_attr(not(test), no_std)]

/// Formatted output on a [`platform::Devices`] console
macro_rules! out {
    ($dev:expr, $($arg:tt)*) => {{
        use core::fmt::Write as _;
        let _ = write!($dev.out(), $($arg)*);
    }};
}

/// Formatted output on a [`platform::Devices`] console, ending the line
macro_rules! outln {
    ($dev:expr, $($arg:tt)*) => {{
        use core::fmt::Write as _;
        let _ = writeln!($dev.out(), $($arg)*);
    }};
}

pub mod abi;
pub mod arch;
pub mod components;
pub mod config;
pub mod context;
pub mod debug;
pub mod loader;
pub mod platform;
pub mod shell;
pub mod trampoline;

#[cfg(test)]
mod testing;

pub use context::KernelContext;
pub use platform::{Devices, Platform};
pub use shell::Monitor;
pub use trampoline::Trampoline;

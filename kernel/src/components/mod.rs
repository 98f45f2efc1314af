//! Kernel components
//!
//! Minimal device components built into the monitor. Storage lives in the
//! `picomon-drivers` crate; what remains here is what the monitor needs to
//! talk to the user:
//! - **console**: polled byte I/O on the terminal UART
//!
//! # Component Composition (Compile-Time)
//!
//! The console is chosen at compile time via cargo features:
//!
//! ```ignore
//! #[cfg(not(feature = "console-null"))]
//! pub static CONSOLE: UartConsole = UartConsole::new(UART_CONFIG);
//! ```

pub mod console;

//! Board configuration and component composition
//!
//! The memory map of the target board, the monitor's fixed limits, and the
//! compile-time console selection:
//! - `console-uart`: the memory-mapped UART (default)
//! - `console-null`: no console output

#[cfg(feature = "console-null")]
use crate::components::console::null::{NullConfig, NullConsole};
use crate::components::console::uart::UartConfig;
#[cfg(not(feature = "console-null"))]
use crate::components::console::uart::UartConsole;

/// Start of RAM; the reset/service vector lives here
pub const RAM_BASE: u32 = 0x1000_0000;

/// Cursor value at boot: the service table base
pub const BOOT_CURSOR: u32 = RAM_BASE;

pub const UART_DATA: usize = 0x2000_0000;
pub const UART_STATUS: usize = 0x2000_0004;

/// SD card bit-bang port
pub const SD_PORT: usize = 0x3000_0000;

/// Load address for user programs, clear of monitor code and data
pub const USER_PROG_ADDR: u32 = picomon_sdk::abi::USER_PROG_ADDR;

/// Size of the load area; larger images are refused
pub const USER_PROG_MAX: u32 = 0x8000;

/// Longest command line, excluding the terminator
pub const LINE_MAX: usize = 63;

/// Status polls per transmitted byte before the UART is written anyway
pub const TX_POLL_BUDGET: u32 = 100_000;

pub const BANNER: &str = "=== PicoMon v1.0 ===";
pub const PROMPT: &str = "> ";

/// Compile-time log level
pub const LOG_LEVEL: log::LevelFilter = if cfg!(feature = "log-trace") {
    log::LevelFilter::Trace
} else if cfg!(feature = "log-debug") {
    log::LevelFilter::Debug
} else if cfg!(feature = "log-info") {
    log::LevelFilter::Info
} else if cfg!(feature = "log-warn") {
    log::LevelFilter::Warn
} else if cfg!(feature = "log-error") {
    log::LevelFilter::Error
} else {
    log::LevelFilter::Off
};

/// Console component selection (compile-time)
#[cfg(feature = "console-null")]
pub static CONSOLE: NullConsole = NullConsole::new(NullConfig);

#[cfg(not(feature = "console-null"))]
pub static CONSOLE: UartConsole = UartConsole::new(UART_CONFIG);

pub const UART_CONFIG: UartConfig = UartConfig {
    data: UART_DATA,
    status: UART_STATUS,
    tx_poll_budget: TX_POLL_BUDGET,
};

/// The console type selected by features
#[cfg(feature = "console-null")]
pub type BoardConsole = NullConsole;
#[cfg(not(feature = "console-null"))]
pub type BoardConsole = UartConsole;

/// A fresh handle on the selected console, for the monitor's own use
#[cfg(feature = "console-null")]
pub const fn board_console() -> BoardConsole {
    NullConsole::new(NullConfig)
}

#[cfg(not(feature = "console-null"))]
pub const fn board_console() -> BoardConsole {
    UartConsole::new(UART_CONFIG)
}

/// Get reference to the global console
pub fn console() -> &'static BoardConsole {
    &CONSOLE
}

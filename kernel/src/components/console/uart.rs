//! Memory-mapped UART console component
//!
//! Two 32-bit registers:
//!
//! ```text
//!   data    write: transmit byte   read: received byte
//!   status  bit 0 RX_READY, bit 1 TX_BUSY
//! ```

use bitflags::bitflags;
use picomon_drivers::hal::{poll, Register};

use super::Console;

bitflags! {
    /// UART status register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UartStatus: u32 {
        const RX_READY = 1 << 0;
        const TX_BUSY  = 1 << 1;
    }
}

/// UART console component configuration
#[derive(Clone, Copy)]
pub struct UartConfig {
    /// Data register address
    pub data: usize,
    /// Status register address
    pub status: usize,
    /// Status polls per byte before transmitting regardless
    pub tx_poll_budget: u32,
}

/// UART console (kernel component)
///
/// The UART needs no setup: baud rate and framing are fixed in hardware.
pub struct UartConsole {
    data: Register,
    status: Register,
    tx_poll_budget: u32,
}

impl UartConsole {
    /// Create a new UART console from configuration
    ///
    /// The addresses in `config` must be the board's UART registers.
    pub const fn new(config: UartConfig) -> Self {
        // Safety: board addresses from config.rs
        unsafe {
            Self {
                data: Register::new(config.data),
                status: Register::new(config.status),
                tx_poll_budget: config.tx_poll_budget,
            }
        }
    }

    #[inline]
    fn status(&self) -> UartStatus {
        UartStatus::from_bits_truncate(self.status.read())
    }
}

impl Console for UartConsole {
    fn putc(&self, c: u8) {
        // A wedged transmitter drops characters instead of hanging the monitor
        let _ = poll(self.tx_poll_budget, || {
            (!self.status().contains(UartStatus::TX_BUSY)).then_some(())
        });
        self.data.write(c as u32);
    }

    fn try_getc(&self) -> Option<u8> {
        if self.status().contains(UartStatus::RX_READY) {
            Some(self.data.read() as u8)
        } else {
            None
        }
    }
}

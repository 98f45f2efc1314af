//! Bit-banged SPI transport
//!
//! The card socket hangs off a single port register. Writing the register
//! drives the outputs; reading it returns MISO in bit 0.
//!
//! ```text
//!   bit 0  SCK   clock
//!   bit 1  MOSI  data to card
//!   bit 2  CS    chip select, active low
//! ```
//!
//! One [`BitBangSpi::exchange`] clocks eight bits, most significant first:
//! drive MOSI with SCK low, raise SCK, sample MISO. SCK drops again when the
//! next bit is set up. The transport has no error conditions.

use bitflags::bitflags;

use crate::hal::Register;

bitflags! {
    /// Output lines on the SD port register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PortBits: u32 {
        const SCK  = 1 << 0;
        const MOSI = 1 << 1;
        const CS   = 1 << 2;
    }
}

/// MISO is reported in bit 0 when the port is read
pub const MISO: u32 = 1 << 0;

/// The port register the transport toggles
pub trait SpiPort {
    fn write(&mut self, bits: PortBits);
    fn read(&mut self) -> u32;
}

impl SpiPort for Register {
    #[inline]
    fn write(&mut self, bits: PortBits) {
        Register::write(self, bits.bits());
    }

    #[inline]
    fn read(&mut self) -> u32 {
        Register::read(self)
    }
}

/// SPI master built from GPIO toggles
pub struct BitBangSpi<P> {
    port: P,
    /// Level applied to CS on every write (CS set = card deselected)
    cs: PortBits,
}

impl<P: SpiPort> BitBangSpi<P> {
    /// Wrap a port, starting with the card deselected
    pub fn new(port: P) -> Self {
        Self {
            port,
            cs: PortBits::CS,
        }
    }

    /// Pull CS low and leave MOSI idle-high
    pub fn select(&mut self) {
        self.cs = PortBits::empty();
        self.port.write(PortBits::MOSI);
    }

    /// Release CS and leave MOSI idle-high
    pub fn deselect(&mut self) {
        self.cs = PortBits::CS;
        self.port.write(PortBits::CS | PortBits::MOSI);
    }

    pub fn is_selected(&self) -> bool {
        !self.cs.contains(PortBits::CS)
    }

    /// Shift `out` to the card while shifting its reply back in
    pub fn exchange(&mut self, out: u8) -> u8 {
        let mut input = 0u8;
        for bit in (0..8).rev() {
            let mosi = if (out >> bit) & 1 != 0 {
                PortBits::MOSI
            } else {
                PortBits::empty()
            };
            self.port.write(self.cs | mosi);
            self.port.write(self.cs | mosi | PortBits::SCK);
            if self.port.read() & MISO != 0 {
                input |= 1 << bit;
            }
        }
        input
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn into_inner(self) -> P {
        self.port
    }
}

//! SD card block protocol over SPI
//!
//! # Protocol
//!
//! Every command is a six-byte frame preceded by one idle byte:
//!
//! ```text
//!   0xFF | 0x40 | cmd | arg[31:24] | arg[23:16] | arg[15:8] | arg[7:0] | crc
//! ```
//!
//! The card answers with an R1 status byte whose top bit is clear. Until it
//! does, the line reads 0xFF.
//!
//! Initialization: ≥ 74 clocks with the card deselected, CMD0 until the card
//! reports "idle", CMD8 with the 0x1AA voltage check pattern, then
//! CMD55 + ACMD41 until the card leaves the idle state.
//!
//! Single-block read: CMD17, wait for the 0xFE data token, 512 data bytes,
//! two CRC bytes. Single-block write: CMD24, a gap byte, the 0xFE token, 512
//! data bytes, two CRC filler bytes, then the data-response token (low five
//! bits `0b00101` = accepted) and the busy phase where the card holds MISO
//! low until the flash program completes.
//!
//! Every wait is bounded by a budget in [`SdConfig`]; running out yields a
//! distinct [`SdError`] instead of hanging.

use bitflags::bitflags;
use log::{debug, trace, warn};
use thiserror::Error;

use crate::block::{Block, BlockDriver};
use crate::hal::poll;
use crate::spi::{BitBangSpi, SpiPort};

/// SD commands used in SPI mode
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Command {
    /// Software reset
    GoIdleState = 0,
    /// Check voltage range (SDC V2)
    SendIfCond = 8,
    /// Read one block
    ReadSingleBlock = 17,
    /// Write one block
    WriteBlock = 24,
    /// Initiate initialization process (application-specific)
    SdSendOpCond = 41,
    /// Next command is application-specific
    AppCmd = 55,
}

bitflags! {
    /// R1 response flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct R1: u8 {
        const IDLE_STATE           = 0x01;
        const ERASE_RESET          = 0x02;
        const ILLEGAL_COMMAND      = 0x04;
        const COM_CRC_ERROR        = 0x08;
        const ERASE_SEQUENCE_ERROR = 0x10;
        const ADDRESS_ERROR        = 0x20;
        const PARAMETER_ERROR      = 0x40;
    }
}

/// Start token for single-block data, both directions
pub const DATA_START_BLOCK: u8 = 0xFE;

/// Data response: low five bits when the card accepted a written block
pub const DATA_RES_ACCEPTED: u8 = 0b0_0101;
pub const DATA_RES_MASK: u8 = 0x1F;

/// CMD8 argument: 2.7-3.6V range plus the 0xAA check pattern
pub const IF_COND_PATTERN: u32 = 0x1AA;

/// ACMD41 argument: host supports high-capacity cards
pub const ACMD41_HCS: u32 = 0x4000_0000;

/// Retry budgets for every bounded wait in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdConfig {
    /// Idle bytes clocked with the card deselected before CMD0
    pub idle_bytes: u32,
    /// CMD0 attempts before reporting no card
    pub reset_retries: u32,
    /// Bytes polled for an R1 response after each command frame
    pub response_polls: u32,
    /// CMD55 + ACMD41 rounds before giving up on the card leaving idle
    pub init_retries: u32,
    /// Bytes polled for the data start token on a read
    pub read_token_polls: u32,
    /// Bytes polled for the card to release busy after a write
    pub write_busy_polls: u32,
}

impl SdConfig {
    pub const DEFAULT: Self = Self {
        idle_bytes: 10,
        reset_retries: 100,
        response_polls: 100,
        init_retries: 20_000,
        read_token_polls: 20_000,
        write_busy_polls: 1_000_000,
    };
}

impl Default for SdConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// SD protocol errors
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SdError {
    #[error("no card: reset was never acknowledged")]
    NoCard,

    #[error("card did not leave the idle state")]
    InitTimeout,

    #[error("command {cmd} rejected (R1 {r1:#04x})")]
    Rejected { cmd: u8, r1: u8 },

    #[error("timed out waiting for the data token")]
    ReadTimeout,

    #[error("write rejected (data response {response:#04x})")]
    WriteRejected { response: u8 },

    #[error("card stayed busy after write")]
    BusyTimeout,
}

impl SdError {
    /// Numeric code the monitor prints for this error
    ///
    /// Codes are per operation: init reports -1/-2, read -1/-2, write
    /// -1/-2/-3.
    pub const fn code(&self) -> i32 {
        match self {
            SdError::NoCard => -1,
            SdError::InitTimeout => -2,
            SdError::Rejected { .. } => -1,
            SdError::ReadTimeout => -2,
            SdError::WriteRejected { .. } => -2,
            SdError::BusyTimeout => -3,
        }
    }
}

/// SD card in SPI mode
pub struct SdCard<P> {
    spi: BitBangSpi<P>,
    config: SdConfig,
}

impl<P: SpiPort> SdCard<P> {
    pub fn new(port: P) -> Self {
        Self::with_config(port, SdConfig::DEFAULT)
    }

    pub fn with_config(port: P, config: SdConfig) -> Self {
        Self {
            spi: BitBangSpi::new(port),
            config,
        }
    }

    pub fn config(&self) -> &SdConfig {
        &self.config
    }

    pub fn spi(&self) -> &BitBangSpi<P> {
        &self.spi
    }

    pub fn spi_mut(&mut self) -> &mut BitBangSpi<P> {
        &mut self.spi
    }

    /// Bring the card from power-up into the ready state
    pub fn init(&mut self) -> Result<(), SdError> {
        self.spi.deselect();
        for _ in 0..self.config.idle_bytes {
            self.spi.exchange(0xFF);
        }
        self.spi.select();

        // CMD0 carries a real CRC: the card still checks it before SPI mode
        let reset_retries = self.config.reset_retries;
        let reset = poll(reset_retries, || {
            if self.command(Command::GoIdleState, 0, 0x95) == R1::IDLE_STATE.bits() {
                Some(())
            } else {
                self.spi.exchange(0xFF);
                None
            }
        });
        if reset.is_none() {
            warn!("sd: no reset response after {} attempts", reset_retries);
            self.release();
            return Err(SdError::NoCard);
        }

        let r1 = self.command(Command::SendIfCond, IF_COND_PATTERN, 0x87);
        debug!("sd: CMD8 -> {:?}", R1::from_bits_truncate(r1));

        let init_retries = self.config.init_retries;
        let ready = poll(init_retries, || {
            self.command(Command::AppCmd, 0, 0xFF);
            (self.command(Command::SdSendOpCond, ACMD41_HCS, 0xFF) == 0).then_some(())
        });
        self.release();

        match ready {
            Some(()) => {
                debug!("sd: card ready");
                Ok(())
            }
            None => {
                warn!("sd: card still idle after {} ACMD41 rounds", init_retries);
                Err(SdError::InitTimeout)
            }
        }
    }

    /// Read one block
    pub fn read(&mut self, lba: u32, buf: &mut Block) -> Result<(), SdError> {
        let r1 = self.command(Command::ReadSingleBlock, lba, 0xFF);
        if r1 != 0 {
            warn!("sd: read of block {} rejected, R1 {:#04x}", lba, r1);
            self.release();
            return Err(SdError::Rejected {
                cmd: Command::ReadSingleBlock as u8,
                r1,
            });
        }

        let token_polls = self.config.read_token_polls;
        let token = poll(token_polls, || {
            (self.spi.exchange(0xFF) == DATA_START_BLOCK).then_some(())
        });
        if token.is_none() {
            warn!("sd: no data token for block {}", lba);
            self.release();
            return Err(SdError::ReadTimeout);
        }

        for byte in buf.iter_mut() {
            *byte = self.spi.exchange(0xFF);
        }
        // CRC, unchecked
        self.spi.exchange(0xFF);
        self.spi.exchange(0xFF);

        self.release();
        Ok(())
    }

    /// Write one block
    pub fn write(&mut self, lba: u32, buf: &Block) -> Result<(), SdError> {
        let r1 = self.command(Command::WriteBlock, lba, 0xFF);
        if r1 != 0 {
            warn!("sd: write of block {} rejected, R1 {:#04x}", lba, r1);
            self.release();
            return Err(SdError::Rejected {
                cmd: Command::WriteBlock as u8,
                r1,
            });
        }

        self.spi.exchange(0xFF);
        self.spi.exchange(DATA_START_BLOCK);
        for byte in buf.iter() {
            self.spi.exchange(*byte);
        }
        // CRC filler, ignored in SPI mode
        self.spi.exchange(0xFF);
        self.spi.exchange(0xFF);

        let response = self.spi.exchange(0xFF);
        if response & DATA_RES_MASK != DATA_RES_ACCEPTED {
            warn!("sd: block {} data response {:#04x}", lba, response);
            self.release();
            return Err(SdError::WriteRejected { response });
        }

        let busy_polls = self.config.write_busy_polls;
        let released = poll(busy_polls, || (self.spi.exchange(0xFF) != 0).then_some(()));
        self.release();
        match released {
            Some(()) => Ok(()),
            None => {
                warn!("sd: card busy after writing block {}", lba);
                Err(SdError::BusyTimeout)
            }
        }
    }

    /// Send one command frame and return the R1 byte (0xFF if none came)
    fn command(&mut self, cmd: Command, arg: u32, crc: u8) -> u8 {
        trace!("sd: {:?}({:#x})", cmd, arg);
        self.spi.select();
        self.spi.exchange(0xFF);
        self.spi.exchange(cmd as u8 | 0x40);
        for byte in arg.to_be_bytes() {
            self.spi.exchange(byte);
        }
        self.spi.exchange(crc);

        let polls = self.config.response_polls;
        poll(polls, || {
            let r1 = self.spi.exchange(0xFF);
            (r1 & 0x80 == 0).then_some(r1)
        })
        .unwrap_or(0xFF)
    }

    /// Deselect the card and clock one byte so it lets go of MISO
    fn release(&mut self) {
        self.spi.deselect();
        self.spi.exchange(0xFF);
    }
}

impl<P: SpiPort> BlockDriver for SdCard<P> {
    fn initialize(&mut self) -> Result<(), SdError> {
        self.init()
    }

    fn read_block(&mut self, lba: u32, buf: &mut Block) -> Result<(), SdError> {
        self.read(lba, buf)
    }

    fn write_block(&mut self, lba: u32, buf: &Block) -> Result<(), SdError> {
        self.write(lba, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BLOCK_SIZE;
    use crate::sim::{Fault, SimCard};

    fn quick() -> SdConfig {
        SdConfig {
            idle_bytes: 10,
            reset_retries: 5,
            response_polls: 8,
            init_retries: 50,
            read_token_polls: 64,
            write_busy_polls: 256,
        }
    }

    fn card<const N: usize>(sim: SimCard<N>) -> SdCard<SimCard<N>> {
        SdCard::with_config(sim, quick())
    }

    fn pattern(seed: u8) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        for (i, byte) in block.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(31).wrapping_add(seed);
        }
        block
    }

    #[test]
    fn init_completes_handshake() {
        let mut sd = card(SimCard::<4>::new());
        sd.init().unwrap();

        let sim = sd.spi().port();
        assert!(sim.is_ready());
        assert!(sim.command_count(0) >= 1);
        assert_eq!(sim.command_count(8), 1);
        assert_eq!(sim.last_arg(8), Some(IF_COND_PATTERN));
        assert_eq!(sim.command_count(55), sim.command_count(41));
        assert!(!sd.spi().is_selected());
    }

    #[test]
    fn init_waits_through_busy_acmd41_rounds() {
        let mut sd = card(SimCard::<4>::new().with_init_rounds(7));
        sd.init().unwrap();
        assert_eq!(sd.spi().port().command_count(41), 8);
    }

    #[test]
    fn init_is_idempotent() {
        let mut sd = card(SimCard::<4>::new());
        sd.init().unwrap();
        sd.init().unwrap();

        let block = pattern(3);
        sd.write(1, &block).unwrap();
        let mut back = [0u8; BLOCK_SIZE];
        sd.read(1, &mut back).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn unresponsive_card_fails_within_budget() {
        let mut sd = card(SimCard::<4>::new().with_fault(Fault::Unresponsive));
        assert_eq!(sd.init(), Err(SdError::NoCard));
        // the card never decodes a frame, so count clocked bytes instead
        let frame_bytes = 7 + quick().response_polls as u64;
        let max_bytes = quick().idle_bytes as u64
            + quick().reset_retries as u64 * (frame_bytes + 1)
            + 1;
        assert!(sd.spi().port().bytes_clocked() <= max_bytes);
    }

    #[test]
    fn card_that_never_leaves_idle_times_out() {
        let mut sd = card(SimCard::<4>::new().with_fault(Fault::NeverReady));
        assert_eq!(sd.init(), Err(SdError::InitTimeout));
        assert_eq!(sd.spi().port().command_count(41), quick().init_retries);
    }

    #[test]
    fn round_trip_every_sector() {
        let mut sd = card(SimCard::<16>::new());
        sd.init().unwrap();

        for lba in 0..16u32 {
            sd.write(lba, &pattern(lba as u8)).unwrap();
        }
        for lba in 0..16u32 {
            let mut back = [0u8; BLOCK_SIZE];
            sd.read(lba, &mut back).unwrap();
            assert_eq!(back, pattern(lba as u8), "sector {}", lba);
        }
    }

    #[test]
    fn read_out_of_range_is_rejected() {
        let mut sd = card(SimCard::<4>::new());
        sd.init().unwrap();
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(
            sd.read(99, &mut buf),
            Err(SdError::Rejected {
                cmd: 17,
                r1: R1::ADDRESS_ERROR.bits()
            })
        );
    }

    #[test]
    fn write_out_of_range_is_rejected() {
        let mut sd = card(SimCard::<4>::new());
        sd.init().unwrap();
        let err = sd.write(4, &pattern(9)).unwrap_err();
        assert_eq!(
            err,
            SdError::Rejected {
                cmd: 24,
                r1: R1::ADDRESS_ERROR.bits()
            }
        );
        assert_eq!(err.code(), -1);
        assert!(!sd.spi().is_selected());

        // the card is still usable afterwards
        sd.write(3, &pattern(3)).unwrap();
        assert_eq!(sd.spi().port().block(3), &pattern(3));
    }

    #[test]
    fn missing_data_token_times_out() {
        let mut sd = card(SimCard::<4>::new().with_fault(Fault::NoDataToken));
        sd.init().unwrap();
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(sd.read(0, &mut buf), Err(SdError::ReadTimeout));
    }

    #[test]
    fn rejected_data_response_is_reported() {
        let mut sd = card(SimCard::<4>::new().with_fault(Fault::RejectWriteAt(2)));
        sd.init().unwrap();
        sd.write(1, &pattern(1)).unwrap();
        let err = sd.write(2, &pattern(2)).unwrap_err();
        assert!(matches!(err, SdError::WriteRejected { .. }));
        assert_eq!(err.code(), -2);
    }

    #[test]
    fn stuck_busy_times_out() {
        let mut sd = card(SimCard::<4>::new().with_fault(Fault::StuckBusy));
        sd.init().unwrap();
        assert_eq!(sd.write(0, &pattern(0)), Err(SdError::BusyTimeout));
    }

    #[test]
    fn commands_before_init_are_rejected() {
        let mut sd = card(SimCard::<4>::new());
        let mut buf = [0u8; BLOCK_SIZE];
        let err = sd.read(0, &mut buf).unwrap_err();
        assert!(matches!(err, SdError::Rejected { cmd: 17, .. }));
    }
}

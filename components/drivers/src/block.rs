//! Single-block driver contract
//!
//! What the disk adapter needs from a storage driver: bring the medium up,
//! then move one 512-byte block at a time by LBA.

use crate::sd::SdError;

/// Sector size, fixed for SD cards in SPI mode
pub const BLOCK_SIZE: usize = 512;

/// One sector's worth of bytes
pub type Block = [u8; BLOCK_SIZE];

/// A block-addressed storage driver
pub trait BlockDriver {
    /// Run the medium's power-up handshake
    fn initialize(&mut self) -> Result<(), SdError>;

    /// Read the block at `lba` into `buf`
    fn read_block(&mut self, lba: u32, buf: &mut Block) -> Result<(), SdError>;

    /// Write `buf` to the block at `lba`
    fn write_block(&mut self, lba: u32, buf: &Block) -> Result<(), SdError>;
}

//! Disk adapter
//!
//! The generic block-device contract a FAT library expects (status,
//! initialize, multi-sector read/write, ioctl, timestamp source), bridged onto
//! any single-block [`BlockDriver`].

use bitflags::bitflags;
use log::warn;
use thiserror::Error;

use crate::block::{Block, BlockDriver, BLOCK_SIZE};
use crate::fattime::{Clock, FatTime};

bitflags! {
    /// Drive status flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DiskStatus: u8 {
        const NOINIT  = 0x01;
        const NODISK  = 0x02;
        const PROTECT = 0x04;
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DiskError {
    /// A block operation failed somewhere inside the request
    #[error("disk I/O error")]
    Io,

    #[error("disk not initialized")]
    NotReady,

    #[error("invalid parameter")]
    InvalidParameter,
}

/// Control requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlCommand {
    Sync,
    GetSectorCount,
    GetSectorSize,
    GetBlockSize,
}

/// What a FAT library calls into
pub trait DiskIo {
    fn status(&self) -> DiskStatus;
    fn initialize(&mut self) -> DiskStatus;

    /// Read `count` sectors starting at `sector` into `buf`
    fn read(&mut self, sector: u32, count: u32, buf: &mut [u8]) -> Result<(), DiskError>;

    /// Write `count` sectors starting at `sector` from `buf`
    fn write(&mut self, sector: u32, count: u32, buf: &[u8]) -> Result<(), DiskError>;

    fn ioctl(&mut self, cmd: IoctlCommand) -> Result<(), DiskError>;

    /// Timestamp stamped on created and modified files
    fn fattime(&self) -> FatTime;
}

/// [`DiskIo`] over a block driver and the monitor clock
pub struct DiskAdapter<'c, D> {
    driver: D,
    clock: &'c Clock,
}

impl<'c, D: BlockDriver> DiskAdapter<'c, D> {
    pub fn new(driver: D, clock: &'c Clock) -> Self {
        Self { driver, clock }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn clock(&self) -> &'c Clock {
        self.clock
    }

    pub fn into_inner(self) -> D {
        self.driver
    }
}

fn span(count: u32, len: usize) -> Result<usize, DiskError> {
    let needed = (count as usize)
        .checked_mul(BLOCK_SIZE)
        .ok_or(DiskError::InvalidParameter)?;
    if len < needed {
        return Err(DiskError::InvalidParameter);
    }
    Ok(needed)
}

impl<D: BlockDriver> DiskIo for DiskAdapter<'_, D> {
    /// No card-detect line: the drive always claims to be ready
    fn status(&self) -> DiskStatus {
        DiskStatus::empty()
    }

    fn initialize(&mut self) -> DiskStatus {
        match self.driver.initialize() {
            Ok(()) => DiskStatus::empty(),
            Err(err) => {
                warn!("disk: initialize failed: {}", err);
                DiskStatus::NOINIT
            }
        }
    }

    fn read(&mut self, sector: u32, count: u32, buf: &mut [u8]) -> Result<(), DiskError> {
        let needed = span(count, buf.len())?;
        let mut block: Block = [0; BLOCK_SIZE];
        for (i, chunk) in buf[..needed].chunks_exact_mut(BLOCK_SIZE).enumerate() {
            let lba = sector.wrapping_add(i as u32);
            if let Err(err) = self.driver.read_block(lba, &mut block) {
                warn!("disk: read of sector {} failed: {}", lba, err);
                return Err(DiskError::Io);
            }
            chunk.copy_from_slice(&block);
        }
        Ok(())
    }

    fn write(&mut self, sector: u32, count: u32, buf: &[u8]) -> Result<(), DiskError> {
        let needed = span(count, buf.len())?;
        let mut block: Block = [0; BLOCK_SIZE];
        for (i, chunk) in buf[..needed].chunks_exact(BLOCK_SIZE).enumerate() {
            let lba = sector.wrapping_add(i as u32);
            block.copy_from_slice(chunk);
            if let Err(err) = self.driver.write_block(lba, &block) {
                warn!("disk: write of sector {} failed: {}", lba, err);
                return Err(DiskError::Io);
            }
        }
        Ok(())
    }

    fn ioctl(&mut self, _cmd: IoctlCommand) -> Result<(), DiskError> {
        Ok(())
    }

    fn fattime(&self) -> FatTime {
        self.clock.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fattime::DateTime;
    use crate::sd::{SdCard, SdConfig};
    use crate::sim::{Fault, SimCard};

    const QUICK: SdConfig = SdConfig {
        idle_bytes: 10,
        reset_retries: 5,
        response_polls: 8,
        init_retries: 50,
        read_token_polls: 64,
        write_busy_polls: 256,
    };

    fn adapter<const N: usize>(sim: SimCard<N>, clock: &Clock) -> DiskAdapter<'_, SdCard<SimCard<N>>> {
        let mut disk = DiskAdapter::new(SdCard::with_config(sim, QUICK), clock);
        assert_eq!(disk.initialize(), DiskStatus::empty());
        disk
    }

    fn sim<'a>(disk: &'a DiskAdapter<'_, SdCard<SimCard<8>>>) -> &'a SimCard<8> {
        disk.driver().spi().port()
    }

    #[test]
    fn status_is_always_ready() {
        let clock = Clock::new();
        let disk = DiskAdapter::new(SdCard::with_config(SimCard::<8>::new(), QUICK), &clock);
        assert_eq!(disk.status(), DiskStatus::empty());
    }

    #[test]
    fn failed_initialize_reports_noinit() {
        let clock = Clock::new();
        let card = SimCard::<8>::new().with_fault(Fault::Unresponsive);
        let mut disk = DiskAdapter::new(SdCard::with_config(card, QUICK), &clock);
        assert_eq!(disk.initialize(), DiskStatus::NOINIT);
    }

    #[test]
    fn multi_sector_matches_single_sector_ops() {
        let clock = Clock::new();
        let mut disk = adapter(SimCard::<8>::new(), &clock);

        let mut data = [0u8; 3 * BLOCK_SIZE];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (i / 7) as u8;
        }
        disk.write(2, 3, &data).unwrap();

        for i in 0..3 {
            assert_eq!(
                &sim(&disk).block(2 + i as u32)[..],
                &data[i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE]
            );
        }

        let mut back = [0u8; 3 * BLOCK_SIZE];
        disk.read(2, 3, &mut back).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn write_failure_aborts_remaining_sectors() {
        let clock = Clock::new();
        let mut disk = adapter(SimCard::<8>::new().with_fault(Fault::RejectWriteAt(3)), &clock);

        let data = [0xA5u8; 4 * BLOCK_SIZE];
        assert_eq!(disk.write(1, 4, &data), Err(DiskError::Io));

        // sectors before the failure were written, the rest never touched
        assert_eq!(sim(&disk).block(1), &[0xA5; BLOCK_SIZE]);
        assert_eq!(sim(&disk).block(2), &[0xA5; BLOCK_SIZE]);
        assert_eq!(sim(&disk).block(3), &[0; BLOCK_SIZE]);
        assert_eq!(sim(&disk).block(4), &[0; BLOCK_SIZE]);
        assert_eq!(sim(&disk).command_count(24), 3);
    }

    #[test]
    fn read_failure_aborts_the_call() {
        let clock = Clock::new();
        let mut disk = adapter(SimCard::<8>::new().with_fault(Fault::RejectReadAt(5)), &clock);

        let mut buf = [0u8; 4 * BLOCK_SIZE];
        assert_eq!(disk.read(4, 4, &mut buf), Err(DiskError::Io));
        assert_eq!(sim(&disk).command_count(17), 2);
    }

    #[test]
    fn short_buffer_is_rejected_before_any_io() {
        let clock = Clock::new();
        let mut disk = adapter(SimCard::<8>::new(), &clock);

        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(disk.read(0, 2, &mut buf), Err(DiskError::InvalidParameter));
        assert_eq!(disk.write(0, 2, &buf), Err(DiskError::InvalidParameter));
        assert_eq!(sim(&disk).command_count(17), 0);
        assert_eq!(sim(&disk).command_count(24), 0);
    }

    #[test]
    fn huge_counts_are_rejected_before_any_io() {
        let clock = Clock::new();
        let mut disk = adapter(SimCard::<8>::new(), &clock);

        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(disk.read(0, u32::MAX, &mut buf), Err(DiskError::InvalidParameter));
        assert_eq!(disk.write(0, u32::MAX, &buf), Err(DiskError::InvalidParameter));
        assert_eq!(sim(&disk).command_count(17), 0);
        assert_eq!(sim(&disk).command_count(24), 0);
    }

    #[test]
    fn span_never_wraps() {
        assert_eq!(span(2, 2 * BLOCK_SIZE), Ok(2 * BLOCK_SIZE));
        if usize::BITS == 32 {
            // u32::MAX blocks overflows a 32-bit usize and must not wrap
            // into a length that passes the check
            assert_eq!(span(u32::MAX, usize::MAX), Err(DiskError::InvalidParameter));
        }
    }

    #[test]
    fn ioctl_is_a_noop() {
        let clock = Clock::new();
        let mut disk = adapter(SimCard::<8>::new(), &clock);
        for cmd in [
            IoctlCommand::Sync,
            IoctlCommand::GetSectorCount,
            IoctlCommand::GetSectorSize,
            IoctlCommand::GetBlockSize,
        ] {
            assert_eq!(disk.ioctl(cmd), Ok(()));
        }
    }

    #[test]
    fn fattime_follows_the_clock() {
        let clock = Clock::new();
        let disk = adapter(SimCard::<8>::new(), &clock);
        assert_eq!(disk.fattime().unpack(), DateTime::DEFAULT);

        let later = DateTime {
            year: 2027,
            ..DateTime::DEFAULT
        };
        clock.set(later.into());
        assert_eq!(disk.fattime().unpack(), later);
    }
}

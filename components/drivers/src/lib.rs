//! PicoMon storage drivers
//!
//! # Purpose
//! Everything between the monitor and the SD card socket:
//!
//! - `hal`: raw register/memory access and the bounded polling primitive
//! - `spi`: bit-banged SPI transport over a single port register
//! - `sd`: SD card initialization and single-block read/write protocol
//! - `diskio`: the generic block-device contract the filesystem consumes
//! - `fattime`: packed FAT timestamps and the monitor clock
//!
//! # Integration Points
//! - Depends on: nothing but the port register and RAM
//! - Provides to: `picomon-vfs` (block device), `picomon-kernel` (memory
//!   access, storage self-test, clock)
//!
//! # Testing Strategy
//! - Unit tests: bit ordering, protocol sequencing, retry budgets
//! - `sim` feature: a bit-level simulated card used by every layer above

#![cfg_attr(not(test), no_std)]

pub mod block;
pub mod diskio;
pub mod fattime;
pub mod hal;
pub mod sd;
pub mod spi;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use block::{Block, BlockDriver, BLOCK_SIZE};
pub use diskio::{DiskAdapter, DiskError, DiskIo, DiskStatus, IoctlCommand};
pub use fattime::{Clock, DateTime, FatTime};
pub use hal::{Bus, PhysBus, Register};
pub use sd::{SdCard, SdConfig, SdError};
pub use spi::{BitBangSpi, PortBits, SpiPort};

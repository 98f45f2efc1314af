//! FAT volumes over a [`DiskIo`]
//!
//! Uses `embedded-sdmmc` for the on-disk format. The disk is initialized
//! lazily on the first block access, the first partition is the volume, and
//! file timestamps come from the monitor clock.

use core::cell::{Cell, RefCell};

use embedded_sdmmc::{
    Block as SdBlock, BlockCount, BlockDevice, BlockIdx, Error as SdmmcError, Mode, RawDirectory,
    RawFile, RawVolume, TimeSource, Timestamp, VolumeIdx, VolumeManager,
};
use log::{debug, warn};

use picomon_drivers::{Clock, DiskError, DiskIo, DiskStatus};

use crate::{components, split_parent, DirEntry, DirError, FileSystem, FsError, OpenMode};

/// Adapts a [`DiskIo`] to `embedded-sdmmc`'s block device
pub struct FatBlockDevice<D> {
    disk: RefCell<D>,
    ready: Cell<bool>,
}

impl<D: DiskIo> FatBlockDevice<D> {
    pub fn new(disk: D) -> Self {
        Self {
            disk: RefCell::new(disk),
            ready: Cell::new(false),
        }
    }

    fn with_disk<T>(&self, op: impl FnOnce(&mut D) -> Result<T, DiskError>) -> Result<T, DiskError> {
        let mut disk = self.disk.try_borrow_mut().map_err(|_| DiskError::Io)?;
        if !self.ready.get() {
            if disk.initialize().contains(DiskStatus::NOINIT) {
                return Err(DiskError::NotReady);
            }
            self.ready.set(true);
        }
        op(&mut disk)
    }
}

impl<D: DiskIo> BlockDevice for FatBlockDevice<D> {
    type Error = DiskError;

    fn read(
        &self,
        blocks: &mut [SdBlock],
        start_block_idx: BlockIdx,
        _reason: &str,
    ) -> Result<(), DiskError> {
        self.with_disk(|disk| {
            for (i, block) in blocks.iter_mut().enumerate() {
                disk.read(start_block_idx.0 + i as u32, 1, &mut block.contents)?;
            }
            Ok(())
        })
    }

    fn write(&self, blocks: &[SdBlock], start_block_idx: BlockIdx) -> Result<(), DiskError> {
        self.with_disk(|disk| {
            for (i, block) in blocks.iter().enumerate() {
                disk.write(start_block_idx.0 + i as u32, 1, &block.contents)?;
            }
            Ok(())
        })
    }

    /// No sector-count ioctl on this board; the partition table is trusted
    fn num_blocks(&self) -> Result<BlockCount, DiskError> {
        Ok(BlockCount(u32::MAX))
    }
}

/// Stamps files with the monitor clock
pub struct ClockSource<'c>(pub &'c Clock);

impl TimeSource for ClockSource<'_> {
    fn get_timestamp(&self) -> Timestamp {
        let now = self.0.get();
        Timestamp::from_fat(now.date_word(), now.time_word())
    }
}

/// An open FAT file
#[derive(Debug)]
pub struct FatFile {
    raw: RawFile,
}

fn map_err(err: SdmmcError<DiskError>) -> FsError {
    match err {
        SdmmcError::DeviceError(DiskError::NotReady) => FsError::NotReady,
        SdmmcError::DeviceError(_) => FsError::DiskErr,
        SdmmcError::FormatError(_) | SdmmcError::NoSuchVolume => FsError::NoFilesystem,
        SdmmcError::FilenameError(_) => FsError::InvalidName,
        SdmmcError::NotFound => FsError::NoFile,
        SdmmcError::TooManyOpenFiles | SdmmcError::TooManyOpenDirs => FsError::TooManyOpenFiles,
        SdmmcError::FileAlreadyOpen => FsError::Locked,
        SdmmcError::FileAlreadyExists => FsError::Exist,
        SdmmcError::OpenedDirAsFile | SdmmcError::DeleteDirAsFile => FsError::Denied,
        SdmmcError::ReadOnly => FsError::Denied,
        other => {
            debug!("fat: unmapped error {:?}", other);
            FsError::IntErr
        }
    }
}

/// A mounted (or mountable) FAT volume
pub struct FatVolume<'c, D: DiskIo> {
    mgr: VolumeManager<FatBlockDevice<D>, ClockSource<'c>>,
    volume: Option<RawVolume>,
}

impl<'c, D: DiskIo> FatVolume<'c, D> {
    pub fn new(disk: D, clock: &'c Clock) -> Self {
        Self {
            mgr: VolumeManager::new(FatBlockDevice::new(disk), ClockSource(clock)),
            volume: None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.volume.is_some()
    }

    fn volume(&self) -> Result<RawVolume, FsError> {
        self.volume.ok_or(FsError::NotEnabled)
    }

    /// Open the directory at `path`, walking down from the root
    fn open_dir_path(&mut self, path: &str) -> Result<RawDirectory, FsError> {
        let volume = self.volume()?;
        let mut dir = self.mgr.open_root_dir(volume).map_err(map_err)?;
        for name in components(path) {
            let child = self.mgr.open_dir(dir, name);
            // the parent is no longer needed either way
            let _ = self.mgr.close_dir(dir);
            dir = child.map_err(|err| match map_err(err) {
                FsError::NoFile | FsError::Denied => FsError::NoPath,
                other => other,
            })?;
        }
        Ok(dir)
    }

    /// Open the parent of `path` and return it with the leaf name
    fn open_parent<'p>(&mut self, path: &'p str) -> Result<(RawDirectory, &'p str), FsError> {
        let (parent, leaf) = split_parent(path).ok_or(FsError::InvalidName)?;
        Ok((self.open_dir_path(parent)?, leaf))
    }
}

impl<D: DiskIo> FileSystem for FatVolume<'_, D> {
    type File = FatFile;

    fn mount(&mut self) -> Result<(), FsError> {
        if self.volume.is_some() {
            return Ok(());
        }
        let volume = self.mgr.open_raw_volume(VolumeIdx(0)).map_err(|err| {
            warn!("fat: mount failed: {:?}", err);
            map_err(err)
        })?;
        self.volume = Some(volume);
        Ok(())
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<FatFile, FsError> {
        let (dir, leaf) = self.open_parent(path)?;
        let mode = match mode {
            OpenMode::Read => Mode::ReadOnly,
            OpenMode::WriteCreate => Mode::ReadWriteCreateOrTruncate,
        };
        let raw = self.mgr.open_file_in_dir(dir, leaf, mode);
        let _ = self.mgr.close_dir(dir);
        Ok(FatFile {
            raw: raw.map_err(map_err)?,
        })
    }

    fn read(&mut self, file: &mut FatFile, buf: &mut [u8]) -> Result<usize, FsError> {
        if self.mgr.file_eof(file.raw).map_err(map_err)? {
            return Ok(0);
        }
        self.mgr.read(file.raw, buf).map_err(map_err)
    }

    fn write(&mut self, file: &mut FatFile, data: &[u8]) -> Result<usize, FsError> {
        self.mgr.write(file.raw, data).map_err(map_err)?;
        Ok(data.len())
    }

    fn size(&mut self, file: &FatFile) -> Result<u32, FsError> {
        self.mgr.file_length(file.raw).map_err(map_err)
    }

    fn close(&mut self, file: FatFile) -> Result<(), FsError> {
        self.mgr.close_file(file.raw).map_err(map_err)
    }

    fn list_dir(&mut self, path: &str, visit: &mut dyn FnMut(&DirEntry)) -> Result<(), DirError> {
        let dir = self.open_dir_path(path).map_err(DirError::Open)?;
        let result = self.mgr.iterate_dir(dir, |entry| {
            if entry.attributes.is_volume() {
                return;
            }
            let base = core::str::from_utf8(entry.name.base_name()).unwrap_or("?");
            if base == "." || base == ".." {
                return;
            }
            let ext = core::str::from_utf8(entry.name.extension()).unwrap_or("");

            // 8.3: at most 8 + 1 + 3 bytes
            let mut name = [0u8; 12];
            let mut len = base.len().min(8);
            name[..len].copy_from_slice(&base.as_bytes()[..len]);
            if !ext.is_empty() {
                name[len] = b'.';
                let ext_len = ext.len().min(3);
                name[len + 1..len + 1 + ext_len].copy_from_slice(&ext.as_bytes()[..ext_len]);
                len += 1 + ext_len;
            }
            let name = core::str::from_utf8(&name[..len]).unwrap_or("?");
            visit(&DirEntry::new(name, entry.attributes.is_directory(), entry.size));
        });
        let _ = self.mgr.close_dir(dir);
        result.map_err(|err| {
            warn!("fat: listing {} failed: {:?}", path, err);
            DirError::Read(map_err(err))
        })
    }

    fn unlink(&mut self, path: &str) -> Result<(), FsError> {
        let (dir, leaf) = self.open_parent(path)?;
        let result = self.mgr.delete_file_in_dir(dir, leaf);
        let _ = self.mgr.close_dir(dir);
        result.map_err(map_err)
    }
}

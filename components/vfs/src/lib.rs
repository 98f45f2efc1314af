//! Filesystem contract consumed by the monitor
//!
//! # Purpose
//! The narrow open/read/write/list/unlink surface the monitor needs from a
//! filesystem library, with FatFs-style result codes so failures can be shown
//! to the user as a number.
//!
//! # Integration Points
//! - Depends on: `picomon-drivers` (the `DiskIo` block device and clock)
//! - Provides to: `picomon-kernel` (`ls`, `unlink`, `exec`)
//!
//! # Backends
//! - `fat` feature: FAT volumes over a `DiskIo`, via `embedded-sdmmc`
//! - `mock` feature: an in-memory filesystem with fault injection
//!
//! # Testing Strategy
//! - Unit tests: path handling, error codes, the in-memory backend
//! - The FAT backend is exercised against a hand-built FAT16 image

#![cfg_attr(not(any(test, feature = "mock")), no_std)]

#[cfg(feature = "fat")]
pub mod fat;
#[cfg(any(test, feature = "mock"))]
pub mod mem;

use thiserror::Error;

/// Filesystem result codes, numbered like FatFs `FRESULT`
#[repr(u32)]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("low-level disk error")]
    DiskErr = 1,
    #[error("internal error")]
    IntErr = 2,
    #[error("drive not ready")]
    NotReady = 3,
    #[error("file not found")]
    NoFile = 4,
    #[error("path not found")]
    NoPath = 5,
    #[error("invalid name")]
    InvalidName = 6,
    #[error("access denied")]
    Denied = 7,
    #[error("already exists")]
    Exist = 8,
    #[error("invalid object")]
    InvalidObject = 9,
    #[error("write protected")]
    WriteProtected = 10,
    #[error("invalid drive")]
    InvalidDrive = 11,
    #[error("no mounted volume")]
    NotEnabled = 12,
    #[error("no valid FAT volume")]
    NoFilesystem = 13,
    #[error("mkfs aborted")]
    MkfsAborted = 14,
    #[error("timeout")]
    Timeout = 15,
    #[error("object locked")]
    Locked = 16,
    #[error("not enough work area")]
    NotEnoughCore = 17,
    #[error("too many open files")]
    TooManyOpenFiles = 18,
    #[error("invalid parameter")]
    InvalidParameter = 19,
}

impl FsError {
    /// The `FRESULT` number
    pub const fn code(self) -> u32 {
        self as u32
    }
}

/// Why a directory listing stopped
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DirError {
    /// The directory could not be opened; nothing was listed
    #[error("cannot open directory: {0}")]
    Open(FsError),

    /// Reading entries failed part way through
    #[error("directory read failed: {0}")]
    Read(FsError),
}

impl DirError {
    pub const fn inner(self) -> FsError {
        match self {
            DirError::Open(err) | DirError::Read(err) => err,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, read only
    Read,
    /// Create or truncate, write only
    WriteCreate,
}

/// Longest name a [`DirEntry`] carries; longer names are cut
pub const NAME_MAX: usize = 32;

/// One directory entry, as handed to a listing visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    name: [u8; NAME_MAX],
    len: usize,
    pub is_dir: bool,
    pub size: u32,
}

impl DirEntry {
    pub fn new(name: &str, is_dir: bool, size: u32) -> Self {
        let mut entry = Self {
            name: [0; NAME_MAX],
            len: 0,
            is_dir,
            size,
        };
        for ch in name.chars() {
            let mut utf8 = [0u8; 4];
            let bytes = ch.encode_utf8(&mut utf8).as_bytes();
            if entry.len + bytes.len() > NAME_MAX {
                break;
            }
            entry.name[entry.len..entry.len + bytes.len()].copy_from_slice(bytes);
            entry.len += bytes.len();
        }
        entry
    }

    pub fn name(&self) -> &str {
        // only ever filled from whole chars
        core::str::from_utf8(&self.name[..self.len]).unwrap_or("")
    }
}

/// What the monitor needs from a filesystem
///
/// Paths are absolute or relative to the root; both mean the same thing.
/// Everything except [`FileSystem::mount`] fails with
/// [`FsError::NotEnabled`] until a volume is mounted.
pub trait FileSystem {
    type File;

    /// Mount the volume. Mounting an already-mounted volume succeeds.
    fn mount(&mut self) -> Result<(), FsError>;

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<Self::File, FsError>;

    /// Read from the current position; returns 0 at end of file
    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, FsError>;

    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> Result<usize, FsError>;

    /// Length of the file in bytes
    fn size(&mut self, file: &Self::File) -> Result<u32, FsError>;

    fn close(&mut self, file: Self::File) -> Result<(), FsError>;

    /// Call `visit` once per entry of the directory at `path`
    fn list_dir(&mut self, path: &str, visit: &mut dyn FnMut(&DirEntry)) -> Result<(), DirError>;

    fn unlink(&mut self, path: &str) -> Result<(), FsError>;
}

/// Split a path into its non-empty `/`-separated components
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty() && *part != ".")
}

/// Split `path` into its parent directory and final component
///
/// Returns `None` for the root itself.
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    let leaf_start = trimmed.rfind('/').map(|i| i + 1).unwrap_or(0);
    let leaf = &trimmed[leaf_start..];
    if leaf.is_empty() {
        return None;
    }
    Some((&trimmed[..leaf_start], leaf))
}

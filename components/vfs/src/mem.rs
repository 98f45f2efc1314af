//! In-memory filesystem for host-side tests
//!
//! A flat list of paths with contents. Directories are entries with
//! `is_dir` set; a file's parent must exist as a directory unless it is at the
//! root. Individual operations can be made to fail with a chosen code.

use std::string::{String, ToString};
use std::vec::Vec;

use crate::{components, split_parent, DirEntry, DirError, FileSystem, FsError, OpenMode};

#[derive(Debug, Clone)]
struct Node {
    path: String,
    data: Vec<u8>,
    is_dir: bool,
}

/// Handle to an open [`MemFs`] file
#[derive(Debug)]
pub struct MemFile {
    path: String,
    pos: usize,
    mode: OpenMode,
}

#[derive(Debug, Default)]
pub struct MemFs {
    nodes: Vec<Node>,
    mounted: bool,
    mounts: u32,
    read_only: bool,
    mount_fault: Option<FsError>,
    open_dir_fault: Option<FsError>,
    read_dir_fault: Option<FsError>,
    read_fault: Option<FsError>,
    unlink_fault: Option<FsError>,
}

fn normalize(path: &str) -> String {
    let mut out = String::new();
    for part in components(path) {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(part);
    }
    out
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, data: &[u8]) -> Self {
        self.insert(path, data.to_vec(), false);
        self
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.insert(path, Vec::new(), true);
        self
    }

    /// Every write-side operation fails with [`FsError::WriteProtected`]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn fail_mount(mut self, err: FsError) -> Self {
        self.mount_fault = Some(err);
        self
    }

    pub fn fail_open_dir(mut self, err: FsError) -> Self {
        self.open_dir_fault = Some(err);
        self
    }

    /// Listing stops with this error after the first entry
    pub fn fail_read_dir(mut self, err: FsError) -> Self {
        self.read_dir_fault = Some(err);
        self
    }

    pub fn fail_read(mut self, err: FsError) -> Self {
        self.read_fault = Some(err);
        self
    }

    pub fn fail_unlink(mut self, err: FsError) -> Self {
        self.unlink_fault = Some(err);
        self
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Number of successful mount calls, including repeated ones
    pub fn mount_count(&self) -> u32 {
        self.mounts
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.find(path)
            .filter(|i| !self.nodes[*i].is_dir)
            .map(|i| self.nodes[i].data.as_slice())
    }

    pub fn exists(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    fn insert(&mut self, path: &str, data: Vec<u8>, is_dir: bool) {
        let path = normalize(path);
        self.nodes.retain(|node| node.path != path);
        self.nodes.push(Node { path, data, is_dir });
    }

    fn find(&self, path: &str) -> Option<usize> {
        let path = normalize(path);
        self.nodes.iter().position(|node| node.path == path)
    }

    fn check_mounted(&self) -> Result<(), FsError> {
        if self.mounted {
            Ok(())
        } else {
            Err(FsError::NotEnabled)
        }
    }

    fn parent_exists(&self, path: &str) -> bool {
        match split_parent(path) {
            Some((parent, _)) if !normalize(parent).is_empty() => self
                .find(parent)
                .map(|i| self.nodes[i].is_dir)
                .unwrap_or(false),
            _ => true,
        }
    }
}

impl FileSystem for MemFs {
    type File = MemFile;

    fn mount(&mut self) -> Result<(), FsError> {
        if let Some(err) = self.mount_fault {
            return Err(err);
        }
        self.mounted = true;
        self.mounts += 1;
        Ok(())
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<MemFile, FsError> {
        self.check_mounted()?;
        if split_parent(path).is_none() {
            return Err(FsError::InvalidName);
        }
        if !self.parent_exists(path) {
            return Err(FsError::NoPath);
        }
        match (mode, self.find(path)) {
            (_, Some(i)) if self.nodes[i].is_dir => return Err(FsError::Denied),
            (OpenMode::Read, None) => return Err(FsError::NoFile),
            (OpenMode::WriteCreate, _) if self.read_only => return Err(FsError::WriteProtected),
            (OpenMode::WriteCreate, _) => self.insert(path, Vec::new(), false),
            (OpenMode::Read, Some(_)) => {}
        }
        Ok(MemFile {
            path: normalize(path),
            pos: 0,
            mode,
        })
    }

    fn read(&mut self, file: &mut MemFile, buf: &mut [u8]) -> Result<usize, FsError> {
        self.check_mounted()?;
        if let Some(err) = self.read_fault {
            return Err(err);
        }
        if file.mode != OpenMode::Read {
            return Err(FsError::Denied);
        }
        let i = self.find(&file.path).ok_or(FsError::InvalidObject)?;
        let data = &self.nodes[i].data;
        let start = file.pos.min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        file.pos += n;
        Ok(n)
    }

    fn write(&mut self, file: &mut MemFile, data: &[u8]) -> Result<usize, FsError> {
        self.check_mounted()?;
        if file.mode != OpenMode::WriteCreate {
            return Err(FsError::Denied);
        }
        let i = self.find(&file.path).ok_or(FsError::InvalidObject)?;
        self.nodes[i].data.extend_from_slice(data);
        file.pos += data.len();
        Ok(data.len())
    }

    fn size(&mut self, file: &MemFile) -> Result<u32, FsError> {
        self.check_mounted()?;
        let i = self.find(&file.path).ok_or(FsError::InvalidObject)?;
        Ok(self.nodes[i].data.len() as u32)
    }

    fn close(&mut self, _file: MemFile) -> Result<(), FsError> {
        self.check_mounted()
    }

    fn list_dir(&mut self, path: &str, visit: &mut dyn FnMut(&DirEntry)) -> Result<(), DirError> {
        self.check_mounted().map_err(DirError::Open)?;
        if let Some(err) = self.open_dir_fault {
            return Err(DirError::Open(err));
        }
        let dir = normalize(path);
        if !dir.is_empty() && !self.find(&dir).map(|i| self.nodes[i].is_dir).unwrap_or(false) {
            return Err(DirError::Open(FsError::NoPath));
        }

        let prefix = if dir.is_empty() {
            String::new()
        } else {
            dir.clone() + "/"
        };
        let mut listed = 0;
        for node in &self.nodes {
            let Some(name) = node.path.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if name.is_empty() || name.contains('/') {
                continue;
            }
            if listed == 1 {
                if let Some(err) = self.read_dir_fault {
                    return Err(DirError::Read(err));
                }
            }
            visit(&DirEntry::new(name, node.is_dir, node.data.len() as u32));
            listed += 1;
        }
        Ok(())
    }

    fn unlink(&mut self, path: &str) -> Result<(), FsError> {
        self.check_mounted()?;
        if let Some(err) = self.unlink_fault {
            return Err(err);
        }
        if self.read_only {
            return Err(FsError::WriteProtected);
        }
        let i = self.find(path).ok_or(FsError::NoFile)?;
        let target = self.nodes[i].path.to_string();
        if self.nodes[i].is_dir && self.nodes.iter().any(|n| n.path.starts_with(&(target.clone() + "/"))) {
            return Err(FsError::Denied);
        }
        self.nodes.remove(i);
        Ok(())
    }
}

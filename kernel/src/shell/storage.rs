//! Storage commands: `ls`, `unlink`, and the `sd` self-test
//!
//! Filesystem result codes are printed in hex, the way the FAT library
//! numbers them. The self-test talks to the card directly, bypassing the
//! filesystem.

use core::fmt::Write;

use picomon_drivers::{Block, BlockDriver, BLOCK_SIZE};
use picomon_vfs::{DirEntry, DirError, FileSystem, FsError};

use crate::components::console::ConsoleWriter;
use crate::context::KernelContext;
use crate::platform::{Devices, Platform};

/// Boot sector signature bytes at offset 510
pub const MBR_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// Print one line per entry of `path`; directories get a trailing `/`
fn print_entries<P: Platform>(dev: &mut Devices<P>, path: &str) {
    let Devices { fs, console, .. } = dev;
    let mut out = ConsoleWriter::new(&*console);
    let listed = fs.list_dir(path, &mut |entry: &DirEntry| {
        let slash = if entry.is_dir { "/" } else { "" };
        let _ = writeln!(out, "{}{}", entry.name(), slash);
    });
    match listed {
        Ok(()) => {}
        Err(DirError::Open(err)) => {
            log::debug!("open {}: {}", path, err);
            outln!(dev, "OpenDir Error");
        }
        Err(DirError::Read(err)) => log::warn!("listing {} stopped: {}", path, err),
    }
}

fn root_or(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// List the root directory, mounting first
pub fn ls<P: Platform>(dev: &mut Devices<P>, ctx: KernelContext, _args: &str) -> KernelContext {
    outln!(dev, "Mounting...");
    if let Err(err) = dev.fs.mount() {
        outln!(dev, "Mount Error: 0x{:08X}", err.code());
        return ctx;
    }
    outln!(dev, "Listing /");
    print_entries(dev, "/");
    ctx
}

/// Directory listing on behalf of a running program
///
/// Mounts without announcing it; an empty path means the root.
pub fn list<P: Platform>(dev: &mut Devices<P>, path: &str) {
    if let Err(err) = dev.fs.mount() {
        outln!(dev, "Mount Error: 0x{:08X}", err.code());
        return;
    }
    print_entries(dev, root_or(path));
}

pub fn unlink<P: Platform>(dev: &mut Devices<P>, ctx: KernelContext, args: &str) -> KernelContext {
    if args.is_empty() {
        outln!(dev, "Usage: unlink <filename>");
        return ctx;
    }
    outln!(dev, "Deleting {}...", args);
    let result = dev.fs.mount().and_then(|()| dev.fs.unlink(args));
    match result {
        Ok(()) => outln!(dev, "Deleted."),
        Err(FsError::NoFile) => outln!(dev, "File not found."),
        Err(FsError::WriteProtected) => outln!(dev, "Error: Disk is Write Protected."),
        Err(err) => outln!(dev, "Error: 0x{:08X}", err.code()),
    }
    ctx
}

/// Bring the card up and check sector 0 for a boot signature
pub fn sd<P: Platform>(dev: &mut Devices<P>, ctx: KernelContext, _args: &str) -> KernelContext {
    outln!(dev, "Initializing SD Card...");
    if let Err(err) = dev.card.initialize() {
        outln!(dev, "Init Failed! Error: 0x{:08X}", err.code() as u32);
        return ctx;
    }
    outln!(dev, "Init OK.");

    outln!(dev, "Reading Sector 0 (MBR)...");
    let mut sector: Block = [0; BLOCK_SIZE];
    if let Err(err) = dev.card.read_block(0, &mut sector) {
        outln!(dev, "Read Failed! Error: 0x{:08X}", err.code() as u32);
        return ctx;
    }

    let signature = [sector[510], sector[511]];
    outln!(dev, "Signature: {:02X}{:02X}", signature[0], signature[1]);
    if signature == MBR_SIGNATURE {
        outln!(dev, "Valid MBR found!");
    } else {
        outln!(dev, "Invalid Signature (Expected 55AA)");
    }
    ctx
}

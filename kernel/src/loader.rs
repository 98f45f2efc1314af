//! Program loader
//!
//! `exec` copies a file from the volume into the load area and runs it
//! through the platform's trampoline. The image is copied verbatim: there is
//! no header and no relocation, so programs are linked for
//! [`config::USER_PROG_ADDR`] and start at their first byte.
//!
//! A program that calls `exec` itself loads the new image over its own. The
//! monitor's registers are saved per call, so control still unwinds
//! correctly, but the outer program must not expect its code to survive.

use picomon_drivers::{Bus, BLOCK_SIZE};
use picomon_vfs::{FileSystem, FsError, OpenMode};

use crate::abi::Session;
use crate::config::{USER_PROG_ADDR, USER_PROG_MAX};
use crate::context::KernelContext;
use crate::platform::{Devices, Platform};
use crate::trampoline::Trampoline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// Mounting or opening failed
    Open(FsError),
    /// Reading failed part way; the load area holds a partial image
    Read(FsError),
    /// The file does not fit the load area
    TooLarge(u32),
}

/// Copy the file at `path` to the load area; returns its length
pub fn load<P: Platform>(dev: &mut Devices<P>, path: &str) -> Result<u32, LoadError> {
    dev.fs.mount().map_err(LoadError::Open)?;
    let mut file = dev.fs.open(path, OpenMode::Read).map_err(LoadError::Open)?;
    let copied = copy_image(dev, &mut file);
    if let Err(err) = dev.fs.close(file) {
        log::warn!("close {}: {}", path, err);
    }
    copied
}

fn copy_image<P: Platform>(
    dev: &mut Devices<P>,
    file: &mut <P::Fs as FileSystem>::File,
) -> Result<u32, LoadError> {
    let size = dev.fs.size(file).map_err(LoadError::Read)?;
    if size > USER_PROG_MAX {
        return Err(LoadError::TooLarge(size));
    }

    let mut chunk = [0u8; BLOCK_SIZE];
    let mut loaded = 0u32;
    while loaded < size {
        let n = dev.fs.read(file, &mut chunk).map_err(LoadError::Read)?;
        if n == 0 {
            break;
        }
        let n = n.min((size - loaded) as usize);
        dev.bus.write_bytes(USER_PROG_ADDR + loaded, &chunk[..n]);
        loaded += n as u32;
    }
    log::debug!("loaded {} bytes at {:#010x}", loaded, USER_PROG_ADDR);
    Ok(loaded)
}

/// Load `path` and run it; returns once the program does
pub fn exec<P: Platform>(dev: &mut Devices<P>, ctx: KernelContext, path: &str) -> KernelContext {
    outln!(dev, "Loading {}...", path);
    let size = match load(dev, path) {
        Ok(size) => size,
        Err(LoadError::Open(err)) => {
            outln!(dev, "Error opening file: 0x{:08X}", err.code());
            return ctx;
        }
        Err(LoadError::Read(err)) => {
            outln!(dev, "Read Error: 0x{:08X}", err.code());
            return ctx;
        }
        Err(LoadError::TooLarge(size)) => {
            log::warn!("{}: {} bytes, limit {}", path, size, USER_PROG_MAX);
            outln!(dev, "Image too large");
            return ctx;
        }
    };
    outln!(dev, "Loaded 0x{:08X} bytes to 0x{:08X}", size, USER_PROG_ADDR);
    outln!(dev, "Executing...");

    let trampoline = dev.trampoline.clone();
    let mut session = Session {
        dev: &mut *dev,
        ctx,
    };
    trampoline.run(USER_PROG_ADDR, &mut session);
    let ctx = session.ctx;

    outln!(dev, "Program Returned.");
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, devices, devices_with, Program, TestPlatform};
    use core::sync::atomic::{AtomicU32, Ordering};
    use picomon_drivers::sim::SimCard;
    use picomon_vfs::mem::MemFs;
    use std::string::String;
    use std::vec::Vec;

    fn with_program(fs: MemFs, program: Program) -> Devices<TestPlatform> {
        devices_with(fs, SimCard::new(), program)
    }

    fn run_exec(dev: &mut Devices<TestPlatform>, path: &str) -> String {
        exec(dev, KernelContext::default(), path);
        dev.console.take_text()
    }

    #[test]
    fn image_lands_at_the_load_address() {
        let _serial = testing::serial();
        let image: Vec<u8> = (0..1300u32).map(|i| (i * 7) as u8).collect();
        let mut dev = devices(MemFs::new().with_file("APP.BIN", &image));

        let text = run_exec(&mut dev, "APP.BIN");
        assert_eq!(
            text,
            "Loading APP.BIN...\r\nLoaded 0x00000514 bytes to 0x10008000\r\n\
             Executing...\r\nProgram Returned.\r\n"
        );
        assert_eq!(dev.bus.bytes(USER_PROG_ADDR, image.len()), image);
        assert_eq!(dev.bus.read_u8(USER_PROG_ADDR + image.len() as u32), 0);
        assert_eq!(dev.trampoline.entries(), [USER_PROG_ADDR]);
        assert!(dev.fs.is_mounted());
    }

    #[test]
    fn missing_file_never_jumps() {
        let _serial = testing::serial();
        let mut dev = devices(MemFs::new());
        let text = run_exec(&mut dev, "NOPE.BIN");
        assert_eq!(text, "Loading NOPE.BIN...\r\nError opening file: 0x00000004\r\n");
        assert!(dev.trampoline.entries().is_empty());
    }

    #[test]
    fn mount_failure_is_an_open_error() {
        let _serial = testing::serial();
        let mut dev = devices(MemFs::new().fail_mount(FsError::NotReady));
        let text = run_exec(&mut dev, "APP.BIN");
        assert!(text.ends_with("Error opening file: 0x00000003\r\n"));
    }

    #[test]
    fn read_failure_never_jumps() {
        let _serial = testing::serial();
        let fs = MemFs::new()
            .with_file("APP.BIN", b"\x73\x00\x10\x00")
            .fail_read(FsError::DiskErr);
        let mut dev = devices(fs);
        let text = run_exec(&mut dev, "APP.BIN");
        assert!(text.ends_with("Read Error: 0x00000001\r\n"));
        assert!(dev.trampoline.entries().is_empty());
    }

    #[test]
    fn oversized_image_is_refused() {
        let _serial = testing::serial();
        let image = std::vec![0xEEu8; USER_PROG_MAX as usize + 1];
        let mut dev = devices(MemFs::new().with_file("BIG.BIN", &image));
        let text = run_exec(&mut dev, "BIG.BIN");
        assert!(text.ends_with("Image too large\r\n"));
        assert_eq!(dev.bus.read_u8(USER_PROG_ADDR), 0);
        assert!(dev.trampoline.entries().is_empty());
    }

    #[test]
    fn largest_image_fits() {
        let _serial = testing::serial();
        let image = std::vec![0x5Au8; USER_PROG_MAX as usize];
        let mut dev = devices(MemFs::new().with_file("MAX.BIN", &image));
        let text = run_exec(&mut dev, "MAX.BIN");
        assert!(text.contains("Loaded 0x00008000 bytes"));
        assert_eq!(dev.bus.read_u8(USER_PROG_ADDR + USER_PROG_MAX - 1), 0x5A);
    }

    #[test]
    fn program_uses_the_services() {
        let _serial = testing::serial();
        let mut dev = with_program(MemFs::new().with_file("ECHO.BIN", b"\x00"), |table| {
            (table.print)(c"=== WELCOME ===\r\n".as_ptr());
            let c = (table.getc)();
            (table.putc)(c.to_ascii_uppercase());
            (table.ls)(c"".as_ptr());
        });
        dev.console.push_input(b"q");
        dev.fs = core::mem::take(&mut dev.fs).with_file("NOTES.TXT", b"");

        let text = run_exec(&mut dev, "ECHO.BIN");
        assert!(
            text.contains("Executing...\r\n=== WELCOME ===\r\nQECHO.BIN\r\nNOTES.TXT\r\nProgram Returned.\r\n"),
            "{text}"
        );
    }

    #[test]
    fn nested_exec_returns_through_both_programs() {
        static DEPTH: AtomicU32 = AtomicU32::new(0);
        let _serial = testing::serial();
        DEPTH.store(0, Ordering::Relaxed);

        let fs = MemFs::new()
            .with_file("SHELL.BIN", b"outer")
            .with_file("TOOL.BIN", b"in");
        let mut dev = with_program(fs, |table| {
            if DEPTH.fetch_add(1, Ordering::Relaxed) == 0 {
                (table.exec)(c"TOOL.BIN".as_ptr());
                (table.print)(c"back in outer\r\n".as_ptr());
            }
        });

        let text = run_exec(&mut dev, "SHELL.BIN");
        assert_eq!(
            text,
            "Loading SHELL.BIN...\r\nLoaded 0x00000005 bytes to 0x10008000\r\nExecuting...\r\n\
             Loading TOOL.BIN...\r\nLoaded 0x00000002 bytes to 0x10008000\r\nExecuting...\r\n\
             Program Returned.\r\nback in outer\r\nProgram Returned.\r\n"
        );
        assert_eq!(dev.trampoline.entries(), [USER_PROG_ADDR, USER_PROG_ADDR]);
        // the inner image was written over the outer one
        assert_eq!(dev.bus.bytes(USER_PROG_ADDR, 5), b"inter");
        assert_eq!((crate::abi::SERVICE_TABLE.getc)(), 0);
    }
}

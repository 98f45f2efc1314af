//! The monitor side of the service table
//!
//! A loaded program calls the `extern "C"` shims in [`SERVICE_TABLE`] (or the
//! same shims through the jump vector at `0x1000_0004`). Each shim forwards
//! to whichever [`Services`] implementation is currently published. The
//! loader publishes a [`Session`] for the lifetime of one program run, so a
//! nested `exec` publishes its own and puts the outer one back on return.

use core::cell::UnsafeCell;
use core::ffi::{c_char, CStr};

use picomon_sdk::abi::{ServiceTable, Services, ABI_VERSION};
use static_assertions::{assert_eq_align, const_assert_eq};

use crate::components::console::Console;
use crate::context::KernelContext;
use crate::loader;
use crate::platform::{Devices, Platform};
use crate::shell::storage;

// version word plus five entry points, one pointer each
const_assert_eq!(
    core::mem::size_of::<ServiceTable>(),
    6 * core::mem::size_of::<usize>()
);
assert_eq_align!(ServiceTable, usize);

/// The table handed to every program in `a0`
pub static SERVICE_TABLE: ServiceTable = ServiceTable {
    version: ABI_VERSION,
    putc: picomon_svc_putc,
    getc: picomon_svc_getc,
    print: picomon_svc_print,
    exec: picomon_svc_exec,
    ls: picomon_svc_ls,
};

/// Services seen by a running program
///
/// Owns the monitor's devices and context for as long as the program runs.
/// Console output is raw: programs send their own line endings.
pub struct Session<'d, P: Platform> {
    pub dev: &'d mut Devices<P>,
    pub ctx: KernelContext,
}

impl<P: Platform> Services for Session<'_, P> {
    fn putc(&mut self, c: u8) {
        self.dev.console.putc(c);
    }

    fn getc(&mut self) -> u8 {
        self.dev.console.getc()
    }

    fn print(&mut self, text: &CStr) {
        self.dev.console.write_bytes(text.to_bytes());
    }

    fn exec(&mut self, path: &CStr) {
        match path.to_str() {
            Ok(path) => self.ctx = loader::exec(self.dev, self.ctx, path),
            Err(_) => log::warn!("exec: path is not UTF-8"),
        }
    }

    fn ls(&mut self, path: &CStr) {
        match path.to_str() {
            Ok(path) => storage::list(self.dev, path),
            Err(_) => log::warn!("ls: path is not UTF-8"),
        }
    }
}

type Slot = Option<*mut (dyn Services + 'static)>;

struct Published(UnsafeCell<Slot>);

// Single hart; the slot is only touched from the monitor's own thread of
// control.
unsafe impl Sync for Published {}

static CURRENT: Published = Published(UnsafeCell::new(None));

/// Puts the previous slot value back even if `f` unwinds
struct Restore(Slot);

impl Drop for Restore {
    fn drop(&mut self) {
        // Safety: see `Published`
        unsafe { *CURRENT.0.get() = self.0 }
    }
}

/// Make `services` answer service calls while `f` runs
pub fn publish<R>(services: &mut dyn Services, f: impl FnOnce() -> R) -> R {
    let ptr: *mut (dyn Services + '_) = services;
    // Safety: only the lifetime changes, and the pointer leaves the slot
    // before `services` goes out of scope
    let ptr = unsafe {
        core::mem::transmute::<*mut (dyn Services + '_), *mut (dyn Services + 'static)>(ptr)
    };
    // Safety: see `Published`
    let previous = unsafe { core::mem::replace(&mut *CURRENT.0.get(), Some(ptr)) };
    let _restore = Restore(previous);
    f()
}

fn with_current<R>(f: impl FnOnce(&mut dyn Services) -> R) -> Option<R> {
    // Safety: see `Published`
    let ptr = unsafe { *CURRENT.0.get() }?;
    // Safety: `publish` keeps the referent alive while it is in the slot, and
    // the program is the only code running until it calls back
    Some(f(unsafe { &mut *ptr }))
}

/// # Safety
/// `text` is null or a NUL-terminated string that outlives the call.
unsafe fn c_str<'a>(text: *const c_char) -> Option<&'a CStr> {
    if text.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(text) })
    }
}

#[no_mangle]
pub extern "C" fn picomon_svc_putc(c: u8) {
    with_current(|s| s.putc(c));
}

/// Returns 0 when no program is running
#[no_mangle]
pub extern "C" fn picomon_svc_getc() -> u8 {
    with_current(|s| s.getc()).unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn picomon_svc_print(text: *const c_char) {
    // Safety: the ABI requires NUL-terminated strings
    if let Some(text) = unsafe { c_str(text) } {
        with_current(|s| s.print(text));
    }
}

#[no_mangle]
pub extern "C" fn picomon_svc_exec(path: *const c_char) {
    // Safety: the ABI requires NUL-terminated strings
    if let Some(path) = unsafe { c_str(path) } {
        with_current(|s| s.exec(path));
    }
}

#[no_mangle]
pub extern "C" fn picomon_svc_ls(path: *const c_char) {
    // Safety: the ABI requires NUL-terminated strings
    if let Some(path) = unsafe { c_str(path) } {
        with_current(|s| s.ls(path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, devices};
    use picomon_vfs::mem::MemFs;
    use std::vec::Vec;

    #[derive(Default)]
    struct Recorder {
        out: Vec<u8>,
        calls: Vec<&'static str>,
    }

    impl Services for Recorder {
        fn putc(&mut self, c: u8) {
            self.out.push(c);
        }

        fn getc(&mut self) -> u8 {
            b'k'
        }

        fn print(&mut self, text: &CStr) {
            self.out.extend_from_slice(text.to_bytes());
        }

        fn exec(&mut self, _path: &CStr) {
            self.calls.push("exec");
        }

        fn ls(&mut self, _path: &CStr) {
            self.calls.push("ls");
        }
    }

    #[test]
    fn table_carries_the_abi_version() {
        assert_eq!(SERVICE_TABLE.version, ABI_VERSION);
    }

    #[test]
    fn nothing_published_means_no_effect() {
        let _serial = testing::serial();
        (SERVICE_TABLE.putc)(b'x');
        (SERVICE_TABLE.print)(c"ignored".as_ptr());
        (SERVICE_TABLE.print)(core::ptr::null());
        assert_eq!((SERVICE_TABLE.getc)(), 0);
    }

    #[test]
    fn calls_reach_the_published_services() {
        let _serial = testing::serial();
        let mut rec = Recorder::default();
        let got = publish(&mut rec, || {
            (SERVICE_TABLE.print)(c"hi ".as_ptr());
            (SERVICE_TABLE.putc)(b'!');
            (SERVICE_TABLE.exec)(c"APP.BIN".as_ptr());
            (SERVICE_TABLE.ls)(c"".as_ptr());
            (SERVICE_TABLE.getc)()
        });
        assert_eq!(got, b'k');
        assert_eq!(rec.out, b"hi !");
        assert_eq!(rec.calls, ["exec", "ls"]);
        assert_eq!((SERVICE_TABLE.getc)(), 0);
    }

    #[test]
    fn nested_publish_restores_the_outer_services() {
        let _serial = testing::serial();
        let mut outer = Recorder::default();
        let mut inner = Recorder::default();
        publish(&mut outer, || {
            (SERVICE_TABLE.putc)(b'a');
            publish(&mut inner, || (SERVICE_TABLE.putc)(b'b'));
            (SERVICE_TABLE.putc)(b'c');
        });
        assert_eq!(outer.out, b"ac");
        assert_eq!(inner.out, b"b");
    }

    #[test]
    fn session_output_is_raw() {
        let mut dev = devices(MemFs::new());
        dev.console.push_input(b"z");
        let mut session = Session {
            dev: &mut dev,
            ctx: KernelContext::default(),
        };
        session.print(c"line\n");
        session.putc(b'>');
        assert_eq!(session.getc(), b'z');
        assert_eq!(dev.console.take_output(), b"line\n>");
    }

    #[test]
    fn session_lists_through_storage() {
        let mut dev = devices(MemFs::new().with_file("GAME.BIN", b"\x13"));
        let mut session = Session {
            dev: &mut dev,
            ctx: KernelContext::default(),
        };
        session.ls(c"");
        let text = dev.console.take_text();
        assert!(text.contains("GAME.BIN\r\n"), "{text}");
    }
}

//! Debug output and logging
//!
//! `kprint!`/`kprintln!` write straight to the board console. The `log`
//! facade is routed to the same console by [`ConsoleLogger`] once
//! [`init_logging`] has run.

use core::fmt::{self, Write};

use crate::components::console::{Console, ConsoleWriter};
use crate::config;

/// Debug writer (uses the board console)
pub struct DebugWriter;

impl fmt::Write for DebugWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        config::console().puts(s);
        Ok(())
    }
}

/// Print macro for kernel
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => ({
        use core::fmt::Write;
        let _ = write!($crate::debug::DebugWriter, $($arg)*);
    });
}

/// Print with newline macro for kernel
#[macro_export]
macro_rules! kprintln {
    () => ($crate::kprint!("\n"));
    ($($arg:tt)*) => ({
        use core::fmt::Write;
        let _ = writeln!($crate::debug::DebugWriter, $($arg)*);
    });
}

/// `log` backend writing `[LEVEL] target: message` lines to a console
pub struct ConsoleLogger<C: Console + 'static> {
    console: &'static C,
}

impl<C: Console + 'static> ConsoleLogger<C> {
    pub const fn new(console: &'static C) -> Self {
        Self { console }
    }
}

impl<C: Console + 'static> log::Log for ConsoleLogger<C> {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= config::LOG_LEVEL
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut out = ConsoleWriter::new(self.console);
        let _ = writeln!(
            out,
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger<config::BoardConsole> = ConsoleLogger::new(&config::CONSOLE);

/// Install the console logger
///
/// The target has no compare-and-swap atomics, so the racy setters are the
/// only ones available.
///
/// # Safety
/// Must run once, before anything else logs.
pub unsafe fn init_logging() {
    // Safety: single-threaded boot, called once per the contract above
    unsafe {
        let _ = log::set_logger_racy(&LOGGER);
        log::set_max_level_racy(config::LOG_LEVEL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;
    use std::sync::Mutex;
    use std::vec::Vec;

    struct Capture(Mutex<Vec<u8>>);

    impl Console for Capture {
        fn putc(&self, c: u8) {
            self.0.lock().unwrap().push(c);
        }

        fn try_getc(&self) -> Option<u8> {
            None
        }
    }

    static CAPTURE: Capture = Capture(Mutex::new(Vec::new()));

    #[test]
    fn records_are_prefixed_with_level_and_target() {
        let logger = ConsoleLogger::new(&CAPTURE);
        logger.log(
            &log::Record::builder()
                .level(log::Level::Error)
                .target("sd")
                .args(format_args!("card gone"))
                .build(),
        );
        let text = std::string::String::from_utf8(CAPTURE.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "[ERROR] sd: card gone\r\n");
    }
}

//! The command shell
//!
//! # Command Flow
//!
//! ```text
//!   console bytes -> LineEditor -> split_command -> TABLE lookup -> handler
//! ```
//!
//! Each handler receives the devices, the current [`KernelContext`] and the
//! argument remainder, prints its own output, and returns the next context.
//! Failures are reported on the console; nothing a command does ends the
//! loop.

pub mod date;
pub mod line;
pub mod memory;
pub mod parse;
pub mod storage;

use picomon_drivers::Clock;

use crate::components::console::Console;
use crate::config;
use crate::context::KernelContext;
use crate::loader;
use crate::platform::{Devices, Platform};

use line::LineEditor;

/// A command handler
pub type Handler<P> = fn(&mut Devices<P>, KernelContext, &str) -> KernelContext;

/// One entry of the command table
pub struct Command<P: Platform> {
    pub name: &'static str,
    pub handler: Handler<P>,
    pub help: &'static str,
}

impl<P: Platform> Command<P> {
    /// Every command, in the order `help` lists them
    pub const TABLE: &'static [Self] = &[
        Command { name: "cls", handler: cls::<P>, help: "Clear screen" },
        Command { name: "date", handler: date::date::<P>, help: "Show or set time" },
        Command { name: "dump", handler: memory::dump::<P>, help: "[addr] Hex dump memory" },
        Command { name: "exec", handler: exec::<P>, help: "<file> Load and run a program" },
        Command { name: "help", handler: help::<P>, help: "Show this list" },
        Command { name: "ls", handler: storage::ls::<P>, help: "List directory contents" },
        Command { name: "peek", handler: memory::peek::<P>, help: "[addr] Read memory" },
        Command { name: "poke", handler: memory::poke::<P>, help: "[addr] val Write memory" },
        Command { name: "sd", handler: storage::sd::<P>, help: "Initialize and test SD card sector" },
        Command { name: "unlink", handler: storage::unlink::<P>, help: "<filename> unlink a file" },
    ];

    /// First entry named exactly `name`
    pub fn find(name: &str) -> Option<&'static Self> {
        Self::TABLE.iter().find(|cmd| cmd.name == name)
    }
}

/// Run one command line
pub fn dispatch<P: Platform>(dev: &mut Devices<P>, ctx: KernelContext, line: &[u8]) -> KernelContext {
    let Ok(line) = core::str::from_utf8(line) else {
        outln!(dev, "Unknown command. Try 'help'.");
        return ctx;
    };
    let (name, args) = parse::split_command(line);
    if name.is_empty() {
        return ctx;
    }
    match Command::<P>::find(name) {
        Some(cmd) => {
            log::trace!("{} [{}]", cmd.name, args);
            (cmd.handler)(dev, ctx, args)
        }
        None => {
            outln!(dev, "Unknown command. Try 'help'.");
            ctx
        }
    }
}

pub fn cls<P: Platform>(dev: &mut Devices<P>, ctx: KernelContext, _args: &str) -> KernelContext {
    dev.console.puts("\x1b[2J\x1b[H");
    ctx
}

pub fn help<P: Platform>(dev: &mut Devices<P>, ctx: KernelContext, _args: &str) -> KernelContext {
    outln!(dev, "Available Commands:");
    for cmd in Command::<P>::TABLE {
        outln!(dev, "  {}\t : {}", cmd.name, cmd.help);
    }
    ctx
}

pub fn exec<P: Platform>(dev: &mut Devices<P>, ctx: KernelContext, args: &str) -> KernelContext {
    if args.is_empty() {
        outln!(dev, "Usage: exec <filename>");
        return ctx;
    }
    loader::exec(dev, ctx, args)
}

/// Dispatch with the context's time taken from `clock` and written back
fn run_line<P: Platform>(
    dev: &mut Devices<P>,
    ctx: KernelContext,
    clock: &Clock,
    line: &[u8],
) -> KernelContext {
    let ctx = dispatch(dev, KernelContext { time: clock.get(), ..ctx }, line);
    clock.set(ctx.time);
    ctx
}

/// The monitor: devices, state, and the read-dispatch loop
pub struct Monitor<'c, P: Platform> {
    dev: Devices<P>,
    ctx: KernelContext,
    clock: &'c Clock,
    line: LineEditor,
}

impl<'c, P: Platform> Monitor<'c, P> {
    /// `clock` is shared with the filesystem, which stamps files from it
    pub fn new(dev: Devices<P>, clock: &'c Clock) -> Self {
        Self {
            dev,
            ctx: KernelContext::boot(clock.get()),
            clock,
            line: LineEditor::new(),
        }
    }

    /// Clear the screen, print the banner and the first prompt
    pub fn start(&mut self) {
        self.ctx = cls(&mut self.dev, self.ctx, "");
        outln!(self.dev, "{}", config::BANNER);
        self.dev.console.puts(config::PROMPT);
    }

    /// Run one complete command line
    pub fn execute(&mut self, line: &[u8]) {
        self.ctx = run_line(&mut self.dev, self.ctx, self.clock, line);
    }

    /// Read and run one line, then prompt again
    pub fn step(&mut self) {
        let line = self.line.read_line(&self.dev.console);
        self.ctx = run_line(&mut self.dev, self.ctx, self.clock, line);
        self.dev.console.puts(config::PROMPT);
    }

    pub fn run(&mut self) -> ! {
        self.start();
        loop {
            self.step();
        }
    }

    pub fn context(&self) -> KernelContext {
        self.ctx
    }

    pub fn devices(&self) -> &Devices<P> {
        &self.dev
    }

    pub fn devices_mut(&mut self) -> &mut Devices<P> {
        &mut self.dev
    }
}

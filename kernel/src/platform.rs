//! The devices a monitor runs on
//!
//! The shell is generic over a [`Platform`] so the same commands run against
//! the real board in the firmware and against simulated parts in tests.

use picomon_drivers::{BlockDriver, Bus};
use picomon_vfs::FileSystem;

use crate::components::console::{Console, ConsoleWriter};
use crate::trampoline::Trampoline;

/// Compile-time bundle of device types
pub trait Platform: 'static {
    type Console: Console;
    type Bus: Bus;
    /// The raw card, for the storage self-test
    type Card: BlockDriver;
    type Fs: FileSystem;
    type Trampoline: Trampoline + Clone;
}

/// The devices themselves, owned by the monitor
pub struct Devices<P: Platform> {
    pub console: P::Console,
    pub bus: P::Bus,
    pub card: P::Card,
    pub fs: P::Fs,
    pub trampoline: P::Trampoline,
}

impl<P: Platform> Devices<P> {
    /// Formatted output on the console
    pub fn out(&self) -> ConsoleWriter<'_, P::Console> {
        ConsoleWriter::new(&self.console)
    }
}

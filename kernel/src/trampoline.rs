//! Control transfer into a loaded program
//!
//! The monitor never jumps to user code directly. A [`Trampoline`] saves the
//! monitor's register context, enters the program with the service table in
//! `a0`, and restores the context once the program returns. The program gets
//! the whole machine in between; the monitor only runs again when the program
//! calls a service or returns.

use picomon_sdk::abi::Services;

pub trait Trampoline {
    /// Run the program at `entry` until it returns
    ///
    /// `services` answers every service call the program makes while it
    /// runs, including nested `exec`.
    fn run(&self, entry: u32, services: &mut dyn Services);
}

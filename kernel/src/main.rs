//! PicoMon firmware image
//!
//! Entered from `_start` (see `arch::riscv32::boot`) with a stack and a
//! zeroed `.bss`. Builds the board's devices and hands them to the monitor,
//! which never returns.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use picomon_drivers::{Clock, DiskAdapter, PhysBus, Register, SdCard};
use picomon_kernel::arch::riscv32::RiscvTrampoline;
use picomon_kernel::config::{self, BoardConsole};
use picomon_kernel::{kprintln, Devices, Monitor, Platform};
use picomon_vfs::fat::FatVolume;

/// Wall clock shared by `date` and the filesystem
static CLOCK: Clock = Clock::new();

type BoardCard = SdCard<Register>;

struct Board;

impl Platform for Board {
    type Console = BoardConsole;
    type Bus = PhysBus;
    type Card = BoardCard;
    type Fs = FatVolume<'static, DiskAdapter<'static, BoardCard>>;
    type Trampoline = RiscvTrampoline;
}

fn sd_card() -> BoardCard {
    // Safety: the SD port register from the board memory map
    SdCard::new(unsafe { Register::new(config::SD_PORT) })
}

#[no_mangle]
pub extern "C" fn picomon_main() -> ! {
    // Safety: first thing after reset, nothing has logged yet
    unsafe { picomon_kernel::debug::init_logging() };
    log::info!("picomon {}", env!("CARGO_PKG_VERSION"));

    // Both handles drive the same socket; they are never in use at once
    let dev = Devices::<Board> {
        console: config::board_console(),
        // Safety: we are on the target with flat physical memory
        bus: unsafe { PhysBus::new() },
        card: sd_card(),
        fs: FatVolume::new(DiskAdapter::new(sd_card(), &CLOCK), &CLOCK),
        trampoline: RiscvTrampoline,
    };

    Monitor::new(dev, &CLOCK).run()
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    kprintln!("\n*** PANIC: {}", info);
    loop {
        core::hint::spin_loop();
    }
}

//! Simulated board for the monitor's unit tests

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::string::String;
use std::sync::{Mutex, MutexGuard};
use std::vec::Vec;

use picomon_drivers::sd::SdConfig;
use picomon_drivers::sim::SimCard;
use picomon_drivers::{Bus, SdCard};
use picomon_sdk::abi::{ServiceTable, Services};
use picomon_vfs::mem::MemFs;

use crate::abi;
use crate::components::console::Console;
use crate::platform::{Devices, Platform};
use crate::trampoline::Trampoline;

/// Blocks on the simulated card; sector 0 is all the self-test needs
pub const CARD_BLOCKS: usize = 2;

pub const QUICK: SdConfig = SdConfig {
    idle_bytes: 10,
    reset_retries: 5,
    response_polls: 8,
    init_retries: 50,
    read_token_polls: 64,
    write_busy_polls: 256,
};

/// The service slot is process-wide; tests that run programs take turns
pub fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Console fed from a script, capturing everything written
pub struct BufferConsole {
    input: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::with_input(b"")
    }

    pub fn with_input(input: &[u8]) -> Self {
        Self {
            input: Mutex::new(input.iter().copied().collect()),
            output: Mutex::new(Vec::new()),
        }
    }

    pub fn push_input(&self, input: &[u8]) {
        self.input.lock().unwrap().extend(input.iter().copied());
    }

    pub fn pending_input(&self) -> usize {
        self.input.lock().unwrap().len()
    }

    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut *self.output.lock().unwrap())
    }

    pub fn take_text(&self) -> String {
        String::from_utf8(self.take_output()).unwrap()
    }
}

impl Console for BufferConsole {
    fn putc(&self, c: u8) {
        self.output.lock().unwrap().push(c);
    }

    fn try_getc(&self) -> Option<u8> {
        self.input.lock().unwrap().pop_front()
    }

    fn getc(&self) -> u8 {
        self.try_getc().expect("console script ran out")
    }
}

/// Sparse little-endian RAM; unwritten bytes read as zero
#[derive(Default)]
pub struct RamBus {
    bytes: BTreeMap<u32, u8>,
}

impl RamBus {
    pub fn bytes(&mut self, addr: u32, len: usize) -> Vec<u8> {
        (0..len as u32)
            .map(|i| self.read_u8(addr.wrapping_add(i)))
            .collect()
    }
}

impl Bus for RamBus {
    fn read_u32(&mut self, addr: u32) -> u32 {
        let mut word = [0u8; 4];
        for (i, byte) in word.iter_mut().enumerate() {
            *byte = self.read_u8(addr.wrapping_add(i as u32));
        }
        u32::from_le_bytes(word)
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_u8(addr.wrapping_add(i as u32), byte);
        }
    }

    fn read_u8(&mut self, addr: u32) -> u8 {
        self.bytes.get(&addr).copied().unwrap_or(0)
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        self.bytes.insert(addr, value);
    }
}

/// What a loaded program does, written against the table it is handed
pub type Program = fn(&ServiceTable);

fn returns_at_once(_: &ServiceTable) {}

/// Runs a Rust function in place of the loaded image
///
/// The function sees the real service table, with the caller's services
/// published behind it, the same way a program entered at the load address
/// would.
#[derive(Clone)]
pub struct ScriptedTrampoline {
    program: Program,
    entries: Rc<RefCell<Vec<u32>>>,
}

impl ScriptedTrampoline {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            entries: Rc::default(),
        }
    }

    /// Entry addresses jumped to so far
    pub fn entries(&self) -> Vec<u32> {
        self.entries.borrow().clone()
    }
}

impl Trampoline for ScriptedTrampoline {
    fn run(&self, entry: u32, services: &mut dyn Services) {
        self.entries.borrow_mut().push(entry);
        let program = self.program;
        abi::publish(services, || program(&abi::SERVICE_TABLE));
    }
}

pub struct TestPlatform;

impl Platform for TestPlatform {
    type Console = BufferConsole;
    type Bus = RamBus;
    type Card = SdCard<SimCard<CARD_BLOCKS>>;
    type Fs = MemFs;
    type Trampoline = ScriptedTrampoline;
}

pub fn devices(fs: MemFs) -> Devices<TestPlatform> {
    devices_with(fs, SimCard::new(), returns_at_once)
}

pub fn devices_with(
    fs: MemFs,
    card: SimCard<CARD_BLOCKS>,
    program: Program,
) -> Devices<TestPlatform> {
    Devices {
        console: BufferConsole::new(),
        bus: RamBus::default(),
        card: SdCard::with_config(card, QUICK),
        fs,
        trampoline: ScriptedTrampoline::new(program),
    }
}

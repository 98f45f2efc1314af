//! Bit-level simulated SD card
//!
//! Plugs into [`BitBangSpi`](crate::spi::BitBangSpi) as its [`SpiPort`] and
//! behaves like a card on the other end of the wires: it samples MOSI on
//! every rising SCK edge, shifts its reply out on MISO most significant bit
//! first, and decodes command frames, data tokens and data blocks exactly as
//! they arrive on the bus. Nothing above the port register is shortcut, so
//! tests that pass against it exercise the real bit ordering and the real
//! protocol sequencing.
//!
//! Faults can be injected to drive every error path of the driver.

use crate::block::{Block, BLOCK_SIZE};
use crate::spi::{PortBits, SpiPort};

/// Injected misbehaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Never drives MISO: every byte reads 0xFF
    Unresponsive,
    /// Answers CMD0 but ACMD41 never completes
    NeverReady,
    /// Accepts CMD17 but never sends the data token
    NoDataToken,
    /// Rejects CMD17 for this LBA
    RejectReadAt(u32),
    /// Returns a CRC-error data response when writing this LBA
    RejectWriteAt(u32),
    /// Holds MISO low forever after accepting a written block
    StuckBusy,
}

const FIFO_LEN: usize = 640;
const COMMANDS: usize = 64;

/// Bytes of "busy" after every accepted write
const WRITE_BUSY_BYTES: u32 = 3;

/// Bytes between R1 and the data token on a read
const READ_ACCESS_BYTES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Command,
    WriteToken { lba: u32 },
    WriteData { lba: u32, pos: usize },
    WriteCrc { lba: u32, left: u8 },
}

/// Outgoing bytes queued by the card
struct Fifo {
    buf: [u8; FIFO_LEN],
    head: usize,
    len: usize,
}

impl Fifo {
    const fn new() -> Self {
        Self {
            buf: [0; FIFO_LEN],
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, byte: u8) {
        if self.len == FIFO_LEN {
            return;
        }
        self.buf[(self.head + self.len) % FIFO_LEN] = byte;
        self.len += 1;
    }

    fn pop(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let byte = self.buf[self.head];
        self.head = (self.head + 1) % FIFO_LEN;
        self.len -= 1;
        Some(byte)
    }

    fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

/// A card with `N` blocks of storage
pub struct SimCard<const N: usize> {
    blocks: [Block; N],
    fault: Option<Fault>,

    // wire level
    last_sck: bool,
    miso: bool,
    rx_shift: u8,
    bit_count: u8,
    tx_byte: u8,
    bytes: u64,

    // protocol level
    state: State,
    frame: [u8; 6],
    frame_len: usize,
    out: Fifo,
    busy: u32,
    idle: bool,
    ready: bool,
    app_cmd: bool,
    init_rounds: u32,
    rounds_left: u32,
    write_buf: Block,
    counts: [u32; COMMANDS],
    last_args: [Option<u32>; COMMANDS],
}

impl<const N: usize> SimCard<N> {
    pub fn new() -> Self {
        Self {
            blocks: [[0; BLOCK_SIZE]; N],
            fault: None,
            last_sck: false,
            miso: true,
            rx_shift: 0,
            bit_count: 0,
            tx_byte: 0xFF,
            bytes: 0,
            state: State::Command,
            frame: [0; 6],
            frame_len: 0,
            out: Fifo::new(),
            busy: 0,
            idle: false,
            ready: false,
            app_cmd: false,
            init_rounds: 2,
            rounds_left: 2,
            write_buf: [0; BLOCK_SIZE],
            counts: [0; COMMANDS],
            last_args: [None; COMMANDS],
        }
    }

    /// ACMD41 rounds answered "still idle" before the card becomes ready
    pub fn with_init_rounds(mut self, rounds: u32) -> Self {
        self.init_rounds = rounds;
        self.rounds_left = rounds;
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn set_fault(&mut self, fault: Option<Fault>) {
        self.fault = fault;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Number of frames received for command index `cmd`
    pub fn command_count(&self, cmd: u8) -> u32 {
        self.counts[cmd as usize % COMMANDS]
    }

    /// Argument of the most recent frame for command index `cmd`
    pub fn last_arg(&self, cmd: u8) -> Option<u32> {
        self.last_args[cmd as usize % COMMANDS]
    }

    /// Total bytes clocked on the bus, selected or not
    pub fn bytes_clocked(&self) -> u64 {
        self.bytes
    }

    pub fn block(&self, lba: u32) -> &Block {
        &self.blocks[lba as usize]
    }

    pub fn load(&mut self, lba: u32, data: &Block) {
        self.blocks[lba as usize] = *data;
    }

    fn next_out(&mut self) -> u8 {
        if let Some(byte) = self.out.pop() {
            return byte;
        }
        if self.busy > 0 {
            if self.fault != Some(Fault::StuckBusy) {
                self.busy -= 1;
            }
            return 0x00;
        }
        0xFF
    }

    fn idle_bit(&self) -> u8 {
        if self.ready {
            0x00
        } else {
            0x01
        }
    }

    fn on_byte(&mut self, rx: u8) -> u8 {
        match self.state {
            State::Command => self.on_command_byte(rx),
            State::WriteToken { lba } => {
                if rx == crate::sd::DATA_START_BLOCK {
                    self.state = State::WriteData { lba, pos: 0 };
                }
                self.next_out()
            }
            State::WriteData { lba, pos } => {
                self.write_buf[pos] = rx;
                self.state = if pos + 1 == BLOCK_SIZE {
                    State::WriteCrc { lba, left: 2 }
                } else {
                    State::WriteData { lba, pos: pos + 1 }
                };
                0xFF
            }
            State::WriteCrc { lba, left } => {
                if left > 1 {
                    self.state = State::WriteCrc { lba, left: left - 1 };
                    return 0xFF;
                }
                self.state = State::Command;
                if self.fault == Some(Fault::RejectWriteAt(lba)) {
                    // xxx0_1011: CRC error
                    return 0x0B;
                }
                self.blocks[lba as usize] = self.write_buf;
                self.busy = WRITE_BUSY_BYTES;
                0xE5
            }
        }
    }

    fn on_command_byte(&mut self, rx: u8) -> u8 {
        if self.frame_len == 0 && rx & 0xC0 != 0x40 {
            return self.next_out();
        }
        self.frame[self.frame_len] = rx;
        self.frame_len += 1;
        if self.frame_len < self.frame.len() {
            return 0xFF;
        }
        self.frame_len = 0;

        let cmd = self.frame[0] & 0x3F;
        let arg = u32::from_be_bytes([self.frame[1], self.frame[2], self.frame[3], self.frame[4]]);
        self.counts[cmd as usize] += 1;
        self.last_args[cmd as usize] = Some(arg);

        self.out.clear();
        self.respond(cmd, arg);
        self.next_out()
    }

    fn respond(&mut self, cmd: u8, arg: u32) {
        let app = core::mem::take(&mut self.app_cmd);
        // NCR: one filler byte before the response
        self.out.push(0xFF);

        match cmd {
            0 => {
                if self.frame[5] != 0x95 {
                    self.out.push(0x09);
                    return;
                }
                self.idle = true;
                self.ready = false;
                self.rounds_left = self.init_rounds;
                self.out.push(0x01);
            }
            8 if self.idle => {
                self.out.push(self.idle_bit());
                for byte in [0x00, 0x00, (arg >> 8) as u8 & 0x0F, arg as u8] {
                    self.out.push(byte);
                }
            }
            55 if self.idle => {
                self.app_cmd = true;
                self.out.push(self.idle_bit());
            }
            41 if app => {
                if self.fault == Some(Fault::NeverReady) || self.rounds_left > 0 {
                    self.rounds_left = self.rounds_left.saturating_sub(1);
                    self.out.push(0x01);
                } else {
                    self.ready = true;
                    self.out.push(0x00);
                }
            }
            17 if self.ready => {
                if arg as usize >= N {
                    self.out.push(0x20);
                    return;
                }
                if self.fault == Some(Fault::RejectReadAt(arg)) {
                    self.out.push(0x40);
                    return;
                }
                self.out.push(0x00);
                if self.fault == Some(Fault::NoDataToken) {
                    return;
                }
                for _ in 0..READ_ACCESS_BYTES {
                    self.out.push(0xFF);
                }
                self.out.push(crate::sd::DATA_START_BLOCK);
                for i in 0..BLOCK_SIZE {
                    let byte = self.blocks[arg as usize][i];
                    self.out.push(byte);
                }
                self.out.push(0x00);
                self.out.push(0x00);
            }
            24 if self.ready => {
                if arg as usize >= N {
                    self.out.push(0x20);
                    return;
                }
                self.out.push(0x00);
                self.state = State::WriteToken { lba: arg };
            }
            _ => {
                // illegal command, plus the idle bit if still initializing
                self.out.push(0x04 | self.idle_bit());
            }
        }
    }
}

impl<const N: usize> Default for SimCard<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SpiPort for SimCard<N> {
    fn write(&mut self, bits: PortBits) {
        let sck = bits.contains(PortBits::SCK);
        let selected = !bits.contains(PortBits::CS);

        if sck && !self.last_sck {
            let bit = 7 - self.bit_count;
            self.miso = !selected || (self.tx_byte >> bit) & 1 != 0;
            self.rx_shift = (self.rx_shift << 1) | bits.contains(PortBits::MOSI) as u8;
            self.bit_count += 1;

            if self.bit_count == 8 {
                self.bit_count = 0;
                self.bytes += 1;
                let rx = self.rx_shift;
                self.tx_byte = if !selected {
                    // deselected: stop transmitting, keep finishing a program cycle
                    self.out.clear();
                    self.frame_len = 0;
                    self.busy = self.busy.saturating_sub(1);
                    0xFF
                } else if self.fault == Some(Fault::Unresponsive) {
                    0xFF
                } else {
                    self.on_byte(rx)
                };
            }
        }
        self.last_sck = sck;
    }

    fn read(&mut self) -> u32 {
        self.miso as u32
    }
}

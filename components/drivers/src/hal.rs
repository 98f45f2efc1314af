//! Raw hardware access
//!
//! The only module that turns integers into pointers. Everything else in the
//! system reaches memory-mapped registers through [`Register`] and arbitrary
//! RAM through a [`Bus`], and waits on hardware only through [`poll`].

use core::ptr::{read_volatile, write_volatile};

/// One 32-bit memory-mapped register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    addr: usize,
}

impl Register {
    /// Bind a register at a fixed physical address
    ///
    /// # Safety
    /// `addr` must be a valid, 4-byte aligned MMIO register on this board.
    pub const unsafe fn new(addr: usize) -> Self {
        Self { addr }
    }

    /// Address this register is bound to
    pub const fn addr(&self) -> usize {
        self.addr
    }

    #[inline]
    pub fn read(&self) -> u32 {
        // Safety: construction guarantees a valid register address
        unsafe { read_volatile(self.addr as *const u32) }
    }

    #[inline]
    pub fn write(&self, value: u32) {
        // Safety: construction guarantees a valid register address
        unsafe { write_volatile(self.addr as *mut u32, value) }
    }
}

/// Address-based memory access used by the monitor's memory commands and
/// the program loader
///
/// Word accesses are little-endian, matching the RV32 core.
pub trait Bus {
    fn read_u32(&mut self, addr: u32) -> u32;
    fn write_u32(&mut self, addr: u32, value: u32);
    fn read_u8(&mut self, addr: u32) -> u8;
    fn write_u8(&mut self, addr: u32, value: u8);

    /// Copy `data` to consecutive addresses starting at `addr`
    fn write_bytes(&mut self, addr: u32, data: &[u8]) {
        for (offset, byte) in data.iter().enumerate() {
            self.write_u8(addr.wrapping_add(offset as u32), *byte);
        }
    }
}

/// Physical memory
///
/// There is no memory protection on the target: any address the user types
/// is accessed as-is. On RV32 every access is a single load or store
/// instruction, so a null, unmapped or misaligned address gets whatever the
/// hardware does with it.
#[derive(Debug)]
pub struct PhysBus {
    _private: (),
}

impl PhysBus {
    /// # Safety
    /// The caller asserts it runs on the target with the whole address space
    /// identity-mapped.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Bus for PhysBus {
    fn read_u32(&mut self, addr: u32) -> u32 {
        // Safety: PhysBus::new contract
        unsafe { raw::load_word(addr as usize) }
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        // Safety: PhysBus::new contract
        unsafe { raw::store_word(addr as usize, value) }
    }

    fn read_u8(&mut self, addr: u32) -> u8 {
        // Safety: PhysBus::new contract
        unsafe { raw::load_byte(addr as usize) }
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        // Safety: PhysBus::new contract
        unsafe { raw::store_byte(addr as usize, value) }
    }
}

/// Loads and stores at arbitrary addresses
#[cfg(target_arch = "riscv32")]
mod raw {
    use core::arch::asm;

    #[inline]
    pub unsafe fn load_word(addr: usize) -> u32 {
        let value: u32;
        asm!("lw {0}, 0({1})", out(reg) value, in(reg) addr, options(nostack, preserves_flags));
        value
    }

    #[inline]
    pub unsafe fn store_word(addr: usize, value: u32) {
        asm!("sw {0}, 0({1})", in(reg) value, in(reg) addr, options(nostack, preserves_flags));
    }

    #[inline]
    pub unsafe fn load_byte(addr: usize) -> u8 {
        let value: u32;
        asm!("lbu {0}, 0({1})", out(reg) value, in(reg) addr, options(nostack, preserves_flags));
        value as u8
    }

    #[inline]
    pub unsafe fn store_byte(addr: usize, value: u8) {
        asm!("sb {0}, 0({1})", in(reg) value as u32, in(reg) addr, options(nostack, preserves_flags));
    }
}

/// Host builds: the address must be valid and aligned for the access
#[cfg(not(target_arch = "riscv32"))]
mod raw {
    use core::ptr::{read_volatile, write_volatile};

    #[inline]
    pub unsafe fn load_word(addr: usize) -> u32 {
        read_volatile(addr as *const u32)
    }

    #[inline]
    pub unsafe fn store_word(addr: usize, value: u32) {
        write_volatile(addr as *mut u32, value)
    }

    #[inline]
    pub unsafe fn load_byte(addr: usize) -> u8 {
        read_volatile(addr as *const u8)
    }

    #[inline]
    pub unsafe fn store_byte(addr: usize, value: u8) {
        write_volatile(addr as *mut u8, value)
    }
}

/// Bounded busy-wait
///
/// Calls `attempt` up to `budget` times and returns the first `Some` value.
/// `None` means the budget ran out; callers turn that into their own
/// timeout error.
pub fn poll<T>(budget: u32, mut attempt: impl FnMut() -> Option<T>) -> Option<T> {
    for _ in 0..budget {
        if let Some(value) = attempt() {
            return Some(value);
        }
        core::hint::spin_loop();
    }
    None
}

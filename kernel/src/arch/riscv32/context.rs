//! Saving the monitor's registers around a program run
//!
//! A loaded program is plain RV32 code with no obligation to follow the
//! calling convention: it may clobber `gp`, `tp` and the saved registers and
//! it runs on the monitor's stack. Before jumping, the trampoline stores every
//! register the monitor relies on into a [`UserContext`] and parks a pointer
//! to it in `PICOMON_SAVED_CTX`; on return it reloads them from there.
//!
//! ## Context Layout
//!
//! Word `n` of the context holds register `xn`. Only these are written:
//!
//! ```text
//!   x1 ra    x2 sp    x3 gp    x4 tp
//!   x8 s0    x9 s1    x18..x27 s2..s11
//! ```

use core::arch::global_asm;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use picomon_sdk::abi::{ServiceTable, Services};

use crate::abi::{self, SERVICE_TABLE};
use crate::trampoline::Trampoline;

/// Saved register file, indexed by register number
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UserContext(pub [u32; 32]);

impl UserContext {
    pub const fn new() -> Self {
        Self([0; 32])
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Context of the innermost program run in progress
#[no_mangle]
static PICOMON_SAVED_CTX: AtomicPtr<UserContext> = AtomicPtr::new(ptr::null_mut());

extern "C" {
    /// Save callee state into `ctx`, call `entry(table)`, restore, return
    fn picomon_run_with_context(entry: u32, table: *const ServiceTable, ctx: *mut UserContext);
}

global_asm!(
    r#"
    .section .text.picomon_run_with_context, "ax"
    .globl picomon_run_with_context
picomon_run_with_context:
    sw ra,    4(a2)
    sw sp,    8(a2)
    sw gp,   12(a2)
    sw tp,   16(a2)
    sw s0,   32(a2)
    sw s1,   36(a2)
    sw s2,   72(a2)
    sw s3,   76(a2)
    sw s4,   80(a2)
    sw s5,   84(a2)
    sw s6,   88(a2)
    sw s7,   92(a2)
    sw s8,   96(a2)
    sw s9,  100(a2)
    sw s10, 104(a2)
    sw s11, 108(a2)

    la t0, {saved}
    sw a2, 0(t0)

    mv t1, a0
    mv a0, a1
    jalr ra, 0(t1)

    la t0, {saved}
    lw a2, 0(t0)

    lw ra,    4(a2)
    lw sp,    8(a2)
    lw gp,   12(a2)
    lw tp,   16(a2)
    lw s0,   32(a2)
    lw s1,   36(a2)
    lw s2,   72(a2)
    lw s3,   76(a2)
    lw s4,   80(a2)
    lw s5,   84(a2)
    lw s6,   88(a2)
    lw s7,   92(a2)
    lw s8,   96(a2)
    lw s9,  100(a2)
    lw s10, 104(a2)
    lw s11, 108(a2)
    ret
"#,
    saved = sym PICOMON_SAVED_CTX,
);

/// Enters programs through `picomon_run_with_context`
#[derive(Debug, Clone, Copy, Default)]
pub struct RiscvTrampoline;

impl Trampoline for RiscvTrampoline {
    fn run(&self, entry: u32, services: &mut dyn Services) {
        let mut ctx = UserContext::new();
        let outer = PICOMON_SAVED_CTX.load(Ordering::Relaxed);
        abi::publish(services, || {
            // Safety: `entry` holds a freshly loaded image and `ctx` lives on
            // this frame until the program returns
            unsafe { picomon_run_with_context(entry, &SERVICE_TABLE, &mut ctx) }
        });
        PICOMON_SAVED_CTX.store(outer, Ordering::Relaxed);
    }
}

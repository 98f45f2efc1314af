//! Reset vector and early boot
//!
//! The first six words of RAM are jump instructions. Word 0 is the reset
//! entry; words 1..=5 are the fixed service addresses from the SDK's
//! `abi` module, in table order:
//!
//! ```text
//!   0x1000_0000  j _start
//!   0x1000_0004  j picomon_svc_putc
//!   0x1000_0008  j picomon_svc_getc
//!   0x1000_000C  j picomon_svc_print
//!   0x1000_0010  j picomon_svc_exec
//!   0x1000_0014  j picomon_svc_ls
//! ```
//!
//! `_start` points the stack at the top of the stack region, clears `.bss`
//! and calls `picomon_main`, which the firmware binary provides.

use core::arch::global_asm;

use picomon_sdk::abi;

// Each vector slot is a single 4-byte `j`
static_assertions::const_assert_eq!(abi::vector_slot(abi::ADDR_PUTC), 1);
static_assertions::const_assert_eq!(abi::vector_slot(abi::ADDR_LS), 5);

global_asm!(
    r#"
    .section .text.vector, "ax"
    .globl _vector
_vector:
    j _start
    j picomon_svc_putc
    j picomon_svc_getc
    j picomon_svc_print
    j picomon_svc_exec
    j picomon_svc_ls

    .section .text._start, "ax"
    .globl _start
_start:
    la sp, _stack_top

    la t0, _bss_start
    la t1, _bss_end
1:
    bgeu t0, t1, 2f
    sw zero, 0(t0)
    addi t0, t0, 4
    j 1b
2:
    call picomon_main
3:
    wfi
    j 3b
"#
);

//! Architecture-specific code
//!
//! Only RV32 is supported. Everything here is dead weight on the host,
//! where the monitor runs its tests, so the whole module is target-gated.

#[cfg(target_arch = "riscv32")]
pub mod riscv32;

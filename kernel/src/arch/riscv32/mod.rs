//! RV32 support: reset vector, boot, and the program trampoline

pub mod boot;
pub mod context;

pub use context::{RiscvTrampoline, UserContext};

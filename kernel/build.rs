use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=picomon.ld");
    println!("cargo:rerun-if-changed=build.rs");

    // Only the bare-metal image gets the linker script
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    if arch != "riscv32" {
        return;
    }

    let dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_default());
    println!("cargo:rustc-link-arg-bins=-T{}", dir.join("picomon.ld").display());
    // Service calls enter with the caller's gp; never relax to gp-relative
    println!("cargo:rustc-link-arg-bins=--no-relax");
}

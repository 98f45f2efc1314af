//! `peek`, `poke` and `dump`
//!
//! All three work from the context cursor and leave it just past the last
//! byte touched, so repeating a command with no address walks through
//! memory.

use picomon_drivers::Bus;

use super::parse::parse_hex;
use crate::context::KernelContext;
use crate::platform::{Devices, Platform};

/// Rows printed by one `dump`
pub const DUMP_ROWS: u32 = 4;
/// Bytes per `dump` row
pub const DUMP_WIDTH: u32 = 16;

/// Cursor from an optional address argument
fn start(ctx: KernelContext, args: &str) -> KernelContext {
    if args.is_empty() {
        ctx
    } else {
        ctx.at(parse_hex(args))
    }
}

pub fn peek<P: Platform>(dev: &mut Devices<P>, ctx: KernelContext, args: &str) -> KernelContext {
    let ctx = start(ctx, args);
    let value = dev.bus.read_u32(ctx.cursor);
    outln!(dev, "READ  0x{:08X} -> 0x{:08X}", ctx.cursor, value);
    ctx.advanced(4)
}

/// `poke addr value` or `poke value` at the cursor
pub fn poke<P: Platform>(dev: &mut Devices<P>, ctx: KernelContext, args: &str) -> KernelContext {
    if args.is_empty() {
        outln!(dev, "Usage: poke [addr] val");
        return ctx;
    }
    let (addr, value) = match args.split_once(' ') {
        Some((addr, value)) => (parse_hex(addr), parse_hex(value)),
        None => (ctx.cursor, parse_hex(args)),
    };
    dev.bus.write_u32(addr, value);
    outln!(dev, "WRITE 0x{:08X} <- 0x{:08X}", addr, value);
    ctx.at(addr).advanced(4)
}

fn printable(byte: u8) -> char {
    if (32..=126).contains(&byte) {
        byte as char
    } else {
        '.'
    }
}

pub fn dump<P: Platform>(dev: &mut Devices<P>, ctx: KernelContext, args: &str) -> KernelContext {
    let mut ctx = start(ctx, args);
    for _ in 0..DUMP_ROWS {
        let mut row = [0u8; DUMP_WIDTH as usize];
        for (i, byte) in row.iter_mut().enumerate() {
            *byte = dev.bus.read_u8(ctx.cursor.wrapping_add(i as u32));
        }

        out!(dev, "0x{:08X}: ", ctx.cursor);
        for byte in row {
            out!(dev, "{:02X} ", byte);
        }
        out!(dev, "|");
        for byte in row {
            out!(dev, "{}", printable(byte));
        }
        outln!(dev, "|");

        ctx = ctx.advanced(DUMP_WIDTH);
    }
    ctx
}

//! Stack helpers
//!
//! The stack grows downward. A push writes the high byte first so that the
//! word ends up little-endian in memory, which is what a pop reads back.

use crate::memory::Memory;
use crate::registers::RegisterFile;

/// Push a word: SP -= 1, write high byte, SP -= 1, write low byte
pub fn push_word<M: Memory>(regs: &mut RegisterFile, mem: &mut M, val: u16) {
    regs.sp = regs.sp.wrapping_sub(1);
    mem.write(regs.sp, (val >> 8) as u8);
    regs.sp = regs.sp.wrapping_sub(1);
    mem.write(regs.sp, val as u8);
}

/// Pop a word: low byte at SP, high byte at SP+1, SP += 2
pub fn pop_word<M: Memory>(regs: &mut RegisterFile, mem: &M) -> u16 {
    let lo = mem.read(regs.sp) as u16;
    regs.sp = regs.sp.wrapping_add(1);
    let hi = mem.read(regs.sp) as u16;
    regs.sp = regs.sp.wrapping_add(1);
    (hi << 8) | lo
}

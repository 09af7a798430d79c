//! Instruction execution
//!
//! [`execute`] runs one resolved instruction against an explicit register
//! file and memory. On entry PC points at the instruction's opcode byte (for
//! CB instructions, at the byte after the prefix). Operands are read relative
//! to that address; PC is then advanced by the instruction length, or set to
//! the target of a taken control transfer.
//!
//! Anything that is engine state rather than register state (interrupt
//! enable, low-power mode, prefix dispatch) is reported back as an
//! [`Effect`] for the engine to apply.

use crate::instruction::{AluOp, Condition, Instruction, Op, Operand8, ShiftOp};
use crate::memory::Memory;
use crate::registers::{Flag, Reg8, RegisterFile};
use crate::stack::{pop_word, push_word};

/// Engine-visible outcome of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Nothing beyond register/memory changes
    Continue,
    /// A conditional transfer was taken; the taken cost applies
    BranchTaken,
    /// EI/DI/RETI changed the interrupt master enable
    Interrupts(bool),
    /// HALT
    Halt,
    /// STOP
    Stop,
    /// 0xCB: dispatch the next byte through the CB table
    Prefix,
}

/// Operand fetch relative to the address of the opcode byte
struct Operands {
    pc: u16,
}

impl Operands {
    fn d8<M: Memory>(&self, mem: &M) -> u8 {
        mem.read(self.pc.wrapping_add(1))
    }

    fn d16<M: Memory>(&self, mem: &M) -> u16 {
        mem.read_word(self.pc.wrapping_add(1))
    }

    fn r8<M: Memory>(&self, mem: &M) -> i8 {
        self.d8(mem) as i8
    }

    /// Resolve a memory operand to its address, applying HL+/HL- side effects
    fn address<M: Memory>(&self, operand: Operand8, regs: &mut RegisterFile, mem: &M) -> Option<u16> {
        match operand {
            Operand8::Reg(_) | Operand8::Imm => None,
            Operand8::Indirect(rr) => Some(regs.get16(rr)),
            Operand8::HlInc => {
                let addr = regs.hl();
                regs.set_hl(addr.wrapping_add(1));
                Some(addr)
            }
            Operand8::HlDec => {
                let addr = regs.hl();
                regs.set_hl(addr.wrapping_sub(1));
                Some(addr)
            }
            Operand8::HighImm => Some(0xFF00 | self.d8(mem) as u16),
            Operand8::HighC => Some(0xFF00 | regs.get8(Reg8::C) as u16),
            Operand8::Absolute => Some(self.d16(mem)),
        }
    }

    fn read<M: Memory>(&self, operand: Operand8, regs: &mut RegisterFile, mem: &M) -> u8 {
        match operand {
            Operand8::Reg(r) => regs.get8(r),
            Operand8::Imm => self.d8(mem),
            _ => match self.address(operand, regs, mem) {
                Some(addr) => mem.read(addr),
                None => 0xFF,
            },
        }
    }

    fn write<M: Memory>(&self, operand: Operand8, regs: &mut RegisterFile, mem: &mut M, val: u8) {
        match operand {
            Operand8::Reg(r) => regs.set8(r, val),
            // Never a destination in the opcode tables
            Operand8::Imm => {}
            _ => {
                if let Some(addr) = self.address(operand, regs, mem) {
                    mem.write(addr, val);
                }
            }
        }
    }
}

fn condition_met(regs: &RegisterFile, cond: Condition) -> bool {
    match cond {
        Condition::Always => true,
        Condition::NotZero => !regs.flag(Flag::Zero),
        Condition::Zero => regs.flag(Flag::Zero),
        Condition::NotCarry => !regs.flag(Flag::Carry),
        Condition::Carry => regs.flag(Flag::Carry),
    }
}

// Arithmetic operations

fn inc(regs: &mut RegisterFile, val: u8) -> u8 {
    let result = val.wrapping_add(1);
    regs.set_flag(Flag::Zero, result == 0);
    regs.set_flag(Flag::Subtract, false);
    regs.set_flag(Flag::HalfCarry, (val & 0x0F) == 0x0F);
    result
}

fn dec(regs: &mut RegisterFile, val: u8) -> u8 {
    let result = val.wrapping_sub(1);
    regs.set_flag(Flag::Zero, result == 0);
    regs.set_flag(Flag::Subtract, true);
    regs.set_flag(Flag::HalfCarry, (val & 0x0F) == 0);
    result
}

fn add(regs: &mut RegisterFile, val: u8, carry: bool) {
    let a = regs.a();
    let c = (carry && regs.flag(Flag::Carry)) as u8;
    let result = a as u16 + val as u16 + c as u16;
    regs.set_flags(
        result as u8 == 0,
        false,
        (a & 0x0F) + (val & 0x0F) + c > 0x0F,
        result > 0xFF,
    );
    regs.set_a(result as u8);
}

/// Shared by SUB, SBC and CP; returns the truncated difference
fn sub(regs: &mut RegisterFile, val: u8, carry: bool) -> u8 {
    let a = regs.a();
    let c = (carry && regs.flag(Flag::Carry)) as u8;
    let result = a.wrapping_sub(val).wrapping_sub(c);
    regs.set_flags(
        result == 0,
        true,
        (a & 0x0F) < (val & 0x0F) + c,
        (a as u16) < val as u16 + c as u16,
    );
    result
}

fn alu(regs: &mut RegisterFile, op: AluOp, val: u8) {
    match op {
        AluOp::Add => add(regs, val, false),
        AluOp::Adc => add(regs, val, true),
        AluOp::Sub => {
            let result = sub(regs, val, false);
            regs.set_a(result);
        }
        AluOp::Sbc => {
            let result = sub(regs, val, true);
            regs.set_a(result);
        }
        AluOp::Cp => {
            sub(regs, val, false);
        }
        AluOp::And => {
            let result = regs.a() & val;
            regs.set_a(result);
            regs.set_flags(result == 0, false, true, false);
        }
        AluOp::Xor => {
            let result = regs.a() ^ val;
            regs.set_a(result);
            regs.set_flags(result == 0, false, false, false);
        }
        AluOp::Or => {
            let result = regs.a() | val;
            regs.set_a(result);
            regs.set_flags(result == 0, false, false, false);
        }
    }
}

fn add_hl(regs: &mut RegisterFile, val: u16) {
    let hl = regs.hl();
    let result = hl as u32 + val as u32;
    regs.set_flag(Flag::Subtract, false);
    regs.set_flag(Flag::HalfCarry, (hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF);
    regs.set_flag(Flag::Carry, result > 0xFFFF);
    regs.set_hl(result as u16);
}

/// SP + signed offset; flags come from the unsigned low byte addition
fn sp_offset(regs: &mut RegisterFile, offset: i8) -> u16 {
    let sp = regs.sp;
    let off = offset as i16 as u16;
    regs.set_flags(
        false,
        false,
        (sp & 0x000F) + (off & 0x000F) > 0x000F,
        (sp & 0x00FF) + (off & 0x00FF) > 0x00FF,
    );
    sp.wrapping_add(off)
}

fn daa(regs: &mut RegisterFile) {
    let mut a = regs.a();
    let subtract = regs.flag(Flag::Subtract);
    let mut adjust = 0u8;
    let mut carry = regs.flag(Flag::Carry);

    if regs.flag(Flag::HalfCarry) || (!subtract && (a & 0x0F) > 0x09) {
        adjust |= 0x06;
    }
    if carry || (!subtract && a > 0x99) {
        adjust |= 0x60;
        carry = true;
    }
    a = if subtract {
        a.wrapping_sub(adjust)
    } else {
        a.wrapping_add(adjust)
    };

    regs.set_a(a);
    regs.set_flag(Flag::Zero, a == 0);
    regs.set_flag(Flag::HalfCarry, false);
    regs.set_flag(Flag::Carry, carry);
}

/// Rotates and shifts. Z follows the result, N and H clear, C the shifted-out bit.
fn shift(regs: &mut RegisterFile, op: ShiftOp, val: u8) -> u8 {
    let carry_in = regs.flag(Flag::Carry);
    let (result, carry) = match op {
        ShiftOp::Rlc => (val.rotate_left(1), val & 0x80 != 0),
        ShiftOp::Rrc => (val.rotate_right(1), val & 0x01 != 0),
        ShiftOp::Rl => ((val << 1) | carry_in as u8, val & 0x80 != 0),
        ShiftOp::Rr => ((val >> 1) | ((carry_in as u8) << 7), val & 0x01 != 0),
        ShiftOp::Sla => (val << 1, val & 0x80 != 0),
        ShiftOp::Sra => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
        ShiftOp::Swap => (val.rotate_left(4), false),
        ShiftOp::Srl => (val >> 1, val & 0x01 != 0),
    };
    regs.set_flags(result == 0, false, false, carry);
    result
}

fn bit(regs: &mut RegisterFile, bit: u8, val: u8) {
    regs.set_flag(Flag::Zero, val & (1 << bit) == 0);
    regs.set_flag(Flag::Subtract, false);
    regs.set_flag(Flag::HalfCarry, true);
}

/// Execute one instruction
pub fn execute<M: Memory>(instr: &Instruction, regs: &mut RegisterFile, mem: &mut M) -> Effect {
    let ops = Operands { pc: regs.pc };
    let next = regs.pc.wrapping_add(instr.length as u16);
    regs.pc = next;

    match instr.op {
        Op::Nop => Effect::Continue,
        Op::Stop => Effect::Stop,
        Op::Halt => Effect::Halt,
        Op::Di => Effect::Interrupts(false),
        Op::Ei => Effect::Interrupts(true),
        Op::PrefixCb => Effect::Prefix,

        Op::Ld8 { dst, src } => {
            let val = ops.read(src, regs, mem);
            ops.write(dst, regs, mem, val);
            Effect::Continue
        }
        Op::Ld16Imm(rr) => {
            regs.set16(rr, ops.d16(mem));
            Effect::Continue
        }
        Op::StoreSp => {
            let addr = ops.d16(mem);
            mem.write_word(addr, regs.sp);
            Effect::Continue
        }
        Op::LdSpHl => {
            regs.sp = regs.hl();
            Effect::Continue
        }
        Op::LdHlSpOffset => {
            let result = sp_offset(regs, ops.r8(mem));
            regs.set_hl(result);
            Effect::Continue
        }
        Op::Push(rr) => {
            let val = regs.get16(rr);
            push_word(regs, mem, val);
            Effect::Continue
        }
        Op::Pop(rr) => {
            let val = pop_word(regs, mem);
            regs.set16(rr, val);
            Effect::Continue
        }

        Op::Inc8(target) => {
            let val = ops.read(target, regs, mem);
            let result = inc(regs, val);
            ops.write(target, regs, mem, result);
            Effect::Continue
        }
        Op::Dec8(target) => {
            let val = ops.read(target, regs, mem);
            let result = dec(regs, val);
            ops.write(target, regs, mem, result);
            Effect::Continue
        }
        Op::Inc16(rr) => {
            regs.set16(rr, regs.get16(rr).wrapping_add(1));
            Effect::Continue
        }
        Op::Dec16(rr) => {
            regs.set16(rr, regs.get16(rr).wrapping_sub(1));
            Effect::Continue
        }
        Op::Alu(op, src) => {
            let val = ops.read(src, regs, mem);
            alu(regs, op, val);
            Effect::Continue
        }
        Op::AddHl(rr) => {
            let val = regs.get16(rr);
            add_hl(regs, val);
            Effect::Continue
        }
        Op::AddSpOffset => {
            regs.sp = sp_offset(regs, ops.r8(mem));
            Effect::Continue
        }

        Op::RotateA(op) => {
            let a = regs.a();
            let result = shift(regs, op, a);
            regs.set_a(result);
            regs.set_flag(Flag::Zero, false);
            Effect::Continue
        }
        Op::Daa => {
            daa(regs);
            Effect::Continue
        }
        Op::Cpl => {
            regs.set_a(!regs.a());
            regs.set_flag(Flag::Subtract, true);
            regs.set_flag(Flag::HalfCarry, true);
            Effect::Continue
        }
        Op::Scf => {
            regs.set_flag(Flag::Subtract, false);
            regs.set_flag(Flag::HalfCarry, false);
            regs.set_flag(Flag::Carry, true);
            Effect::Continue
        }
        Op::Ccf => {
            let carry = regs.flag(Flag::Carry);
            regs.set_flag(Flag::Subtract, false);
            regs.set_flag(Flag::HalfCarry, false);
            regs.set_flag(Flag::Carry, !carry);
            Effect::Continue
        }

        Op::Jr(cond) => {
            let offset = ops.r8(mem);
            if condition_met(regs, cond) {
                regs.pc = next.wrapping_add(offset as i16 as u16);
                Effect::BranchTaken
            } else {
                Effect::Continue
            }
        }
        Op::Jp(cond) => {
            let addr = ops.d16(mem);
            if condition_met(regs, cond) {
                regs.pc = addr;
                Effect::BranchTaken
            } else {
                Effect::Continue
            }
        }
        Op::JpHl => {
            regs.pc = regs.hl();
            Effect::Continue
        }
        Op::Call(cond) => {
            let addr = ops.d16(mem);
            if condition_met(regs, cond) {
                push_word(regs, mem, next);
                regs.pc = addr;
                Effect::BranchTaken
            } else {
                Effect::Continue
            }
        }
        Op::Ret(cond) => {
            if condition_met(regs, cond) {
                regs.pc = pop_word(regs, mem);
                Effect::BranchTaken
            } else {
                Effect::Continue
            }
        }
        Op::Reti => {
            regs.pc = pop_word(regs, mem);
            Effect::Interrupts(true)
        }
        Op::Rst(vector) => {
            push_word(regs, mem, next);
            regs.pc = vector as u16;
            Effect::Continue
        }

        Op::Shift(op, target) => {
            let val = ops.read(target, regs, mem);
            let result = shift(regs, op, val);
            ops.write(target, regs, mem, result);
            Effect::Continue
        }
        Op::Bit(b, target) => {
            let val = ops.read(target, regs, mem);
            bit(regs, b, val);
            Effect::Continue
        }
        Op::Res(b, target) => {
            let val = ops.read(target, regs, mem);
            ops.write(target, regs, mem, val & !(1 << b));
            Effect::Continue
        }
        Op::Set(b, target) => {
            let val = ops.read(target, regs, mem);
            ops.write(target, regs, mem, val | (1 << b));
            Effect::Continue
        }
    }
}

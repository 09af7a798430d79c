//! Opcode tables for the LR35902
//!
//! Two independent 256-slot tables: the base table and the CB table reached
//! through the 0xCB prefix. Both are filled through [`TableBuilder`], which
//! refuses any entry whose cycle cost is not a positive multiple of 4 and any
//! second registration of the same opcode. The standard table is built once
//! per process and shared.
//!
//! Eleven base opcodes (D3 DB DD E3 E4 EB EC ED F4 FC FD) do not exist on the
//! hardware and stay empty; fetching one is an `UnknownOpcode` error.

use crate::error::TableError;
use crate::instruction::{AluOp, Condition, Instruction, Op, Operand8, ShiftOp};
use crate::registers::{Reg16, Reg8};
use std::sync::{Arc, OnceLock};

type Slots = Box<[Option<Instruction>; 256]>;

fn empty_slots() -> Slots {
    Box::new(std::array::from_fn(|_| None))
}

/// Resolved opcode tables
#[derive(Debug, Clone)]
pub struct OpcodeTable {
    base: Slots,
    cb: Slots,
}

impl OpcodeTable {
    /// The process-wide standard table, built on first use
    pub fn standard() -> Result<Arc<OpcodeTable>, TableError> {
        static TABLE: OnceLock<Result<Arc<OpcodeTable>, TableError>> = OnceLock::new();
        TABLE
            .get_or_init(|| Self::build().map(Arc::new))
            .clone()
    }

    /// Build a fresh copy of the standard table
    pub fn build() -> Result<Self, TableError> {
        let mut builder = TableBuilder::new();
        register_base(&mut builder)?;
        register_cb(&mut builder)?;
        Ok(builder.finish())
    }

    /// Base-table entry for `opcode`
    #[inline]
    pub fn lookup(&self, opcode: u8) -> Option<&Instruction> {
        self.base[opcode as usize].as_ref()
    }

    /// CB-table entry for the byte following the prefix
    #[inline]
    pub fn lookup_cb(&self, opcode: u8) -> Option<&Instruction> {
        self.cb[opcode as usize].as_ref()
    }

    /// Number of populated base slots
    pub fn len(&self) -> usize {
        self.base.iter().flatten().count()
    }

    /// Number of populated CB slots
    pub fn cb_len(&self) -> usize {
        self.cb.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.cb_len() == 0
    }

    /// Every populated entry, base table first
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.base.iter().chain(self.cb.iter()).flatten()
    }
}

/// Validating opcode table builder
#[derive(Debug)]
pub struct TableBuilder {
    base: Slots,
    cb: Slots,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn check_cycles(instr: &Instruction, cycles: u8) -> Result<(), TableError> {
    if cycles == 0 || cycles % 4 != 0 {
        return Err(TableError::InvalidCycles {
            opcode: instr.opcode,
            prefixed: instr.prefixed,
            cycles,
        });
    }
    Ok(())
}

impl TableBuilder {
    pub fn new() -> Self {
        Self {
            base: empty_slots(),
            cb: empty_slots(),
        }
    }

    /// Register an instruction in the table its `prefixed` flag selects
    pub fn insert(&mut self, instr: Instruction) -> Result<&mut Self, TableError> {
        check_cycles(&instr, instr.cycles)?;
        if let Some(taken) = instr.taken_cycles {
            check_cycles(&instr, taken)?;
        }
        if instr.length == 0 {
            return Err(TableError::InvalidLength {
                opcode: instr.opcode,
                prefixed: instr.prefixed,
            });
        }

        let slots = if instr.prefixed {
            &mut self.cb
        } else {
            &mut self.base
        };
        let slot = &mut slots[instr.opcode as usize];
        if let Some(existing) = slot {
            return Err(TableError::DuplicateOpcode {
                opcode: instr.opcode,
                prefixed: instr.prefixed,
                existing: existing.label.clone(),
                rejected: instr.label,
            });
        }
        *slot = Some(instr);
        Ok(self)
    }

    pub fn finish(self) -> OpcodeTable {
        OpcodeTable {
            base: self.base,
            cb: self.cb,
        }
    }
}

// Cost of an 8-bit operand form: (HL) adds one memory access
fn cost(operand: Operand8, reg: u8, mem: u8) -> u8 {
    if operand.is_memory() {
        mem
    } else {
        reg
    }
}

fn register_base(b: &mut TableBuilder) -> Result<(), TableError> {
    use Instruction as I;

    let pairs = [Reg16::BC, Reg16::DE, Reg16::HL, Reg16::SP];
    let stack_pairs = [Reg16::BC, Reg16::DE, Reg16::HL, Reg16::AF];
    let a = Operand8::Reg(Reg8::A);

    b.insert(I::new(0x00, 1, 4, Op::Nop))?;
    b.insert(I::new(0x10, 2, 4, Op::Stop))?;
    b.insert(I::new(0x76, 1, 4, Op::Halt))?;
    b.insert(I::new(0xF3, 1, 4, Op::Di))?;
    b.insert(I::new(0xFB, 1, 4, Op::Ei))?;
    b.insert(I::new(0xCB, 1, 4, Op::PrefixCb))?;

    // 16-bit loads and arithmetic, one row per register pair
    for (i, &rr) in pairs.iter().enumerate() {
        let row = (i as u8) << 4;
        b.insert(I::new(0x01 | row, 3, 12, Op::Ld16Imm(rr)))?;
        b.insert(I::new(0x03 | row, 1, 8, Op::Inc16(rr)))?;
        b.insert(I::new(0x09 | row, 1, 8, Op::AddHl(rr)))?;
        b.insert(I::new(0x0B | row, 1, 8, Op::Dec16(rr)))?;
    }
    for (i, &rr) in stack_pairs.iter().enumerate() {
        let row = (i as u8) << 4;
        b.insert(I::new(0xC1 | row, 1, 12, Op::Pop(rr)))?;
        b.insert(I::new(0xC5 | row, 1, 16, Op::Push(rr)))?;
    }

    // LD (rr),A / LD A,(rr)
    let indirect = [
        Operand8::Indirect(Reg16::BC),
        Operand8::Indirect(Reg16::DE),
        Operand8::HlInc,
        Operand8::HlDec,
    ];
    for (i, &mem) in indirect.iter().enumerate() {
        let row = (i as u8) << 4;
        b.insert(I::new(0x02 | row, 1, 8, Op::Ld8 { dst: mem, src: a }))?;
        b.insert(I::new(0x0A | row, 1, 8, Op::Ld8 { dst: a, src: mem }))?;
    }

    // INC r / DEC r / LD r,d8
    for (i, &r) in Operand8::ENCODED.iter().enumerate() {
        let col = (i as u8) << 3;
        b.insert(I::new(0x04 | col, 1, cost(r, 4, 12), Op::Inc8(r)))?;
        b.insert(I::new(0x05 | col, 1, cost(r, 4, 12), Op::Dec8(r)))?;
        b.insert(I::new(
            0x06 | col,
            2,
            cost(r, 8, 12),
            Op::Ld8 { dst: r, src: Operand8::Imm },
        ))?;
    }

    b.insert(I::new(0x07, 1, 4, Op::RotateA(ShiftOp::Rlc)))?;
    b.insert(I::new(0x0F, 1, 4, Op::RotateA(ShiftOp::Rrc)))?;
    b.insert(I::new(0x17, 1, 4, Op::RotateA(ShiftOp::Rl)))?;
    b.insert(I::new(0x1F, 1, 4, Op::RotateA(ShiftOp::Rr)))?;
    b.insert(I::new(0x27, 1, 4, Op::Daa))?;
    b.insert(I::new(0x2F, 1, 4, Op::Cpl))?;
    b.insert(I::new(0x37, 1, 4, Op::Scf))?;
    b.insert(I::new(0x3F, 1, 4, Op::Ccf))?;

    b.insert(I::new(0x08, 3, 20, Op::StoreSp))?;

    // LD r,r' (0x76 would be LD (HL),(HL) and is HALT instead)
    for (d, &dst) in Operand8::ENCODED.iter().enumerate() {
        for (s, &src) in Operand8::ENCODED.iter().enumerate() {
            let opcode = 0x40 | ((d as u8) << 3) | s as u8;
            if opcode == 0x76 {
                continue;
            }
            let cycles = if dst.is_memory() || src.is_memory() { 8 } else { 4 };
            b.insert(I::new(opcode, 1, cycles, Op::Ld8 { dst, src }))?;
        }
    }

    // ALU A,r and ALU A,d8
    for (o, &op) in AluOp::ENCODED.iter().enumerate() {
        let col = (o as u8) << 3;
        for (s, &src) in Operand8::ENCODED.iter().enumerate() {
            b.insert(I::new(0x80 | col | s as u8, 1, cost(src, 4, 8), Op::Alu(op, src)))?;
        }
        b.insert(I::new(0xC6 | col, 2, 8, Op::Alu(op, Operand8::Imm)))?;
    }

    // Control flow
    b.insert(I::new(0x18, 2, 12, Op::Jr(Condition::Always)))?;
    b.insert(I::new(0xC3, 3, 16, Op::Jp(Condition::Always)))?;
    b.insert(I::new(0xCD, 3, 24, Op::Call(Condition::Always)))?;
    b.insert(I::new(0xC9, 1, 16, Op::Ret(Condition::Always)))?;
    b.insert(I::new(0xD9, 1, 16, Op::Reti))?;
    b.insert(I::new(0xE9, 1, 4, Op::JpHl))?;
    for (i, &cond) in Condition::ENCODED.iter().enumerate() {
        let col = (i as u8) << 3;
        b.insert(I::branch(0x20 | col, 2, 8, 12, Op::Jr(cond)))?;
        b.insert(I::branch(0xC0 | col, 1, 8, 20, Op::Ret(cond)))?;
        b.insert(I::branch(0xC2 | col, 3, 12, 16, Op::Jp(cond)))?;
        b.insert(I::branch(0xC4 | col, 3, 12, 24, Op::Call(cond)))?;
    }
    for n in 0..8u8 {
        b.insert(I::new(0xC7 | (n << 3), 1, 16, Op::Rst(n << 3)))?;
    }

    // High page and absolute loads
    let high = |dst, src| Op::Ld8 { dst, src };
    b.insert(I::new(0xE0, 2, 12, high(Operand8::HighImm, a)))?;
    b.insert(I::new(0xF0, 2, 12, high(a, Operand8::HighImm)))?;
    b.insert(I::new(0xE2, 1, 8, high(Operand8::HighC, a)))?;
    b.insert(I::new(0xF2, 1, 8, high(a, Operand8::HighC)))?;
    b.insert(I::new(0xEA, 3, 16, high(Operand8::Absolute, a)))?;
    b.insert(I::new(0xFA, 3, 16, high(a, Operand8::Absolute)))?;

    // Stack pointer arithmetic
    b.insert(I::new(0xE8, 2, 16, Op::AddSpOffset))?;
    b.insert(I::new(0xF8, 2, 12, Op::LdHlSpOffset))?;
    b.insert(I::new(0xF9, 1, 8, Op::LdSpHl))?;

    Ok(())
}

// CB costs below exclude the 4 cycles of the prefix byte itself
fn register_cb(b: &mut TableBuilder) -> Result<(), TableError> {
    for opcode in 0..=255u8 {
        let target = Operand8::ENCODED[(opcode & 0x07) as usize];
        let y = (opcode >> 3) & 0x07;
        let (op, cycles) = match opcode >> 6 {
            0 => (Op::Shift(ShiftOp::ENCODED[y as usize], target), cost(target, 4, 12)),
            1 => (Op::Bit(y, target), cost(target, 4, 8)),
            2 => (Op::Res(y, target), cost(target, 4, 12)),
            _ => (Op::Set(y, target), cost(target, 4, 12)),
        };
        b.insert(Instruction::prefixed(opcode, cycles, op))?;
    }
    Ok(())
}

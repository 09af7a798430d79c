//! Instruction descriptors
//!
//! An [`Instruction`] is plain data: where it sits in the opcode space, how
//! many bytes it occupies, what it costs, and an [`Op`] describing the
//! operation together with its operand addressing. Executing it is the job
//! of [`crate::execute`].

use crate::registers::{Reg16, Reg8};
use std::fmt;

/// 8-bit operand addressing modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand8 {
    /// A named 8-bit register
    Reg(Reg8),
    /// d8: the byte following the opcode
    Imm,
    /// (rr): memory at the value of a register pair
    Indirect(Reg16),
    /// (HL+): memory at HL, then HL is incremented
    HlInc,
    /// (HL-): memory at HL, then HL is decremented
    HlDec,
    /// (a8): memory at 0xFF00 + d8
    HighImm,
    /// (C): memory at 0xFF00 + C
    HighC,
    /// (a16): memory at an absolute address
    Absolute,
}

impl Operand8 {
    /// Register operand order used by the opcode encoding (B C D E H L (HL) A)
    pub const ENCODED: [Operand8; 8] = [
        Operand8::Reg(Reg8::B),
        Operand8::Reg(Reg8::C),
        Operand8::Reg(Reg8::D),
        Operand8::Reg(Reg8::E),
        Operand8::Reg(Reg8::H),
        Operand8::Reg(Reg8::L),
        Operand8::Indirect(Reg16::HL),
        Operand8::Reg(Reg8::A),
    ];

    /// True when the operand touches memory rather than a register
    pub fn is_memory(self) -> bool {
        !matches!(self, Operand8::Reg(_) | Operand8::Imm)
    }
}

/// Branch conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    NotZero,
    Zero,
    NotCarry,
    Carry,
}

impl Condition {
    /// Condition order used by the opcode encoding (NZ Z NC C)
    pub const ENCODED: [Condition; 4] = [
        Condition::NotZero,
        Condition::Zero,
        Condition::NotCarry,
        Condition::Carry,
    ];
}

/// 8-bit accumulator arithmetic/logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    pub const ENCODED: [AluOp; 8] = [
        AluOp::Add,
        AluOp::Adc,
        AluOp::Sub,
        AluOp::Sbc,
        AluOp::And,
        AluOp::Xor,
        AluOp::Or,
        AluOp::Cp,
    ];
}

/// Rotates and shifts (CB 0x00-0x3F, and the accumulator forms)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

impl ShiftOp {
    pub const ENCODED: [ShiftOp; 8] = [
        ShiftOp::Rlc,
        ShiftOp::Rrc,
        ShiftOp::Rl,
        ShiftOp::Rr,
        ShiftOp::Sla,
        ShiftOp::Sra,
        ShiftOp::Swap,
        ShiftOp::Srl,
    ];
}

/// Operation performed by an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop,
    Stop,
    Halt,
    Di,
    Ei,
    /// 0xCB: the next byte selects a CB-table instruction
    PrefixCb,

    /// LD dst,src
    Ld8 { dst: Operand8, src: Operand8 },
    /// LD rr,d16
    Ld16Imm(Reg16),
    /// LD (a16),SP
    StoreSp,
    /// LD SP,HL
    LdSpHl,
    /// LD HL,SP+r8
    LdHlSpOffset,
    Push(Reg16),
    Pop(Reg16),

    Inc8(Operand8),
    Dec8(Operand8),
    Inc16(Reg16),
    Dec16(Reg16),
    Alu(AluOp, Operand8),
    /// ADD HL,rr
    AddHl(Reg16),
    /// ADD SP,r8
    AddSpOffset,

    /// RLCA/RRCA/RLA/RRA: Z is always cleared
    RotateA(ShiftOp),
    Daa,
    Cpl,
    Scf,
    Ccf,

    Jr(Condition),
    Jp(Condition),
    /// JP (HL)
    JpHl,
    Call(Condition),
    Ret(Condition),
    Reti,
    Rst(u8),

    Shift(ShiftOp, Operand8),
    Bit(u8, Operand8),
    Res(u8, Operand8),
    Set(u8, Operand8),
}

/// Immutable instruction descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Opcode value; for CB instructions the byte after the prefix
    pub opcode: u8,
    /// Lives in the CB table
    pub prefixed: bool,
    /// Bytes consumed, counting from the opcode byte
    pub length: u8,
    /// Clock cycles when no branch is taken
    pub cycles: u8,
    /// Clock cycles when a conditional branch is taken
    pub taken_cycles: Option<u8>,
    /// Human-readable mnemonic
    pub label: String,
    pub op: Op,
}

impl Instruction {
    pub fn new(opcode: u8, length: u8, cycles: u8, op: Op) -> Self {
        Self {
            opcode,
            prefixed: false,
            length,
            cycles,
            taken_cycles: None,
            label: op.to_string(),
            op,
        }
    }

    /// CB-table instruction; its length excludes the prefix byte
    pub fn prefixed(opcode: u8, cycles: u8, op: Op) -> Self {
        Self {
            prefixed: true,
            ..Self::new(opcode, 1, cycles, op)
        }
    }

    /// Conditional control transfer with a different cost when taken
    pub fn branch(opcode: u8, length: u8, cycles: u8, taken_cycles: u8, op: Op) -> Self {
        Self {
            taken_cycles: Some(taken_cycles),
            ..Self::new(opcode, length, cycles, op)
        }
    }
}

impl fmt::Display for Reg8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg8::A => "A",
            Reg8::B => "B",
            Reg8::C => "C",
            Reg8::D => "D",
            Reg8::E => "E",
            Reg8::H => "H",
            Reg8::L => "L",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Reg16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg16::AF => "AF",
            Reg16::BC => "BC",
            Reg16::DE => "DE",
            Reg16::HL => "HL",
            Reg16::SP => "SP",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Operand8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand8::Reg(r) => write!(f, "{}", r),
            Operand8::Imm => f.write_str("d8"),
            Operand8::Indirect(rr) => write!(f, "({})", rr),
            Operand8::HlInc => f.write_str("(HL+)"),
            Operand8::HlDec => f.write_str("(HL-)"),
            Operand8::HighImm => f.write_str("(a8)"),
            Operand8::HighC => f.write_str("(C)"),
            Operand8::Absolute => f.write_str("(a16)"),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Condition::Always => "",
            Condition::NotZero => "NZ",
            Condition::Zero => "Z",
            Condition::NotCarry => "NC",
            Condition::Carry => "C",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ShiftOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShiftOp::Rlc => "RLC",
            ShiftOp::Rrc => "RRC",
            ShiftOp::Rl => "RL",
            ShiftOp::Rr => "RR",
            ShiftOp::Sla => "SLA",
            ShiftOp::Sra => "SRA",
            ShiftOp::Swap => "SWAP",
            ShiftOp::Srl => "SRL",
        };
        f.write_str(name)
    }
}

/// Mnemonic with an optional condition, e.g. "JR" or "JR NZ,"
fn with_condition(f: &mut fmt::Formatter<'_>, name: &str, cond: Condition, operand: &str) -> fmt::Result {
    if cond == Condition::Always {
        if operand.is_empty() {
            f.write_str(name)
        } else {
            write!(f, "{} {}", name, operand)
        }
    } else if operand.is_empty() {
        write!(f, "{} {}", name, cond)
    } else {
        write!(f, "{} {},{}", name, cond, operand)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Op::Nop => f.write_str("NOP"),
            Op::Stop => f.write_str("STOP"),
            Op::Halt => f.write_str("HALT"),
            Op::Di => f.write_str("DI"),
            Op::Ei => f.write_str("EI"),
            Op::PrefixCb => f.write_str("PREFIX CB"),
            Op::Ld8 { dst: dst @ (Operand8::HighImm | Operand8::HighC), src } => {
                write!(f, "LDH {},{}", dst, src)
            }
            Op::Ld8 { dst, src: src @ (Operand8::HighImm | Operand8::HighC) } => {
                write!(f, "LDH {},{}", dst, src)
            }
            Op::Ld8 { dst, src } => write!(f, "LD {},{}", dst, src),
            Op::Ld16Imm(rr) => write!(f, "LD {},d16", rr),
            Op::StoreSp => f.write_str("LD (a16),SP"),
            Op::LdSpHl => f.write_str("LD SP,HL"),
            Op::LdHlSpOffset => f.write_str("LD HL,SP+r8"),
            Op::Push(rr) => write!(f, "PUSH {}", rr),
            Op::Pop(rr) => write!(f, "POP {}", rr),
            Op::Inc8(o) => write!(f, "INC {}", o),
            Op::Dec8(o) => write!(f, "DEC {}", o),
            Op::Inc16(rr) => write!(f, "INC {}", rr),
            Op::Dec16(rr) => write!(f, "DEC {}", rr),
            Op::Alu(op, o) => match op {
                AluOp::Add => write!(f, "ADD A,{}", o),
                AluOp::Adc => write!(f, "ADC A,{}", o),
                AluOp::Sub => write!(f, "SUB {}", o),
                AluOp::Sbc => write!(f, "SBC A,{}", o),
                AluOp::And => write!(f, "AND {}", o),
                AluOp::Xor => write!(f, "XOR {}", o),
                AluOp::Or => write!(f, "OR {}", o),
                AluOp::Cp => write!(f, "CP {}", o),
            },
            Op::AddHl(rr) => write!(f, "ADD HL,{}", rr),
            Op::AddSpOffset => f.write_str("ADD SP,r8"),
            Op::RotateA(op) => write!(f, "{}A", op),
            Op::Daa => f.write_str("DAA"),
            Op::Cpl => f.write_str("CPL"),
            Op::Scf => f.write_str("SCF"),
            Op::Ccf => f.write_str("CCF"),
            Op::Jr(cond) => with_condition(f, "JR", cond, "r8"),
            Op::Jp(cond) => with_condition(f, "JP", cond, "a16"),
            Op::JpHl => f.write_str("JP (HL)"),
            Op::Call(cond) => with_condition(f, "CALL", cond, "a16"),
            Op::Ret(cond) => with_condition(f, "RET", cond, ""),
            Op::Reti => f.write_str("RETI"),
            Op::Rst(vector) => write!(f, "RST {:02X}H", vector),
            Op::Shift(op, o) => write!(f, "{} {}", op, o),
            Op::Bit(b, o) => write!(f, "BIT {},{}", b, o),
            Op::Res(b, o) => write!(f, "RES {},{}", b, o),
            Op::Set(b, o) => write!(f, "SET {},{}", b, o),
        }
    }
}

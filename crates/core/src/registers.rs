//! LR35902 register file
//!
//! Four register pairs (AF, BC, DE, HL) plus SP and PC. A pair is always
//! combined high byte first: `value = (hi << 8) | lo`.

use serde::{Deserialize, Serialize};

/// Condition flags held in the low byte of AF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Z, bit 7
    Zero,
    /// N, bit 6
    Subtract,
    /// H, bit 5
    HalfCarry,
    /// C, bit 4
    Carry,
}

impl Flag {
    /// Bit mask of this flag inside F
    pub const fn mask(self) -> u8 {
        match self {
            Flag::Zero => 0b1000_0000,
            Flag::Subtract => 0b0100_0000,
            Flag::HalfCarry => 0b0010_0000,
            Flag::Carry => 0b0001_0000,
        }
    }
}

/// Bits of F that exist in hardware; the low nibble always reads 0
pub const FLAG_MASK: u8 = 0xF0;

/// 8-bit registers addressable by instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
}

/// 16-bit registers usable as instruction operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    BC,
    DE,
    HL,
    SP,
    /// Only reachable through PUSH/POP
    AF,
}

/// Two bytes addressable separately or as one 16-bit value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPair {
    pub hi: u8,
    pub lo: u8,
}

impl RegisterPair {
    pub const fn new(value: u16) -> Self {
        Self {
            hi: (value >> 8) as u8,
            lo: value as u8,
        }
    }

    /// Combined 16-bit value, high byte first
    #[inline]
    pub const fn value(self) -> u16 {
        ((self.hi as u16) << 8) | (self.lo as u16)
    }

    #[inline]
    pub fn set_value(&mut self, value: u16) {
        self.hi = (value >> 8) as u8;
        self.lo = value as u8;
    }
}

/// Power-up register values once the bootrom has handed over control
pub const RESET_AF: u16 = 0x01B0;
pub const RESET_BC: u16 = 0x0013;
pub const RESET_DE: u16 = 0x00D8;
pub const RESET_HL: u16 = 0x014D;
pub const RESET_SP: u16 = 0xFFFE;
/// Cartridge entry point
pub const CARTRIDGE_ENTRY: u16 = 0x0100;
/// Bootrom entry point
pub const BOOTROM_ENTRY: u16 = 0x0000;

/// CPU register state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    /// Accumulator (hi) and flags (lo)
    pub af: RegisterPair,
    pub bc: RegisterPair,
    pub de: RegisterPair,
    pub hl: RegisterPair,
    /// Stack pointer
    pub sp: u16,
    /// Program counter
    pub pc: u16,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new(CARTRIDGE_ENTRY)
    }
}

impl RegisterFile {
    /// Register file in its documented reset state with PC at `entry`
    pub fn new(entry: u16) -> Self {
        Self {
            af: RegisterPair::new(RESET_AF),
            bc: RegisterPair::new(RESET_BC),
            de: RegisterPair::new(RESET_DE),
            hl: RegisterPair::new(RESET_HL),
            sp: RESET_SP,
            pc: entry,
        }
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.af.hi
    }

    #[inline]
    pub fn set_a(&mut self, val: u8) {
        self.af.hi = val;
    }

    #[inline]
    pub fn f(&self) -> u8 {
        self.af.lo
    }

    pub fn af(&self) -> u16 {
        self.af.value()
    }

    /// Low nibble of F is forced to zero
    pub fn set_af(&mut self, val: u16) {
        self.af.set_value(val & 0xFFF0);
    }

    pub fn bc(&self) -> u16 {
        self.bc.value()
    }

    pub fn set_bc(&mut self, val: u16) {
        self.bc.set_value(val);
    }

    pub fn de(&self) -> u16 {
        self.de.value()
    }

    pub fn set_de(&mut self, val: u16) {
        self.de.set_value(val);
    }

    pub fn hl(&self) -> u16 {
        self.hl.value()
    }

    pub fn set_hl(&mut self, val: u16) {
        self.hl.set_value(val);
    }

    pub fn get8(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::A => self.af.hi,
            Reg8::B => self.bc.hi,
            Reg8::C => self.bc.lo,
            Reg8::D => self.de.hi,
            Reg8::E => self.de.lo,
            Reg8::H => self.hl.hi,
            Reg8::L => self.hl.lo,
        }
    }

    pub fn set8(&mut self, reg: Reg8, val: u8) {
        match reg {
            Reg8::A => self.af.hi = val,
            Reg8::B => self.bc.hi = val,
            Reg8::C => self.bc.lo = val,
            Reg8::D => self.de.hi = val,
            Reg8::E => self.de.lo = val,
            Reg8::H => self.hl.hi = val,
            Reg8::L => self.hl.lo = val,
        }
    }

    pub fn get16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::AF => self.af(),
            Reg16::BC => self.bc(),
            Reg16::DE => self.de(),
            Reg16::HL => self.hl(),
            Reg16::SP => self.sp,
        }
    }

    pub fn set16(&mut self, reg: Reg16, val: u16) {
        match reg {
            Reg16::AF => self.set_af(val),
            Reg16::BC => self.set_bc(val),
            Reg16::DE => self.set_de(val),
            Reg16::HL => self.set_hl(val),
            Reg16::SP => self.sp = val,
        }
    }

    // Flag operations
    pub fn set_flag(&mut self, flag: Flag, val: bool) {
        if val {
            self.af.lo |= flag.mask();
        } else {
            self.af.lo &= !flag.mask();
        }
    }

    pub fn flag(&self, flag: Flag) -> bool {
        (self.af.lo & flag.mask()) != 0
    }

    /// Set all four flags at once, in Z N H C order
    pub fn set_flags(&mut self, z: bool, n: bool, h: bool, c: bool) {
        self.set_flag(Flag::Zero, z);
        self.set_flag(Flag::Subtract, n);
        self.set_flag(Flag::HalfCarry, h);
        self.set_flag(Flag::Carry, c);
    }
}

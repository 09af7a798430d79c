//! Fetch/decode/execute loop for the LR35902
//!
//! The engine owns the register file and the memory it runs against. Each
//! [`ExecutionEngine::step`] resolves the opcode at PC through an
//! [`OpcodeTable`] before touching any state, so a miss leaves registers
//! exactly as they were and moves the engine into a terminal faulted state.

use crate::error::EngineError;
use crate::execute::{execute, Effect};
use crate::instruction::{Instruction, Op};
use crate::logging::{log, LogCategory, LogConfig, LogLevel};
use crate::memory::Memory;
use crate::opcodes::OpcodeTable;
use crate::registers::RegisterFile;
use std::sync::Arc;

/// Interrupt enable register
pub const IE_ADDR: u16 = 0xFFFF;
/// Interrupt flag register
pub const IF_ADDR: u16 = 0xFF0F;
const INTERRUPT_MASK: u8 = 0x1F;

/// Cycles spent per step while halted or stopped
pub const IDLE_CYCLES: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Running,
    /// Entered by HALT or STOP; left when an enabled interrupt is pending
    LowPower,
    /// Terminal. Every further step returns this error.
    Faulted(EngineError),
}

/// How long a call to [`ExecutionEngine::run`] may go on for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunBudget {
    /// Execute exactly this many steps
    Instructions(u64),
    /// Stop at the first instruction boundary at or past this many cycles
    Cycles(u64),
}

/// What a run-slice actually executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceReport {
    pub instructions: u64,
    pub cycles: u64,
}

pub struct ExecutionEngine<M: Memory> {
    pub regs: RegisterFile,
    pub memory: M,
    ime: bool,
    state: EngineState,
    cycles: u64,
    instructions: u64,
    table: Arc<OpcodeTable>,
}

impl<M: Memory> ExecutionEngine<M> {
    /// Create an engine over the standard opcode table, entering at 0x0100
    pub fn new(memory: M) -> Result<Self, EngineError> {
        let table = OpcodeTable::standard()?;
        Ok(Self::with_table(memory, table))
    }

    /// Create an engine over a caller-supplied table
    pub fn with_table(memory: M, table: Arc<OpcodeTable>) -> Self {
        Self {
            regs: RegisterFile::default(),
            memory,
            ime: false,
            state: EngineState::Running,
            cycles: 0,
            instructions: 0,
            table,
        }
    }

    /// Put the registers in their post-boot state with PC at `entry` and clear
    /// any fault. Memory is left alone.
    pub fn reset(&mut self, entry: u16) {
        self.regs = RegisterFile::new(entry);
        self.ime = false;
        self.state = EngineState::Running;
        self.cycles = 0;
        self.instructions = 0;
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.state, EngineState::Faulted(_))
    }

    /// Interrupt master enable
    pub fn ime(&self) -> bool {
        self.ime
    }

    /// Total cycles since construction or the last reset
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    pub fn table(&self) -> &OpcodeTable {
        &self.table
    }

    fn fault(&mut self, err: EngineError) -> EngineError {
        log(LogCategory::Cpu, LogLevel::Error, || format!("{}", err));
        self.state = EngineState::Faulted(err.clone());
        err
    }

    fn pending_interrupts(&self) -> u8 {
        self.memory.read(IE_ADDR) & self.memory.read(IF_ADDR) & INTERRUPT_MASK
    }

    /// Execute one instruction (or one idle period while in low-power mode)
    /// and return the cycles it took.
    pub fn step(&mut self) -> Result<u32, EngineError> {
        if let EngineState::Faulted(err) = &self.state {
            return Err(err.clone());
        }
        if self.state == EngineState::LowPower {
            let pending = self.pending_interrupts();
            if pending == 0 {
                self.cycles += IDLE_CYCLES as u64;
                self.instructions += 1;
                return Ok(IDLE_CYCLES);
            }
            log(LogCategory::Interrupts, LogLevel::Debug, || {
                format!("wake from low power, pending={:02X}", pending)
            });
            self.state = EngineState::Running;
        }

        let pc = self.regs.pc;
        let opcode = self.memory.read(pc);
        let table = Arc::clone(&self.table);

        let base = match table.lookup(opcode) {
            Some(instr) => instr,
            None => {
                return Err(self.fault(EngineError::UnknownOpcode {
                    opcode,
                    pc,
                    prefixed: false,
                }))
            }
        };

        // Resolve the CB sub-instruction before executing the prefix so that a
        // miss still leaves PC on the prefix byte.
        let sub = if base.op == Op::PrefixCb {
            let cb_pc = pc.wrapping_add(1);
            let cb_opcode = self.memory.read(cb_pc);
            match table.lookup_cb(cb_opcode) {
                Some(instr) => Some(instr),
                None => {
                    return Err(self.fault(EngineError::UnknownOpcode {
                        opcode: cb_opcode,
                        pc: cb_pc,
                        prefixed: true,
                    }))
                }
            }
        } else {
            None
        };

        let mut cycles = self.dispatch(base) as u32;
        if let Some(instr) = sub {
            cycles += self.dispatch(instr) as u32;
        }

        self.cycles += cycles as u64;
        self.instructions += 1;
        Ok(cycles)
    }

    fn dispatch(&mut self, instr: &Instruction) -> u8 {
        if LogConfig::global().should_log(LogCategory::Cpu, LogLevel::Trace) {
            let regs = &self.regs;
            log(LogCategory::Cpu, LogLevel::Trace, || {
                format!(
                    "{:04X} {}{:02X} {:<12} AF={:04X} BC={:04X} DE={:04X} HL={:04X} SP={:04X}",
                    regs.pc,
                    if instr.prefixed { "CB " } else { "" },
                    instr.opcode,
                    instr.label,
                    regs.af(),
                    regs.bc(),
                    regs.de(),
                    regs.hl(),
                    regs.sp
                )
            });
        }

        let pc = self.regs.pc;
        match execute(instr, &mut self.regs, &mut self.memory) {
            Effect::Continue | Effect::Prefix => instr.cycles,
            Effect::BranchTaken => instr.taken_cycles.unwrap_or(instr.cycles),
            Effect::Interrupts(enabled) => {
                log(LogCategory::Interrupts, LogLevel::Debug, || {
                    format!("{} at {:04X}, IME={}", instr.label, pc, enabled)
                });
                self.ime = enabled;
                instr.cycles
            }
            Effect::Halt | Effect::Stop => {
                log(LogCategory::Interrupts, LogLevel::Debug, || {
                    format!("{} at {:04X}, entering low power", instr.label, pc)
                });
                self.state = EngineState::LowPower;
                instr.cycles
            }
        }
    }

    /// Step until the budget is exhausted. A fault ends the slice early with
    /// the error; the cycles already executed stay counted on the engine.
    pub fn run(&mut self, budget: RunBudget) -> Result<SliceReport, EngineError> {
        let mut report = SliceReport::default();
        loop {
            let done = match budget {
                RunBudget::Instructions(n) => report.instructions >= n,
                RunBudget::Cycles(n) => report.cycles >= n,
            };
            if done {
                return Ok(report);
            }
            let cycles = self.step()?;
            report.instructions += 1;
            report.cycles += cycles as u64;
        }
    }
}

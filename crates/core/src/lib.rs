//! Sharp LR35902 (Game Boy DMG) CPU core.
//!
//! The pieces are layered bottom-up: [`memory`] and [`registers`] hold state,
//! [`instruction`] and [`opcodes`] describe what each opcode does, [`execute`]
//! applies one instruction to explicit state, and [`engine`] runs the
//! fetch/decode/execute loop with cycle accounting.

pub mod engine;
pub mod error;
pub mod execute;
pub mod instruction;
pub mod logging;
pub mod memory;
pub mod opcodes;
pub mod registers;
pub mod stack;

pub use engine::{EngineState, ExecutionEngine, RunBudget, SliceReport};
pub use error::{EngineError, TableError};
pub use instruction::{Instruction, Op};
pub use memory::{AddressSpace, Memory, ADDRESS_SPACE_SIZE};
pub use opcodes::{OpcodeTable, TableBuilder};
pub use registers::{Flag, Reg16, Reg8, RegisterFile, RegisterPair};

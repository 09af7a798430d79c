//! Error types for the CPU core

use thiserror::Error;

fn table_name(prefixed: &bool) -> &'static str {
    if *prefixed {
        "CB"
    } else {
        "base"
    }
}

/// Opcode table construction failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("{} opcode {opcode:02X} declares {cycles} cycles; costs must be a positive multiple of 4", table_name(.prefixed))]
    InvalidCycles { opcode: u8, prefixed: bool, cycles: u8 },
    #[error("{} opcode {opcode:02X} declares a length of 0", table_name(.prefixed))]
    InvalidLength { opcode: u8, prefixed: bool },
    #[error("{} opcode {opcode:02X} registered twice ({existing} and {rejected})", table_name(.prefixed))]
    DuplicateOpcode {
        opcode: u8,
        prefixed: bool,
        existing: String,
        rejected: String,
    },
}

/// Fatal execution errors. The engine never retries past one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown {} opcode {opcode:02X} at {pc:04X}", table_name(.prefixed))]
    UnknownOpcode { opcode: u8, pc: u16, prefixed: bool },
    #[error("opcode table rejected: {0}")]
    Table(#[from] TableError),
}

use thiserror::Error;

use pixel::ir::instr::NumKind;

/// Runtime faults. Any trap stops the machine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Trap {
    #[error("type mismatch in `{instr}`: expected {expected}, found {found}")]
    TypeMismatch {
        instr: String,
        expected: NumKind,
        found: NumKind,
    },

    #[error("stack underflow in `{instr}`")]
    StackUnderflow { instr: String },

    #[error("unknown local {slot} in function `{function}`")]
    UnknownLocal { function: String, slot: u32 },

    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },

    #[error("branch to {label} outside of its scope")]
    UnknownLabel { label: String },

    /// NaN or out of the i32 range in a trapping truncation.
    #[error("invalid conversion to integer: {value}")]
    InvalidConversion { value: f32 },

    #[error("integer remainder by zero")]
    DivisionByZero,

    #[error("step limit of {limit} reached")]
    StepLimit { limit: u64 },

    #[error("call stack exhausted at depth {depth}")]
    CallStackOverflow { depth: usize },
}

//! Codon interpreter: executes chromosome content as a tape-machine program.

mod instruction;
mod machine;

pub use instruction::{InstructionSet, Operation, normalize_codon};
pub use machine::{Execution, HaltReason, Interpreter};

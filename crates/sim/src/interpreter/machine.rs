//! Codon tape machine.
//!
//! A genome is read as a program of fixed-width codons and executed against a
//! tape of `i64` cells. Execution is bounded by the codon budget, so every run
//! terminates; hitting the budget is a normal halt.

use crate::errors::ConfigError;
use crate::genome::Organism;
use crate::interpreter::{InstructionSet, Operation};
use crate::simulation::{InterpreterConfig, Populations};
use rayon::prelude::*;
use std::collections::HashMap;

/// Why execution stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Ran past the last codon.
    EndOfProgram,
    /// Executed the halt opcode.
    Halt,
    /// Executed `max_codon` codons.
    BudgetExhausted,
}

/// Result of one program run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub tape: Vec<i64>,
    pub output: Vec<i64>,
    /// Number of codons executed, including no-ops.
    pub executed: usize,
    pub halt: HaltReason,
}

/// A decoded program: operations plus precomputed loop partners.
struct Program {
    ops: Vec<Option<Operation>>,
    partner: Vec<Option<usize>>,
}

impl Program {
    fn new(ops: Vec<Option<Operation>>) -> Self {
        let mut partner = vec![None; ops.len()];
        let mut open = Vec::new();
        for (i, op) in ops.iter().enumerate() {
            match op {
                Some(Operation::LoopStart) => open.push(i),
                Some(Operation::LoopEnd) => {
                    if let Some(start) = open.pop() {
                        partner[start] = Some(i);
                        partner[i] = Some(start);
                    }
                }
                _ => {}
            }
        }
        Self { ops, partner }
    }
}

/// Interpreter configured for one run.
#[derive(Debug, Clone)]
pub struct Interpreter {
    instructions: InstructionSet,
    instruction_size: usize,
    base_converter: Option<HashMap<char, char>>,
    max_tape_length: usize,
    max_codon: usize,
    clean_cell: bool,
}

impl Interpreter {
    pub fn from_config(config: &InterpreterConfig) -> Result<Self, ConfigError> {
        if config.instruction_size == 0 {
            return Err(ConfigError::Invalid("instruction_size must be positive".into()));
        }
        if config.max_tape_length == 0 {
            return Err(ConfigError::Invalid("max_tape_length must be positive".into()));
        }
        Ok(Self {
            instructions: InstructionSet::new(
                config.ragaraja_version,
                &config.ragaraja_instructions,
            )?,
            instruction_size: config.instruction_size,
            base_converter: config.base_converter.clone(),
            max_tape_length: config.max_tape_length,
            max_codon: config.max_codon,
            clean_cell: config.clean_cell,
        })
    }

    pub fn instructions(&self) -> &InstructionSet {
        &self.instructions
    }

    /// Split a symbol string into codons, applying the base converter.
    /// A trailing partial codon is dropped.
    pub fn codons(&self, sequence: &str) -> Vec<String> {
        let symbols: Vec<char> = match &self.base_converter {
            Some(map) => sequence.chars().map(|c| *map.get(&c).unwrap_or(&c)).collect(),
            None => sequence.chars().collect(),
        };
        symbols
            .chunks_exact(self.instruction_size)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }

    fn decode(&self, sequence: &str) -> Program {
        let ops = self
            .codons(sequence)
            .iter()
            .map(|codon| self.instructions.get(codon))
            .collect();
        Program::new(ops)
    }

    /// Run `sequence` on `tape` (a zeroed tape when `None`). The tape is
    /// resized to `max_tape_length`.
    pub fn execute(&self, sequence: &str, tape: Option<Vec<i64>>) -> Execution {
        let program = self.decode(sequence);
        let mut tape = tape.unwrap_or_default();
        tape.resize(self.max_tape_length, 0);

        let len = tape.len();
        let mut ptr = 0usize;
        let mut register = 0i64;
        let mut output = Vec::new();
        let mut ip = 0usize;
        let mut executed = 0usize;

        let halt = loop {
            if ip >= program.ops.len() {
                break HaltReason::EndOfProgram;
            }
            if executed >= self.max_codon {
                break HaltReason::BudgetExhausted;
            }
            executed += 1;

            let next = (ptr + 1) % len;
            match program.ops[ip] {
                None | Some(Operation::Nop) => {}
                Some(Operation::Forward) => ptr = next,
                Some(Operation::Backward) => ptr = (ptr + len - 1) % len,
                Some(Operation::ForwardFive) => ptr = (ptr + 5) % len,
                Some(Operation::BackwardFive) => ptr = (ptr + len - 5 % len) % len,
                Some(Operation::Increment) => tape[ptr] = tape[ptr].wrapping_add(1),
                Some(Operation::Decrement) => tape[ptr] = tape[ptr].wrapping_sub(1),
                Some(Operation::AddFive) => tape[ptr] = tape[ptr].wrapping_add(5),
                Some(Operation::SubtractFive) => tape[ptr] = tape[ptr].wrapping_sub(5),
                Some(Operation::Double) => tape[ptr] = tape[ptr].wrapping_mul(2),
                Some(Operation::Halve) => tape[ptr] /= 2,
                Some(Operation::Zero) => tape[ptr] = 0,
                Some(Operation::Negate) => tape[ptr] = tape[ptr].wrapping_neg(),
                Some(Operation::SwapNext) => tape.swap(ptr, next),
                Some(Operation::CopyForward) => tape[next] = tape[ptr],
                Some(Operation::AddNext) => tape[ptr] = tape[ptr].wrapping_add(tape[next]),
                Some(Operation::SubtractNext) => tape[ptr] = tape[ptr].wrapping_sub(tape[next]),
                Some(Operation::Store) => register = tape[ptr],
                Some(Operation::Load) => tape[ptr] = register,
                Some(Operation::Output) => output.push(tape[ptr]),
                Some(Operation::OutputRegister) => output.push(register),
                Some(Operation::TapeStart) => ptr = 0,
                Some(Operation::TapeEnd) => ptr = len - 1,
                Some(Operation::LoopStart) => {
                    if tape[ptr] == 0 {
                        if let Some(end) = program.partner[ip] {
                            ip = end;
                        }
                    }
                }
                Some(Operation::LoopEnd) => {
                    if tape[ptr] != 0 {
                        if let Some(start) = program.partner[ip] {
                            ip = start;
                        }
                    }
                }
                Some(Operation::Halt) => break HaltReason::Halt,
            }
            ip += 1;
        };

        Execution {
            tape,
            output,
            executed,
            halt,
        }
    }

    /// Run an organism's genome and store tape and output on it.
    pub fn run_organism(&self, organism: &mut Organism) -> HaltReason {
        let tape = if self.clean_cell {
            None
        } else {
            organism.take_cytoplasm()
        };
        let execution = self.execute(&organism.sequence(), tape);
        organism.set_cytoplasm(Some(execution.tape));
        organism.status_mut().output = execution.output;
        execution.halt
    }

    /// Run every organism of every population in parallel.
    ///
    /// Organisms are independent and execution draws no randomness, so the
    /// result does not depend on scheduling.
    pub fn run_populations(&self, populations: &mut Populations) {
        for population in populations.iter_mut() {
            population.agents_mut().par_iter_mut().for_each(|organism| {
                self.run_organism(organism);
            });
        }
    }
}

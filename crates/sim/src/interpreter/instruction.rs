//! Opcodes of the codon tape machine and the instruction-set selection.

use crate::errors::ConfigError;
use log::debug;
use std::borrow::Cow;
use std::collections::HashMap;

/// A tape-machine operation addressed by a three-digit opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    // Core set
    Forward,
    Backward,
    Increment,
    Decrement,
    Output,
    LoopStart,
    LoopEnd,
    Halt,
    // Extended set
    ForwardFive,
    BackwardFive,
    AddFive,
    SubtractFive,
    Double,
    Halve,
    Zero,
    Negate,
    SwapNext,
    CopyForward,
    AddNext,
    SubtractNext,
    Store,
    Load,
    OutputRegister,
    TapeStart,
    TapeEnd,
    Nop,
}

impl Operation {
    /// Opcodes `000` to `111`.
    pub const CORE: [Operation; 8] = [
        Self::Forward,
        Self::Backward,
        Self::Increment,
        Self::Decrement,
        Self::Output,
        Self::LoopStart,
        Self::LoopEnd,
        Self::Halt,
    ];

    pub const EXTENDED: [Operation; 18] = [
        Self::ForwardFive,
        Self::BackwardFive,
        Self::AddFive,
        Self::SubtractFive,
        Self::Double,
        Self::Halve,
        Self::Zero,
        Self::Negate,
        Self::SwapNext,
        Self::CopyForward,
        Self::AddNext,
        Self::SubtractNext,
        Self::Store,
        Self::Load,
        Self::OutputRegister,
        Self::TapeStart,
        Self::TapeEnd,
        Self::Nop,
    ];

    pub fn opcode(self) -> &'static str {
        match self {
            Self::Forward => "000",
            Self::Backward => "001",
            Self::Increment => "010",
            Self::Decrement => "011",
            Self::Output => "100",
            Self::LoopStart => "101",
            Self::LoopEnd => "110",
            Self::Halt => "111",
            Self::ForwardFive => "002",
            Self::BackwardFive => "003",
            Self::AddFive => "012",
            Self::SubtractFive => "013",
            Self::Double => "020",
            Self::Halve => "021",
            Self::Zero => "030",
            Self::Negate => "031",
            Self::SwapNext => "040",
            Self::CopyForward => "041",
            Self::AddNext => "050",
            Self::SubtractNext => "051",
            Self::Store => "070",
            Self::Load => "071",
            Self::OutputRegister => "080",
            Self::TapeStart => "090",
            Self::TapeEnd => "091",
            Self::Nop => "099",
        }
    }

    /// Look up a normalised opcode.
    pub fn from_opcode(opcode: &str) -> Option<Self> {
        Self::CORE
            .iter()
            .chain(Self::EXTENDED.iter())
            .copied()
            .find(|op| op.opcode() == opcode)
    }
}

/// Normalise a codon: purely numeric codons become three-digit opcodes
/// (`"10"` and `"0010"` both give `"010"`); anything else is kept verbatim.
pub fn normalize_codon(codon: &str) -> Cow<'_, str> {
    if codon.is_empty() || !codon.bytes().all(|b| b.is_ascii_digit()) {
        return Cow::Borrowed(codon);
    }
    let trimmed = codon.trim_start_matches('0');
    if codon.len() == 3 || trimmed.len() > 3 {
        Cow::Borrowed(codon)
    } else {
        Cow::Owned(format!("{trimmed:0>3}"))
    }
}

/// Mapping from codon to operation for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionSet {
    ops: HashMap<String, Operation>,
}

impl InstructionSet {
    /// Build the instruction set for `version`.
    ///
    /// - `0`: only the `listed` opcodes
    /// - `1`: the core set plus `listed`
    /// - `2`: every defined opcode
    ///
    /// Listed opcodes without a definition are skipped.
    pub fn new(version: u8, listed: &[String]) -> Result<Self, ConfigError> {
        let base: &[Operation] = match version {
            0 => &[],
            1 => &Operation::CORE,
            2 => &[],
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unsupported ragaraja_version {other} (expected 0, 1 or 2)"
                )));
            }
        };

        let mut ops: HashMap<String, Operation> = base
            .iter()
            .map(|&op| (op.opcode().to_string(), op))
            .collect();
        if version == 2 {
            ops.extend(
                Operation::CORE
                    .iter()
                    .chain(Operation::EXTENDED.iter())
                    .map(|&op| (op.opcode().to_string(), op)),
            );
        }

        for code in listed {
            let code = normalize_codon(code);
            match Operation::from_opcode(&code) {
                Some(op) => {
                    ops.insert(code.into_owned(), op);
                }
                None => debug!("Ignoring undefined opcode '{code}'"),
            }
        }

        Ok(Self { ops })
    }

    /// Operation bound to `codon`, after normalisation.
    pub fn get(&self, codon: &str) -> Option<Operation> {
        self.ops.get(normalize_codon(codon).as_ref()).copied()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

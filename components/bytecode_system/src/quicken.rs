//! Superinstruction fusion.
//!
//! Quickening rewrites the first opcode word of a matching base sequence to
//! the fused opcode and leaves every other word in place, so program length,
//! operand positions and jump targets are unchanged. A sequence is never
//! fused if a jump lands on one of its interior instructions.

use crate::instruction::Instruction;
use crate::opcode::{Opcode, SUPERINSTRUCTIONS};
use crate::program::Program;
use std::collections::{BTreeMap, BTreeSet};

/// What a quickening pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuickenStats {
    /// Fusions performed per superinstruction
    pub fused: BTreeMap<Opcode, usize>,
}

impl QuickenStats {
    /// Total number of fusions
    pub fn total(&self) -> usize {
        self.fused.values().sum()
    }
}

/// Superinstruction fusion pass.
#[derive(Debug, Clone)]
pub struct Quickener {
    /// Candidate superinstructions, tried in order
    patterns: Vec<Opcode>,
}

impl Quickener {
    /// Quickener using every known superinstruction, longest first
    pub fn new() -> Self {
        Self {
            patterns: SUPERINSTRUCTIONS.to_vec(),
        }
    }

    /// Restrict fusion to `patterns`, tried in the given order
    pub fn with_patterns(patterns: &[Opcode]) -> Self {
        Self {
            patterns: patterns.iter().copied().filter(|op| op.is_super()).collect(),
        }
    }

    /// Return a fused copy of `program`.
    ///
    /// The copy gets a fresh program id. Undecodable tails are left as-is.
    pub fn quicken(&self, program: &Program) -> (Program, QuickenStats) {
        let mut code = program.code().to_vec();
        let targets = jump_targets(&code);
        let mut stats = QuickenStats::default();

        let mut bci = 0;
        while bci < code.len() {
            let Ok(inst) = Instruction::decode(&code, bci) else {
                log::warn!("quickening stopped at undecodable bci {}", bci);
                break;
            };
            match self.patterns.iter().find(|si| matches_at(&code, bci, si.components(), &targets)) {
                Some(&si) => {
                    code[bci] = si.word();
                    *stats.fused.entry(si).or_default() += 1;
                    bci += si.width();
                }
                None => bci = inst.next_bci(),
            }
        }

        log::debug!(
            "quickened program {}: {} fusions {:?}",
            program.id(),
            stats.total(),
            stats.fused
        );
        (program.with_code(code), stats)
    }
}

impl Default for Quickener {
    fn default() -> Self {
        Self::new()
    }
}

/// Undo fusion, restoring each superinstruction's first base opcode.
pub fn dequicken(program: &Program) -> Program {
    let mut code = program.code().to_vec();
    let fused: Vec<Instruction> = program
        .instructions()
        .filter_map(Result::ok)
        .filter(|inst| inst.opcode.is_super())
        .collect();
    for inst in fused {
        code[inst.bci] = inst.opcode.components()[0].word();
    }
    program.with_code(code)
}

fn jump_targets(code: &[u16]) -> BTreeSet<usize> {
    crate::instruction::Instructions::new(code)
        .map_while(Result::ok)
        .filter_map(|inst| inst.jump_target(code))
        .collect()
}

fn matches_at(code: &[u16], bci: usize, parts: &[Opcode], targets: &BTreeSet<usize>) -> bool {
    let mut at = bci;
    for (i, expected) in parts.iter().enumerate() {
        if i > 0 && targets.contains(&at) {
            return false;
        }
        match Instruction::decode(code, at) {
            Ok(inst) if inst.opcode == *expected => at = inst.next_bci(),
            _ => return false,
        }
    }
    true
}

//! Human-readable program listings.

use crate::instruction::{decode_const, Instruction};
use crate::opcode::Opcode;
use crate::program::Program;
use std::collections::BTreeSet;
use std::fmt::Write;

/// Render `program` as a listing, one instruction per line.
///
/// Jump targets are marked with `►`; superinstructions are shown with their
/// components indented below them.
pub fn disassemble(program: &Program) -> String {
    let code = program.code();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "; program {} | {} words | {} locals | max stack {} | {} constants",
        program.id(),
        code.len(),
        program.locals(),
        program.max_stack(),
        program.constants().len()
    );

    let mut decoded = Vec::new();
    for inst in program.instructions() {
        match inst {
            Ok(inst) => decoded.push(inst),
            Err(e) => {
                let _ = writeln!(out, "; {}", e);
                break;
            }
        }
    }
    let targets: BTreeSet<usize> = decoded
        .iter()
        .filter_map(|inst| inst.jump_target(code))
        .collect();

    for inst in &decoded {
        let marker = if targets.contains(&inst.bci) { "►" } else { " " };
        if inst.opcode.is_super() {
            let _ = writeln!(out, "{:04} {} {}", inst.bci, marker, inst.opcode);
            for (at, op) in inst.parts() {
                let _ = writeln!(out, "         {:04} {}", at, render(program, at, op));
            }
        } else {
            let _ = writeln!(
                out,
                "{:04} {} {}",
                inst.bci,
                marker,
                render(program, inst.bci, inst.opcode)
            );
        }
    }
    out
}

fn render(program: &Program, at: usize, op: Opcode) -> String {
    let code = program.code();
    match op {
        Opcode::Const => format!("{} {}", op, decode_const(code[at + 1], code[at + 2])),
        Opcode::LdLoc | Opcode::StLoc | Opcode::Jump | Opcode::JumpFalse => {
            format!("{} {}", op, code[at + 1])
        }
        Opcode::LdConst => {
            let index = code[at + 1] as usize;
            match program.constants().get(index) {
                Some(Some(value)) => format!("{} {} ; {}", op, index, value),
                Some(None) => format!("{} {} ; <reserved>", op, index),
                None => format!("{} {} ; <out of range>", op, index),
            }
        }
        _ => op.to_string(),
    }
}

/// One-line summary of the instruction at `bci`, for log messages
pub fn describe_at(program: &Program, bci: usize) -> String {
    match Instruction::decode(program.code(), bci) {
        Ok(inst) => render(program, bci, inst.opcode),
        Err(e) => e.to_string(),
    }
}

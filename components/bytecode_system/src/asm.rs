//! Text assembler.
//!
//! ```text
//! # gcd(a, b)
//! .locals 3
//!         const 1071
//!         st_loc 0
//! loop:   ld_loc 1
//!         ...
//!         jump loop
//! ```
//!
//! One instruction per line; `name:` binds a label, `#` starts a comment.
//! `.locals N` declares local slots and must precede the first instruction.
//! `ld_const` takes an integer, `true`/`false`, or a double-quoted string;
//! equal strings share one pooled object.

use crate::builder::{Label, ProgramBuilder};
use crate::opcode::Opcode;
use crate::program::Program;
use crate::verifier::VerifyError;
use core_types::{ObjectRef, PoolFrozenError, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Assembly failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    /// Malformed source line
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },
    /// The assembled program failed verification
    #[error("verification failed: {0}")]
    Verify(#[from] VerifyError),
    /// Constant pool closed while assembling
    #[error(transparent)]
    PoolFrozen(#[from] PoolFrozenError),
}

fn syntax(line: usize, message: impl Into<String>) -> AsmError {
    AsmError::Syntax {
        line,
        message: message.into(),
    }
}

/// Assemble `source` into a verified program.
pub fn assemble(source: &str) -> Result<Program, AsmError> {
    Assembler::default().run(source)
}

#[derive(Default)]
struct Assembler {
    builder: Option<ProgramBuilder>,
    locals: u16,
    labels: HashMap<String, (Label, bool)>,
    strings: HashMap<String, ObjectRef>,
}

impl Assembler {
    fn run(mut self, source: &str) -> Result<Program, AsmError> {
        for (idx, raw) in source.lines().enumerate() {
            let line = idx + 1;
            let mut text = strip_comment(raw).trim();

            while let Some(colon) = label_end(text) {
                let name = text[..colon].trim();
                self.define(line, name)?;
                text = text[colon + 1..].trim();
            }
            if text.is_empty() {
                continue;
            }

            let (head, rest) = match text.split_once(char::is_whitespace) {
                Some((h, r)) => (h, r.trim()),
                None => (text, ""),
            };

            if head == ".locals" {
                if self.builder.is_some() {
                    return Err(syntax(line, ".locals must precede all instructions"));
                }
                self.locals = rest
                    .parse()
                    .map_err(|_| syntax(line, format!("bad locals count '{}'", rest)))?;
                continue;
            }

            let op = Opcode::from_mnemonic(head)
                .ok_or_else(|| syntax(line, format!("unknown instruction '{}'", head)))?;
            self.instruction(line, op, rest)?;
        }

        for (name, (_, defined)) in &self.labels {
            if !defined {
                return Err(syntax(0, format!("undefined label '{}'", name)));
            }
        }
        let builder = self
            .builder
            .ok_or_else(|| syntax(0, "no instructions"))?;
        Ok(builder.build()?)
    }

    fn builder(&mut self) -> &mut ProgramBuilder {
        let locals = self.locals;
        self.builder.get_or_insert_with(|| ProgramBuilder::new(locals))
    }

    fn label(&mut self, name: &str) -> Label {
        if let Some((label, _)) = self.labels.get(name) {
            return *label;
        }
        let label = self.builder().new_label();
        self.labels.insert(name.to_string(), (label, false));
        label
    }

    fn define(&mut self, line: usize, name: &str) -> Result<(), AsmError> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(syntax(line, format!("bad label '{}'", name)));
        }
        let label = self.label(name);
        let entry = self.labels.get_mut(name).map(|e| &mut e.1);
        if let Some(defined) = entry {
            if *defined {
                return Err(syntax(line, format!("label '{}' defined twice", name)));
            }
            *defined = true;
        }
        self.builder().bind(label);
        Ok(())
    }

    fn instruction(&mut self, line: usize, op: Opcode, operand: &str) -> Result<(), AsmError> {
        let needs_operand = op.width() > 1;
        if needs_operand == operand.is_empty() {
            return Err(syntax(
                line,
                if needs_operand {
                    format!("'{}' needs an operand", op)
                } else {
                    format!("'{}' takes no operand", op)
                },
            ));
        }
        match op {
            Opcode::Const => {
                let value = parse_int(line, operand)?;
                self.builder().emit_const(value);
            }
            Opcode::LdLoc | Opcode::StLoc => {
                let slot = operand
                    .parse::<u16>()
                    .map_err(|_| syntax(line, format!("bad slot '{}'", operand)))?;
                if op == Opcode::LdLoc {
                    self.builder().emit_ld_loc(slot);
                } else {
                    self.builder().emit_st_loc(slot);
                }
            }
            Opcode::Jump | Opcode::JumpFalse => {
                let label = self.label(operand);
                if op == Opcode::Jump {
                    self.builder().emit_jump(label);
                } else {
                    self.builder().emit_jump_false(label);
                }
            }
            Opcode::LdConst => {
                let value = self.literal(line, operand)?;
                self.builder().emit_ld_const(value)?;
            }
            Opcode::Add => self.builder().emit_add(),
            Opcode::Mod => self.builder().emit_mod(),
            Opcode::Less => self.builder().emit_less(),
            Opcode::Return => self.builder().emit_return(),
            _ => return Err(syntax(line, format!("'{}' cannot be assembled", op))),
        }
        Ok(())
    }

    fn literal(&mut self, line: usize, text: &str) -> Result<Value, AsmError> {
        match text {
            "true" => return Ok(Value::Boolean(true)),
            "false" => return Ok(Value::Boolean(false)),
            _ => {}
        }
        if let Some(body) = text.strip_prefix('"') {
            let body = body
                .strip_suffix('"')
                .ok_or_else(|| syntax(line, "unterminated string"))?;
            let obj = self
                .strings
                .entry(body.to_string())
                .or_insert_with(|| ObjectRef::new(body.to_string()))
                .clone();
            return Ok(Value::Reference(obj));
        }
        parse_int(line, text).map(Value::Int)
    }
}

fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn label_end(text: &str) -> Option<usize> {
    let colon = text.find(':')?;
    let quote = text.find('"').unwrap_or(usize::MAX);
    (colon < quote).then_some(colon)
}

fn parse_int(line: usize, text: &str) -> Result<i32, AsmError> {
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => text.parse::<i64>().ok(),
    };
    parsed
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| syntax(line, format!("bad integer '{}'", text)))
}

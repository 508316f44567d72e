//! Program construction.
//!
//! [`ProgramBuilder`] emits instruction words, interns pooled constants and
//! patches forward jumps through [`Label`]s.

use crate::instruction::encode_const;
use crate::opcode::Opcode;
use crate::pool::ConstantPool;
use crate::program::Program;
use crate::verifier::VerifyError;
use core_types::{PoolFrozenError, Value};
use std::sync::Arc;

/// A jump destination, possibly not yet bound to an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Incremental program builder.
///
/// # Example
///
/// ```
/// use bytecode_system::ProgramBuilder;
///
/// let mut b = ProgramBuilder::new(0);
/// b.emit_const(5);
/// b.emit_const(3);
/// b.emit_add();
/// b.emit_return();
/// let program = b.build().unwrap();
/// assert_eq!(program.max_stack(), 2);
/// ```
#[derive(Debug)]
pub struct ProgramBuilder {
    code: Vec<u16>,
    locals: u16,
    pool: Arc<ConstantPool<Value>>,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, Label)>,
    /// First operand that could not be encoded, reported by `build`
    unencodable: Option<VerifyError>,
}

impl ProgramBuilder {
    /// Builder with `locals` local slots and a private constant pool
    pub fn new(locals: u16) -> Self {
        Self::with_pool(locals, Arc::new(ConstantPool::new()))
    }

    /// Builder interning into a pool shared with other builders
    pub fn with_pool(locals: u16, pool: Arc<ConstantPool<Value>>) -> Self {
        Self {
            code: Vec::new(),
            locals,
            pool,
            labels: Vec::new(),
            fixups: Vec::new(),
            unencodable: None,
        }
    }

    /// Offset the next emitted word will occupy
    pub fn here(&self) -> usize {
        self.code.len()
    }

    /// Create an unbound label
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current offset
    pub fn bind(&mut self, label: Label) {
        self.labels[label.0] = Some(self.here());
    }

    /// Create a label bound to the current offset
    pub fn bound_label(&mut self) -> Label {
        let label = self.new_label();
        self.bind(label);
        label
    }

    /// Emit a raw word
    pub fn emit_raw(&mut self, word: u16) {
        self.code.push(word);
    }

    /// `CONST value`
    pub fn emit_const(&mut self, value: i32) {
        let [hi, lo] = encode_const(value);
        self.code.extend([Opcode::Const.word(), hi, lo]);
    }

    /// `ADD`
    pub fn emit_add(&mut self) {
        self.emit_raw(Opcode::Add.word());
    }

    /// `MOD`
    pub fn emit_mod(&mut self) {
        self.emit_raw(Opcode::Mod.word());
    }

    /// `LESS`
    pub fn emit_less(&mut self) {
        self.emit_raw(Opcode::Less.word());
    }

    /// `RETURN`
    pub fn emit_return(&mut self) {
        self.emit_raw(Opcode::Return.word());
    }

    /// `LD_LOC slot`
    pub fn emit_ld_loc(&mut self, slot: u16) {
        self.code.extend([Opcode::LdLoc.word(), slot]);
    }

    /// `ST_LOC slot`
    pub fn emit_st_loc(&mut self, slot: u16) {
        self.code.extend([Opcode::StLoc.word(), slot]);
    }

    /// Intern `value` and emit `LD_CONST index`.
    ///
    /// An index past `u16::MAX` (possible with a large shared pool) cannot be
    /// encoded; `build` then fails with
    /// [`VerifyError::ConstantIndexTooLarge`].
    pub fn emit_ld_const(&mut self, value: Value) -> Result<usize, PoolFrozenError> {
        let index = self.pool.add(value)?;
        let operand = match u16::try_from(index) {
            Ok(operand) => operand,
            Err(_) => {
                self.unencodable
                    .get_or_insert(VerifyError::ConstantIndexTooLarge { index });
                0
            }
        };
        self.code.extend([Opcode::LdConst.word(), operand]);
        Ok(index)
    }

    /// `JUMP label`
    pub fn emit_jump(&mut self, label: Label) {
        self.emit_branch(Opcode::Jump, label);
    }

    /// `JUMP_FALSE label`
    pub fn emit_jump_false(&mut self, label: Label) {
        self.emit_branch(Opcode::JumpFalse, label);
    }

    fn emit_branch(&mut self, op: Opcode, label: Label) {
        self.code.push(op.word());
        self.fixups.push((self.code.len(), label));
        self.code.push(0);
    }

    /// Resolve labels, freeze the pool and verify.
    pub fn build(mut self) -> Result<Program, VerifyError> {
        if self.code.len() > u16::MAX as usize {
            return Err(VerifyError::TooLong(self.code.len()));
        }
        if let Some(err) = self.unencodable.take() {
            return Err(err);
        }
        for (at, label) in std::mem::take(&mut self.fixups) {
            let target = self.labels[label.0].ok_or(VerifyError::UnboundLabel(label.0))?;
            self.code[at] =
                u16::try_from(target).map_err(|_| VerifyError::TooLong(self.code.len()))?;
        }
        Program::verified(self.code, self.locals, self.pool.values())
    }
}

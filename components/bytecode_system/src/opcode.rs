//! Opcode table for the loop VM.
//!
//! Every opcode has a fixed, statically known width in 16-bit words. The
//! width of a superinstruction is the sum of its components' widths; its
//! operand words stay exactly where the unfused sequence put them.

use std::fmt;

/// Bytecode opcodes.
///
/// The discriminant is the opcode word as it appears in the instruction
/// stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum Opcode {
    // Base instruction set
    /// `JUMP target` ( -- )
    Jump = 1,
    /// `CONST hi lo` ( -- i)
    Const = 2,
    /// `ADD` (i1 i2 -- i3)
    Add = 3,
    /// `JUMP_FALSE target` (b -- )
    JumpFalse = 4,
    /// `LESS` (i1 i2 -- b)
    Less = 5,
    /// `RETURN` (v -- )
    Return = 6,
    /// `ST_LOC slot` (v -- )
    StLoc = 7,
    /// `LD_LOC slot` ( -- v)
    LdLoc = 8,
    /// `MOD` (i1 i2 -- i3)
    Mod = 9,
    /// `LD_CONST index` ( -- v), reads the constant pool
    LdConst = 10,

    // Superinstructions
    /// `LD_LOC; CONST; MOD; ST_LOC`
    SiLdConstModSt = 16,
    /// `LD_LOC; LD_LOC; MOD; ST_LOC`
    SiLdLdModSt = 17,
    /// `LD_LOC; ST_LOC`
    SiLdSt = 18,
    /// `LD_LOC; ST_LOC; JUMP`
    SiLdStJump = 19,
    /// `CONST; LD_LOC; LESS; JUMP_FALSE`
    SiConstLdLessJf = 20,
    /// `LD_LOC; CONST; LESS; JUMP_FALSE`
    SiLdConstLessJf = 21,
}

/// All superinstructions, longest pattern first.
pub const SUPERINSTRUCTIONS: &[Opcode] = &[
    Opcode::SiLdConstModSt,
    Opcode::SiLdLdModSt,
    Opcode::SiConstLdLessJf,
    Opcode::SiLdConstLessJf,
    Opcode::SiLdStJump,
    Opcode::SiLdSt,
];

impl Opcode {
    /// Decode an opcode word
    pub const fn decode(word: u16) -> Option<Opcode> {
        Some(match word {
            1 => Opcode::Jump,
            2 => Opcode::Const,
            3 => Opcode::Add,
            4 => Opcode::JumpFalse,
            5 => Opcode::Less,
            6 => Opcode::Return,
            7 => Opcode::StLoc,
            8 => Opcode::LdLoc,
            9 => Opcode::Mod,
            10 => Opcode::LdConst,
            16 => Opcode::SiLdConstModSt,
            17 => Opcode::SiLdLdModSt,
            18 => Opcode::SiLdSt,
            19 => Opcode::SiLdStJump,
            20 => Opcode::SiConstLdLessJf,
            21 => Opcode::SiLdConstLessJf,
            _ => return None,
        })
    }

    /// The opcode word
    pub const fn word(self) -> u16 {
        self as u16
    }

    /// Base opcodes making up this instruction. A base opcode is its own
    /// single component.
    pub const fn components(self) -> &'static [Opcode] {
        use Opcode::*;
        match self {
            Jump => &[Jump],
            Const => &[Const],
            Add => &[Add],
            JumpFalse => &[JumpFalse],
            Less => &[Less],
            Return => &[Return],
            StLoc => &[StLoc],
            LdLoc => &[LdLoc],
            Mod => &[Mod],
            LdConst => &[LdConst],
            SiLdConstModSt => &[LdLoc, Const, Mod, StLoc],
            SiLdLdModSt => &[LdLoc, LdLoc, Mod, StLoc],
            SiLdSt => &[LdLoc, StLoc],
            SiLdStJump => &[LdLoc, StLoc, Jump],
            SiConstLdLessJf => &[Const, LdLoc, Less, JumpFalse],
            SiLdConstLessJf => &[LdLoc, Const, Less, JumpFalse],
        }
    }

    /// Whether this is a fused superinstruction
    pub const fn is_super(self) -> bool {
        self.components().len() > 1
    }

    /// Width in words, including inline operands
    pub const fn width(self) -> usize {
        match self {
            Opcode::Add | Opcode::Less | Opcode::Mod | Opcode::Return => 1,
            Opcode::Jump | Opcode::JumpFalse | Opcode::StLoc | Opcode::LdLoc | Opcode::LdConst => 2,
            Opcode::Const => 3,
            _ => {
                let parts = self.components();
                let mut total = 0;
                let mut i = 0;
                while i < parts.len() {
                    total += parts[i].width();
                    i += 1;
                }
                total
            }
        }
    }

    /// `(pops, pushes)` on the operand stack, base opcodes only
    pub const fn stack_effect(self) -> (usize, usize) {
        match self {
            Opcode::Jump => (0, 0),
            Opcode::Const | Opcode::LdLoc | Opcode::LdConst => (0, 1),
            Opcode::Add | Opcode::Mod | Opcode::Less => (2, 1),
            Opcode::JumpFalse | Opcode::StLoc | Opcode::Return => (1, 0),
            _ => (0, 0),
        }
    }

    /// Whether the instruction (or its last component) transfers control
    pub fn is_jump(self) -> bool {
        matches!(
            self.components().last(),
            Some(Opcode::Jump | Opcode::JumpFalse)
        )
    }

    /// Whether control never falls through to the next instruction
    pub fn is_unconditional_terminator(self) -> bool {
        matches!(
            self.components().last(),
            Some(Opcode::Jump | Opcode::Return)
        )
    }

    /// Assembly mnemonic
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Jump => "jump",
            Opcode::Const => "const",
            Opcode::Add => "add",
            Opcode::JumpFalse => "jump_false",
            Opcode::Less => "less",
            Opcode::Return => "return",
            Opcode::StLoc => "st_loc",
            Opcode::LdLoc => "ld_loc",
            Opcode::Mod => "mod",
            Opcode::LdConst => "ld_const",
            Opcode::SiLdConstModSt => "si.ld_const_mod_st",
            Opcode::SiLdLdModSt => "si.ld_ld_mod_st",
            Opcode::SiLdSt => "si.ld_st",
            Opcode::SiLdStJump => "si.ld_st_jump",
            Opcode::SiConstLdLessJf => "si.const_ld_less_jf",
            Opcode::SiLdConstLessJf => "si.ld_const_less_jf",
        }
    }

    /// Look up a base opcode by mnemonic
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        use Opcode::*;
        [Jump, Const, Add, JumpFalse, Less, Return, StLoc, LdLoc, Mod, LdConst]
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

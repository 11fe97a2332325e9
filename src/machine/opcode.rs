//! The 16 opcodes of the machine and their semantics

use super::{Registers, REGISTER_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an instruction reads one of its `a`/`b` operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// Operand is a register index
    Register,
    /// Operand is a literal value
    Immediate,
    /// Operand is not read
    Ignored,
}

/// Machine opcode
///
/// Every opcode writes its result into register `c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    /// rC = rA + rB
    Addr,
    /// rC = rA + B
    Addi,
    /// rC = rA * rB
    Mulr,
    /// rC = rA * B
    Muli,
    /// rC = rA & rB
    Banr,
    /// rC = rA & B
    Bani,
    /// rC = rA | rB
    Borr,
    /// rC = rA | B
    Bori,
    /// rC = rA
    Setr,
    /// rC = A
    Seti,
    /// rC = A > rB
    Gtir,
    /// rC = rA > B
    Gtri,
    /// rC = rA > rB
    Gtrr,
    /// rC = A == rB
    Eqir,
    /// rC = rA == B
    Eqri,
    /// rC = rA == rB
    Eqrr,
}

impl Opcode {
    /// All opcodes in canonical order
    pub const ALL: [Opcode; 16] = [
        Opcode::Addr,
        Opcode::Addi,
        Opcode::Mulr,
        Opcode::Muli,
        Opcode::Banr,
        Opcode::Bani,
        Opcode::Borr,
        Opcode::Bori,
        Opcode::Setr,
        Opcode::Seti,
        Opcode::Gtir,
        Opcode::Gtri,
        Opcode::Gtrr,
        Opcode::Eqir,
        Opcode::Eqri,
        Opcode::Eqrr,
    ];

    /// Four-letter mnemonic used in program text
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Addr => "addr",
            Opcode::Addi => "addi",
            Opcode::Mulr => "mulr",
            Opcode::Muli => "muli",
            Opcode::Banr => "banr",
            Opcode::Bani => "bani",
            Opcode::Borr => "borr",
            Opcode::Bori => "bori",
            Opcode::Setr => "setr",
            Opcode::Seti => "seti",
            Opcode::Gtir => "gtir",
            Opcode::Gtri => "gtri",
            Opcode::Gtrr => "gtrr",
            Opcode::Eqir => "eqir",
            Opcode::Eqri => "eqri",
            Opcode::Eqrr => "eqrr",
        }
    }

    /// Look up an opcode by mnemonic
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == mnemonic)
    }

    /// Operand kinds of `a` and `b`
    pub fn operand_kinds(self) -> (OperandKind, OperandKind) {
        use OperandKind::*;
        match self {
            Opcode::Addr | Opcode::Mulr | Opcode::Banr | Opcode::Borr => (Register, Register),
            Opcode::Addi | Opcode::Muli | Opcode::Bani | Opcode::Bori => (Register, Immediate),
            Opcode::Setr => (Register, Ignored),
            Opcode::Seti => (Immediate, Ignored),
            Opcode::Gtir | Opcode::Eqir => (Immediate, Register),
            Opcode::Gtri | Opcode::Eqri => (Register, Immediate),
            Opcode::Gtrr | Opcode::Eqrr => (Register, Register),
        }
    }

    /// Apply this opcode to the register file.
    ///
    /// Register operands must already be validated against the register
    /// file; [`Program`](super::Program) guarantees that at load time.
    pub fn execute(self, regs: &mut Registers, a: i64, b: i64, c: i64) {
        debug_assert!((c as usize) < REGISTER_COUNT);
        let r = |i: i64| regs[i as usize];

        let value = match self {
            Opcode::Addr => r(a).wrapping_add(r(b)),
            Opcode::Addi => r(a).wrapping_add(b),
            Opcode::Mulr => r(a).wrapping_mul(r(b)),
            Opcode::Muli => r(a).wrapping_mul(b),
            Opcode::Banr => r(a) & r(b),
            Opcode::Bani => r(a) & b,
            Opcode::Borr => r(a) | r(b),
            Opcode::Bori => r(a) | b,
            Opcode::Setr => r(a),
            Opcode::Seti => a,
            Opcode::Gtir => (a > r(b)) as i64,
            Opcode::Gtri => (r(a) > b) as i64,
            Opcode::Gtrr => (r(a) > r(b)) as i64,
            Opcode::Eqir => (a == r(b)) as i64,
            Opcode::Eqri => (r(a) == b) as i64,
            Opcode::Eqrr => (r(a) == r(b)) as i64,
        };

        regs[c as usize] = value;
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

//! Instruction → IR translation
//!
//! Each instruction becomes exactly one IR node. Writes to the instruction
//! pointer are recognized only in the forms that have a static meaning:
//!
//! | Instruction         | IR                          |
//! |---------------------|-----------------------------|
//! | `addi ip n ip`      | `goto line + 1 + n`         |
//! | `seti n _ ip`       | `goto n + 1`                |
//! | `addr ip r ip`      | `ip = ip + r` (skip)        |
//! | `mulr _ _ ip`       | `end` (heuristic)           |
//!
//! Every other write to the pointer is rejected.

use super::ir::{BinOp, BinaryExpr, Expr, IrNode};
use crate::machine::{Instruction, Opcode, OperandKind, Program, Reg};
use crate::{Error, Result};

/// Translates machine instructions into flat IR
#[derive(Debug, Clone, Copy)]
pub struct Translator {
    ip: Reg,
}

impl Translator {
    /// Creates a translator for programs whose pointer lives in `ip`
    pub fn new(ip: Reg) -> Self {
        Self { ip }
    }

    /// Translate a whole program, one node per instruction
    pub fn translate_program(program: &Program) -> Result<Vec<IrNode>> {
        let translator = Self::new(program.ip());
        program
            .instructions()
            .iter()
            .enumerate()
            .map(|(line, instr)| translator.translate(instr, line))
            .collect()
    }

    /// Translate the instruction found at `line`
    pub fn translate(&self, instr: &Instruction, line: usize) -> Result<IrNode> {
        let dest = Self::register(instr.c, line)?;
        if dest == self.ip {
            return self.translate_pointer_write(instr, line);
        }

        let (kind_a, kind_b) = instr.opcode.operand_kinds();
        let a = self.operand(kind_a, instr.a, line)?;
        let b = self.operand(kind_b, instr.b, line)?;

        let node = match instr.opcode {
            Opcode::Addr | Opcode::Addi => Self::assign(dest, BinOp::Add, a, b),
            Opcode::Mulr | Opcode::Muli => Self::assign(dest, BinOp::Mul, a, b),
            Opcode::Banr | Opcode::Bani => Self::assign(dest, BinOp::BitAnd, a, b),
            Opcode::Borr | Opcode::Bori => Self::assign(dest, BinOp::BitOr, a, b),
            Opcode::Setr | Opcode::Seti => IrNode::Assignment { dest, value: a },
            Opcode::Gtir | Opcode::Gtri | Opcode::Gtrr => IrNode::Comparison {
                cond: BinaryExpr::new(BinOp::Gt, a, b),
                dest,
            },
            Opcode::Eqir | Opcode::Eqri | Opcode::Eqrr => IrNode::Comparison {
                cond: BinaryExpr::new(BinOp::Eq, a, b),
                dest,
            },
        };
        Ok(node)
    }

    fn translate_pointer_write(&self, instr: &Instruction, line: usize) -> Result<IrNode> {
        let ip = self.ip.index() as i64;
        let unsupported = || Error::UnsupportedTranslation {
            line,
            opcode: instr.opcode,
        };

        match instr.opcode {
            Opcode::Addi if instr.a == ip => Ok(IrNode::UnconditionalJump {
                target: (line as i64)
                    .checked_add(1)
                    .and_then(|next| next.checked_add(instr.b))
                    .and_then(Self::target)
                    .ok_or_else(unsupported)?,
            }),
            Opcode::Seti => Ok(IrNode::UnconditionalJump {
                target: instr
                    .a
                    .checked_add(1)
                    .and_then(Self::target)
                    .ok_or_else(unsupported)?,
            }),
            // One side must be the pointer itself, the other a real register.
            Opcode::Addr if (instr.a == ip) != (instr.b == ip) => Ok(IrNode::Assignment {
                dest: self.ip,
                value: Expr::binary(
                    BinOp::Add,
                    Expr::Register(Self::register(instr.a, line)?),
                    Expr::Register(Self::register(instr.b, line)?),
                ),
            }),
            Opcode::Mulr => {
                tracing::warn!(line, "treating `{}` as program end", instr);
                Ok(IrNode::End)
            }
            _ => Err(unsupported()),
        }
    }

    /// Operand as an expression. Reading the pointer register yields the
    /// current line, which is statically known.
    fn operand(&self, kind: OperandKind, value: i64, line: usize) -> Result<Expr> {
        Ok(match kind {
            OperandKind::Register => match Self::register(value, line)? {
                reg if reg == self.ip => Expr::Literal(line as i64),
                reg => Expr::Register(reg),
            },
            OperandKind::Immediate | OperandKind::Ignored => Expr::Literal(value),
        })
    }

    fn register(value: i64, line: usize) -> Result<Reg> {
        Reg::from_operand(value).ok_or(Error::InvalidRegister {
            line,
            register: value,
        })
    }

    fn assign(dest: Reg, op: BinOp, a: Expr, b: Expr) -> IrNode {
        IrNode::Assignment {
            dest,
            value: Expr::binary(op, a, b),
        }
    }

    fn target(line: i64) -> Option<usize> {
        usize::try_from(line).ok()
    }
}

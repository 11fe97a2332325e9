//! Instructions, programs and register identifiers

use super::opcode::{OperandKind, Opcode};
use super::REGISTER_COUNT;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Index of one of the six machine registers.
///
/// A `Reg` always names a register of the register file, so indexing a
/// [`Registers`](super::Registers) array with it cannot go out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Reg(u8);

impl Reg {
    /// Register 0
    pub const R0: Reg = Reg(0);
    /// Register 1
    pub const R1: Reg = Reg(1);
    /// Register 2
    pub const R2: Reg = Reg(2);
    /// Register 3
    pub const R3: Reg = Reg(3);
    /// Register 4
    pub const R4: Reg = Reg(4);
    /// Register 5
    pub const R5: Reg = Reg(5);

    /// Creates a register reference, rejecting indices outside the register file
    pub fn new(index: usize) -> Option<Self> {
        (index < REGISTER_COUNT).then(|| Reg(index as u8))
    }

    /// Register named by an instruction operand
    pub fn from_operand(value: i64) -> Option<Self> {
        usize::try_from(value).ok().and_then(Self::new)
    }

    /// Register index as usize (for indexing a [`Registers`](super::Registers) array)
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for Reg {
    type Error = Error;

    fn try_from(index: u8) -> Result<Self> {
        Reg::new(index as usize).ok_or(Error::InvalidRegister {
            line: 0,
            register: index as i64,
        })
    }
}

impl From<Reg> for u8 {
    fn from(reg: Reg) -> u8 {
        reg.0
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A single machine instruction: opcode plus operands `a b c`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Operation to perform
    pub opcode: Opcode,
    /// First operand (register or literal, depending on the opcode)
    pub a: i64,
    /// Second operand (register or literal, depending on the opcode)
    pub b: i64,
    /// Destination register
    pub c: i64,
}

impl Instruction {
    /// Creates an instruction without validating its operands
    pub fn new(opcode: Opcode, a: i64, b: i64, c: i64) -> Self {
        Self { opcode, a, b, c }
    }

    /// Destination register, if `c` names one
    pub fn dest(&self) -> Option<Reg> {
        Reg::from_operand(self.c)
    }

    /// Check that every register operand names a real register.
    /// `line` is only used for error reporting.
    pub fn validate(&self, line: usize) -> Result<()> {
        let (kind_a, kind_b) = self.opcode.operand_kinds();
        let registers = [(kind_a, self.a), (kind_b, self.b), (OperandKind::Register, self.c)];

        for (kind, value) in registers {
            if kind == OperandKind::Register && !(0..REGISTER_COUNT as i64).contains(&value) {
                return Err(Error::InvalidRegister {
                    line,
                    register: value,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.opcode, self.a, self.b, self.c)
    }
}

/// A loaded program: instructions plus the register bound to the instruction pointer.
///
/// Programs are immutable once constructed; every register operand has been
/// validated, so execution never indexes outside the register file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProgramData")]
pub struct Program {
    ip: Reg,
    instructions: Vec<Instruction>,
}

/// Unvalidated serialized form of a [`Program`]
#[derive(Deserialize)]
struct ProgramData {
    ip: Reg,
    instructions: Vec<Instruction>,
}

impl TryFrom<ProgramData> for Program {
    type Error = Error;

    fn try_from(data: ProgramData) -> Result<Self> {
        Program::new(data.ip, data.instructions)
    }
}

impl Program {
    /// Build a program, validating every instruction's register operands
    pub fn new(ip: Reg, instructions: Vec<Instruction>) -> Result<Self> {
        for (line, instr) in instructions.iter().enumerate() {
            instr.validate(line)?;
        }
        Ok(Self { ip, instructions })
    }

    /// Parse program text (`#ip N` header followed by instruction lines)
    pub fn parse(source: &str) -> Result<Self> {
        super::parser::ProgramParser::new(source).parse()
    }

    /// Register bound to the instruction pointer
    pub fn ip(&self) -> Reg {
        self.ip
    }

    /// Instructions in program order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True if the program has no instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl FromStr for Program {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Program::parse(s)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#ip {}", self.ip.0)?;
        for instr in &self.instructions {
            writeln!(f, "{}", instr)?;
        }
        Ok(())
    }
}

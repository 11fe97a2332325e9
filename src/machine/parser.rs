//! Program text parser
//!
//! ```text
//! #ip 4
//! addi 4 16 4
//! seti 1 8 1
//! ```

use super::opcode::Opcode;
use super::program::{Instruction, Program, Reg};
use crate::{Error, Result};
use regex::Regex;

lazy_static::lazy_static! {
    static ref HEADER: Regex = Regex::new(r"^#ip\s+(\d+)$").expect("header pattern is valid");
    static ref INSTRUCTION: Regex =
        Regex::new(r"^([A-Za-z]+)\s+(\d+)\s+(\d+)\s+(\d+)$").expect("instruction pattern is valid");
}

/// Parser for the `#ip` + instruction-line program format
pub struct ProgramParser<'a> {
    source: &'a str,
}

impl<'a> ProgramParser<'a> {
    /// Creates a parser over program text
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Parse the whole program.
    ///
    /// Blank lines are skipped; line numbers in errors are 1-indexed and
    /// refer to the source text.
    pub fn parse(&self) -> Result<Program> {
        let mut lines = self
            .source
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let (header_line, header) = lines
            .next()
            .ok_or_else(|| Error::parse(1, "missing #ip header"))?;
        let ip = Self::parse_header(header_line, header)?;

        let instructions = lines
            .map(|(line, text)| Self::parse_instruction(line, text))
            .collect::<Result<Vec<_>>>()?;

        Program::new(ip, instructions)
    }

    fn parse_header(line: usize, text: &str) -> Result<Reg> {
        let caps = HEADER
            .captures(text)
            .ok_or_else(|| Error::parse(line, format!("expected `#ip <N>`, got `{}`", text)))?;
        let index = Self::parse_number(line, &caps[1])?;

        Reg::from_operand(index).ok_or(Error::InvalidRegister {
            line,
            register: index,
        })
    }

    fn parse_instruction(line: usize, text: &str) -> Result<Instruction> {
        let caps = INSTRUCTION.captures(text).ok_or_else(|| {
            Error::parse(
                line,
                format!("expected `<mnemonic> <a> <b> <c>`, got `{}`", text),
            )
        })?;

        let mnemonic = &caps[1];
        let opcode = Opcode::from_mnemonic(mnemonic).ok_or_else(|| Error::UnknownOpcode {
            line,
            mnemonic: mnemonic.to_string(),
        })?;

        let instr = Instruction::new(
            opcode,
            Self::parse_number(line, &caps[2])?,
            Self::parse_number(line, &caps[3])?,
            Self::parse_number(line, &caps[4])?,
        );
        instr.validate(line)?;
        Ok(instr)
    }

    fn parse_number(line: usize, digits: &str) -> Result<i64> {
        digits
            .parse()
            .map_err(|_| Error::parse(line, format!("operand out of range: {}", digits)))
    }
}

//! Direct interpreter for machine programs

use super::program::Program;
use super::Registers;
use crate::{Error, Result};

/// Interpreter options
#[derive(Debug, Clone, Default)]
pub struct InterpreterOptions {
    /// Abort with [`Error::ExecutionLimitExceeded`] after this many instructions
    pub step_limit: Option<u64>,
}

/// Final state of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution {
    /// Register file when the instruction pointer left the program
    pub registers: Registers,
    /// Number of instructions executed
    pub steps: u64,
}

/// Executes programs instruction by instruction
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    options: InterpreterOptions,
}

impl Interpreter {
    /// Create an interpreter with the given options
    pub fn new(options: InterpreterOptions) -> Self {
        Self { options }
    }

    /// Run `program` from the given register file until the instruction
    /// pointer leaves `[0, len)`.
    ///
    /// The initial value of the ip register is the first instruction executed.
    pub fn run(&self, program: &Program, registers: Registers) -> Result<Execution> {
        let ip = program.ip().index();
        let instructions = program.instructions();
        let mut regs = registers;
        let mut steps: u64 = 0;

        while let Some(instr) = usize::try_from(regs[ip])
            .ok()
            .and_then(|pc| instructions.get(pc))
        {
            if let Some(limit) = self.options.step_limit {
                if steps >= limit {
                    return Err(Error::ExecutionLimitExceeded { limit });
                }
            }

            instr.opcode.execute(&mut regs, instr.a, instr.b, instr.c);
            regs[ip] = regs[ip].wrapping_add(1);
            steps += 1;
        }

        tracing::debug!(steps, "program halted, ip = {}", regs[ip]);

        Ok(Execution {
            registers: regs,
            steps,
        })
    }

    /// Run and return the final value of register 0
    pub fn run_register_zero(&self, program: &Program, registers: Registers) -> Result<i64> {
        Ok(self.run(program, registers)?.registers[0])
    }
}

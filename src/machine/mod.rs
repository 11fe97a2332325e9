//! # The Register Machine
//!
//! Six signed registers, sixteen opcodes, and one register bound to the
//! instruction pointer. Writing to that register is the only way to branch.
//!
//! ## Module Structure
//!
//! ```text
//! machine/
//! ├── mod.rs          # This file - register file and re-exports
//! ├── opcode.rs       # Opcode enum and per-opcode semantics
//! ├── program.rs      # Reg, Instruction, Program
//! ├── parser.rs       # `#ip N` program text parser
//! └── interpreter.rs  # Direct execution
//! ```

pub mod interpreter;
pub mod opcode;
pub mod parser;
pub mod program;

pub use interpreter::{Execution, Interpreter, InterpreterOptions};
pub use opcode::{OperandKind, Opcode};
pub use parser::ProgramParser;
pub use program::{Instruction, Program, Reg};

/// Number of registers in the machine
pub const REGISTER_COUNT: usize = 6;

/// The register file
pub type Registers = [i64; REGISTER_COUNT];

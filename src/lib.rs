//! # Elfcode - Register Machine Interpreter and Structural Decompiler
//!
//! Elfcode programs run on a six-register machine with sixteen opcodes. One
//! register is bound to the instruction pointer, and writing to it is the
//! only way to branch. This crate executes such programs and recovers
//! structured control flow (`if`, `do`/`while`, `for`) from their flat,
//! jump-based form.
//!
//! ## Quick Start
//!
//! ### Running a program
//!
//! ```rust
//! use elfcode::{Interpreter, Program};
//!
//! # fn main() -> elfcode::Result<()> {
//! let program: Program = "#ip 0
//! seti 5 0 1
//! seti 6 0 2
//! addi 0 1 0
//! addr 1 2 3
//! setr 1 0 0
//! seti 8 0 4
//! seti 9 0 5"
//!     .parse()?;
//!
//! let execution = Interpreter::default().run(&program, [0; 6])?;
//! assert_eq!(execution.registers, [7, 5, 6, 0, 0, 9]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Decompiling a program
//!
//! ```rust
//! use elfcode::{Decompiler, IrNode, Program};
//!
//! # fn main() -> elfcode::Result<()> {
//! // r0 = 2 * r2, as a counting loop
//! let program = Program::parse("#ip 4
//! seti 0 0 1
//! addi 0 2 0
//! addi 1 1 1
//! eqrr 1 2 3
//! addr 3 4 4
//! seti 0 0 4
//! mulr 4 4 4")?;
//!
//! let decompiler = Decompiler::default();
//! let result = decompiler.decompile(&program)?;
//!
//! assert!(matches!(result.nodes[0], IrNode::ForLoop { .. }));
//! assert!(decompiler.verify(&program, &result, [0, 0, 7, 0, 0, 0])?);
//! println!("{}", result.source);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Program text → ProgramParser → Program ─┬→ Interpreter → registers
//!                                         │
//!                                         └→ Translator → IR → Peephole
//!                                              → StructureRecovery → CEmitter
//! ```
//!
//! ### Main Components
//!
//! - [`Program`] - Validated instructions plus the pointer register
//! - [`Interpreter`] - Direct execution
//! - [`Decompiler`] - Translation, peephole passes, structural recovery, emission
//! - [`IrExecutor`] - Runs IR so decompiled output can be checked
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result`] with the crate-wide [`Error`]:
//!
//! ```rust
//! use elfcode::{Error, Program};
//!
//! let err = Program::parse("#ip 4\ndivr 1 2 3").unwrap_err();
//! assert_eq!(err, Error::UnknownOpcode { line: 2, mnemonic: "divr".into() });
//! ```

/// Version of the elfcode crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod decompiler;
pub mod error;
pub mod machine;

// Re-export main types
pub use decompiler::{
    DecompileOptions, DecompileResult, Decompiler, IrExecutor, IrNode, Pattern, RecoveryReport,
};
pub use error::{Error, ErrorSeverity, Result};
pub use machine::{
    Execution, Instruction, Interpreter, InterpreterOptions, Opcode, Program, Reg, Registers,
};

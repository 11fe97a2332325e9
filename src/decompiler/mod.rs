//! # Elfcode Decompiler - Flat Instructions to Structured Pseudocode
//!
//! Recovers if/else, do-while and for loops from jump-based register
//! machine programs.
//!
//! ## Pipeline
//!
//! 1. **Translate** each instruction into one IR node ([`Translator`])
//! 2. **Peephole**: compound assignments, redundant stores, pointer
//!    normalization ([`Peephole`])
//! 3. **Recover structure** to a fixpoint ([`StructureRecovery`])
//! 4. **Emit** C-like pseudocode ([`CEmitter`])
//!
//! ## Usage
//!
//! ```
//! use elfcode::decompiler::{Decompiler, DecompileOptions};
//!
//! let source = "#ip 4\nseti 0 0 1\naddi 0 2 0\naddi 1 1 1\neqrr 1 2 3\naddr 3 4 4\nseti 0 0 4\nmulr 4 4 4";
//! let result = Decompiler::new(DecompileOptions::default()).decompile_source(source)?;
//! assert!(result.source.contains("for (r1 = 0; !(r1 == r2); r1++) {"));
//! # Ok::<(), elfcode::Error>(())
//! ```
//!
//! ## Limitations
//!
//! - `mulr _ _ ip` is assumed to end the program
//! - `ip += rX` is assumed to add 0 or 1
//! - if-else fusion drops the comparison's write to its flag register

pub mod emitter;
pub mod executor;
pub mod ir;
pub mod peephole;
pub mod structure;
pub mod translator;

pub use emitter::CEmitter;
pub use executor::IrExecutor;
pub use ir::{BinOp, BinaryExpr, Expr, IrNode};
pub use peephole::{DeadStorePolicy, Peephole};
pub use structure::{Pattern, RecoveryReport, StructureRecovery};
pub use translator::Translator;

use crate::machine::{Interpreter, InterpreterOptions, Opcode, Program, Reg, Registers};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default per-run step limit for [`Decompiler::verify`]
pub const DEFAULT_VERIFY_STEP_LIMIT: u64 = 10_000_000;

/// When the emitter prefixes top-level nodes with their index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineNumbers {
    /// Always number top-level nodes
    Always,
    /// Only when a jump or pointer write survived recovery
    #[default]
    WhenJumpsRemain,
    /// Never number
    Never,
}

/// Decompiler options
#[derive(Debug, Clone)]
pub struct DecompileOptions {
    /// Run the compound-assignment / redundant-store pass
    pub rewrite_operators: bool,
    /// Normalize `ip += rX` ahead of if-else fusion
    pub rewrite_pointer: bool,
    /// Fold flat IR into structured nodes
    pub recover_structure: bool,
    /// Jump target handling when redundant stores are deleted
    pub dead_store_policy: DeadStorePolicy,
    /// Line number prefixes in the emitted source
    pub line_numbers: LineNumbers,
    /// Indentation unit for nested bodies
    pub indent: String,
    /// Step limit for each of the two runs in [`Decompiler::verify`].
    /// `None` lets a non-terminating run hang.
    pub step_limit: Option<u64>,
}

impl Default for DecompileOptions {
    fn default() -> Self {
        Self {
            rewrite_operators: true,
            rewrite_pointer: true,
            recover_structure: true,
            dead_store_policy: DeadStorePolicy::default(),
            line_numbers: LineNumbers::default(),
            indent: "    ".into(),
            step_limit: Some(DEFAULT_VERIFY_STEP_LIMIT),
        }
    }
}

/// Decompilation result
#[derive(Debug, Clone, Serialize)]
pub struct DecompileResult {
    /// Pointer register of the source program
    pub ip: Reg,
    /// Final IR
    pub nodes: Vec<IrNode>,
    /// Generated pseudocode
    pub source: String,
    /// Structural rewrites applied
    pub report: RecoveryReport,
    /// Warnings during decompilation
    pub warnings: Vec<String>,
}

impl DecompileResult {
    /// Serialize the result as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// True if no jumps or pointer writes remain
    pub fn is_fully_structured(&self) -> bool {
        !self.nodes.iter().any(|n| n.has_control_flow(self.ip))
    }
}

/// Elfcode decompiler
pub struct Decompiler {
    options: DecompileOptions,
}

impl Decompiler {
    /// Create a new decompiler with options
    pub fn new(options: DecompileOptions) -> Self {
        Self { options }
    }

    /// Decompile a loaded program
    pub fn decompile(&self, program: &Program) -> Result<DecompileResult> {
        let ip = program.ip();
        let mut warnings = Vec::new();

        // Step 1: Translate
        let mut nodes = Translator::translate_program(program)?;
        for (line, instr) in program.instructions().iter().enumerate() {
            if instr.opcode == Opcode::Mulr && instr.dest() == Some(ip) {
                warnings.push(format!("line {}: `{}` assumed to end the program", line, instr));
            }
        }

        // Step 2: Peephole passes
        let peephole = Peephole::new(ip, self.options.dead_store_policy);
        if self.options.rewrite_operators {
            let (rewritten, deleted) = peephole.rewrite_operators(nodes);
            nodes = rewritten;
            if !deleted.is_empty() {
                tracing::debug!(count = deleted.len(), "removed redundant assignments");
                if self.options.dead_store_policy == DeadStorePolicy::PreserveTargets {
                    warnings.push(format!(
                        "removed redundant assignments at lines {:?} without renumbering jump targets",
                        deleted
                    ));
                }
            }
        }
        if self.options.rewrite_pointer {
            let (rewritten, inserted) = peephole.rewrite_pointer(nodes);
            nodes = rewritten;
            for line in inserted {
                warnings.push(format!(
                    "line {}: register added to the pointer assumed to hold 0 or 1",
                    line
                ));
            }
        }

        // Step 3: Recover structure
        let (nodes, report) = if self.options.recover_structure {
            StructureRecovery::new(ip).recover(nodes)
        } else {
            (nodes, RecoveryReport::default())
        };

        let remaining = nodes.iter().filter(|n| n.has_control_flow(ip)).count();
        if remaining > 0 {
            tracing::warn!(remaining, "flat control flow left after recovery");
            warnings.push(format!(
                "{} node(s) still transfer control by line number",
                remaining
            ));
        }
        let mut outside = ir::out_of_range_targets(&nodes);
        if !outside.is_empty() {
            outside.sort_unstable();
            outside.dedup();
            warnings.push(format!(
                "jump targets past the last node (program exit): {:?}",
                outside
            ));
        }

        // Step 4: Emit
        let source = CEmitter::new(&self.options, ip).emit(&nodes);

        Ok(DecompileResult {
            ip,
            nodes,
            source,
            report,
            warnings,
        })
    }

    /// Parse program text and decompile it
    pub fn decompile_source(&self, source: &str) -> Result<DecompileResult> {
        self.decompile(&Program::parse(source)?)
    }

    /// Run `program` and its decompiled form from `registers` and compare
    /// the final value of register 0.
    ///
    /// Both runs start at the first instruction; the pointer register is
    /// reset to 0. Each run is bounded by [`DecompileOptions::step_limit`]
    /// and fails with [`Error::ExecutionLimitExceeded`] past it.
    ///
    /// Programs whose pointer is register 0 are rejected with
    /// [`Error::Unverifiable`]: the interpreter leaves the exit position
    /// there, which the IR does not model.
    pub fn verify(
        &self,
        program: &Program,
        result: &DecompileResult,
        registers: Registers,
    ) -> Result<bool> {
        if program.ip() == Reg::R0 || result.ip == Reg::R0 {
            return Err(Error::Unverifiable(
                "register 0 is the instruction pointer".into(),
            ));
        }

        let mut start = registers;
        start[program.ip().index()] = 0;

        let expected = Interpreter::new(InterpreterOptions {
            step_limit: self.options.step_limit,
        })
        .run_register_zero(program, start)?;
        let actual = IrExecutor::new(result.ip)
            .with_step_limit(self.options.step_limit)
            .run_register_zero(&result.nodes, start)?;

        tracing::debug!(expected, actual, "verified decompiled program");
        Ok(expected == actual)
    }
}

impl Default for Decompiler {
    fn default() -> Self {
        Self::new(DecompileOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTER: &str = "#ip 4
seti 0 0 1
addi 0 2 0
addi 1 1 1
eqrr 1 2 3
addr 3 4 4
seti 0 0 4
mulr 4 4 4";

    #[test]
    fn test_decompiler_creation() {
        let decompiler = Decompiler::default();
        assert!(decompiler.options.rewrite_operators);
        assert!(decompiler.options.recover_structure);
        assert_eq!(
            decompiler.options.dead_store_policy,
            DeadStorePolicy::PreserveTargets
        );
        assert_eq!(decompiler.options.line_numbers, LineNumbers::WhenJumpsRemain);
    }

    #[test]
    fn test_decompile_counter() {
        let result = Decompiler::default().decompile_source(COUNTER).unwrap();

        assert_eq!(result.nodes.len(), 2);
        assert!(result.is_fully_structured());
        assert_eq!(result.report.total(), 3);
        assert_eq!(
            result.source,
            "// Decompiled elfcode (#ip 4)\n\
             for (r1 = 0; !(r1 == r2); r1++) {\n\
             \x20   r0 += 2;\n\
             }\n\
             end;\n"
        );
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("mulr 4 4 4"));
    }

    #[test]
    fn test_verify_counter() {
        let program = Program::parse(COUNTER).unwrap();
        let decompiler = Decompiler::default();
        let result = decompiler.decompile(&program).unwrap();

        assert!(decompiler
            .verify(&program, &result, [0, 0, 5, 0, 0, 0])
            .unwrap());
    }

    #[test]
    fn test_without_structure_recovery() {
        let decompiler = Decompiler::new(DecompileOptions {
            recover_structure: false,
            ..Default::default()
        });
        let result = decompiler.decompile_source(COUNTER).unwrap();

        assert_eq!(result.nodes.len(), 7);
        assert_eq!(result.report, RecoveryReport::default());
        assert!(!result.is_fully_structured());
        assert!(result.source.contains("0005: goto 1;"));
    }

    #[test]
    fn test_unsupported_pointer_write() {
        let err = Decompiler::default()
            .decompile_source("#ip 4\nmuli 4 2 4")
            .unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedTranslation {
                line: 0,
                opcode: Opcode::Muli
            }
        );
    }

    #[test]
    fn test_default_verify_is_bounded() {
        let decompiler = Decompiler::default();
        assert_eq!(decompiler.options.step_limit, Some(DEFAULT_VERIFY_STEP_LIMIT));

        // jumping back to itself forever
        let program = Program::parse("#ip 4\nseti 0 0 1\nseti 0 0 4").unwrap();
        let result = decompiler.decompile(&program).unwrap();
        assert_eq!(
            decompiler.verify(&program, &result, [0; 6]),
            Err(Error::ExecutionLimitExceeded {
                limit: DEFAULT_VERIFY_STEP_LIMIT
            })
        );
    }

    #[test]
    fn test_verify_rejects_pointer_in_register_zero() {
        let program = Program::parse("#ip 0\nseti 5 0 1\naddi 1 2 3").unwrap();
        let decompiler = Decompiler::default();
        let result = decompiler.decompile(&program).unwrap();

        assert_eq!(result.nodes.len(), 2);
        assert!(matches!(
            decompiler.verify(&program, &result, [0; 6]),
            Err(Error::Unverifiable(_))
        ));
    }

    #[test]
    fn test_to_json() {
        let result = Decompiler::default().decompile_source(COUNTER).unwrap();
        let json = result.to_json().unwrap();

        assert!(json.contains("\"ForLoop\""));
        assert!(json.contains("\"for_loops\": 1"));
    }
}

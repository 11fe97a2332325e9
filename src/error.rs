//! Error types for the elfcode interpreter and decompiler

use crate::machine::Opcode;
use thiserror::Error;

/// Elfcode errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Load errors
    /// Malformed program text
    ///
    /// **Triggered by:** A missing or invalid `#ip` header, or an instruction
    /// line that is not `<mnemonic> <a> <b> <c>`
    /// **Example:** `addr 1 2` (missing operand)
    #[error("Parse error at line {line}: {message}")]
    ParseError {
        /// Line number (1-indexed) in the program text
        line: usize,
        /// Error description
        message: String,
    },

    /// Instruction mnemonic is not one of the 16 known opcodes
    #[error("Unknown opcode at line {line}: {mnemonic}")]
    UnknownOpcode {
        /// Line number (1-indexed) in the program text
        line: usize,
        /// The unrecognized mnemonic
        mnemonic: String,
    },

    /// Register operand outside the register file
    ///
    /// **Triggered by:** `#ip 9`, or `addr 7 0 0` (register 7 does not exist)
    #[error("Invalid register r{register} at line {line}")]
    InvalidRegister {
        /// 1-indexed text line when parsing; instruction index from `Program::new`
        line: usize,
        /// Offending register index
        register: i64,
    },

    // Translation errors
    /// The translator does not model this write to the instruction pointer
    ///
    /// **Triggered by:** Any ip-register write other than `addi ip n ip`,
    /// `seti n _ ip`, `addr ip r ip` and `mulr _ _ ip`
    /// **Example:** `muli 4 2 4` with `#ip 4`
    #[error("Unsupported translation at line {line}: {opcode} writes the instruction pointer")]
    UnsupportedTranslation {
        /// Instruction index in the program
        line: usize,
        /// Opcode of the offending instruction
        opcode: Opcode,
    },

    // Execution errors
    /// Execution limit exceeded
    #[error("Execution limit exceeded (max: {limit} steps)")]
    ExecutionLimitExceeded {
        /// Maximum allowed steps
        limit: u64,
    },

    /// The decompiled program cannot be checked against the interpreter
    ///
    /// **Triggered by:** `Decompiler::verify` on a program whose instruction
    /// pointer is register 0
    #[error("Cannot verify program: {0}")]
    Unverifiable(String),

    /// General runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Fatal error that cannot be recovered from
    Fatal,
    /// Recoverable error that may be retried
    Recoverable,
    /// Warning that doesn't prevent execution
    Warning,
}

impl Error {
    /// Create a parse error for the given 1-indexed line
    pub fn parse(line: usize, msg: impl Into<String>) -> Self {
        Error::ParseError {
            line,
            message: msg.into(),
        }
    }

    /// Create a runtime error with a message
    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::RuntimeError(msg.into())
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::ParseError { .. } => ErrorSeverity::Fatal,
            Error::UnknownOpcode { .. } => ErrorSeverity::Fatal,
            Error::InvalidRegister { .. } => ErrorSeverity::Fatal,
            Error::UnsupportedTranslation { .. } => ErrorSeverity::Fatal,
            Error::Unverifiable(_) => ErrorSeverity::Fatal,

            Error::ExecutionLimitExceeded { .. } => ErrorSeverity::Recoverable,
            Error::RuntimeError(_) => ErrorSeverity::Recoverable,

            Error::SerializationError(_) => ErrorSeverity::Warning,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

/// Result type for elfcode operations
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the CLI

use bytecode_system::{AsmError, VerifyError};
use core_types::VmError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// File I/O error
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    /// Assembly source did not assemble
    #[error("assembly error: {0}")]
    Asm(#[from] AsmError),

    /// A built-in program failed verification
    #[error("verification error: {0}")]
    Verify(#[from] VerifyError),

    /// The program failed while running
    #[error("runtime error: {0}")]
    Vm(#[from] VmError),

    /// Configuration file could not be parsed
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

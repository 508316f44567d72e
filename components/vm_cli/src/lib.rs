//! `loopvm` library
//!
//! Argument parsing, configuration loading and the [`Runtime`] that wires
//! the interpreter to the compiled loop tier for the `loopvm` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod demos;
pub mod error;
pub mod runtime;

pub use cli::{Cli, Command, Demo};
pub use error::{CliError, CliResult};
pub use runtime::{Runtime, RuntimeConfig};

//! Command-line arguments

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bytecode VM with loop OSR and superinstructions
#[derive(Parser, Debug)]
#[command(name = "loopvm", author, version, about, long_about = None)]
pub struct Cli {
    /// What to do
    #[command(subcommand)]
    pub command: Command,

    /// Fuse superinstructions before running
    #[arg(long, global = true)]
    pub quicken: bool,

    /// Use type-checked frames
    #[arg(long, global = true)]
    pub checked: bool,

    /// Never enter compiled loops
    #[arg(long = "no-tier", global = true)]
    pub no_tier: bool,

    /// Back-edges per activation before an OSR attempt
    #[arg(long, global = true, value_name = "N")]
    pub osr_threshold: Option<u32>,

    /// Compile loops on a background thread
    #[arg(long, global = true)]
    pub background: bool,

    /// JSON configuration file; flags override it
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Assemble and run a program
    Run {
        /// Assembly source file
        file: PathBuf,
        /// Integer arguments stored into the first locals
        #[arg(allow_negative_numbers = true)]
        args: Vec<i32>,
    },
    /// Run a built-in program
    Demo {
        /// Which program
        #[command(subcommand)]
        demo: Demo,
    },
    /// Assemble a program and print its disassembly
    Disasm {
        /// Assembly source file
        file: PathBuf,
    },
}

/// Built-in programs
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demo {
    /// Greatest common divisor by repeated remainder
    Gcd {
        /// First operand
        a: i32,
        /// Second operand
        b: i32,
    },
    /// Sum of 1..=N with wrapping addition
    Sum {
        /// Upper bound
        n: i32,
    },
}

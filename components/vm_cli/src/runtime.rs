//! Runtime orchestration for the CLI
//!
//! The Runtime wires the interpreter to the compiled loop tier according
//! to a [`RuntimeConfig`], then assembles, runs and disassembles programs.

use crate::cli::Cli;
use crate::error::CliResult;
use bytecode_system::{assemble, disassemble, Program};
use core_types::Value;
use interpreter::{FrameKind, TierRuntime, VmConfig, VM};
use jit_compiler::{CompilerConfig, LoopTier};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Everything the config file can set.
///
/// ```json
/// { "vm": { "osr_threshold": 64, "frame": "checked" },
///   "compiler": { "background": true } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Interpreter settings
    pub vm: VmConfig,
    /// Compiled tier settings
    pub compiler: CompilerConfig,
}

impl RuntimeConfig {
    /// Parse from JSON
    pub fn from_json_str(json: &str) -> CliResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read `path`, or take defaults if there is no file
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::from_json_str(&std::fs::read_to_string(path)?),
            None => Ok(Self::default()),
        }
    }

    /// Apply command-line flags on top
    pub fn with_flags(mut self, cli: &Cli) -> Self {
        if cli.quicken {
            self.vm.quicken = true;
        }
        if cli.checked {
            self.vm.frame = FrameKind::Checked;
        }
        if cli.no_tier {
            self.vm.tiering = false;
        }
        if let Some(threshold) = cli.osr_threshold {
            self.vm.osr_threshold = threshold;
        }
        if cli.background {
            self.compiler.background = true;
        }
        self
    }
}

/// VM plus compiled tier
pub struct Runtime {
    vm: VM,
    tier: Option<Arc<LoopTier>>,
}

impl Runtime {
    /// Create a runtime
    ///
    /// # Example
    /// ```
    /// use vm_cli::{Runtime, RuntimeConfig};
    /// use core_types::Value;
    ///
    /// let runtime = Runtime::new(RuntimeConfig::default());
    /// let value = runtime.run_source("const 40\nconst 2\nadd\nreturn", &[]).unwrap();
    /// assert_eq!(value, Value::Int(42));
    /// ```
    pub fn new(config: RuntimeConfig) -> Self {
        let RuntimeConfig { vm, compiler } = config;
        let mut runtime = TierRuntime::new(&vm);
        let tier = vm.tiering.then(|| Arc::new(LoopTier::new(compiler)));
        if let Some(tier) = &tier {
            runtime = runtime.with_compiler(tier.clone());
        }
        Self {
            vm: VM::with_runtime(vm, runtime),
            tier,
        }
    }

    /// The VM
    pub fn vm(&self) -> &VM {
        &self.vm
    }

    /// The compiled tier, unless tiering is off
    pub fn tier(&self) -> Option<&Arc<LoopTier>> {
        self.tier.as_ref()
    }

    /// Run a program with integer arguments
    pub fn run_program(&self, program: &Program, args: &[Value]) -> CliResult<Value> {
        let value = self.vm.execute_with_args(program, args)?;
        log::info!("program {} returned {}", program.id(), value);
        Ok(value)
    }

    /// Assemble and run `source`
    pub fn run_source(&self, source: &str, args: &[i32]) -> CliResult<Value> {
        let program = assemble(source)?;
        let args: Vec<Value> = args.iter().copied().map(Value::Int).collect();
        self.run_program(&program, &args)
    }

    /// Assemble and run the file at `path`
    pub fn run_file(&self, path: &Path, args: &[i32]) -> CliResult<Value> {
        let source = std::fs::read_to_string(path)?;
        self.run_source(&source, args)
    }

    /// Assemble `path` and disassemble the program the VM would run,
    /// quickened if quickening is on
    pub fn disassemble_file(&self, path: &Path) -> CliResult<String> {
        let source = std::fs::read_to_string(path)?;
        let program = self.vm.prepare(&assemble(&source)?);
        Ok(disassemble(&program))
    }

    /// One-line summary of tiering activity
    pub fn summary(&self) -> String {
        let profile = self.vm.profile();
        let Some(tier) = &self.tier else {
            return "tiering off".to_string();
        };
        let mut summary = format!(
            "back-edges reported: {}, compiled loops: {}",
            profile.total_back_edges(),
            tier.cache().compiled_count()
        );
        if let Some(&((_, bci), count)) = profile.hottest(1).first() {
            summary.push_str(&format!(", hottest loop @{} ({} back-edges)", bci, count));
        }
        summary
    }
}

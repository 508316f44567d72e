//! Virtual Machine for bytecode execution
//!
//! Main entry point for running programs. A [`VM`] is `Send + Sync`; one
//! instance can serve many threads, each running its own activations.

use crate::config::{FrameKind, VmConfig};
use crate::context::Activation;
use crate::frame::{CheckedFrame, Frame, RawFrame};
use crate::osr::{OsrCompiler, TierRuntime};
use crate::profile::LoopProfile;
use crate::safepoint::SafepointPoll;
use bytecode_system::{Program, ProgramId, Quickener};
use core_types::{Value, VmResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Virtual Machine for executing bytecode programs
///
/// The VM owns:
/// - The configuration (frame kind, quickening, thresholds)
/// - The tiering runtime shared by every activation
/// - A cache of quickened programs
#[derive(Debug)]
pub struct VM {
    config: VmConfig,
    runtime: Arc<TierRuntime>,
    quickener: Quickener,
    prepared: Mutex<HashMap<ProgramId, Program>>,
}

impl VM {
    /// Create a VM with the default configuration and no compiled tier
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Create a VM with `config` and no compiled tier
    pub fn with_config(config: VmConfig) -> Self {
        let runtime = TierRuntime::new(&config);
        Self::with_runtime(config, runtime)
    }

    /// Create a VM around a prepared tiering runtime
    ///
    /// # Example
    ///
    /// ```
    /// use interpreter::{PauseGate, TierRuntime, VmConfig, VM};
    /// use std::sync::Arc;
    ///
    /// let config = VmConfig::default();
    /// let gate = Arc::new(PauseGate::new());
    /// let runtime = TierRuntime::new(&config).with_safepoint(gate);
    /// let vm = VM::with_runtime(config, runtime);
    /// assert!(vm.runtime().next_tier().is_none());
    /// ```
    pub fn with_runtime(config: VmConfig, runtime: TierRuntime) -> Self {
        Self {
            config,
            runtime: Arc::new(runtime),
            quickener: Quickener::new(),
            prepared: Mutex::new(HashMap::new()),
        }
    }

    /// Create a VM with a compiled tier and a safepoint
    pub fn with_tiers(
        config: VmConfig,
        compiler: Arc<dyn OsrCompiler>,
        safepoint: Arc<dyn SafepointPoll>,
    ) -> Self {
        let runtime = TierRuntime::new(&config)
            .with_compiler(compiler)
            .with_safepoint(safepoint);
        Self::with_runtime(config, runtime)
    }

    /// Active configuration
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Shared tiering runtime
    pub fn runtime(&self) -> &Arc<TierRuntime> {
        &self.runtime
    }

    /// Loop counts reported so far
    pub fn profile(&self) -> &LoopProfile {
        self.runtime.profile()
    }

    /// The program as it will actually run: quickened if configured
    pub fn prepare(&self, program: &Program) -> Program {
        if !self.config.quicken || program.is_quickened() {
            return program.clone();
        }
        self.prepared
            .lock()
            .entry(program.id())
            .or_insert_with(|| {
                let (quick, stats) = self.quickener.quicken(program);
                log::debug!(
                    "program {} quickened as {} ({} fusions)",
                    program.id(),
                    quick.id(),
                    stats.total()
                );
                quick
            })
            .clone()
    }

    /// Release what the VM holds for `program`.
    ///
    /// Drops the cached quickened copy and, for the program and that copy,
    /// the loop profile entries and any compiled loops. Running activations
    /// are unaffected apart from bailing out of invalidated compiled code.
    /// Returns `true` if a quickened copy was cached.
    pub fn forget(&self, program: ProgramId) -> bool {
        let quick = self.prepared.lock().remove(&program);
        self.runtime.forget(program);
        if let Some(quick) = &quick {
            self.runtime.forget(quick.id());
        }
        quick.is_some()
    }

    /// Number of quickened programs currently cached
    pub fn prepared_count(&self) -> usize {
        self.prepared.lock().len()
    }

    /// New activation of `program` with an explicit frame type
    pub fn activation<F: Frame>(&self, program: &Program) -> Activation<F> {
        Activation::new(self.prepare(program), Arc::clone(&self.runtime))
    }

    /// Execute a program and return the result
    ///
    /// # Example
    ///
    /// ```
    /// use interpreter::VM;
    /// use bytecode_system::ProgramBuilder;
    /// use core_types::Value;
    ///
    /// let mut b = ProgramBuilder::new(0);
    /// b.emit_const(5);
    /// b.emit_const(3);
    /// b.emit_add();
    /// b.emit_return();
    /// let program = b.build().unwrap();
    ///
    /// let vm = VM::new();
    /// assert_eq!(vm.execute(&program), Ok(Value::Int(8)));
    /// ```
    pub fn execute(&self, program: &Program) -> VmResult<Value> {
        self.execute_with_args(program, &[])
    }

    /// Execute a program with `args` stored into its first locals
    pub fn execute_with_args(&self, program: &Program, args: &[Value]) -> VmResult<Value> {
        match self.config.frame {
            FrameKind::Raw => self.run_in::<RawFrame>(program, args),
            FrameKind::Checked => self.run_in::<CheckedFrame>(program, args),
        }
    }

    fn run_in<F: Frame>(&self, program: &Program, args: &[Value]) -> VmResult<Value> {
        let mut activation = self.activation::<F>(program);
        activation.set_arguments(args)?;
        let result = activation.run();
        let osr = activation.controller();
        if osr.osr_entries() > 0 {
            log::debug!(
                "program {}: {} OSR entries, {} deopts",
                program.id(),
                osr.osr_entries(),
                osr.deopts()
            );
        }
        result
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

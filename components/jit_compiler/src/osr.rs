//! The compiled loop tier behind the interpreter's OSR interface.
//!
//! [`LoopTier`] answers [`OsrCompiler::compile_loop`] from its
//! [`CodeCache`]. An unknown loop is either compiled on the spot or, with
//! background compilation on, queued; in that case the request answers
//! "not yet" and the interpreter keeps going until a later back-edge finds
//! the code installed.

use crate::baseline::{BaselineCompiler, BaselineStats, CompileError};
use crate::code_cache::{CodeCache, LoopState};
use crate::compilation_queue::CompilationQueue;
use crate::compiled_code::CompiledLoop;
use crate::config::CompilerConfig;
use bytecode_system::{Program, ProgramId};
use interpreter::{CompiledEntry, LoopKey, OsrCompiler, OsrRequest, SafepointPoll, SlotClearing};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Everything needed to compile one loop, owned so it can cross threads.
pub struct CompileJob {
    /// Program containing the loop
    pub program: Program,
    /// Loop header bci
    pub target: usize,
    /// Slots in the requesting frame
    pub frame_size: usize,
    /// Slot clearing policy to honor
    pub clearing: SlotClearing,
    /// Safepoint to poll at back-edges
    pub safepoint: Arc<dyn SafepointPoll>,
    /// Stress bail-out after this many back-edges
    pub stress_deopt_after: Option<u32>,
}

impl CompileJob {
    /// Job for an interpreter request
    pub fn from_request(request: &OsrRequest<'_>, config: &CompilerConfig) -> Self {
        Self {
            program: request.program.clone(),
            target: request.target,
            frame_size: request.frame_size,
            clearing: request.clearing,
            safepoint: Arc::clone(request.safepoint),
            stress_deopt_after: config.stress_deopt_after,
        }
    }

    /// Cache key of the loop
    pub fn key(&self) -> LoopKey {
        (self.program.id(), self.target)
    }
}

impl fmt::Debug for CompileJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileJob")
            .field("program", &self.program.id())
            .field("target", &self.target)
            .field("frame_size", &self.frame_size)
            .field("clearing", &self.clearing)
            .finish()
    }
}

pub(crate) fn build_entry(
    compiler: &mut BaselineCompiler,
    cache: &Arc<CodeCache>,
    job: &CompileJob,
) -> Result<Arc<CompiledLoop>, CompileError> {
    let code = compiler.compile(&job.program, job.frame_size)?;
    if code.entry(job.target).is_none() {
        return Err(CompileError::NotAnEntry(job.target));
    }
    let entry = CompiledLoop::new(
        job.key(),
        Arc::new(code),
        job.clearing,
        Arc::clone(&job.safepoint),
        Arc::downgrade(cache),
    )
    .with_stress_deopt(job.stress_deopt_after);
    Ok(Arc::new(entry))
}

/// Compiled loop tier.
///
/// # Example
///
/// ```
/// use bytecode_system::assemble;
/// use interpreter::{TierRuntime, VmConfig, VM};
/// use jit_compiler::{CompilerConfig, LoopTier};
/// use core_types::Value;
/// use std::sync::Arc;
///
/// let program = assemble("
///     .locals 1
///             const 100
///             st_loc 0
///     loop:   const 0
///             ld_loc 0
///             less
///             jump_false done
///             ld_loc 0
///             const -1
///             add
///             st_loc 0
///             jump loop
///     done:   ld_loc 0
///             return
/// ").unwrap();
///
/// let tier = Arc::new(LoopTier::new(CompilerConfig::default()));
/// let config = VmConfig::new().with_osr_threshold(10);
/// let runtime = TierRuntime::new(&config).with_compiler(tier.clone());
/// let vm = VM::with_runtime(config, runtime);
/// assert_eq!(vm.execute(&program), Ok(Value::Int(0)));
/// assert_eq!(tier.cache().compiled_count(), 1);
/// ```
pub struct LoopTier {
    config: CompilerConfig,
    cache: Arc<CodeCache>,
    compiler: Mutex<BaselineCompiler>,
    queue: Option<CompilationQueue>,
}

impl LoopTier {
    /// Tier with a fresh cache; spawns the worker if `config.background`
    pub fn new(config: CompilerConfig) -> Self {
        let cache = Arc::new(CodeCache::new(config.max_deopts_per_loop));
        let queue = config
            .background
            .then(|| CompilationQueue::new(Arc::clone(&cache), config.max_queue_size));
        Self {
            config,
            cache,
            compiler: Mutex::new(BaselineCompiler::new()),
            queue,
        }
    }

    /// Settings in use
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// The shared code cache
    pub fn cache(&self) -> &Arc<CodeCache> {
        &self.cache
    }

    /// Background queue, if compiling in the background
    pub fn queue(&self) -> Option<&CompilationQueue> {
        self.queue.as_ref()
    }

    /// Statistics of synchronous compilation
    pub fn stats(&self) -> BaselineStats {
        self.compiler.lock().stats().clone()
    }

    /// Throw away all compiled code for `program`
    pub fn invalidate(&self, program: ProgramId) -> usize {
        self.cache.invalidate(program)
    }
}

impl OsrCompiler for LoopTier {
    fn compile_loop(&self, request: &OsrRequest<'_>) -> Option<Arc<dyn CompiledEntry>> {
        let key = (request.program.id(), request.target);
        match self.cache.lookup(key) {
            Some(LoopState::Compiled(entry)) => return Some(entry),
            Some(LoopState::Queued) | Some(LoopState::Disabled) => return None,
            None => {}
        }

        let job = CompileJob::from_request(request, &self.config);
        if let Some(queue) = &self.queue {
            if self.cache.mark_queued(key) {
                log::debug!("program {} loop @{}: compile queued", key.0, key.1);
                if !queue.enqueue(job) {
                    self.cache.forget_queued(key);
                }
            }
            return None;
        }

        log::debug!("program {} loop @{}: compiling", key.0, key.1);
        let built = build_entry(&mut self.compiler.lock(), &self.cache, &job);
        match built {
            Ok(entry) => {
                self.cache.install(Arc::clone(&entry));
                Some(entry)
            }
            Err(e) => {
                log::debug!("program {} loop @{}: not compiled: {}", key.0, key.1, e);
                self.cache.disable(key);
                None
            }
        }
    }

    fn forget(&self, program: ProgramId) {
        self.invalidate(program);
    }
}

impl fmt::Debug for LoopTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopTier")
            .field("config", &self.config)
            .field("compiled", &self.cache.compiled_count())
            .field("background", &self.queue.is_some())
            .finish()
    }
}

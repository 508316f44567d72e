//! Background compilation queue.
//!
//! Mutators enqueue loop compile jobs over a `crossbeam` channel; a
//! dedicated worker thread translates them with its own
//! [`BaselineCompiler`] and installs the results into the shared
//! [`CodeCache`]. The requesting activation keeps interpreting; a later
//! back-edge of the same loop finds the compiled code in the cache.

use crate::baseline::BaselineCompiler;
use crate::code_cache::CodeCache;
use crate::osr::{build_entry, CompileJob};
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Statistics for the compilation queue.
#[derive(Debug, Default)]
pub struct CompilationQueueStats {
    /// Number of requests enqueued.
    pub enqueued: AtomicU64,
    /// Number of requests completed successfully.
    pub completed: AtomicU64,
    /// Number of requests that failed.
    pub failed: AtomicU64,
    /// Number of requests dropped (queue full or loop no longer waiting).
    pub dropped: AtomicU64,
}

impl CompilationQueueStats {
    /// Get snapshot of current stats as `(enqueued, completed, failed, dropped)`.
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.enqueued.load(Ordering::Relaxed),
            self.completed.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
        )
    }
}

/// Background compilation queue with a dedicated worker thread.
#[derive(Debug)]
pub struct CompilationQueue {
    sender: Option<Sender<CompileJob>>,
    worker: Option<thread::JoinHandle<()>>,
    stats: Arc<CompilationQueueStats>,
    pending: Arc<AtomicUsize>,
    max_queue_size: usize,
}

impl CompilationQueue {
    /// Spawn the worker, installing into `cache`.
    pub fn new(cache: Arc<CodeCache>, max_queue_size: usize) -> Self {
        let (sender, receiver) = channel::unbounded();
        let stats = Arc::new(CompilationQueueStats::default());
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = {
            let stats = Arc::clone(&stats);
            let pending = Arc::clone(&pending);
            thread::Builder::new()
                .name("loopvm-compiler".to_string())
                .spawn(move || Self::worker_loop(receiver, cache, stats, pending))
                .expect("Failed to spawn loop compilation thread")
        };

        Self {
            sender: Some(sender),
            worker: Some(worker),
            stats,
            pending,
            max_queue_size,
        }
    }

    /// Enqueue a compile job.
    ///
    /// Returns `false` if the queue is full or the worker is gone.
    pub fn enqueue(&self, job: CompileJob) -> bool {
        if self.pending.load(Ordering::Relaxed) >= self.max_queue_size {
            log::warn!(
                "program {} loop @{}: compile queue full, request dropped",
                job.program.id(),
                job.target
            );
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let Some(sender) = &self.sender else {
            return false;
        };
        self.pending.fetch_add(1, Ordering::Relaxed);
        match sender.send(job) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.pending.fetch_sub(1, Ordering::Relaxed);
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Jobs enqueued but not yet finished
    pub fn queue_depth(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether every enqueued job has been processed
    pub fn is_empty(&self) -> bool {
        self.queue_depth() == 0
    }

    /// Get compilation statistics
    pub fn stats(&self) -> &CompilationQueueStats {
        &self.stats
    }

    /// Get maximum queue size
    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    fn worker_loop(
        receiver: Receiver<CompileJob>,
        cache: Arc<CodeCache>,
        stats: Arc<CompilationQueueStats>,
        pending: Arc<AtomicUsize>,
    ) {
        let mut compiler = BaselineCompiler::new();
        for job in receiver.iter() {
            Self::process(&mut compiler, &cache, &stats, &job);
            pending.fetch_sub(1, Ordering::Release);
        }
        log::debug!(
            "compile worker exiting after {} programs",
            compiler.stats().programs_compiled
        );
    }

    fn process(
        compiler: &mut BaselineCompiler,
        cache: &Arc<CodeCache>,
        stats: &CompilationQueueStats,
        job: &CompileJob,
    ) {
        let key = job.key();
        match build_entry(compiler, cache, job) {
            Ok(entry) => {
                if cache.install_if_queued(entry) {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                } else {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(e) => {
                log::debug!("program {} loop @{}: not compiled: {}", key.0, key.1, e);
                cache.disable(key);
                stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Drop for CompilationQueue {
    fn drop(&mut self) {
        // Disconnecting the channel ends the worker loop.
        self.sender.take();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

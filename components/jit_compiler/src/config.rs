//! Compiled tier settings

use serde::{Deserialize, Serialize};

/// Settings for the compiled loop tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Compile on a worker thread instead of at the requesting back-edge
    pub background: bool,
    /// Pending background requests before new ones are dropped
    pub max_queue_size: usize,
    /// Deoptimizations a loop may take before OSR is disabled for it
    pub max_deopts_per_loop: u32,
    /// Make compiled loops bail out after this many of their own back-edges
    pub stress_deopt_after: Option<u32>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            background: false,
            max_queue_size: 64,
            max_deopts_per_loop: 10,
            stress_deopt_after: None,
        }
    }
}

impl CompilerConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set background compilation
    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    /// Set the background queue bound
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Set the per-loop deoptimization limit
    pub fn with_max_deopts_per_loop(mut self, count: u32) -> Self {
        self.max_deopts_per_loop = count;
        self
    }

    /// Force compiled loops to bail out after `back_edges` iterations
    pub fn with_stress_deopt_after(mut self, back_edges: u32) -> Self {
        self.stress_deopt_after = Some(back_edges.max(1));
        self
    }
}

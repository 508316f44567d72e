//! Interpreter configuration.
//!
//! [`VmConfig`] is plain data: it can be built with the `with_*` setters or
//! loaded from JSON. Missing JSON fields take their defaults.

use serde::{Deserialize, Serialize};

/// Slot representation used for activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Untagged-access slots; accessor type is trusted
    #[default]
    Raw,
    /// Tagged slots; mismatched accessors fail with a type error
    Checked,
}

/// What happens to an operand-stack slot when its value is popped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotClearing {
    /// Clear every vacated slot so no stale reference is retained
    #[default]
    OnPop,
    /// Leave popped values in place
    Retain,
}

impl SlotClearing {
    /// Whether popped slots are cleared
    pub fn clears(self) -> bool {
        matches!(self, SlotClearing::OnPop)
    }
}

/// Interpreter and tiering settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Consult the compiled tier at all
    pub tiering: bool,
    /// Back-edges counted before a lump-sum report to the loop profile
    pub loop_report_threshold: u32,
    /// Back-edges per activation before an OSR attempt
    pub osr_threshold: u32,
    /// Slot clearing policy, shared by every tier
    pub slot_clearing: SlotClearing,
    /// Fuse superinstructions before running
    pub quicken: bool,
    /// Frame representation
    pub frame: FrameKind,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            tiering: true,
            loop_report_threshold: 256,
            osr_threshold: 1024,
            slot_clearing: SlotClearing::OnPop,
            quicken: false,
            frame: FrameKind::Raw,
        }
    }
}

impl VmConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document; absent fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Enable or disable tiering
    pub fn with_tiering(mut self, tiering: bool) -> Self {
        self.tiering = tiering;
        self
    }

    /// Set the loop-count report threshold
    pub fn with_loop_report_threshold(mut self, threshold: u32) -> Self {
        self.loop_report_threshold = threshold;
        self
    }

    /// Set the per-activation OSR threshold
    pub fn with_osr_threshold(mut self, threshold: u32) -> Self {
        self.osr_threshold = threshold;
        self
    }

    /// Set the slot clearing policy
    pub fn with_slot_clearing(mut self, policy: SlotClearing) -> Self {
        self.slot_clearing = policy;
        self
    }

    /// Enable or disable quickening
    pub fn with_quicken(mut self, quicken: bool) -> Self {
        self.quicken = quicken;
        self
    }

    /// Choose the frame representation
    pub fn with_frame(mut self, frame: FrameKind) -> Self {
        self.frame = frame;
        self
    }
}

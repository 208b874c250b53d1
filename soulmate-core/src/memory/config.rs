//! Memory compaction configuration.

use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

fn default_interval() -> usize {
    20
}

fn default_window() -> usize {
    20
}

/// Every `interval` messages (both scenes combined) the most recent `window`
/// messages are condensed into one entry of the character's memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval: usize,
    #[serde(default = "default_window")]
    pub window: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval: default_interval(),
            window: default_window(),
        }
    }
}

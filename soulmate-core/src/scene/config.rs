use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

fn default_interval() -> usize {
    5
}

fn default_history_window() -> usize {
    10
}

fn default_fallback_name() -> String {
    "客厅".to_string()
}

/// Background inference for the activity scene.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Re-infer whenever the activity message count is a multiple of this.
    #[serde(default = "default_interval")]
    pub interval: usize,
    /// Number of recent activity messages shown to the model.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Name returned when inference fails or nothing fits.
    #[serde(default = "default_fallback_name")]
    pub fallback_name: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval: default_interval(),
            history_window: default_history_window(),
            fallback_name: default_fallback_name(),
        }
    }
}

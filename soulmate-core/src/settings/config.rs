use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ai::mock::MockBehavior;
use crate::ai::model::Model;
use crate::ai::types::ModelSettings;
use crate::memory::config::MemoryConfig;
use crate::orchestrator::config::PacingConfig;
use crate::scene::config::SceneConfig;

/// Settings for a SoulMate session. Each process keeps its own in-memory
/// copy; saving writes it back to `settings.toml` for future sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The name of the currently active provider
    #[serde(default)]
    pub active_provider: Option<String>,

    /// Map of provider name to configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Model used for every generation call
    #[serde(default)]
    pub model: Model,

    /// Creativity of chat replies. Structured requests (moments, scene
    /// names, summaries) use the model default.
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,

    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub scene: SceneConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ProviderConfig {
    #[serde(rename = "gemini")]
    Gemini {
        /// Falls back to `GEMINI_API_KEY` / `API_KEY` when unset
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        base_url: Option<String>,
    },
    #[serde(rename = "mock")]
    Mock {
        #[serde(default)]
        behavior: MockBehavior,
    },
}

fn default_chat_temperature() -> f32 {
    0.7
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_provider: None,
            providers: HashMap::new(),
            model: Model::default(),
            chat_temperature: default_chat_temperature(),
            pacing: PacingConfig::default(),
            memory: MemoryConfig::default(),
            scene: SceneConfig::default(),
        }
    }
}

impl Settings {
    /// Get the active provider configuration
    pub fn active_provider(&self) -> Option<&ProviderConfig> {
        let provider = self.active_provider.as_ref()?;
        self.providers.get(provider)
    }

    /// Set the active provider (returns error if provider doesn't exist)
    pub fn set_active_provider(&mut self, name: &str) -> Result<(), String> {
        if self.providers.contains_key(name) {
            self.active_provider = Some(name.to_string());
            Ok(())
        } else {
            Err(format!("Provider '{name}' not found"))
        }
    }

    /// Add or update a provider configuration
    pub fn add_provider(&mut self, name: String, config: ProviderConfig) {
        self.providers.insert(name, config);
    }

    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Settings for chat turns.
    pub fn chat_model(&self) -> ModelSettings {
        self.model
            .default_settings()
            .with_temperature(self.chat_temperature)
    }

    /// Settings for summaries, scene names and moment posts.
    pub fn utility_model(&self) -> ModelSettings {
        self.model.default_settings()
    }
}

use serde::{Deserialize, Serialize};

use crate::ai::types::ModelSettings;

/// Models the Gemini provider knows how to address.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::VariantArray,
)]
pub enum Model {
    #[default]
    #[serde(rename = "gemini-2.5-flash")]
    Gemini25Flash,
    #[serde(rename = "gemini-2.5-pro")]
    Gemini25Pro,
    #[serde(rename = "gemini-2.0-flash")]
    Gemini20Flash,

    /// Used by the mock provider.
    #[serde(rename = "none")]
    None,
}

impl Model {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gemini25Flash => "gemini-2.5-flash",
            Self::Gemini25Pro => "gemini-2.5-pro",
            Self::Gemini20Flash => "gemini-2.0-flash",
            Self::None => "none",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        use strum::VariantArray;
        Self::VARIANTS.iter().copied().find(|m| m.name() == name)
    }

    pub fn default_settings(self) -> ModelSettings {
        ModelSettings {
            model: self,
            temperature: None,
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

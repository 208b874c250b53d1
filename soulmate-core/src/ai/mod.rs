pub mod error;
pub mod gemini;
pub mod json;
pub mod mock;
pub mod model;
pub mod provider;
pub mod types;

use std::sync::Arc;

use anyhow::Result;

use crate::settings::ProviderConfig;

pub use error::AiError;
pub use gemini::GeminiProvider;
pub use provider::{generate_text, AiProvider};
pub use types::*;

/// Build a provider from its settings entry.
pub fn provider_from_config(config: &ProviderConfig) -> Result<Arc<dyn AiProvider>> {
    match config {
        ProviderConfig::Gemini { api_key, base_url } => {
            let provider = GeminiProvider::new(api_key.clone())?;
            let provider = match base_url {
                Some(url) => provider.with_base_url(url.clone()),
                None => provider,
            };
            Ok(Arc::new(provider))
        }
        ProviderConfig::Mock { behavior } => {
            Ok(Arc::new(mock::MockProvider::new(behavior.clone())))
        }
    }
}

use std::collections::HashSet;

use anyhow::anyhow;
use tracing::{debug, warn};

use crate::ai::{error::AiError, model::Model, types::*};

#[async_trait::async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn supported_models(&self) -> HashSet<Model>;

    async fn converse(&self, request: ConversationRequest)
        -> Result<ConversationResponse, AiError>;
}

/// Runs a request and returns the concatenated text of the response.
///
/// A response the provider stopped for safety reasons counts as a terminal
/// failure; one cut off at the token limit still yields its text.
pub async fn generate_text(
    provider: &dyn AiProvider,
    request: ConversationRequest,
) -> Result<String, AiError> {
    let response = provider.converse(request).await?;
    debug!(
        provider = provider.name(),
        input_tokens = response.usage.input_tokens,
        output_tokens = response.usage.output_tokens,
        stop_reason = ?response.stop_reason,
        "Generation finished"
    );

    match response.stop_reason {
        StopReason::Blocked(reason) => Err(AiError::Terminal(anyhow!(
            "Response blocked by {}: {reason}",
            provider.name()
        ))),
        StopReason::MaxTokens => {
            warn!(provider = provider.name(), "Response hit the token limit");
            Ok(response.content.text())
        }
        StopReason::EndTurn => Ok(response.content.text()),
    }
}

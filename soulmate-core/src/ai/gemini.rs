use anyhow::{Context, Result};
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use crate::ai::model::Model;
use crate::ai::{error::AiError, provider::AiProvider, types::*};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

/// Google Generative Language (`generateContent`) provider.
///
/// The key is resolved lazily: a missing key surfaces as a terminal error on
/// the first call, not at construction.
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        let api_key = api_key.filter(|k| !k.trim().is_empty()).or_else(|| {
            API_KEY_ENV_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok())
                .filter(|k| !k.trim().is_empty())
        });

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn build_request(request: &ConversationRequest) -> GeminiRequest {
        let contents = request
            .messages
            .iter()
            .map(|message| GeminiContent {
                role: match message.role {
                    MessageRole::User => "user".to_string(),
                    MessageRole::Assistant => "model".to_string(),
                },
                parts: message.content.blocks().iter().map(to_part).collect(),
            })
            .collect();

        let system_instruction = if request.system_prompt.trim().is_empty() {
            None
        } else {
            Some(GeminiSystemInstruction {
                parts: vec![GeminiPart::Text {
                    text: request.system_prompt.clone(),
                }],
            })
        };

        GeminiRequest {
            system_instruction,
            contents,
            generation_config: GenerationConfig {
                temperature: request.model.temperature,
                response_mime_type: match request.response_format {
                    ResponseFormat::Json => Some("application/json".to_string()),
                    ResponseFormat::Text => None,
                },
            },
        }
    }
}

fn to_part(block: &ContentBlock) -> GeminiPart {
    match block {
        ContentBlock::Text(text) => GeminiPart::Text { text: text.clone() },
        ContentBlock::Image(image) => GeminiPart::InlineData {
            inline_data: InlineData {
                mime_type: image.media_type.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(&image.data),
            },
        },
    }
}

#[async_trait::async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    fn supported_models(&self) -> HashSet<Model> {
        HashSet::from([Model::Gemini25Flash, Model::Gemini25Pro, Model::Gemini20Flash])
    }

    async fn converse(
        &self,
        request: ConversationRequest,
    ) -> Result<ConversationResponse, AiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::Terminal(anyhow::anyhow!("API Key is missing")))?;

        let model = request.model.model;
        if !self.supported_models().contains(&model) {
            return Err(AiError::Terminal(anyhow::anyhow!(
                "Model {} is not supported by Gemini",
                model.name()
            )));
        }

        let body = Self::build_request(&request);
        debug!(model = %model, messages = body.contents.len(), "Calling Gemini API");

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url,
                model.name()
            ))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                debug!(?e, "Gemini API call failed");
                AiError::Retryable(anyhow::anyhow!("Network error: {}", e))
            })?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| AiError::Retryable(anyhow::anyhow!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            debug!(?status, ?response_text, "Gemini API returned error");
            let error = anyhow::anyhow!("Gemini API error {}: {}", status, response_text);
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(AiError::Retryable(error));
            }
            return Err(AiError::Terminal(error));
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text).map_err(|e| {
            AiError::Terminal(anyhow::anyhow!(
                "Failed to parse Gemini response: {} - Response: {}",
                e,
                response_text
            ))
        })?;

        if let Some(feedback) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AiError::Terminal(anyhow::anyhow!(
                "Prompt blocked by Gemini: {feedback}"
            )));
        }

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Terminal(anyhow::anyhow!("No candidates in response")))?;

        let stop_reason = match candidate.finish_reason.as_deref() {
            Some("MAX_TOKENS") => StopReason::MaxTokens,
            Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
                StopReason::Blocked(reason.to_string())
            }
            _ => StopReason::EndTurn,
        };

        let text: String = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = parsed
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_else(TokenUsage::empty);

        Ok(ConversationResponse {
            content: Content::text_only(text),
            usage,
            stop_reason,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_camel_case_and_json_mime() {
        let request = ConversationRequest::new(
            Model::Gemini25Flash.default_settings().with_temperature(0.7),
            "你正在扮演 小林",
        )
        .with_message(Message::user(Content::new(vec![
            ContentBlock::Text("看看这个".to_string()),
            ContentBlock::Image(ImageData {
                media_type: "image/png".to_string(),
                data: vec![1, 2, 3],
            }),
        ])))
        .json();

        let value = serde_json::to_value(GeminiProvider::build_request(&request)).unwrap();
        assert_eq!(
            value["systemInstruction"]["parts"][0]["text"],
            "你正在扮演 小林"
        );
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][1]["inlineData"]["data"], "AQID");
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(value["generationConfig"]["temperature"].as_f64().is_some());
    }

    #[test]
    fn test_response_text_is_joined_across_parts() {
        let raw = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "在"}, {"text": "|||忙着呢"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4}
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        let parts = parsed.candidates[0].content.as_ref().unwrap();
        let text: String = parts.parts.iter().filter_map(|p| p.text.clone()).collect();
        assert_eq!(text, "在|||忙着呢");
        assert_eq!(parsed.usage_metadata.unwrap().prompt_token_count, 12);
    }

    #[tokio::test]
    async fn test_missing_key_is_terminal() {
        let provider = GeminiProvider {
            client: Client::new(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        };
        let request = ConversationRequest::new(Model::Gemini25Flash.default_settings(), "")
            .with_message(Message::user("hi"));
        let result = provider.converse(request).await;
        assert!(matches!(result, Err(AiError::Terminal(_))));
    }
}

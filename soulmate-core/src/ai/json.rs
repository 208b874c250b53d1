//! Lenient parsing of JSON objects returned by models.
//!
//! Models asked for JSON frequently wrap it in markdown fences or add a
//! sentence before the object. These helpers pull out the first object and
//! deserialize it.

use serde::de::DeserializeOwned;

use crate::ai::error::AiError;

/// Strip ```json fences and any text around the outermost `{ ... }`.
pub fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

pub fn parse_object<T: DeserializeOwned>(raw: &str) -> Result<T, AiError> {
    let body = extract_object(raw).ok_or_else(|| {
        AiError::Terminal(anyhow::anyhow!("Response did not contain a JSON object: {raw}"))
    })?;
    Ok(serde_json::from_str(body)?)
}

//! Conversion between local files, `data:` URLs and inline image payloads.

use std::path::{Path, PathBuf};

use base64::Engine;
use thiserror::Error;

use crate::ai::types::ImageData;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a data URL")]
    NotDataUrl,

    #[error("Malformed data URL: {0}")]
    Malformed(&'static str),

    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

pub fn is_data_url(reference: &str) -> bool {
    reference.starts_with("data:")
}

pub fn encode_data_url(media_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        media_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Read a file into a `data:` URL usable directly as an image source.
pub fn read_data_url(path: &Path) -> Result<String, MediaError> {
    let bytes = std::fs::read(path).map_err(|source| MediaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let media_type = mime_guess::from_path(path).first_or_octet_stream();
    Ok(encode_data_url(media_type.essence_str(), &bytes))
}

/// Recover the binary payload of a base64 `data:` URL.
pub fn decode_data_url(reference: &str) -> Result<ImageData, MediaError> {
    let rest = reference
        .strip_prefix("data:")
        .ok_or(MediaError::NotDataUrl)?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or(MediaError::Malformed("missing ',' separator"))?;
    let media_type = header
        .strip_suffix(";base64")
        .ok_or(MediaError::Malformed("only base64 payloads are supported"))?;

    let data = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
    Ok(ImageData {
        media_type: if media_type.is_empty() {
            "application/octet-stream".to_string()
        } else {
            media_type.to_string()
        },
        data,
    })
}

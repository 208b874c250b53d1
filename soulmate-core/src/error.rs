use thiserror::Error;

use crate::id::{CharacterId, MessageId, MomentId};
use crate::media::MediaError;

/// Failures surfaced to callers of session operations.
///
/// Generation failures never appear here: they are converted to a fallback
/// message (chat), a fallback post (moments) or a silent skip (memory, scene).
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No active character is selected")]
    NoActiveCharacter,

    #[error("Unknown character: {0}")]
    UnknownCharacter(CharacterId),

    #[error("Input is empty")]
    EmptyInput,

    #[error("Invalid transfer amount: {0}")]
    InvalidAmount(f64),

    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("Moment not found: {0}")]
    MomentNotFound(MomentId),

    #[error(transparent)]
    Media(#[from] MediaError),
}

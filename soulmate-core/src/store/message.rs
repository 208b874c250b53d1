use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::MessageId;

/// Partitions one character's log into two sub-histories that never
/// interleave in a given view.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Scene {
    Phone,
    Activity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image { media_ref: String },
    Transfer { amount: f64 },
    Sticker { media_ref: String },
}

impl MessageKind {
    /// The media reference carried by image-bearing kinds.
    pub fn media_ref(&self) -> Option<&str> {
        match self {
            MessageKind::Image { media_ref } | MessageKind::Sticker { media_ref } => {
                Some(media_ref)
            }
            MessageKind::Text | MessageKind::Transfer { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    /// Display text. For non-text kinds this is the synthesized label.
    pub text: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    pub scene: Scene,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>, kind: MessageKind, scene: Scene) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            text: text.into(),
            kind,
            timestamp: Utc::now(),
            scene,
        }
    }

    pub fn user_text(text: impl Into<String>, scene: Scene) -> Self {
        Self::new(Sender::User, text, MessageKind::Text, scene)
    }

    pub fn ai(text: impl Into<String>, scene: Scene) -> Self {
        Self::new(Sender::Ai, text, MessageKind::Text, scene)
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}

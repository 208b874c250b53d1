//! Turn orchestration: a user action becomes a committed user message, one
//! generation call and one or more paced AI messages.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ai::{
    generate_text, ContentBlock, ConversationRequest, ImageData, Message as AiMessage,
    ModelSettings,
};
use crate::character::{Character, UserProfile};
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::id::{CharacterId, MessageId};
use crate::media::{decode_data_url, is_data_url};
use crate::prompt::{self, MESSAGE_DELIMITER};
use crate::session::Session;
use crate::store::{Message, MessageKind, Scene, Sender};
use crate::tasks::TaskTarget;

pub mod config;

/// Posted as the reply when generation fails for any reason.
pub const FALLBACK_REPLY: &str = "(网络小差，请重试)";
/// Posted when the model answers with nothing.
pub const EMPTY_REPLY: &str = "...";
/// Stands in for the user's line when regenerating with no earlier user message.
pub const CONTINUE_PROMPT: &str = "（继续）";

pub const IMAGE_LABEL: &str = "[图片]";
pub const STICKER_LABEL: &str = "[表情]";

pub fn transfer_label(amount: f64) -> String {
    format!("转账 ¥{amount:.2}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserInput {
    Text { text: String },
    Image { media_ref: String },
    Transfer { amount: f64 },
    Sticker { media_ref: String },
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Validate and turn into the message that gets stored, plus the decoded
    /// image when the reference is inline.
    fn into_message(self, scene: Scene) -> Result<(Message, Option<ImageData>), SessionError> {
        let (text, kind) = match self {
            UserInput::Text { text } => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(SessionError::EmptyInput);
                }
                (text.to_string(), MessageKind::Text)
            }
            UserInput::Transfer { amount } => {
                if !amount.is_finite() || amount <= 0.0 {
                    return Err(SessionError::InvalidAmount(amount));
                }
                (transfer_label(amount), MessageKind::Transfer { amount })
            }
            UserInput::Image { media_ref } => {
                (IMAGE_LABEL.to_string(), MessageKind::Image { media_ref })
            }
            UserInput::Sticker { media_ref } => {
                (STICKER_LABEL.to_string(), MessageKind::Sticker { media_ref })
            }
        };

        let image = match kind.media_ref() {
            Some(reference) if reference.trim().is_empty() => {
                return Err(SessionError::EmptyInput)
            }
            Some(reference) if is_data_url(reference) => Some(decode_data_url(reference)?),
            _ => None,
        };

        Ok((Message::new(Sender::User, text, kind, scene), image))
    }
}

/// Split a raw reply into the messages to post.
///
/// Phone replies fan out on `|||` into trimmed non-empty parts. Activity
/// replies are always a single message carrying the raw text. A reply with
/// nothing in it becomes [`EMPTY_REPLY`].
pub fn split_reply(raw: &str, scene: Scene) -> Vec<String> {
    match scene {
        Scene::Phone => {
            let parts: Vec<String> = raw
                .split(MESSAGE_DELIMITER)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect();
            if parts.is_empty() {
                vec![EMPTY_REPLY.to_string()]
            } else {
                parts
            }
        }
        Scene::Activity => {
            if raw.trim().is_empty() {
                vec![EMPTY_REPLY.to_string()]
            } else {
                vec![raw.to_string()]
            }
        }
    }
}

/// The decoded payload of an image-bearing message with an inline reference.
fn inline_image(message: &Message) -> Option<ImageData> {
    let reference = message.kind.media_ref().filter(|r| is_data_url(r))?;
    decode_data_url(reference)
        .map_err(|e| warn!(?e, message_id = %message.id, "Dropping undecodable image"))
        .ok()
}

struct ChatContext<'a> {
    character: &'a Character,
    user: &'a UserProfile,
    scene: Scene,
    location: Option<&'a str>,
}

fn chat_request(
    model: ModelSettings,
    context: ChatContext<'_>,
    history: &[Message],
    prompt_text: &str,
    image: Option<ImageData>,
) -> ConversationRequest {
    let system_prompt = prompt::chat_system_prompt(
        context.character,
        context.user,
        context.scene,
        context.location,
    );
    let mut blocks = vec![ContentBlock::Text(prompt::chat_turn(
        &context.character.name,
        history,
        prompt_text,
    ))];
    if let Some(image) = image {
        blocks.push(ContentBlock::Image(image));
    }
    ConversationRequest::new(model, system_prompt).with_message(AiMessage::user(blocks))
}

/// One in-flight generation and where its reply goes.
struct Turn {
    character_id: CharacterId,
    scene: Scene,
    /// Replies are dropped once this is gone.
    anchor: TaskTarget,
    /// The part posted last; later parts are dropped once it is gone.
    last_delivered: Option<MessageId>,
    request: ConversationRequest,
}

impl Session {
    /// Commit a user message for the active character and start generating
    /// the reply. Returns once the user message is stored.
    ///
    /// The reply is generated on the current tokio runtime. Called outside
    /// one, the message is still stored but no reply follows.
    pub fn submit_user_turn(
        &self,
        input: UserInput,
        scene: Scene,
    ) -> Result<MessageId, SessionError> {
        self.state().active()?;
        let (message, image) = input.into_message(scene)?;
        let model = self.settings.settings().chat_model();

        let (character_id, message, request) = {
            let mut state = self.state();
            let character = state.active()?.clone();
            let message = state.store.append(&character.id, message);
            let history = state.store.list_by_scene(&character.id, scene);
            let location = state.scene.current().map(|b| b.name.clone());
            let request = chat_request(
                model,
                ChatContext {
                    character: &character,
                    user: &state.user,
                    scene,
                    location: location.as_deref(),
                },
                &history,
                &message.text,
                image,
            );
            (character.id, message, request)
        };

        info!(
            character_id = %character_id,
            message_id = %message.id,
            %scene,
            "User message committed"
        );
        self.events.message_added(&character_id, &message);

        self.maybe_compact(&character_id);
        if scene == Scene::Activity {
            self.maybe_infer_scene(&character_id);
        }

        self.spawn_turn(Turn {
            character_id,
            scene,
            anchor: TaskTarget::Message(message.id.clone()),
            last_delivered: None,
            request,
        });
        Ok(message.id)
    }

    /// Discard `message_id` and everything after it in its scene, then
    /// generate a fresh reply from what is left. Like
    /// [`Session::submit_user_turn`], the reply needs a tokio runtime.
    pub fn regenerate(&self, message_id: &MessageId) -> Result<(), SessionError> {
        let model = self.settings.settings().chat_model();

        let (character_id, scene, removed, anchor, request) = {
            let mut state = self.state();
            let character = state.active()?.clone();
            let scene = match state.store.find_by_id(message_id) {
                Some((owner, message)) if owner == &character.id => message.scene,
                _ => return Err(SessionError::MessageNotFound(message_id.clone())),
            };

            let history = state.store.list_by_scene(&character.id, scene);
            let index = history
                .iter()
                .position(|m| &m.id == message_id)
                .ok_or_else(|| SessionError::MessageNotFound(message_id.clone()))?;
            let kept = &history[..index];

            let last_user = kept.iter().rev().find(|m| m.is_user());
            let prompt_text = last_user
                .map(|m| m.text.clone())
                .unwrap_or_else(|| CONTINUE_PROMPT.to_string());
            let image = last_user.and_then(inline_image);
            let anchor = match kept.last() {
                Some(m) => TaskTarget::Message(m.id.clone()),
                None => TaskTarget::Character(character.id.clone()),
            };

            let location = state.scene.current().map(|b| b.name.clone());
            let request = chat_request(
                model,
                ChatContext {
                    character: &character,
                    user: &state.user,
                    scene,
                    location: location.as_deref(),
                },
                kept,
                &prompt_text,
                image,
            );

            let removed = state
                .store
                .truncate_scene_from(message_id)
                .unwrap_or_default();
            (character.id, scene, removed, anchor, request)
        };

        info!(
            character_id = %character_id,
            message_id = %message_id,
            removed = removed.len(),
            "Regenerating"
        );
        self.events.send(SessionEvent::MessagesRemoved {
            character_id: character_id.clone(),
            message_ids: removed,
        });

        self.spawn_turn(Turn {
            character_id,
            scene,
            anchor,
            last_delivered: None,
            request,
        });
        Ok(())
    }

    /// Replace a message's text in place. No reply is generated.
    pub fn edit_message(&self, message_id: &MessageId, text: &str) -> Result<Message, SessionError> {
        let (character_id, message) = {
            let mut state = self.state();
            let character_id = state.active()?.id.clone();
            let text = text.trim();
            if text.is_empty() {
                return Err(SessionError::EmptyInput);
            }
            if !matches!(state.store.find_by_id(message_id), Some((owner, _)) if owner == &character_id)
            {
                return Err(SessionError::MessageNotFound(message_id.clone()));
            }
            let message = state
                .store
                .replace_text(message_id, text.to_string())
                .ok_or_else(|| SessionError::MessageNotFound(message_id.clone()))?;
            (character_id, message)
        };

        self.events.send(SessionEvent::MessageEdited {
            character_id,
            message: message.clone(),
        });
        Ok(message)
    }

    pub fn delete_message(&self, message_id: &MessageId) -> Result<(), SessionError> {
        let character_id = {
            let mut state = self.state();
            let character_id = state.active()?.id.clone();
            if !matches!(state.store.find_by_id(message_id), Some((owner, _)) if owner == &character_id)
            {
                return Err(SessionError::MessageNotFound(message_id.clone()));
            }
            state.store.remove(message_id);
            character_id
        };

        self.events.send(SessionEvent::MessagesRemoved {
            character_id,
            message_ids: vec![message_id.clone()],
        });
        Ok(())
    }

    fn spawn_turn(&self, turn: Turn) {
        let target = turn.anchor.clone();
        self.schedule(target, None, "chat_turn", move |session| async move {
            session.run_turn(turn).await;
        });
    }

    async fn run_turn(&self, mut turn: Turn) {
        let pacing = self.settings.settings().pacing;
        self.events.set_typing(&turn.character_id, true);

        let parts = match generate_text(self.provider.as_ref(), turn.request.clone()).await {
            Ok(raw) => split_reply(&raw, turn.scene),
            Err(e) => {
                warn!(?e, character_id = %turn.character_id, "Generation failed, posting fallback");
                vec![FALLBACK_REPLY.to_string()]
            }
        };

        for (index, part) in parts.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(pacing.reply_delay()).await;
            }
            match self.deliver(&turn, part) {
                Some(id) => turn.last_delivered = Some(id),
                None => {
                    debug!(anchor = %turn.anchor, "Anchor gone, dropping the rest of the reply");
                    break;
                }
            }
        }

        self.events.set_typing(&turn.character_id, false);
    }

    /// Append one reply message unless the turn's anchor or its previous
    /// part has disappeared.
    fn deliver(&self, turn: &Turn, text: String) -> Option<MessageId> {
        let message = {
            let mut state = self.state();
            if !state.exists(&turn.anchor) {
                return None;
            }
            if let Some(previous) = &turn.last_delivered {
                if state.store.find_by_id(previous).is_none() {
                    return None;
                }
            }
            state
                .store
                .append(&turn.character_id, Message::ai(text, turn.scene))
        };

        self.events.message_added(&turn.character_id, &message);
        if turn.scene == Scene::Activity {
            self.maybe_infer_scene(&turn.character_id);
        }
        Some(message.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("在|||忙着呢|||怎么了", vec!["在", "忙着呢", "怎么了"])]
    #[case(" 在 ||| |||  怎么了 ", vec!["在", "怎么了"])]
    #[case("就一条", vec!["就一条"])]
    #[case("|||", vec!["..."])]
    #[case("", vec!["..."])]
    fn test_split_phone(#[case] raw: &str, #[case] expected: Vec<&str>) {
        assert_eq!(split_reply(raw, Scene::Phone), expected);
    }

    #[test]
    fn test_activity_keeps_raw_text() {
        assert_eq!(
            split_reply("(笑) 好啊|||走吧", Scene::Activity),
            vec!["(笑) 好啊|||走吧"]
        );
        assert_eq!(split_reply("  ", Scene::Activity), vec!["..."]);
    }

    #[rstest]
    #[case(52.0, "转账 ¥52.00")]
    #[case(0.1, "转账 ¥0.10")]
    #[case(1314.5, "转账 ¥1314.50")]
    fn test_transfer_label(#[case] amount: f64, #[case] expected: &str) {
        assert_eq!(transfer_label(amount), expected);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-5.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_rejects_bad_amounts(#[case] amount: f64) {
        let result = UserInput::Transfer { amount }.into_message(Scene::Phone);
        assert!(matches!(result, Err(SessionError::InvalidAmount(_))));
    }

    #[test]
    fn test_input_labels_and_inline_images() {
        let (message, image) = UserInput::Image {
            media_ref: "data:image/png;base64,AQID".to_string(),
        }
        .into_message(Scene::Phone)
        .unwrap();
        assert_eq!(message.text, IMAGE_LABEL);
        assert_eq!(image.unwrap().data, vec![1, 2, 3]);

        let (message, image) = UserInput::Sticker {
            media_ref: "https://files.catbox.moe/oqpdk2.jpg".to_string(),
        }
        .into_message(Scene::Activity)
        .unwrap();
        assert_eq!(message.text, STICKER_LABEL);
        assert_eq!(message.scene, Scene::Activity);
        assert!(image.is_none());

        assert!(matches!(
            UserInput::text("   ").into_message(Scene::Phone),
            Err(SessionError::EmptyInput)
        ));
        assert!(matches!(
            UserInput::Image {
                media_ref: "data:image/png;base64,@@".to_string()
            }
            .into_message(Scene::Phone),
            Err(SessionError::Media(_))
        ));
    }
}

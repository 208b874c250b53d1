//! The moment feed: short social posts by characters or the user, with likes
//! and comment threads that characters answer on their own.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ai::json::parse_object;
use crate::ai::{generate_text, AiProvider, ConversationRequest, Message as AiMessage, ModelSettings};
use crate::character::Character;
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::id::{CharacterId, MomentId};
use crate::prompt;
use crate::session::Session;
use crate::tasks::TaskTarget;

pub const FALLBACK_MOMENT: &str = "今天心情很好！☀️";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum MomentAuthor {
    User,
    Character(CharacterId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Display name of the commenter.
    pub author: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moment {
    pub id: MomentId,
    pub author: MomentAuthor,
    pub content: String,
    pub images: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// Names of everyone who liked the post, in the order they liked it.
    pub likes: Vec<String>,
    pub comments: Vec<Comment>,
}

impl Moment {
    pub fn new(author: MomentAuthor, content: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            id: MomentId::new(),
            author,
            content: content.into(),
            images,
            timestamp: Utc::now(),
            likes: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Add `liker` if absent, remove it if present.
    pub fn toggle_like(&mut self, liker: &str) -> &[String] {
        match self.likes.iter().position(|name| name == liker) {
            Some(index) => {
                self.likes.remove(index);
            }
            None => self.likes.push(liker.to_string()),
        }
        &self.likes
    }
}

/// Most recent first.
#[derive(Debug, Default)]
pub struct MomentFeed {
    moments: Vec<Moment>,
}

impl MomentFeed {
    pub fn from_moments(moments: Vec<Moment>) -> Self {
        Self { moments }
    }

    pub fn prepend(&mut self, moment: Moment) {
        self.moments.insert(0, moment);
    }

    pub fn get(&self, id: &MomentId) -> Option<&Moment> {
        self.moments.iter().find(|m| &m.id == id)
    }

    pub fn get_mut(&mut self, id: &MomentId) -> Option<&mut Moment> {
        self.moments.iter_mut().find(|m| &m.id == id)
    }

    pub fn remove(&mut self, id: &MomentId) -> Option<Moment> {
        let index = self.moments.iter().position(|m| &m.id == id)?;
        Some(self.moments.remove(index))
    }

    pub fn list(&self) -> &[Moment] {
        &self.moments
    }
}

/// The post a fresh session's feed starts with.
pub fn default_feed() -> Vec<Moment> {
    let mut moment = Moment::new(
        MomentAuthor::Character(CharacterId::from("1")),
        "晚霞的颜色让我想起我们一起看过的那幅画……",
        vec!["https://picsum.photos/seed/art/300/300".to_string()],
    );
    moment.timestamp -= chrono::Duration::seconds(1000);
    moment.likes.push("我".to_string());
    vec![moment]
}

#[derive(Deserialize)]
struct MomentPost {
    content: String,
}

/// A first-person post in `character`'s voice. `None` when generation fails
/// or the answer has no content; callers post [`FALLBACK_MOMENT`] instead.
pub async fn generate_moment_content(
    provider: &dyn AiProvider,
    model: ModelSettings,
    character: &Character,
) -> Option<String> {
    let request = ConversationRequest::new(model, prompt::moment_system_prompt(character))
        .with_message(AiMessage::user(prompt::moment_turn(character)))
        .json();

    let raw = match generate_text(provider, request).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(?e, character_id = %character.id, "Moment generation failed");
            return None;
        }
    };
    match parse_object::<MomentPost>(&raw) {
        Ok(post) if !post.content.trim().is_empty() => Some(post.content.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            warn!(?e, "Moment answer was not usable");
            None
        }
    }
}

impl Session {
    pub fn moments(&self) -> Vec<Moment> {
        self.state().feed.list().to_vec()
    }

    pub fn moment(&self, id: &MomentId) -> Option<Moment> {
        self.state().feed.get(id).cloned()
    }

    /// Post on the feed as the user or on behalf of a character.
    pub fn create_moment(
        &self,
        author: MomentAuthor,
        text: &str,
        image_ref: Option<String>,
    ) -> Result<Moment, SessionError> {
        let text = text.trim();
        if text.is_empty() && image_ref.is_none() {
            return Err(SessionError::EmptyInput);
        }

        let moment = Moment::new(author, text, image_ref.into_iter().collect());
        {
            let mut state = self.state();
            if let MomentAuthor::Character(id) = &moment.author {
                if state.character(id).is_none() {
                    return Err(SessionError::UnknownCharacter(id.clone()));
                }
            }
            state.feed.prepend(moment.clone());
        }

        info!(moment_id = %moment.id, "Moment posted");
        self.events.send(SessionEvent::MomentAdded(moment.clone()));
        Ok(moment)
    }

    /// Generate a post for `character_id` and prepend it to the feed.
    pub async fn generate_moment(&self, character_id: &CharacterId) -> Result<Moment, SessionError> {
        let character = self
            .character(character_id)
            .ok_or_else(|| SessionError::UnknownCharacter(character_id.clone()))?;

        let generated = generate_moment_content(
            self.provider.as_ref(),
            self.settings.settings().utility_model(),
            &character,
        )
        .await;

        let mut moment = Moment::new(
            MomentAuthor::Character(character.id.clone()),
            FALLBACK_MOMENT,
            Vec::new(),
        );
        if let Some(content) = generated {
            moment.content = content;
            moment
                .images
                .push(format!("https://picsum.photos/seed/{}/400/300", moment.id));
        }

        self.state().feed.prepend(moment.clone());
        info!(moment_id = %moment.id, character_id = %character.id, "Moment generated");
        self.events.send(SessionEvent::MomentAdded(moment.clone()));
        Ok(moment)
    }

    /// Let a uniformly random character post. `None` with an empty roster.
    pub async fn refresh_moments(&self) -> Result<Option<Moment>, SessionError> {
        let chosen = {
            let state = self.state();
            state
                .characters
                .choose(&mut rand::thread_rng())
                .map(|c| c.id.clone())
        };
        match chosen {
            Some(id) => self.generate_moment(&id).await.map(Some),
            None => Ok(None),
        }
    }

    pub fn toggle_like(&self, id: &MomentId, liker: &str) -> Result<Vec<String>, SessionError> {
        let moment = {
            let mut state = self.state();
            let moment = state
                .feed
                .get_mut(id)
                .ok_or_else(|| SessionError::MomentNotFound(id.clone()))?;
            moment.toggle_like(liker);
            moment.clone()
        };
        let likes = moment.likes.clone();
        self.events.send(SessionEvent::MomentUpdated(moment));
        Ok(likes)
    }

    /// Append a comment now; the post's responder answers it after a delay.
    /// The answer is only scheduled when called inside a tokio runtime.
    pub fn add_comment(
        &self,
        id: &MomentId,
        author: &str,
        text: &str,
    ) -> Result<Moment, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput);
        }

        let (moment, reply_job) = {
            let mut state = self.state();
            let (post, responder, post_author) = {
                let moment = state
                    .feed
                    .get(id)
                    .ok_or_else(|| SessionError::MomentNotFound(id.clone()))?;
                match &moment.author {
                    MomentAuthor::Character(character_id) => {
                        let responder = state.character(character_id).cloned();
                        let name = responder
                            .as_ref()
                            .map(|c| c.name.clone())
                            .unwrap_or_default();
                        (moment.content.clone(), responder, name)
                    }
                    MomentAuthor::User => (
                        moment.content.clone(),
                        state.characters.choose(&mut rand::thread_rng()).cloned(),
                        state.user.name.clone(),
                    ),
                }
            };

            let moment = state
                .feed
                .get_mut(id)
                .ok_or_else(|| SessionError::MomentNotFound(id.clone()))?;
            moment.comments.push(Comment {
                author: author.to_string(),
                content: text.to_string(),
            });
            let reply_job = responder
                .filter(|c| c.name != author)
                .map(|c| (c, post, post_author));
            (moment.clone(), reply_job)
        };

        self.events.send(SessionEvent::MomentUpdated(moment.clone()));

        if let Some((responder, post, post_author)) = reply_job {
            self.schedule_comment_reply(id, responder, post, post_author, author, text);
        }
        Ok(moment)
    }

    fn schedule_comment_reply(
        &self,
        id: &MomentId,
        responder: Character,
        post: String,
        post_author: String,
        comment_author: &str,
        comment: &str,
    ) {
        let delay = self.settings.settings().pacing.comment_reply_delay();
        let request = ConversationRequest::new(
            self.settings.settings().utility_model(),
            prompt::comment_reply_system_prompt(&responder),
        )
        .with_message(AiMessage::user(prompt::comment_reply_turn(
            &post_author,
            &post,
            comment_author,
            comment,
        )));
        let moment_id = id.clone();

        self.schedule(
            TaskTarget::Moment(id.clone()),
            Some(delay),
            "comment_reply",
            move |session| async move {
                let reply = match generate_text(session.provider.as_ref(), request).await {
                    Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
                    Ok(_) => return,
                    Err(e) => {
                        warn!(?e, moment_id = %moment_id, "Comment reply failed");
                        return;
                    }
                };

                let updated = {
                    let mut state = session.state();
                    state.feed.get_mut(&moment_id).map(|moment| {
                        moment.comments.push(Comment {
                            author: responder.name.clone(),
                            content: reply,
                        });
                        moment.clone()
                    })
                };
                if let Some(moment) = updated {
                    session.events.send(SessionEvent::MomentUpdated(moment));
                }
            },
        );
    }

    pub fn delete_moment(&self, id: &MomentId) -> Result<(), SessionError> {
        self.state()
            .feed
            .remove(id)
            .ok_or_else(|| SessionError::MomentNotFound(id.clone()))?;
        self.events.send(SessionEvent::MomentRemoved {
            moment_id: id.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::{MockBehavior, MockProvider};
    use crate::ai::model::Model;

    #[test]
    fn test_toggle_like_round_trip() {
        let mut moment = Moment::new(MomentAuthor::User, "hi", vec![]);
        assert_eq!(moment.toggle_like("我"), ["我"]);
        assert_eq!(moment.toggle_like("阿青"), ["我", "阿青"]);
        assert_eq!(moment.toggle_like("我"), ["阿青"]);
        assert!(moment.toggle_like("阿青").is_empty());
    }

    #[test]
    fn test_feed_prepends() {
        let mut feed = MomentFeed::default();
        let first = Moment::new(MomentAuthor::User, "first", vec![]);
        let second = Moment::new(MomentAuthor::User, "second", vec![]);
        let first_id = first.id.clone();
        feed.prepend(first);
        feed.prepend(second);

        assert_eq!(feed.list()[0].content, "second");
        assert!(feed.remove(&first_id).is_some());
        assert!(feed.get(&first_id).is_none());
    }

    #[tokio::test]
    async fn test_generated_content_parses_json() {
        let provider = MockProvider::new(MockBehavior::reply(
            "```json\n{\"content\": \"刚开完会，累。\"}\n```",
        ));
        let character = Character::new("阿青");
        let content =
            generate_moment_content(&provider, Model::None.default_settings(), &character).await;
        assert_eq!(content.as_deref(), Some("刚开完会，累。"));
    }

    #[tokio::test]
    async fn test_generated_content_rejects_missing_field() {
        let provider = MockProvider::new(MockBehavior::reply("{\"text\": \"x\"}"));
        let character = Character::new("阿青");
        let content =
            generate_moment_content(&provider, Model::None.default_settings(), &character).await;
        assert_eq!(content, None);
    }
}

//! Memory compaction.
//!
//! Long conversations are periodically condensed into short timestamped
//! entries on the character. The entries are fed back into every chat
//! prompt, so a character remembers what happened long after the raw
//! messages have scrolled out of the transcript window.

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::ai::{generate_text, AiError, AiProvider, ConversationRequest, Message as AiMessage, ModelSettings};
use crate::events::SessionEvent;
use crate::id::CharacterId;
use crate::prompt;
use crate::session::Session;
use crate::store::Message;
use crate::tasks::TaskTarget;

pub mod config;

/// Condense `messages` into one 50 to 100 character summary.
pub async fn summarize(
    provider: &dyn AiProvider,
    model: ModelSettings,
    character_name: &str,
    user_name: &str,
    messages: &[Message],
) -> Result<String, AiError> {
    let request = ConversationRequest::new(model, prompt::summary_system_prompt()).with_message(
        AiMessage::user(prompt::summary_turn(character_name, user_name, messages)),
    );
    Ok(generate_text(provider, request).await?.trim().to_string())
}

pub fn format_memory_entry(at: DateTime<Local>, summary: &str) -> String {
    format!("【{}】 {}", at.format("%Y/%m/%d %H:%M:%S"), summary)
}

/// Positive multiples of `interval` only.
pub fn is_compaction_point(count: usize, interval: usize) -> bool {
    interval > 0 && count > 0 && count % interval == 0
}

impl Session {
    /// Called after every user message append.
    pub(crate) fn maybe_compact(&self, character_id: &CharacterId) {
        let config = self.settings.settings().memory;
        if !config.enabled {
            return;
        }

        let job = {
            let state = self.state();
            let count = state.store.count(character_id);
            if !is_compaction_point(count, config.interval) {
                return;
            }
            state.character(character_id).map(|character| {
                (
                    character.name.clone(),
                    state.user.name.clone(),
                    state.store.last_n(character_id, config.window),
                    count,
                )
            })
        };
        let Some((character_name, user_name, window, count)) = job else {
            return;
        };

        info!(character_id = %character_id, count, window = window.len(), "Compacting memory");
        let character_id = character_id.clone();
        self.schedule(
            TaskTarget::Character(character_id.clone()),
            None,
            "compact_memory",
            move |session| async move {
                let result = summarize(
                    session.provider.as_ref(),
                    session.settings.settings().utility_model(),
                    &character_name,
                    &user_name,
                    &window,
                )
                .await;

                match result {
                    Ok(summary) if !summary.is_empty() => {
                        session.append_memory(&character_id, &summary);
                    }
                    Ok(_) => debug!(character_id = %character_id, "Empty summary, skipping"),
                    Err(e) => warn!(?e, character_id = %character_id, "Memory compaction failed"),
                }
            },
        );
    }

    fn append_memory(&self, character_id: &CharacterId, summary: &str) {
        let entry = format_memory_entry(Local::now(), summary);
        {
            let mut state = self.state();
            let Some(character) = state.character_mut(character_id) else {
                return;
            };
            character.memory.push(entry.clone());
        }
        self.events.send(SessionEvent::MemoryAppended {
            character_id: character_id.clone(),
            entry,
        });
    }
}

//! Scene inference: pick an activity background from the curated library
//! based on what the conversation is about.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ai::json::extract_object;
use crate::ai::{generate_text, AiProvider, ConversationRequest, Message as AiMessage, ModelSettings};
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::id::CharacterId;
use crate::library::BackgroundItem;
use crate::prompt;
use crate::session::Session;
use crate::store::{Message, Scene};
use crate::tasks::TaskTarget;

pub mod config;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedBackground {
    pub name: String,
    pub image_ref: String,
}

/// Exact name, then substring either way, then the first library entry.
/// An empty library yields a placeholder image derived from the name.
pub fn resolve_background(name: &str, library: &[BackgroundItem]) -> ResolvedBackground {
    let name = name.trim();
    let found = library
        .iter()
        .find(|item| item.name == name)
        .or_else(|| {
            library.iter().find(|item| {
                !name.is_empty() && (item.name.contains(name) || name.contains(item.name.as_str()))
            })
        })
        .or_else(|| library.first());

    match found {
        Some(item) => ResolvedBackground {
            name: item.name.clone(),
            image_ref: item.image_ref.clone(),
        },
        None => ResolvedBackground {
            name: name.to_string(),
            image_ref: format!("https://picsum.photos/seed/{name}/800/600"),
        },
    }
}

#[derive(Deserialize)]
struct SceneChoice {
    scene: String,
}

/// Accepts `{"scene": "..."}` (possibly fenced) or a bare name.
pub fn parse_scene_name(raw: &str) -> Option<String> {
    let name = match extract_object(raw) {
        Some(body) => serde_json::from_str::<SceneChoice>(body).ok()?.scene,
        None => raw.trim().trim_matches(|c: char| c == '"' || c == '“' || c == '”').to_string(),
    };
    let name = name.trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// Ask the model which library background fits `messages`. Never fails:
/// any error or unusable answer yields `fallback`.
pub async fn infer_scene(
    provider: &dyn AiProvider,
    model: ModelSettings,
    messages: &[Message],
    library: &[BackgroundItem],
    fallback: &str,
) -> String {
    let names: Vec<String> = library.iter().map(|b| b.name.clone()).collect();
    let request = ConversationRequest::new(model, prompt::scene_system_prompt(&names, fallback))
        .with_message(AiMessage::user(prompt::scene_turn(messages)))
        .json();

    match generate_text(provider, request).await {
        Ok(raw) => parse_scene_name(&raw).unwrap_or_else(|| {
            debug!(?raw, "Unusable scene answer");
            fallback.to_string()
        }),
        Err(e) => {
            warn!(?e, "Scene inference failed");
            fallback.to_string()
        }
    }
}

/// Current background plus bookkeeping for in-flight inferences.
#[derive(Debug, Default)]
pub struct SceneState {
    current: Option<ResolvedBackground>,
    issued: u64,
    applied: u64,
    in_flight: usize,
}

impl SceneState {
    pub fn current(&self) -> Option<&ResolvedBackground> {
        self.current.as_ref()
    }

    /// Fires on every positive multiple of `interval`, or when nothing is set
    /// and nothing is on its way.
    pub fn should_infer(&self, activity_count: usize, interval: usize) -> bool {
        let periodic = interval > 0 && activity_count > 0 && activity_count % interval == 0;
        periodic || (self.current.is_none() && self.in_flight == 0)
    }

    pub fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.in_flight += 1;
        self.issued
    }

    /// Apply a completed inference unless a newer one already landed.
    pub fn complete(&mut self, seq: u64, background: ResolvedBackground) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        if seq <= self.applied {
            return false;
        }
        self.applied = seq;
        self.current = Some(background);
        true
    }
}

impl Session {
    pub fn current_background(&self) -> Option<ResolvedBackground> {
        self.state().scene.current().cloned()
    }

    /// Switch the active character into the activity scene. Returns the
    /// background shown right now; a new one may follow as an event.
    ///
    /// Inference runs on the current tokio runtime. Without one the fallback
    /// background is shown instead.
    pub fn enter_activity(&self) -> Result<Option<ResolvedBackground>, SessionError> {
        let id = self.state().active()?.id.clone();
        self.maybe_infer_scene(&id);
        Ok(self.current_background())
    }

    pub(crate) fn maybe_infer_scene(&self, character_id: &CharacterId) {
        let config = self.settings.settings().scene;

        let (seq, messages, library) = {
            let mut state = self.state();
            let count = state.store.count_by_scene(character_id, Scene::Activity);
            if !state.scene.should_infer(count, config.interval) {
                return;
            }
            let seq = state.scene.begin();
            let messages = state.store.last_n_by_scene(
                character_id,
                Scene::Activity,
                config.history_window,
            );
            (seq, messages, state.backgrounds.clone())
        };

        if !config.enabled {
            let background = resolve_background(&config.fallback_name, &library);
            self.apply_background(seq, background);
            return;
        }

        debug!(character_id = %character_id, seq, "Inferring scene");
        let fallback = resolve_background(&config.fallback_name, &library);
        let scheduled = self.schedule(
            TaskTarget::Character(character_id.clone()),
            None,
            "infer_scene",
            move |session| async move {
                let name = infer_scene(
                    session.provider.as_ref(),
                    session.settings.settings().utility_model(),
                    &messages,
                    &library,
                    &config.fallback_name,
                )
                .await;
                let library = session.backgrounds();
                session.apply_background(seq, resolve_background(&name, &library));
            },
        );
        if !scheduled {
            self.apply_background(seq, fallback);
        }
    }

    fn apply_background(&self, seq: u64, background: ResolvedBackground) {
        let applied = self.state().scene.complete(seq, background.clone());
        if applied {
            info!(name = %background.name, seq, "Background changed");
            self.events.send(SessionEvent::BackgroundChanged(background));
        } else {
            debug!(seq, "Discarding stale scene inference");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::{MockBehavior, MockProvider};
    use crate::ai::model::Model;
    use crate::library::default_backgrounds;
    use rstest::rstest;

    #[rstest]
    #[case("海边", "海边")]
    #[case("在商场里逛街", "商场")]
    #[case("卧室", "夜晚卧室")]
    #[case("月球", "夜晚卧室")]
    #[case("", "夜晚卧室")]
    fn test_resolve_background(#[case] name: &str, #[case] expected: &str) {
        let resolved = resolve_background(name, &default_backgrounds());
        assert_eq!(resolved.name, expected);
    }

    #[test]
    fn test_resolve_with_empty_library_uses_placeholder() {
        let resolved = resolve_background("客厅", &[]);
        assert_eq!(resolved.name, "客厅");
        assert_eq!(resolved.image_ref, "https://picsum.photos/seed/客厅/800/600");
    }

    #[rstest]
    #[case("{\"scene\": \"海边\"}", Some("海边"))]
    #[case("```json\n{\"scene\":\"商场\"}\n```", Some("商场"))]
    #[case("  客厅 \n", Some("客厅"))]
    #[case("\"海边\"", Some("海边"))]
    #[case("{\"place\": \"海边\"}", None)]
    #[case("   ", None)]
    fn test_parse_scene_name(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_scene_name(raw).as_deref(), expected);
    }

    #[tokio::test]
    async fn test_infer_scene_falls_back_on_error() {
        let provider = MockProvider::new(MockBehavior::AlwaysRetryableError);
        let name = infer_scene(
            &provider,
            Model::None.default_settings(),
            &[Message::user_text("我们去海边吧", Scene::Activity)],
            &default_backgrounds(),
            "客厅",
        )
        .await;
        assert_eq!(name, "客厅");

        let request = provider.get_last_captured_request().unwrap();
        assert!(request.system_prompt.contains("夜晚卧室、海边、客厅、商场"));
        assert_eq!(request.messages[0].content.text(), "我们去海边吧");
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut state = SceneState::default();
        assert!(state.should_infer(0, 5));

        let first = state.begin();
        let second = state.begin();
        assert!(!state.should_infer(3, 5));
        assert!(state.should_infer(5, 5));

        let beach = resolve_background("海边", &default_backgrounds());
        let mall = resolve_background("商场", &default_backgrounds());
        assert!(state.complete(second, beach.clone()));
        assert!(!state.complete(first, mall));
        assert_eq!(state.current(), Some(&beach));
    }
}

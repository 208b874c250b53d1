//! The session: one logical actor owning the roster, every conversation log,
//! the moment feed and the scene state.
//!
//! `Session` is a cheap handle. Operations lock the shared state only for
//! short synchronous sections; generation calls run as tracked background
//! tasks that capture ids and re-read state when they complete.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::ai::mock::{MockBehavior, MockProvider};
use crate::ai::{provider_from_config, AiProvider};
use crate::character::{default_roster, Character, UserProfile};
use crate::error::SessionError;
use crate::events::{EventSender, SessionEvent};
use crate::id::CharacterId;
use crate::library::{default_backgrounds, default_stickers, BackgroundItem, Sticker};
use crate::moments::{Moment, MomentFeed};
use crate::scene::SceneState;
use crate::settings::{Settings, SettingsManager};
use crate::store::{ConversationStore, Message, Scene};
use crate::tasks::{TaskQueue, TaskTarget};

pub struct SessionState {
    pub characters: Vec<Character>,
    pub user: UserProfile,
    pub active_character: Option<CharacterId>,
    pub store: ConversationStore,
    pub feed: MomentFeed,
    pub backgrounds: Vec<BackgroundItem>,
    pub stickers: Vec<Sticker>,
    pub scene: SceneState,
}

impl SessionState {
    pub fn character(&self, id: &CharacterId) -> Option<&Character> {
        self.characters.iter().find(|c| &c.id == id)
    }

    pub fn character_mut(&mut self, id: &CharacterId) -> Option<&mut Character> {
        self.characters.iter_mut().find(|c| &c.id == id)
    }

    /// The active character, or why there is none.
    pub fn active(&self) -> Result<&Character, SessionError> {
        let id = self
            .active_character
            .as_ref()
            .ok_or(SessionError::NoActiveCharacter)?;
        self.character(id)
            .ok_or_else(|| SessionError::UnknownCharacter(id.clone()))
    }

    pub(crate) fn exists(&self, target: &TaskTarget) -> bool {
        match target {
            TaskTarget::Character(id) => self.character(id).is_some(),
            TaskTarget::Message(id) => self.store.contains(id),
            TaskTarget::Moment(id) => self.feed.get(id).is_some(),
        }
    }
}

#[derive(Clone)]
pub struct Session {
    pub(crate) state: Arc<Mutex<SessionState>>,
    pub(crate) provider: Arc<dyn AiProvider>,
    pub(crate) settings: SettingsManager,
    pub(crate) events: EventSender,
    pub(crate) tasks: TaskQueue,
}

pub struct SessionBuilder {
    provider: Option<Arc<dyn AiProvider>>,
    settings: Option<SettingsManager>,
    characters: Vec<Character>,
    user: UserProfile,
    backgrounds: Vec<BackgroundItem>,
    stickers: Vec<Sticker>,
    moments: Vec<Moment>,
    active_character: Option<CharacterId>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            provider: None,
            settings: None,
            characters: default_roster(),
            user: UserProfile::default(),
            backgrounds: default_backgrounds(),
            stickers: default_stickers(),
            moments: Vec::new(),
            active_character: None,
        }
    }
}

impl SessionBuilder {
    /// Use this provider instead of the one configured in settings.
    pub fn with_provider(mut self, provider: Arc<dyn AiProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_settings(mut self, settings: SettingsManager) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_characters(mut self, characters: Vec<Character>) -> Self {
        self.characters = characters;
        self
    }

    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.user = user;
        self
    }

    pub fn with_backgrounds(mut self, backgrounds: Vec<BackgroundItem>) -> Self {
        self.backgrounds = backgrounds;
        self
    }

    pub fn with_stickers(mut self, stickers: Vec<Sticker>) -> Self {
        self.stickers = stickers;
        self
    }

    /// Seed the feed. Given most recent first.
    pub fn with_moments(mut self, moments: Vec<Moment>) -> Self {
        self.moments = moments;
        self
    }

    pub fn with_active_character(mut self, id: CharacterId) -> Self {
        self.active_character = Some(id);
        self
    }

    pub fn build(self) -> (Session, mpsc::UnboundedReceiver<SessionEvent>) {
        let settings = self
            .settings
            .unwrap_or_else(|| SettingsManager::in_memory(Settings::default()));
        let provider = self
            .provider
            .unwrap_or_else(|| create_default_provider(&settings.settings()));
        let (events, event_rx) = EventSender::new();

        let state = SessionState {
            characters: self.characters,
            user: self.user,
            active_character: self.active_character,
            store: ConversationStore::new(),
            feed: MomentFeed::from_moments(self.moments),
            backgrounds: self.backgrounds,
            stickers: self.stickers,
            scene: SceneState::default(),
        };

        info!(
            provider = provider.name(),
            characters = state.characters.len(),
            "Session started"
        );

        let session = Session {
            state: Arc::new(Mutex::new(state)),
            provider,
            settings,
            events,
            tasks: TaskQueue::new(),
        };
        (session, event_rx)
    }
}

/// A session without a usable provider still runs: every generation fails
/// and degrades to its fallback.
fn create_default_provider(settings: &Settings) -> Arc<dyn AiProvider> {
    let Some(config) = settings.active_provider() else {
        warn!("No AI provider is configured");
        return Arc::new(MockProvider::new(MockBehavior::AlwaysNonRetryableError));
    };
    match provider_from_config(config) {
        Ok(provider) => provider,
        Err(e) => {
            error!(?e, "Failed to initialize provider");
            Arc::new(MockProvider::new(MockBehavior::AlwaysNonRetryableError))
        }
    }
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Start a session against the provider configured in `settings`.
    pub fn launch(settings: SettingsManager) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        Self::builder().with_settings(settings).build()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn settings(&self) -> &SettingsManager {
        &self.settings
    }

    pub fn provider(&self) -> &Arc<dyn AiProvider> {
        &self.provider
    }

    /// Wait until every background task has finished.
    pub async fn wait_idle(&self) {
        self.tasks.wait_idle().await;
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.pending()
    }

    pub(crate) fn target_exists(&self, target: &TaskTarget) -> bool {
        self.state().exists(target)
    }

    /// Run `task` in the background after `delay`, unless `target` is gone by
    /// then. Returns `false` when there is no tokio runtime to run it on.
    pub(crate) fn schedule<F, Fut>(
        &self,
        target: TaskTarget,
        delay: Option<Duration>,
        label: &'static str,
        task: F,
    ) -> bool
    where
        F: FnOnce(Session) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let session = self.clone();
        let span_target = target.clone();
        self.tasks.spawn(&span_target, label, async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if !session.target_exists(&target) {
                debug!(%target, "Target no longer exists, skipping");
                return;
            }
            task(session).await;
        })
    }

    pub fn select_character(&self, id: &CharacterId) -> Result<(), SessionError> {
        {
            let mut state = self.state();
            if state.character(id).is_none() {
                return Err(SessionError::UnknownCharacter(id.clone()));
            }
            state.active_character = Some(id.clone());
        }
        info!(character_id = %id, "Active character changed");
        self.events.send(SessionEvent::ActiveCharacterChanged {
            character_id: Some(id.clone()),
        });
        Ok(())
    }

    pub fn clear_active_character(&self) {
        self.state().active_character = None;
        self.events
            .send(SessionEvent::ActiveCharacterChanged { character_id: None });
    }

    pub fn active_character(&self) -> Option<Character> {
        self.state().active().ok().cloned()
    }

    /// Add a character to the roster. Its memory starts as given.
    pub fn create_character(&self, character: Character) -> CharacterId {
        let id = character.id.clone();
        info!(character_id = %id, name = %character.name, "Character created");
        self.state().characters.push(character);
        self.events.send(SessionEvent::CharacterSaved {
            character_id: id.clone(),
        });
        id
    }

    /// Replace a character's profile. Id and memory are kept.
    pub fn update_character(
        &self,
        id: &CharacterId,
        profile: Character,
    ) -> Result<(), SessionError> {
        {
            let mut state = self.state();
            let character = state
                .character_mut(id)
                .ok_or_else(|| SessionError::UnknownCharacter(id.clone()))?;
            character.apply_profile(profile);
        }
        self.events.send(SessionEvent::CharacterSaved {
            character_id: id.clone(),
        });
        Ok(())
    }

    pub fn replace_memory(
        &self,
        id: &CharacterId,
        memory: Vec<String>,
    ) -> Result<(), SessionError> {
        {
            let mut state = self.state();
            let character = state
                .character_mut(id)
                .ok_or_else(|| SessionError::UnknownCharacter(id.clone()))?;
            character.memory = memory;
        }
        self.events.send(SessionEvent::MemoryReplaced {
            character_id: id.clone(),
        });
        Ok(())
    }

    /// Replace the user's profile. Only turns started afterwards see it.
    pub fn update_user_profile(&self, user: UserProfile) {
        self.state().user = user.clone();
        info!(name = %user.name, "User profile saved");
        self.events.send(SessionEvent::UserProfileSaved(user));
    }

    pub fn user_profile(&self) -> UserProfile {
        self.state().user.clone()
    }

    pub fn character(&self, id: &CharacterId) -> Option<Character> {
        self.state().character(id).cloned()
    }

    pub fn characters(&self) -> Vec<Character> {
        self.state().characters.clone()
    }

    pub fn add_background(&self, item: BackgroundItem) {
        self.state().backgrounds.push(item);
    }

    pub fn backgrounds(&self) -> Vec<BackgroundItem> {
        self.state().backgrounds.clone()
    }

    pub fn add_sticker(&self, sticker: Sticker) {
        self.state().stickers.push(sticker);
    }

    pub fn stickers(&self) -> Vec<Sticker> {
        self.state().stickers.clone()
    }

    /// Both scenes of a character's log, in insertion order.
    pub fn history(&self, id: &CharacterId) -> Vec<Message> {
        self.state().store.list(id)
    }

    pub fn history_by_scene(&self, id: &CharacterId, scene: Scene) -> Vec<Message> {
        self.state().store.list_by_scene(id, scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::builder()
            .with_provider(Arc::new(MockProvider::new(MockBehavior::Success)))
            .build()
            .0
    }

    #[test]
    fn test_select_unknown_character_fails() {
        let session = session();
        let err = session
            .select_character(&CharacterId::from("nobody"))
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownCharacter(_)));
        assert!(session.active_character().is_none());
    }

    #[test]
    fn test_update_character_keeps_memory() {
        let session = session();
        let id = CharacterId::from("1");
        let before = session.character(&id).unwrap();

        session
            .update_character(&id, Character::new("新名字"))
            .unwrap();

        let after = session.character(&id).unwrap();
        assert_eq!(after.name, "新名字");
        assert_eq!(after.memory, before.memory);
        assert_eq!(after.id, id);
    }

    #[test]
    fn test_replace_memory_and_create() {
        let session = session();
        let id = session.create_character(Character::new("阿青"));
        session
            .replace_memory(&id, vec!["只记得这个".to_string()])
            .unwrap();

        assert_eq!(session.characters().len(), 2);
        assert_eq!(session.character(&id).unwrap().memory, vec!["只记得这个"]);
        assert!(matches!(
            session.replace_memory(&CharacterId::from("x"), vec![]),
            Err(SessionError::UnknownCharacter(_))
        ));
    }

    #[test]
    fn test_update_user_profile_is_saved_and_announced() {
        let (session, mut rx) = Session::builder()
            .with_provider(Arc::new(MockProvider::new(MockBehavior::Success)))
            .build();
        let profile = UserProfile {
            name: "小林".to_string(),
            personality: "慢热".to_string(),
            ..UserProfile::default()
        };

        session.update_user_profile(profile.clone());

        assert_eq!(session.user_profile(), profile);
        assert!(matches!(
            rx.try_recv(),
            Ok(SessionEvent::UserProfileSaved(saved)) if saved == profile
        ));
    }

    #[test]
    fn test_unconfigured_session_uses_failing_provider() {
        let (session, _rx) = Session::builder().build();
        assert_eq!(session.provider().name(), "mock");
    }
}

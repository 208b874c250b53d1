use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;
use soulmate_core::{
    ai::mock::{MockBehavior, MockProvider, MockRoute},
    character::default_roster,
    settings::{ProviderConfig, Settings, SettingsManager},
    Character, CharacterId, Message, MessageId, Scene, Session, SessionEvent, UserInput,
};

/// Needles that pick out each kind of generation request by its system prompt.
#[allow(dead_code)]
pub const SUMMARY_PROMPT: &str = "记忆整理助手";
#[allow(dead_code)]
pub const SCENE_PROMPT: &str = "场景判断助手";
#[allow(dead_code)]
pub const MOMENT_PROMPT: &str = "写一条你自己的朋友圈";
#[allow(dead_code)]
pub const COMMENT_PROMPT: &str = "回复别人的评论";
#[allow(dead_code)]
pub const CHAT_PROMPT: &str = "严格规则";

pub struct Fixture {
    pub session: Session,
    pub event_rx: mpsc::UnboundedReceiver<SessionEvent>,
    pub settings_dir: TempDir,
    mock_provider: MockProvider,
}

impl Fixture {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::with_mock_behavior(MockBehavior::Success)
    }

    #[allow(dead_code)]
    pub fn with_mock_behavior(behavior: MockBehavior) -> Self {
        Self::with_roster_and_behavior(default_roster(), behavior)
    }

    /// Chat requests get `chat`; each route answers its own kind of request.
    #[allow(dead_code)]
    pub fn with_routes(routes: Vec<MockRoute>, chat: MockBehavior) -> Self {
        Self::with_mock_behavior(MockBehavior::Routed {
            routes,
            fallback: Box::new(chat),
        })
    }

    #[allow(dead_code)]
    pub fn with_roster_and_behavior(roster: Vec<Character>, behavior: MockBehavior) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        // Isolated settings in a tempdir to avoid touching the user's real settings
        let settings_dir = TempDir::new().unwrap();
        let settings_path = settings_dir.path().join(".soulmate").join("settings.toml");
        let settings_manager = SettingsManager::from_path(settings_path).unwrap();

        let mut settings = Settings::default();
        settings.add_provider(
            "mock".to_string(),
            ProviderConfig::Mock {
                behavior: behavior.clone(),
            },
        );
        settings.active_provider = Some("mock".to_string());
        settings_manager.save_settings(settings).unwrap();

        // Clones share the same internal state, so the fixture can inspect
        // the requests the session made.
        let mock_provider = MockProvider::new(behavior);

        let first = roster.first().map(|c| c.id.clone());
        let mut builder = Session::builder()
            .with_settings(settings_manager)
            .with_provider(Arc::new(mock_provider.clone()))
            .with_characters(roster);
        if let Some(id) = first {
            builder = builder.with_active_character(id);
        }
        let (session, event_rx) = builder.build();

        Fixture {
            session,
            event_rx,
            settings_dir,
            mock_provider,
        }
    }

    #[allow(dead_code)]
    pub fn mock(&self) -> &MockProvider {
        &self.mock_provider
    }

    #[allow(dead_code)]
    pub fn update_settings<F>(&self, update_fn: F)
    where
        F: FnOnce(&mut Settings),
    {
        self.session.settings().update_setting(update_fn);
    }

    #[allow(dead_code)]
    pub fn character_id(&self) -> CharacterId {
        self.session
            .active_character()
            .expect("fixture has an active character")
            .id
    }

    #[allow(dead_code)]
    pub fn history(&self) -> Vec<Message> {
        self.session.history(&self.character_id())
    }

    #[allow(dead_code)]
    pub fn history_by_scene(&self, scene: Scene) -> Vec<Message> {
        self.session.history_by_scene(&self.character_id(), scene)
    }

    #[allow(dead_code)]
    pub fn texts(&self, scene: Scene) -> Vec<String> {
        self.history_by_scene(scene)
            .into_iter()
            .map(|m| m.text)
            .collect()
    }

    #[allow(dead_code)]
    pub fn send(&self, text: &str, scene: Scene) -> MessageId {
        self.session
            .submit_user_turn(UserInput::text(text), scene)
            .unwrap()
    }

    /// Everything emitted since the last drain.
    #[allow(dead_code)]
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Drives the conversation forward by submitting a text turn and waiting
    /// until every background task it started has finished.
    ///
    /// Asserts that typing started and stopped, then returns the events
    /// without the typing indicators.
    #[allow(dead_code)]
    pub async fn step(&mut self, text: &str, scene: Scene) -> Vec<SessionEvent> {
        self.drain_events();
        self.send(text, scene);
        self.session.wait_idle().await;

        let events = self.drain_events();
        assert!(
            events
                .iter()
                .any(|e| matches!(e, SessionEvent::TypingStatusChanged { typing: true, .. })),
            "Expected to receive typing started event"
        );
        assert!(
            matches!(
                events
                    .iter()
                    .filter(|e| matches!(e, SessionEvent::TypingStatusChanged { .. }))
                    .last(),
                Some(SessionEvent::TypingStatusChanged { typing: false, .. })
            ),
            "Expected typing to stop"
        );

        events
            .into_iter()
            .filter(|e| !matches!(e, SessionEvent::TypingStatusChanged { .. }))
            .collect()
    }
}

/// Run a test on a paused current-thread runtime so pacing delays advance
/// instantly.
#[allow(dead_code)]
pub fn run<F, Fut>(test_fn: F)
where
    F: FnOnce(Fixture) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    run_with(Fixture::new, test_fn)
}

#[allow(dead_code)]
pub fn run_with<S, F, Fut>(setup: S, test_fn: F)
where
    S: FnOnce() -> Fixture,
    F: FnOnce(Fixture) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    use tokio::time::{timeout, Duration};

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("Failed to create tokio runtime");

    runtime.block_on(async {
        let fixture = setup();
        let test_future = test_fn(fixture);
        timeout(Duration::from_secs(300), test_future)
            .await
            .expect("Test timed out");
    });
}

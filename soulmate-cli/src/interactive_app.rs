use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use soulmate_core::media::read_data_url;
use soulmate_core::moments::default_feed;
use soulmate_core::{
    CharacterId, Message, Moment, MomentAuthor, MomentId, Scene, Sender, Session, SessionError,
    SessionEvent, SettingsManager, UserInput,
};

use crate::banner::{print_startup_banner, BannerInfo};
use crate::commands::{handle_local_command, Command, LocalCommandResult, HELP};

pub struct InteractiveApp {
    session: Session,
    event_rx: mpsc::UnboundedReceiver<SessionEvent>,
    scene: Scene,
    /// Comments already printed per post, so updates only show what is new.
    seen_comments: HashMap<MomentId, usize>,
}

fn print_system(text: &str) {
    println!("\x1b[90m{text}\x1b[0m");
}

fn print_error(text: &str) {
    println!("\x1b[31m{text}\x1b[0m");
}

fn print_character(name: &str, text: &str) {
    println!("\x1b[1;36m{name}\x1b[0m: {text}");
}

fn scene_label(scene: Scene) -> &'static str {
    match scene {
        Scene::Phone => "📱 phone",
        Scene::Activity => "☕ face-to-face",
    }
}

impl InteractiveApp {
    pub fn new(settings_path: Option<PathBuf>, activity: bool) -> Result<Self> {
        let settings_manager = match settings_path {
            Some(path) => SettingsManager::from_path(path)?,
            None => SettingsManager::new()?,
        };

        let (session, event_rx) = Session::builder()
            .with_settings(settings_manager)
            .with_moments(default_feed())
            .build();
        if let Some(first) = session.characters().first() {
            session.select_character(&first.id)?;
        }

        let seen_comments = session
            .moments()
            .iter()
            .map(|m| (m.id.clone(), m.comments.len()))
            .collect();

        Ok(Self {
            session,
            event_rx,
            scene: if activity { Scene::Activity } else { Scene::Phone },
            seen_comments,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();
        if self.scene == Scene::Activity {
            self.meet();
        }

        let mut rl = DefaultEditor::new()?;
        loop {
            self.print_pending_events();

            let line = match rl.readline("\x1b[35m>\x1b[0m ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(_) => break,
            };

            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            rl.add_history_entry(input)?;

            match handle_local_command(input) {
                LocalCommandResult::Message(text) => {
                    let sent = self
                        .session
                        .submit_user_turn(UserInput::text(text), self.scene);
                    if self.report(sent).is_some() {
                        self.wait_for_reply().await;
                    }
                }
                LocalCommandResult::Invalid(msg) => print_error(&msg),
                LocalCommandResult::Command(Command::Exit) => break,
                LocalCommandResult::Command(command) => self.execute(command).await?,
            }
        }

        self.session.wait_idle().await;
        println!("\n再见!");
        Ok(())
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Help => print_system(HELP),
            Command::Characters => self.list_characters(),
            Command::Select(choice) => self.select(&choice),
            Command::Phone => {
                self.scene = Scene::Phone;
                print_system(scene_label(self.scene));
            }
            Command::Meet => self.meet(),
            Command::History => self.print_history(),
            Command::Regenerate(index) => {
                if let Some(message) = self.transcript_entry(index) {
                    if self.report(self.session.regenerate(&message.id)).is_some() {
                        self.wait_for_reply().await;
                    }
                }
            }
            Command::Edit(index, text) => {
                if let Some(message) = self.transcript_entry(index) {
                    self.report(self.session.edit_message(&message.id, &text));
                }
            }
            Command::Delete(index) => {
                if let Some(message) = self.transcript_entry(index) {
                    self.report(self.session.delete_message(&message.id));
                }
            }
            Command::Transfer(amount) => self.send(UserInput::Transfer { amount }).await,
            Command::Image(path) => match read_data_url(&path) {
                Ok(media_ref) => self.send(UserInput::Image { media_ref }).await,
                Err(e) => print_error(&e.to_string()),
            },
            Command::Sticker(index) => match self.session.stickers().get(index) {
                Some(sticker) => {
                    let media_ref = sticker.image_ref.clone();
                    self.send(UserInput::Sticker { media_ref }).await;
                }
                None => print_error("No such sticker"),
            },
            Command::Moments => self.print_moments(),
            Command::Refresh => {
                print_system("Refreshing...");
                self.report(self.session.refresh_moments().await);
                self.print_pending_events();
            }
            Command::Post(text) => {
                self.report(self.session.create_moment(MomentAuthor::User, &text, None));
            }
            Command::Like(index) => {
                if let Some(moment) = self.moment_entry(index) {
                    let me = self.session.user_profile().name;
                    if let Some(likes) = self.report(self.session.toggle_like(&moment.id, &me)) {
                        print_system(&format!("❤ {}", likes.join(", ")));
                    }
                }
            }
            Command::Comment(index, text) => {
                if let Some(moment) = self.moment_entry(index) {
                    let me = self.session.user_profile().name;
                    self.report(self.session.add_comment(&moment.id, &me, &text));
                }
            }
            Command::Memory => match self.session.active_character() {
                Some(character) if character.memory.is_empty() => {
                    print_system("Nothing remembered yet")
                }
                Some(character) => {
                    for entry in &character.memory {
                        print_system(entry);
                    }
                }
                None => print_error(&SessionError::NoActiveCharacter.to_string()),
            },
            Command::Settings => {
                let settings = self.session.settings().settings();
                print_system(&serde_json::to_string_pretty(&settings)?);
            }
            Command::Exit => {}
        }
        Ok(())
    }

    async fn send(&mut self, input: UserInput) {
        let sent = self.session.submit_user_turn(input, self.scene);
        if self.report(sent).is_some() {
            self.wait_for_reply().await;
        }
    }

    fn meet(&mut self) {
        self.scene = Scene::Activity;
        print_system(scene_label(self.scene));
        if let Some(Some(background)) = self.report(self.session.enter_activity()) {
            print_system(&format!("📍 {}", background.name));
        }
    }

    fn select(&mut self, choice: &str) {
        let characters = self.session.characters();
        let found = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| characters.get(n.checked_sub(1)?))
            .or_else(|| characters.iter().find(|c| c.name == choice));
        match found {
            Some(character) => {
                let id = character.id.clone();
                self.report(self.session.select_character(&id));
            }
            None => print_error(&format!("No character named {choice}")),
        }
    }

    fn list_characters(&self) {
        let active = self.session.active_character().map(|c| c.id);
        for (i, character) in self.session.characters().iter().enumerate() {
            let marker = if Some(&character.id) == active.as_ref() { "*" } else { " " };
            print_system(&format!(
                "{marker}{}. {} ({})",
                i + 1,
                character.name,
                character.chat_frequency
            ));
        }
    }

    fn transcript(&self) -> Vec<Message> {
        match self.session.active_character() {
            Some(character) => self.session.history_by_scene(&character.id, self.scene),
            None => Vec::new(),
        }
    }

    fn transcript_entry(&self, index: usize) -> Option<Message> {
        let entry = self.transcript().into_iter().nth(index);
        if entry.is_none() {
            print_error("No such message. Use /history to see the numbers.");
        }
        entry
    }

    fn moment_entry(&self, index: usize) -> Option<Moment> {
        let entry = self.session.moments().into_iter().nth(index);
        if entry.is_none() {
            print_error("No such post. Use /moments to see the numbers.");
        }
        entry
    }

    fn print_history(&self) {
        let Some(character) = self.session.active_character() else {
            print_error(&SessionError::NoActiveCharacter.to_string());
            return;
        };
        let me = self.session.user_profile().name;
        for (i, message) in self.transcript().iter().enumerate() {
            let speaker = match message.sender {
                Sender::User => me.as_str(),
                Sender::Ai => character.name.as_str(),
            };
            println!("\x1b[90m{:>3}.\x1b[0m {speaker}: {}", i + 1, message.text);
        }
    }

    fn author_name(&self, author: &MomentAuthor) -> String {
        match author {
            MomentAuthor::User => self.session.user_profile().name,
            MomentAuthor::Character(id) => self.character_name(id),
        }
    }

    fn character_name(&self, id: &CharacterId) -> String {
        self.session
            .character(id)
            .map(|c| c.name)
            .unwrap_or_else(|| id.to_string())
    }

    fn print_moment(&mut self, index: Option<usize>, moment: &Moment) {
        let number = index.map(|i| format!("{}. ", i + 1)).unwrap_or_default();
        println!(
            "{number}\x1b[1;33m{}\x1b[0m {}",
            self.author_name(&moment.author),
            moment.content
        );
        for image in &moment.images {
            print_system(&format!("   🖼 {image}"));
        }
        if !moment.likes.is_empty() {
            print_system(&format!("   ❤ {}", moment.likes.join(", ")));
        }
        for comment in &moment.comments {
            print_system(&format!("   💬 {}: {}", comment.author, comment.content));
        }
        self.seen_comments
            .insert(moment.id.clone(), moment.comments.len());
    }

    fn print_moments(&mut self) {
        let moments = self.session.moments();
        if moments.is_empty() {
            print_system("No posts yet. Try /refresh.");
        }
        for (i, moment) in moments.iter().enumerate() {
            self.print_moment(Some(i), moment);
        }
    }

    fn report<T>(&self, result: Result<T, SessionError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                print_error(&e.to_string());
                None
            }
        }
    }

    fn print_banner(&self) {
        let settings = self.session.settings().settings();
        let character = self.session.active_character();
        print_startup_banner(&BannerInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            provider: settings.active_provider.clone(),
            model: settings.model.to_string(),
            character: character.as_ref().map(|c| c.name.clone()),
            scene: scene_label(self.scene).to_string(),
            memory_enabled: settings.memory.enabled,
            memory_count: character.map(|c| c.memory.len()).unwrap_or(0),
        });
    }

    /// Print events until the character stops typing. Ctrl-C stops waiting;
    /// the reply still lands and shows up before the next prompt.
    async fn wait_for_reply(&mut self) {
        use tokio::signal;
        loop {
            tokio::select! {
                recv = self.event_rx.recv() => {
                    let Some(event) = recv else {
                        break;
                    };
                    let done = matches!(
                        event,
                        SessionEvent::TypingStatusChanged { typing: false, .. }
                    );
                    self.print_event(event);
                    if done {
                        break;
                    }
                }
                _ = signal::ctrl_c() => break,
            }
        }
    }

    fn print_pending_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.print_event(event);
        }
    }

    fn print_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::MessageAdded {
                character_id,
                message,
            } => {
                if message.sender == Sender::Ai {
                    print_character(&self.character_name(&character_id), &message.text);
                }
            }
            SessionEvent::MessageEdited { message, .. } => {
                print_system(&format!("✎ {}", message.text));
            }
            SessionEvent::MessagesRemoved { message_ids, .. } => {
                print_system(&format!("🗑 {} message(s) removed", message_ids.len()));
            }
            SessionEvent::TypingStatusChanged {
                character_id,
                typing: true,
            } => {
                print_system(&format!("{} 正在输入...", self.character_name(&character_id)));
            }
            SessionEvent::TypingStatusChanged { typing: false, .. } => {}
            SessionEvent::MemoryAppended { character_id, .. } => {
                print_system(&format!(
                    "💭 {} remembered something new",
                    self.character_name(&character_id)
                ));
            }
            SessionEvent::MemoryReplaced { .. }
            | SessionEvent::CharacterSaved { .. }
            | SessionEvent::UserProfileSaved(_) => {}
            SessionEvent::ActiveCharacterChanged { character_id } => match character_id {
                Some(id) => print_system(&format!("Now chatting with {}", self.character_name(&id))),
                None => print_system("No character selected"),
            },
            SessionEvent::BackgroundChanged(background) => {
                print_system(&format!("📍 {}", background.name));
            }
            SessionEvent::MomentAdded(moment) => {
                print_system("New post:");
                self.print_moment(None, &moment);
            }
            SessionEvent::MomentUpdated(moment) => {
                let seen = self.seen_comments.get(&moment.id).copied().unwrap_or(0);
                for comment in moment.comments.iter().skip(seen) {
                    print_system(&format!("💬 {}: {}", comment.author, comment.content));
                }
                self.seen_comments
                    .insert(moment.id.clone(), moment.comments.len());
            }
            SessionEvent::MomentRemoved { moment_id } => {
                self.seen_comments.remove(&moment_id);
                print_system("Post removed");
            }
        }
    }
}

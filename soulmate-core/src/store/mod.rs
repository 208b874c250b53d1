//! Conversation store.
//!
//! Messages live in a single arena keyed by id. Each character owns an
//! ordered index of its combined log plus one index per scene, so the same
//! history can be read whole or scene-filtered without keeping two copies of
//! any message.

use std::collections::HashMap;

use chrono::Duration;

use crate::id::{CharacterId, MessageId};

pub mod message;

pub use message::{Message, MessageKind, Scene, Sender};

#[derive(Debug)]
struct StoredMessage {
    owner: CharacterId,
    message: Message,
}

#[derive(Debug, Default)]
struct CharacterLog {
    all: Vec<MessageId>,
    phone: Vec<MessageId>,
    activity: Vec<MessageId>,
}

impl CharacterLog {
    fn scene(&self, scene: Scene) -> &Vec<MessageId> {
        match scene {
            Scene::Phone => &self.phone,
            Scene::Activity => &self.activity,
        }
    }

    fn scene_mut(&mut self, scene: Scene) -> &mut Vec<MessageId> {
        match scene {
            Scene::Phone => &mut self.phone,
            Scene::Activity => &mut self.activity,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    arena: HashMap<MessageId, StoredMessage>,
    logs: HashMap<CharacterId, CharacterLog>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the end of a character's log and return the
    /// stored copy. Timestamps are kept strictly increasing per character.
    pub fn append(&mut self, owner: &CharacterId, mut message: Message) -> Message {
        let log = self.logs.entry(owner.clone()).or_default();

        if let Some(last) = log.all.last().and_then(|id| self.arena.get(id)) {
            let floor = last.message.timestamp + Duration::milliseconds(1);
            if message.timestamp < floor {
                message.timestamp = floor;
            }
        }

        log.all.push(message.id.clone());
        log.scene_mut(message.scene).push(message.id.clone());
        self.arena.insert(
            message.id.clone(),
            StoredMessage {
                owner: owner.clone(),
                message: message.clone(),
            },
        );
        message
    }

    /// The combined log of both scenes, in insertion order.
    pub fn list(&self, owner: &CharacterId) -> Vec<Message> {
        self.logs
            .get(owner)
            .map(|log| self.resolve(&log.all))
            .unwrap_or_default()
    }

    pub fn list_by_scene(&self, owner: &CharacterId, scene: Scene) -> Vec<Message> {
        self.logs
            .get(owner)
            .map(|log| self.resolve(log.scene(scene)))
            .unwrap_or_default()
    }

    /// The `n` most recent messages of the combined log, oldest first.
    pub fn last_n(&self, owner: &CharacterId, n: usize) -> Vec<Message> {
        let Some(log) = self.logs.get(owner) else {
            return Vec::new();
        };
        let start = log.all.len().saturating_sub(n);
        self.resolve(&log.all[start..])
    }

    pub fn last_n_by_scene(&self, owner: &CharacterId, scene: Scene, n: usize) -> Vec<Message> {
        let Some(log) = self.logs.get(owner) else {
            return Vec::new();
        };
        let ids = log.scene(scene);
        let start = ids.len().saturating_sub(n);
        self.resolve(&ids[start..])
    }

    pub fn last(&self, owner: &CharacterId) -> Option<&Message> {
        let id = self.logs.get(owner)?.all.last()?;
        self.arena.get(id).map(|stored| &stored.message)
    }

    pub fn count(&self, owner: &CharacterId) -> usize {
        self.logs.get(owner).map(|log| log.all.len()).unwrap_or(0)
    }

    pub fn count_by_scene(&self, owner: &CharacterId, scene: Scene) -> usize {
        self.logs
            .get(owner)
            .map(|log| log.scene(scene).len())
            .unwrap_or(0)
    }

    /// Find a message and the character whose log holds it.
    pub fn find_by_id(&self, id: &MessageId) -> Option<(&CharacterId, &Message)> {
        self.arena
            .get(id)
            .map(|stored| (&stored.owner, &stored.message))
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.arena.contains_key(id)
    }

    /// Replace a message's text in place. Returns the updated message.
    pub fn replace_text(&mut self, id: &MessageId, text: String) -> Option<Message> {
        let stored = self.arena.get_mut(id)?;
        stored.message.text = text;
        Some(stored.message.clone())
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<Message> {
        let stored = self.arena.remove(id)?;
        if let Some(log) = self.logs.get_mut(&stored.owner) {
            log.all.retain(|m| m != id);
            log.scene_mut(stored.message.scene).retain(|m| m != id);
        }
        Some(stored.message)
    }

    /// Cut a scene's history at `id`: that message and every later message of
    /// the same scene are removed. Messages of the other scene are untouched.
    /// Returns the removed ids in their original order.
    pub fn truncate_scene_from(&mut self, id: &MessageId) -> Option<Vec<MessageId>> {
        let (owner, scene) = {
            let stored = self.arena.get(id)?;
            (stored.owner.clone(), stored.message.scene)
        };
        let log = self.logs.get_mut(&owner)?;
        let ids = log.scene_mut(scene);
        let index = ids.iter().position(|m| m == id)?;
        let removed: Vec<MessageId> = ids.split_off(index);

        log.all.retain(|m| !removed.contains(m));
        for removed_id in &removed {
            self.arena.remove(removed_id);
        }
        Some(removed)
    }

    fn resolve(&self, ids: &[MessageId]) -> Vec<Message> {
        ids.iter()
            .filter_map(|id| self.arena.get(id))
            .map(|stored| stored.message.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> CharacterId {
        CharacterId::from("c1")
    }

    #[test]
    fn test_scene_views_partition_the_log() {
        let mut store = ConversationStore::new();
        let c = owner();
        store.append(&c, Message::user_text("手机1", Scene::Phone));
        store.append(&c, Message::user_text("见面1", Scene::Activity));
        store.append(&c, Message::ai("手机2", Scene::Phone));

        assert_eq!(store.count(&c), 3);
        assert_eq!(store.count_by_scene(&c, Scene::Phone), 2);
        let phone: Vec<_> = store
            .list_by_scene(&c, Scene::Phone)
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(phone, vec!["手机1", "手机2"]);
        assert_eq!(store.list(&c).len(), 3);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut store = ConversationStore::new();
        let c = owner();
        let first = Message::user_text("a", Scene::Phone);
        let mut second = Message::ai("b", Scene::Phone);
        second.timestamp = first.timestamp;

        let a = store.append(&c, first);
        let b = store.append(&c, second);
        assert!(b.timestamp > a.timestamp);
    }

    #[test]
    fn test_truncate_scene_leaves_other_scene_alone() {
        let mut store = ConversationStore::new();
        let c = owner();
        store.append(&c, Message::user_text("p1", Scene::Phone));
        let cut = store.append(&c, Message::ai("p2", Scene::Phone));
        let other = store.append(&c, Message::user_text("a1", Scene::Activity));
        store.append(&c, Message::ai("p3", Scene::Phone));

        let removed = store.truncate_scene_from(&cut.id).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!store.contains(&cut.id));
        assert!(store.contains(&other.id));
        let texts: Vec<_> = store.list(&c).into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["p1", "a1"]);
    }

    #[test]
    fn test_remove_and_replace() {
        let mut store = ConversationStore::new();
        let c = owner();
        let m = store.append(&c, Message::user_text("typo", Scene::Phone));

        let edited = store.replace_text(&m.id, "fixed".to_string()).unwrap();
        assert_eq!(edited.text, "fixed");
        assert_eq!(store.find_by_id(&m.id).unwrap().0, &c);

        assert!(store.remove(&m.id).is_some());
        assert!(store.remove(&m.id).is_none());
        assert_eq!(store.count(&c), 0);
        assert!(store.replace_text(&m.id, "x".to_string()).is_none());
    }

    #[test]
    fn test_last_n_windows() {
        let mut store = ConversationStore::new();
        let c = owner();
        for i in 0..5 {
            store.append(&c, Message::user_text(format!("m{i}"), Scene::Activity));
        }
        let window: Vec<_> = store.last_n(&c, 2).into_iter().map(|m| m.text).collect();
        assert_eq!(window, vec!["m3", "m4"]);
        assert_eq!(store.last_n_by_scene(&c, Scene::Phone, 3).len(), 0);
        assert_eq!(store.last(&c).unwrap().text, "m4");
    }
}

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::character::UserProfile;
use crate::id::{CharacterId, MessageId, MomentId};
use crate::moments::Moment;
use crate::scene::ResolvedBackground;
use crate::store::Message;

/// `SessionEvent`s are the output of a session.
///
/// Every observable state change is emitted as it happens, so front ends can
/// render incremental updates (a phone reply arriving one bubble at a time)
/// without polling the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum SessionEvent {
    MessageAdded {
        character_id: CharacterId,
        message: Message,
    },
    MessageEdited {
        character_id: CharacterId,
        message: Message,
    },
    MessagesRemoved {
        character_id: CharacterId,
        message_ids: Vec<MessageId>,
    },
    TypingStatusChanged {
        character_id: CharacterId,
        typing: bool,
    },
    MemoryAppended {
        character_id: CharacterId,
        entry: String,
    },
    MemoryReplaced {
        character_id: CharacterId,
    },
    CharacterSaved {
        character_id: CharacterId,
    },
    UserProfileSaved(UserProfile),
    ActiveCharacterChanged {
        character_id: Option<CharacterId>,
    },
    BackgroundChanged(ResolvedBackground),
    MomentAdded(Moment),
    MomentUpdated(Moment),
    MomentRemoved {
        moment_id: MomentId,
    },
}

/// Events are not retained; the receiver is the only record.
#[derive(Clone)]
pub struct EventSender {
    event_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (event_tx, rx) = mpsc::unbounded_channel();
        (Self { event_tx }, rx)
    }

    /// Sending after the receiver is dropped is a no-op.
    pub fn send(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    pub fn message_added(&self, character_id: &CharacterId, message: &Message) {
        self.send(SessionEvent::MessageAdded {
            character_id: character_id.clone(),
            message: message.clone(),
        });
    }

    pub fn set_typing(&self, character_id: &CharacterId, typing: bool) {
        self.send(SessionEvent::TypingStatusChanged {
            character_id: character_id.clone(),
            typing,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order_and_are_not_retained() {
        let (sender, mut rx) = EventSender::new();
        let character_id = CharacterId::new();
        sender.set_typing(&character_id, true);
        sender.set_typing(&character_id, false);

        let typing: Vec<bool> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| match event {
                SessionEvent::TypingStatusChanged { typing, .. } => typing,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(typing, vec![true, false]);

        drop(rx);
        sender.set_typing(&character_id, true);
    }
}

pub mod ai;
pub mod character;
pub mod error;
pub mod events;
pub mod id;
pub mod library;
pub mod media;
pub mod memory;
pub mod moments;
pub mod orchestrator;
pub mod prompt;
pub mod scene;
pub mod session;
pub mod settings;
pub mod store;
pub mod tasks;

// Public library API. Front ends only need these; everything else is public
// for tests and tooling.
pub use ai::provider::AiProvider;
pub use character::{Character, ChatFrequency, Gender, UserProfile};
pub use error::SessionError;
pub use events::SessionEvent;
pub use id::{CharacterId, MessageId, MomentId};
pub use moments::{Moment, MomentAuthor};
pub use orchestrator::UserInput;
pub use session::{Session, SessionBuilder};
pub use settings::{Settings, SettingsManager};
pub use store::{Message, MessageKind, Scene, Sender};

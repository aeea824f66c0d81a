// Vanish Messenger Core
// Rust engine for the ephemeral message lifecycle

#![warn(clippy::all)]

// Модули
pub mod api;
pub mod config;
pub mod expiry;
pub mod protocol;
pub mod state;
pub mod storage;
pub mod utils;

// Re-exports для удобства
pub use api::MessengerApi;
pub use config::Config;
pub use expiry::{remaining, Remaining};
pub use protocol::backend::{ChangeFeed, MessageBackend, MessengerBackend, Subscription, ViewOutcome};
pub use protocol::events::{ChangeEvent, DeletedRow};
pub use state::controller::{ConversationController, MessageView, UiState};
pub use state::scheduler::CountdownScheduler;
pub use state::store::{LocalMessageStore, MergeOutcome};
pub use storage::memory::MemoryBackend;
pub use storage::models::{
    Conversation, Message, MessageDraft, MessagePayload, Participant, SendState,
};
pub use utils::error::{Result, VanishError};
pub use utils::time::{Clock, ManualClock, SystemClock};

pub mod cli;
pub mod config;
pub mod models;
pub mod storage;
pub mod store;

pub use models::{Conversation, Message, Role, StoreError};
pub use storage::{ArcStorage, Storage};
pub use store::ConversationStore;

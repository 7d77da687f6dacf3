pub mod conversation;
pub mod error;
pub mod ids;
pub mod message;

pub use conversation::Conversation;
pub use error::{Result, StoreError};
pub use message::{Message, Role};

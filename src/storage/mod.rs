pub mod sqlite;

use std::sync::Arc;

use crate::{
    config::StorageConfig,
    models::{Conversation, Message, Result},
};
use async_trait::async_trait;
use sqlite::Sqlite;

/// Durable keyed storage for conversations and their messages. Every method
/// runs as a single transaction, and every read that is scoped to a
/// conversation takes its id as an explicit argument.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage {
    /// Create-once write; fails with `Conflict` when the id is taken.
    async fn put_conversation(&self, conversation: Conversation) -> Result<()>;

    /// Appends the message to its conversation and returns the refreshed
    /// conversation. Fails with `NotFound` if the conversation is absent.
    async fn append_message(&self, message: Message) -> Result<Conversation>;

    async fn get_conversation(&self, id: &str) -> Result<Conversation>;

    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// Messages owned by `conversation_id` in retrieval order. Fails with
    /// `NotFound` if the conversation does not exist.
    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>>;

    async fn update_title(&self, id: &str, title: &str) -> Result<()>;

    async fn delete_conversation(&self, id: &str) -> Result<()>;

    async fn clear_all(&self) -> Result<()>;

    /// Closes the underlying connection. Calls made afterwards fail with a
    /// storage error; closing twice is a no-op.
    async fn close(&self) -> Result<()>;
}

pub type ArcStorage = Arc<dyn Storage + Send + Sync>;

pub async fn new_storage(config: &StorageConfig) -> Result<ArcStorage> {
    let storage = match config {
        StorageConfig::Sqlite(sqlite_config) => {
            Arc::new(Sqlite::new(sqlite_config.path.as_deref()).await?)
        }
    };
    Ok(storage)
}

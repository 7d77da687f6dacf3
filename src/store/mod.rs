#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

pub mod diagnostic;

use crate::{
    config::{StorageConfig, StoreConfig, constants::MAX_CONTENT_LENGTH},
    models::{Conversation, Message, Result, Role, StoreError},
    storage::{ArcStorage, new_storage},
};

/// Public entry point for conversations and messages.
///
/// The store keeps no state between calls besides the storage handle: every
/// operation that concerns a conversation receives its id explicitly, so the
/// result of one query can never depend on what was asked before.
pub struct ConversationStore {
    storage: ArcStorage,
    max_content_length: usize,
}

impl ConversationStore {
    pub fn new(storage: ArcStorage) -> Self {
        Self {
            storage,
            max_content_length: MAX_CONTENT_LENGTH,
        }
    }

    /// Opens the configured storage and prepares its schema. Safe to call
    /// again against the same database.
    pub async fn init(config: &StorageConfig) -> Result<Self> {
        let storage = new_storage(config).await?;
        log::info!("conversation store initialized");
        Ok(Self::new(storage))
    }

    pub fn with_config(mut self, config: &StoreConfig) -> Self {
        self.max_content_length = config.max_content_length;
        self
    }

    pub async fn create_conversation(&self, title: Option<&str>) -> Result<String> {
        let mut conversation = Conversation::default();
        if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
            conversation.set_title(title);
        }

        let id = conversation.id().to_string();
        self.storage.put_conversation(conversation).await?;
        log::debug!("created conversation {}", id);
        Ok(id)
    }

    pub async fn add_message(&self, conversation_id: &str, role: Role, content: &str) -> Result<String> {
        require_id(conversation_id)?;
        if content.trim().is_empty() {
            log::warn!("rejected empty message for conversation {}", conversation_id);
            return Err(StoreError::validation("message content must not be empty"));
        }

        let length = content.chars().count();
        if length > self.max_content_length {
            log::warn!(
                "rejected message of {} characters for conversation {}",
                length,
                conversation_id
            );
            return Err(StoreError::validation(format!(
                "message content is {} characters, the limit is {}",
                length, self.max_content_length
            )));
        }

        let message = Message::new(conversation_id, role, content);
        let id = message.id().to_string();
        let conversation = self.storage.append_message(message).await?;
        log::debug!(
            "added {} message {} to conversation {} ({} messages)",
            role,
            id,
            conversation.id(),
            conversation.message_count()
        );
        Ok(id)
    }

    /// Messages of `conversation_id` in creation order. A message owned by
    /// any other conversation in the result is reported as a storage error
    /// instead of being handed to the caller.
    pub async fn get_messages_for_conversation(&self, conversation_id: &str) -> Result<Vec<Message>> {
        require_id(conversation_id)?;
        let messages = self.storage.get_messages(conversation_id).await?;

        if let Some(stray) = messages
            .iter()
            .find(|m| m.conversation_id() != conversation_id)
        {
            log::error!(
                "message {} of conversation {} returned for conversation {}",
                stray.id(),
                stray.conversation_id(),
                conversation_id
            );
            return Err(StoreError::Storage(tokio_rusqlite::Error::Other(
                eyre::eyre!(
                    "message {} belongs to conversation {}, not {}",
                    stray.id(),
                    stray.conversation_id(),
                    conversation_id
                )
                .into(),
            )));
        }
        Ok(messages)
    }

    pub async fn get_all_conversations(&self) -> Result<Vec<Conversation>> {
        self.storage.list_conversations().await
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        require_id(conversation_id)?;
        self.storage.get_conversation(conversation_id).await
    }

    pub async fn rename_conversation(&self, conversation_id: &str, title: &str) -> Result<()> {
        require_id(conversation_id)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::validation("title must not be empty"));
        }
        self.storage.update_title(conversation_id, title).await
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        require_id(conversation_id)?;
        self.storage.delete_conversation(conversation_id).await?;
        log::debug!("deleted conversation {}", conversation_id);
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.storage.clear_all().await?;
        log::info!("cleared all conversations");
        Ok(())
    }

    /// Closes the storage and reports a failure to do so. Dropping the store
    /// releases it silently.
    pub async fn close(self) -> Result<()> {
        log::debug!("closing conversation store");
        self.storage.close().await
    }
}

fn require_id(conversation_id: &str) -> Result<()> {
    if conversation_id.trim().is_empty() {
        return Err(StoreError::validation("conversation id is required"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};

use super::{Message, Role, ids};

pub const MAX_TITLE_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    id: String,
    title: Option<String>,
    message_count: usize,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        id: String,
        title: Option<String>,
        message_count: usize,
        created_at: chrono::DateTime<chrono::Utc>,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            id,
            title,
            message_count,
            created_at,
            updated_at,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets both timestamps; chain `with_updated_at` afterwards to move the
    /// update time on its own.
    pub fn with_created_at(mut self, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        self.created_at = timestamp;
        self.updated_at = timestamp;
        self
    }

    pub fn with_updated_at(mut self, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        self.updated_at = timestamp;
        self
    }

    pub fn with_message_count(mut self, count: usize) -> Self {
        self.message_count = count;
        self
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn message_count(&self) -> usize {
        self.message_count
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.updated_at
    }
}

impl Default for Conversation {
    fn default() -> Self {
        let now = chrono::Utc::now();
        Self {
            id: ids::new_conversation_id(),
            title: None,
            message_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Title for an untitled conversation, taken from its first user message.
pub fn derive_title(message: &Message) -> Option<String> {
    if message.role() != Role::User {
        return None;
    }

    let collapsed = message.content().split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    if collapsed.chars().count() <= MAX_TITLE_CHARS {
        return Some(collapsed);
    }

    let mut title: String = collapsed.chars().take(MAX_TITLE_CHARS - 1).collect();
    title.truncate(title.trim_end().len());
    title.push('…');
    Some(title)
}

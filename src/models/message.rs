#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{StoreError, ids};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(StoreError::validation(format!(
                "role must be one of user, assistant, system; got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    conversation_id: String,
    role: Role,
    content: String,
    seq: usize,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl Message {
    pub fn new(conversation_id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: ids::new_message_id(),
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            seq: 0,
            created_at: chrono::Utc::now(),
        }
    }

    /// Rebuilds a persisted message from its stored columns.
    pub(crate) fn from_parts(
        id: String,
        conversation_id: String,
        role: Role,
        content: String,
        seq: usize,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            role,
            content,
            seq,
            created_at,
        }
    }

    pub fn new_user(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, Role::User, content)
    }

    pub fn new_assistant(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, Role::Assistant, content)
    }

    pub fn new_system(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, Role::System, content)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_seq(mut self, seq: usize) -> Self {
        self.seq = seq;
        self
    }

    pub fn with_created_at(mut self, created_at: chrono::DateTime<chrono::Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// 1-based position inside the owning conversation. Zero until the
    /// message has been persisted.
    pub fn seq(&self) -> usize {
        self.seq
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    /// Retrieval order: creation time, then position for messages that share
    /// a millisecond.
    pub fn sort_key(&self) -> (i64, usize) {
        (self.created_at.timestamp_millis(), self.seq)
    }
}

#[cfg(test)]
#[path = "sqlite_test.rs"]
mod tests;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, OpenFlags, Row, Transaction, named_params, params};

use crate::{
    models::{Conversation, Message, Result, Role, StoreError, conversation::derive_title},
    storage::Storage,
};

use super::migration::MIGRATION;

const SELECT_CONVERSATIONS: &str = r#"SELECT c.id, c.title, c.created_at, c.updated_at,
    (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id)
    FROM conversations c"#;

const SELECT_MESSAGES: &str =
    "SELECT id, conversation_id, seq, role, content, created_at FROM messages WHERE conversation_id = ?";

pub struct Sqlite {
    conn: Connection,
}

impl Sqlite {
    /// Opens the database at `path`, or an in-memory database when `path` is
    /// `None`, and brings the schema up to date.
    pub async fn new(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(path) => {
                log::debug!("opening database path: {}", path);
                Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
                )
                .await?
            }
            None => {
                log::debug!("opening in-memory database");
                Connection::open_in_memory().await?
            }
        };

        let ret = Self { conn };
        if let Err(err) = ret.run_migration().await {
            log::error!("running migration: {}", err);
            return Err(err);
        }
        Ok(ret)
    }

    async fn run_migration(&self) -> Result<()> {
        self.conn
            .call(|conn| Ok(conn.execute_batch(MIGRATION)?))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for Sqlite {
    async fn put_conversation(&self, conversation: Conversation) -> Result<()> {
        log::debug!("putting conversation {}", conversation.id());
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if conversation_exists(&tx, conversation.id())? {
                    return Ok(Err(StoreError::Conflict(conversation.id().to_string())));
                }

                tx.execute(
                    r#"INSERT INTO conversations (id, title, created_at, updated_at)
                VALUES (:id, :title, :created_at, :updated_at)"#,
                    named_params! {
                        ":id": conversation.id(),
                        ":title": conversation.title(),
                        ":created_at": conversation.created_at().timestamp_millis(),
                        ":updated_at": conversation.updated_at().timestamp_millis(),
                    },
                )?;
                tx.commit()?;
                Ok(Ok(()))
            })
            .await?
    }

    async fn append_message(&self, message: Message) -> Result<Conversation> {
        log::debug!(
            "appending message {} to conversation {}",
            message.id(),
            message.conversation_id()
        );
        let derived_title = derive_title(&message);
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let conversation_id = message.conversation_id();
                if !conversation_exists(&tx, conversation_id)? {
                    return Ok(Err(StoreError::NotFound(conversation_id.to_string())));
                }

                let (seq, last_created_at): (i64, Option<i64>) = tx.query_row(
                    r#"SELECT COALESCE(MAX(seq), 0) + 1, MAX(created_at)
                    FROM messages WHERE conversation_id = ?"#,
                    params![conversation_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                // A clock that stepped backwards must not reorder the transcript.
                let created_at = message
                    .created_at()
                    .timestamp_millis()
                    .max(last_created_at.unwrap_or(i64::MIN));

                tx.execute(
                    r#"INSERT INTO messages (id, conversation_id, seq, role, content, created_at)
                VALUES (:id, :conversation_id, :seq, :role, :content, :created_at)"#,
                    named_params! {
                        ":id": message.id(),
                        ":conversation_id": conversation_id,
                        ":seq": seq,
                        ":role": message.role().as_str(),
                        ":content": message.content(),
                        ":created_at": created_at,
                    },
                )?;

                tx.execute(
                    r#"UPDATE conversations SET
                    updated_at = MAX(updated_at, :updated_at),
                    title = COALESCE(title, :title)
                WHERE id = :id"#,
                    named_params! {
                        ":id": conversation_id,
                        ":updated_at": created_at,
                        ":title": derived_title,
                    },
                )?;

                let conversation = match find_conversation(&tx, conversation_id)? {
                    Some(conversation) => conversation,
                    None => return Ok(Err(StoreError::NotFound(conversation_id.to_string()))),
                };
                tx.commit()?;
                Ok(Ok(conversation))
            })
            .await?
    }

    async fn get_conversation(&self, id: &str) -> Result<Conversation> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let conversation = find_conversation(&tx, &id)?;
                tx.commit()?;
                Ok(conversation.ok_or(StoreError::NotFound(id)))
            })
            .await?
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conversations = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("{} ORDER BY c.created_at, c.id", SELECT_CONVERSATIONS))?;
                let mut rows = stmt.query([])?;

                let mut conversations = vec![];
                while let Some(row) = rows.next()? {
                    conversations.push(conversation_from_row(row)?);
                }
                Ok(conversations)
            })
            .await?;
        log::debug!("listed {} conversations", conversations.len());
        Ok(conversations)
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conversation_id = conversation_id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if !conversation_exists(&tx, &conversation_id)? {
                    return Ok(Err(StoreError::NotFound(conversation_id)));
                }

                let mut messages = vec![];
                {
                    let mut stmt = tx.prepare(SELECT_MESSAGES)?;
                    let mut rows = stmt.query(params![conversation_id])?;
                    while let Some(row) = rows.next()? {
                        messages.push(message_from_row(row)?);
                    }
                }
                tx.commit()?;

                messages.sort_by_key(Message::sort_key);
                log::debug!(
                    "loaded {} messages for conversation {}",
                    messages.len(),
                    conversation_id
                );
                Ok(Ok(messages))
            })
            .await?
    }

    async fn update_title(&self, id: &str, title: &str) -> Result<()> {
        let id = id.to_string();
        let title = title.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let affected_rows = tx.execute(
                    "UPDATE conversations SET title = ? WHERE id = ?",
                    params![title, id],
                )?;
                if affected_rows == 0 {
                    return Ok(Err(StoreError::NotFound(id)));
                }
                tx.commit()?;
                Ok(Ok(()))
            })
            .await?
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        log::debug!("deleting conversation {}", id);
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM messages WHERE conversation_id = ?",
                    params![id],
                )?;
                if tx.execute("DELETE FROM conversations WHERE id = ?", params![id])? == 0 {
                    return Ok(Err(StoreError::NotFound(id)));
                }
                tx.commit()?;
                Ok(Ok(()))
            })
            .await?
    }

    async fn clear_all(&self) -> Result<()> {
        log::debug!("clearing all conversations");
        self.conn
            .call(|conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM messages", [])?;
                tx.execute("DELETE FROM conversations", [])?;
                Ok(tx.commit()?)
            })
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        log::debug!("closing database connection");
        if let Err(err) = self.conn.clone().close().await {
            log::error!("closing database connection: {}", err);
            return Err(err.into());
        }
        Ok(())
    }
}

fn conversation_exists(tx: &Transaction<'_>, id: &str) -> tokio_rusqlite::Result<bool> {
    Ok(tx.query_row(
        "SELECT EXISTS (SELECT 1 FROM conversations WHERE id = ?)",
        params![id],
        |row| row.get(0),
    )?)
}

fn find_conversation(tx: &Transaction<'_>, id: &str) -> tokio_rusqlite::Result<Option<Conversation>> {
    let mut stmt = tx.prepare(&format!("{} WHERE c.id = ?", SELECT_CONVERSATIONS))?;
    let mut rows = stmt.query(params![id])?;
    let conversation = match rows.next()? {
        Some(row) => Some(conversation_from_row(row)?),
        None => None,
    };
    Ok(conversation)
}

fn conversation_from_row(row: &Row<'_>) -> tokio_rusqlite::Result<Conversation> {
    let id: String = row.get(0)?;
    let title: Option<String> = row.get(1)?;
    let created_at = from_millis(row.get(2)?, "created_at")?;
    let updated_at = from_millis(row.get(3)?, "updated_at")?;
    let message_count: i64 = row.get(4)?;

    Ok(Conversation::from_parts(
        id,
        title,
        message_count as usize,
        created_at,
        updated_at,
    ))
}

fn message_from_row(row: &Row<'_>) -> tokio_rusqlite::Result<Message> {
    let id: String = row.get(0)?;
    let conversation_id: String = row.get(1)?;
    let seq: i64 = row.get(2)?;
    let role: String = row.get(3)?;
    let content: String = row.get(4)?;
    let created_at = from_millis(row.get(5)?, "created_at")?;

    let role: Role = role.parse().map_err(|_| {
        tokio_rusqlite::Error::Other(
            eyre::eyre!("invalid role {:?} for message {}", role, id).into(),
        )
    })?;

    Ok(Message::from_parts(
        id,
        conversation_id,
        role,
        content,
        seq as usize,
        created_at,
    ))
}

fn from_millis(
    millis: i64,
    column: &str,
) -> tokio_rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp_millis(millis).ok_or(tokio_rusqlite::Error::Other(
        eyre::eyre!("invalid {}: {}", column, millis).into(),
    ))
}

use super::*;

async fn new_db() -> Sqlite {
    Sqlite::new(None).await.unwrap()
}

fn ts(offset_ms: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp_millis(1_700_000_000_000 + offset_ms).unwrap()
}

#[tokio::test]
async fn test_run_migration_is_idempotent() {
    let db = new_db().await;
    db.run_migration().await.unwrap();
    db.run_migration().await.unwrap();

    assert!(db.list_conversations().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_put_conversation() {
    let db = new_db().await;

    let expected = Conversation::default()
        .with_id("test_id")
        .with_title("Test Conversation")
        .with_created_at(ts(0));

    db.put_conversation(expected.clone()).await.unwrap();

    let actual = db.get_conversation("test_id").await.unwrap();
    assert_eq!(actual.id(), "test_id");
    assert_eq!(actual.title(), Some("Test Conversation"));
    assert_eq!(actual.created_at(), expected.created_at());
    assert_eq!(actual.updated_at(), expected.updated_at());
    assert_eq!(actual.message_count(), 0);
}

#[tokio::test]
async fn test_put_conversation_without_title() {
    let db = new_db().await;
    db.put_conversation(Conversation::default().with_id("untitled"))
        .await
        .unwrap();

    let actual = db.get_conversation("untitled").await.unwrap();
    assert_eq!(actual.title(), None);
}

#[tokio::test]
async fn test_put_conversation_conflict() {
    let db = new_db().await;

    let original = Conversation::default()
        .with_id("test_id")
        .with_title("Original");
    db.put_conversation(original).await.unwrap();

    let err = db
        .put_conversation(Conversation::default().with_id("test_id").with_title("Other"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let actual = db.get_conversation("test_id").await.unwrap();
    assert_eq!(actual.title(), Some("Original"));
}

#[tokio::test]
async fn test_get_conversation_not_exist() {
    let db = new_db().await;

    let err = db.get_conversation("non_existent_id").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_append_message() {
    let db = new_db().await;
    db.put_conversation(
        Conversation::default()
            .with_id("test_id")
            .with_title("Test Conversation")
            .with_created_at(ts(0)),
    )
    .await
    .unwrap();

    let conversation = db
        .append_message(
            Message::new_user("test_id", "hello")
                .with_id("msg1")
                .with_created_at(ts(10)),
        )
        .await
        .unwrap();
    assert_eq!(conversation.message_count(), 1);
    assert_eq!(conversation.updated_at(), ts(10));

    let conversation = db
        .append_message(
            Message::new_assistant("test_id", "hi there")
                .with_id("msg2")
                .with_created_at(ts(20)),
        )
        .await
        .unwrap();
    assert_eq!(conversation.message_count(), 2);
    assert_eq!(conversation.updated_at(), ts(20));
    assert_eq!(conversation.created_at(), ts(0));

    let actual = db.get_messages("test_id").await.unwrap();
    assert_eq!(actual.len(), 2);
    assert_eq!(actual[0].id(), "msg1");
    assert_eq!(actual[0].seq(), 1);
    assert_eq!(actual[0].role(), Role::User);
    assert_eq!(actual[0].content(), "hello");
    assert_eq!(actual[0].created_at(), ts(10));
    assert_eq!(actual[1].id(), "msg2");
    assert_eq!(actual[1].seq(), 2);
    assert_eq!(actual[1].role(), Role::Assistant);
}

#[tokio::test]
async fn test_append_message_to_missing_conversation() {
    let db = new_db().await;
    db.put_conversation(Conversation::default().with_id("real"))
        .await
        .unwrap();

    let err = db
        .append_message(Message::new_user("ghost", "hello").with_id("orphan"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // nothing leaked into the conversation that does exist
    assert!(db.get_messages("real").await.unwrap().is_empty());
    let conversations = db.list_conversations().await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].message_count(), 0);
}

#[tokio::test]
async fn test_append_message_with_duplicate_id_rolls_back() {
    let db = new_db().await;
    db.put_conversation(Conversation::default().with_id("a").with_created_at(ts(0)))
        .await
        .unwrap();

    db.append_message(Message::new_user("a", "first").with_id("dup").with_created_at(ts(5)))
        .await
        .unwrap();

    let err = db
        .append_message(Message::new_user("a", "second").with_id("dup").with_created_at(ts(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Storage(_)));

    let conversation = db.get_conversation("a").await.unwrap();
    assert_eq!(conversation.message_count(), 1);
    assert_eq!(conversation.updated_at(), ts(5));
}

#[tokio::test]
async fn test_append_message_derives_title() {
    let db = new_db().await;
    db.put_conversation(Conversation::default().with_id("untitled"))
        .await
        .unwrap();
    db.put_conversation(Conversation::default().with_id("titled").with_title("Keep me"))
        .await
        .unwrap();

    let convo = db
        .append_message(Message::new_system("untitled", "You are helpful"))
        .await
        .unwrap();
    assert_eq!(convo.title(), None);

    let convo = db
        .append_message(Message::new_user("untitled", "What is Rust?"))
        .await
        .unwrap();
    assert_eq!(convo.title(), Some("What is Rust?"));

    let convo = db
        .append_message(Message::new_user("untitled", "Another question"))
        .await
        .unwrap();
    assert_eq!(convo.title(), Some("What is Rust?"));

    let convo = db
        .append_message(Message::new_user("titled", "What is Rust?"))
        .await
        .unwrap();
    assert_eq!(convo.title(), Some("Keep me"));
}

#[tokio::test]
async fn test_get_messages_orders_by_created_at_then_seq() {
    let db = new_db().await;
    db.put_conversation(Conversation::default().with_id("c").with_created_at(ts(0)))
        .await
        .unwrap();

    // Same millisecond for the first two, a clock step backwards for the third.
    db.append_message(Message::new_user("c", "one").with_created_at(ts(100)))
        .await
        .unwrap();
    db.append_message(Message::new_assistant("c", "two").with_created_at(ts(100)))
        .await
        .unwrap();
    db.append_message(Message::new_user("c", "three").with_created_at(ts(50)))
        .await
        .unwrap();

    let messages = db.get_messages("c").await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content()).collect();
    assert_eq!(contents, vec!["one", "two", "three"]);
    let seqs: Vec<usize> = messages.iter().map(|m| m.seq()).collect();
    assert_eq!(seqs, vec![1, 2, 3]);

    // The late message is stamped no earlier than the one before it.
    assert_eq!(messages[2].created_at(), ts(100));
    assert_eq!(db.get_conversation("c").await.unwrap().updated_at(), ts(100));
}

#[tokio::test]
async fn test_append_message_keeps_later_timestamps() {
    let db = new_db().await;
    db.put_conversation(Conversation::default().with_id("c").with_created_at(ts(0)))
        .await
        .unwrap();

    db.append_message(Message::new_user("c", "early").with_created_at(ts(10)))
        .await
        .unwrap();
    db.append_message(Message::new_user("c", "late").with_created_at(ts(500)))
        .await
        .unwrap();

    let messages = db.get_messages("c").await.unwrap();
    assert_eq!(messages[0].created_at(), ts(10));
    assert_eq!(messages[1].created_at(), ts(500));
}

#[tokio::test]
async fn test_get_messages_not_exist() {
    let db = new_db().await;

    let err = db.get_messages("non_existent_id").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_get_messages_is_scoped_to_conversation() {
    let db = new_db().await;
    let conversations = fake_conversations(&db).await;

    for (i, conversation) in conversations.iter().enumerate() {
        let messages = db.get_messages(conversation.id()).await.unwrap();
        assert_eq!(messages.len(), 3);
        for (j, message) in messages.iter().enumerate() {
            assert_eq!(message.conversation_id(), conversation.id());
            assert_eq!(message.content(), format!("message {} of {}", j, i));
        }
    }

    // interleave queries to make sure no state carries from one to the next
    let first = db.get_messages("test_id_0").await.unwrap();
    let last = db.get_messages("test_id_9").await.unwrap();
    let first_again = db.get_messages("test_id_0").await.unwrap();
    assert_eq!(first, first_again);
    assert!(last.iter().all(|m| !first.contains(m)));
}

#[tokio::test]
async fn test_list_conversations() {
    let db = new_db().await;
    let expected = fake_conversations(&db).await;

    let actual = db.list_conversations().await.unwrap();
    assert_eq!(actual.len(), expected.len());
    for (actual, expected) in actual.iter().zip(expected.iter()) {
        assert_eq!(actual.id(), expected.id());
        assert_eq!(actual.title(), expected.title());
        assert_eq!(actual.message_count(), 3);
    }

    // stable across snapshots
    assert_eq!(actual, db.list_conversations().await.unwrap());
}

#[tokio::test]
async fn test_update_title() {
    let db = new_db().await;
    db.put_conversation(Conversation::default().with_id("test_id").with_title("Old"))
        .await
        .unwrap();

    db.update_title("test_id", "Updated Title").await.unwrap();
    let actual = db.get_conversation("test_id").await.unwrap();
    assert_eq!(actual.title(), Some("Updated Title"));

    let err = db.update_title("missing", "x").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_conversation() {
    let db = new_db().await;
    fake_conversations(&db).await;

    db.delete_conversation("test_id_3").await.unwrap();

    let err = db.get_conversation("test_id_3").await.unwrap_err();
    assert!(err.is_not_found());
    let err = db.get_messages("test_id_3").await.unwrap_err();
    assert!(err.is_not_found());

    let remaining = db.list_conversations().await.unwrap();
    assert_eq!(remaining.len(), 9);
    assert!(remaining.iter().all(|c| c.message_count() == 3));

    let err = db.delete_conversation("test_id_3").await.unwrap_err();
    assert!(err.is_not_found());

    let orphans: i64 = db
        .conn
        .call(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = 'test_id_3'",
                [],
                |row| row.get(0),
            )?)
        })
        .await
        .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn test_clear_all() {
    let db = new_db().await;
    fake_conversations(&db).await;

    db.clear_all().await.unwrap();
    assert!(db.list_conversations().await.unwrap().is_empty());

    db.clear_all().await.unwrap();
    assert!(db.list_conversations().await.unwrap().is_empty());

    let messages: i64 = db
        .conn
        .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?))
        .await
        .unwrap();
    assert_eq!(messages, 0);
}

#[tokio::test]
async fn test_reopen_file_database() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    {
        let db = Sqlite::new(Some(&path)).await.unwrap();
        db.put_conversation(Conversation::default().with_id("persisted"))
            .await
            .unwrap();
        db.append_message(Message::new_user("persisted", "still here"))
            .await
            .unwrap();
    }

    let db = Sqlite::new(Some(&path)).await.unwrap();
    let messages = db.get_messages("persisted").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content(), "still here");
    assert_eq!(db.get_conversation("persisted").await.unwrap().message_count(), 1);
}

#[tokio::test]
async fn test_close() {
    let db = new_db().await;
    db.put_conversation(Conversation::default().with_id("c"))
        .await
        .unwrap();

    db.close().await.unwrap();
    // closing again is a no-op
    db.close().await.unwrap();

    let err = db.get_conversation("c").await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Storage(tokio_rusqlite::Error::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_corrupted_role_is_a_storage_error() {
    let db = new_db().await;
    db.put_conversation(Conversation::default().with_id("c"))
        .await
        .unwrap();
    db.append_message(Message::new_user("c", "hello").with_id("m1"))
        .await
        .unwrap();

    // bypass the CHECK constraint the way a hand-edited file would
    db.conn
        .call(|conn| {
            conn.execute_batch(
                r#"PRAGMA ignore_check_constraints = ON;
                UPDATE messages SET role = 'robot' WHERE id = 'm1';
                PRAGMA ignore_check_constraints = OFF;"#,
            )?;
            Ok(())
        })
        .await
        .unwrap();

    let err = db.get_messages("c").await.unwrap_err();
    assert!(matches!(err, StoreError::Storage(_)));
}

async fn fake_conversations(db: &Sqlite) -> Vec<Conversation> {
    let mut conversations = vec![];
    for i in 0..10 {
        let title = if i % 2 == 0 {
            "Even Conversation"
        } else {
            "Odd Conversation"
        };

        let conversation = Conversation::default()
            .with_id(format!("test_id_{}", i))
            .with_title(format!("{} {}", title, i))
            .with_created_at(ts(i * 1000));
        db.put_conversation(conversation.clone()).await.unwrap();
        conversations.push(conversation);
    }

    // round-robin so rows of different conversations sit next to each other
    for j in 0..3 {
        for (i, conversation) in conversations.iter().enumerate() {
            db.append_message(
                Message::new_user(conversation.id(), format!("message {} of {}", j, i))
                    .with_created_at(ts(20_000 + j * 100 + i as i64)),
            )
            .await
            .unwrap();
        }
    }
    conversations
}

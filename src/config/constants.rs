/// Upper bound on message content, in characters
pub const MAX_CONTENT_LENGTH: usize = 100_000;

pub const LOG_FILE_PATH: &str = "/tmp/chatty-store.log";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Directory under the user's data home holding the database
pub const DATA_DIR_NAME: &str = "chatty-store";

pub const DATABASE_FILE_NAME: &str = "chat.db";

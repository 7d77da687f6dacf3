use super::constants::*;

pub(crate) fn log_level() -> Option<String> {
    Some(DEFAULT_LOG_LEVEL.to_string())
}

pub(crate) fn log_file_path() -> String {
    LOG_FILE_PATH.to_string()
}

pub(crate) fn max_content_length() -> usize {
    MAX_CONTENT_LENGTH
}

/// $XDG_DATA_HOME/chatty-store/chat.db, falling back to
/// $HOME/.local/share/chatty-store/chat.db
pub(crate) fn database_path() -> Option<String> {
    let data_home = std::env::var("XDG_DATA_HOME")
        .ok()
        .filter(|dir| !dir.is_empty())
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            format!("{}/.local/share", home)
        });
    Some(format!("{}/{}/{}", data_home, DATA_DIR_NAME, DATABASE_FILE_NAME))
}

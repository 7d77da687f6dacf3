use crate::config::constants::{LOG_FILE_PATH, MAX_CONTENT_LENGTH};

use super::*;

#[test]
fn test_load_configuration() {
    let config = load_configuration("./testdata/config.toml").expect("failed to load config");

    assert_eq!(config.general.verbose, true);

    let log = &config.log;
    assert_eq!(log.level.as_deref(), Some("debug"));
    let log_filters = log.filters.as_deref().unwrap_or_default();
    assert_eq!(log_filters.len(), 1);
    assert_eq!(log_filters[0].module.as_deref(), Some("chatty_store::storage"));
    assert_eq!(log_filters[0].level.as_deref(), Some("trace"));

    let log_file = &log.file;
    assert_eq!(log_file.path, "/var/log/chatty-store.log");
    assert_eq!(log_file.append, true);

    assert_eq!(config.store.max_content_length, 4096);

    match &config.storage {
        StorageConfig::Sqlite(sqlite) => {
            assert_eq!(
                sqlite.path.as_deref(),
                Some("/var/lib/chatty-store/chat.db")
            );
        }
    }
}

#[test]
fn test_load_configuration_with_some_default_fields() {
    let config =
        load_configuration("./testdata/config_with_default.toml").expect("failed to load config");

    assert_eq!(config.general.verbose, false);

    let log = &config.log;
    assert_eq!(log.level.as_deref(), Some("info"));
    assert_eq!(log.file.path, LOG_FILE_PATH);
    assert!(log.filters.is_none());

    assert_eq!(config.store.max_content_length, MAX_CONTENT_LENGTH);

    match &config.storage {
        StorageConfig::Sqlite(sqlite) => {
            let path = sqlite.path.as_deref().expect("database path");
            assert!(path.ends_with("/chatty-store/chat.db"));
        }
    }
}

#[test]
fn test_load_configuration_missing_file() {
    let err = load_configuration("./testdata/does_not_exist.toml").unwrap_err();
    assert!(err.to_string().contains("does_not_exist.toml"));
}

#[test]
fn test_resolve_path() {
    let ret = resolve_path("$STORE_TEST_PATH/${STORE_USER_PATH}/config.toml")
        .expect("failed to resolve path");
    assert_eq!(ret, "//config.toml");

    let dir = "/tmp/test";
    let user_path = "user_path";
    unsafe {
        std::env::set_var("STORE_TEST_PATH", dir);
        std::env::set_var("STORE_USER_PATH", user_path);
    }
    let ret = resolve_path("$STORE_TEST_PATH/${STORE_USER_PATH}/config.toml")
        .expect("failed to resolve path");
    assert_eq!(ret, format!("{dir}/{user_path}/config.toml"));
}

#[test]
fn test_resolve_storage() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested/chat.db");

    let resolved = resolve_storage(&StorageConfig::sqlite(db_path.to_string_lossy())).unwrap();
    match resolved {
        StorageConfig::Sqlite(sqlite) => {
            assert_eq!(sqlite.path.as_deref(), Some(db_path.to_str().unwrap()));
        }
    }
    assert!(dir.path().join("nested").is_dir());

    match resolve_storage(&StorageConfig::in_memory()).unwrap() {
        StorageConfig::Sqlite(sqlite) => assert_eq!(sqlite.path, None),
    }
}

#[test]
fn test_default_storage_is_a_file_under_data_home() {
    let dir = tempfile::tempdir().unwrap();
    unsafe {
        std::env::set_var("XDG_DATA_HOME", dir.path());
    }

    let config = Configuration::default();
    let resolved = resolve_storage(&config.storage).unwrap();
    let expected = dir.path().join("chatty-store/chat.db");
    match resolved {
        StorageConfig::Sqlite(sqlite) => {
            assert_eq!(sqlite.path.as_deref(), Some(expected.to_str().unwrap()));
        }
    }
    assert!(dir.path().join("chatty-store").is_dir());
}

#[test]
fn test_basename() {
    assert_eq!(basename("src/storage/sqlite/sqlite.rs"), "sqlite.rs");
    assert_eq!(basename("main.rs"), "main.rs");
}

#[test]
fn test_init_replaces_instance() {
    let config = load_configuration("./testdata/config.toml").unwrap();
    Configuration::init(config).unwrap();
    assert!(Configuration::instance().general.verbose);
    assert_eq!(Configuration::instance().store.max_content_length, 4096);
}

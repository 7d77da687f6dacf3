use chatty_store::cli::{Action, Command};
use chatty_store::config::{Configuration, StorageConfig, init_logger, resolve_storage, verbose};
use chatty_store::store::diagnostic::run_isolation_check;
use chatty_store::ConversationStore;
use eyre::{Context, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Command::new();
    if cmd.version() {
        cmd.print_version();
        return Ok(());
    }

    let action = match cmd.action() {
        Some(action) => action.clone(),
        None => return cmd.print_help(),
    };

    better_panic::install();

    let config = cmd.get_config()?;
    Configuration::init(config.clone())?;
    init_logger(&config.log)?;
    verbose!("[+] Logger initialized");

    let storage_config = match action {
        Action::Check => StorageConfig::in_memory(),
        _ => resolve_storage(&config.storage)?,
    };

    verbose!("[+] Initializing storage...");
    let store = ConversationStore::init(&storage_config)
        .await
        .wrap_err("initializing storage")?
        .with_config(&config.store);
    verbose!("[+] Storage initialized");

    let ok = run(&store, action).await?;
    store.close().await.wrap_err("closing storage")?;

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(store: &ConversationStore, action: Action) -> Result<bool> {
    match action {
        Action::Init => {
            println!("ready");
        }
        Action::New { title } => {
            let id = store
                .create_conversation(title.as_deref())
                .await
                .wrap_err("creating conversation")?;
            println!("{}", id);
        }
        Action::Add {
            conversation_id,
            role,
            content,
        } => {
            let id = store
                .add_message(&conversation_id, role, &content)
                .await
                .wrap_err(format!("adding message to {}", conversation_id))?;
            println!("{}", id);
        }
        Action::Messages { conversation_id } => {
            let messages = store
                .get_messages_for_conversation(&conversation_id)
                .await
                .wrap_err(format!("getting messages of {}", conversation_id))?;
            println!("{}", serde_json::to_string_pretty(&messages)?);
        }
        Action::List => {
            let conversations = store
                .get_all_conversations()
                .await
                .wrap_err("getting conversations")?;
            println!("{}", serde_json::to_string_pretty(&conversations)?);
        }
        Action::Rename {
            conversation_id,
            title,
        } => {
            store
                .rename_conversation(&conversation_id, &title)
                .await
                .wrap_err(format!("renaming {}", conversation_id))?;
        }
        Action::Delete { conversation_id } => {
            store
                .delete_conversation(&conversation_id)
                .await
                .wrap_err(format!("deleting {}", conversation_id))?;
        }
        Action::Clear => {
            store.clear().await.wrap_err("clearing storage")?;
        }
        Action::Check => {
            let report = run_isolation_check(store)
                .await
                .wrap_err("running isolation check")?;
            println!("{}", report);
            if !report.passed() {
                log::error!("isolation check failed");
                return Ok(false);
            }
        }
    }
    Ok(true)
}

use clap::{CommandFactory, Parser, Subcommand};
use eyre::{Context, Result};

use crate::{
    config::{self, Configuration, load_configuration, lookup_config_path},
    models::Role,
};

#[derive(Debug, Parser)]
#[command(
    version,
    about,
    long_about = r#"An embedded conversation and message store

Default configuration file location looks up in the following order:
    * $XDG_CONFIG_HOME/chatty-store/config.toml
    * $HOME/.config/chatty-store/config.toml
    * $HOME/.chatty-store.toml
"#,
    disable_version_flag = true
)]
pub struct Command {
    /// Configuration file path
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Show the version
    #[arg(short, long)]
    version: bool,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Action {
    /// Create the database and its tables if they do not exist yet
    Init,

    /// Create a conversation and print its id
    New {
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Append a message to a conversation and print the message id
    Add {
        conversation_id: String,
        /// One of user, assistant, system
        role: Role,
        content: String,
    },

    /// Print the messages of a conversation as JSON
    Messages { conversation_id: String },

    /// Print all conversations as JSON
    List,

    /// Change the title of a conversation
    Rename {
        conversation_id: String,
        title: String,
    },

    /// Delete a conversation and its messages
    Delete { conversation_id: String },

    /// Delete every conversation and message
    Clear,

    /// Run the conversation isolation check against a scratch in-memory store
    Check,
}

impl Command {
    pub fn new() -> Command {
        Self::parse()
    }

    pub fn get_config(&self) -> Result<Configuration> {
        let config_path = self
            .config
            .clone()
            .unwrap_or_else(|| lookup_config_path().unwrap_or_default());

        if config_path.is_empty() {
            // No config path is specified just use the default config
            return Ok(Configuration::default());
        }
        Ok(load_configuration(config_path.as_str()).wrap_err("loading configuration")?)
    }

    pub fn version(&self) -> bool {
        self.version
    }

    pub fn print_version(&self) {
        println!("{}", config::version())
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    pub fn print_help(&self) -> Result<()> {
        Self::command().print_help().wrap_err("printing help")?;
        Ok(())
    }
}

pub mod constants;
pub(crate) mod defaults;
pub mod models;
pub mod utils;

pub use models::*;
pub use utils::*;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit the binary was built from, set through the `GIT_SHA` env at build time.
pub const GIT_SHA: &str = match option_env!("GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

pub fn version() -> String {
    format!("{} {} ({})", APP_NAME, VERSION, GIT_SHA)
}

/// Prints to stderr when `general.verbose` is enabled. Used for startup
/// progress before the logger is ready.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::config::Configuration::instance().general.verbose {
            eprintln!($($arg)*);
        }
    };
}

pub use verbose;

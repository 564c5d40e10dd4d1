//! CLI command handlers, one file per command.

mod cache_path;
mod cookies;
mod fetch;
mod generate;
mod serve;

pub use cache_path::run_cache_path;
pub use cookies::run_cookies;
pub use fetch::run_fetch;
pub use generate::{run_completions, run_man};
pub use serve::run_serve;

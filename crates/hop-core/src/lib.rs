pub mod config;
pub mod logging;

pub mod asset_cache;
pub mod category;
pub mod cookie_jar;
pub mod error;
pub mod fetch;
pub mod origin;
pub mod proxy;
pub mod proxy_config;
pub mod rewrite;

pub use error::ProxyError;

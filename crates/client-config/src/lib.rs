//! Configuration, paths, and logging bootstrap for the session client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_API_URL, DEFAULT_LOGIN_PATH, DEFAULT_LOG_LEVEL, DEFAULT_REFRESH_PATH,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::{ConfigError, ConfigResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;

//! Client configuration: schema, validation, and loading.

mod loader;
mod schema;

pub use loader::{ConfigLoader, load_config};
pub use schema::{
    ClientConfig, ConfigError, ConfigResult, LogFormat, LogLevel, LogOutput, LoggingConfig,
    LoginMethod, RetryConfig,
};

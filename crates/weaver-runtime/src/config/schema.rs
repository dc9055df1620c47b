//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Session name; the transport uses it to locate stored credentials.
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// How a fresh session authenticates.
    #[serde(default)]
    pub login_method: LoginMethod,

    /// Phone number for pairing-code login (country code, no `+`).
    #[serde(default)]
    pub phone_number: Option<String>,

    /// Command prefix.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Owner identities: bare numbers or full JIDs.
    #[serde(default)]
    pub owners: Vec<String>,

    /// Reconnect backoff policy.
    #[serde(default)]
    pub reconnect: RetryConfig,

    /// Root directory of the JSON key-value store.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session_id: default_session_id(),
            login_method: LoginMethod::default(),
            phone_number: None,
            prefix: default_prefix(),
            owners: Vec::new(),
            reconnect: RetryConfig::default(),
            store_path: default_store_path(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Checks the configuration for startup-fatal problems.
    ///
    /// Called by the client before any connection attempt; a pairing
    /// login without a usable phone number never reaches the transport.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }

        if self.login_method == LoginMethod::Pairing {
            let phone = self
                .phone_number
                .as_deref()
                .ok_or(ConfigError::MissingPhoneNumber)?;
            let digits = normalize_phone(phone);
            if digits.len() < 10 {
                return Err(ConfigError::InvalidPhoneNumber {
                    given: phone.to_string(),
                });
            }
        }

        Ok(())
    }

    /// The configured phone number reduced to digits, if present.
    pub fn normalized_phone(&self) -> Option<String> {
        self.phone_number.as_deref().map(normalize_phone)
    }
}

/// Strips everything that is not a digit (`+62 812-3456` → `628123456`).
fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

fn default_session_id() -> String {
    "weaver-session".to_string()
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./store")
}

/// How a fresh session authenticates against the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMethod {
    /// QR code scan (handled entirely by the transport).
    #[default]
    Qr,
    /// Pairing code entered on the phone; requires `phone_number`.
    Pairing,
}

/// Reconnect backoff policy.
///
/// Applied between sessions when a disconnect was not an explicit logout:
/// the delay starts at `initial_delay_ms`, multiplies by
/// `backoff_multiplier` per consecutive failure, and is clamped to
/// `max_delay_ms`. The counter resets once a session opens successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Give up after this many consecutive attempts; `None` retries
    /// forever.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Delay before the first reconnect attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for the delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// The delay before the given attempt (1-based), clamped to the
    /// configured maximum.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let factor = self.backoff_multiplier.max(1.0).powi(exponent as i32);
        let millis = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(millis as u64)
    }
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// ============================================================================
// Logging configuration
// ============================================================================

/// Logging settings consumed by [`crate::logging`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Output destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file path, for [`LogOutput::File`].
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-module level overrides (`module → level`).
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

/// Log severity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace.
    Trace,
    /// Debug.
    Debug,
    /// Info (default).
    #[default]
    Info,
    /// Warn.
    Warn,
    /// Error.
    Error,
}

impl LogLevel {
    /// Lowercase name, as used in filter directives.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line compact output (default).
    #[default]
    Compact,
    /// Standard fmt output.
    Full,
    /// Multi-line pretty output.
    Pretty,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output (default).
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
    /// A log file; requires `file_path`.
    File,
}

// ============================================================================
// Errors
// ============================================================================

/// Configuration errors. All of these are fatal to startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Pairing login configured without a phone number.
    #[error("phone number is required for pairing login (e.g. \"628123456789\")")]
    MissingPhoneNumber,

    /// The phone number has fewer than 10 digits after normalization.
    #[error("invalid phone number '{given}': use the country code without '+'")]
    InvalidPhoneNumber {
        /// The configured value.
        given: String,
    },

    /// The command prefix is empty.
    #[error("the command prefix must not be empty")]
    EmptyPrefix,

    /// The configuration sources could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert_eq!(config.prefix, "!");
        assert_eq!(config.login_method, LoginMethod::Qr);
        config.validate().unwrap();
    }

    #[test]
    fn pairing_requires_a_phone_number() {
        let config = ClientConfig {
            login_method: LoginMethod::Pairing,
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::MissingPhoneNumber
        ));
    }

    #[test]
    fn short_phone_numbers_are_rejected() {
        let config = ClientConfig {
            login_method: LoginMethod::Pairing,
            phone_number: Some("+62 812".to_string()),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidPhoneNumber { .. }
        ));
    }

    #[test]
    fn phone_numbers_are_normalized_to_digits() {
        let config = ClientConfig {
            login_method: LoginMethod::Pairing,
            phone_number: Some("+62 812-3456-7890".to_string()),
            ..ClientConfig::default()
        };
        config.validate().unwrap();
        assert_eq!(config.normalized_phone().unwrap(), "6281234567890");
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let config = ClientConfig {
            prefix: String::new(),
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate().unwrap_err(), ConfigError::EmptyPrefix));
    }

    #[test]
    fn backoff_grows_and_clamps() {
        let retry = RetryConfig {
            max_retries: None,
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(1000));
        assert_eq!(retry.delay_for(2), Duration::from_millis(2000));
        assert_eq!(retry.delay_for(3), Duration::from_millis(4000));
        assert_eq!(retry.delay_for(4), Duration::from_millis(5000));
        assert_eq!(retry.delay_for(60), Duration::from_millis(5000));
    }
}

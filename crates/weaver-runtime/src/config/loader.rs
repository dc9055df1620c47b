//! Configuration loading.
//!
//! Configuration is assembled with figment from, in increasing
//! precedence: built-in defaults, `weaver.toml` files found on the
//! search paths, explicitly named files, `WEAVER_*` environment
//! variables, and programmatic merges.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};

use super::schema::{ClientConfig, ConfigResult};

/// Default configuration file name searched on every search path.
const CONFIG_FILE_NAME: &str = "weaver.toml";

/// Prefix of configuration environment variables
/// (`WEAVER_PREFIX`, `WEAVER_LOGGING__LEVEL`, …).
const ENV_PREFIX: &str = "WEAVER_";

/// Loads configuration from the default locations: the current
/// directory, the user config directory, and the environment.
pub fn load_config() -> ConfigResult<ClientConfig> {
    ConfigLoader::new()
        .with_current_dir()
        .with_user_dir()
        .load()
}

/// Builder assembling a [`ClientConfig`] from several sources.
///
/// ```rust,ignore
/// let config = ConfigLoader::new()
///     .file("config/production.toml")
///     .load()?;
/// ```
#[derive(Default)]
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
    files: Vec<PathBuf>,
    env: bool,
    overrides: Vec<ClientConfig>,
}

impl ConfigLoader {
    /// Creates a loader with environment variables enabled and no
    /// search paths.
    pub fn new() -> Self {
        Self {
            env: true,
            ..Self::default()
        }
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(mut self) -> Self {
        self.search_paths.push(PathBuf::from("."));
        self
    }

    /// Adds the user configuration directory (`~/.config/weaver` on
    /// Linux) to the search paths.
    pub fn with_user_dir(mut self) -> Self {
        if let Some(dir) = dirs::config_dir() {
            self.search_paths.push(dir.join("weaver"));
        }
        self
    }

    /// Adds a directory to search for `weaver.toml`.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds a specific configuration file. Missing files are skipped.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files.push(path.as_ref().to_path_buf());
        self
    }

    /// Disables the `WEAVER_*` environment provider.
    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Merges a configuration programmatically, at the highest
    /// precedence.
    pub fn merge(mut self, config: ClientConfig) -> Self {
        self.overrides.push(config);
        self
    }

    /// Assembles and extracts the configuration.
    pub fn load(&self) -> ConfigResult<ClientConfig> {
        let mut figment = Figment::from(Serialized::defaults(ClientConfig::default()));

        for dir in &self.search_paths {
            figment = figment.merge(Toml::file(dir.join(CONFIG_FILE_NAME)));
        }
        for file in &self.files {
            figment = figment.merge(Toml::file(file));
        }
        if self.env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        for config in &self.overrides {
            figment = figment.merge(Serialized::defaults(config.clone()));
        }

        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::super::schema::LoginMethod;
    use super::*;

    #[test]
    fn defaults_without_sources() {
        let config = ConfigLoader::new().without_env().load().unwrap();
        assert_eq!(config.prefix, "!");
        assert_eq!(config.session_id, "weaver-session");
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r##"
prefix = "#"
owners = ["628000111222"]
login_method = "pairing"
phone_number = "628000111222"

[reconnect]
max_retries = 5
"##
        )
        .unwrap();

        let config = ConfigLoader::new().without_env().file(&path).load().unwrap();
        assert_eq!(config.prefix, "#");
        assert_eq!(config.owners, vec!["628000111222".to_string()]);
        assert_eq!(config.login_method, LoginMethod::Pairing);
        assert_eq!(config.reconnect.max_retries, Some(5));
    }

    #[test]
    fn missing_file_is_skipped() {
        let config = ConfigLoader::new()
            .without_env()
            .file("/no/such/weaver.toml")
            .load()
            .unwrap();
        assert_eq!(config.prefix, "!");
    }

    #[test]
    fn programmatic_merge_wins() {
        let config = ConfigLoader::new()
            .without_env()
            .merge(ClientConfig {
                prefix: ">".to_string(),
                ..ClientConfig::default()
            })
            .load()
            .unwrap();
        assert_eq!(config.prefix, ">");
    }
}

//! Layered configuration loading via figment.
//!
//! # Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides passed to [`ConfigLoader::merge`]
//! 3. Profile file (`xiaoci.{profile}.toml`)
//! 4. Main file (`xiaoci.toml` or `config.toml`)
//! 5. Environment variables (`XIAOCI_*`)
//!
//! TOML files need the `toml-config` feature and YAML files need
//! `yaml-config`. Without either, only defaults and the environment apply.
//!
//! # Environment Variable Mapping
//!
//! `__` separates nesting levels:
//!
//! - `XIAOCI_CONNECTION__URL=ws://10.0.0.2:3001` → `connection.url`
//! - `XIAOCI_API__ACCESS_TOKEN=xxx` → `api.access_token`
//! - `XIAOCI_LOGGING__LEVEL=debug` → `logging.level`
//!
//! ```rust,ignore
//! let config = ConfigLoader::new().profile("production").load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::XiaociConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "XIAOCI_";

/// Environment variable selecting the profile.
pub const PROFILE_ENV: &str = "XIAOCI_PROFILE";

/// Configuration profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name. `dev` and `prod` are accepted as aliases.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            _ => Self::Custom(name.to_string()),
        }
    }

    /// Reads `XIAOCI_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for a layered [`XiaociConfig`].
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search. When none are given the current
    /// directory and `{config_dir}/xiaoci` are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Layers a full config over the defaults, below files and environment.
    pub fn merge(mut self, config: XiaociConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    pub fn load(self) -> ConfigResult<XiaociConfig> {
        let profile = self.profile.clone();
        let config: XiaociConfig = self
            .build_figment()?
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!(
            profile = %profile,
            connection = %config.connection.url,
            api = %config.api.url,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(self) -> ConfigResult<Figment> {
        let mut figment =
            Figment::from(Serialized::defaults(XiaociConfig::default())).merge(self.overrides.clone());

        match &self.config_file {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration file");
                figment = merge_file(figment, path)?;
            }
            Some(path) => return Err(ConfigError::FileNotFound(path.clone())),
            None => figment = self.search_files(figment)?,
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        Ok(figment)
    }

    fn resolved_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("xiaoci")))
            .collect()
    }

    /// For each directory, the profile variant of a base name is merged
    /// first and the first base file found ends the search.
    fn search_files(&self, mut figment: Figment) -> ConfigResult<Figment> {
        let names = candidate_names();
        for dir in self.resolved_search_paths() {
            for name in &names {
                let Some((stem, ext)) = name.rsplit_once('.') else {
                    continue;
                };

                let profiled = dir.join(format!("{stem}.{}.{ext}", self.profile));
                if profiled.exists() {
                    debug!(path = %profiled.display(), "Loading profile configuration");
                    figment = merge_file(figment, &profiled)?;
                }

                let base = dir.join(name);
                if base.exists() {
                    info!(path = %base.display(), "Loading configuration file");
                    return merge_file(figment, &base);
                }
            }
        }

        warn!("No configuration file found, using defaults");
        Ok(figment)
    }
}

fn candidate_names() -> Vec<&'static str> {
    #[allow(unused_mut)]
    let mut names = Vec::new();
    #[cfg(feature = "toml-config")]
    names.extend(["xiaoci.toml", "config.toml"]);
    #[cfg(feature = "yaml-config")]
    names.extend(["xiaoci.yaml", "xiaoci.yml", "config.yaml", "config.yml"]);
    names
}

fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => {
            let _ = figment;
            Err(ConfigError::ParseError(format!(
                "unsupported or disabled configuration format: .{ext}"
            )))
        }
    }
}

/// Loads from the default locations with environment overrides.
pub fn load_config() -> ConfigResult<XiaociConfig> {
    ConfigLoader::new().load()
}

/// Loads a specific file with environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<XiaociConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use figment::Jail;

    #[test]
    fn test_defaults_without_sources() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config, XiaociConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        Jail::expect_with(|jail| {
            jail.set_env("XIAOCI_DEDUP__CAPACITY", "64");
            jail.set_env("XIAOCI_CONNECTION__ACCESS_TOKEN", "secret");
            jail.set_env("XIAOCI_LOGGING__LEVEL", "debug");
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.dedup.capacity, 64);
            assert_eq!(config.connection.access_token.as_deref(), Some("secret"));
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[test]
    fn test_merge_sits_below_env() {
        Jail::expect_with(|jail| {
            jail.set_env("XIAOCI_API__TIMEOUT_SECS", "5");
            let mut base = XiaociConfig::default();
            base.api.timeout_secs = 90;
            base.dedup.capacity = 10;
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(base)
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.api.timeout_secs, 5);
            assert_eq!(config.dedup.capacity, 10);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|jail| {
            let err = ConfigLoader::new()
                .file(jail.directory().join("absent.toml"))
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::FileNotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse_and_env() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("DEV"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");

        Jail::expect_with(|jail| {
            jail.set_env(PROFILE_ENV, "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_with_profile_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "xiaoci.staging.toml",
                r#"
                [dedup]
                capacity = 200
                [api]
                timeout_secs = 7
                "#,
            )?;
            jail.create_file(
                "xiaoci.toml",
                r#"
                [connection]
                url = "wss://gateway.example:3001"
                [dedup]
                capacity = 300
                [forward]
                nickname = "bot"
                "#,
            )?;
            jail.set_env("XIAOCI_API__URL", "https://api.example");

            let config = ConfigLoader::new()
                .profile("staging")
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.connection.url, "wss://gateway.example:3001");
            assert_eq!(config.dedup.capacity, 300);
            assert_eq!(config.api.timeout_secs, 7);
            assert_eq!(config.api.url, "https://api.example");
            assert_eq!(config.forward.nickname, "bot");
            assert_eq!(config.forward.prompt, "你好，欢迎光临");
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_explicit_file_skips_search() {
        Jail::expect_with(|jail| {
            jail.create_file("xiaoci.toml", "[dedup]\ncapacity = 1\n")?;
            jail.create_file("custom.toml", "[dedup]\ncapacity = 2\n")?;
            let config = ConfigLoader::new()
                .without_env()
                .file("custom.toml")
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.dedup.capacity, 2);
            Ok(())
        });
    }
}

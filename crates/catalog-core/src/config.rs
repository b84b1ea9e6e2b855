//! Lightweight configuration loader and typed settings.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys use `__`, e.g. `APP_BACKEND__SEARCH_URL`). Every section has a
//! default, so a missing file only means defaults.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::filter::YearRange;
use crate::types::Language;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_in(Path::new("."), &env_name)
    }

    /// Loads the config files found in `base` for the given environment name.
    pub fn load_in(base: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Toml::file(base.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Like [`Config::get`], but an absent key yields `T::default()`. A present
    /// key with a malformed value is still an error.
    pub fn get_or_default<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.find_value(key).is_err() {
            return Ok(T::default());
        }
        self.get(key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL of the hosted search engine.
    pub search_url: String,
    pub index: String,
    /// Base URL of the application API serving vocabulary and collections.
    pub api_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub hits_per_page: u32,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            search_url: "http://127.0.0.1:7700".to_string(),
            index: "pages".to_string(),
            api_url: "http://127.0.0.1:3000/api".to_string(),
            api_key: None,
            timeout_secs: 15,
            hits_per_page: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchSettings {
    pub year_start: i32,
    pub year_end: i32,
    pub input_debounce_ms: u64,
    pub query_debounce_ms: u64,
    /// Most hits shown for one expanded work, first hit included.
    pub expansion_cap: usize,
    pub default_language: Language,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            year_start: 1600,
            year_end: 1800,
            input_debounce_ms: 400,
            query_debounce_ms: 400,
            expansion_cap: 10,
            default_language: Language::Et,
        }
    }
}

impl SearchSettings {
    pub fn year_span(&self) -> YearRange {
        YearRange::new(self.year_start, self.year_end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionSettings {
    pub state_file: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { state_file: "~/.local/state/catalog/session.json".to_string() }
    }
}

impl SessionSettings {
    pub fn state_path(&self) -> PathBuf {
        expand_path(&self.state_file)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub backend: BackendSettings,
    pub search: SearchSettings,
    pub session: SessionSettings,
}

impl Settings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings = Self {
            backend: config.get_or_default("backend")?,
            search: config.get_or_default("search")?,
            session: config.get_or_default("session")?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.search.year_start > self.search.year_end {
            return Err(Error::InvalidConfig(format!(
                "search.year_start ({}) is after search.year_end ({})",
                self.search.year_start, self.search.year_end
            )));
        }
        if self.search.expansion_cap == 0 {
            return Err(Error::InvalidConfig("search.expansion_cap must be at least 1".into()));
        }
        if self.backend.hits_per_page == 0 {
            return Err(Error::InvalidConfig("backend.hits_per_page must be at least 1".into()));
        }
        if self.backend.search_url.trim().is_empty() {
            return Err(Error::InvalidConfig("backend.search_url is empty".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

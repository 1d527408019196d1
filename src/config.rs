//! Runtime configuration.
//!
//! Values come from an optional `licscrape.toml` in the working directory,
//! overridden by `LICSCRAPE_*` environment variables (a `.env` file is loaded
//! into the environment first).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Deserializer};

const CONFIG_FILE: &str = "licscrape.toml";
const ENV_PREFIX: &str = "LICSCRAPE_";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Level for this crate's own events; `RUST_LOG` overrides the whole filter.
    pub log_level: String,
    /// Directory holding the caches and exports of every target.
    pub data_dir: PathBuf,
    /// Pause before every request.
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_delay: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
    pub user_agent: Option<String>,
    /// CSV with a `zip` column listing the zip codes Maryland is searched by.
    pub maryland_zip_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: PathBuf::from("."),
            request_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            user_agent: None,
            maryland_zip_file: PathBuf::from("data/md_zip.csv"),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::figment().extract().context("Failed to load config")
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn cache_path(&self, target: &str) -> PathBuf {
        self.data_dir.join(format!("{target}.json"))
    }

    pub fn export_path(&self, target: &str) -> PathBuf {
        self.data_dir.join(format!("{target}.csv"))
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent
            .as_deref()
            .unwrap_or(concat!("licscrape/", env!("CARGO_PKG_VERSION")))
    }
}

/// Accepts `500ms`, `2s`, `1m` and bare numbers of seconds.
fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => fundu::parse_duration(text.trim())
            .map_err(|e| serde::de::Error::custom(format!("invalid duration {text:?}: {e}"))),
    }
}

#![forbid(unsafe_code)]

use crate::SettingsError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "ARBOR_DATA_DIR";
pub const CONTENT_CACHE_ENV: &str = "ARBOR_CONTENT_CACHE";
pub const CACHE_DIR_ENV: &str = "ARBOR_CACHE_DIR";
pub const COUNTER_DIR_ENV: &str = "ARBOR_COUNTER_DIR";
pub const MAX_CASCADE_DEPTH_ENV: &str = "ARBOR_MAX_CASCADE_DEPTH";

const DATABASE_FILE: &str = "arbor.db";
const DEFAULT_MAX_CASCADE_DEPTH: usize = 16;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Process settings shared by stores, the pool and analysis modules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub content_cache: bool,
    pub cache_dir: Option<PathBuf>,
    pub counter_dir: Option<PathBuf>,
    pub max_cascade_depth: usize,
    pub busy_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("arbor-data"),
            content_cache: false,
            cache_dir: None,
            counter_dir: None,
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl Settings {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Reads a JSON settings file; missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Defaults overlaid with `ARBOR_*` environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::default().apply_env()
    }

    pub fn apply_env(self) -> Result<Self, SettingsError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = non_empty(lookup(DATA_DIR_ENV)) {
            self.data_dir = PathBuf::from(raw);
        }
        if let Some(raw) = non_empty(lookup(CONTENT_CACHE_ENV)) {
            self.content_cache = parse_flag(CONTENT_CACHE_ENV, raw)?;
        }
        if let Some(raw) = non_empty(lookup(CACHE_DIR_ENV)) {
            self.cache_dir = Some(PathBuf::from(raw));
        }
        if let Some(raw) = non_empty(lookup(COUNTER_DIR_ENV)) {
            self.counter_dir = Some(PathBuf::from(raw));
        }
        if let Some(raw) = non_empty(lookup(MAX_CASCADE_DEPTH_ENV)) {
            self.max_cascade_depth = raw
                .parse::<usize>()
                .map_err(|_| SettingsError::InvalidValue {
                    key: MAX_CASCADE_DEPTH_ENV,
                    value: raw,
                })?;
        }
        Ok(self)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn cache_root(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("cache"))
    }

    pub fn counter_root(&self) -> PathBuf {
        self.counter_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("counters"))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_flag(key: &'static str, raw: String) -> Result<bool, SettingsError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::InvalidValue { key, value: raw }),
    }
}

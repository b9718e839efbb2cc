//! Configuration loader and validator for the ZSXQ→Feishu relay.
//!
//! Settings come from an optional YAML file; the secrets and the target ids can
//! also be supplied (or overridden) through environment variables.
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{FeedFilter, ZSXQ_DYNAMICS_URL};
use crate::ledger::DEFAULT_RETENTION_DAYS;
use crate::relay::RunSettings;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

pub const ENV_COOKIES: &str = "ZSXQ_COOKIES";
pub const ENV_WEBHOOK_URL: &str = "FEISHU_WEBHOOK_URL";
pub const ENV_SIGN_KEY: &str = "FEISHU_SIGN_KEY";
pub const ENV_GROUP_ID: &str = "TARGET_GROUP_ID";
pub const ENV_USER_ID: &str = "TARGET_USER_ID";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub zsxq: Zsxq,
    #[serde(default)]
    pub feishu: Feishu,
    #[serde(default)]
    pub filter: Filter,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct App {
    pub ledger_path: String,
    pub send_interval_ms: u64,
    pub retention_days: u32,
}

impl Default for App {
    fn default() -> Self {
        Self {
            ledger_path: "sent_messages.json".into(),
            send_interval_ms: 1000,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Feed endpoint and the cookie header captured from a logged-in browser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Zsxq {
    pub api_url: String,
    pub cookies: String,
}

impl Default for Zsxq {
    fn default() -> Self {
        Self {
            api_url: ZSXQ_DYNAMICS_URL.into(),
            cookies: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Feishu {
    pub webhook_url: String,
    pub sign_key: String,
}

/// Group and author whose posts are relayed. Ids may be written as numbers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Filter {
    #[serde(deserialize_with = "string_or_int")]
    pub target_group_id: String,
    #[serde(deserialize_with = "string_or_int")]
    pub target_user_id: String,
}

fn string_or_int<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Int(i64),
    }
    Ok(match Id::deserialize(de)? {
        Id::Str(s) => s,
        Id::Int(n) => n.to_string(),
    })
}

impl Config {
    /// Ensure the directory holding the ledger file exists.
    pub fn ensure_dirs(&self) -> Result<(), io::Error> {
        match Path::new(&self.app.ledger_path).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        PathBuf::from(&self.app.ledger_path)
    }

    pub fn feed_filter(&self) -> FeedFilter {
        FeedFilter::new(
            self.filter.target_group_id.clone(),
            self.filter.target_user_id.clone(),
        )
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            send_interval: Duration::from_millis(self.app.send_interval_ms),
            retention_days: self.app.retention_days,
        }
    }

    /// Override fields from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Override fields from `lookup`; empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_COOKIES) {
            self.zsxq.cookies = v;
        }
        if let Some(v) = get(ENV_WEBHOOK_URL) {
            self.feishu.webhook_url = v;
        }
        if let Some(v) = get(ENV_SIGN_KEY) {
            self.feishu.sign_key = v;
        }
        if let Some(v) = get(ENV_GROUP_ID) {
            self.filter.target_group_id = v;
        }
        if let Some(v) = get(ENV_USER_ID) {
            self.filter.target_user_id = v;
        }
    }
}

/// Load configuration, apply environment overrides and validate.
/// - If `path` is None, `config.yaml` is read when present; otherwise the
///   environment alone must supply the required values.
/// - An explicitly given path must exist.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut cfg = read_file(path)?;
    cfg.apply_env();
    validate(&cfg)?;
    Ok(cfg)
}

fn read_file(path: Option<&Path>) -> Result<Config, ConfigError> {
    let content = match path {
        Some(path) => fs::read_to_string(path)?,
        None => match fs::read_to_string(DEFAULT_CONFIG_PATH) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(err) => return Err(err.into()),
        },
    };
    Ok(serde_yaml::from_str(&content)?)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.ledger_path.trim().is_empty() {
        return Err(ConfigError::Invalid("app.ledger_path must be non-empty"));
    }
    if cfg.app.retention_days == 0 {
        return Err(ConfigError::Invalid("app.retention_days must be > 0"));
    }
    if cfg.zsxq.api_url.trim().is_empty() {
        return Err(ConfigError::Invalid("zsxq.api_url must be non-empty"));
    }
    if cfg.zsxq.cookies.trim().is_empty() {
        return Err(ConfigError::Invalid("zsxq.cookies must be non-empty (or set ZSXQ_COOKIES)"));
    }
    if cfg.feishu.webhook_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "feishu.webhook_url must be non-empty (or set FEISHU_WEBHOOK_URL)",
        ));
    }
    if cfg.feishu.sign_key.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "feishu.sign_key must be non-empty (or set FEISHU_SIGN_KEY)",
        ));
    }
    if cfg.filter.target_group_id.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "filter.target_group_id must be non-empty (or set TARGET_GROUP_ID)",
        ));
    }
    if cfg.filter.target_user_id.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "filter.target_user_id must be non-empty (or set TARGET_USER_ID)",
        ));
    }
    Ok(())
}

/// Sample configuration file.
pub fn example() -> &'static str {
    r#"app:
  ledger_path: "./data/sent_messages.json"
  send_interval_ms: 1000
  retention_days: 7

zsxq:
  api_url: "https://api.zsxq.com/v2/dynamics?scope=general&count=30"
  cookies: "zsxq_access_token=YOUR_TOKEN"

feishu:
  webhook_url: "https://open.feishu.cn/open-apis/bot/v2/hook/YOUR_HOOK_ID"
  sign_key: "YOUR_SIGN_KEY"

filter:
  target_group_id: 48415284844818
  target_user_id: "585221881285214"
"#
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

pub const WEBHOOK_URL_ENV: &str = "DISCORD_WEBHOOK_URL";
pub const ACCESS_TOKEN_ENV: &str = "LINE_CHANNEL_ACCESS_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Six-character sender id prefix → fixed display name.
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineConfig {
    #[serde(default)]
    pub channel_access_token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_data_api_base")]
    pub data_api_base: String,
}

fn default_api_base() -> String {
    "https://api.line.me".to_string()
}

fn default_data_api_base() -> String {
    "https://api-data.line.me".to_string()
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_access_token: None,
            api_base: default_api_base(),
            data_api_base: default_data_api_base(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    /// Maximum number of cached display names. `0` means unbounded.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default)]
    pub on_fetch_failure: FetchFailurePolicy,
}

fn default_timeout() -> u64 {
    10
}

fn default_max_file_size() -> usize {
    8 * 1024 * 1024 // Discord free-tier webhook upload limit
}

fn default_cache_capacity() -> usize {
    1024
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_file_size: default_max_file_size(),
            cache_capacity: default_cache_capacity(),
            on_fetch_failure: FetchFailurePolicy::default(),
        }
    }
}

/// What to relay when an image or video cannot be downloaded from LINE.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    /// Drop the event; nothing is posted.
    #[default]
    Skip,
    /// Post a short text notice in place of the media.
    Notify,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_keep_files")]
    pub keep_files: usize,
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_keep_files() -> usize {
    7
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            keep_files: default_keep_files(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("Failed to read config: {e}")))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise start from defaults, then apply
    /// environment overrides.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay the two required secrets from the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(WEBHOOK_URL_ENV).filter(|v| !v.is_empty()) {
            self.discord.webhook_url = Some(url);
        }
        if let Some(token) = lookup(ACCESS_TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.line.channel_access_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.webhook_url()?;
        let parsed = url::Url::parse(url)
            .map_err(|e| RelayError::Config(format!("Invalid Discord webhook URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RelayError::Config(format!(
                "Discord webhook URL must be http(s), got '{}'",
                parsed.scheme()
            )));
        }
        self.access_token()?;

        if let Some(prefix) = self.overrides.keys().find(|k| k.chars().count() != 6) {
            return Err(RelayError::Config(format!(
                "Override prefix '{prefix}' must be exactly 6 characters"
            )));
        }
        Ok(())
    }

    pub fn webhook_url(&self) -> Result<&str> {
        non_empty(self.discord.webhook_url.as_deref()).ok_or_else(|| {
            RelayError::Config(format!(
                "Discord webhook URL is required (set {WEBHOOK_URL_ENV} or discord.webhook_url)"
            ))
        })
    }

    pub fn access_token(&self) -> Result<&str> {
        non_empty(self.line.channel_access_token.as_deref()).ok_or_else(|| {
            RelayError::Config(format!(
                "LINE channel access token is required (set {ACCESS_TOKEN_ENV} or line.channel_access_token)"
            ))
        })
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".linecord")
            .join("config.toml")
    }

    pub fn default_toml() -> &'static str {
        r#"[server]
bind = "0.0.0.0:5000"

[line]
channel_access_token = "${LINE_CHANNEL_ACCESS_TOKEN}"

[discord]
webhook_url = "${DISCORD_WEBHOOK_URL}"

[relay]
timeout_secs = 10
max_file_size = 8388608
cache_capacity = 1024
on_fetch_failure = "skip"

[logging]
dir = "logs"
keep_files = 7

# Fixed display names, keyed by the first 6 characters of the LINE user id
[overrides]
# U1a2b3 = "Alice"
"#
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid")
});

/// Substitute `${VAR_NAME}` patterns with environment variable values.
pub fn substitute_env_vars(input: &str) -> String {
    ENV_VAR_RE
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .to_string()
}

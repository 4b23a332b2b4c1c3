use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_LIGHTS_PATH: &str = "config/lights.json";
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub controller: Option<ControllerSection>,
    #[serde(default)]
    pub feed: Option<FeedSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControllerSection {
    /// Light configuration JSON (default: config/lights.json)
    pub lights_path: Option<PathBuf>,
    /// Tick interval in milliseconds (default: 1000)
    pub tick_interval_ms: Option<u64>,
    /// Start in adaptive mode (default: true)
    pub adaptive_mode: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedSection {
    /// Scripted detection frames to replay
    pub script_path: Option<PathBuf>,
    /// Restart the script when it runs out (default: false)
    pub loop_script: Option<bool>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    /// Returns the light configuration path (default: config/lights.json)
    pub fn lights_path(&self) -> &Path {
        self.controller
            .as_ref()
            .and_then(|c| c.lights_path.as_deref())
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new(DEFAULT_LIGHTS_PATH))
    }

    /// Returns the tick interval as Duration (default: 1 second)
    pub fn tick_interval(&self) -> Duration {
        let millis = self
            .controller
            .as_ref()
            .and_then(|c| c.tick_interval_ms)
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_TICK_INTERVAL_MS);
        Duration::from_millis(millis)
    }

    pub fn adaptive_mode(&self) -> bool {
        self.controller
            .as_ref()
            .and_then(|c| c.adaptive_mode)
            .unwrap_or(true)
    }

    pub fn script_path(&self) -> Option<&Path> {
        let path = self.feed.as_ref()?.script_path.as_deref()?;
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }

    pub fn loop_script(&self) -> bool {
        self.feed
            .as_ref()
            .and_then(|f| f.loop_script)
            .unwrap_or(false)
    }

    /// Parsed `[logging].level`, falling back to INFO.
    pub fn log_level(&self) -> tracing::Level {
        self.logging.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

//! Probe configuration
//!
//! Defaults are built in; a TOML file can override any of them and the CLI
//! overrides the file. All TOML keys are optional:
//!
//! ```toml
//! registry = "https://crates.io"
//! crate = "ring"
//! crates_dir = "crates"
//! build_command = ["cargo", "build"]
//! latest = "registry-order"   # or "highest-semver"
//! http_timeout_secs = 30
//! download_timeout_secs = 300
//!
//! [consumer]
//! enabled = true
//! name = "eventsource_client"
//! repository = "https://github.com/launchdarkly/rust-eventsource-client.git"
//! build_command = ["cargo", "build", "--all-features"]
//! ```

use super::error::{ProbeError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REGISTRY: &str = "https://crates.io";
pub const DEFAULT_CRATE: &str = "ring";
pub const DEFAULT_CRATES_DIR: &str = "crates";
pub const DEFAULT_CONSUMER_NAME: &str = "eventsource_client";
pub const DEFAULT_CONSUMER_REPOSITORY: &str =
    "https://github.com/launchdarkly/rust-eventsource-client.git";

/// Default HTTP timeout in seconds
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Archive downloads stream a whole body, so they get a longer default.
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// How `latest` is resolved against the registry's version list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LatestStrategy {
    /// First entry of the list; the registry returns newest first.
    #[default]
    RegistryOrder,
    /// Highest semantic version among entries that parse as semver.
    HighestSemver,
}

/// Downstream project built against the locally extracted crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    pub enabled: bool,
    /// Used for the clone directory and log file names.
    pub name: String,
    pub repository: String,
    /// Falls back to the top-level build command when unset.
    pub build_command: Option<Vec<String>>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: DEFAULT_CONSUMER_NAME.to_string(),
            repository: DEFAULT_CONSUMER_REPOSITORY.to_string(),
            build_command: None,
        }
    }
}

/// Fully resolved configuration passed into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub registry: String,
    pub krate: String,
    pub crates_dir: PathBuf,
    pub build_command: Vec<String>,
    pub latest: LatestStrategy,
    /// Registry API requests.
    pub http_timeout: Duration,
    /// The whole `.crate` download, body included.
    pub download_timeout: Duration,
    pub consumer: ConsumerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            krate: DEFAULT_CRATE.to_string(),
            crates_dir: PathBuf::from(DEFAULT_CRATES_DIR),
            build_command: vec!["cargo".to_string(), "build".to_string()],
            latest: LatestStrategy::default(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            consumer: ConsumerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    registry: Option<String>,
    #[serde(rename = "crate")]
    krate: Option<String>,
    crates_dir: Option<PathBuf>,
    build_command: Option<Vec<String>>,
    latest: Option<LatestStrategy>,
    http_timeout_secs: Option<u64>,
    download_timeout_secs: Option<u64>,
    consumer: Option<ConsumerToml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConsumerToml {
    enabled: Option<bool>,
    name: Option<String>,
    repository: Option<String>,
    build_command: Option<Vec<String>>,
}

impl Config {
    /// Load configuration, layering an optional TOML file over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            let text = std::fs::read_to_string(path)
                .map_err(ProbeError::fs("cannot read config", path))?;
            config.apply_toml(&text).map_err(|e| match e {
                ProbeError::Config(msg) => {
                    ProbeError::Config(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })?;
        }
        Ok(config)
    }

    /// Parse a TOML document over the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config = Self::default();
        config.apply_toml(text)?;
        Ok(config)
    }

    fn apply_toml(&mut self, text: &str) -> Result<()> {
        let parsed: ConfigToml =
            toml::from_str(text).map_err(|e| ProbeError::Config(e.message().to_string()))?;

        if let Some(registry) = parsed.registry {
            self.registry = registry;
        }
        if let Some(krate) = parsed.krate {
            self.krate = krate;
        }
        if let Some(dir) = parsed.crates_dir {
            self.crates_dir = dir;
        }
        if let Some(cmd) = parsed.build_command {
            self.build_command = cmd;
        }
        if let Some(latest) = parsed.latest {
            self.latest = latest;
        }
        if let Some(secs) = parsed.http_timeout_secs {
            // Clamp to reasonable range (5-300 seconds)
            self.http_timeout = Duration::from_secs(secs.clamp(5, 300));
        }
        if let Some(secs) = parsed.download_timeout_secs {
            self.download_timeout = Duration::from_secs(secs.clamp(5, 3600));
        }
        if let Some(consumer) = parsed.consumer {
            if let Some(enabled) = consumer.enabled {
                self.consumer.enabled = enabled;
            }
            if let Some(name) = consumer.name {
                self.consumer.name = name;
            }
            if let Some(repository) = consumer.repository {
                self.consumer.repository = repository;
            }
            if consumer.build_command.is_some() {
                self.consumer.build_command = consumer.build_command;
            }
        }
        Ok(())
    }

    /// Check the configuration before any network activity.
    pub fn validate(&self) -> Result<()> {
        if self.krate.trim().is_empty() {
            return Err(ProbeError::Config("crate name is empty".to_string()));
        }
        if !(self.registry.starts_with("https://") || self.registry.starts_with("http://")) {
            return Err(ProbeError::Config(format!(
                "registry must be an http(s) URL, got: {}",
                self.registry
            )));
        }
        if self.build_command.is_empty() {
            return Err(ProbeError::Config("build_command is empty".to_string()));
        }
        if self.consumer.enabled {
            if self.consumer.name.trim().is_empty() {
                return Err(ProbeError::Config("consumer name is empty".to_string()));
            }
            if self.consumer.build_command.as_ref().is_some_and(Vec::is_empty) {
                return Err(ProbeError::Config(
                    "consumer build_command is empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Registry base URL without a trailing slash.
    pub fn registry_base(&self) -> &str {
        self.registry.trim_end_matches('/')
    }

    /// Build command for the consumer project.
    pub fn consumer_build_command(&self) -> &[String] {
        self.consumer
            .build_command
            .as_deref()
            .unwrap_or(&self.build_command)
    }
}

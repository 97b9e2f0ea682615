//! # Application Configuration
//!
//! Loads `seogen.yml` and layers `SEOGEN__...` environment variables on top.
//! `${VAR}` references in the file are expanded before parsing, which is how
//! API keys are usually supplied:
//!
//! ```yaml
//! provider:
//!   kind: openai
//!   model: gpt-3.5-turbo
//!   api_keys: ["${OPENAI_KEY_1}", "${OPENAI_KEY_2}"]
//! ```

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use regex::Regex;
use seogen::links::DEFAULT_LINK_TIMEOUT;
use seogen::providers::{ProviderKind, ProviderSettings};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::info;

/// The file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "seogen.yml";

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(?P<var>[A-Za-z0-9_]+)\}").expect("env reference pattern is valid")
});

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// Indicates an explicitly requested configuration file was not found.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The root configuration structure, mapping directly to `seogen.yml`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    /// Replaces the built-in system prompt sent with every content prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// When set, logs go to a timestamped file in this directory instead of stderr.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// The text-generation backend and the credentials to spread the batch over.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
    /// One worker is started per non-empty key.
    #[serde(default)]
    pub api_keys: Vec<String>,
}

fn default_model() -> String {
    ProviderSettings::default().model
}

fn default_request_timeout_secs() -> u64 {
    ProviderSettings::default().timeout_secs
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            api_url: None,
            model: default_model(),
            timeout_secs: default_request_timeout_secs(),
            api_keys: Vec::new(),
        }
    }
}

impl ProviderConfig {
    pub fn settings(&self) -> ProviderSettings {
        ProviderSettings {
            kind: self.kind,
            api_url: self.api_url.clone(),
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
        }
    }

    /// The configured keys, minus the ones left empty by unset `${VAR}` references.
    pub fn credentials(&self) -> Vec<String> {
        self.api_keys
            .iter()
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Text-generation calls allowed per minute and per credential.
    #[serde(default = "default_calls_per_minute")]
    pub calls_per_minute: u32,
    /// Image-generation calls allowed per minute and per credential.
    #[serde(default = "default_image_calls_per_minute")]
    pub image_calls_per_minute: u32,
}

fn default_calls_per_minute() -> u32 {
    3
}

fn default_image_calls_per_minute() -> u32 {
    5
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            calls_per_minute: default_calls_per_minute(),
            image_calls_per_minute: default_image_calls_per_minute(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinksConfig {
    #[serde(default = "default_link_timeout_secs")]
    pub timeout_secs: u64,
    /// Probe each distinct URL only once per run.
    #[serde(default = "default_true")]
    pub memoize: bool,
}

fn default_link_timeout_secs() -> u64 {
    DEFAULT_LINK_TIMEOUT.as_secs()
}

fn default_true() -> bool {
    true
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_link_timeout_secs(),
            memoize: true,
        }
    }
}

impl LinksConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImagesConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_image_size")]
    pub size: String,
    /// The URL `paths.images_dir` is published under.
    #[serde(default)]
    pub public_url: String,
}

fn default_image_size() -> String {
    "512x512".to_string()
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: None,
            model: None,
            size: default_image_size(),
            public_url: String::new(),
        }
    }
}

/// Where inputs are read from and outputs written to. Category-specific
/// directories are created below `options_dir`, `output_dir` and `images_dir`.
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_cities_csv")]
    pub cities_csv: PathBuf,
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: PathBuf,
    #[serde(default = "default_options_dir")]
    pub options_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
}

fn default_cities_csv() -> PathBuf {
    PathBuf::from("data/cities.csv")
}

fn default_prompts_dir() -> PathBuf {
    PathBuf::from("prompts")
}

fn default_options_dir() -> PathBuf {
    PathBuf::from("data/options")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("output/images")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cities_csv: default_cities_csv(),
            prompts_dir: default_prompts_dir(),
            options_dir: default_options_dir(),
            output_dir: default_output_dir(),
            images_dir: default_images_dir(),
        }
    }
}

impl PathsConfig {
    pub fn prompts_for(&self, category: &str) -> PathBuf {
        self.prompts_dir.join(format!("{category}.json"))
    }

    pub fn options_for(&self, category: &str) -> PathBuf {
        self.options_dir.join(category)
    }

    pub fn output_for(&self, category: &str) -> PathBuf {
        self.output_dir.join(category)
    }

    pub fn images_for(&self, category: &str) -> PathBuf {
        self.images_dir.join(category)
    }
}

/// Replaces every `${VAR}` with the value of the environment variable, or with
/// an empty string when it is unset.
pub fn substitute_env(content: &str) -> String {
    ENV_REFERENCE
        .replace_all(content, |caps: &regex::Captures| {
            env::var(&caps["var"]).unwrap_or_default()
        })
        .into_owned()
}

// Reads a file and expands `${VAR}` references.
// Returns Ok(None) if the file does not exist.
fn read_and_substitute(path: &Path) -> Result<Option<String>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| {
        ConfigError::General(format!(
            "Failed to read config file '{}': {e}",
            path.display()
        ))
    })?;
    Ok(Some(substitute_env(&content)))
}

/// Loads the application configuration from a file and environment variables.
///
/// - An explicit `config_path` must exist; the default `seogen.yml` is optional.
/// - Nested keys are overridden by `SEOGEN__...` variables, e.g.
///   `SEOGEN__RATE_LIMIT__CALLS_PER_MINUTE=20` or
///   `SEOGEN__PROVIDER__API_KEYS=key1,key2`.
pub fn get_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder();

    let path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    match read_and_substitute(path)? {
        Some(content) => {
            info!("Loading configuration from '{}'.", path.display());
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None if config_path.is_some() => {
            return Err(ConfigError::NotFound(format!(
                "Config file not found at '{}'.",
                path.display()
            )));
        }
        None => info!(
            "'{}' not found, using defaults and environment.",
            path.display()
        ),
    }

    let settings = builder
        .add_source(
            Environment::with_prefix("SEOGEN")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("provider.api_keys"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

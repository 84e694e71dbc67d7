//! Configuration loading and validation for junit2alertmanager.
//!
//! A [`Config`] is assembled once at startup, either from defaults or from an
//! optional TOML file, with command-line flags applied on top by the binary.
//! After [`Config::validated`] it is read-only for the rest of the run.
//!
//! # TOML Structure
//!
//! ```toml
//! targets = ["http://alertmanager-0:9093", "http://alertmanager-1:9093"]
//! junit_file = "build/junit.xml"
//! alert_name = "nightly"
//! generator_url = "https://ci.example.com/job/42"
//! expire = "10m"
//! skip_insecure = false
//! ```

pub mod duration;

pub use duration::{format_duration, parse_duration};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No usable target URL remained after trimming.
    #[error("You must set a target (--target or ALERT_MANAGER_HOST)")]
    MissingTargets,

    /// The JUnit report path is empty.
    #[error("You must set a junit path file (--junit)")]
    MissingReportPath,

    /// A duration string could not be parsed.
    #[error("Invalid duration {input:?}: {reason}")]
    InvalidDuration { input: String, reason: String },

    /// The expiration is too large to be added to a timestamp.
    #[error("Expiration {0:?} is out of range")]
    ExpireOutOfRange(Duration),

    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or does not match the schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Complete configuration for one run.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `targets` | none (required) |
/// | `junit_file` | `junit.xml` |
/// | `alert_name` | empty |
/// | `generator_url` | empty |
/// | `expire` | 3 minutes |
/// | `skip_insecure` | false |
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Alertmanager base URLs, tried in order until one accepts the alerts.
    ///
    /// Each entry may itself hold several comma-separated URLs.
    #[serde(default)]
    pub targets: Vec<String>,

    /// Path to the JUnit XML report.
    #[serde(default = "default_junit_file")]
    pub junit_file: PathBuf,

    /// Prefix of the `alertname` label.
    #[serde(default)]
    pub alert_name: String,

    /// Value stamped into each alert's `generatorURL`.
    #[serde(default)]
    pub generator_url: String,

    /// Lifetime of each alert. Zero means `endsAt` is the Unix epoch.
    #[serde(
        default = "default_expire",
        deserialize_with = "duration::deserialize",
        serialize_with = "duration::serialize"
    )]
    pub expire: Duration,

    /// Disable TLS certificate verification on outbound calls (not recommended).
    #[serde(default)]
    pub skip_insecure: bool,
}

fn default_junit_file() -> PathBuf {
    PathBuf::from("junit.xml")
}

fn default_expire() -> Duration {
    Duration::from_secs(3 * 60)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            junit_file: default_junit_file(),
            alert_name: String::new(),
            generator_url: String::new(),
            expire: default_expire(),
            skip_insecure: false,
        }
    }
}

impl Config {
    /// Normalizes targets and checks required settings.
    ///
    /// Targets are split on commas, trimmed, and empty entries dropped.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingTargets`] if no target is left
    /// - [`ConfigError::MissingReportPath`] if the report path is empty
    /// - [`ConfigError::ExpireOutOfRange`] if `expire` can't be used as a time offset
    pub fn validated(mut self) -> ConfigResult<Self> {
        self.targets = split_targets(&self.targets);
        if self.targets.is_empty() {
            return Err(ConfigError::MissingTargets);
        }
        if self.junit_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingReportPath);
        }
        if chrono::TimeDelta::from_std(self.expire).is_err() {
            return Err(ConfigError::ExpireOutOfRange(self.expire));
        }
        Ok(self)
    }
}

/// Splits comma-separated target lists into trimmed, non-empty URLs.
///
/// Order is preserved; it decides the fallback order during delivery.
pub fn split_targets<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .flat_map(|entry| entry.as_ref().split(','))
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(String::from)
        .collect()
}

/// Loads configuration from a TOML file.
///
/// Missing keys take their defaults; unknown keys are rejected.
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    load_config_str(&content)
}

/// Loads configuration from a TOML string.
///
/// # Example
///
/// ```
/// use junit2alertmanager::config::load_config_str;
///
/// let config = load_config_str(r#"
///     targets = ["http://localhost:9093"]
///     expire = "1h"
/// "#)?;
///
/// assert_eq!(config.expire.as_secs(), 3600);
/// # Ok::<(), junit2alertmanager::config::ConfigError>(())
/// ```
pub fn load_config_str(content: &str) -> ConfigResult<Config> {
    let config: Config = toml::from_str(content)?;
    Ok(config)
}

// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! YAML configuration of the logging pipeline.
//!
//! Every field has a default, so an empty document is a valid configuration.
//!
//! ```yaml
//! logger:
//!   level: info
//!   output:
//!     console: { enabled: true, format: color }
//!     file:
//!       enabled: true
//!       path: logs/app.log
//!       format: json
//!       rotation: { max_size: 10, max_backups: 5, max_age: 30, compress: true }
//!   features:
//!     smart_filter: true
//!     keyword_highlight: true
//!     dedup_window: 5m
//!     privacy: { enable_email_mask: false, enable_phone_mask: false, enable_input_sanitize: false }
//!   middleware: { log_body: true, log_headers: false, max_body_size: 2048 }
//! ```

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Deserializer;

use crate::Error;
use crate::filter::DedupCache;
use crate::privacy::Privacy;
use crate::record::Level;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

/// The root of the configuration document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logger: LoggerConfig,
}

impl Config {
    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::from_io_error(err).with_context("path", path.display())
        })?;
        Self::from_yaml_str(&content).map_err(|err| err.with_context("path", path.display()))
    }

    /// Read and parse a configuration file, falling back to the defaults on any error.
    ///
    /// The error is reported to the [`DefaultTrap`].
    pub fn load_or_default(path: impl AsRef<Path>) -> Config {
        Self::load(path).unwrap_or_else(|err| {
            let err = Error::new("failed to load config, using defaults").with_source(err);
            DefaultTrap::default().trap(&err);
            Config::default()
        })
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(content: &str) -> Result<Config, Error> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }

        serde_yaml::from_str(content)
            .map_err(|err| Error::new("failed to parse config").with_source(err))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// One of `debug`, `info`, `warn`, `error`. Unknown names fall back to `info`.
    pub level: String,
    pub output: OutputConfig,
    pub features: FeaturesConfig,
    pub middleware: MiddlewareConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: OutputConfig::default(),
            features: FeaturesConfig::default(),
            middleware: MiddlewareConfig::default(),
        }
    }
}

impl LoggerConfig {
    /// The configured minimum level.
    pub fn level(&self) -> Level {
        Level::parse_or_default(&self.level)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub console: ConsoleConfig,
    pub file: FileConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    #[default]
    Color,
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Text,
    #[default]
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: ConsoleFormat,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: ConsoleFormat::Color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub format: FileFormat,
    pub rotation: RotationConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("logs/app.log"),
            format: FileFormat::Json,
            rotation: RotationConfig::default(),
        }
    }
}

/// Rotation limits. A zero disables the corresponding limit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Megabytes.
    pub max_size: usize,
    pub max_backups: usize,
    /// Days.
    pub max_age: u64,
    pub compress: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            max_backups: 5,
            max_age: 30,
            compress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub smart_filter: bool,
    pub keyword_highlight: bool,
    #[serde(deserialize_with = "deserialize_duration")]
    pub dedup_window: Duration,
    pub privacy: PrivacyConfig,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            smart_filter: true,
            keyword_highlight: true,
            dedup_window: DedupCache::DEFAULT_WINDOW,
            privacy: PrivacyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    pub enable_email_mask: bool,
    pub enable_phone_mask: bool,
    pub enable_input_sanitize: bool,
}

impl From<PrivacyConfig> for Privacy {
    fn from(config: PrivacyConfig) -> Self {
        Privacy {
            mask_email: config.enable_email_mask,
            mask_phone: config.enable_phone_mask,
            sanitize_input: config.enable_input_sanitize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    pub log_body: bool,
    pub log_headers: bool,
    /// Bytes.
    pub max_body_size: usize,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            log_body: true,
            log_headers: false,
            max_body_size: 2048,
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.logger.level(), Level::Info);
        assert!(config.logger.output.console.enabled);
        assert_eq!(config.logger.output.file.path, PathBuf::from("logs/app.log"));
        assert_eq!(config.logger.output.file.rotation.max_backups, 5);
        assert_eq!(config.logger.features.dedup_window, Duration::from_secs(300));
        assert_eq!(config.logger.middleware.max_body_size, 2048);
    }

    #[test]
    fn test_partial_document() {
        let config = Config::from_yaml_str(
            r#"
logger:
  level: WARN
  output:
    console:
      format: json
    file:
      enabled: false
  features:
    dedup_window: 90s
    privacy:
      enable_email_mask: true
"#,
        )
        .unwrap();

        assert_eq!(config.logger.level(), Level::Warn);
        assert_eq!(config.logger.output.console.format, ConsoleFormat::Json);
        assert!(config.logger.output.console.enabled);
        assert!(!config.logger.output.file.enabled);
        assert_eq!(config.logger.features.dedup_window, Duration::from_secs(90));
        assert!(config.logger.features.smart_filter);

        let privacy = Privacy::from(config.logger.features.privacy);
        assert!(privacy.mask_email);
        assert!(!privacy.mask_phone);
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let config = Config::from_yaml_str("logger:\n  level: verbose\n").unwrap();
        assert_eq!(config.logger.level(), Level::Info);
    }

    #[test]
    fn test_invalid_documents() {
        assert!(Config::from_yaml_str("logger: [1, 2]").is_err());
        assert!(Config::from_yaml_str("logger:\n  features:\n    dedup_window: soon\n").is_err());
        assert!(
            Config::from_yaml_str("logger:\n  output:\n    console:\n      format: xml\n").is_err()
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "logger:\n  level: debug").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.logger.level(), Level::Debug);
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));

        let config = Config::load_or_default(dir.path().join("missing.yaml"));
        assert_eq!(config, Config::default());
    }
}

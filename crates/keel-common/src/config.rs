//! ---
//! keel_section: "01-core-functionality"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Shared primitives and utilities for the service API."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

/// Placeholder substituted with the version token in path version formats.
pub const VERSION_PLACEHOLDER: &str = "%s";

fn default_locatable() -> bool {
    true
}

fn default_path_version_pattern() -> String {
    r"^/v(\d+)/".to_owned()
}

fn default_path_version_format() -> String {
    "/v%s/".to_owned()
}

fn default_identification_header() -> String {
    "User-Agent".to_owned()
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for services built on the Keel API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub service: ServiceDefaults,
    #[serde(default)]
    pub negotiation: NegotiationConfig,
    #[serde(default)]
    pub identification: IdentificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`ApiConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedApiConfig {
    pub config: ApiConfig,
    pub source: PathBuf,
}

impl ApiConfig {
    pub const ENV_CONFIG_PATH: &str = "KEEL_CONFIG";

    /// Load configuration from disk, respecting the `KEEL_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedApiConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedApiConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedApiConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<ApiConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.negotiation.validate()?;
        self.identification.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for ApiConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: ApiConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Descriptor-level defaults applied when a service descriptor is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefaults {
    #[serde(default)]
    pub auto_acl: bool,
    #[serde(default = "default_locatable")]
    pub locatable: bool,
}

impl Default for ServiceDefaults {
    fn default() -> Self {
        Self {
            auto_acl: false,
            locatable: default_locatable(),
        }
    }
}

/// Settings for the path-versioned protocol negotiation strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationConfig {
    #[serde(default = "default_path_version_pattern")]
    pub path_version_pattern: String,
    #[serde(default = "default_path_version_format")]
    pub path_version_format: String,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            path_version_pattern: default_path_version_pattern(),
            path_version_format: default_path_version_format(),
        }
    }
}

impl NegotiationConfig {
    /// Compile the configured extraction pattern.
    pub fn compiled_pattern(&self) -> Result<Regex> {
        Regex::new(&self.path_version_pattern).with_context(|| {
            format!(
                "invalid path version pattern '{}'",
                self.path_version_pattern
            )
        })
    }

    pub fn validate(&self) -> Result<()> {
        let pattern = self.compiled_pattern()?;
        if pattern.captures_len() < 2 {
            return Err(anyhow!(
                "path version pattern '{}' must declare a capture group for the version",
                self.path_version_pattern
            ));
        }
        if !self.path_version_format.contains(VERSION_PLACEHOLDER) {
            return Err(anyhow!(
                "path version format '{}' must contain '{}'",
                self.path_version_format,
                VERSION_PLACEHOLDER
            ));
        }
        Ok(())
    }
}

/// Settings for the service identification strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentificationConfig {
    #[serde(default = "default_identification_header")]
    pub header: String,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            header: default_identification_header(),
        }
    }
}

impl IdentificationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.header.trim().is_empty() {
            return Err(anyhow!("identification header must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config: ApiConfig = "".parse().expect("defaults parse");
        assert!(!config.service.auto_acl);
        assert!(config.service.locatable);
        assert_eq!(config.negotiation.path_version_pattern, r"^/v(\d+)/");
        assert_eq!(config.negotiation.path_version_format, "/v%s/");
        assert_eq!(config.identification.header, "User-Agent");
    }

    #[test]
    fn pattern_without_capture_group_is_rejected() {
        let err = r#"
            [negotiation]
            path_version_pattern = "^/v\\d+/"
        "#
        .parse::<ApiConfig>()
        .expect_err("pattern lacks a group");
        assert!(err.to_string().contains("capture group"));
    }

    #[test]
    fn format_without_placeholder_is_rejected() {
        let err = r#"
            [negotiation]
            path_version_format = "/v1/"
        "#
        .parse::<ApiConfig>()
        .expect_err("format lacks placeholder");
        assert!(err.to_string().contains("%s"));
    }

    #[test]
    fn loads_first_existing_candidate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("keel.toml");
        let mut file = std::fs::File::create(&path).expect("create config");
        writeln!(file, "[service]\nauto_acl = true\nlocatable = false").expect("write config");

        let missing = dir.path().join("missing.toml");
        let loaded = ApiConfig::load_with_source(&[missing, path.clone()]).expect("load");
        assert_eq!(loaded.source, path);
        assert!(loaded.config.service.auto_acl);
        assert!(!loaded.config.service.locatable);
    }

    #[test]
    fn missing_candidates_report_inspected_paths() {
        let err = ApiConfig::load(&["does/not/exist.toml"]).expect_err("nothing to load");
        assert!(err.to_string().contains("does/not/exist.toml"));
    }
}

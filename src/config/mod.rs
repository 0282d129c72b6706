//! Configuration for wikibatch

mod batch;
mod mappings;
mod site;
mod upload;

pub use batch::{BatchConfig, TemplateParam};
pub use mappings::MappingsConfig;
pub use site::SiteConfig;
pub use upload::UploadConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Default user agent for all requests against the MediaWiki API
pub const DEFAULT_USER_AGENT: &str = "wikibatch/0.3 (batch media uploads)";

/// Log severity level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when no -v flags are given
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
        }
    }
}

/// Main configuration for a batch upload project
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Target wiki and credentials
    pub site: SiteConfig,
    /// Metadata parsing and info generation
    pub batch: BatchConfig,
    /// Upload behaviour
    #[serde(default)]
    pub upload: UploadConfig,
    /// Mapping-list locations and templates
    #[serde(default)]
    pub mappings: MappingsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together so the user
    /// can fix everything in one pass rather than playing whack-a-mole.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Site validation
        if self.site.api_url.is_empty() {
            errors.push("site.api_url must not be empty".to_string());
        } else if url::Url::parse(&self.site.api_url).is_err() {
            errors.push(format!(
                "site.api_url is not a valid URL: {}",
                self.site.api_url
            ));
        }
        if self.site.username.is_empty() {
            errors.push("site.username must not be empty".to_string());
        }
        if self.site.password_env.is_empty() {
            errors.push("site.password_env must not be empty".to_string());
        }

        // Batch validation
        if self.batch.delimiter == self.batch.list_delimiter {
            errors.push("batch delimiter and list_delimiter must differ".to_string());
        }
        if self.batch.header.is_empty() {
            errors.push("batch.header must not be empty".to_string());
        } else {
            let columns: Vec<&str> = self.batch.header.split(self.batch.delimiter).collect();
            for key in &self.batch.key_columns {
                if !columns.contains(&key.as_str()) {
                    errors.push(format!(
                        "batch.key_columns entry '{}' is not in batch.header",
                        key
                    ));
                }
            }
            for param in &self.batch.template_params {
                if !columns.contains(&param.column.as_str()) {
                    errors.push(format!(
                        "template param '{}' maps missing column '{}'",
                        param.param, param.column
                    ));
                }
            }
        }
        if self.batch.key_columns.is_empty() {
            errors.push("batch.key_columns must not be empty".to_string());
        }
        if self.batch.info_template.is_empty() {
            errors.push("batch.info_template must not be empty".to_string());
        }
        if self.batch.base_meta_cat.is_empty() {
            errors.push("batch.base_meta_cat must not be empty".to_string());
        }
        if self.batch.batch_label.is_empty() {
            errors.push("batch.batch_label must not be empty".to_string());
        }

        // Upload validation
        if self.upload.chunk_size_mb == 0 || self.upload.chunk_size_mb > 100 {
            errors.push(format!(
                "upload.chunk_size_mb must be between 1 and 100, got {}",
                self.upload.chunk_size_mb
            ));
        }
        if self.upload.file_exts.is_empty() {
            errors.push("upload.file_exts must not be empty".to_string());
        }
        for ext in &self.upload.file_exts {
            if !ext.starts_with('.') {
                errors.push(format!(
                    "upload.file_exts entries must start with '.', got '{}'",
                    ext
                ));
            }
        }

        // Mappings validation
        if self.mappings.row_template.is_empty() {
            errors.push("mappings.row_template must not be empty".to_string());
        }
        if self.mappings.na_value.is_empty() {
            errors.push("mappings.na_value must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Helper: build a valid config for mutation-based testing
    // ========================================================================

    fn valid_config() -> Config {
        let mut cfg = Config::default();
        cfg.site.api_url = "https://commons.wikimedia.org/w/api.php".to_string();
        cfg.site.username = "UploadBot".to_string();
        cfg.batch.header = "idno|description|date|photographer".to_string();
        cfg.batch.key_columns = vec!["idno".to_string()];
        cfg.batch.base_meta_cat = "Media from the Example Museum".to_string();
        cfg.batch.batch_label = "2026-08".to_string();
        cfg
    }

    #[test]
    fn valid_config_passes_validation() {
        let cfg = valid_config();
        assert!(cfg.validate().is_ok(), "config should be valid");
    }

    #[test]
    fn validate_rejects_bad_api_url() {
        let mut cfg = valid_config();
        cfg.site.api_url = "not a url".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(
            err.to_string().contains("not a valid URL"),
            "unexpected error message: {}",
            err
        );
    }

    #[test]
    fn validate_rejects_unknown_key_column() {
        let mut cfg = valid_config();
        cfg.batch.key_columns = vec!["missing".to_string()];
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("is not in batch.header"));
    }

    #[test]
    fn validate_rejects_zero_chunk_size() {
        let mut cfg = valid_config();
        cfg.upload.chunk_size_mb = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_size_mb"));
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let mut cfg = valid_config();
        cfg.site.username.clear();
        cfg.upload.file_exts = vec!["tif".to_string()];
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("site.username"));
        assert!(err.contains("must start with '.'"));
    }

    #[test]
    fn load_roundtrips_through_toml() {
        let cfg = valid_config();
        let text = toml::to_string(&cfg).expect("serialize");
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let path = tmp.path().join("wikibatch.toml");
        std::fs::write(&path, text).expect("write");
        let loaded = Config::load(&path).expect("load");
        assert_eq!(loaded.site.api_url, cfg.site.api_url);
        assert_eq!(loaded.batch.key_columns, cfg.batch.key_columns);
    }
}

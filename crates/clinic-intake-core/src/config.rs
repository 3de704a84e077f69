//! Process configuration, read from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evaluation::{EvaluationError, FieldWhitelist};
use crate::models::{DEFAULT_OUTREACH_ATTEMPT_COUNT, MAX_OUTREACH_ATTEMPT_COUNT};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which store to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// SQLite database file; in memory when no path is given
    Sqlite {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    /// Workbook JSON file; in memory when no path is given
    Sheets {
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Sqlite { path: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Client fields criteria may reference; all of them when unset
    pub allowed_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutreachConfig {
    /// Used when the outreachAttemptCount setting is absent or unreadable
    pub default_attempt_count: u32,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            default_attempt_count: DEFAULT_OUTREACH_ATTEMPT_COUNT,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicConfig {
    pub backend: BackendConfig,
    pub evaluation: EvaluationConfig,
    pub outreach: OutreachConfig,
}

impl ClinicConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ClinicConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let count = self.outreach.default_attempt_count;
        if count == 0 || count > MAX_OUTREACH_ATTEMPT_COUNT {
            return Err(ConfigError::Invalid(format!(
                "outreach.default_attempt_count must be between 1 and {}",
                MAX_OUTREACH_ATTEMPT_COUNT
            )));
        }
        self.whitelist()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Field whitelist for the criteria matcher.
    pub fn whitelist(&self) -> Result<FieldWhitelist, EvaluationError> {
        match &self.evaluation.allowed_fields {
            Some(names) => FieldWhitelist::from_names(names),
            None => Ok(FieldWhitelist::all()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ClientField;

    #[test]
    fn test_defaults() {
        let config = ClinicConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClinicConfig::default());
        assert_eq!(config.backend, BackendConfig::Sqlite { path: None });
        assert_eq!(config.outreach.default_attempt_count, 3);
    }

    #[test]
    fn test_full_config() {
        let config = ClinicConfig::from_toml_str(
            r#"
            [backend]
            kind = "sheets"
            path = "/var/lib/clinic/workbook.json"

            [evaluation]
            allowed_fields = ["age", "paymentType"]

            [outreach]
            default_attempt_count = 5
            "#,
        )
        .unwrap();

        assert_eq!(
            config.backend,
            BackendConfig::Sheets {
                path: Some("/var/lib/clinic/workbook.json".into())
            }
        );
        let whitelist = config.whitelist().unwrap();
        assert!(whitelist.contains(ClientField::Age));
        assert!(!whitelist.contains(ClientField::Email));
        assert_eq!(config.outreach.default_attempt_count, 5);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            ClinicConfig::from_toml_str("[backend]\nkind = \"postgres\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ClinicConfig::from_toml_str("[evaluation]\nallowed_fields = [\"status\"]"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ClinicConfig::from_toml_str("[outreach]\ndefault_attempt_count = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.toml");
        std::fs::write(&path, "[backend]\nkind = \"sqlite\"\npath = \"clinic.db\"\n").unwrap();

        let config = ClinicConfig::load(&path).unwrap();
        assert_eq!(config.backend, BackendConfig::Sqlite { path: Some("clinic.db".into()) });
        assert!(matches!(
            ClinicConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}

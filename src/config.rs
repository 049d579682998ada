use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "SALARY_PREP_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub fx: FxConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Single-byte field delimiter of the source CSV
    pub delimiter: char,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub table_file: String,
    pub diagnostics_file: String,
    /// Prometheus text dump; no recorder is installed when unset
    pub metrics_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FxConfig {
    /// Fetch today's rates from the CBR feed before falling back to the cache
    pub online: bool,
    pub url: String,
    pub timeout_seconds: u64,
    pub cache_file: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: String,
    pub file_name: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            table_file: "processed.csv".to_string(),
            diagnostics_file: "diagnostics.json".to_string(),
            metrics_file: None,
        }
    }
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            online: false,
            url: "https://www.cbr-xml-daily.ru/daily_json.js".to_string(),
            timeout_seconds: 10,
            cache_file: "fx_rates.json".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_name: "salary_prep.log".to_string(),
        }
    }
}

impl Config {
    /// Load from an explicit path; a missing or malformed file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config path (explicit, then `SALARY_PREP_CONFIG`, then
    /// `config.toml`) and fall back to defaults when no file exists.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        if Path::new(&path).exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.input.delimiter.is_ascii() {
            return Err(PipelineError::Config(format!(
                "input.delimiter must be a single ASCII character, got '{}'",
                self.input.delimiter
            )));
        }
        if self.fx.timeout_seconds == 0 {
            return Err(PipelineError::Config(
                "fx.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fx]\nonline = true\n\n[input]\ndelimiter = \";\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.fx.online);
        assert_eq!(config.fx.cache_file, "fx_rates.json");
        assert_eq!(config.input.delimiter, ';');
        assert_eq!(config.output.table_file, "processed.csv");
        assert!(config.output.metrics_file.is_none());
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let result = Config::load("/definitely/not/here.toml");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fx]\ntimeout_seconds = 0").unwrap();

        assert!(Config::load(file.path()).is_err());
    }
}

use common::Bookmaker;
use registry::RegistryConfig;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/forkscan.yml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForkscanConfig {
    /// Fallback log filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub registry: RegistryConfig,
    /// How often the binary logs a registry summary. 0 disables it.
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
    pub adapters: Vec<AdapterConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdapterConfig {
    pub bookmaker: Bookmaker,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    pub source: SourceConfig,
}

impl AdapterConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Where an adapter reads its payload from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum SourceConfig {
    #[serde(rename = "http")]
    Http {
        url: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    #[serde(rename = "file")]
    File { path: PathBuf },
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_report_interval_secs() -> u64 {
    30
}

fn default_enabled() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl ForkscanConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn get_adapter_config(&self, bookmaker: Bookmaker) -> Option<&AdapterConfig> {
        self.adapters.iter().find(|a| a.bookmaker == bookmaker)
    }

    pub fn enabled_adapters(&self) -> impl Iterator<Item = &AdapterConfig> {
        self.adapters.iter().filter(|a| a.enabled)
    }

    pub fn report_interval(&self) -> Option<Duration> {
        (self.report_interval_secs > 0).then(|| Duration::from_secs(self.report_interval_secs))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.grace_cycles == 0 {
            return Err(ConfigError::ValidationError(
                "Registry grace_cycles must be at least 1".to_string(),
            ));
        }

        if self.enabled_adapters().next().is_none() {
            return Err(ConfigError::ValidationError("No adapters enabled".to_string()));
        }

        let mut seen = HashSet::new();
        for adapter in &self.adapters {
            let bookmaker = adapter.bookmaker;
            if !seen.insert(bookmaker) {
                return Err(ConfigError::ValidationError(format!(
                    "Adapter '{}' configured more than once",
                    bookmaker
                )));
            }

            if !source_adapters::is_supported(bookmaker) {
                return Err(ConfigError::ValidationError(format!(
                    "No adapter implementation for '{}'",
                    bookmaker
                )));
            }

            if adapter.interval_ms == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "Polling interval for '{}' must be greater than 0",
                    bookmaker
                )));
            }

            match &adapter.source {
                SourceConfig::Http { .. } if bookmaker == Bookmaker::Betboom => {
                    return Err(ConfigError::ValidationError(format!(
                        "'{}' only replays recorded snapshots, use a file source",
                        bookmaker
                    )));
                }
                SourceConfig::Http { url, timeout_ms, .. } => {
                    if url.trim().is_empty() {
                        return Err(ConfigError::ValidationError(format!(
                            "URL for '{}' cannot be empty",
                            bookmaker
                        )));
                    }
                    if *timeout_ms == 0 {
                        return Err(ConfigError::ValidationError(format!(
                            "Timeout for '{}' must be greater than 0",
                            bookmaker
                        )));
                    }
                }
                SourceConfig::File { path } => {
                    if path.as_os_str().is_empty() {
                        return Err(ConfigError::ValidationError(format!(
                            "Replay path for '{}' cannot be empty",
                            bookmaker
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_config() -> ForkscanConfig {
        ForkscanConfig {
            log_level: "debug".to_string(),
            registry: RegistryConfig { grace_cycles: 4 },
            report_interval_secs: 10,
            adapters: vec![
                AdapterConfig {
                    bookmaker: Bookmaker::Fonbet,
                    enabled: true,
                    interval_ms: 1_000,
                    source: SourceConfig::Http {
                        url: "https://line.example.com/events/list".to_string(),
                        timeout_ms: 3_000,
                        headers: HashMap::from([("Accept".to_string(), "application/json".to_string())]),
                    },
                },
                AdapterConfig {
                    bookmaker: Bookmaker::Betboom,
                    enabled: false,
                    interval_ms: 2_000,
                    source: SourceConfig::File {
                        path: PathBuf::from("fixtures/betboom.pb"),
                    },
                },
            ],
        }
    }

    #[test]
    fn test_config_save_and_load() {
        let config = create_test_config();
        let temp_file = NamedTempFile::new().unwrap();

        config.save(temp_file.path()).unwrap();
        let loaded = ForkscanConfig::load(temp_file.path()).unwrap();

        assert_eq!(loaded.log_level, "debug");
        assert_eq!(loaded.registry.grace_cycles, 4);
        assert_eq!(loaded.adapters.len(), 2);
        assert_eq!(loaded.adapters[0].bookmaker, Bookmaker::Fonbet);
        assert_eq!(loaded.adapters[0].source, config.adapters[0].source);
        assert_eq!(loaded.adapters[1].source, config.adapters[1].source);
        assert!(!loaded.adapters[1].enabled);
    }

    #[test]
    fn test_defaults_from_minimal_yaml() {
        let yaml = r#"
adapters:
  - bookmaker: fonbet
    source:
      type: http
      url: https://line.example.com/events/list
  - bookmaker: betboom
    source:
      type: file
      path: fixtures/betboom.pb
"#;
        let config: ForkscanConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.registry, RegistryConfig::default());
        assert_eq!(config.report_interval(), Some(Duration::from_secs(30)));

        let fonbet = config.get_adapter_config(Bookmaker::Fonbet).unwrap();
        assert!(fonbet.enabled);
        assert_eq!(fonbet.interval(), Duration::from_secs(1));
        match &fonbet.source {
            SourceConfig::Http { timeout_ms, headers, .. } => {
                assert_eq!(*timeout_ms, 5_000);
                assert!(headers.is_empty());
            }
            other => panic!("unexpected source {:?}", other),
        }
        assert_eq!(config.enabled_adapters().count(), 2);
    }

    #[test]
    fn test_config_validation() {
        let mut config = create_test_config();
        config.validate().unwrap();

        config.adapters[0].enabled = false;
        assert!(config.validate().is_err());

        config = create_test_config();
        config.adapters[1].bookmaker = Bookmaker::Fonbet;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));

        config = create_test_config();
        config.adapters[0].interval_ms = 0;
        assert!(config.validate().is_err());

        config = create_test_config();
        config.registry.grace_cycles = 0;
        assert!(config.validate().is_err());

        config = create_test_config();
        config.adapters[1].bookmaker = Bookmaker::Leon;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("No adapter implementation"));
    }

    #[test]
    fn test_source_validation() {
        let mut config = create_test_config();
        config.adapters[0].source = SourceConfig::Http {
            url: " ".to_string(),
            timeout_ms: 1_000,
            headers: HashMap::new(),
        };
        assert!(config.validate().is_err());

        config.adapters[0].source = SourceConfig::Http {
            url: "https://line.example.com".to_string(),
            timeout_ms: 0,
            headers: HashMap::new(),
        };
        assert!(config.validate().is_err());

        config = create_test_config();
        config.adapters[1].source = SourceConfig::File { path: PathBuf::new() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_betboom_requires_file_source() {
        let mut config = create_test_config();
        config.adapters[1].enabled = true;
        config.validate().unwrap();

        config.adapters[1].source = SourceConfig::Http {
            url: "https://line.example.com/snapshot".to_string(),
            timeout_ms: 1_000,
            headers: HashMap::new(),
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("file source"));
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config =
            ForkscanConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/forkscan.yml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.enabled_adapters().count(), 1);
        assert!(!config.get_adapter_config(Bookmaker::Betboom).unwrap().enabled);
    }

    #[test]
    fn test_get_adapter_config() {
        let config = create_test_config();
        assert_eq!(
            config.get_adapter_config(Bookmaker::Betboom).unwrap().interval_ms,
            2_000
        );
        assert!(config.get_adapter_config(Bookmaker::Winline).is_none());
        assert_eq!(config.enabled_adapters().count(), 1);
    }

    #[test]
    fn test_load_errors() {
        let err = ForkscanConfig::load("/nonexistent/forkscan.yml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));

        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "adapters: [ { bookmaker: nobody } ]").unwrap();
        let err = ForkscanConfig::load(temp_file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}

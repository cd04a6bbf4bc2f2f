//! Serving configuration
//!
//! Loaded from YAML when the file exists, otherwise defaults; callers then
//! apply their own overrides (environment, command line).

use churnguard_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the prediction-serving path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServingConfig {
    /// Compute session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Model artifact settings
    #[serde(default)]
    pub model: ModelSettings,
}

/// Compute session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Application name attached to the session
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Number of execution slots (and compute threads)
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Memory budget for loaded pipelines, in megabytes
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,

    /// Device to run inference on, written `cpu` or `cuda: {index: 1}`
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub device: DeviceSpec,
}

impl SessionConfig {
    pub fn memory_limit_bytes(&self) -> u64 {
        self.memory_limit_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            worker_threads: default_worker_threads(),
            memory_limit_mb: default_memory_limit_mb(),
            device: DeviceSpec::default(),
        }
    }
}

/// Device specification (for config files)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda { index: Option<usize> },
    Metal { index: Option<usize> },
}

/// Model artifact settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Explicit model directory; the installed location is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_app_name() -> String {
    "ChurnPredictionApp".to_string()
}

fn default_worker_threads() -> usize {
    1
}

fn default_memory_limit_mb() -> u64 {
    2048
}

impl ServingConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Invalid serving config: {}", e)))
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => {
                tracing::info!("Loading serving config from {}", path.display());
                Self::from_file(path)
            }
            Some(path) => {
                tracing::debug!("Config {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Override the model directory
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model.path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_single_worker_session() {
        let config = ServingConfig::default();
        assert_eq!(config.session.app_name, "ChurnPredictionApp");
        assert_eq!(config.session.worker_threads, 1);
        assert_eq!(config.session.memory_limit_bytes(), 2 * 1024 * 1024 * 1024);
        assert_eq!(config.session.device, DeviceSpec::Cpu);
        assert!(config.model.path.is_none());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
session:
  memory_limit_mb: 512
model:
  path: "/srv/models/churn"
"#;
        let config = ServingConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.session.worker_threads, 1);
        assert_eq!(config.session.memory_limit_mb, 512);
        assert_eq!(config.model.path.unwrap(), PathBuf::from("/srv/models/churn"));
    }

    #[test]
    fn test_parse_device() {
        let yaml = r#"
session:
  device:
    cuda:
      index: 1
"#;
        let config = ServingConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.session.device, DeviceSpec::Cuda { index: Some(1) });

        let config = ServingConfig::from_yaml("session:\n  device: cpu\n").unwrap();
        assert_eq!(config.session.device, DeviceSpec::Cpu);

        let config = ServingConfig::from_yaml("session:\n  device:\n    metal: {}\n").unwrap();
        assert_eq!(config.session.device, DeviceSpec::Metal { index: None });
    }

    #[test]
    fn test_device_round_trips_through_yaml() {
        let mut config = ServingConfig::default();
        config.session.device = DeviceSpec::Cuda { index: Some(0) };

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("cuda:"));
        let parsed = ServingConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.session.device, config.session.device);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = ServingConfig::from_yaml("session: [1, 2").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("churnguard-does-not-exist.yaml");
        let config = ServingConfig::load(Some(&path)).unwrap();
        assert_eq!(config.session.worker_threads, 1);
    }

    #[test]
    fn test_override_model_path() {
        let config = ServingConfig::default().with_model_path("/tmp/model");
        assert_eq!(config.model.path.unwrap(), PathBuf::from("/tmp/model"));
    }
}

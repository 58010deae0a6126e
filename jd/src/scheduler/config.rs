//! Scheduler configuration

use std::path::Path;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// Policy applied by `schedule` when the scheduler is at capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Always accept; the pending queue grows and only latency degrades
    #[default]
    AcceptAndQueue,
    /// Fail fast with `SchedulerError::CapacityExceeded`
    RejectWhenFull,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Max concurrently executing tasks; admission compares pending + running
    /// against this limit
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// What `schedule` does when at capacity
    #[serde(default)]
    pub admission_policy: AdmissionPolicy,
}

fn default_max_concurrent() -> usize {
    8
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            admission_policy: AdmissionPolicy::AcceptAndQueue,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .context(format!("Failed to read config file: {}", path.as_ref().display()))?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.admission_policy, AdmissionPolicy::AcceptAndQueue);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: SchedulerConfig = serde_yaml::from_str("max_concurrent: 2").unwrap();
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.admission_policy, AdmissionPolicy::AcceptAndQueue);
    }

    #[test]
    fn test_policy_snake_case() {
        let config: SchedulerConfig = serde_yaml::from_str("admission_policy: reject_when_full").unwrap();
        assert_eq!(config.admission_policy, AdmissionPolicy::RejectWhenFull);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_concurrent: 3\nadmission_policy: reject_when_full").unwrap();

        let config = SchedulerConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.admission_policy, AdmissionPolicy::RejectWhenFull);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let err = SchedulerConfig::load_from_file("/nonexistent/judged.yml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
